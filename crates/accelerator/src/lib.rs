// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # accelerator
//!
//! The boundary between the recognition runtime and an external inference
//! accelerator (NPU). The accelerator is treated as an untrusted black box
//! that can fail, stall, or return garbage.
//!
//! # Key Components
//!
//! - [`AcceleratorDriver`]: the async contract a device driver implements.
//! - [`Accelerator`]: the facade the pipeline talks to. Tracks which models
//!   are resident, rejects bad payloads, and bounds every run with
//!   `tokio::time::timeout`.
//! - [`wire`]: zero-copy parsers for the detection and recognition output
//!   layouts.
//! - [`SimulatedDriver`]: a scripted in-process driver with fault injection.
//!
//! # Example
//! ```
//! use accelerator::{Accelerator, DeviceSettings, ModelId, SimulatedDriver};
//! use accelerator::wire::{detection_capacity, DetectionOutput};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), accelerator::AcceleratorError> {
//! let driver = SimulatedDriver::demo(Duration::from_millis(1));
//! let mut npu = Accelerator::new(Box::new(driver), DeviceSettings::default());
//! npu.init().await?;
//! npu.load(ModelId::TextDetection, &[0u8; 128]).await?;
//!
//! let mut out = [0u8; detection_capacity(16)];
//! let n = npu
//!     .run(ModelId::TextDetection, &[0u8; 64], &mut out, Duration::from_millis(10))
//!     .await?;
//! assert_eq!(DetectionOutput::parse(&out[..n])?.len(), 2);
//! # Ok(())
//! # }
//! ```

mod driver;
mod error;
mod facade;
mod model;
pub mod simulated;
pub mod wire;

pub use driver::AcceleratorDriver;
pub use error::{AcceleratorError, DriverFault};
pub use facade::Accelerator;
pub use model::{DeviceSettings, ModelId, PowerMode, Precision, DEFAULT_MAX_MODEL_BYTES};
pub use simulated::{Fault, ScriptedRegion, SimulatedDriver, SimulatorControl};
pub use wire::{Orientation, RegionRecord, WireError};
