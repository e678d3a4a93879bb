// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # ocr-pipeline
//!
//! A deadline-bounded OCR runtime: each cycle takes one camera frame,
//! downsamples it, runs text detection and per-region recognition on an
//! external accelerator, and publishes one aggregated [`CycleResult`].
//!
//! # Key Components
//!
//! - [`Orchestrator`]: owns everything below and drives the
//!   `Idle → Loading → Ready ⇄ Inferencing → Postprocessing` state machine.
//! - [`PerformanceStats`]: O(1) latency, quality and arena aggregates.
//! - [`RecoveryController`]: counts consecutive failures and decides when
//!   to power-cycle and reload the accelerator.
//! - [`FrameSource`], [`ResultSink`], [`SystemMonitor`]: the injected
//!   boundaries to the camera, the consumer and the host's health service.
//!
//! All per-cycle buffers come from a fixed
//! [`Arena`](memory_manager::Arena); after every cycle, successful or not,
//! the arena is back to zero bytes in use.
//!
//! # Cycle
//!
//! ```text
//! FrameSource ─► downsample ─► detect ─► for each region: crop ─► recognize
//!                                                      │
//!            ResultSink ◄── aggregate (confidence > 0.5) ◄┘
//! ```

pub mod config;
pub mod cycle;
pub mod error;
pub mod io;
pub mod models;
pub mod monitor;
mod orchestrator;
pub mod preprocess;
pub mod recovery;
pub mod region;
pub mod selftest;
pub mod state;
pub mod stats;

pub use config::{PipelineConfig, MAX_REGIONS};
pub use error::{codes, ErrorClass, PipelineError};
pub use io::{ChannelSink, Frame, FrameSource, ResultSink, SinkError, SyntheticCamera};
pub use models::ModelStore;
pub use monitor::{ErrorRecord, RecordingMonitor, Severity, SystemMonitor, TracingMonitor};
pub use orchestrator::{BenchmarkReport, CycleOutcome, Orchestrator, RecoveryOutcome, StateDump};
pub use recovery::{FailureAction, RecoveryController, RecoveryState, RecoveryStep};
pub use region::{CycleResult, Language, RecognitionResult};
pub use selftest::SelfTestReport;
pub use state::{PipelineState, StateMachine};
pub use stats::{PerformanceStats, PerformanceTargets, TargetReport};
