// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The contract a hardware (or simulated) accelerator driver implements.

use crate::{DeviceSettings, DriverFault, ModelId};
use async_trait::async_trait;

/// Low-level accelerator operations.
///
/// Drivers are untrusted: they may fail, hang, or write garbage. The
/// [`Accelerator`](crate::Accelerator) facade bounds every `run` with a
/// timeout and validates whatever the driver reports before the pipeline
/// sees it. A driver never allocates from the runtime's arena; `run` writes
/// into the output slice it is given and returns how many bytes it wrote.
#[async_trait]
pub trait AcceleratorDriver: Send {
    /// Human-readable driver name, for logs.
    fn name(&self) -> &str;

    /// Powers and configures the device. Called at startup and after every
    /// power cycle.
    async fn init(&mut self, settings: &DeviceSettings) -> Result<(), DriverFault>;

    /// Transfers a model payload to device storage.
    async fn load(&mut self, model: ModelId, payload: &[u8]) -> Result<(), DriverFault>;

    /// Releases a model's device storage.
    async fn unload(&mut self, model: ModelId) -> Result<(), DriverFault>;

    /// Runs one inference and returns the number of output bytes written.
    async fn run(
        &mut self,
        model: ModelId,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, DriverFault>;

    /// Cuts and restores device power. Loaded models are lost.
    async fn power_cycle(&mut self) -> Result<(), DriverFault>;

    /// Advisory load figure in percent.
    fn utilization(&self) -> u8;
}
