// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The runtime's only path to the accelerator.
//!
//! ```text
//!   Accelerator::new(driver, settings)
//!        │ init()            (power on, configure)
//!        ▼
//!   initialized ──load(model, payload)──► model ready
//!        │                                    │ run(model, in, out, timeout)
//!        │ power_cycle()                      ▼
//!        └──────────── all models dropped ◄── bytes written / Timeout
//! ```

use crate::{AcceleratorDriver, AcceleratorError, DeviceSettings, ModelId};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
struct ModelSlot {
    ready: bool,
    size_bytes: usize,
}

/// Wraps a driver with validation, readiness tracking and timeouts.
pub struct Accelerator {
    driver: Box<dyn AcceleratorDriver>,
    settings: DeviceSettings,
    initialized: bool,
    slots: [ModelSlot; ModelId::ALL.len()],
}

impl Accelerator {
    pub fn new(driver: Box<dyn AcceleratorDriver>, settings: DeviceSettings) -> Self {
        Self {
            driver,
            settings,
            initialized: false,
            slots: Default::default(),
        }
    }

    /// Powers on and configures the device. Failures are not retried.
    pub async fn init(&mut self) -> Result<(), AcceleratorError> {
        self.initialized = false;
        self.slots = Default::default();
        self.driver
            .init(&self.settings)
            .await
            .map_err(AcceleratorError::InitFailed)?;
        self.initialized = true;
        tracing::info!(
            "accelerator '{}' initialized at {} MHz, {} precision",
            self.driver.name(),
            self.settings.frequency_hz / 1_000_000,
            self.settings.precision,
        );
        Ok(())
    }

    /// Loads a model payload and marks the model ready.
    pub async fn load(&mut self, model: ModelId, payload: &[u8]) -> Result<(), AcceleratorError> {
        if !self.initialized {
            return Err(AcceleratorError::NotInitialized);
        }
        if payload.is_empty() {
            return Err(AcceleratorError::EmptyModel(model));
        }
        if payload.len() > self.settings.max_model_bytes {
            return Err(AcceleratorError::ModelTooLarge {
                model,
                size_bytes: payload.len(),
                max_bytes: self.settings.max_model_bytes,
            });
        }

        self.slots[model.index()].ready = false;
        self.driver
            .load(model, payload)
            .await
            .map_err(|fault| AcceleratorError::ModelLoadFailed { model, fault })?;
        self.slots[model.index()] = ModelSlot {
            ready: true,
            size_bytes: payload.len(),
        };
        tracing::info!("model '{model}' loaded ({} bytes)", payload.len());
        Ok(())
    }

    /// Releases a model. Unloading a model that is not loaded is a no-op.
    pub async fn unload(&mut self, model: ModelId) -> Result<(), AcceleratorError> {
        if !self.slots[model.index()].ready {
            return Ok(());
        }
        self.slots[model.index()] = ModelSlot::default();
        self.driver
            .unload(model)
            .await
            .map_err(|fault| AcceleratorError::UnloadFailed { model, fault })?;
        tracing::debug!("model '{model}' unloaded");
        Ok(())
    }

    pub fn is_ready(&self, model: ModelId) -> bool {
        self.initialized && self.slots[model.index()].ready
    }

    /// Size of the loaded payload, or 0.
    pub fn model_size(&self, model: ModelId) -> usize {
        self.slots[model.index()].size_bytes
    }

    /// Runs one inference, bounded by `timeout`.
    ///
    /// A driver that does not finish in time yields
    /// [`AcceleratorError::Timeout`]; its pending call is dropped. The
    /// returned length is never larger than `output`.
    pub async fn run(
        &mut self,
        model: ModelId,
        input: &[u8],
        output: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, AcceleratorError> {
        if !self.initialized {
            return Err(AcceleratorError::NotInitialized);
        }
        if !self.slots[model.index()].ready {
            return Err(AcceleratorError::ModelNotLoaded(model));
        }
        if input.is_empty() {
            return Err(AcceleratorError::EmptyInput(model));
        }

        let capacity = output.len();
        let written = match tokio::time::timeout(timeout, self.driver.run(model, input, output)).await {
            Err(_) => return Err(AcceleratorError::Timeout { model, timeout }),
            Ok(result) => result.map_err(|fault| AcceleratorError::RunFailed { model, fault })?,
        };

        if written > capacity {
            return Err(AcceleratorError::MalformedOutput(crate::WireError::BufferTooSmall {
                needed: written,
                got: capacity,
            }));
        }
        Ok(written)
    }

    /// Cycles device power. Every model must be reloaded afterwards.
    pub async fn power_cycle(&mut self) -> Result<(), AcceleratorError> {
        self.initialized = false;
        self.slots = Default::default();
        self.driver
            .power_cycle()
            .await
            .map_err(AcceleratorError::PowerCycleFailed)?;
        tracing::info!("accelerator '{}' power cycled", self.driver.name());
        Ok(())
    }

    /// Advisory utilization in percent, clamped to 100.
    pub fn utilization(&self) -> u8 {
        self.driver.utilization().min(100)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }
}

impl std::fmt::Debug for Accelerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accelerator")
            .field("driver", &self.driver.name())
            .field("initialized", &self.initialized)
            .field("detection_ready", &self.slots[0].ready)
            .field("recognition_ready", &self.slots[1].ready)
            .finish()
    }
}
