// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the accelerator facade.

use crate::wire::WireError;
use crate::ModelId;
use std::time::Duration;

/// A failure reported by a driver, carrying its native status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("driver status {code}: {detail}")]
pub struct DriverFault {
    pub code: i32,
    pub detail: &'static str,
}

impl DriverFault {
    pub const fn new(code: i32, detail: &'static str) -> Self {
        Self { code, detail }
    }
}

/// Errors surfaced by [`Accelerator`](crate::Accelerator).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AcceleratorError {
    /// The device could not be powered on or configured.
    #[error("accelerator init failed: {0}")]
    InitFailed(DriverFault),

    /// The power rail could not be cycled.
    #[error("accelerator power cycle failed: {0}")]
    PowerCycleFailed(DriverFault),

    /// `load` or `run` was called before a successful `init`.
    #[error("accelerator not initialized")]
    NotInitialized,

    /// A zero-length model payload.
    #[error("model '{0}' payload is empty")]
    EmptyModel(ModelId),

    /// A model payload larger than the device's model storage.
    #[error("model '{model}' is {size_bytes} bytes, limit is {max_bytes}")]
    ModelTooLarge {
        model: ModelId,
        size_bytes: usize,
        max_bytes: usize,
    },

    /// The driver rejected a model.
    #[error("loading model '{model}' failed: {fault}")]
    ModelLoadFailed { model: ModelId, fault: DriverFault },

    /// The driver failed to release a model.
    #[error("unloading model '{model}' failed: {fault}")]
    UnloadFailed { model: ModelId, fault: DriverFault },

    /// `run` was called for a model that is not loaded.
    #[error("model '{0}' is not loaded")]
    ModelNotLoaded(ModelId),

    /// `run` was given an empty input buffer.
    #[error("empty input for model '{0}'")]
    EmptyInput(ModelId),

    /// The driver did not finish within the timeout.
    #[error("model '{model}' timed out after {timeout:?}")]
    Timeout { model: ModelId, timeout: Duration },

    /// The driver reported a failure while running.
    #[error("model '{model}' failed: {fault}")]
    RunFailed { model: ModelId, fault: DriverFault },

    /// The driver's output could not be interpreted.
    #[error("malformed accelerator output: {0}")]
    MalformedOutput(#[from] WireError),
}

impl AcceleratorError {
    /// Returns `true` for the run-time timeout, as distinct from driver faults.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
