// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the OCR pipeline and their stable numeric codes.

use crate::monitor::Severity;
use crate::recovery::RecoveryStep;
use crate::state::PipelineState;
use accelerator::{AcceleratorError, ModelId};
use memory_manager::MemoryError;
use std::time::Duration;

/// Stable error codes reported through the system monitor.
pub mod codes {
    pub const INIT_FAILED: i32 = -1;
    pub const MODEL_LOAD_FAILED: i32 = -2;
    pub const INFERENCE_TIMEOUT: i32 = -3;
    pub const MEMORY_ALLOC_FAILED: i32 = -4;
    pub const INPUT_INVALID: i32 = -5;
    pub const ACCELERATOR_ERROR: i32 = -6;
    pub const RECOVERY_FAILED: i32 = -8;
    pub const MEMORY_CORRUPTION: i32 = -9;
}

/// How the runtime reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ErrorClass {
    /// Startup cannot proceed; returned to the caller.
    FatalAtInit,
    /// The cycle is aborted and counted toward recovery.
    Transient,
    /// An arena integrity check failed.
    Corruption,
    /// The recovery procedure itself failed.
    RecoveryFailure,
}

/// Errors that can occur while configuring or running the pipeline.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Arena failure.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    /// Accelerator failure.
    #[error("accelerator error: {0}")]
    Accelerator(#[from] AcceleratorError),

    /// A model file could not be opened or mapped.
    #[error("model file for '{model}': {detail}")]
    ModelFile { model: ModelId, detail: String },

    /// A frame did not match the configured geometry.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The operation is not allowed in the current state.
    #[error("invalid state transition {from:?} -> {to:?}")]
    InvalidState {
        from: PipelineState,
        to: PipelineState,
    },

    /// The self-test ran but missed the latency deadline.
    #[error("self-test average {average:?} exceeds deadline {deadline:?}")]
    SelfTestTooSlow { average: Duration, deadline: Duration },

    /// A recovery step failed; the pipeline stays in `Error`.
    #[error("recovery failed at {step:?}: {source}")]
    RecoveryFailed {
        step: RecoveryStep,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// The stable numeric code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::InvalidState { .. } => codes::INIT_FAILED,
            Self::Memory(e) => match e {
                MemoryError::Corruption { .. } => codes::MEMORY_CORRUPTION,
                MemoryError::InsufficientMemory { .. }
                | MemoryError::ZeroSizedAllocation
                | MemoryError::Contended { .. } => codes::MEMORY_ALLOC_FAILED,
                _ => codes::INIT_FAILED,
            },
            Self::Accelerator(e) => match e {
                AcceleratorError::Timeout { .. } => codes::INFERENCE_TIMEOUT,
                AcceleratorError::InitFailed(_) | AcceleratorError::PowerCycleFailed(_) => {
                    codes::INIT_FAILED
                }
                AcceleratorError::EmptyModel(_)
                | AcceleratorError::ModelTooLarge { .. }
                | AcceleratorError::ModelLoadFailed { .. }
                | AcceleratorError::ModelNotLoaded(_) => codes::MODEL_LOAD_FAILED,
                AcceleratorError::EmptyInput(_) => codes::INPUT_INVALID,
                _ => codes::ACCELERATOR_ERROR,
            },
            Self::ModelFile { .. } => codes::MODEL_LOAD_FAILED,
            Self::InvalidInput(_) => codes::INPUT_INVALID,
            Self::SelfTestTooSlow { .. } => codes::INFERENCE_TIMEOUT,
            Self::RecoveryFailed { .. } => codes::RECOVERY_FAILED,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::RecoveryFailed { .. } => ErrorClass::RecoveryFailure,
            Self::Memory(e) if e.is_corruption() => ErrorClass::Corruption,
            Self::Memory(
                MemoryError::InsufficientMemory { .. }
                | MemoryError::ZeroSizedAllocation
                | MemoryError::Contended { .. },
            ) => ErrorClass::Transient,
            Self::Accelerator(
                AcceleratorError::Timeout { .. }
                | AcceleratorError::RunFailed { .. }
                | AcceleratorError::MalformedOutput(_)
                | AcceleratorError::EmptyInput(_),
            )
            | Self::InvalidInput(_) => ErrorClass::Transient,
            _ => ErrorClass::FatalAtInit,
        }
    }

    /// Severity used when the error is logged to the monitor.
    pub fn severity(&self) -> Severity {
        match self.class() {
            ErrorClass::Transient => Severity::Error,
            ErrorClass::FatalAtInit | ErrorClass::Corruption => Severity::Critical,
            ErrorClass::RecoveryFailure => Severity::Fatal,
        }
    }

    /// Short fixed description for monitor records.
    pub fn description(&self) -> &'static str {
        match self.code() {
            codes::INIT_FAILED => "initialization failed",
            codes::MODEL_LOAD_FAILED => "model load failed",
            codes::INFERENCE_TIMEOUT => "inference timeout",
            codes::MEMORY_ALLOC_FAILED => "memory allocation failed",
            codes::INPUT_INVALID => "invalid input",
            codes::RECOVERY_FAILED => "recovery failed",
            codes::MEMORY_CORRUPTION => "memory corruption",
            _ => "accelerator error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accelerator::{DriverFault, WireError};

    #[test]
    fn test_codes_follow_firmware() {
        let timeout = PipelineError::from(AcceleratorError::Timeout {
            model: ModelId::TextDetection,
            timeout: Duration::from_millis(10),
        });
        assert_eq!(timeout.code(), -3);
        assert_eq!(timeout.class(), ErrorClass::Transient);
        assert_eq!(timeout.severity(), Severity::Error);

        let oom = PipelineError::from(MemoryError::InsufficientMemory {
            requested_bytes: 10,
            available_bytes: 0,
            capacity_bytes: 8,
        });
        assert_eq!(oom.code(), -4);
        assert_eq!(oom.class(), ErrorClass::Transient);

        let npu = PipelineError::from(AcceleratorError::RunFailed {
            model: ModelId::TextRecognition,
            fault: DriverFault::new(-1, "x"),
        });
        assert_eq!(npu.code(), -6);
        assert_eq!(npu.description(), "accelerator error");

        let init = PipelineError::from(AcceleratorError::InitFailed(DriverFault::new(-1, "x")));
        assert_eq!(init.code(), -1);
        assert_eq!(init.class(), ErrorClass::FatalAtInit);
    }

    #[test]
    fn test_corruption_is_critical() {
        let e = PipelineError::from(MemoryError::Corruption {
            offset: 0,
            detail: "integrity tag mismatch",
        });
        assert_eq!(e.class(), ErrorClass::Corruption);
        assert_eq!(e.severity(), Severity::Critical);
        assert_eq!(e.code(), codes::MEMORY_CORRUPTION);
    }

    #[test]
    fn test_malformed_output_is_transient() {
        let e = PipelineError::from(AcceleratorError::from(WireError::InvalidUtf8));
        assert_eq!(e.class(), ErrorClass::Transient);
        assert_eq!(e.code(), codes::ACCELERATOR_ERROR);
    }

    #[test]
    fn test_recovery_failure_is_fatal() {
        let e = PipelineError::RecoveryFailed {
            step: RecoveryStep::PowerCycle,
            source: Box::new(PipelineError::Config("x".into())),
        };
        assert_eq!(e.code(), -8);
        assert_eq!(e.severity(), Severity::Fatal);
        assert!(e.to_string().contains("PowerCycle"));
    }
}
