// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Pipeline configuration loaded from TOML files or constructed programmatically.
//!
//! Every field has a default, so a file only needs the values it changes.
//!
//! # TOML Format
//! ```toml
//! arena_capacity = "2.5M"
//! precision = "int8"
//! deadline_us = 8000
//! inference_timeout_ms = 10
//! error_threshold = 5
//! frame_width = 640
//! frame_height = 480
//! input_width = 320
//! input_height = 240
//! # model_dir = "./models"
//! ```

use crate::stats::PerformanceTargets;
use crate::PipelineError;
use accelerator::{DeviceSettings, PowerMode, Precision};
use memory_manager::MemoryBudget;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest number of regions one cycle may carry.
pub const MAX_REGIONS: usize = 16;

/// Immutable settings for one [`Orchestrator`](crate::Orchestrator).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Arena capacity (human-readable, e.g. `"2.5M"`).
    pub arena_capacity: String,
    /// Age after which a live arena block is reported as a suspected leak.
    pub leak_age_ms: u64,

    pub precision: Precision,
    pub power_mode: PowerMode,
    pub accelerator_frequency_hz: u32,
    /// Largest model payload the accelerator accepts (e.g. `"16M"`).
    pub max_model_size: String,
    /// Directory holding `text-detection.bin` and `text-recognition.bin`.
    /// Synthetic payloads are used when unset.
    pub model_dir: Option<PathBuf>,

    /// Camera frame geometry (RGB565).
    pub frame_width: u16,
    pub frame_height: u16,
    /// Preprocessed image geometry fed to detection.
    pub input_width: u16,
    pub input_height: u16,
    /// Upper bound on regions recognized per cycle.
    pub max_regions: usize,

    /// A region is accepted only if its confidence is strictly above this.
    pub region_confidence_min: f32,
    /// Results below this confidence count as low-confidence.
    pub confidence_floor: f32,
    /// Accuracy target in percent.
    pub accuracy_floor_percent: f32,

    /// Per-cycle latency deadline.
    pub deadline_us: u64,
    /// Timeout applied to every accelerator run.
    pub inference_timeout_ms: u64,
    /// Control period between cycles (used by drivers of the loop).
    pub control_period_ms: u64,

    /// Consecutive failures that trigger recovery.
    pub error_threshold: u32,
    /// Inference passes in the startup and recovery self-test.
    pub self_test_iterations: u32,
    /// Cycles between periodic performance checks; 0 disables them.
    pub perf_check_interval: u64,
    /// Task id used in monitor reports.
    pub task_id: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            arena_capacity: "2.5M".to_string(),
            leak_age_ms: 30_000,
            precision: Precision::Int8,
            power_mode: PowerMode::HighPerformance,
            accelerator_frequency_hz: 1_000_000_000,
            max_model_size: "16M".to_string(),
            model_dir: None,
            frame_width: 640,
            frame_height: 480,
            input_width: 320,
            input_height: 240,
            max_regions: MAX_REGIONS,
            region_confidence_min: 0.5,
            confidence_floor: 0.95,
            accuracy_floor_percent: 95.0,
            deadline_us: 8_000,
            inference_timeout_ms: 10,
            control_period_ms: 20,
            error_threshold: 5,
            self_test_iterations: 3,
            perf_check_interval: 50,
            task_id: 3,
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, PipelineError> {
        toml::from_str(toml_str)
            .map_err(|e| PipelineError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, PipelineError> {
        toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("TOML serialise error: {e}")))
    }

    /// Checks ranges and cross-field constraints.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let fail = |msg: String| Err(PipelineError::Config(msg));

        self.parse_capacity()?;
        self.parse_max_model_size()?;

        for (name, value) in [
            ("region_confidence_min", self.region_confidence_min),
            ("confidence_floor", self.confidence_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return fail(format!("{name} must be in [0, 1], got {value}"));
            }
        }
        if !(0.0..=100.0).contains(&self.accuracy_floor_percent) {
            return fail(format!(
                "accuracy_floor_percent must be in [0, 100], got {}",
                self.accuracy_floor_percent
            ));
        }
        if self.input_width == 0 || self.input_height == 0 {
            return fail("input dimensions must be non-zero".into());
        }
        if self.frame_width < self.input_width || self.frame_height < self.input_height {
            return fail(format!(
                "frame {}x{} is smaller than input {}x{}",
                self.frame_width, self.frame_height, self.input_width, self.input_height
            ));
        }
        if self.max_regions == 0 || self.max_regions > MAX_REGIONS {
            return fail(format!("max_regions must be in 1..={MAX_REGIONS}"));
        }
        if self.deadline_us == 0 || self.inference_timeout_ms == 0 {
            return fail("deadline and inference timeout must be non-zero".into());
        }
        if self.error_threshold == 0 {
            return fail("error_threshold must be at least 1".into());
        }
        if self.self_test_iterations == 0 {
            return fail("self_test_iterations must be at least 1".into());
        }
        Ok(())
    }

    /// Parses the arena capacity string into a [`MemoryBudget`].
    pub fn parse_capacity(&self) -> Result<MemoryBudget, PipelineError> {
        MemoryBudget::parse(&self.arena_capacity)
            .map_err(|e| PipelineError::Config(format!("invalid arena capacity: {e}")))
    }

    pub fn parse_max_model_size(&self) -> Result<MemoryBudget, PipelineError> {
        MemoryBudget::parse(&self.max_model_size)
            .map_err(|e| PipelineError::Config(format!("invalid max model size: {e}")))
    }

    /// Settings handed to the accelerator driver at every init.
    pub fn device_settings(&self) -> Result<DeviceSettings, PipelineError> {
        Ok(DeviceSettings {
            frequency_hz: self.accelerator_frequency_hz,
            precision: self.precision,
            power_mode: self.power_mode,
            activation_memory_bytes: self.parse_capacity()?.as_bytes(),
            max_model_bytes: self.parse_max_model_size()?.as_bytes(),
            input_width: self.input_width,
            input_height: self.input_height,
        })
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_micros(self.deadline_us)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    pub fn control_period(&self) -> Duration {
        Duration::from_millis(self.control_period_ms)
    }

    pub fn leak_age(&self) -> Duration {
        Duration::from_millis(self.leak_age_ms)
    }

    /// Bytes in one camera frame.
    pub fn frame_bytes(&self) -> usize {
        self.frame_width as usize * self.frame_height as usize * 2
    }

    /// Bytes in one preprocessed image.
    pub fn input_bytes(&self) -> usize {
        self.input_width as usize * self.input_height as usize * 2
    }

    pub fn targets(&self) -> PerformanceTargets {
        PerformanceTargets {
            max_latency: self.deadline(),
            min_accuracy_percent: self.accuracy_floor_percent,
            min_confidence: self.confidence_floor,
        }
    }
}
