// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model identifiers and device settings.

use std::fmt;

/// The two networks the recognition pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelId {
    /// Finds text regions in the preprocessed frame.
    TextDetection,
    /// Reads the text inside one cropped region.
    TextRecognition,
}

impl ModelId {
    /// Every model, in load order.
    pub const ALL: [ModelId; 2] = [ModelId::TextDetection, ModelId::TextRecognition];

    /// Dense index for per-model tables.
    pub const fn index(self) -> usize {
        match self {
            ModelId::TextDetection => 0,
            ModelId::TextRecognition => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ModelId::TextDetection => "text-detection",
            ModelId::TextRecognition => "text-recognition",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Arithmetic mode the accelerator is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Int8,
    Int16,
    Float32,
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Precision::Int8 => "int8",
            Precision::Int16 => "int16",
            Precision::Float32 => "float32",
        })
    }
}

/// Power profile requested at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerMode {
    #[default]
    HighPerformance,
    Balanced,
    LowPower,
}

/// Configuration handed to the driver on every `init`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DeviceSettings {
    /// Accelerator clock in Hz.
    pub frequency_hz: u32,
    pub precision: Precision,
    pub power_mode: PowerMode,
    /// Activation memory the device may use, in bytes.
    pub activation_memory_bytes: usize,
    /// Largest model payload accepted by `load`, in bytes.
    pub max_model_bytes: usize,
    /// Detection model input size in pixels; region coordinates refer to it.
    pub input_width: u16,
    pub input_height: u16,
}

/// 16 MiB model storage.
pub const DEFAULT_MAX_MODEL_BYTES: usize = 16 * 1024 * 1024;

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            frequency_hz: 1_000_000_000,
            precision: Precision::Int8,
            power_mode: PowerMode::HighPerformance,
            activation_memory_bytes: 2_621_440,
            max_model_bytes: DEFAULT_MAX_MODEL_BYTES,
            input_width: 320,
            input_height: 240,
        }
    }
}
