// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model payloads handed to the accelerator at load time.
//!
//! [`ModelStore`] provides two modes:
//!
//! 1. **File-backed**: maps `{model_dir}/text-detection.bin` and
//!    `{model_dir}/text-recognition.bin` with `memmap2`. Payloads are opened
//!    once and re-sent on every reload after a recovery.
//! 2. **Synthetic**: fixed placeholder payloads for the simulated driver,
//!    tests and benchmarks.

use crate::PipelineError;
use accelerator::ModelId;
use std::path::{Path, PathBuf};

/// Size of each synthetic payload.
const SYNTHETIC_PAYLOAD_BYTES: usize = 4096;

enum Payload {
    Mapped(memmap2::Mmap),
    /// Zero-length file; the accelerator rejects it at load.
    Empty,
    Synthetic(Vec<u8>),
}

impl Payload {
    fn as_slice(&self) -> &[u8] {
        match self {
            Payload::Mapped(mmap) => mmap,
            Payload::Empty => &[],
            Payload::Synthetic(bytes) => bytes,
        }
    }
}

/// The detection and recognition payloads, indexed by [`ModelId`].
pub struct ModelStore {
    model_dir: Option<PathBuf>,
    payloads: [Payload; 2],
}

impl ModelStore {
    /// Maps both model files from `model_dir`.
    pub fn open(model_dir: &Path) -> Result<Self, PipelineError> {
        let payloads = [
            map_model(model_dir, ModelId::TextDetection)?,
            map_model(model_dir, ModelId::TextRecognition)?,
        ];
        Ok(Self {
            model_dir: Some(model_dir.to_path_buf()),
            payloads,
        })
    }

    /// Placeholder payloads; no files are touched.
    pub fn synthetic() -> Self {
        let payload = |model: ModelId| {
            let seed = model.index() as u8;
            Payload::Synthetic(
                (0..SYNTHETIC_PAYLOAD_BYTES)
                    .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
                    .collect(),
            )
        };
        Self {
            model_dir: None,
            payloads: [payload(ModelId::TextDetection), payload(ModelId::TextRecognition)],
        }
    }

    /// Opens `model_dir` when given, otherwise falls back to synthetic payloads.
    pub fn from_dir(model_dir: Option<&Path>) -> Result<Self, PipelineError> {
        match model_dir {
            Some(dir) => Self::open(dir),
            None => {
                tracing::warn!("no model directory configured, using synthetic payloads");
                Ok(Self::synthetic())
            }
        }
    }

    pub fn payload(&self, model: ModelId) -> &[u8] {
        self.payloads[model.index()].as_slice()
    }

    /// Returns `true` if payloads come from files.
    pub fn is_file_backed(&self) -> bool {
        self.model_dir.is_some()
    }

    pub fn model_dir(&self) -> Option<&Path> {
        self.model_dir.as_deref()
    }
}

/// Path of `model`'s payload inside `model_dir`.
pub fn model_path(model_dir: &Path, model: ModelId) -> PathBuf {
    model_dir.join(format!("{}.bin", model.name()))
}

fn map_model(model_dir: &Path, model: ModelId) -> Result<Payload, PipelineError> {
    let path = model_path(model_dir, model);
    let file_error = |detail: String| PipelineError::ModelFile { model, detail };

    let file = std::fs::File::open(&path)
        .map_err(|e| file_error(format!("cannot open '{}': {e}", path.display())))?;
    let len = file
        .metadata()
        .map_err(|e| file_error(format!("cannot stat '{}': {e}", path.display())))?
        .len();
    if len == 0 {
        tracing::warn!("model file '{}' is empty", path.display());
        return Ok(Payload::Empty);
    }

    // SAFETY: the mapping is read-only and model files are not modified
    // while the runtime is up.
    let mmap = unsafe { memmap2::Mmap::map(&file) }
        .map_err(|e| file_error(format!("mmap failed: {e}")))?;
    tracing::info!(
        "model store: mmap'd {} ({:.2} MB)",
        path.display(),
        mmap.len() as f64 / (1024.0 * 1024.0),
    );
    Ok(Payload::Mapped(mmap))
}

impl std::fmt::Debug for ModelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStore")
            .field("model_dir", &self.model_dir)
            .field("detection_bytes", &self.payload(ModelId::TextDetection).len())
            .field("recognition_bytes", &self.payload(ModelId::TextRecognition).len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_mode() {
        let store = ModelStore::synthetic();
        assert!(!store.is_file_backed());
        for model in ModelId::ALL {
            assert_eq!(store.payload(model).len(), SYNTHETIC_PAYLOAD_BYTES);
        }
        assert_ne!(
            store.payload(ModelId::TextDetection),
            store.payload(ModelId::TextRecognition)
        );
    }

    #[test]
    fn test_file_backed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(model_path(dir.path(), ModelId::TextDetection), [1u8; 100]).unwrap();
        std::fs::write(model_path(dir.path(), ModelId::TextRecognition), [2u8; 50]).unwrap();

        let store = ModelStore::open(dir.path()).unwrap();
        assert!(store.is_file_backed());
        assert_eq!(store.payload(ModelId::TextDetection), &[1u8; 100][..]);
        assert_eq!(store.payload(ModelId::TextRecognition).len(), 50);
    }

    #[test]
    fn test_empty_file_gives_empty_payload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(model_path(dir.path(), ModelId::TextDetection), []).unwrap();
        std::fs::write(model_path(dir.path(), ModelId::TextRecognition), [2u8; 8]).unwrap();

        let store = ModelStore::open(dir.path()).unwrap();
        assert!(store.payload(ModelId::TextDetection).is_empty());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelStore::open(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ModelFile {
                model: ModelId::TextDetection,
                ..
            }
        ));
        assert_eq!(err.code(), crate::codes::MODEL_LOAD_FAILED);
    }
}
