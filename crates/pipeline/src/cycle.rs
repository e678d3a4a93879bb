// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! One inference pass over a frame: downsample, detect, crop, recognize,
//! aggregate.
//!
//! Every intermediate buffer is a [`ScopedBlock`](memory_manager::ScopedBlock)
//! from the arena, so an early return through `?` frees them all and the
//! arena is back to its starting level after every call.

use crate::io::Frame;
use crate::preprocess::{crop_len, crop_rgb565, downsample_rgb565};
use crate::region::{Aggregator, DetectedRegions, RecognitionResult};
use crate::{CycleResult, PipelineConfig, PipelineError, MAX_REGIONS};
use accelerator::wire::{detection_capacity, DetectionOutput, RecognitionOutput, RECOGNITION_CAPACITY};
use accelerator::{Accelerator, AcceleratorError, ModelId};
use memory_manager::Arena;

/// What one inference pass produced.
#[derive(Debug, Clone, Copy)]
pub struct CycleReport {
    /// `None` when no region passed the confidence filter.
    pub result: Option<CycleResult>,
    pub detected: usize,
    pub accepted: usize,
}

/// Runs detection and recognition over `frame`.
///
/// Any accelerator error, including a timeout on a single region, fails
/// the whole pass.
pub async fn infer(
    arena: &Arena,
    npu: &mut Accelerator,
    config: &PipelineConfig,
    frame: &Frame,
    timestamp_us: u64,
) -> Result<CycleReport, PipelineError> {
    if frame.width() != config.frame_width || frame.height() != config.frame_height {
        return Err(PipelineError::InvalidInput(format!(
            "frame {} is {}x{}, expected {}x{}",
            frame.id(),
            frame.width(),
            frame.height(),
            config.frame_width,
            config.frame_height,
        )));
    }
    let timeout = config.inference_timeout();
    let (iw, ih) = (config.input_width as usize, config.input_height as usize);

    let mut input = arena.allocate_scoped(config.input_bytes())?;
    downsample_rgb565(
        frame.data(),
        frame.width() as usize,
        frame.height() as usize,
        input.bytes_mut()?,
        iw,
        ih,
    )?;

    let mut scratch = arena.allocate_scoped(detection_capacity(MAX_REGIONS))?;
    let n = npu
        .run(ModelId::TextDetection, input.bytes()?, scratch.bytes_mut()?, timeout)
        .await?;
    let detection = DetectionOutput::parse(&scratch.bytes()?[..n]).map_err(AcceleratorError::from)?;
    let regions = DetectedRegions::collect(detection.regions(), config.max_regions);
    scratch.release()?;

    if regions.dropped() > 0 {
        tracing::debug!(
            "frame {}: {} regions beyond the cap of {} ignored",
            frame.id(),
            regions.dropped(),
            config.max_regions,
        );
    }

    let mut output = arena.allocate_scoped(RECOGNITION_CAPACITY)?;
    let mut aggregator = Aggregator::new(config.region_confidence_min);
    for region in regions.iter() {
        let len = crop_len(region, iw, ih);
        if len == 0 {
            tracing::debug!(
                "frame {}: region at ({}, {}) lies outside the image",
                frame.id(),
                region.x,
                region.y
            );
            continue;
        }
        let mut crop = arena.allocate_scoped(len)?;
        crop_rgb565(input.bytes()?, iw, ih, region, crop.bytes_mut()?)?;

        let n = npu
            .run(ModelId::TextRecognition, crop.bytes()?, output.bytes_mut()?, timeout)
            .await?;
        let read = RecognitionOutput::parse(&output.bytes()?[..n]).map_err(AcceleratorError::from)?;
        aggregator.offer(&RecognitionResult::new(read.text, read.confidence));
        crop.release()?;
    }
    output.release()?;
    input.release()?;

    if aggregator.truncated() {
        tracing::debug!("frame {}: aggregated text truncated", frame.id());
    }
    let accepted = aggregator.accepted();
    Ok(CycleReport {
        result: aggregator.finish(regions.len(), frame.id(), timestamp_us),
        detected: regions.len(),
        accepted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use accelerator::{Fault, ScriptedRegion, SimulatedDriver, SimulatorControl};
    use memory_manager::MemoryBudget;
    use std::sync::Arc;
    use std::time::Duration;

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            frame_width: 64,
            frame_height: 48,
            input_width: 32,
            input_height: 24,
            ..PipelineConfig::default()
        }
    }

    async fn ready(script: Vec<ScriptedRegion>) -> (Accelerator, Arc<SimulatorControl>) {
        let driver = SimulatedDriver::new(Duration::from_millis(1)).with_script(script);
        let control = driver.control();
        let settings = small_config().device_settings().unwrap();
        let mut npu = Accelerator::new(Box::new(driver), settings);
        npu.init().await.unwrap();
        for model in ModelId::ALL {
            npu.load(model, &[1; 16]).await.unwrap();
        }
        (npu, control)
    }

    #[tokio::test(start_paused = true)]
    async fn test_aggregates_accepted_regions() {
        let (mut npu, _) = ready(vec![
            ScriptedRegion::new("出口", 0.92),
            ScriptedRegion::new("noise", 0.40),
            ScriptedRegion::new("EXIT", 0.97),
        ])
        .await;
        let arena = Arena::new(MemoryBudget::from_kb(64)).unwrap();
        let config = small_config();
        let frame = Frame::filled(7, 64, 48, 0x80);

        let report = infer(&arena, &mut npu, &config, &frame, 100).await.unwrap();
        assert_eq!(report.detected, 3);
        assert_eq!(report.accepted, 2);
        let result = report.result.unwrap();
        assert_eq!(result.text.as_str(), "出口 EXIT");
        assert_eq!(result.frame_id, 7);
        assert_eq!(result.timestamp_us, 100);
        assert_eq!(arena.allocated_bytes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_regions_gives_empty_report() {
        let (mut npu, _) = ready(Vec::new()).await;
        let arena = Arena::new(MemoryBudget::from_kb(64)).unwrap();
        let report = infer(&arena, &mut npu, &small_config(), &Frame::filled(0, 64, 48, 0), 0)
            .await
            .unwrap();
        assert!(report.result.is_none());
        assert_eq!(report.detected, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_more_regions_than_buffer_holds() {
        let script = (0..17).map(|_| ScriptedRegion::new("R", 0.9)).collect();
        let (mut npu, control) = ready(script).await;
        let arena = Arena::new(MemoryBudget::from_kb(64)).unwrap();

        let report = infer(&arena, &mut npu, &small_config(), &Frame::filled(3, 64, 48, 0), 0)
            .await
            .unwrap();
        assert_eq!(report.detected, MAX_REGIONS);
        assert_eq!(report.accepted, MAX_REGIONS);
        assert_eq!(report.result.unwrap().region_count, MAX_REGIONS);
        assert_eq!(control.run_calls(), 1 + MAX_REGIONS as u32);
        assert_eq!(arena.allocated_bytes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_off_image_region_does_not_shift_texts() {
        let (mut npu, control) = ready(vec![
            ScriptedRegion::new("GHOST", 0.9).at(1000, 1000, 16, 8),
            ScriptedRegion::new("real", 0.3),
        ])
        .await;
        let arena = Arena::new(MemoryBudget::from_kb(64)).unwrap();

        let report = infer(&arena, &mut npu, &small_config(), &Frame::filled(4, 64, 48, 0), 0)
            .await
            .unwrap();
        assert_eq!(report.detected, 1);
        assert_eq!(report.accepted, 0);
        assert!(report.result.is_none());
        assert_eq!(control.run_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_frame_size_rejected() {
        let (mut npu, control) = ready(vec![ScriptedRegion::new("A", 0.9)]).await;
        let arena = Arena::new(MemoryBudget::from_kb(64)).unwrap();
        let err = infer(&arena, &mut npu, &small_config(), &Frame::filled(0, 32, 24, 0), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(control.run_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_accelerator_errors_fail_pass_and_free_scratch() {
        let (mut npu, control) = ready(vec![
            ScriptedRegion::new("A", 0.9),
            ScriptedRegion::new("B", 0.9),
        ])
        .await;
        let arena = Arena::new(MemoryBudget::from_kb(64)).unwrap();
        let config = small_config();

        control.queue_faults(1, Fault::Error(-7));
        let err = infer(&arena, &mut npu, &config, &Frame::filled(0, 64, 48, 0), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Accelerator(AcceleratorError::RunFailed { .. })));
        assert_eq!(arena.allocated_bytes(), 0);

        let report = infer(&arena, &mut npu, &config, &Frame::filled(1, 64, 48, 0), 0)
            .await
            .unwrap();
        assert_eq!(report.accepted, 2);

        control.set_persistent_fault(Some(Fault::Hang));
        let err = infer(&arena, &mut npu, &config, &Frame::filled(2, 64, 48, 0), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Accelerator(AcceleratorError::Timeout { .. })));
        assert_eq!(arena.allocated_bytes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arena_too_small() {
        let (mut npu, _) = ready(vec![ScriptedRegion::new("A", 0.9)]).await;
        let arena = Arena::new(MemoryBudget::from_bytes(512)).unwrap();
        let err = infer(&arena, &mut npu, &small_config(), &Frame::filled(0, 64, 48, 0), 0)
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::codes::MEMORY_ALLOC_FAILED);
    }
}
