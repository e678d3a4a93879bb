// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Facade behaviour against the simulated driver.

use accelerator::simulated::status;
use accelerator::wire::{detection_capacity, DetectionOutput, RECOGNITION_CAPACITY};
use accelerator::{
    Accelerator, AcceleratorError, DeviceSettings, Fault, ModelId, ScriptedRegion,
    SimulatedDriver, SimulatorControl,
};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_millis(10);

fn accelerator(latency_ms: u64) -> (Accelerator, Arc<SimulatorControl>) {
    let driver = SimulatedDriver::new(Duration::from_millis(latency_ms))
        .with_script(vec![ScriptedRegion::new("STOP", 0.99)]);
    let control = driver.control();
    (
        Accelerator::new(Box::new(driver), DeviceSettings::default()),
        control,
    )
}

async fn ready(latency_ms: u64) -> (Accelerator, Arc<SimulatorControl>) {
    let (mut npu, control) = accelerator(latency_ms);
    npu.init().await.unwrap();
    for model in ModelId::ALL {
        npu.load(model, b"weights").await.unwrap();
    }
    (npu, control)
}

#[tokio::test(start_paused = true)]
async fn test_init_failure_is_surfaced_once() {
    let (mut npu, control) = accelerator(1);
    control.set_fail_init(true);

    let err = npu.init().await.unwrap_err();
    assert!(matches!(
        err,
        AcceleratorError::InitFailed(fault) if fault.code == status::INIT_FAILED
    ));
    assert_eq!(control.init_calls(), 1);
    assert!(!npu.is_initialized());
}

#[tokio::test(start_paused = true)]
async fn test_load_validates_payload() {
    let (mut npu, _) = accelerator(1);
    assert_eq!(
        npu.load(ModelId::TextDetection, b"x").await.unwrap_err(),
        AcceleratorError::NotInitialized
    );

    npu.init().await.unwrap();
    assert_eq!(
        npu.load(ModelId::TextDetection, &[]).await.unwrap_err(),
        AcceleratorError::EmptyModel(ModelId::TextDetection)
    );

    let oversized = vec![0u8; DeviceSettings::default().max_model_bytes + 1];
    assert!(matches!(
        npu.load(ModelId::TextRecognition, &oversized).await,
        Err(AcceleratorError::ModelTooLarge { model: ModelId::TextRecognition, .. })
    ));
    assert!(!npu.is_ready(ModelId::TextRecognition));

    npu.load(ModelId::TextRecognition, b"weights").await.unwrap();
    assert!(npu.is_ready(ModelId::TextRecognition));
    assert_eq!(npu.model_size(ModelId::TextRecognition), 7);
}

#[tokio::test(start_paused = true)]
async fn test_run_requires_loaded_model() {
    let (mut npu, control) = accelerator(1);
    npu.init().await.unwrap();

    let mut out = [0u8; 64];
    assert_eq!(
        npu.run(ModelId::TextDetection, &[1], &mut out, TIMEOUT)
            .await
            .unwrap_err(),
        AcceleratorError::ModelNotLoaded(ModelId::TextDetection)
    );
    assert_eq!(control.run_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_writes_parseable_detection() {
    let (mut npu, _) = ready(3).await;
    let mut out = [0u8; detection_capacity(16)];

    let start = tokio::time::Instant::now();
    let n = npu
        .run(ModelId::TextDetection, &[0x80; 32], &mut out, TIMEOUT)
        .await
        .unwrap();
    assert_eq!(start.elapsed(), Duration::from_millis(3));

    let detection = DetectionOutput::parse(&out[..n]).unwrap();
    assert_eq!(detection.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hang_becomes_distinct_timeout() {
    let (mut npu, control) = ready(1).await;
    control.queue_faults(1, Fault::Hang);

    let mut out = [0u8; RECOGNITION_CAPACITY];
    let start = tokio::time::Instant::now();
    let err = npu
        .run(ModelId::TextRecognition, &[1], &mut out, TIMEOUT)
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(start.elapsed(), TIMEOUT);

    // The stalled call is abandoned; the next one proceeds normally.
    assert!(npu
        .run(ModelId::TextRecognition, &[1], &mut out, TIMEOUT)
        .await
        .is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_slow_driver_times_out() {
    let (mut npu, _) = ready(12).await;
    let mut out = [0u8; 64];
    assert!(matches!(
        npu.run(ModelId::TextDetection, &[1], &mut out, TIMEOUT).await,
        Err(AcceleratorError::Timeout { model: ModelId::TextDetection, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_driver_fault_is_mapped() {
    let (mut npu, control) = ready(1).await;
    control.queue_faults(1, Fault::Error(-42));

    let mut out = [0u8; 64];
    let err = npu
        .run(ModelId::TextDetection, &[1], &mut out, TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AcceleratorError::RunFailed { fault, .. } if fault.code == -42
    ));
    assert!(!err.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_power_cycle_requires_reinit_and_reload() {
    let (mut npu, control) = ready(1).await;
    npu.power_cycle().await.unwrap();

    assert!(!npu.is_initialized());
    assert!(!npu.is_ready(ModelId::TextDetection));
    assert_eq!(npu.utilization(), 0);

    npu.init().await.unwrap();
    for model in ModelId::ALL {
        npu.load(model, b"weights").await.unwrap();
    }
    assert!(npu.is_ready(ModelId::TextDetection));
    assert_eq!(control.power_cycles(), 1);
    assert_eq!(control.init_calls(), 2);
    assert_eq!(npu.utilization(), 40);
}

#[tokio::test(start_paused = true)]
async fn test_unload_is_idempotent() {
    let (mut npu, control) = ready(1).await;
    npu.unload(ModelId::TextDetection).await.unwrap();
    npu.unload(ModelId::TextDetection).await.unwrap();
    assert_eq!(control.unload_calls(), 1);
    assert!(!npu.is_ready(ModelId::TextDetection));
}
