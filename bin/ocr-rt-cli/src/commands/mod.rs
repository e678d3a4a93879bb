// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

pub mod benchmark;
pub mod config;
pub mod run;
pub mod self_test;

use accelerator::{SimulatedDriver, SimulatorControl};
use ocr_pipeline::{
    ChannelSink, CycleResult, Orchestrator, PipelineConfig, SyntheticCamera, TracingMonitor,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// The file's configuration, or the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let config = match path {
        Some(path) => {
            tracing::info!("loading configuration from {}", path.display());
            PipelineConfig::from_file(path)?
        }
        None => PipelineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// An orchestrator over the demo accelerator and a two-buffer camera.
pub struct Demo {
    pub pipeline: Orchestrator,
    pub npu: Arc<SimulatorControl>,
    pub results: mpsc::Receiver<CycleResult>,
}

pub fn demo_pipeline(config: PipelineConfig, latency: Duration) -> anyhow::Result<Demo> {
    let driver = SimulatedDriver::demo(latency);
    let npu = driver.control();
    let camera = SyntheticCamera::new(config.frame_width, config.frame_height, 2);
    let (sink, results) = ChannelSink::bounded(16);
    let pipeline = Orchestrator::new(
        config,
        Box::new(driver),
        Box::new(camera),
        Box::new(sink),
        Arc::new(TracingMonitor),
    )?;
    Ok(Demo {
        pipeline,
        npu,
        results,
    })
}

pub fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
