// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Startup and post-recovery self-test.

use crate::cycle::infer;
use crate::io::Frame;
use crate::{PipelineConfig, PipelineError};
use accelerator::Accelerator;
use memory_manager::Arena;
use std::time::Duration;
use tokio::time::Instant;

/// Timing of a passed self-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SelfTestReport {
    pub iterations: u32,
    pub average: Duration,
    pub max: Duration,
}

/// Runs `config.self_test_iterations` full passes over `probe`.
///
/// Any failing pass fails the test, and so does an average latency above
/// the cycle deadline.
pub async fn run(
    arena: &Arena,
    npu: &mut Accelerator,
    config: &PipelineConfig,
    probe: &Frame,
) -> Result<SelfTestReport, PipelineError> {
    let iterations = config.self_test_iterations.max(1);
    let mut total = Duration::ZERO;
    let mut max = Duration::ZERO;

    for _ in 0..iterations {
        let start = Instant::now();
        infer(arena, npu, config, probe, 0).await?;
        let elapsed = start.elapsed();
        total += elapsed;
        max = max.max(elapsed);
    }

    let average = total / iterations;
    let deadline = config.deadline();
    if average > deadline {
        return Err(PipelineError::SelfTestTooSlow { average, deadline });
    }

    tracing::info!(
        "self-test passed: {iterations} passes, avg {:.2} ms, max {:.2} ms",
        average.as_secs_f64() * 1000.0,
        max.as_secs_f64() * 1000.0,
    );
    Ok(SelfTestReport {
        iterations,
        average,
        max,
    })
}
