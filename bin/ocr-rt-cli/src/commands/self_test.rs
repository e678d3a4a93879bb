// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

use super::{demo_pipeline, ms};
use ocr_pipeline::PipelineConfig;
use std::time::Duration;

pub async fn execute(config: PipelineConfig, latency_ms: u64) -> anyhow::Result<()> {
    let mut demo = demo_pipeline(config.clone(), Duration::from_millis(latency_ms))?;

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║                    ocr-rt · Self-Test                    ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    match demo.pipeline.start().await {
        Ok(report) => {
            println!("  Status:         PASS");
            println!("  Passes:         {}", report.iterations);
            println!("  Average:        {:.2} ms", ms(report.average));
            println!("  Max:            {:.2} ms", ms(report.max));
            println!("  Deadline:       {:.2} ms", ms(config.deadline()));
            let npu = demo.pipeline.accelerator();
            println!("  Accelerator:    {} ({}% busy)", npu.driver_name(), npu.utilization());
            println!("  Arena:          {}", demo.pipeline.arena().stats().summary());
            demo.pipeline.shutdown().await?;
            Ok(())
        }
        Err(e) => {
            println!("  Status:         FAIL");
            println!("  State:          {}", demo.pipeline.state());
            println!("  Error:          {e}");
            Err(e.into())
        }
    }
}
