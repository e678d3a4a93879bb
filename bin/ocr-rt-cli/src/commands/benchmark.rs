// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

use super::{demo_pipeline, ms};
use anyhow::Context;
use ocr_pipeline::PipelineConfig;
use std::time::Duration;

pub async fn execute(
    config: PipelineConfig,
    latencies: String,
    iterations: u32,
) -> anyhow::Result<()> {
    let latencies: Vec<u64> = latencies
        .split(',')
        .map(|s| s.trim().parse::<u64>())
        .collect::<Result<_, _>>()
        .context("latencies must be comma-separated milliseconds")?;

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║                ocr-rt · Latency Benchmark                ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();
    println!("  Config:");
    println!("    Deadline:       {:.1} ms", ms(config.deadline()));
    println!("    Iterations:     {iterations}");
    println!("    NPU latencies:  {latencies:?} ms");
    println!();

    // ── Results Table ──
    println!(
        "  {:<10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "NPU (ms)", "Min (ms)", "Avg (ms)", "Max (ms)", "Failures", "Deadline"
    );
    println!("  {}", "-".repeat(66));

    for latency_ms in latencies {
        let mut demo = demo_pipeline(config.clone(), Duration::from_millis(latency_ms))?;
        if let Err(e) = demo.pipeline.start().await {
            println!("  {:<10} {:>10}", latency_ms, format!("start failed: {e}"));
            continue;
        }

        let report = demo.pipeline.benchmark(iterations).await?;
        let met = report.max <= config.deadline() && report.failures == 0;
        println!(
            "  {:<10} {:>10.2} {:>10.2} {:>10.2} {:>10} {:>10}",
            latency_ms,
            ms(report.min),
            ms(report.average),
            ms(report.max),
            report.failures,
            if met { "✓" } else { "✗" }
        );

        demo.pipeline.shutdown().await?;
    }

    println!();
    Ok(())
}
