// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

use super::{demo_pipeline, ms};
use accelerator::Fault;
use ocr_pipeline::{CycleOutcome, PipelineConfig, PipelineState, RecoveryOutcome};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Results printed in full before the run goes quiet.
const SHOWN_RESULTS: usize = 5;

pub async fn execute(
    config: PipelineConfig,
    cycles: u64,
    latency_ms: u64,
    inject_faults: usize,
    realtime: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut demo = demo_pipeline(config.clone(), Duration::from_millis(latency_ms))?;

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║                  ocr-rt · Simulated Run                  ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();
    println!("  Config:");
    println!("    Frame:          {}x{}", config.frame_width, config.frame_height);
    println!("    Model input:    {}x{}", config.input_width, config.input_height);
    println!("    Arena:          {}", config.arena_capacity);
    println!("    Deadline:       {:.1} ms", ms(config.deadline()));
    println!("    NPU latency:    {latency_ms} ms");
    println!("    Cycles:         {cycles}");
    println!();

    let report = demo.pipeline.start().await?;
    println!(
        "  Self-test: {} passes, avg {:.2} ms, max {:.2} ms",
        report.iterations,
        ms(report.average),
        ms(report.max)
    );
    if inject_faults > 0 {
        demo.npu.queue_faults(inject_faults, Fault::Error(-7));
        println!("  Injected {inject_faults} accelerator faults");
    }
    println!();

    let mut ticker = tokio::time::interval(config.control_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut shown = 0;
    let mut published = 0u64;
    let mut recoveries = 0u32;
    for _ in 0..cycles {
        if realtime {
            ticker.tick().await;
        }
        match demo.pipeline.run_cycle().await? {
            CycleOutcome::Failed {
                code,
                consecutive_errors,
                recovery,
            } => {
                println!("  ✗ cycle failed: code {code} (streak {consecutive_errors})");
                match recovery {
                    RecoveryOutcome::Recovered => {
                        recoveries += 1;
                        println!("  ↻ accelerator recovered");
                    }
                    RecoveryOutcome::Failed => println!("  ⚠ recovery failed"),
                    RecoveryOutcome::NotAttempted => {}
                }
            }
            CycleOutcome::Halted => {
                println!("  ⚠ pipeline halted in {}, stopping", demo.pipeline.state());
                break;
            }
            _ => {}
        }

        while let Ok(result) = demo.results.try_recv() {
            published += 1;
            if shown < SHOWN_RESULTS {
                shown += 1;
                println!(
                    "  #{:<6} \"{}\" conf {:.2} ({} of {} regions, {:?})",
                    result.frame_id,
                    result.text,
                    result.confidence,
                    result.region_count,
                    result.detected_count,
                    result.language,
                );
            }
        }
    }

    // ── Summary ──
    let stats = demo.pipeline.stats();
    let targets = demo.pipeline.performance_check();
    println!();
    println!("  {:<22} {:>12}", "Metric", "Value");
    println!("  {}", "-".repeat(36));
    println!("  {:<22} {:>12}", "Cycles", stats.total_cycles);
    println!("  {:<22} {:>12}", "Successful", stats.successful_cycles);
    println!("  {:<22} {:>12}", "Failed", stats.failed_cycles);
    println!("  {:<22} {:>12}", "Published", published);
    println!("  {:<22} {:>12}", "Recoveries", recoveries);
    println!("  {:<22} {:>10.2}ms", "Latency min", ms(stats.min_latency));
    println!("  {:<22} {:>10.2}ms", "Latency avg", ms(stats.avg_latency));
    println!("  {:<22} {:>10.2}ms", "Latency max", ms(stats.max_latency));
    println!("  {:<22} {:>12}", "Deadline misses", stats.deadline_violations);
    println!("  {:<22} {:>12.3}", "Avg confidence", stats.average_confidence);
    println!("  {:<22} {:>10}KB", "Arena peak", stats.arena.peak_bytes / 1024);
    println!();
    println!(
        "  Targets: latency {} | accuracy {} | confidence {}",
        mark(targets.latency_met),
        mark(targets.accuracy_met),
        mark(targets.confidence_met)
    );

    if json {
        println!();
        println!("{}", serde_json::to_string_pretty(&demo.pipeline.dump_state())?);
    }

    if demo.pipeline.state() != PipelineState::Idle {
        demo.pipeline.shutdown().await?;
    }
    Ok(())
}

fn mark(met: bool) -> &'static str {
    if met {
        "✓"
    } else {
        "✗"
    }
}
