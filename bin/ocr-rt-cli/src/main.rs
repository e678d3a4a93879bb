// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # ocr-rt
//!
//! Command-line driver for the OCR runtime on a host machine. Every command
//! runs against the simulated accelerator and a synthetic camera.
//!
//! ## Usage
//! ```bash
//! # Run 200 cycles, injecting 5 accelerator faults to exercise recovery
//! ocr-rt run --cycles 200 --inject-faults 5
//!
//! # Sweep simulated accelerator latencies against the deadline
//! ocr-rt benchmark --latencies 1,2,3,4,5 --iterations 100
//!
//! # Start the pipeline and run the self-test
//! ocr-rt self-test
//!
//! # Print the effective configuration
//! ocr-rt --config ocr.toml config
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ocr-rt",
    about = "Deadline-bounded OCR inference runtime",
    version,
    author
)]
struct Cli {
    /// Path to a TOML pipeline configuration file.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for a number of cycles and print a summary.
    Run {
        /// Number of cycles to run.
        #[arg(short = 'n', long, default_value_t = 100)]
        cycles: u64,

        /// Simulated accelerator latency per inference, in milliseconds.
        #[arg(short, long, default_value_t = 2)]
        latency_ms: u64,

        /// Accelerator faults to inject after startup.
        #[arg(long, default_value_t = 0)]
        inject_faults: usize,

        /// Pace cycles at the configured control period.
        #[arg(long)]
        realtime: bool,

        /// Print the final state dump as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Benchmark the inference pass across simulated accelerator latencies.
    Benchmark {
        /// Comma-separated latencies in milliseconds (e.g., "1,2,3,4").
        #[arg(long, default_value = "1,2,3,4,5")]
        latencies: String,

        /// Inference passes per latency.
        #[arg(short, long, default_value_t = 100)]
        iterations: u32,
    },

    /// Start the pipeline and run the self-test.
    SelfTest {
        /// Simulated accelerator latency per inference, in milliseconds.
        #[arg(short, long, default_value_t = 2)]
        latency_ms: u64,
    },

    /// Validate and print the effective configuration as TOML.
    Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            cycles,
            latency_ms,
            inject_faults,
            realtime,
            json,
        } => {
            commands::run::execute(config, cycles, latency_ms, inject_faults, realtime, json).await
        }
        Commands::Benchmark {
            latencies,
            iterations,
        } => commands::benchmark::execute(config, latencies, iterations).await,
        Commands::SelfTest { latency_ms } => commands::self_test::execute(config, latency_ms).await,
        Commands::Config => commands::config::execute(config),
    }
}
