// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

use ocr_pipeline::PipelineConfig;

/// Prints the validated configuration as TOML.
pub fn execute(config: PipelineConfig) -> anyhow::Result<()> {
    let budget = config.parse_capacity()?;
    println!("# arena: {} bytes", budget.as_bytes());
    println!("# frame: {} bytes, model input: {} bytes", config.frame_bytes(), config.input_bytes());
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}
