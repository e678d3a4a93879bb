// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for preprocessing and the full inference cycle.

use accelerator::SimulatedDriver;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ocr_pipeline::preprocess::{downsample_rgb565, rgb565_len};
use ocr_pipeline::{
    ChannelSink, Orchestrator, PipelineConfig, SyntheticCamera, TracingMonitor,
};
use std::sync::Arc;
use std::time::Duration;

fn bench_downsample(c: &mut Criterion) {
    let mut group = c.benchmark_group("downsample_rgb565");
    for (w, h) in [(640usize, 480usize), (320, 240)] {
        let src = vec![0x5Au8; rgb565_len(w, h)];
        let mut dst = vec![0u8; rgb565_len(w / 2, h / 2)];
        group.bench_with_input(BenchmarkId::from_parameter(format!("{w}x{h}")), &src, |b, src| {
            b.iter(|| downsample_rgb565(src, w, h, &mut dst, w / 2, h / 2))
        });
    }
    group.finish();
}

fn bench_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    let config = PipelineConfig {
        // The simulated accelerator adds no latency; only host work is timed.
        deadline_us: 1_000_000,
        perf_check_interval: 0,
        ..PipelineConfig::default()
    };
    let camera = SyntheticCamera::new(config.frame_width, config.frame_height, 2);
    let (sink, mut results) = ChannelSink::bounded(1);
    let mut pipeline = Orchestrator::new(
        config,
        Box::new(SimulatedDriver::demo(Duration::ZERO)),
        Box::new(camera),
        Box::new(sink),
        Arc::new(TracingMonitor),
    )
    .unwrap();
    rt.block_on(pipeline.start()).unwrap();

    c.bench_function("run_cycle_640x480_two_regions", |b| {
        b.iter(|| {
            rt.block_on(pipeline.run_cycle()).unwrap();
            while results.try_recv().is_ok() {}
        })
    });
}

criterion_group!(benches, bench_downsample, bench_cycle);
criterion_main!(benches);
