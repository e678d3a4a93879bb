// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! An in-process accelerator for tests, demos and benchmarks.
//!
//! [`SimulatedDriver`] sleeps for a fixed latency per `run` (on the tokio
//! clock, so paused-time tests are deterministic) and answers from a script.
//! Detection reports the scripted regions that overlap the model input, as
//! many as the output buffer holds, and the n-th recognition call after it
//! answers with the text of the n-th reported region. Faults are injected through a
//! shared [`SimulatorControl`] handle that stays with the test after the
//! driver is boxed into an [`Accelerator`](crate::Accelerator).

use crate::wire::{self, Orientation, RegionRecord};
use crate::{AcceleratorDriver, DeviceSettings, DriverFault, ModelId};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Status codes the simulator reports, mirroring a typical NPU SDK.
pub mod status {
    pub const INIT_FAILED: i32 = -101;
    pub const NOT_INITIALIZED: i32 = -102;
    pub const MODEL_MISSING: i32 = -103;
    pub const OUTPUT_OVERFLOW: i32 = -104;
    pub const POWER_FAILED: i32 = -105;
}

/// A failure the simulator produces on `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Never completes; only a timeout ends the call.
    Hang,
    /// Fails immediately with the given status code.
    Error(i32),
}

/// One region the simulator "sees" in every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedRegion {
    pub region: RegionRecord,
    /// Text returned when this region is recognized.
    pub text: String,
    /// Recognition confidence for `text`.
    pub confidence: f32,
}

impl ScriptedRegion {
    /// A horizontal region where detection and recognition share one confidence.
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            region: RegionRecord {
                x: 0,
                y: 0,
                width: 16,
                height: 8,
                confidence,
                orientation: Orientation::Horizontal,
            },
            text: text.to_string(),
            confidence,
        }
    }

    /// Places the region inside the preprocessed image.
    pub fn at(mut self, x: u16, y: u16, width: u16, height: u16) -> Self {
        self.region.x = x;
        self.region.y = y;
        self.region.width = width;
        self.region.height = height;
        self
    }
}

/// Shared knobs and counters for a [`SimulatedDriver`].
#[derive(Debug, Default)]
pub struct SimulatorControl {
    init_calls: AtomicU32,
    load_calls: AtomicU32,
    unload_calls: AtomicU32,
    run_calls: AtomicU32,
    power_cycles: AtomicU32,
    fail_init: AtomicBool,
    fail_power_cycle: AtomicBool,
    utilization: AtomicU8,
    /// Added to the fixed latency of every run, in microseconds.
    extra_latency_us: AtomicU64,
    queued_faults: Mutex<VecDeque<Fault>>,
    persistent_fault: Mutex<Option<Fault>>,
}

impl SimulatorControl {
    /// Makes the next `count` runs fail with `fault`.
    pub fn queue_faults(&self, count: usize, fault: Fault) {
        if let Ok(mut queue) = self.queued_faults.lock() {
            queue.extend(std::iter::repeat(fault).take(count));
        }
    }

    /// Makes every run fail with `fault` until cleared with `None`.
    pub fn set_persistent_fault(&self, fault: Option<Fault>) {
        if let Ok(mut slot) = self.persistent_fault.lock() {
            *slot = fault;
        }
    }

    pub fn set_fail_init(&self, fail: bool) {
        self.fail_init.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_power_cycle(&self, fail: bool) {
        self.fail_power_cycle.store(fail, Ordering::Relaxed);
    }

    pub fn set_utilization(&self, percent: u8) {
        self.utilization.store(percent, Ordering::Relaxed);
    }

    /// Slows every later run by `extra`.
    pub fn set_extra_latency(&self, extra: Duration) {
        self.extra_latency_us
            .store(extra.as_micros() as u64, Ordering::Relaxed);
    }

    fn extra_latency(&self) -> Duration {
        Duration::from_micros(self.extra_latency_us.load(Ordering::Relaxed))
    }

    pub fn init_calls(&self) -> u32 {
        self.init_calls.load(Ordering::Relaxed)
    }

    pub fn load_calls(&self) -> u32 {
        self.load_calls.load(Ordering::Relaxed)
    }

    pub fn unload_calls(&self) -> u32 {
        self.unload_calls.load(Ordering::Relaxed)
    }

    pub fn run_calls(&self) -> u32 {
        self.run_calls.load(Ordering::Relaxed)
    }

    pub fn power_cycles(&self) -> u32 {
        self.power_cycles.load(Ordering::Relaxed)
    }

    fn next_fault(&self) -> Option<Fault> {
        let queued = self
            .queued_faults
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        queued.or_else(|| self.persistent_fault.lock().ok().and_then(|slot| *slot))
    }
}

/// A scripted accelerator with fixed latency.
#[derive(Debug)]
pub struct SimulatedDriver {
    latency: Duration,
    script: Vec<ScriptedRegion>,
    /// Script indices reported by the last detection, in output order.
    reported: Vec<usize>,
    /// Model input size from the last `init`.
    input: (u16, u16),
    control: Arc<SimulatorControl>,
    powered: bool,
    loaded: [bool; ModelId::ALL.len()],
    next_region: usize,
}

impl SimulatedDriver {
    pub fn new(latency: Duration) -> Self {
        let control = SimulatorControl::default();
        control.set_utilization(40);
        Self {
            latency,
            script: Vec::new(),
            reported: Vec::new(),
            input: (0, 0),
            control: Arc::new(control),
            powered: false,
            loaded: [false; ModelId::ALL.len()],
            next_region: 0,
        }
    }

    /// A driver that sees one bilingual sign in every frame.
    pub fn demo(latency: Duration) -> Self {
        Self::new(latency).with_script(vec![
            ScriptedRegion::new("出口", 0.97).at(8, 8, 48, 16),
            ScriptedRegion::new("EXIT", 0.98).at(64, 8, 48, 16),
        ])
    }

    pub fn with_script(mut self, script: Vec<ScriptedRegion>) -> Self {
        self.script = script;
        self
    }

    /// A handle for injecting faults and reading call counters.
    pub fn control(&self) -> Arc<SimulatorControl> {
        Arc::clone(&self.control)
    }

    fn detect(&mut self, output: &mut [u8]) -> Result<usize, DriverFault> {
        self.next_region = 0;
        self.reported.clear();

        let room = wire::regions_fitting(output.len());
        let (width, height) = self.input;
        let mut records = Vec::with_capacity(self.script.len().min(room));
        for (index, scripted) in self.script.iter().enumerate() {
            if records.len() == room {
                tracing::debug!(
                    "detection output full: {} of {} scripted regions reported",
                    room,
                    self.script.len()
                );
                break;
            }
            if overlaps(&scripted.region, width, height) {
                records.push(scripted.region);
                self.reported.push(index);
            }
        }

        wire::encode_detection(&records, output)
            .map_err(|_| DriverFault::new(status::OUTPUT_OVERFLOW, "detection output overflow"))
    }

    fn recognize(&mut self, output: &mut [u8]) -> Result<usize, DriverFault> {
        let scripted = self
            .reported
            .get(self.next_region)
            .and_then(|&index| self.script.get(index));
        let (text, confidence) = match scripted {
            Some(s) => (s.text.as_str(), s.confidence),
            None => ("", 0.0),
        };
        self.next_region += 1;
        wire::encode_recognition(text, confidence, output)
            .map_err(|_| DriverFault::new(status::OUTPUT_OVERFLOW, "recognition output overflow"))
    }
}

#[async_trait]
impl AcceleratorDriver for SimulatedDriver {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn init(&mut self, settings: &DeviceSettings) -> Result<(), DriverFault> {
        self.control.init_calls.fetch_add(1, Ordering::Relaxed);
        if self.control.fail_init.load(Ordering::Relaxed) {
            return Err(DriverFault::new(status::INIT_FAILED, "device did not respond"));
        }
        tracing::debug!(
            "simulated accelerator configured: {:?}, input {}x{}",
            settings.precision,
            settings.input_width,
            settings.input_height
        );
        self.input = (settings.input_width, settings.input_height);
        self.powered = true;
        Ok(())
    }

    async fn load(&mut self, model: ModelId, _payload: &[u8]) -> Result<(), DriverFault> {
        self.control.load_calls.fetch_add(1, Ordering::Relaxed);
        if !self.powered {
            return Err(DriverFault::new(status::NOT_INITIALIZED, "device not powered"));
        }
        self.loaded[model.index()] = true;
        Ok(())
    }

    async fn unload(&mut self, model: ModelId) -> Result<(), DriverFault> {
        self.control.unload_calls.fetch_add(1, Ordering::Relaxed);
        self.loaded[model.index()] = false;
        Ok(())
    }

    async fn run(
        &mut self,
        model: ModelId,
        _input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, DriverFault> {
        self.control.run_calls.fetch_add(1, Ordering::Relaxed);
        match self.control.next_fault() {
            Some(Fault::Hang) => return std::future::pending().await,
            Some(Fault::Error(code)) => return Err(DriverFault::new(code, "injected fault")),
            None => {}
        }
        if !self.powered {
            return Err(DriverFault::new(status::NOT_INITIALIZED, "device not powered"));
        }
        if !self.loaded[model.index()] {
            return Err(DriverFault::new(status::MODEL_MISSING, "model not resident"));
        }

        tokio::time::sleep(self.latency + self.control.extra_latency()).await;

        match model {
            ModelId::TextDetection => self.detect(output),
            ModelId::TextRecognition => self.recognize(output),
        }
    }

    async fn power_cycle(&mut self) -> Result<(), DriverFault> {
        self.control.power_cycles.fetch_add(1, Ordering::Relaxed);
        self.powered = false;
        self.loaded = [false; ModelId::ALL.len()];
        if self.control.fail_power_cycle.load(Ordering::Relaxed) {
            return Err(DriverFault::new(status::POWER_FAILED, "power rail stuck"));
        }
        Ok(())
    }

    fn utilization(&self) -> u8 {
        if self.powered {
            self.control.utilization.load(Ordering::Relaxed)
        } else {
            0
        }
    }
}

/// Whether `region` keeps a non-zero area once clamped to the input.
fn overlaps(region: &RegionRecord, width: u16, height: u16) -> bool {
    region.x < width && region.y < height && region.width > 0 && region.height > 0
}
