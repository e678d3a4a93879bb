// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The top-level OCR pipeline.
//!
//! ```text
//!  Idle ──start()──► Loading ──► Ready ◄──────────────┐
//!                       │          │ run_cycle()       │
//!                       ▼          ▼                   │
//!                     Error ◄── Inferencing ──► Postprocessing
//!                       │
//!                       └── recovery: power cycle, init, reload, self-test
//!                           ──► Loading ──► Ready
//! ```
//!
//! The [`Orchestrator`] owns the arena, the accelerator facade, the
//! statistics and the recovery controller. Frames come from a
//! [`FrameSource`], results go to a [`ResultSink`] and health signals to a
//! [`SystemMonitor`], all injected at construction.

use crate::cycle::{self, CycleReport};
use crate::io::{Frame, FrameSource, ResultSink, SinkError};
use crate::monitor::{ErrorRecord, Severity, SystemMonitor};
use crate::recovery::{FailureAction, RecoveryController, RecoveryState, RecoveryStep};
use crate::selftest::{self, SelfTestReport};
use crate::stats::{PerformanceStats, TargetReport};
use crate::{codes, ModelStore, PipelineConfig, PipelineError, PipelineState, StateMachine};
use accelerator::{Accelerator, AcceleratorDriver, ModelId};
use memory_manager::{Arena, ArenaStats};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Id of the mid-grey probe frame used by the self-test and benchmark.
const PROBE_FRAME_ID: u64 = u64::MAX;

/// What happened to the recovery procedure after a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RecoveryOutcome {
    /// The failure count is below the threshold.
    NotAttempted,
    Recovered,
    /// The procedure failed; the pipeline is halted until retried.
    Failed,
}

/// Result of one [`Orchestrator::run_cycle`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No frame was ready; nothing changed.
    NoFrame,
    /// A result was handed to the sink.
    Published { frame_id: u64, latency: Duration },
    /// The cycle succeeded but the sink refused the result.
    Dropped { frame_id: u64, reason: SinkError },
    /// The cycle succeeded but no region passed the confidence filter.
    Empty { frame_id: u64 },
    /// The cycle failed and was counted toward recovery.
    Failed {
        code: i32,
        consecutive_errors: u32,
        recovery: RecoveryOutcome,
    },
    /// The pipeline is in `Error` and waits for [`Orchestrator::retry_recovery`].
    Halted,
}

impl CycleOutcome {
    /// Whether the cycle counted as successful.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Published { .. } | Self::Dropped { .. } | Self::Empty { .. }
        )
    }
}

/// Timing over repeated inference passes on the probe frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BenchmarkReport {
    pub iterations: u32,
    pub failures: u32,
    pub min: Duration,
    pub average: Duration,
    pub max: Duration,
}

/// Serializable snapshot for diagnostics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StateDump {
    pub state: PipelineState,
    pub transitions: u64,
    pub stats: PerformanceStats,
    pub recovery: RecoveryState,
    pub arena: ArenaStats,
    pub accelerator: String,
    pub accelerator_utilization: u8,
    pub models_ready: [bool; 2],
    pub last_error: Option<String>,
}

/// Deadline-bounded OCR pipeline.
///
/// # Example
/// ```
/// use accelerator::SimulatedDriver;
/// use ocr_pipeline::{
///     ChannelSink, CycleOutcome, Orchestrator, PipelineConfig, SyntheticCamera, TracingMonitor,
/// };
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() -> Result<(), ocr_pipeline::PipelineError> {
/// let config = PipelineConfig::default();
/// let camera = SyntheticCamera::new(config.frame_width, config.frame_height, 2);
/// let (sink, mut results) = ChannelSink::bounded(4);
///
/// let mut pipeline = Orchestrator::new(
///     config,
///     Box::new(SimulatedDriver::demo(Duration::from_millis(1))),
///     Box::new(camera),
///     Box::new(sink),
///     Arc::new(TracingMonitor),
/// )?;
/// pipeline.start().await?;
///
/// let outcome = pipeline.run_cycle().await?;
/// assert!(matches!(outcome, CycleOutcome::Published { .. }));
/// assert_eq!(results.recv().await.unwrap().text.as_str(), "出口 EXIT");
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator {
    config: PipelineConfig,
    state: StateMachine,
    arena: Arena,
    accelerator: Accelerator,
    models: ModelStore,
    stats: PerformanceStats,
    recovery: RecoveryController,
    source: Box<dyn FrameSource>,
    sink: Box<dyn ResultSink>,
    monitor: Arc<dyn SystemMonitor>,
    probe: Frame,
    last_error: Option<PipelineError>,
    /// Cycles that took a frame.
    frames: u64,
    epoch: Instant,
}

impl Orchestrator {
    /// Validates `config`, reserves the arena and opens the model payloads.
    ///
    /// The accelerator is not touched until [`start`](Self::start).
    pub fn new(
        config: PipelineConfig,
        driver: Box<dyn AcceleratorDriver>,
        source: Box<dyn FrameSource>,
        sink: Box<dyn ResultSink>,
        monitor: Arc<dyn SystemMonitor>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let arena = Arena::with_leak_age(config.parse_capacity()?, config.leak_age())?;
        let models = ModelStore::from_dir(config.model_dir.as_deref())?;
        let accelerator = Accelerator::new(driver, config.device_settings()?);
        let probe = Frame::filled(PROBE_FRAME_ID, config.frame_width, config.frame_height, 0x80);

        tracing::info!(
            "orchestrator created: {}x{} -> {}x{}, deadline {:?}, driver '{}'",
            config.frame_width,
            config.frame_height,
            config.input_width,
            config.input_height,
            config.deadline(),
            accelerator.driver_name(),
        );

        Ok(Self {
            stats: PerformanceStats::new(config.confidence_floor),
            recovery: RecoveryController::new(config.error_threshold),
            config,
            state: StateMachine::new(),
            arena,
            accelerator,
            models,
            source,
            sink,
            monitor,
            probe,
            last_error: None,
            frames: 0,
            epoch: Instant::now(),
        })
    }

    /// Brings the pipeline from `Idle` to `Ready`.
    ///
    /// Steps:
    /// 1. Power and configure the accelerator.
    /// 2. Load both models.
    /// 3. Run the self-test on the probe frame.
    ///
    /// On failure the pipeline is left in `Error` and the error is returned.
    pub async fn start(&mut self) -> Result<SelfTestReport, PipelineError> {
        self.state.transition(PipelineState::Loading)?;
        match self.bring_up().await {
            Ok(report) => {
                self.state.transition(PipelineState::Ready)?;
                tracing::info!("pipeline ready");
                Ok(report)
            }
            Err(e) => {
                self.state.transition(PipelineState::Error)?;
                tracing::error!("startup failed: {e}");
                self.log(Severity::Critical, e.code(), e.description(), 0);
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    async fn bring_up(&mut self) -> Result<SelfTestReport, PipelineError> {
        self.accelerator.init().await?;
        self.load_models().await?;
        selftest::run(&self.arena, &mut self.accelerator, &self.config, &self.probe).await
    }

    /// Runs one cycle.
    ///
    /// The watchdog is fed and status reported exactly once per call,
    /// whatever the outcome. Errors are returned only for misuse (calling
    /// before [`start`](Self::start)); cycle failures are reported as
    /// [`CycleOutcome::Failed`].
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, PipelineError> {
        let outcome = self.cycle().await;

        let task = self.config.task_id;
        match self.arena.try_stats() {
            Ok(arena) => self.stats.update_memory(&arena),
            Err(e) => tracing::warn!("arena stats unavailable, keeping last snapshot: {e}"),
        }
        self.monitor.feed_watchdog(task);
        self.monitor
            .report_status(task, self.accelerator.utilization(), self.stats.arena.peak_bytes);

        if let Ok(o) = &outcome {
            if !matches!(o, CycleOutcome::NoFrame | CycleOutcome::Halted) {
                self.frames += 1;
                let interval = self.config.perf_check_interval;
                if interval > 0 && self.frames % interval == 0 {
                    self.performance_check();
                }
            }
        }
        outcome
    }

    async fn cycle(&mut self) -> Result<CycleOutcome, PipelineError> {
        match self.state.current() {
            PipelineState::Ready => {}
            PipelineState::Error => return Ok(CycleOutcome::Halted),
            from => {
                return Err(PipelineError::InvalidState {
                    from,
                    to: PipelineState::Inferencing,
                })
            }
        }

        let Some(frame) = self.source.get_frame() else {
            return Ok(CycleOutcome::NoFrame);
        };
        let frame_id = frame.id();
        self.state.transition(PipelineState::Inferencing)?;

        let start = Instant::now();
        let timestamp_us = self.epoch.elapsed().as_micros() as u64;
        let result = cycle::infer(
            &self.arena,
            &mut self.accelerator,
            &self.config,
            &frame,
            timestamp_us,
        )
        .await;
        let latency = start.elapsed();
        self.source.release_frame(frame);

        match result {
            Ok(report) => self.finish_cycle(report, frame_id, latency),
            Err(e) => self.fail_cycle(e, frame_id).await,
        }
    }

    fn finish_cycle(
        &mut self,
        report: CycleReport,
        frame_id: u64,
        latency: Duration,
    ) -> Result<CycleOutcome, PipelineError> {
        self.state.transition(PipelineState::Postprocessing)?;
        self.stats.record_cycle(true);
        self.stats.record_latency(latency);

        let deadline = self.config.deadline();
        if latency > deadline {
            self.stats.record_deadline_violation();
            tracing::warn!("frame {frame_id}: cycle took {latency:?}, deadline {deadline:?}");
            self.log(
                Severity::Warning,
                codes::INFERENCE_TIMEOUT,
                "cycle deadline exceeded",
                latency.as_micros() as u64,
            );
        }

        let outcome = match report.result {
            Some(result) => {
                self.stats
                    .record_quality(result.confidence, result.accuracy_percent());
                tracing::debug!(
                    "frame {frame_id}: '{}' ({} of {} regions, conf {:.3}, {:?})",
                    result.text,
                    report.accepted,
                    report.detected,
                    result.confidence,
                    result.language,
                );
                match self.sink.publish(result) {
                    Ok(()) => CycleOutcome::Published { frame_id, latency },
                    Err(reason) => {
                        tracing::warn!("frame {frame_id}: result dropped: {reason}");
                        CycleOutcome::Dropped { frame_id, reason }
                    }
                }
            }
            None => {
                tracing::debug!("frame {frame_id}: no text above the confidence minimum");
                CycleOutcome::Empty { frame_id }
            }
        };

        self.state.transition(PipelineState::Ready)?;
        Ok(outcome)
    }

    async fn fail_cycle(
        &mut self,
        error: PipelineError,
        frame_id: u64,
    ) -> Result<CycleOutcome, PipelineError> {
        self.state.transition(PipelineState::Error)?;
        self.stats.record_cycle(false);

        let code = error.code();
        tracing::warn!("frame {frame_id}: cycle failed: {error}");
        self.log(error.severity(), code, error.description(), frame_id);
        self.last_error = Some(error);

        let recovery = match self.recovery.record_failure(code) {
            FailureAction::Resume => {
                self.state.transition(PipelineState::Ready)?;
                RecoveryOutcome::NotAttempted
            }
            FailureAction::Recover => match self.recover().await {
                Ok(()) => RecoveryOutcome::Recovered,
                Err(_) => RecoveryOutcome::Failed,
            },
            FailureAction::Suppressed => RecoveryOutcome::NotAttempted,
        };

        Ok(CycleOutcome::Failed {
            code,
            consecutive_errors: self.recovery.state().consecutive_errors,
            recovery,
        })
    }

    /// Runs the recovery procedure. The pipeline stays in `Error` until
    /// every step has passed.
    async fn recover(&mut self) -> Result<(), PipelineError> {
        tracing::warn!("recovery started");
        for (index, step) in RecoveryStep::PROCEDURE.into_iter().enumerate() {
            if let Err(source) = self.recovery_step(step).await {
                self.recovery.complete(false);
                let error = PipelineError::RecoveryFailed {
                    step,
                    source: Box::new(source),
                };
                tracing::error!("{error}");
                self.log(Severity::Fatal, error.code(), error.description(), index as u64);
                self.last_error = Some(error.clone());
                return Err(error);
            }
            tracing::debug!("recovery step {step:?} done");
        }

        self.recovery.complete(true);
        self.state.transition(PipelineState::Loading)?;
        self.state.transition(PipelineState::Ready)?;
        self.log(Severity::Info, 0, "accelerator recovered", self.recovery.state().successes as u64);
        Ok(())
    }

    async fn recovery_step(&mut self, step: RecoveryStep) -> Result<(), PipelineError> {
        match step {
            RecoveryStep::PowerCycle => self.accelerator.power_cycle().await?,
            RecoveryStep::Reinitialise => self.accelerator.init().await?,
            RecoveryStep::ReloadModels => self.load_models().await?,
            RecoveryStep::SelfTest => {
                selftest::run(&self.arena, &mut self.accelerator, &self.config, &self.probe).await?;
            }
        }
        Ok(())
    }

    /// Acknowledges a failed recovery and runs the procedure again.
    ///
    /// Only valid in `Error`, which is also where a failed
    /// [`start`](Self::start) leaves the pipeline.
    pub async fn retry_recovery(&mut self) -> Result<(), PipelineError> {
        let from = self.state.current();
        if from != PipelineState::Error {
            return Err(PipelineError::InvalidState {
                from,
                to: PipelineState::Loading,
            });
        }
        self.recovery.acknowledge();
        if !self.recovery.begin_manual() {
            return Err(PipelineError::InvalidState {
                from,
                to: PipelineState::Loading,
            });
        }
        self.recover().await
    }

    async fn load_models(&mut self) -> Result<(), PipelineError> {
        for model in ModelId::ALL {
            self.accelerator.load(model, self.models.payload(model)).await?;
        }
        Ok(())
    }

    /// Checks utilization, arena leaks and the performance targets.
    ///
    /// Runs every `perf_check_interval` cycles; never on the inference path.
    pub fn performance_check(&self) -> TargetReport {
        let utilization = self.accelerator.utilization();
        match self.arena.check_leaks() {
            Ok(0) => {}
            Ok(n) => {
                tracing::warn!("{n} arena blocks older than {:?}", self.arena.leak_age());
                self.log(Severity::Warning, codes::MEMORY_ALLOC_FAILED, "suspected arena leak", n as u64);
            }
            Err(e) => tracing::debug!("leak scan skipped: {e}"),
        }

        let deadline = self.config.deadline();
        if self.stats.avg_latency > deadline {
            tracing::warn!(
                "average latency {:?} above deadline {deadline:?}",
                self.stats.avg_latency
            );
        }

        let report = self.stats.check_targets(&self.config.targets());
        if !report.all_met() {
            tracing::warn!("performance targets missed: {report:?}");
        }
        tracing::info!("accelerator {utilization}% | {}", self.stats.summary());
        report
    }

    /// Runs the self-test on demand. Only valid in `Ready`.
    pub async fn self_test(&mut self) -> Result<SelfTestReport, PipelineError> {
        self.expect_ready(PipelineState::Inferencing)?;
        selftest::run(&self.arena, &mut self.accelerator, &self.config, &self.probe).await
    }

    /// Times `iterations` inference passes on the probe frame.
    ///
    /// Results are not published and the statistics and recovery state
    /// are left untouched. Only valid in `Ready`.
    pub async fn benchmark(&mut self, iterations: u32) -> Result<BenchmarkReport, PipelineError> {
        self.expect_ready(PipelineState::Inferencing)?;
        let iterations = iterations.max(1);
        let mut total = Duration::ZERO;
        let mut min = Duration::MAX;
        let mut max = Duration::ZERO;
        let mut failures = 0;

        for i in 0..iterations {
            let start = Instant::now();
            let pass =
                cycle::infer(&self.arena, &mut self.accelerator, &self.config, &self.probe, 0).await;
            let elapsed = start.elapsed();
            if let Err(e) = pass {
                tracing::debug!("benchmark pass {i} failed: {e}");
                failures += 1;
                continue;
            }
            total += elapsed;
            min = min.min(elapsed);
            max = max.max(elapsed);
        }

        let passed = iterations - failures;
        let report = BenchmarkReport {
            iterations,
            failures,
            min: if passed == 0 { Duration::ZERO } else { min },
            average: if passed == 0 { Duration::ZERO } else { total / passed },
            max,
        };
        tracing::info!(
            "benchmark: {passed}/{iterations} passes, avg {:.2} ms",
            report.average.as_secs_f64() * 1000.0
        );
        Ok(report)
    }

    /// Snapshot of the state, statistics and recovery counters.
    pub fn dump_state(&self) -> StateDump {
        let dump = StateDump {
            state: self.state.current(),
            transitions: self.state.transitions(),
            stats: self.stats.clone(),
            recovery: self.recovery.state().clone(),
            arena: self.arena.stats(),
            accelerator: self.accelerator.driver_name().to_string(),
            accelerator_utilization: self.accelerator.utilization(),
            models_ready: ModelId::ALL.map(|m| self.accelerator.is_ready(m)),
            last_error: self.last_error.as_ref().map(ToString::to_string),
        };
        tracing::info!(
            state = %dump.state,
            consecutive_errors = dump.recovery.consecutive_errors,
            "{}",
            self.stats.summary()
        );
        dump
    }

    /// Unloads both models and returns to `Idle`.
    pub async fn shutdown(&mut self) -> Result<(), PipelineError> {
        if self.state.current() == PipelineState::Idle {
            return Ok(());
        }
        for model in ModelId::ALL {
            if let Err(e) = self.accelerator.unload(model).await {
                tracing::warn!("unloading {model} failed: {e}");
            }
        }
        self.state.transition(PipelineState::Idle)?;
        tracing::info!("pipeline shut down: {}", self.stats.summary());
        Ok(())
    }

    fn expect_ready(&self, to: PipelineState) -> Result<(), PipelineError> {
        let from = self.state.current();
        if from != PipelineState::Ready {
            return Err(PipelineError::InvalidState { from, to });
        }
        Ok(())
    }

    fn log(&self, severity: Severity, code: i32, description: &'static str, context: u64) {
        self.monitor.log_error(ErrorRecord {
            severity,
            task_id: self.config.task_id,
            code,
            description,
            context,
        });
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn state(&self) -> PipelineState {
        self.state.current()
    }

    pub fn stats(&self) -> &PerformanceStats {
        &self.stats
    }

    /// Clears the performance statistics.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    pub fn recovery_state(&self) -> &RecoveryState {
        self.recovery.state()
    }

    /// The most recent cycle, startup or recovery error.
    pub fn last_error(&self) -> Option<&PipelineError> {
        self.last_error.as_ref()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn accelerator(&self) -> &Accelerator {
        &self.accelerator
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state.current())
            .field("accelerator", &self.accelerator)
            .field("models", &self.models)
            .field("frames", &self.frames)
            .finish()
    }
}
