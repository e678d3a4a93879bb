// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Status reporting, error logging and watchdog feeding.
//!
//! The orchestrator calls a [`SystemMonitor`] once per cycle to report
//! status and feed the watchdog, and whenever something goes wrong.
//! [`TracingMonitor`] forwards everything to `tracing`;
//! [`RecordingMonitor`] keeps it in memory for inspection.

use std::sync::Mutex;

/// Error severity, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
    Fatal,
}

/// One entry for the system error log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ErrorRecord {
    pub severity: Severity,
    pub task_id: u8,
    pub code: i32,
    pub description: &'static str,
    /// Free-form context, such as the frame id or recovery step.
    pub context: u64,
}

/// Sink for health signals. Implementations must not block.
pub trait SystemMonitor: Send + Sync {
    fn report_status(&self, task_id: u8, load_percent: u8, memory_bytes: usize);

    fn log_error(&self, record: ErrorRecord);

    fn feed_watchdog(&self, task_id: u8);
}

/// Forwards monitor calls to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMonitor;

impl SystemMonitor for TracingMonitor {
    fn report_status(&self, task_id: u8, load_percent: u8, memory_bytes: usize) {
        tracing::trace!(task_id, load_percent, memory_bytes, "status");
    }

    fn log_error(&self, r: ErrorRecord) {
        match r.severity {
            Severity::Info => {
                tracing::info!(task = r.task_id, code = r.code, context = r.context, "{}", r.description)
            }
            Severity::Warning => {
                tracing::warn!(task = r.task_id, code = r.code, context = r.context, "{}", r.description)
            }
            Severity::Error | Severity::Critical => {
                tracing::error!(task = r.task_id, code = r.code, context = r.context, severity = ?r.severity, "{}", r.description)
            }
            Severity::Fatal => {
                tracing::error!(task = r.task_id, code = r.code, context = r.context, "FATAL: {}", r.description)
            }
        }
    }

    fn feed_watchdog(&self, task_id: u8) {
        tracing::trace!(task_id, "watchdog fed");
    }
}

#[derive(Debug, Default)]
struct Recorded {
    statuses: Vec<(u8, u8, usize)>,
    errors: Vec<ErrorRecord>,
    watchdog_feeds: u64,
}

/// Keeps every monitor call in memory.
#[derive(Debug, Default)]
pub struct RecordingMonitor {
    inner: Mutex<Recorded>,
}

impl RecordingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.inner.lock().map(|r| r.errors.clone()).unwrap_or_default()
    }

    /// Records at exactly `severity`.
    pub fn errors_with(&self, severity: Severity) -> Vec<ErrorRecord> {
        self.errors()
            .into_iter()
            .filter(|r| r.severity == severity)
            .collect()
    }

    pub fn status_reports(&self) -> usize {
        self.inner.lock().map(|r| r.statuses.len()).unwrap_or(0)
    }

    /// The most recent `(task_id, load_percent, memory_bytes)` report.
    pub fn last_status(&self) -> Option<(u8, u8, usize)> {
        self.inner.lock().ok().and_then(|r| r.statuses.last().copied())
    }

    pub fn watchdog_feeds(&self) -> u64 {
        self.inner.lock().map(|r| r.watchdog_feeds).unwrap_or(0)
    }
}

impl SystemMonitor for RecordingMonitor {
    fn report_status(&self, task_id: u8, load_percent: u8, memory_bytes: usize) {
        if let Ok(mut r) = self.inner.lock() {
            r.statuses.push((task_id, load_percent, memory_bytes));
        }
    }

    fn log_error(&self, record: ErrorRecord) {
        if let Ok(mut r) = self.inner.lock() {
            r.errors.push(record);
        }
    }

    fn feed_watchdog(&self, _task_id: u8) {
        if let Ok(mut r) = self.inner.lock() {
            r.watchdog_feeds += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(severity: Severity) -> ErrorRecord {
        ErrorRecord {
            severity,
            task_id: 3,
            code: -3,
            description: "inference timeout",
            context: 7,
        }
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Critical < Severity::Fatal);
    }

    #[test]
    fn test_recording_monitor() {
        let m = RecordingMonitor::new();
        m.report_status(3, 40, 1024);
        m.feed_watchdog(3);
        m.feed_watchdog(3);
        m.log_error(record(Severity::Error));
        m.log_error(record(Severity::Fatal));

        assert_eq!(m.status_reports(), 1);
        assert_eq!(m.last_status(), Some((3, 40, 1024)));
        assert_eq!(m.watchdog_feeds(), 2);
        assert_eq!(m.errors().len(), 2);
        assert_eq!(m.errors_with(Severity::Fatal).len(), 1);
    }

    #[test]
    fn test_tracing_monitor_accepts_all_severities() {
        let m = TracingMonitor;
        for s in [
            Severity::Info,
            Severity::Warning,
            Severity::Error,
            Severity::Critical,
            Severity::Fatal,
        ] {
            m.log_error(record(s));
        }
        m.report_status(3, 0, 0);
        m.feed_watchdog(3);
    }
}
