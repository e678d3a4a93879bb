// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Running performance statistics.
//!
//! All aggregates are incremental and constant-size: recording a sample is
//! O(1) and never allocates.

use memory_manager::ArenaStats;
use std::time::Duration;

/// Arena figures mirrored into the statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ArenaUsage {
    pub current_bytes: usize,
    pub peak_bytes: usize,
    pub leak_count: u64,
}

/// Aggregates over every cycle since startup (or the last reset).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct PerformanceStats {
    pub total_cycles: u64,
    pub successful_cycles: u64,
    pub failed_cycles: u64,

    pub min_latency: Duration,
    pub max_latency: Duration,
    pub avg_latency: Duration,
    pub last_latency: Duration,
    latency_samples: u64,

    pub average_confidence: f64,
    pub low_confidence_count: u64,
    pub last_accuracy_percent: f32,
    quality_samples: u64,
    confidence_floor: f32,

    pub deadline_violations: u64,
    pub arena: ArenaUsage,
}

impl PerformanceStats {
    /// Empty statistics counting results below `confidence_floor` as low.
    pub fn new(confidence_floor: f32) -> Self {
        Self {
            confidence_floor,
            ..Self::default()
        }
    }

    /// Counts one finished cycle.
    pub fn record_cycle(&mut self, success: bool) {
        self.total_cycles += 1;
        if success {
            self.successful_cycles += 1;
        } else {
            self.failed_cycles += 1;
        }
    }

    /// Folds one latency sample into min, max and the running average.
    pub fn record_latency(&mut self, latency: Duration) {
        self.latency_samples += 1;
        let n = self.latency_samples as u128;
        if n == 1 {
            self.min_latency = latency;
            self.max_latency = latency;
        } else {
            self.min_latency = self.min_latency.min(latency);
            self.max_latency = self.max_latency.max(latency);
        }
        let avg = (self.avg_latency.as_nanos() * (n - 1) + latency.as_nanos()) / n;
        self.avg_latency = Duration::from_nanos(avg as u64);
        self.last_latency = latency;
    }

    /// Folds one result's confidence and accuracy into the quality figures.
    pub fn record_quality(&mut self, confidence: f32, accuracy_percent: f32) {
        self.quality_samples += 1;
        let n = self.quality_samples as f64;
        self.average_confidence += (confidence as f64 - self.average_confidence) / n;
        self.last_accuracy_percent = accuracy_percent;
        if confidence < self.confidence_floor {
            self.low_confidence_count += 1;
        }
    }

    pub fn record_deadline_violation(&mut self) {
        self.deadline_violations += 1;
    }

    pub fn update_memory(&mut self, arena: &ArenaStats) {
        self.arena = ArenaUsage {
            current_bytes: arena.allocated_bytes,
            peak_bytes: arena.peak_allocated_bytes,
            leak_count: arena.leak_count,
        };
    }

    /// Number of latency samples folded into the average.
    pub fn latency_samples(&self) -> u64 {
        self.latency_samples
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_cycles == 0 {
            return 0.0;
        }
        self.successful_cycles as f64 / self.total_cycles as f64
    }

    /// Compares the aggregates against `targets`.
    pub fn check_targets(&self, targets: &PerformanceTargets) -> TargetReport {
        let sampled = self.latency_samples > 0;
        let quality = self.quality_samples > 0;
        TargetReport {
            latency_met: !sampled || self.avg_latency <= targets.max_latency,
            accuracy_met: !quality || self.last_accuracy_percent >= targets.min_accuracy_percent,
            confidence_met: !quality || self.average_confidence >= targets.min_confidence as f64,
        }
    }

    /// Clears every aggregate; the confidence floor is kept.
    pub fn reset(&mut self) {
        *self = Self::new(self.confidence_floor);
    }

    /// Returns a one-line summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "Cycles: {} ({} ok, {} failed) | latency min/avg/max {:.2}/{:.2}/{:.2} ms | \
             conf {:.3} ({} low) | deadline misses {} | arena {} KB (peak {} KB, {} leaks)",
            self.total_cycles,
            self.successful_cycles,
            self.failed_cycles,
            self.min_latency.as_secs_f64() * 1000.0,
            self.avg_latency.as_secs_f64() * 1000.0,
            self.max_latency.as_secs_f64() * 1000.0,
            self.average_confidence,
            self.low_confidence_count,
            self.deadline_violations,
            self.arena.current_bytes / 1024,
            self.arena.peak_bytes / 1024,
            self.arena.leak_count,
        )
    }
}

/// Performance goals checked off the hot path.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PerformanceTargets {
    pub max_latency: Duration,
    pub min_accuracy_percent: f32,
    pub min_confidence: f32,
}

/// Outcome of [`PerformanceStats::check_targets`]. Targets without samples
/// count as met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TargetReport {
    pub latency_met: bool,
    pub accuracy_met: bool,
    pub confidence_met: bool,
}

impl TargetReport {
    pub fn all_met(&self) -> bool {
        self.latency_met && self.accuracy_met && self.confidence_met
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_latency_aggregates() {
        let mut s = PerformanceStats::new(0.95);
        for v in [5, 3, 7] {
            s.record_latency(ms(v));
        }
        assert_eq!(s.min_latency, ms(3));
        assert_eq!(s.max_latency, ms(7));
        assert_eq!(s.avg_latency, ms(5));
        assert_eq!(s.last_latency, ms(7));
        assert!(s.min_latency <= s.avg_latency && s.avg_latency <= s.max_latency);
    }

    #[test]
    fn test_low_confidence_count() {
        let mut s = PerformanceStats::new(0.95);
        s.record_quality(0.9, 100.0);
        s.record_quality(0.99, 100.0);
        assert_eq!(s.low_confidence_count, 1);
        assert!((s.average_confidence - 0.945).abs() < 1e-6);
    }

    #[test]
    fn test_cycle_counts() {
        let mut s = PerformanceStats::new(0.95);
        s.record_cycle(true);
        s.record_cycle(true);
        s.record_cycle(false);
        assert_eq!(s.total_cycles, 3);
        assert_eq!(s.failed_cycles, 1);
        assert!((s.success_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_targets() {
        let targets = PerformanceTargets {
            max_latency: ms(8),
            min_accuracy_percent: 95.0,
            min_confidence: 0.95,
        };
        let mut s = PerformanceStats::new(0.95);
        assert!(s.check_targets(&targets).all_met());

        s.record_latency(ms(9));
        s.record_quality(0.97, 90.0);
        let report = s.check_targets(&targets);
        assert!(!report.latency_met);
        assert!(!report.accuracy_met);
        assert!(report.confidence_met);
        assert!(!report.all_met());
    }

    #[test]
    fn test_reset_keeps_floor() {
        let mut s = PerformanceStats::new(0.95);
        s.record_cycle(true);
        s.record_latency(ms(4));
        s.reset();
        assert_eq!(s.total_cycles, 0);
        assert_eq!(s.latency_samples(), 0);
        s.record_quality(0.9, 100.0);
        assert_eq!(s.low_confidence_count, 1);
    }

    #[test]
    fn test_update_memory_and_summary() {
        let mut s = PerformanceStats::new(0.95);
        let arena = ArenaStats {
            capacity_bytes: 4096,
            allocated_bytes: 2048,
            peak_allocated_bytes: 3072,
            leak_count: 1,
            ..ArenaStats::default()
        };
        s.update_memory(&arena);
        assert_eq!(s.arena.peak_bytes, 3072);
        let line = s.summary();
        assert!(line.contains("arena 2 KB"));
        assert!(line.contains("1 leaks"));
    }

    #[test]
    fn test_serialize() {
        let s = PerformanceStats::new(0.95);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["total_cycles"], 0);
        assert!(json.get("deadline_violations").is_some());
    }
}
