// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Consecutive-failure tracking and the recovery decision.
//!
//! The controller only decides; the orchestrator executes the
//! [`RecoveryStep`]s in [`RecoveryStep::PROCEDURE`] order and reports the
//! outcome back with [`RecoveryController::complete`].

/// One step of the fixed recovery procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RecoveryStep {
    PowerCycle,
    Reinitialise,
    ReloadModels,
    SelfTest,
}

impl RecoveryStep {
    pub const PROCEDURE: [RecoveryStep; 4] = [
        RecoveryStep::PowerCycle,
        RecoveryStep::Reinitialise,
        RecoveryStep::ReloadModels,
        RecoveryStep::SelfTest,
    ];
}

/// What the orchestrator should do after a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Below the threshold: go back to `Ready` and keep cycling.
    Resume,
    /// Threshold reached: run the recovery procedure now.
    Recover,
    /// A recovery is running or has escalated; do nothing.
    Suppressed,
}

/// Snapshot of the controller's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RecoveryState {
    pub consecutive_errors: u32,
    pub last_error_code: i32,
    pub in_progress: bool,
    /// A recovery failed and has not been acknowledged.
    pub escalated: bool,
    pub attempts: u32,
    pub successes: u32,
}

#[derive(Debug)]
pub struct RecoveryController {
    threshold: u32,
    state: RecoveryState,
}

impl RecoveryController {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            state: RecoveryState::default(),
        }
    }

    /// Counts a failed cycle and decides the follow-up.
    pub fn record_failure(&mut self, code: i32) -> FailureAction {
        self.state.consecutive_errors = self.state.consecutive_errors.saturating_add(1);
        self.state.last_error_code = code;

        if self.state.in_progress || self.state.escalated {
            return FailureAction::Suppressed;
        }
        if self.state.consecutive_errors >= self.threshold {
            self.state.in_progress = true;
            self.state.attempts += 1;
            tracing::warn!(
                "{} consecutive failures (last code {code}), starting recovery attempt {}",
                self.state.consecutive_errors,
                self.state.attempts,
            );
            return FailureAction::Recover;
        }
        tracing::debug!(
            "cycle failed with code {code} ({}/{} before recovery)",
            self.state.consecutive_errors,
            self.threshold,
        );
        FailureAction::Resume
    }

    /// Ends the running recovery.
    ///
    /// Success is the only thing that clears the failure count; failure
    /// escalates until [`acknowledge`](Self::acknowledge) is called.
    pub fn complete(&mut self, success: bool) {
        self.state.in_progress = false;
        if success {
            self.state.successes += 1;
            self.state.consecutive_errors = 0;
            tracing::info!("recovery succeeded ({} total)", self.state.successes);
        } else {
            self.state.escalated = true;
        }
    }

    /// Clears an escalation so the next failure at or above the threshold
    /// may retry.
    pub fn acknowledge(&mut self) {
        if self.state.escalated {
            tracing::info!("recovery escalation acknowledged");
        }
        self.state.escalated = false;
    }

    /// Starts a recovery outside the failure path (after an acknowledge).
    pub fn begin_manual(&mut self) -> bool {
        if self.state.in_progress || self.state.escalated {
            return false;
        }
        self.state.in_progress = true;
        self.state.attempts += 1;
        true
    }

    pub fn is_escalated(&self) -> bool {
        self.state.escalated
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn state(&self) -> &RecoveryState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triggers_exactly_once_at_threshold() {
        let mut rc = RecoveryController::new(5);
        for _ in 0..4 {
            assert_eq!(rc.record_failure(-3), FailureAction::Resume);
        }
        assert_eq!(rc.record_failure(-3), FailureAction::Recover);
        assert!(rc.state().in_progress);

        // Sixth failure while the recovery is still running.
        assert_eq!(rc.record_failure(-3), FailureAction::Suppressed);
        assert_eq!(rc.state().attempts, 1);
        assert_eq!(rc.state().consecutive_errors, 6);
    }

    #[test]
    fn test_success_resets_counter() {
        let mut rc = RecoveryController::new(5);
        for _ in 0..5 {
            rc.record_failure(-6);
        }
        rc.complete(true);
        let s = rc.state();
        assert_eq!(s.consecutive_errors, 0);
        assert_eq!(s.successes, 1);
        assert!(!s.in_progress);
        assert_eq!(rc.record_failure(-6), FailureAction::Resume);
    }

    #[test]
    fn test_failed_recovery_escalates_until_acknowledged() {
        let mut rc = RecoveryController::new(2);
        rc.record_failure(-3);
        assert_eq!(rc.record_failure(-3), FailureAction::Recover);
        rc.complete(false);
        assert!(rc.is_escalated());
        assert!(!rc.begin_manual());
        for _ in 0..10 {
            assert_eq!(rc.record_failure(-3), FailureAction::Suppressed);
        }

        // The count is still above the threshold, so the next failure retries.
        rc.acknowledge();
        assert!(!rc.is_escalated());
        assert_eq!(rc.state().consecutive_errors, 12);
        assert_eq!(rc.record_failure(-3), FailureAction::Recover);
        assert_eq!(rc.state().attempts, 2);
    }

    #[test]
    fn test_procedure_order() {
        assert_eq!(
            RecoveryStep::PROCEDURE,
            [
                RecoveryStep::PowerCycle,
                RecoveryStep::Reinitialise,
                RecoveryStep::ReloadModels,
                RecoveryStep::SelfTest,
            ]
        );
    }
}
