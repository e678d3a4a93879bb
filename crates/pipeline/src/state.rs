// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The orchestrator's lifecycle state machine.
//!
//! ```text
//!  Idle ──► Loading ──► Ready ──► Inferencing ──► Postprocessing
//!    ▲         │  ▲       ▲ │          │                 │
//!    │         │  │       │ └──────────┼─────────────────┘ (back to Ready)
//!    │         ▼  │       │            ▼
//!    └─────── Error ──────┴─── Error ◄─┘
//! ```
//!
//! `Error` is left through recovery (`Loading`), by resuming below the
//! recovery threshold (`Ready`), or by shutdown (`Idle`).

use crate::PipelineError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum PipelineState {
    #[default]
    Idle,
    Loading,
    Ready,
    Inferencing,
    Postprocessing,
    Error,
}

impl PipelineState {
    /// Whether `self -> to` is a legal transition.
    pub fn can_transition_to(self, to: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, to),
            (Idle, Loading)
                | (Loading, Ready)
                | (Loading, Error)
                | (Ready, Inferencing)
                | (Ready, Idle)
                | (Inferencing, Postprocessing)
                | (Inferencing, Error)
                | (Postprocessing, Ready)
                | (Postprocessing, Error)
                | (Error, Loading)
                | (Error, Ready)
                | (Error, Idle)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Current state plus a transition counter.
#[derive(Debug, Default)]
pub struct StateMachine {
    current: PipelineState,
    transitions: u64,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> PipelineState {
        self.current
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Moves to `to`, or fails without changing state.
    pub fn transition(&mut self, to: PipelineState) -> Result<(), PipelineError> {
        let from = self.current;
        if !from.can_transition_to(to) {
            return Err(PipelineError::InvalidState { from, to });
        }
        tracing::trace!("state {from} -> {to}");
        self.current = to;
        self.transitions += 1;
        Ok(())
    }
}
