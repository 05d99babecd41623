//! # Combat Phases
//!
//! The per-encounter state machine. A round alternates a player phase and
//! an enemy phase; each phase passes through a preparing sub-phase (budget
//! resets, visibility), an executing sub-phase (input or AI), and `Done`
//! when the hand-off is pending.

use serde::{Deserialize, Serialize};

/// Whose side of the round is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Player,
    Enemy,
}

/// Where inside the current phase the encounter is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubPhase {
    /// State setup; no input
    Preparing,
    /// Input or AI active
    Executing,
    /// Transition to the other phase pending
    Done,
}

/// The phase state machine. Starts at `Player/Preparing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMachine {
    pub phase: Phase,
    pub sub: SubPhase,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self {
            phase: Phase::Player,
            sub: SubPhase::Preparing,
        }
    }

    pub fn is(&self, phase: Phase, sub: SubPhase) -> bool {
        self.phase == phase && self.sub == sub
    }

    /// Preparing is finished; start accepting input or AI.
    pub fn to_executing(&mut self) {
        log::debug!("{:?} phase executing", self.phase);
        self.sub = SubPhase::Executing;
    }

    /// The current phase is over; hand-off pending.
    pub fn to_done(&mut self) {
        log::debug!("{:?} phase done", self.phase);
        self.sub = SubPhase::Done;
    }

    /// From `Done`, swap sides and begin preparing the other phase.
    pub fn advance(&mut self) {
        self.phase = match self.phase {
            Phase::Player => Phase::Enemy,
            Phase::Enemy => Phase::Player,
        };
        self.sub = SubPhase::Preparing;
        log::debug!("{:?} phase preparing", self.phase);
    }

    /// Resets to the initial state; used on full regeneration.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
