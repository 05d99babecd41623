//! # Sinfall
//!
//! A party-based tactical combat roguelike with dice-driven attack resolution.
//!
//! ## Architecture Overview
//!
//! Sinfall is built around a small set of cooperating systems:
//!
//! - **Status Pools**: Every combatant carries a fixed-capacity action point
//!   bar whose capacity is eaten by typed status segments (wounds, stun, sin)
//!   and by transient spending (movement, critical rolls)
//! - **Scheduler**: A cooperative, single-threaded step-runner that sequences
//!   multi-frame animated actions without blocking the frame loop
//! - **Phase Machine**: The per-encounter state machine alternating player
//!   and enemy phases, each with preparing/executing sub-phases
//! - **Attack Resolution**: The dice-pairing algorithm with critical hits,
//!   armor blocking, wound tallying and death resolution
//! - **Enemy AI**: Greedy goal-seeking pursuit fed by an external
//!   pathfinding service
//!
//! Map generation, field of view, pathfinding and the glyph display are
//! consumed behind service traits in [`services`]; the combat core never
//! depends on a concrete backend.

pub mod combat;
pub mod rendering;
pub mod scheduler;
pub mod services;

// Core module re-exports
pub use combat::*;
pub use scheduler::*;
pub use services::*;

// Explicit re-exports for commonly used types
pub use combat::{
    // From actors
    Armor,
    AttackOutcome,
    AttackTask,
    CombatState,
    CombatantCore,
    CombatantKind,
    Direction,
    Encounter,
    // From resolution
    EnemyTurnTask,
    Fighter,
    FighterId,
    Phase,
    PhaseMachine,
    Position,
    Stats,
    // From pools
    StatusKind,
    StatusPool,
    StatusSegment,
    SubPhase,
    Tint,
    Weapon,
    WeightClass,
};

pub use rendering::{MacroquadInput, MacroquadRenderer, SharedTextGrid, TextGrid};

pub use scheduler::{Scheduler, Step, Task, TaskId, TickContext};

pub use services::{
    FieldOfView, Glyph, GoalPathfinder, GridMap, InputSource, Key, LineOfSight, PathCursor,
    QueuedInput, RecordingStage, SquareGrid, Stage, WeightedGoalField,
};

/// Core error type for the Sinfall engine.
#[derive(thiserror::Error, Debug)]
pub enum SinfallError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A constructor was handed values it cannot represent
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Encounter state is invalid
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An action cannot be performed
    #[error("Invalid action: {0}")]
    InvalidAction(String),
}

/// Result type used throughout the Sinfall codebase.
pub type SinfallResult<T> = Result<T, SinfallError>;

/// Version information for the game.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Game configuration constants.
pub mod config {
    /// Combat arena width in cells
    pub const ARENA_WIDTH: i32 = 24;

    /// Combat arena height in cells
    pub const ARENA_HEIGHT: i32 = 22;

    /// Number of party members in an encounter
    pub const PARTY_SIZE: usize = 4;

    /// Flat bonus added to the best party Will for the movement budget
    pub const MOVE_BUDGET_BONUS: i32 = 5;

    /// Base field-of-view radius before the Clarity modifier
    pub const FOV_RADIUS: i32 = 5;

    /// Pause between animated resolution steps, in seconds
    pub const STEP_PAUSE: f32 = 0.35;

    /// Pause between enemy movement steps, in seconds
    pub const MOVE_PAUSE: f32 = 0.12;

    /// Duration of the end-of-combat fade, in seconds
    pub const FADE_SECONDS: f32 = 1.5;
}
