//! Ballz - ball-launch block breaker core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (ball flight, blocks, waves, run state machine)
//! - `tuning`: Data-driven game balance
//! - `progression`: Cross-run upgrades bought with progression points
//! - `persistence`: Key/value storage backends for progression

pub mod persistence;
pub mod progression;
pub mod sim;
pub mod tuning;

pub use progression::{
    ParseUpgradeError, Progression, ProgressionStore, PurchaseError, UpgradeKind,
};
pub use sim::{RunController, SimError};
pub use tuning::Tuning;

/// Game configuration constants (defaults for [`Tuning`])
pub mod consts {
    /// Fixed simulation timestep (120 Hz for smooth physics)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Largest frame delta accepted by the frame loop
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Arena bounds (world units, y up)
    pub const ARENA_LEFT: f32 = -3.5;
    pub const ARENA_RIGHT: f32 = 3.5;
    pub const ARENA_CEILING: f32 = 5.0;
    /// Balls below this line have returned
    pub const RETURN_Y: f32 = -4.75;
    /// Where every volley starts
    pub const LAUNCH_X: f32 = 0.0;
    pub const LAUNCH_Y: f32 = -4.5;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 0.15;
    pub const BALL_SPEED: f32 = 15.0;
    pub const MIN_BALL_SPEED: f32 = 5.0;
    pub const MAX_BALL_SPEED: f32 = 40.0;

    /// Stuck detection: per-tick displacement below this counts as stalled
    pub const STUCK_DISPLACEMENT: f32 = 0.05;
    pub const STUCK_TIME_LIMIT: f32 = 0.5;
    /// Recovery arc (degrees from horizontal)
    pub const STUCK_ARC_MIN_DEG: f32 = 30.0;
    pub const STUCK_ARC_MAX_DEG: f32 = 150.0;
    pub const STUCK_NUDGE: f32 = 0.05;

    /// Axis-aligned travel guard
    pub const DEGENERATE_RATIO: f32 = 0.1;
    pub const DEGENERATE_ROTATION_MIN_DEG: f32 = 5.0;
    pub const DEGENERATE_ROTATION_MAX_DEG: f32 = 15.0;

    /// Bounce rule
    pub const MIN_BOUNCE_ANGLE_DEG: f32 = 15.0;
    pub const BOUNCE_VARIANCE_DEG: f32 = 5.0;
    pub const RAPID_BOUNCE_WINDOW: f32 = 0.1;
    pub const RAPID_BOUNCE_COUNT: u32 = 3;
    pub const RAPID_CORRECTION_MIN_DEG: f32 = 20.0;
    pub const RAPID_CORRECTION_MAX_DEG: f32 = 40.0;

    /// Launch cone (degrees from horizontal)
    pub const MIN_LAUNCH_ANGLE_DEG: f32 = 20.0;
    pub const MAX_LAUNCH_ANGLE_DEG: f32 = 160.0;
    /// Delay between balls of one volley
    pub const LAUNCH_STAGGER: f32 = 0.1;

    /// Ball count per wave: base + bonus * (level - 1) + progression extras
    pub const BASE_BALL_COUNT: u32 = 3;
    pub const BALL_BONUS_PER_LEVEL: u32 = 1;

    /// Scoring
    pub const COMBO_WINDOW: f32 = 2.0;
    pub const COMBO_STEP: f32 = 0.5;

    /// Pause between a cleared wave and the next one
    pub const WAVE_SETTLE_DELAY: f32 = 1.0;
    /// Blocks step down one row between volleys of the same wave
    pub const DESCEND_AFTER_VOLLEY: bool = true;

    /// Grid
    pub const GRID_WIDTH: u32 = 7;
    pub const CELL_SIZE: f32 = 1.0;
    pub const CELL_GAP: f32 = 0.05;
    /// Space between the ceiling and the first block row
    pub const GRID_TOP_MARGIN: f32 = 0.5;
    pub const BASE_DENSITY: f32 = 0.6;
    pub const DENSITY_STEP_PER_LEVEL: f32 = 0.05;
    pub const MIN_DENSITY: f32 = 0.5;
    pub const MAX_DENSITY: f32 = 0.9;
    pub const BASE_ROWS: u32 = 3;
    pub const MAX_ROWS: u32 = 6;

    /// Power-ups
    pub const BASE_DROP_CHANCE: f32 = 0.1;
    pub const PICKUP_RADIUS: f32 = 0.3;
    pub const PICKUP_FALL_SPEED: f32 = 2.0;
    pub const MULTI_BALL_SPREAD_DEG: f32 = 15.0;
    pub const BALL_SIZE_BOOST: f32 = 1.5;
    pub const SLOW_MOTION_SCALE: f32 = 0.5;
    pub const SLOW_MOTION_DURATION: f32 = 10.0;

    /// Progression points granted per this much score at game over
    pub const POINTS_PER_SCORE: u64 = 50;
}
