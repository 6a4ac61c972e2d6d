//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - Continuations run at frame boundaries, never mid-step
//! - No rendering or platform dependencies

pub mod ball;
pub mod block;
pub mod collision;
pub mod controller;
pub mod error;
pub mod schedule;
pub mod spawner;
pub mod state;
pub mod tick;
pub mod vector;

pub use ball::{Ball, BallState, CollisionOutcome};
pub use block::{Block, BlockColor, BlockDestroyed};
pub use collision::{Contact, ContactKind};
pub use controller::{Observables, RunController};
pub use error::SimError;
pub use schedule::{Continuation, Scheduler};
pub use spawner::{WaveSpec, max_hit_points_for_level, row_count_for_level, spawn_wave};
pub use state::{GameEvent, GamePhase, GameState, Pickup, PowerUpKind, RunModifiers};
pub use tick::{TickInput, fixed_step, frame_update};
