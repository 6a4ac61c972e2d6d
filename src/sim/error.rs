//! Reported-and-ignored simulation errors
//!
//! Nothing here is fatal: the run state is never advanced on an `Err`.

use std::fmt;

use super::state::GamePhase;

#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// Launch direction was zero, non-finite or pointed downward
    InvalidLaunchDirection { x: f32, y: f32 },
    /// Aim or launch attempted while the launch gate is closed
    LaunchGateClosed { phase: GamePhase },
    /// Aim started with no balls left to launch
    NoBallsAvailable,
    /// A contact referenced a ball this run does not own
    UnknownBall(u32),
    /// A hit referenced a block that is not alive
    UnknownBlock(u32),
    /// The run has ended
    RunOver,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::InvalidLaunchDirection { x, y } => {
                write!(f, "invalid launch direction ({x}, {y})")
            }
            SimError::LaunchGateClosed { phase } => {
                write!(f, "launch gate closed during {phase:?}")
            }
            SimError::NoBallsAvailable => write!(f, "no balls left to launch"),
            SimError::UnknownBall(id) => write!(f, "ball {id} is not part of this run"),
            SimError::UnknownBlock(id) => write!(f, "block {id} is not alive"),
            SimError::RunOver => write!(f, "run is over"),
        }
    }
}

impl std::error::Error for SimError {}
