//! Run controller
//!
//! Owns one run and the progression store it was started with. Hosts feed
//! it frame time and aim input; it runs the fixed-step accumulator, exposes
//! read-only observables and credits the progression store when the run ends.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::Contact;
use super::error::SimError;
use super::state::{GameEvent, GamePhase, GameState, PowerUpKind, RunModifiers};
use super::tick::{self, TickInput};
use crate::consts::{MAX_FRAME_DT, MAX_SUBSTEPS, SIM_DT};
use crate::progression::{ProgressionStore, RunSummary};
use crate::tuning::Tuning;

/// Values the UI layer displays
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observables {
    pub score: u64,
    pub available_balls: u32,
    pub combo: u32,
    /// Score multiplier the next destruction would get if it extends the combo
    pub combo_multiplier: f32,
    pub level: u32,
    /// Progression points banked in the store
    pub currency: u32,
    pub balls_in_flight: u32,
    pub live_blocks: u32,
    pub phase: GamePhase,
    pub launch_gate_open: bool,
}

/// One run plus its progression store
#[derive(Debug)]
pub struct RunController {
    state: GameState,
    progression: ProgressionStore,
    accumulator: f32,
    summary_recorded: bool,
}

impl RunController {
    /// Start a run: snapshot progression, spawn level 1, open the gate
    pub fn new(tuning: Tuning, seed: u64, progression: ProgressionStore) -> Self {
        let modifiers = RunModifiers::from(progression.values());
        log::info!(
            "New run (seed {seed}): damage x{:.1}, size x{:.1}, speed x{:.1}, +{} balls",
            modifiers.damage,
            modifiers.size,
            modifiers.speed,
            modifiers.extra_balls
        );
        Self {
            state: GameState::new(tuning.sanitized(), seed, modifiers),
            progression,
            accumulator: 0.0,
            summary_recorded: false,
        }
    }

    /// Advance by one rendered frame
    ///
    /// Runs as many fixed steps as the (time-scaled) frame covers, then the
    /// frame update. Input errors are logged and returned; the run is left
    /// as it was.
    pub fn update(&mut self, input: &TickInput, frame_dt: f32) -> Result<(), SimError> {
        let frame_dt = if frame_dt.is_finite() {
            frame_dt.clamp(0.0, MAX_FRAME_DT)
        } else {
            0.0
        };
        let dt = frame_dt * self.state.time_scale;
        self.accumulator += dt;

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            tick::fixed_step(&mut self.state, SIM_DT);
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        if substeps == MAX_SUBSTEPS {
            // Drop the backlog rather than spiral
            self.accumulator = self.accumulator.min(SIM_DT);
        }

        let result = tick::frame_update(&mut self.state, input, dt);
        self.record_run_if_over();
        if let Err(e) = &result {
            log::warn!("Input ignored: {e}");
        }
        result
    }

    /// Feed a contact from an external physics engine into the next step
    pub fn report_contact(&mut self, ball_id: u32, contact: Contact) -> Result<(), SimError> {
        if self.state.phase == GamePhase::GameOver {
            return Err(SimError::RunOver);
        }
        if !self.state.ball(ball_id).is_some_and(|b| b.is_flying()) {
            log::warn!("Contact for unknown ball {ball_id} skipped");
            return Err(SimError::UnknownBall(ball_id));
        }
        self.state.pending_contacts.push((ball_id, contact));
        Ok(())
    }

    /// Overwrite a ball's position and velocity from an external engine
    pub fn sync_ball(&mut self, ball_id: u32, pos: Vec2, vel: Vec2) -> Result<(), SimError> {
        let ball = self
            .state
            .ball_mut(ball_id)
            .filter(|b| b.is_flying())
            .ok_or(SimError::UnknownBall(ball_id))?;
        ball.pos = pos;
        ball.vel = vel;
        Ok(())
    }

    /// Add a ball to the current wave's supply
    pub fn grant_extra_ball(&mut self) -> Result<u32, SimError> {
        tick::grant_extra_ball(&mut self.state)
    }

    pub fn apply_power_up(&mut self, kind: PowerUpKind) -> Result<(), SimError> {
        tick::apply_power_up(&mut self.state, kind)
    }

    /// Take every event since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.state.drain_events()
    }

    pub fn observables(&self) -> Observables {
        let s = &self.state;
        Observables {
            score: s.score,
            available_balls: s.available_balls,
            combo: s.combo,
            combo_multiplier: 1.0 + s.combo as f32 * s.tuning.run.combo_step,
            level: s.level,
            currency: self.progression.points(),
            balls_in_flight: s.balls_in_flight(),
            live_blocks: s.live_block_count(),
            phase: s.phase,
            launch_gate_open: s.phase.gate_open(),
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.state.phase
    }

    pub fn is_over(&self) -> bool {
        self.state.phase == GamePhase::GameOver
    }

    /// Final summary once the run has ended
    pub fn summary(&self) -> Option<RunSummary> {
        self.state.summary
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Direct access for hosts that place entities themselves
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn progression(&self) -> &ProgressionStore {
        &self.progression
    }

    /// Hand the store back (e.g. to start the next run)
    pub fn into_progression(self) -> ProgressionStore {
        self.progression
    }

    fn record_run_if_over(&mut self) {
        if self.summary_recorded {
            return;
        }
        if let Some(summary) = self.state.summary {
            self.progression.record_run(&summary);
            self.summary_recorded = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::collision::ContactKind;

    fn controller() -> RunController {
        let mut tuning = Tuning::default();
        tuning.arena.builtin_contacts = false;
        RunController::new(tuning, 3, ProgressionStore::in_memory())
    }

    #[test]
    fn test_frame_runs_fixed_steps() {
        let mut rc = controller();
        rc.update(&TickInput::default(), 0.055).unwrap();
        assert!((rc.state().time - 6.0 * SIM_DT).abs() < 1e-4);
    }

    #[test]
    fn test_huge_frame_is_clamped() {
        let mut rc = controller();
        rc.update(&TickInput::default(), 5.0).unwrap();
        assert!(rc.state().time <= MAX_FRAME_DT + SIM_DT);
    }

    #[test]
    fn test_report_contact_unknown_ball() {
        let mut rc = controller();
        let contact = Contact {
            normal: Vec2::Y,
            kind: ContactKind::Wall,
        };
        assert_eq!(rc.report_contact(77, contact), Err(SimError::UnknownBall(77)));
    }

    #[test]
    fn test_observables_start_of_run() {
        let rc = controller();
        let obs = rc.observables();
        assert_eq!(obs.level, 1);
        assert_eq!(obs.score, 0);
        assert_eq!(obs.combo_multiplier, 1.0);
        assert_eq!(obs.phase, GamePhase::AimingAllowed);
        assert!(obs.launch_gate_open);
        assert_eq!(obs.currency, 0);
        assert!(obs.live_blocks > 0);
    }

    #[test]
    fn test_game_over_credits_store_once() {
        let mut rc = controller();
        rc.state_mut().waves_cleared = 2;
        rc.state_mut().score = 100;
        tick::game_over(rc.state_mut());
        rc.update(&TickInput::default(), SIM_DT).unwrap();
        rc.update(&TickInput::default(), SIM_DT).unwrap();
        assert_eq!(rc.observables().currency, 2 + 2);
        assert_eq!(rc.into_progression().points(), 4);
    }
}
