//! Run state and core simulation types
//!
//! Everything a run needs lives in `GameState`: entities, counters, the
//! seeded RNG and the continuation queue. Entities are kept sorted by id so
//! iteration order (and therefore every RNG draw) is stable for a seed.

use std::collections::BTreeSet;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::ball::Ball;
use super::block::Block;
use super::collision::Contact;
use super::schedule::Scheduler;
use super::spawner::{WaveSpec, spawn_row, spawn_wave};
use crate::progression::{Progression, RunSummary};
use crate::tuning::Tuning;

/// Run state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Gate open, waiting for the player to start aiming
    AimingAllowed,
    /// Aim drag in progress
    Aiming,
    /// Volley being released one ball at a time
    Launching,
    /// Every ball of the volley is out
    BallsInFlight,
    /// Wave cleared, waiting out the settle delay
    WaveClearing,
    /// Next wave being populated
    NextWaveLoading,
    /// Run ended
    GameOver,
}

impl GamePhase {
    /// Launch gate state
    pub fn gate_open(&self) -> bool {
        matches!(self, GamePhase::AimingAllowed | GamePhase::Aiming)
    }
}

/// Power-up types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerUpKind {
    MultiBall,
    BallSize,
    SlowMotion,
    ExtraBall,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 4] = [
        PowerUpKind::MultiBall,
        PowerUpKind::BallSize,
        PowerUpKind::SlowMotion,
        PowerUpKind::ExtraBall,
    ];
}

/// A falling power-up pickup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pickup {
    pub id: u32,
    pub kind: PowerUpKind,
    pub pos: Vec2,
    pub vel: Vec2,
}

/// Events for the UI/audio collaborators, drained by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    PhaseChanged { from: GamePhase, to: GamePhase },
    BallLaunched { ball_id: u32, direction: Vec2 },
    BallReturned { ball_id: u32 },
    BlockDamaged { block_id: u32, hit_points: u32 },
    BlockDestroyed { block_id: u32, value: u32, score_delta: u64 },
    Combo { combo: u32 },
    PowerUpSpawned { pickup_id: u32, kind: PowerUpKind, pos: Vec2 },
    PowerUpCollected { pickup_id: u32, kind: PowerUpKind },
    PowerUpApplied { kind: PowerUpKind },
    ExtraBallGranted { available: u32 },
    WaveSpawned { level: u32, blocks: u32 },
    /// Field moved down a row; `new_blocks` arrived in the top row
    FieldDescended { level: u32, new_blocks: u32 },
    GameOver { summary: RunSummary },
}

/// Progression multipliers frozen at run start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunModifiers {
    pub damage: f32,
    pub size: f32,
    pub speed: f32,
    pub extra_balls: u32,
    pub drop_rate: f32,
}

impl Default for RunModifiers {
    fn default() -> Self {
        Self::from(&Progression::default())
    }
}

impl From<&Progression> for RunModifiers {
    fn from(p: &Progression) -> Self {
        Self {
            damage: p.damage_multiplier,
            size: p.size_multiplier,
            speed: p.speed_multiplier,
            extra_balls: p.extra_balls_per_run,
            drop_rate: p.drop_rate_multiplier,
        }
    }
}

/// Complete run state (deterministic for a seed and input sequence)
#[derive(Debug, Clone)]
pub struct GameState {
    pub tuning: Tuning,
    pub modifiers: RunModifiers,
    /// Run seed for reproducibility
    pub seed: u64,
    pub rng: Pcg32,
    /// Simulated seconds since run start
    pub time: f32,
    /// Slow-motion factor applied to frame time
    pub time_scale: f32,
    pub phase: GamePhase,
    /// Current level (1-based)
    pub level: u32,
    pub waves_cleared: u32,
    pub score: u64,
    pub combo: u32,
    /// Seconds left in the combo window
    pub combo_timer: f32,
    /// Balls left to launch this wave
    pub available_balls: u32,
    /// Ids of balls launched and not yet returned
    pub in_flight: BTreeSet<u32>,
    /// Ids of blocks still standing
    pub live_blocks: BTreeSet<u32>,
    /// Active balls (sorted by id for determinism)
    pub balls: Vec<Ball>,
    /// Active blocks (sorted by id for determinism)
    pub blocks: Vec<Block>,
    /// Active pickups (sorted by id for determinism)
    pub pickups: Vec<Pickup>,
    /// Raw aim vector (pointer minus launch position)
    pub aim: Option<Vec2>,
    pub scheduler: Scheduler,
    /// Contacts reported by an external engine, consumed by the next step
    pub pending_contacts: Vec<(u32, Contact)>,
    /// Set once the run ends
    pub summary: Option<RunSummary>,
    events: Vec<GameEvent>,
    /// Last level whose clear has been started
    cleared_level: Option<u32>,
    next_id: u32,
}

impl GameState {
    /// Create a run at level 1 with the gate open
    pub fn new(tuning: Tuning, seed: u64, modifiers: RunModifiers) -> Self {
        let available_balls = tuning.run.ball_count_for_level(1, modifiers.extra_balls);
        let mut state = Self {
            tuning,
            modifiers,
            seed,
            rng: Pcg32::seed_from_u64(seed),
            time: 0.0,
            time_scale: 1.0,
            phase: GamePhase::AimingAllowed,
            level: 1,
            waves_cleared: 0,
            score: 0,
            combo: 0,
            combo_timer: 0.0,
            available_balls,
            in_flight: BTreeSet::new(),
            live_blocks: BTreeSet::new(),
            balls: Vec::new(),
            blocks: Vec::new(),
            pickups: Vec::new(),
            aim: None,
            scheduler: Scheduler::new(),
            pending_contacts: Vec::new(),
            summary: None,
            events: Vec::new(),
            cleared_level: None,
            next_id: 1,
        };
        state.spawn_level();
        state
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Move to `to`, recording the transition (no-op if already there)
    pub fn set_phase(&mut self, to: GamePhase) {
        let from = self.phase;
        if from == to {
            return;
        }
        log::info!("Phase {:?} -> {:?} (level {})", from, to, self.level);
        self.phase = to;
        self.push_event(GameEvent::PhaseChanged { from, to });
    }

    /// Replace the block field with a fresh wave for the current level
    pub fn spawn_level(&mut self) {
        let wave = WaveSpec::for_level(self.level, &self.tuning.spawn);
        let mut next_id = self.next_id;
        let blocks = spawn_wave(
            &wave,
            &self.tuning.spawn,
            &self.tuning.arena,
            &mut self.rng,
            &mut next_id,
        );
        self.next_id = next_id;
        self.live_blocks = blocks.iter().map(|b| b.id).collect();
        self.blocks = blocks;
        self.push_event(GameEvent::WaveSpawned {
            level: self.level,
            blocks: self.live_blocks.len() as u32,
        });
    }

    /// Step every block down one row and sample a new top row
    ///
    /// Returns the number of blocks added.
    pub fn descend_blocks(&mut self) -> u32 {
        let cell_size = self.tuning.spawn.cell_size;
        for block in &mut self.blocks {
            block.descend(cell_size);
        }

        let wave = WaveSpec::for_level(self.level, &self.tuning.spawn);
        let mut next_id = self.next_id;
        let row = spawn_row(
            &wave,
            0,
            &self.tuning.spawn,
            &self.tuning.arena,
            &mut self.rng,
            &mut next_id,
        );
        self.next_id = next_id;
        let new_blocks = row.len() as u32;
        self.live_blocks.extend(row.iter().map(|b| b.id));
        self.blocks.extend(row);
        self.blocks.sort_by_key(|b| b.id);

        log::debug!(
            "Field descended at level {}: {} new blocks, {} live",
            self.level,
            new_blocks,
            self.live_blocks.len()
        );
        self.push_event(GameEvent::FieldDescended {
            level: self.level,
            new_blocks,
        });
        new_blocks
    }

    /// Whether a live block has reached the launch line
    pub fn field_breached(&self) -> bool {
        let line = self.tuning.arena.launch_position.y;
        self.blocks
            .iter()
            .any(|b| b.is_alive() && b.min().y <= line)
    }

    /// Swap in a hand-built block field (level editors, scripted scenarios)
    pub fn replace_blocks(&mut self, blocks: Vec<Block>) {
        if let Some(max_id) = blocks.iter().map(|b| b.id).max() {
            self.next_id = self.next_id.max(max_id + 1);
        }
        self.live_blocks = blocks.iter().filter(|b| b.is_alive()).map(|b| b.id).collect();
        self.blocks = blocks;
        self.blocks.sort_by_key(|b| b.id);
    }

    /// Whether the clear for the current level has already been started
    pub fn level_cleared(&self) -> bool {
        self.cleared_level == Some(self.level)
    }

    /// Latch the clear for the current level; false if it was already latched
    pub fn mark_level_cleared(&mut self) -> bool {
        if self.level_cleared() {
            return false;
        }
        self.cleared_level = Some(self.level);
        true
    }

    pub fn balls_in_flight(&self) -> u32 {
        self.in_flight.len() as u32
    }

    pub fn live_block_count(&self) -> u32 {
        self.live_blocks.len() as u32
    }

    pub fn ball(&self, id: u32) -> Option<&Ball> {
        self.balls.iter().find(|b| b.id == id)
    }

    pub fn ball_mut(&mut self, id: u32) -> Option<&mut Ball> {
        self.balls.iter_mut().find(|b| b.id == id)
    }

    pub fn block(&self, id: u32) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Progression points this run is worth so far
    pub fn points_earned(&self) -> u32 {
        let per_score = self.tuning.run.points_per_score.max(1);
        let from_score = u32::try_from(self.score / per_score).unwrap_or(u32::MAX);
        self.waves_cleared.saturating_add(from_score)
    }

    pub fn run_summary(&self) -> RunSummary {
        RunSummary {
            score: self.score,
            level: self.level,
            waves_cleared: self.waves_cleared,
            points_earned: self.points_earned(),
        }
    }

    /// Ensure entities are sorted by ID for deterministic iteration
    pub fn normalize_order(&mut self) {
        self.balls.sort_by_key(|b| b.id);
        self.blocks.sort_by_key(|b| b.id);
        self.pickups.sort_by_key(|p| p.id);
    }
}
