//! Ballz headless runner
//!
//! Plays a run with a simple autoplayer (aim at a random live block, fire
//! the whole volley) and reports the result. Progression carries over
//! between invocations when `--save` points at a file.

use ballz::sim::{GameEvent, GamePhase, RunController, TickInput};
use ballz::{ProgressionStore, Tuning};
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Frame time the autoplayer renders at
const FRAME_DT: f32 = 1.0 / 60.0;

/// Counters gathered from the event stream
#[derive(Debug, Default)]
struct RunStats {
    volleys: u32,
    blocks_destroyed: u32,
    power_ups: u32,
    descents: u32,
    best_combo: u32,
}

impl RunStats {
    fn observe(&mut self, events: &[GameEvent]) {
        for event in events {
            match event {
                GameEvent::PhaseChanged {
                    to: GamePhase::Launching,
                    ..
                } => self.volleys += 1,
                GameEvent::BlockDestroyed { .. } => self.blocks_destroyed += 1,
                GameEvent::PowerUpCollected { .. } => self.power_ups += 1,
                GameEvent::FieldDescended { .. } => self.descents += 1,
                GameEvent::Combo { combo } => self.best_combo = self.best_combo.max(*combo),
                _ => {}
            }
        }
    }
}

/// Pick an aim point: a random live block, or straight up if none
fn choose_target(rc: &RunController, rng: &mut Pcg32) -> Vec2 {
    let state = rc.state();
    let live: Vec<Vec2> = state
        .blocks
        .iter()
        .filter(|b| b.is_alive())
        .map(|b| b.center)
        .collect();
    if live.is_empty() {
        return state.tuning.arena.launch_position + Vec2::Y;
    }
    live[rng.random_range(0..live.len())]
}

/// Drive a run to its end (or the given limits)
fn autoplay(
    rc: &mut RunController,
    seed: u64,
    max_levels: Option<u32>,
    max_seconds: f32,
) -> RunStats {
    let mut aim_rng = Pcg32::seed_from_u64(seed ^ 0x5eed_a11b);
    let mut stats = RunStats::default();
    let mut elapsed = 0.0;

    while !rc.is_over() && elapsed < max_seconds {
        if max_levels.is_some_and(|max| rc.observables().level > max) {
            log::info!("Level limit reached");
            break;
        }
        let input = if rc.phase() == GamePhase::AimingAllowed {
            TickInput {
                pointer: Some(choose_target(rc, &mut aim_rng)),
                pressed: true,
                released: true,
            }
        } else {
            TickInput::default()
        };
        if let Err(e) = rc.update(&input, FRAME_DT) {
            log::debug!("Autoplayer input rejected: {e}");
        }
        stats.observe(&rc.drain_events());
        elapsed += FRAME_DT;
    }
    stats
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::PathBuf;

    use anyhow::{Context, Result};
    use ballz::UpgradeKind;
    use ballz::persistence::JsonFileStore;
    use clap::Parser;

    use super::*;

    #[derive(Parser, Debug)]
    #[command(about = "Play a headless Ballz run with the autoplayer", version)]
    struct Args {
        /// Run seed (random if omitted)
        #[arg(long)]
        seed: Option<u64>,
        /// Stop after this many levels
        #[arg(long)]
        max_levels: Option<u32>,
        /// Stop after this much simulated play time
        #[arg(long, default_value_t = 600.0)]
        max_seconds: f32,
        /// Progression save file (in-memory if omitted)
        #[arg(long)]
        save: Option<PathBuf>,
        /// Tuning JSON file
        #[arg(long)]
        tuning: Option<PathBuf>,
        /// Wipe progression before the run
        #[arg(long)]
        reset: bool,
        /// Buy upgrades before the run (damage, size, speed, extra_ball, drop_rate)
        #[arg(long = "buy")]
        buy: Vec<String>,
    }

    pub fn run() -> Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        let args = Args::parse();

        let tuning = match &args.tuning {
            Some(path) => Tuning::load(path)
                .with_context(|| format!("loading tuning from {}", path.display()))?,
            None => Tuning::default(),
        };

        let mut store = match &args.save {
            Some(path) => {
                let backend = JsonFileStore::open(path)
                    .with_context(|| format!("opening save file {}", path.display()))?;
                ProgressionStore::load(Box::new(backend))
            }
            None => ProgressionStore::in_memory(),
        };
        if args.reset {
            store.reset();
        }
        for name in &args.buy {
            let kind: UpgradeKind = name.parse()?;
            if let Err(e) = store.purchase(kind) {
                log::warn!("Purchase of {name} refused: {e}");
            }
        }

        let seed = args.seed.unwrap_or_else(rand::random);
        let mut rc = RunController::new(tuning, seed, store);
        let stats = autoplay(&mut rc, seed, args.max_levels, args.max_seconds);

        let obs = rc.observables();
        println!("seed:             {seed}");
        println!("level reached:    {}", obs.level);
        println!("score:            {}", obs.score);
        println!("volleys:          {}", stats.volleys);
        println!("blocks destroyed: {}", stats.blocks_destroyed);
        println!("power-ups:        {}", stats.power_ups);
        println!("field descents:   {}", stats.descents);
        println!("best combo:       {}", stats.best_combo);
        match rc.summary() {
            Some(summary) => println!(
                "game over:        {} waves cleared, +{} points",
                summary.waves_cleared, summary.points_earned
            ),
            None => println!("game over:        no (stopped at limit)"),
        }
        println!("progression:      {} points", rc.progression().points());
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    native::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {
    use ballz::persistence::LocalStorageStore;

    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        return;
    }

    let store = match LocalStorageStore::open(LocalStorageStore::DEFAULT_KEY) {
        Ok(backend) => ProgressionStore::load(Box::new(backend)),
        Err(e) => {
            log::warn!("LocalStorage unavailable, progression will not persist: {e}");
            ProgressionStore::in_memory()
        }
    };
    let seed: u64 = rand::random();
    let mut rc = RunController::new(Tuning::default(), seed, store);
    let stats = autoplay(&mut rc, seed, None, 600.0);
    log::info!(
        "Run over: level {}, score {}, {} blocks destroyed",
        rc.observables().level,
        rc.observables().score,
        stats.blocks_destroyed
    );
}
