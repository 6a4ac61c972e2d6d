//! Fixed timestep simulation and frame update
//!
//! `fixed_step` runs at 120 Hz: integrate, gather contacts, let each ball
//! resolve them, then settle block damage, returns and pickups at the tick
//! boundary. `frame_update` runs once per rendered frame: aim input, due
//! continuations, the combo timer and round-end polling.

use glam::Vec2;
use rand::Rng;

use super::ball::{Ball, CollisionOutcome};
use super::block::BlockDestroyed;
use super::collision::{
    Contact, ContactKind, ball_below_return, circles_overlap, resolve_solid_contact,
};
use super::error::SimError;
use super::schedule::Continuation;
use super::state::{GameEvent, GamePhase, GameState, Pickup, PowerUpKind};
use super::vector::{clamp_to_launch_cone, reflect, rotate};
use crate::tuning::BlockBouncePolicy;

/// Input for one frame, in world coordinates
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    /// Pointer position (aim vector is pointer minus launch position)
    pub pointer: Option<Vec2>,
    /// Aim drag started
    pub pressed: bool,
    /// Aim drag released (fires the volley)
    pub released: bool,
}

/// Advance the run by one fixed timestep
pub fn fixed_step(state: &mut GameState, dt: f32) {
    if state.phase == GamePhase::GameOver {
        return;
    }

    let external = std::mem::take(&mut state.pending_contacts);
    let builtin = state.tuning.arena.builtin_contacts;
    let engine_restitution = state.tuning.flight.block_bounce == BlockBouncePolicy::EngineRestitution;
    let mut outcomes: Vec<(u32, CollisionOutcome)> = Vec::new();

    for ball in state.balls.iter_mut().filter(|b| b.is_flying()) {
        ball.pos += ball.vel * dt;

        let mut contacts: Vec<Contact> = external
            .iter()
            .filter(|(id, _)| *id == ball.id)
            .map(|(_, contact)| *contact)
            .collect();

        if builtin {
            if let Some(contact) = resolve_solid_contact(
                &mut ball.pos,
                ball.vel,
                ball.radius,
                &state.blocks,
                &state.tuning.arena,
            ) {
                if engine_restitution && matches!(contact.kind, ContactKind::Block(_)) {
                    ball.vel = reflect(ball.vel, contact.normal);
                }
                contacts.push(contact);
            }
            if ball_below_return(ball.pos, &state.tuning.arena) {
                contacts.push(Contact {
                    normal: Vec2::Y,
                    kind: ContactKind::ReturnZone,
                });
            }
        }

        for contact in &contacts {
            let outcome = ball.on_collision(contact, state.time, &state.tuning.flight, &mut state.rng);
            outcomes.push((ball.id, outcome));
        }

        ball.step(dt, &state.tuning.flight, &mut state.rng);
    }

    let collected = update_pickups(state, dt);

    // Tick boundary: settle everything the entities reported
    for (ball_id, outcome) in outcomes {
        match outcome {
            CollisionOutcome::HitBlock { block_id, damage } => {
                if let Err(e) = damage_block(state, block_id, damage) {
                    log::debug!("Ball {ball_id}: {e}");
                }
            }
            CollisionOutcome::Returned => on_ball_returned(state, ball_id),
            CollisionOutcome::Bounced | CollisionOutcome::Ignored => {}
        }
    }

    for (pickup_id, kind) in collected {
        state.push_event(GameEvent::PowerUpCollected { pickup_id, kind });
        if let Err(e) = apply_power_up(state, kind) {
            log::warn!("Power-up {kind:?} not applied: {e}");
        }
    }

    state.balls.retain(|b| !b.is_returned());
    state.blocks.retain(|b| b.is_alive());
    state.time += dt;

    evaluate_round_end(state);
    state.normalize_order();
}

/// Per-frame work: input, due continuations, combo timer, round-end polling
///
/// Input errors are returned after the rest of the frame has run; the run
/// never advances on them.
pub fn frame_update(state: &mut GameState, input: &TickInput, dt: f32) -> Result<(), SimError> {
    if state.phase == GamePhase::GameOver {
        if input.pressed || input.released {
            return Err(SimError::RunOver);
        }
        return Ok(());
    }

    let result = handle_input(state, input);

    for action in state.scheduler.take_due(state.time) {
        run_continuation(state, action);
    }

    tick_combo(state, dt);
    evaluate_round_end(state);
    result
}

fn handle_input(state: &mut GameState, input: &TickInput) -> Result<(), SimError> {
    if input.pressed {
        begin_aim(state, input.pointer)?;
    }
    if let Some(pointer) = input.pointer {
        update_aim(state, pointer);
    }
    if input.released {
        // Pointer-up with no drag in progress
        if state.phase == GamePhase::AimingAllowed {
            return Ok(());
        }
        release_aim(state)?;
    }
    Ok(())
}

/// `AimingAllowed -> Aiming`
pub fn begin_aim(state: &mut GameState, pointer: Option<Vec2>) -> Result<(), SimError> {
    match state.phase {
        GamePhase::AimingAllowed => {}
        GamePhase::Aiming => return Ok(()),
        GamePhase::GameOver => return Err(SimError::RunOver),
        phase => return Err(SimError::LaunchGateClosed { phase }),
    }
    if state.available_balls == 0 {
        return Err(SimError::NoBallsAvailable);
    }
    state.aim = pointer.map(|p| p - state.tuning.arena.launch_position);
    state.set_phase(GamePhase::Aiming);
    Ok(())
}

/// Track the drag while aiming
pub fn update_aim(state: &mut GameState, pointer: Vec2) {
    if state.phase == GamePhase::Aiming {
        state.aim = Some(pointer - state.tuning.arena.launch_position);
    }
}

/// `Aiming -> Launching`: clamp the aim into the launch cone and fire
///
/// Returns the launch direction. A zero aim cancels back to `AimingAllowed`.
pub fn release_aim(state: &mut GameState) -> Result<Vec2, SimError> {
    match state.phase {
        GamePhase::Aiming => {}
        GamePhase::GameOver => return Err(SimError::RunOver),
        phase => return Err(SimError::LaunchGateClosed { phase }),
    }

    let aim = state.aim.take().unwrap_or(Vec2::ZERO);
    let run = &state.tuning.run;
    let cone = clamp_to_launch_cone(
        aim,
        run.min_launch_angle_deg.to_radians(),
        run.max_launch_angle_deg.to_radians(),
    );
    let Some(direction) = cone else {
        state.set_phase(GamePhase::AimingAllowed);
        return Err(SimError::InvalidLaunchDirection { x: aim.x, y: aim.y });
    };

    let volley = match state.tuning.run.volley_size {
        Some(n) => n.min(state.available_balls),
        None => state.available_balls,
    };
    if volley == 0 {
        state.set_phase(GamePhase::AimingAllowed);
        return Err(SimError::NoBallsAvailable);
    }

    log::info!(
        "Volley of {} at {:.1}° (level {})",
        volley,
        direction.y.atan2(direction.x).to_degrees(),
        state.level
    );
    state.set_phase(GamePhase::Launching);
    launch_next(state, direction, volley);
    Ok(direction)
}

/// Launch one ball of a volley and queue the next one
fn launch_next(state: &mut GameState, direction: Vec2, remaining: u32) {
    if let Err(e) = launch_ball(state, direction) {
        log::warn!("Volley cut short: {e}");
        state.set_phase(GamePhase::BallsInFlight);
        return;
    }
    if remaining > 1 && state.available_balls > 0 {
        let due = state.time + state.tuning.run.launch_stagger;
        state.scheduler.schedule(
            due,
            Continuation::LaunchBall {
                direction,
                remaining: remaining - 1,
            },
        );
    } else {
        state.set_phase(GamePhase::BallsInFlight);
    }
}

/// Create and launch a single ball from the launch position
pub fn launch_ball(state: &mut GameState, direction: Vec2) -> Result<u32, SimError> {
    if state.available_balls == 0 {
        return Err(SimError::NoBallsAvailable);
    }
    let id = state.next_entity_id();
    let mut ball = Ball::new(id, state.tuning.arena.launch_position, state.modifiers.damage);
    let flight = &state.tuning.flight;
    ball.launch(
        direction,
        flight.ball_speed,
        state.modifiers.speed,
        state.modifiers.size,
        flight,
    )?;

    state.available_balls -= 1;
    state.in_flight.insert(id);
    let direction = ball.vel.normalize_or_zero();
    state.balls.push(ball);
    state.push_event(GameEvent::BallLaunched {
        ball_id: id,
        direction,
    });
    Ok(id)
}

fn run_continuation(state: &mut GameState, action: Continuation) {
    match action {
        Continuation::LaunchBall {
            direction,
            remaining,
        } => {
            if state.phase == GamePhase::Launching {
                launch_next(state, direction, remaining);
            }
        }
        Continuation::BeginNextWave { level } => load_next_wave(state, level),
        Continuation::EndSlowMotion => {
            state.time_scale = 1.0;
            log::info!("Slow motion over");
        }
    }
}

/// Deliver block damage; destruction credits score exactly once
pub fn damage_block(state: &mut GameState, block_id: u32, damage: u32) -> Result<(), SimError> {
    let block = state
        .blocks
        .iter_mut()
        .find(|b| b.id == block_id && b.is_alive())
        .ok_or(SimError::UnknownBlock(block_id))?;
    let destroyed = block.take_damage(damage);
    let hit_points = block.hit_points();

    match destroyed {
        Some(destroyed) => on_block_destroyed(state, destroyed),
        None => state.push_event(GameEvent::BlockDamaged {
            block_id,
            hit_points,
        }),
    }
    Ok(())
}

fn on_block_destroyed(state: &mut GameState, destroyed: BlockDestroyed) {
    if !state.live_blocks.remove(&destroyed.block_id) {
        return;
    }

    if state.combo_timer > 0.0 {
        state.combo += 1;
        state.push_event(GameEvent::Combo { combo: state.combo });
    }
    let multiplier = 1.0 + state.combo as f32 * state.tuning.run.combo_step;
    let score_delta = (destroyed.value as f32 * multiplier).round().max(0.0) as u64;
    state.score += score_delta;
    state.combo_timer = state.tuning.run.combo_window;

    state.push_event(GameEvent::BlockDestroyed {
        block_id: destroyed.block_id,
        value: destroyed.value,
        score_delta,
    });
    roll_power_up_drop(state, destroyed.pos);
}

/// Independent drop roll per destroyed block
fn roll_power_up_drop(state: &mut GameState, origin: Vec2) {
    let chance = state.tuning.power_ups.base_drop_chance * state.modifiers.drop_rate;
    if chance.is_nan() || chance <= 0.0 {
        return;
    }
    if !state.rng.random_bool(f64::from(chance.min(1.0))) {
        return;
    }

    let kind = PowerUpKind::ALL[state.rng.random_range(0..PowerUpKind::ALL.len())];
    let inset = state.tuning.power_ups.pickup_radius;
    let (left, right) = (
        state.tuning.arena.left + inset,
        state.tuning.arena.right - inset,
    );
    let x = if right > left {
        state.rng.random_range(left..right)
    } else {
        (left + right) * 0.5
    };
    let pos = Vec2::new(x, origin.y);

    let pickup_id = state.next_entity_id();
    state.pickups.push(Pickup {
        id: pickup_id,
        kind,
        pos,
        vel: Vec2::new(0.0, -state.tuning.power_ups.fall_speed),
    });
    log::debug!("Dropped {kind:?} at ({:.2}, {:.2})", pos.x, pos.y);
    state.push_event(GameEvent::PowerUpSpawned {
        pickup_id,
        kind,
        pos,
    });
}

/// Move pickups; returns the ones a ball touched this step
fn update_pickups(state: &mut GameState, dt: f32) -> Vec<(u32, PowerUpKind)> {
    let radius = state.tuning.power_ups.pickup_radius;
    let return_y = state.tuning.arena.return_y;
    let balls = &state.balls;
    let mut collected = Vec::new();

    state.pickups.retain_mut(|pickup| {
        pickup.pos += pickup.vel * dt;
        let touched = balls
            .iter()
            .any(|b| b.is_flying() && circles_overlap(b.pos, b.radius, pickup.pos, radius));
        if touched {
            collected.push((pickup.id, pickup.kind));
            false
        } else {
            // Missed pickups fall out of play
            pickup.pos.y >= return_y
        }
    });
    collected
}

/// Idempotent: only the first report for a ball counts
fn on_ball_returned(state: &mut GameState, ball_id: u32) {
    if state.in_flight.remove(&ball_id) {
        log::debug!("Ball {ball_id} returned, {} still in flight", state.in_flight.len());
        state.push_event(GameEvent::BallReturned { ball_id });
    }
}

/// Once the volley is out and every ball is back, decide what comes next
///
/// Balls left to launch reopen the gate (after the field steps down, when
/// enabled). Only an exhausted supply ends the wave: cleared if no block
/// stands, game over otherwise.
pub fn evaluate_round_end(state: &mut GameState) {
    if state.phase != GamePhase::BallsInFlight || !state.in_flight.is_empty() {
        return;
    }
    if state.available_balls > 0 {
        if state.tuning.run.descend_after_volley {
            state.descend_blocks();
            if state.field_breached() {
                log::info!("Blocks reached the launch line");
                game_over(state);
                return;
            }
        }
        state.set_phase(GamePhase::AimingAllowed);
    } else if state.live_blocks.is_empty() {
        begin_wave_clear(state);
    } else {
        game_over(state);
    }
}

fn begin_wave_clear(state: &mut GameState) {
    if !state.mark_level_cleared() {
        return;
    }
    state.waves_cleared += 1;
    state.set_phase(GamePhase::WaveClearing);
    let due = state.time + state.tuning.run.wave_settle_delay;
    state.scheduler.schedule(
        due,
        Continuation::BeginNextWave {
            level: state.level + 1,
        },
    );
    log::info!("Level {} cleared (score {})", state.level, state.score);
}

/// `WaveClearing -> NextWaveLoading -> AimingAllowed`
fn load_next_wave(state: &mut GameState, level: u32) {
    if state.phase != GamePhase::WaveClearing {
        return;
    }
    state.set_phase(GamePhase::NextWaveLoading);

    state.level = level;
    state.available_balls = state
        .tuning
        .run
        .ball_count_for_level(level, state.modifiers.extra_balls);
    state.combo = 0;
    state.combo_timer = 0.0;
    state.balls.clear();
    state.pickups.clear();
    state.spawn_level();

    state.set_phase(GamePhase::AimingAllowed);
}

/// Terminal transition: cancel pending work and publish the summary
pub fn game_over(state: &mut GameState) {
    if state.phase == GamePhase::GameOver {
        return;
    }
    let cancelled = state.scheduler.cancel_all();
    state.in_flight.clear();
    state.balls.clear();
    state.pickups.clear();
    state.pending_contacts.clear();
    state.aim = None;
    state.time_scale = 1.0;
    state.set_phase(GamePhase::GameOver);

    let summary = state.run_summary();
    state.summary = Some(summary);
    state.push_event(GameEvent::GameOver { summary });
    log::info!(
        "Game over at level {}: score {}, {} waves cleared ({} continuations cancelled)",
        summary.level,
        summary.score,
        summary.waves_cleared,
        cancelled
    );
}

fn tick_combo(state: &mut GameState, dt: f32) {
    if state.combo_timer <= 0.0 {
        return;
    }
    state.combo_timer -= dt;
    if state.combo_timer <= 0.0 {
        state.combo_timer = 0.0;
        if state.combo > 0 {
            state.combo = 0;
            state.push_event(GameEvent::Combo { combo: 0 });
        }
    }
}

/// Add one ball to this wave's supply
pub fn grant_extra_ball(state: &mut GameState) -> Result<u32, SimError> {
    if state.phase == GamePhase::GameOver {
        return Err(SimError::RunOver);
    }
    state.available_balls += 1;
    let available = state.available_balls;
    state.push_event(GameEvent::ExtraBallGranted { available });
    Ok(available)
}

/// Apply a power-up effect to the run
pub fn apply_power_up(state: &mut GameState, kind: PowerUpKind) -> Result<(), SimError> {
    if state.phase == GamePhase::GameOver {
        return Err(SimError::RunOver);
    }
    let power = state.tuning.power_ups.clone();

    match kind {
        PowerUpKind::MultiBall => {
            let spread = power.multi_ball_spread_deg.to_radians();
            let parents: Vec<Ball> = state.balls.iter().filter(|b| b.is_flying()).cloned().collect();
            for parent in &parents {
                for angle in [spread, -spread] {
                    let id = state.next_entity_id();
                    let mut ball = Ball::new(id, parent.pos, parent.damage_multiplier);
                    ball.launch_as_copy(parent, rotate(parent.vel, angle));
                    let direction = ball.vel.normalize_or_zero();
                    state.in_flight.insert(id);
                    state.balls.push(ball);
                    state.push_event(GameEvent::BallLaunched {
                        ball_id: id,
                        direction,
                    });
                }
            }
        }
        PowerUpKind::BallSize => {
            for ball in state.balls.iter_mut().filter(|b| b.is_flying()) {
                ball.radius *= power.ball_size_boost;
            }
        }
        PowerUpKind::SlowMotion => {
            state.time_scale = power.slow_motion_scale.clamp(0.01, 1.0);
            // A second pickup restarts the timer
            state
                .scheduler
                .cancel_where(|c| matches!(c, Continuation::EndSlowMotion));
            let due = state.time + power.slow_motion_duration;
            state.scheduler.schedule(due, Continuation::EndSlowMotion);
        }
        PowerUpKind::ExtraBall => {
            grant_extra_ball(state)?;
        }
    }

    log::info!("Power-up {kind:?} applied");
    state.push_event(GameEvent::PowerUpApplied { kind });
    Ok(())
}
