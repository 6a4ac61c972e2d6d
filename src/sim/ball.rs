//! Ball flight controller
//!
//! A ball flies at a fixed target speed from launch until it returns. Each
//! fixed step it checks for stalls, restores its speed and breaks up
//! axis-aligned loops; each contact either bounces it, damages a block or
//! retires it.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::collision::{Contact, ContactKind};
use super::error::SimError;
use super::vector::{
    clamp_min_elevation, reflect, rotate, rotate_away_from_axis, unit_from_angle, with_speed,
};
use crate::tuning::{BlockBouncePolicy, FlightTuning};

/// Speed error tolerated before re-normalizing
const SPEED_EPSILON: f32 = 1e-4;

/// Ball lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BallState {
    /// Created, not launched yet
    Ready,
    /// In flight
    Flying,
    /// Reached the return line; waiting for removal
    Returned,
}

/// What a contact did to the ball
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionOutcome {
    /// Velocity reflected off a solid surface
    Bounced,
    /// Hit a block; the caller delivers `damage`
    HitBlock { block_id: u32, damage: u32 },
    /// First contact with the return zone
    Returned,
    /// Nothing happened (ball not flying, repeat return, ...)
    Ignored,
}

/// A ball entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ball {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub state: BallState,
    pub damage_multiplier: f32,
    /// Fixed at launch
    target_speed: f32,
    /// Position sampled at the end of the previous step
    last_pos: Vec2,
    stuck_timer: f32,
    consecutive_bounces: u32,
    last_bounce_time: Option<f32>,
}

impl Ball {
    pub fn new(id: u32, pos: Vec2, damage_multiplier: f32) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            radius: 0.0,
            state: BallState::Ready,
            damage_multiplier,
            target_speed: 0.0,
            last_pos: pos,
            stuck_timer: 0.0,
            consecutive_bounces: 0,
            last_bounce_time: None,
        }
    }

    pub fn target_speed(&self) -> f32 {
        self.target_speed
    }

    pub fn is_flying(&self) -> bool {
        self.state == BallState::Flying
    }

    pub fn is_returned(&self) -> bool {
        self.state == BallState::Returned
    }

    pub fn consecutive_bounces(&self) -> u32 {
        self.consecutive_bounces
    }

    pub fn stuck_timer(&self) -> f32 {
        self.stuck_timer
    }

    /// Damage dealt per block hit
    pub fn damage(&self) -> u32 {
        let rounded = self.damage_multiplier.round();
        if rounded.is_finite() && rounded >= 1.0 {
            rounded as u32
        } else {
            1
        }
    }

    /// Launch along `direction` at `base_speed * speed_multiplier`
    ///
    /// `direction` must be non-zero with a non-negative vertical component;
    /// it is normalized here. The target speed is clamped to the tuning's
    /// speed range.
    pub fn launch(
        &mut self,
        direction: Vec2,
        base_speed: f32,
        speed_multiplier: f32,
        size_multiplier: f32,
        flight: &FlightTuning,
    ) -> Result<(), SimError> {
        let invalid = SimError::InvalidLaunchDirection {
            x: direction.x,
            y: direction.y,
        };
        let dir = direction.try_normalize().ok_or(invalid.clone())?;
        if dir.y < -f32::EPSILON {
            return Err(invalid);
        }

        self.target_speed =
            (base_speed * speed_multiplier).clamp(flight.min_ball_speed, flight.max_ball_speed);
        self.vel = dir * self.target_speed;
        self.radius = flight.ball_radius * size_multiplier.max(0.01);
        self.state = BallState::Flying;
        self.last_pos = self.pos;
        self.stuck_timer = 0.0;
        self.consecutive_bounces = 0;
        self.last_bounce_time = None;
        Ok(())
    }

    /// Take over the flight of `parent` along a new heading (multi-ball)
    pub fn launch_as_copy(&mut self, parent: &Ball, direction: Vec2) {
        self.target_speed = parent.target_speed;
        self.vel = with_speed(direction, parent.target_speed);
        self.radius = parent.radius;
        self.state = BallState::Flying;
        self.last_pos = self.pos;
    }

    /// Fixed-step housekeeping after the physics collaborator moved the ball
    pub fn step<R: Rng>(&mut self, dt: f32, flight: &FlightTuning, rng: &mut R) {
        if self.state != BallState::Flying {
            return;
        }

        // 1. Stall detection
        let displacement = (self.pos - self.last_pos).length();
        let speed = self.vel.length();
        if displacement < flight.stuck_displacement && speed < self.target_speed * 0.5 {
            self.stuck_timer += dt;
            if self.stuck_timer > flight.stuck_time_limit {
                self.recover_from_stall(flight, rng);
            }
        } else {
            self.stuck_timer = 0.0;
        }
        self.last_pos = self.pos;

        // 2. Speed restore
        self.restore_speed(flight, rng);

        // 3. Axis-aligned loop guard
        let limit = flight.degenerate_ratio * self.target_speed;
        if self.vel.x.abs() < limit || self.vel.y.abs() < limit {
            let delta = random_angle(
                rng,
                flight.degenerate_rotation_min_deg,
                flight.degenerate_rotation_max_deg,
            );
            let side = rng.random_bool(0.5);
            self.vel = rotate_away_from_axis(self.vel, delta, side);
            self.vel = with_speed(self.vel, self.target_speed);
        }
    }

    /// Resolve one contact reported by the physics collaborator
    pub fn on_collision<R: Rng>(
        &mut self,
        contact: &Contact,
        now: f32,
        flight: &FlightTuning,
        rng: &mut R,
    ) -> CollisionOutcome {
        if self.state != BallState::Flying {
            return CollisionOutcome::Ignored;
        }
        match contact.kind {
            ContactKind::ReturnZone => {
                if self.mark_returned() {
                    CollisionOutcome::Returned
                } else {
                    CollisionOutcome::Ignored
                }
            }
            ContactKind::Block(block_id) => {
                // Under engine restitution the collaborator already mirrored
                // the velocity; only the corrections run here
                let reflect_incoming = flight.block_bounce == BlockBouncePolicy::Reflect;
                self.bounce(contact.normal, reflect_incoming, now, flight, rng);
                CollisionOutcome::HitBlock {
                    block_id,
                    damage: self.damage(),
                }
            }
            ContactKind::Wall => {
                if self.bounce(contact.normal, true, now, flight, rng) {
                    CollisionOutcome::Bounced
                } else {
                    CollisionOutcome::Ignored
                }
            }
        }
    }

    /// Retire the ball. True only on the first call.
    pub fn mark_returned(&mut self) -> bool {
        if self.state == BallState::Returned {
            return false;
        }
        self.state = BallState::Returned;
        self.vel = Vec2::ZERO;
        true
    }

    /// Apply the bounce rule; false if the contact could not be resolved
    ///
    /// With `reflect_incoming` unset the velocity is taken as already
    /// mirrored and only variance, the rapid-bounce kick, the surface guard
    /// and the elevation clamp are applied.
    fn bounce<R: Rng>(
        &mut self,
        normal: Vec2,
        reflect_incoming: bool,
        now: f32,
        flight: &FlightTuning,
        rng: &mut R,
    ) -> bool {
        let (Some(n), Some(incoming)) = (normal.try_normalize(), self.vel.try_normalize()) else {
            return false;
        };

        // Already separating: the collaborator resolved this contact itself
        let mut dir = if reflect_incoming && incoming.dot(n) < 0.0 {
            reflect(incoming, n)
        } else {
            incoming
        };

        self.consecutive_bounces = match self.last_bounce_time {
            Some(last) if now - last <= flight.rapid_bounce_window => self.consecutive_bounces + 1,
            _ => 1,
        };
        self.last_bounce_time = Some(now);

        let variance = flight.bounce_variance_deg.to_radians();
        if variance > 0.0 {
            dir = rotate(dir, rng.random_range(-variance..=variance));
        }

        if self.consecutive_bounces >= flight.rapid_bounce_count {
            let kick = random_angle(
                rng,
                flight.rapid_correction_min_deg,
                flight.rapid_correction_max_deg,
            );
            let sign = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
            dir = rotate(dir, sign * kick);
            log::debug!(
                "Ball {} bounced {} times within {}s, kicking by {:.1}°",
                self.id,
                self.consecutive_bounces,
                flight.rapid_bounce_window,
                (sign * kick).to_degrees()
            );
            self.consecutive_bounces = 0;
        }

        // Perturbation must not steer back into the surface
        if dir.dot(n) < 0.0 {
            dir = reflect(dir, n);
        }

        dir = clamp_min_elevation(dir, flight.min_bounce_angle());
        self.vel = dir * self.target_speed;
        true
    }

    fn recover_from_stall<R: Rng>(&mut self, flight: &FlightTuning, rng: &mut R) {
        let heading = random_angle(rng, flight.stuck_arc_min_deg, flight.stuck_arc_max_deg);
        self.vel = unit_from_angle(heading) * self.target_speed;
        let nudge = flight.stuck_nudge;
        if nudge > 0.0 {
            self.pos += Vec2::new(
                rng.random_range(-nudge..=nudge),
                rng.random_range(0.0..=nudge),
            );
        }
        self.stuck_timer = 0.0;
        log::debug!(
            "Ball {} stalled at ({:.2}, {:.2}), relaunched at {:.1}°",
            self.id,
            self.pos.x,
            self.pos.y,
            heading.to_degrees()
        );
    }

    fn restore_speed<R: Rng>(&mut self, flight: &FlightTuning, rng: &mut R) {
        let speed = self.vel.length();
        if (speed - self.target_speed).abs() <= SPEED_EPSILON {
            return;
        }
        if speed <= SPEED_EPSILON {
            // Nothing to rescale: pick a fresh upward heading
            let heading = random_angle(rng, flight.stuck_arc_min_deg, flight.stuck_arc_max_deg);
            self.vel = unit_from_angle(heading) * self.target_speed;
        } else {
            self.vel = self.vel / speed * self.target_speed;
        }
    }
}

/// Uniform angle in `[min_deg, max_deg]`, radians
fn random_angle<R: Rng>(rng: &mut R, min_deg: f32, max_deg: f32) -> f32 {
    if max_deg > min_deg {
        rng.random_range(min_deg..=max_deg).to_radians()
    } else {
        min_deg.to_radians()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::vector::angle_from_horizontal;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn launched(dir: Vec2) -> (Ball, FlightTuning) {
        let flight = FlightTuning::default();
        let mut ball = Ball::new(1, Vec2::ZERO, 1.0);
        ball.launch(dir, 15.0, 1.0, 1.0, &flight).unwrap();
        (ball, flight)
    }

    fn wall(normal: Vec2) -> Contact {
        Contact {
            normal,
            kind: ContactKind::Wall,
        }
    }

    #[test]
    fn test_launch_sets_exact_speed() {
        let flight = FlightTuning::default();
        let mut ball = Ball::new(1, Vec2::ZERO, 1.0);
        ball.launch(Vec2::new(0.3, 0.8), 15.0, 1.2, 0.5, &flight).unwrap();
        assert_eq!(ball.target_speed(), 18.0);
        assert!((ball.vel.length() - 18.0).abs() < 1e-4);
        assert!((ball.radius - flight.ball_radius * 0.5).abs() < 1e-6);
        assert!(ball.is_flying());
    }

    #[test]
    fn test_launch_rejects_downward_and_zero() {
        let flight = FlightTuning::default();
        let mut ball = Ball::new(1, Vec2::ZERO, 1.0);
        assert!(ball.launch(Vec2::new(0.5, -0.5), 15.0, 1.0, 1.0, &flight).is_err());
        assert!(ball.launch(Vec2::ZERO, 15.0, 1.0, 1.0, &flight).is_err());
        assert_eq!(ball.state, BallState::Ready);
    }

    #[test]
    fn test_launch_clamps_to_speed_range() {
        let flight = FlightTuning::default();
        let mut ball = Ball::new(1, Vec2::ZERO, 1.0);
        ball.launch(Vec2::Y, 15.0, 100.0, 1.0, &flight).unwrap();
        assert_eq!(ball.target_speed(), flight.max_ball_speed);
    }

    #[test]
    fn test_step_restores_target_speed() {
        let (mut ball, flight) = launched(Vec2::new(0.6, 0.8));
        let mut rng = Pcg32::seed_from_u64(7);
        ball.vel *= 0.7;
        ball.pos += ball.vel / 120.0;
        ball.step(1.0 / 120.0, &flight, &mut rng);
        assert!((ball.vel.length() - 15.0).abs() < 1e-3);
    }

    #[test]
    fn test_stall_recovers_after_time_limit() {
        let (mut ball, flight) = launched(Vec2::new(0.6, 0.8));
        let mut rng = Pcg32::seed_from_u64(3);
        let dt = 0.2;
        for _ in 0..2 {
            // Collaborator keeps damping the ball to a crawl without moving it
            ball.vel = Vec2::new(0.6, 0.8);
            ball.step(dt, &flight, &mut rng);
        }
        assert!(ball.stuck_timer() > 0.0);
        ball.vel = Vec2::new(0.6, 0.8);
        ball.step(dt, &flight, &mut rng);
        assert_eq!(ball.stuck_timer(), 0.0, "timer resets on recovery");
        assert!(ball.vel.y > 0.0, "recovery heads upward");
        assert!((ball.vel.length() - 15.0).abs() < 1e-3);
    }

    #[test]
    fn test_moving_ball_never_accumulates_stall() {
        let (mut ball, flight) = launched(Vec2::new(0.6, 0.8));
        let mut rng = Pcg32::seed_from_u64(3);
        for _ in 0..100 {
            ball.pos += ball.vel / 120.0;
            ball.step(1.0 / 120.0, &flight, &mut rng);
            assert_eq!(ball.stuck_timer(), 0.0);
        }
    }

    #[test]
    fn test_vertical_travel_is_tilted() {
        let (mut ball, flight) = launched(Vec2::Y);
        let mut rng = Pcg32::seed_from_u64(11);
        ball.pos += ball.vel / 120.0;
        ball.step(1.0 / 120.0, &flight, &mut rng);
        let tilt = ball.vel.x.abs() / ball.target_speed();
        assert!(tilt >= (5f32).to_radians().sin() - 1e-4);
        assert!((ball.vel.length() - 15.0).abs() < 1e-3);
    }

    #[test]
    fn test_wall_bounce_respects_min_angle() {
        let (mut ball, flight) = launched(Vec2::new(0.6, 0.8));
        let mut rng = Pcg32::seed_from_u64(5);
        // Nearly horizontal into the right wall
        ball.vel = Vec2::new(15.0, 0.1);
        let outcome = ball.on_collision(&wall(Vec2::NEG_X), 0.0, &flight, &mut rng);
        assert_eq!(outcome, CollisionOutcome::Bounced);
        assert!(ball.vel.x < 0.0);
        assert!(angle_from_horizontal(ball.vel) >= flight.min_bounce_angle() - 1e-5);
        assert!((ball.vel.length() - 15.0).abs() < 1e-3);
    }

    #[test]
    fn test_rapid_bounces_escalate_and_reset() {
        let (mut ball, flight) = launched(Vec2::new(0.6, 0.8));
        let mut rng = Pcg32::seed_from_u64(9);
        ball.vel = Vec2::new(10.0, 10.0);
        ball.on_collision(&wall(Vec2::NEG_X), 1.00, &flight, &mut rng);
        assert_eq!(ball.consecutive_bounces(), 1);
        ball.vel = Vec2::new(10.0, 10.0);
        ball.on_collision(&wall(Vec2::NEG_X), 1.05, &flight, &mut rng);
        assert_eq!(ball.consecutive_bounces(), 2);
        ball.vel = Vec2::new(10.0, 10.0);
        ball.on_collision(&wall(Vec2::NEG_X), 1.10, &flight, &mut rng);
        assert_eq!(ball.consecutive_bounces(), 0, "third rapid bounce resets");

        // A slow bounce starts a fresh count
        ball.vel = Vec2::new(10.0, 10.0);
        ball.on_collision(&wall(Vec2::NEG_X), 5.0, &flight, &mut rng);
        assert_eq!(ball.consecutive_bounces(), 1);
    }

    #[test]
    fn test_zero_normal_leaves_velocity() {
        let (mut ball, flight) = launched(Vec2::new(0.6, 0.8));
        let mut rng = Pcg32::seed_from_u64(1);
        let before = ball.vel;
        let outcome = ball.on_collision(&wall(Vec2::ZERO), 0.0, &flight, &mut rng);
        assert_eq!(outcome, CollisionOutcome::Ignored);
        assert_eq!(ball.vel, before);
    }

    #[test]
    fn test_block_hit_reports_rounded_damage() {
        let flight = FlightTuning::default();
        let mut rng = Pcg32::seed_from_u64(1);
        let mut ball = Ball::new(1, Vec2::ZERO, 2.6);
        ball.launch(Vec2::Y, 15.0, 1.0, 1.0, &flight).unwrap();
        let contact = Contact {
            normal: Vec2::NEG_Y,
            kind: ContactKind::Block(42),
        };
        let outcome = ball.on_collision(&contact, 0.0, &flight, &mut rng);
        assert_eq!(
            outcome,
            CollisionOutcome::HitBlock {
                block_id: 42,
                damage: 3
            }
        );
        assert!(ball.vel.y < 0.0, "reflect policy bounces off the block");
        assert_eq!(Ball::new(2, Vec2::ZERO, 0.2).damage(), 1);
    }

    #[test]
    fn test_engine_restitution_corrects_mirrored_velocity() {
        let mut flight = FlightTuning::default();
        flight.block_bounce = BlockBouncePolicy::EngineRestitution;
        let mut rng = Pcg32::seed_from_u64(1);
        let mut ball = Ball::new(1, Vec2::ZERO, 1.0);
        ball.launch(Vec2::new(0.6, 0.8), 15.0, 1.0, 1.0, &flight).unwrap();
        // Collaborator already sent the ball back down off the block's bottom face
        ball.vel = Vec2::new(9.0, -12.0);
        let contact = Contact {
            normal: Vec2::NEG_Y,
            kind: ContactKind::Block(1),
        };
        let outcome = ball.on_collision(&contact, 0.0, &flight, &mut rng);
        assert!(matches!(outcome, CollisionOutcome::HitBlock { block_id: 1, .. }));
        assert!(ball.vel.y < 0.0, "no second reflection");
        assert_eq!(ball.consecutive_bounces(), 1);
        assert!((ball.vel.length() - 15.0).abs() < 1e-3);
    }

    #[test]
    fn test_engine_restitution_shallow_block_bounce_is_clamped() {
        let mut flight = FlightTuning::default();
        flight.block_bounce = BlockBouncePolicy::EngineRestitution;
        let mut rng = Pcg32::seed_from_u64(4);
        let mut ball = Ball::new(1, Vec2::ZERO, 1.0);
        ball.launch(Vec2::new(0.6, 0.8), 15.0, 1.0, 1.0, &flight).unwrap();
        // 8 degrees into a left face, already mirrored by the collaborator
        ball.vel = unit_from_angle(8f32.to_radians()) * 15.0 * Vec2::new(-1.0, 1.0);
        let contact = Contact {
            normal: Vec2::NEG_X,
            kind: ContactKind::Block(7),
        };
        ball.on_collision(&contact, 0.0, &flight, &mut rng);
        assert!(ball.vel.x < 0.0);
        assert!(angle_from_horizontal(ball.vel) >= flight.min_bounce_angle() - 1e-5);
        assert!((ball.vel.length() - 15.0).abs() < 1e-3);
    }

    #[test]
    fn test_near_horizontal_travel_is_tilted() {
        let (mut ball, flight) = launched(Vec2::new(0.6, 0.8));
        let mut rng = Pcg32::seed_from_u64(13);
        ball.vel = Vec2::new(-15.0, 0.5);
        ball.pos += ball.vel / 120.0;
        ball.step(1.0 / 120.0, &flight, &mut rng);
        let lift = ball.vel.y.abs() / ball.target_speed();
        assert!(lift >= 0.1 - 1e-4, "still hugging the horizontal: {:?}", ball.vel);
        assert!(ball.vel.x < 0.0, "keeps its horizontal direction");
        assert!((ball.vel.length() - 15.0).abs() < 1e-3);
    }

    #[test]
    fn test_return_fires_once() {
        let (mut ball, flight) = launched(Vec2::Y);
        let mut rng = Pcg32::seed_from_u64(1);
        let contact = Contact {
            normal: Vec2::Y,
            kind: ContactKind::ReturnZone,
        };
        assert_eq!(
            ball.on_collision(&contact, 0.0, &flight, &mut rng),
            CollisionOutcome::Returned
        );
        assert_eq!(
            ball.on_collision(&contact, 0.0, &flight, &mut rng),
            CollisionOutcome::Ignored
        );
        assert!(!ball.mark_returned());
    }
}
