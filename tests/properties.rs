use ballz::sim::vector::{angle_from_horizontal, clamp_to_launch_cone, heading, unit_from_angle};
use ballz::sim::{Ball, CollisionOutcome, Contact, ContactKind};
use ballz::tuning::{BlockBouncePolicy, FlightTuning};
use glam::Vec2;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_pcg::Pcg32;

fn launched(angle: f32, flight: &FlightTuning) -> Ball {
    let mut ball = Ball::new(1, Vec2::ZERO, 1.0);
    ball.launch(unit_from_angle(angle), flight.ball_speed, 1.0, 1.0, flight)
        .unwrap();
    ball
}

proptest! {
    #[test]
    fn launch_speed_is_base_times_multiplier(
        angle in 0.0f32..std::f32::consts::PI,
        base in 5.0f32..25.0,
        mult in 1.0f32..1.6,
    ) {
        let flight = FlightTuning::default();
        let mut ball = Ball::new(1, Vec2::ZERO, 1.0);
        ball.launch(unit_from_angle(angle), base, mult, 1.0, &flight).unwrap();
        prop_assert_eq!(ball.target_speed(), base * mult);
        prop_assert!((ball.vel.length() - base * mult).abs() <= 1e-4 * base * mult);
    }

    #[test]
    fn step_restores_target_speed(
        angle in 0.2f32..2.9,
        perturbed_angle in -3.1f32..3.1,
        perturbed_speed in 0.0f32..60.0,
        seed in any::<u64>(),
    ) {
        let flight = FlightTuning::default();
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut ball = launched(angle, &flight);
        ball.vel = unit_from_angle(perturbed_angle) * perturbed_speed;
        ball.pos += ball.vel / 120.0;
        ball.step(1.0 / 120.0, &flight, &mut rng);
        prop_assert!((ball.vel.length() - ball.target_speed()).abs() < 1e-3);
    }

    #[test]
    fn bounce_never_leaves_below_min_angle(
        angle in 0.1f32..3.0,
        incoming in -3.1f32..3.1,
        normal_angle in -3.1f32..3.1,
        now in 0.0f32..100.0,
        seed in any::<u64>(),
    ) {
        let flight = FlightTuning::default();
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut ball = launched(angle, &flight);
        ball.vel = unit_from_angle(incoming) * ball.target_speed();
        let contact = Contact { normal: unit_from_angle(normal_angle), kind: ContactKind::Wall };

        let outcome = ball.on_collision(&contact, now, &flight, &mut rng);
        prop_assert_eq!(outcome, CollisionOutcome::Bounced);
        prop_assert!(angle_from_horizontal(ball.vel) >= flight.min_bounce_angle() - 1e-4);
        prop_assert!((ball.vel.length() - ball.target_speed()).abs() < 1e-3);
    }

    #[test]
    fn block_bounce_never_leaves_below_min_angle(
        angle in 0.1f32..3.0,
        incoming in -3.1f32..3.1,
        normal_angle in -3.1f32..3.1,
        restitution in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let mut flight = FlightTuning::default();
        if restitution {
            flight.block_bounce = BlockBouncePolicy::EngineRestitution;
        }
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut ball = launched(angle, &flight);
        let normal = unit_from_angle(normal_angle);
        ball.vel = unit_from_angle(incoming) * ball.target_speed();
        if restitution && ball.vel.dot(normal) < 0.0 {
            // What the collaborator does before reporting the contact
            ball.vel -= 2.0 * ball.vel.dot(normal) * normal;
        }
        let contact = Contact { normal, kind: ContactKind::Block(3) };

        let outcome = ball.on_collision(&contact, 0.0, &flight, &mut rng);
        prop_assert!(
            matches!(outcome, CollisionOutcome::HitBlock { block_id: 3, .. }),
            "unexpected outcome {:?}",
            outcome
        );
        prop_assert!(angle_from_horizontal(ball.vel) >= flight.min_bounce_angle() - 1e-4);
        prop_assert!((ball.vel.length() - ball.target_speed()).abs() < 1e-3);
    }

    #[test]
    fn launch_cone_output_is_unit_and_inside_cone(
        x in -10.0f32..10.0,
        y in -10.0f32..10.0,
    ) {
        prop_assume!(x.abs() > 1e-3 || y.abs() > 1e-3);
        let (min, max) = (20f32.to_radians(), 160f32.to_radians());
        let dir = clamp_to_launch_cone(Vec2::new(x, y), min, max).unwrap();
        prop_assert!((dir.length() - 1.0).abs() < 1e-5);
        let theta = heading(dir);
        prop_assert!(theta >= min - 1e-4 && theta <= max + 1e-4, "theta {}", theta);
    }
}

#[test]
fn shallow_bounce_lands_exactly_on_min_angle() {
    let mut flight = FlightTuning::default();
    flight.bounce_variance_deg = 0.0;
    let min = flight.min_bounce_angle();
    let mut rng = Pcg32::seed_from_u64(2);
    let wall = Contact { normal: Vec2::NEG_X, kind: ContactKind::Wall };

    // Below the minimum: raised to it
    let mut ball = launched(1.0, &flight);
    ball.vel = unit_from_angle(5f32.to_radians()) * ball.target_speed();
    ball.on_collision(&wall, 0.0, &flight, &mut rng);
    assert!(ball.vel.x < 0.0 && ball.vel.y > 0.0);
    assert!(angle_from_horizontal(ball.vel) >= min - 1e-6);
    assert!((angle_from_horizontal(ball.vel) - min).abs() < 1e-5);

    // Exactly at the minimum: accepted as is
    let mut ball = launched(1.0, &flight);
    ball.vel = unit_from_angle(min) * ball.target_speed();
    ball.on_collision(&wall, 5.0, &flight, &mut rng);
    assert!((angle_from_horizontal(ball.vel) - min).abs() < 1e-5);
    assert!((ball.vel.length() - ball.target_speed()).abs() < 1e-3);
}

#[test]
fn launch_cone_accepts_its_lower_bound() {
    let flight = FlightTuning::default();
    let min = flight.min_bounce_angle();
    let dir = clamp_to_launch_cone(unit_from_angle(min), min, std::f32::consts::PI - min).unwrap();
    assert!((angle_from_horizontal(dir) - min).abs() < 1e-6);
}
