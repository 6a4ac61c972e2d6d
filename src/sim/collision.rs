//! Contact detection for the built-in physics collaborator
//!
//! Circles against the arena walls and axis-aligned block cells. Produces
//! the same `Contact` values an external engine reports through
//! `RunController::report_contact`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::block::Block;
use crate::tuning::ArenaTuning;

/// What a ball touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactKind {
    Block(u32),
    /// Bottom return zone / ground
    ReturnZone,
    /// Any other solid surface
    Wall,
}

/// A contact reported for one ball
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Surface normal pointing toward the ball (zero if unresolvable)
    pub normal: Vec2,
    pub kind: ContactKind,
}

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Surface normal at collision (pointing toward ball center, for reflection)
    pub normal: Vec2,
    /// Penetration depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Check a ball against an axis-aligned rectangle
///
/// A center inside the rectangle pushes out through the nearest face.
pub fn ball_rect_collision(ball_pos: Vec2, ball_radius: f32, min: Vec2, max: Vec2) -> CollisionResult {
    let closest = ball_pos.clamp(min, max);
    let delta = ball_pos - closest;
    let dist_sq = delta.length_squared();

    if dist_sq > 0.0 {
        if dist_sq >= ball_radius * ball_radius {
            return CollisionResult::miss();
        }
        let dist = dist_sq.sqrt();
        return CollisionResult {
            hit: true,
            normal: delta / dist,
            penetration: ball_radius - dist,
        };
    }

    // Center inside: pick the shallowest face
    let faces = [
        (ball_pos.x - min.x, Vec2::NEG_X),
        (max.x - ball_pos.x, Vec2::X),
        (ball_pos.y - min.y, Vec2::NEG_Y),
        (max.y - ball_pos.y, Vec2::Y),
    ];
    let (depth, normal) = faces
        .into_iter()
        .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or((0.0, Vec2::Y));
    CollisionResult {
        hit: true,
        normal,
        penetration: depth + ball_radius,
    }
}

/// Check a ball against the side walls and ceiling
pub fn ball_wall_collision(ball_pos: Vec2, ball_radius: f32, arena: &ArenaTuning) -> CollisionResult {
    let candidates = [
        (arena.left - (ball_pos.x - ball_radius), Vec2::X),
        ((ball_pos.x + ball_radius) - arena.right, Vec2::NEG_X),
        ((ball_pos.y + ball_radius) - arena.ceiling, Vec2::NEG_Y),
    ];
    candidates
        .into_iter()
        .filter(|(depth, _)| *depth > 0.0)
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(penetration, normal)| CollisionResult {
            hit: true,
            normal,
            penetration,
        })
        .unwrap_or_else(CollisionResult::miss)
}

/// Check if ball dropped through the return line
pub fn ball_below_return(ball_pos: Vec2, arena: &ArenaTuning) -> bool {
    ball_pos.y < arena.return_y
}

/// Circle overlap (pickups)
pub fn circles_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    a.distance_squared(b) < (ra + rb) * (ra + rb)
}

/// Deepest solid contact for a ball this step, with overlap resolved
///
/// Only surfaces the ball is moving into count. The ball is pushed out
/// along the contact normal.
pub fn resolve_solid_contact(
    pos: &mut Vec2,
    vel: Vec2,
    radius: f32,
    blocks: &[Block],
    arena: &ArenaTuning,
) -> Option<Contact> {
    let mut best: Option<(f32, Contact)> = None;
    let mut consider = |result: CollisionResult, kind: ContactKind| {
        if !result.hit || vel.dot(result.normal) >= 0.0 {
            return;
        }
        if best.as_ref().is_none_or(|(depth, _)| result.penetration > *depth) {
            best = Some((
                result.penetration,
                Contact {
                    normal: result.normal,
                    kind,
                },
            ));
        }
    };

    consider(ball_wall_collision(*pos, radius, arena), ContactKind::Wall);
    for block in blocks.iter().filter(|b| b.is_alive()) {
        consider(
            ball_rect_collision(*pos, radius, block.min(), block.max()),
            ContactKind::Block(block.id),
        );
    }

    let (penetration, contact) = best?;
    *pos += contact.normal * penetration;
    Some(contact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_collision_from_below() {
        let result = ball_rect_collision(
            Vec2::new(0.0, -0.6),
            0.15,
            Vec2::splat(-0.5),
            Vec2::splat(0.5),
        );
        assert!(result.hit);
        assert_eq!(result.normal, Vec2::NEG_Y);
        assert!((result.penetration - 0.05).abs() < 1e-5);
    }

    #[test]
    fn test_rect_collision_miss() {
        let result =
            ball_rect_collision(Vec2::new(2.0, 0.0), 0.15, Vec2::splat(-0.5), Vec2::splat(0.5));
        assert!(!result.hit);
    }

    #[test]
    fn test_rect_collision_corner_normal_is_diagonal() {
        let result =
            ball_rect_collision(Vec2::new(0.6, 0.6), 0.2, Vec2::splat(-0.5), Vec2::splat(0.5));
        assert!(result.hit);
        assert!(result.normal.x > 0.0 && result.normal.y > 0.0);
    }

    #[test]
    fn test_rect_collision_center_inside() {
        let result =
            ball_rect_collision(Vec2::new(0.45, 0.0), 0.1, Vec2::splat(-0.5), Vec2::splat(0.5));
        assert!(result.hit);
        assert_eq!(result.normal, Vec2::X);
    }

    #[test]
    fn test_wall_collision() {
        let arena = ArenaTuning::default();
        // Ball inside - no collision
        assert!(!ball_wall_collision(Vec2::ZERO, 0.15, &arena).hit);
        // Touching right wall
        let result = ball_wall_collision(Vec2::new(arena.right - 0.1, 0.0), 0.15, &arena);
        assert!(result.hit);
        assert_eq!(result.normal, Vec2::NEG_X);
        // Touching ceiling
        let result = ball_wall_collision(Vec2::new(0.0, arena.ceiling), 0.15, &arena);
        assert_eq!(result.normal, Vec2::NEG_Y);
    }

    #[test]
    fn test_resolve_ignores_separating_motion() {
        let arena = ArenaTuning::default();
        let mut pos = Vec2::new(arena.right - 0.1, 0.0);
        // Already moving away from the wall
        let contact = resolve_solid_contact(&mut pos, Vec2::new(-5.0, 1.0), 0.15, &[], &arena);
        assert!(contact.is_none());

        let contact = resolve_solid_contact(&mut pos, Vec2::new(5.0, 1.0), 0.15, &[], &arena);
        assert_eq!(contact.unwrap().kind, ContactKind::Wall);
        assert!(pos.x + 0.15 <= arena.right + 1e-5, "pushed out of the wall");
    }

    #[test]
    fn test_return_line() {
        let arena = ArenaTuning::default();
        assert!(ball_below_return(Vec2::new(0.0, arena.return_y - 0.01), &arena));
        assert!(!ball_below_return(arena.launch_position, &arena));
    }
}
