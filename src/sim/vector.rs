//! 2D vector helpers shared by flight, launch and bounce code
//!
//! Angles are radians unless a name says `_deg`. "Angle from horizontal"
//! is always the unsigned elevation in `[0, π/2]`.

use glam::Vec2;
use std::f32::consts::FRAC_PI_2;

/// Unit vector pointing at `theta`
#[inline]
pub fn unit_from_angle(theta: f32) -> Vec2 {
    Vec2::new(theta.cos(), theta.sin())
}

/// Reflect a vector off a surface
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect(v: Vec2, normal: Vec2) -> Vec2 {
    v - 2.0 * v.dot(normal) * normal
}

/// Rotate counter-clockwise by `angle`
#[inline]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    let (s, c) = angle.sin_cos();
    Vec2::new(v.x * c - v.y * s, v.x * s + v.y * c)
}

/// Unsigned angle between `v` and the horizontal axis, in [0, π/2]
#[inline]
pub fn angle_from_horizontal(v: Vec2) -> f32 {
    v.y.abs().atan2(v.x.abs())
}

/// Heading of `v` in [-π, π]
#[inline]
pub fn heading(v: Vec2) -> f32 {
    v.y.atan2(v.x)
}

/// Rescale `v` to exactly `speed`, leaving zero vectors alone
#[inline]
pub fn with_speed(v: Vec2, speed: f32) -> Vec2 {
    v.normalize_or_zero() * speed
}

/// Raise a direction to at least `min_angle` above/below horizontal
///
/// Keeps the horizontal and vertical signs of `dir`. A perfectly horizontal
/// direction is lifted upward. Returns a unit vector.
pub fn clamp_min_elevation(dir: Vec2, min_angle: f32) -> Vec2 {
    let dir = dir.normalize_or_zero();
    if dir == Vec2::ZERO || angle_from_horizontal(dir) >= min_angle {
        return dir;
    }
    let sx = if dir.x < 0.0 { -1.0 } else { 1.0 };
    let sy = if dir.y < 0.0 { -1.0 } else { 1.0 };
    Vec2::new(sx * min_angle.cos(), sy * min_angle.sin())
}

/// Clamp an aim vector into the launch cone `[min_angle, max_angle]`
///
/// Angles are measured counter-clockwise from +x. Anything outside the cone
/// (including downward aims) snaps to the nearer bound, and the result is
/// rebuilt from the clamped angle so it stays unit length.
/// Returns `None` for a zero or non-finite aim.
pub fn clamp_to_launch_cone(aim: Vec2, min_angle: f32, max_angle: f32) -> Option<Vec2> {
    let dir = aim.try_normalize()?;
    let theta = heading(dir);
    let clamped = if (min_angle..=max_angle).contains(&theta) {
        theta
    } else if theta > max_angle || theta < -FRAC_PI_2 {
        // Upper-left quadrant past the cone, or pointing down-left
        max_angle
    } else {
        min_angle
    };
    if clamped == theta {
        Some(dir)
    } else {
        Some(unit_from_angle(clamped))
    }
}

/// Rotate `dir` by `delta` away from the nearest coordinate axis
///
/// `side_hint` picks the rotation sense when `dir` lies exactly on an axis.
pub fn rotate_away_from_axis(dir: Vec2, delta: f32, side_hint: bool) -> Vec2 {
    let theta = heading(dir);
    let axis = (theta / FRAC_PI_2).round() * FRAC_PI_2;
    let offset = theta - axis;
    let sense = if offset > 0.0 {
        1.0
    } else if offset < 0.0 {
        -1.0
    } else if side_hint {
        1.0
    } else {
        -1.0
    };
    rotate(dir, sense * delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_reflect_off_vertical_wall() {
        let reflected = reflect(Vec2::new(100.0, 0.0), Vec2::new(-1.0, 0.0));
        assert!((reflected.x + 100.0).abs() < 0.001);
        assert!(reflected.y.abs() < 0.001);
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let r = rotate(Vec2::X, FRAC_PI_2);
        assert!(r.x.abs() < EPS);
        assert!((r.y - 1.0).abs() < EPS);
    }

    #[test]
    fn test_angle_from_horizontal_is_unsigned() {
        let a = angle_from_horizontal(Vec2::new(-1.0, -1.0));
        assert!((a - PI / 4.0).abs() < EPS);
        assert!(angle_from_horizontal(Vec2::new(-3.0, 0.0)).abs() < EPS);
    }

    #[test]
    fn test_clamp_min_elevation_keeps_quadrant() {
        let min = 15f32.to_radians();
        let d = clamp_min_elevation(Vec2::new(-1.0, -0.01), min);
        assert!(d.x < 0.0 && d.y < 0.0);
        assert!((angle_from_horizontal(d) - min).abs() < EPS);

        // Already steep enough: untouched
        let steep = Vec2::new(1.0, 1.0).normalize();
        assert_eq!(clamp_min_elevation(steep, min), steep);

        // Flat: lifted upward
        let flat = clamp_min_elevation(Vec2::X, min);
        assert!(flat.y > 0.0);
    }

    #[test]
    fn test_launch_cone_snaps_low_angle() {
        let min = 20f32.to_radians();
        let max = 160f32.to_radians();
        let aim = unit_from_angle(5f32.to_radians());
        let dir = clamp_to_launch_cone(aim, min, max).unwrap();
        assert!((heading(dir) - min).abs() < EPS);
        assert!((dir.length() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_launch_cone_downward_aims() {
        let min = 20f32.to_radians();
        let max = 160f32.to_radians();
        let down_right = clamp_to_launch_cone(Vec2::new(1.0, -0.5), min, max).unwrap();
        assert!((heading(down_right) - min).abs() < EPS);
        let down_left = clamp_to_launch_cone(Vec2::new(-1.0, -0.5), min, max).unwrap();
        assert!((heading(down_left) - max).abs() < EPS);
        assert!(clamp_to_launch_cone(Vec2::ZERO, min, max).is_none());
    }

    #[test]
    fn test_rotate_away_from_axis() {
        let near_up = unit_from_angle(FRAC_PI_2 - 0.01);
        let turned = rotate_away_from_axis(near_up, 0.1, true);
        assert!(turned.x > near_up.x);

        let on_axis = rotate_away_from_axis(Vec2::Y, 0.1, false);
        assert!(on_axis.x > 0.0);
    }

}
