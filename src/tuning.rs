//! Data-driven game balance
//!
//! Every gameplay number lives here so a run can be re-tuned from a JSON
//! file without touching simulation code. Angles are stored in degrees.

use std::fs;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;

/// How a ball responds when it hits a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockBouncePolicy {
    /// The flight controller applies the full bounce rule on block hits
    #[default]
    Reflect,
    /// The physics collaborator mirrors the velocity; the ball applies the
    /// bounce corrections without reflecting again
    EngineRestitution,
}

/// Ball flight parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightTuning {
    pub ball_speed: f32,
    pub min_ball_speed: f32,
    pub max_ball_speed: f32,
    pub ball_radius: f32,
    pub stuck_displacement: f32,
    pub stuck_time_limit: f32,
    pub stuck_arc_min_deg: f32,
    pub stuck_arc_max_deg: f32,
    pub stuck_nudge: f32,
    pub degenerate_ratio: f32,
    pub degenerate_rotation_min_deg: f32,
    pub degenerate_rotation_max_deg: f32,
    pub min_bounce_angle_deg: f32,
    pub bounce_variance_deg: f32,
    pub rapid_bounce_window: f32,
    pub rapid_bounce_count: u32,
    pub rapid_correction_min_deg: f32,
    pub rapid_correction_max_deg: f32,
    pub block_bounce: BlockBouncePolicy,
}

impl Default for FlightTuning {
    fn default() -> Self {
        Self {
            ball_speed: BALL_SPEED,
            min_ball_speed: MIN_BALL_SPEED,
            max_ball_speed: MAX_BALL_SPEED,
            ball_radius: BALL_RADIUS,
            stuck_displacement: STUCK_DISPLACEMENT,
            stuck_time_limit: STUCK_TIME_LIMIT,
            stuck_arc_min_deg: STUCK_ARC_MIN_DEG,
            stuck_arc_max_deg: STUCK_ARC_MAX_DEG,
            stuck_nudge: STUCK_NUDGE,
            degenerate_ratio: DEGENERATE_RATIO,
            degenerate_rotation_min_deg: DEGENERATE_ROTATION_MIN_DEG,
            degenerate_rotation_max_deg: DEGENERATE_ROTATION_MAX_DEG,
            min_bounce_angle_deg: MIN_BOUNCE_ANGLE_DEG,
            bounce_variance_deg: BOUNCE_VARIANCE_DEG,
            rapid_bounce_window: RAPID_BOUNCE_WINDOW,
            rapid_bounce_count: RAPID_BOUNCE_COUNT,
            rapid_correction_min_deg: RAPID_CORRECTION_MIN_DEG,
            rapid_correction_max_deg: RAPID_CORRECTION_MAX_DEG,
            block_bounce: BlockBouncePolicy::Reflect,
        }
    }
}

impl FlightTuning {
    #[inline]
    pub fn min_bounce_angle(&self) -> f32 {
        self.min_bounce_angle_deg.to_radians()
    }
}

/// Run state machine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunTuning {
    pub min_launch_angle_deg: f32,
    pub max_launch_angle_deg: f32,
    pub launch_stagger: f32,
    /// Balls per release; `None` fires every available ball
    pub volley_size: Option<u32>,
    pub base_ball_count: u32,
    pub ball_bonus_per_level: u32,
    pub combo_window: f32,
    pub combo_step: f32,
    pub wave_settle_delay: f32,
    /// Shift the field down a row and add a fresh top row after each volley
    pub descend_after_volley: bool,
    pub points_per_score: u64,
}

impl Default for RunTuning {
    fn default() -> Self {
        Self {
            min_launch_angle_deg: MIN_LAUNCH_ANGLE_DEG,
            max_launch_angle_deg: MAX_LAUNCH_ANGLE_DEG,
            launch_stagger: LAUNCH_STAGGER,
            volley_size: None,
            base_ball_count: BASE_BALL_COUNT,
            ball_bonus_per_level: BALL_BONUS_PER_LEVEL,
            combo_window: COMBO_WINDOW,
            combo_step: COMBO_STEP,
            wave_settle_delay: WAVE_SETTLE_DELAY,
            descend_after_volley: DESCEND_AFTER_VOLLEY,
            points_per_score: POINTS_PER_SCORE,
        }
    }
}

impl RunTuning {
    /// Balls available at the start of `level` (1-based)
    pub fn ball_count_for_level(&self, level: u32, extra_balls: u32) -> u32 {
        self.base_ball_count + self.ball_bonus_per_level * level.saturating_sub(1) + extra_balls
    }
}

/// Wave/grid spawner parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnTuning {
    pub grid_width: u32,
    pub cell_size: f32,
    pub cell_gap: f32,
    pub top_margin: f32,
    pub base_density: f32,
    pub density_step_per_level: f32,
    pub min_density: f32,
    pub max_density: f32,
    pub base_rows: u32,
    pub max_rows: u32,
}

impl Default for SpawnTuning {
    fn default() -> Self {
        Self {
            grid_width: GRID_WIDTH,
            cell_size: CELL_SIZE,
            cell_gap: CELL_GAP,
            top_margin: GRID_TOP_MARGIN,
            base_density: BASE_DENSITY,
            density_step_per_level: DENSITY_STEP_PER_LEVEL,
            min_density: MIN_DENSITY,
            max_density: MAX_DENSITY,
            base_rows: BASE_ROWS,
            max_rows: MAX_ROWS,
        }
    }
}

/// Play field geometry and the built-in contact collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaTuning {
    pub left: f32,
    pub right: f32,
    pub ceiling: f32,
    pub return_y: f32,
    pub launch_position: Vec2,
    /// Detect wall/block/return contacts internally (off when an external engine reports them)
    pub builtin_contacts: bool,
}

impl Default for ArenaTuning {
    fn default() -> Self {
        Self {
            left: ARENA_LEFT,
            right: ARENA_RIGHT,
            ceiling: ARENA_CEILING,
            return_y: RETURN_Y,
            launch_position: Vec2::new(LAUNCH_X, LAUNCH_Y),
            builtin_contacts: true,
        }
    }
}

/// Power-up drop and effect parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerUpTuning {
    pub base_drop_chance: f32,
    pub pickup_radius: f32,
    pub fall_speed: f32,
    pub multi_ball_spread_deg: f32,
    pub ball_size_boost: f32,
    pub slow_motion_scale: f32,
    pub slow_motion_duration: f32,
}

impl Default for PowerUpTuning {
    fn default() -> Self {
        Self {
            base_drop_chance: BASE_DROP_CHANCE,
            pickup_radius: PICKUP_RADIUS,
            fall_speed: PICKUP_FALL_SPEED,
            multi_ball_spread_deg: MULTI_BALL_SPREAD_DEG,
            ball_size_boost: BALL_SIZE_BOOST,
            slow_motion_scale: SLOW_MOTION_SCALE,
            slow_motion_duration: SLOW_MOTION_DURATION,
        }
    }
}

/// Complete balance sheet for a run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub flight: FlightTuning,
    pub run: RunTuning,
    pub spawn: SpawnTuning,
    pub arena: ArenaTuning,
    pub power_ups: PowerUpTuning,
}

impl Tuning {
    /// Parse a (possibly partial) JSON balance sheet
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let tuning: Tuning = serde_json::from_str(json)?;
        Ok(tuning.sanitized())
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self, crate::persistence::StoreError> {
        let json = fs::read_to_string(path)?;
        let tuning = Self::from_json_str(&json)?;
        log::info!("Loaded tuning from {}", path.display());
        Ok(tuning)
    }

    /// Repair inverted or out-of-range values instead of failing the run
    pub fn sanitized(mut self) -> Self {
        let f = &mut self.flight;
        if f.min_ball_speed > f.max_ball_speed {
            log::warn!(
                "min_ball_speed {} > max_ball_speed {}, swapping",
                f.min_ball_speed,
                f.max_ball_speed
            );
            std::mem::swap(&mut f.min_ball_speed, &mut f.max_ball_speed);
        }
        f.min_bounce_angle_deg = f.min_bounce_angle_deg.clamp(0.0, 89.0);
        f.bounce_variance_deg = f.bounce_variance_deg.abs();
        f.rapid_bounce_count = f.rapid_bounce_count.max(2);
        if f.stuck_arc_min_deg > f.stuck_arc_max_deg {
            std::mem::swap(&mut f.stuck_arc_min_deg, &mut f.stuck_arc_max_deg);
        }
        if f.degenerate_rotation_min_deg > f.degenerate_rotation_max_deg {
            std::mem::swap(
                &mut f.degenerate_rotation_min_deg,
                &mut f.degenerate_rotation_max_deg,
            );
        }
        if f.rapid_correction_min_deg > f.rapid_correction_max_deg {
            std::mem::swap(&mut f.rapid_correction_min_deg, &mut f.rapid_correction_max_deg);
        }

        let r = &mut self.run;
        r.min_launch_angle_deg = r.min_launch_angle_deg.clamp(0.0, 180.0);
        r.max_launch_angle_deg = r.max_launch_angle_deg.clamp(r.min_launch_angle_deg, 180.0);
        if r.volley_size == Some(0) {
            r.volley_size = None;
        }

        let s = &mut self.spawn;
        s.grid_width = s.grid_width.max(1);
        s.base_rows = s.base_rows.max(1);
        s.max_rows = s.max_rows.max(s.base_rows);
        if s.min_density > s.max_density {
            std::mem::swap(&mut s.min_density, &mut s.max_density);
        }
        s.min_density = s.min_density.clamp(0.0, 1.0);
        s.max_density = s.max_density.clamp(0.0, 1.0);

        self.power_ups.base_drop_chance = self.power_ups.base_drop_chance.clamp(0.0, 1.0);
        self
    }
}
