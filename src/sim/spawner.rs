//! Wave generation
//!
//! Each level fills a grid of `grid_width` columns with independently
//! sampled blocks. Rows, density and block toughness all step up with level.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::block::Block;
use crate::tuning::{ArenaTuning, SpawnTuning};

/// Hit point ceiling for a level: 1-3 → 3, 4-6 → 4, 7+ → 5
pub fn max_hit_points_for_level(level: u32) -> u32 {
    match level {
        0..=3 => 3,
        4..=6 => 4,
        _ => 5,
    }
}

/// Rows for a level: `clamp(base + (level - 1) / 2, base, max)`
pub fn row_count_for_level(level: u32, spawn: &SpawnTuning) -> u32 {
    (spawn.base_rows + level.saturating_sub(1) / 2).clamp(spawn.base_rows, spawn.max_rows)
}

/// Per-cell occupancy probability for a level
pub fn density_for_level(level: u32, spawn: &SpawnTuning) -> f32 {
    let raw = spawn.base_density + spawn.density_step_per_level * level.saturating_sub(1) as f32;
    raw.clamp(spawn.min_density, spawn.max_density)
}

/// Everything the spawner needs to know about one wave
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveSpec {
    pub level: u32,
    pub grid_width: u32,
    pub rows: u32,
    pub density: f32,
    pub max_hit_points: u32,
}

impl WaveSpec {
    pub fn for_level(level: u32, spawn: &SpawnTuning) -> Self {
        Self {
            level,
            grid_width: spawn.grid_width,
            rows: row_count_for_level(level, spawn),
            density: density_for_level(level, spawn),
            max_hit_points: max_hit_points_for_level(level),
        }
    }

    pub fn cell_count(&self) -> u32 {
        self.grid_width * self.rows
    }
}

/// World-space center of grid cell (`col`, `row`); row 0 is the top row
pub fn cell_center(col: u32, row: u32, spawn: &SpawnTuning, arena: &ArenaTuning) -> Vec2 {
    let grid_left = (arena.left + arena.right) * 0.5 - spawn.grid_width as f32 * spawn.cell_size * 0.5;
    Vec2::new(
        grid_left + spawn.cell_size * (col as f32 + 0.5),
        arena.ceiling - spawn.top_margin - spawn.cell_size * (row as f32 + 0.5),
    )
}

fn make_block<R: Rng>(
    col: u32,
    row: u32,
    wave: &WaveSpec,
    spawn: &SpawnTuning,
    arena: &ArenaTuning,
    rng: &mut R,
    next_id: &mut u32,
) -> Block {
    let half = Vec2::splat(((spawn.cell_size - spawn.cell_gap) * 0.5).max(0.01));
    let hp = rng.random_range(1..=wave.max_hit_points.max(1));
    let id = *next_id;
    *next_id += 1;
    Block::new(
        id,
        col,
        row,
        cell_center(col, row, spawn, arena),
        half,
        hp,
        wave.max_hit_points,
        None,
    )
}

/// Sample one grid row at the wave's density; the row may come out empty
pub fn spawn_row<R: Rng>(
    wave: &WaveSpec,
    row: u32,
    spawn: &SpawnTuning,
    arena: &ArenaTuning,
    rng: &mut R,
    next_id: &mut u32,
) -> Vec<Block> {
    let density = f64::from(wave.density.clamp(0.0, 1.0));
    let mut blocks = Vec::new();
    for col in 0..wave.grid_width {
        if rng.random_bool(density) {
            blocks.push(make_block(col, row, wave, spawn, arena, &mut *rng, next_id));
        }
    }
    blocks
}

/// Populate a wave
///
/// Ids are taken from `next_id`. A wave never comes out empty: if every
/// cell rolls vacant, one random cell is filled.
pub fn spawn_wave<R: Rng>(
    wave: &WaveSpec,
    spawn: &SpawnTuning,
    arena: &ArenaTuning,
    rng: &mut R,
    next_id: &mut u32,
) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(wave.cell_count() as usize);
    for row in 0..wave.rows {
        blocks.extend(spawn_row(wave, row, spawn, arena, &mut *rng, next_id));
    }

    if blocks.is_empty() && wave.cell_count() > 0 {
        let col = rng.random_range(0..wave.grid_width);
        let row = rng.random_range(0..wave.rows);
        blocks.push(make_block(col, row, wave, spawn, arena, &mut *rng, next_id));
    }

    log::info!(
        "Level {}: {} rows, density {:.2}, max hp {} -> {} blocks",
        wave.level,
        wave.rows,
        wave.density,
        wave.max_hit_points,
        blocks.len()
    );
    blocks
}
