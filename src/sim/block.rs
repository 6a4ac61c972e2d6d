//! Destructible grid blocks

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Display palette, picked from hit points unless the spawner hints otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockColor {
    Yellow,
    Blue,
    Pink,
    Orange,
    Red,
}

impl BlockColor {
    /// Bracket color for a hit point count
    pub fn for_hit_points(hp: u32) -> Self {
        match hp {
            0 | 1 => BlockColor::Yellow,
            2 => BlockColor::Blue,
            3 => BlockColor::Pink,
            4 => BlockColor::Orange,
            _ => BlockColor::Red,
        }
    }

}

/// Emitted exactly once when a block's hit points run out
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockDestroyed {
    pub block_id: u32,
    /// Original hit points, used as score credit
    pub value: u32,
    pub pos: Vec2,
}

/// A block occupying one grid cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: u32,
    pub col: u32,
    pub row: u32,
    /// Cell center in world space
    pub center: Vec2,
    pub half_extents: Vec2,
    hit_points: u32,
    max_hit_points: u32,
    color_hint: Option<BlockColor>,
    destroyed: bool,
}

impl Block {
    /// Create a block; `hit_points` is clamped to `[1, level_max]`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        col: u32,
        row: u32,
        center: Vec2,
        half_extents: Vec2,
        hit_points: u32,
        level_max: u32,
        color_hint: Option<BlockColor>,
    ) -> Self {
        let hp = hit_points.clamp(1, level_max.max(1));
        Self {
            id,
            col,
            row,
            center,
            half_extents,
            hit_points: hp,
            max_hit_points: hp,
            color_hint,
            destroyed: false,
        }
    }

    pub fn hit_points(&self) -> u32 {
        self.hit_points
    }

    /// Hit points at spawn (the score value)
    pub fn max_hit_points(&self) -> u32 {
        self.max_hit_points
    }

    pub fn is_alive(&self) -> bool {
        !self.destroyed
    }

    pub fn color(&self) -> BlockColor {
        self.color_hint
            .unwrap_or_else(|| BlockColor::for_hit_points(self.hit_points))
    }

    pub fn min(&self) -> Vec2 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec2 {
        self.center + self.half_extents
    }

    /// Move one grid row toward the launch line
    pub fn descend(&mut self, cell_size: f32) {
        self.row += 1;
        self.center.y -= cell_size;
    }

    /// Apply damage (at least 1)
    ///
    /// Returns the destruction notice on the hit that empties the block and
    /// `None` on every other call, including hits on an already destroyed block.
    pub fn take_damage(&mut self, amount: u32) -> Option<BlockDestroyed> {
        if self.destroyed {
            return None;
        }
        self.hit_points = self.hit_points.saturating_sub(amount.max(1));
        if self.hit_points > 0 {
            return None;
        }
        self.destroyed = true;
        Some(BlockDestroyed {
            block_id: self.id,
            value: self.max_hit_points,
            pos: self.center,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(hp: u32) -> Block {
        Block::new(1, 0, 0, Vec2::ZERO, Vec2::splat(0.5), hp, 5, None)
    }

    #[test]
    fn test_new_clamps_hit_points() {
        assert_eq!(block(0).hit_points(), 1);
        assert_eq!(block(9).hit_points(), 5);
        let capped = Block::new(2, 0, 0, Vec2::ZERO, Vec2::ONE, 4, 3, None);
        assert_eq!(capped.hit_points(), 3);
    }

    #[test]
    fn test_two_hits_destroy_once() {
        let mut b = block(2);
        assert_eq!(b.take_damage(1), None);
        assert_eq!(b.hit_points(), 1);
        let destroyed = b.take_damage(1).expect("second hit destroys");
        assert_eq!(destroyed.value, 2);
        assert!(!b.is_alive());
        assert_eq!(b.take_damage(1), None, "no second notice");
    }

    #[test]
    fn test_overkill_scores_spawn_value() {
        let mut b = block(3);
        let destroyed = b.take_damage(50).unwrap();
        assert_eq!(destroyed.value, 3);
        assert_eq!(b.hit_points(), 0);
    }

    #[test]
    fn test_zero_damage_counts_as_one() {
        let mut b = block(2);
        b.take_damage(0);
        assert_eq!(b.hit_points(), 1);
    }

    #[test]
    fn test_descend_moves_one_row_down() {
        let mut b = block(2);
        b.descend(1.0);
        assert_eq!(b.row, 1);
        assert_eq!(b.center, Vec2::new(0.0, -1.0));
        assert_eq!(b.min().y, -1.5);
        assert_eq!(b.hit_points(), 2);
    }

    #[test]
    fn test_color_tracks_hit_points() {
        let mut b = block(3);
        assert_eq!(b.color(), BlockColor::Pink);
        b.take_damage(1);
        assert_eq!(b.color(), BlockColor::Blue);

        let hinted = Block::new(3, 0, 0, Vec2::ZERO, Vec2::ONE, 3, 3, Some(BlockColor::Red));
        assert_eq!(hinted.color(), BlockColor::Red);
    }
}
