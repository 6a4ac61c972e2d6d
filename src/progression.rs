//! Cross-run upgrades
//!
//! Points earned at game over buy permanent multipliers that feed ball
//! launch (damage, size, speed), ball count and power-up drop rate.
//! Every successful purchase is persisted immediately.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::persistence::{KvStore, MemoryStore, StoreError};

/// Persisted keys
pub mod keys {
    pub const PROGRESSION_POINTS: &str = "progressionPoints";
    pub const BALL_DAMAGE_MULTIPLIER: &str = "ballDamageMultiplier";
    pub const BALL_SIZE_MULTIPLIER: &str = "ballSizeMultiplier";
    pub const BALL_SPEED_MULTIPLIER: &str = "ballSpeedMultiplier";
    pub const EXTRA_BALLS_PER_RUN: &str = "extraBallsPerRun";
    pub const POWER_UP_DROP_RATE_MULTIPLIER: &str = "powerUpDropRateMultiplier";
}

/// Smallest ball size multiplier a purchase can reach
pub const MIN_SIZE_MULTIPLIER: f32 = 0.3;

/// Purchasable upgrades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpgradeKind {
    Damage,
    Size,
    Speed,
    ExtraBall,
    DropRate,
}

impl UpgradeKind {
    pub const ALL: [UpgradeKind; 5] = [
        UpgradeKind::Damage,
        UpgradeKind::Size,
        UpgradeKind::Speed,
        UpgradeKind::ExtraBall,
        UpgradeKind::DropRate,
    ];

    /// Price in progression points
    pub fn cost(&self) -> u32 {
        match self {
            UpgradeKind::Damage => 3,
            _ => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeKind::Damage => "damage",
            UpgradeKind::Size => "size",
            UpgradeKind::Speed => "speed",
            UpgradeKind::ExtraBall => "extra-ball",
            UpgradeKind::DropRate => "drop-rate",
        }
    }

}

/// Unrecognized upgrade name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseUpgradeError(pub String);

impl fmt::Display for ParseUpgradeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown upgrade '{}' (expected damage, size, speed, extra-ball or drop-rate)",
            self.0
        )
    }
}

impl std::error::Error for ParseUpgradeError {}

impl FromStr for UpgradeKind {
    type Err = ParseUpgradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "damage" => Ok(UpgradeKind::Damage),
            "size" => Ok(UpgradeKind::Size),
            "speed" => Ok(UpgradeKind::Speed),
            "extra-ball" | "extra_ball" | "extraball" | "balls" => Ok(UpgradeKind::ExtraBall),
            "drop-rate" | "drop_rate" | "droprate" => Ok(UpgradeKind::DropRate),
            _ => Err(ParseUpgradeError(s.to_string())),
        }
    }
}

/// Why a purchase was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseError {
    InsufficientFunds { cost: u32, available: u32 },
    /// The multiplier is already at its limit
    AtLimit(UpgradeKind),
}

impl fmt::Display for PurchaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurchaseError::InsufficientFunds { cost, available } => {
                write!(f, "insufficient points: need {cost}, have {available}")
            }
            PurchaseError::AtLimit(kind) => write!(f, "{} upgrade is maxed out", kind.as_str()),
        }
    }
}

impl std::error::Error for PurchaseError {}

/// Progression values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progression {
    pub points: u32,
    pub damage_multiplier: f32,
    /// Smaller balls are the stronger upgrade
    pub size_multiplier: f32,
    pub speed_multiplier: f32,
    pub extra_balls_per_run: u32,
    pub drop_rate_multiplier: f32,
}

impl Default for Progression {
    fn default() -> Self {
        Self {
            points: 0,
            damage_multiplier: 1.0,
            size_multiplier: 1.0,
            speed_multiplier: 1.0,
            extra_balls_per_run: 0,
            drop_rate_multiplier: 1.0,
        }
    }
}

impl Progression {
    /// Apply one upgrade's effect (no cost check)
    fn apply(&mut self, kind: UpgradeKind) -> Result<(), PurchaseError> {
        match kind {
            UpgradeKind::Damage => self.damage_multiplier += 1.0,
            UpgradeKind::Size => {
                let next = self.size_multiplier - 0.1;
                if next < MIN_SIZE_MULTIPLIER - 1e-4 {
                    return Err(PurchaseError::AtLimit(kind));
                }
                self.size_multiplier = next;
            }
            UpgradeKind::Speed => self.speed_multiplier += 0.1,
            UpgradeKind::ExtraBall => self.extra_balls_per_run += 1,
            UpgradeKind::DropRate => self.drop_rate_multiplier += 0.1,
        }
        Ok(())
    }
}

/// End-of-run result handed to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub score: u64,
    pub level: u32,
    pub waves_cleared: u32,
    pub points_earned: u32,
}

/// Progression values bound to a key/value backend
pub struct ProgressionStore {
    values: Progression,
    backend: Box<dyn KvStore>,
}

impl fmt::Debug for ProgressionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressionStore")
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

impl ProgressionStore {
    /// Load from `backend`; unreadable fields fall back to defaults
    pub fn load(backend: Box<dyn KvStore>) -> Self {
        let mut store = Self {
            values: Progression::default(),
            backend,
        };
        match store.read_all() {
            Ok(values) => {
                log::info!("Loaded progression: {} points", values.points);
                store.values = values;
            }
            Err(e) => log::warn!("Progression store unreadable, using defaults: {e}"),
        }
        store
    }

    /// Fresh store backed by memory only
    pub fn in_memory() -> Self {
        Self::load(Box::new(MemoryStore::new()))
    }

    pub fn values(&self) -> &Progression {
        &self.values
    }

    pub fn points(&self) -> u32 {
        self.values.points
    }

    /// Buy an upgrade; persists on success
    ///
    /// A storage failure after a successful purchase is logged and the
    /// purchase stays applied in memory.
    pub fn purchase(&mut self, kind: UpgradeKind) -> Result<&Progression, PurchaseError> {
        let cost = kind.cost();
        if self.values.points < cost {
            log::info!(
                "Cannot buy {}: need {}, have {}",
                kind.as_str(),
                cost,
                self.values.points
            );
            return Err(PurchaseError::InsufficientFunds {
                cost,
                available: self.values.points,
            });
        }
        let mut next = self.values.clone();
        next.apply(kind)?;
        next.points -= cost;
        self.values = next;
        log::info!(
            "Bought {} for {} points ({} left)",
            kind.as_str(),
            cost,
            self.values.points
        );
        self.persist();
        Ok(&self.values)
    }

    /// Credit a finished run and persist
    pub fn record_run(&mut self, summary: &RunSummary) {
        self.values.points = self.values.points.saturating_add(summary.points_earned);
        log::info!(
            "Run over at level {} with score {}: +{} points (total {})",
            summary.level,
            summary.score,
            summary.points_earned,
            self.values.points
        );
        self.persist();
    }

    /// Back to identity multipliers and zero points, wiping the backend
    pub fn reset(&mut self) {
        self.values = Progression::default();
        if let Err(e) = self.backend.clear().and_then(|_| self.backend.flush()) {
            log::warn!("Failed to clear progression store: {e}");
        }
        log::info!("Progression reset");
    }

    /// Write every field; failures only warn
    pub fn persist(&mut self) {
        if let Err(e) = self.write_all() {
            log::warn!("Progression not saved, keeping in-memory values: {e}");
        }
    }

    fn write_all(&mut self) -> Result<(), StoreError> {
        let v = &self.values;
        let fields = [
            (keys::PROGRESSION_POINTS, json!(v.points)),
            (keys::BALL_DAMAGE_MULTIPLIER, json!(v.damage_multiplier)),
            (keys::BALL_SIZE_MULTIPLIER, json!(v.size_multiplier)),
            (keys::BALL_SPEED_MULTIPLIER, json!(v.speed_multiplier)),
            (keys::EXTRA_BALLS_PER_RUN, json!(v.extra_balls_per_run)),
            (keys::POWER_UP_DROP_RATE_MULTIPLIER, json!(v.drop_rate_multiplier)),
        ];
        for (key, value) in fields {
            self.backend.set(key, value)?;
        }
        self.backend.flush()
    }

    fn read_all(&self) -> Result<Progression, StoreError> {
        let d = Progression::default();
        Ok(Progression {
            points: self.read_u32(keys::PROGRESSION_POINTS)?.unwrap_or(d.points),
            damage_multiplier: self
                .read_f32(keys::BALL_DAMAGE_MULTIPLIER)?
                .unwrap_or(d.damage_multiplier),
            size_multiplier: self
                .read_f32(keys::BALL_SIZE_MULTIPLIER)?
                .unwrap_or(d.size_multiplier),
            speed_multiplier: self
                .read_f32(keys::BALL_SPEED_MULTIPLIER)?
                .unwrap_or(d.speed_multiplier),
            extra_balls_per_run: self
                .read_u32(keys::EXTRA_BALLS_PER_RUN)?
                .unwrap_or(d.extra_balls_per_run),
            drop_rate_multiplier: self
                .read_f32(keys::POWER_UP_DROP_RATE_MULTIPLIER)?
                .unwrap_or(d.drop_rate_multiplier),
        })
    }

    fn read_f32(&self, key: &str) -> Result<Option<f32>, StoreError> {
        Ok(self
            .backend
            .get(key)?
            .as_ref()
            .and_then(Value::as_f64)
            .map(|v| v as f32))
    }

    fn read_u32(&self, key: &str) -> Result<Option<u32>, StoreError> {
        Ok(self
            .backend
            .get(key)?
            .as_ref()
            .and_then(Value::as_u64)
            .map(|v| v.min(u32::MAX as u64) as u32))
    }
}
