//! Timed continuations
//!
//! Staggered launches, the wave settle delay and timed power-up effects are
//! queued here and run by the frame update, never mid-step. Entries due at
//! the same time run in the order they were scheduled.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Work to resume later
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Continuation {
    /// Launch the next ball of a volley; `remaining` counts this one
    LaunchBall { direction: Vec2, remaining: u32 },
    /// Settle delay over: load the next wave
    BeginNextWave { level: u32 },
    /// Slow motion wears off
    EndSlowMotion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Scheduled {
    due: f32,
    seq: u64,
    action: Continuation,
}

/// Continuation queue keyed by simulation time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scheduler {
    entries: Vec<Scheduled>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `action` to run at time `due`
    pub fn schedule(&mut self, due: f32, action: Continuation) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Scheduled { due, seq, action });
    }

    /// Remove and return everything due at or before `now`, in run order
    pub fn take_due(&mut self, now: f32) -> Vec<Continuation> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|s| s.due <= now);
        self.entries = pending;
        due.sort_by(|a, b| {
            a.due
                .partial_cmp(&b.due)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.seq.cmp(&b.seq))
        });
        due.into_iter().map(|s| s.action).collect()
    }

    /// Drop every pending continuation
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    /// Drop pending continuations matching `pred`
    pub fn cancel_where(&mut self, pred: impl Fn(&Continuation) -> bool) {
        self.entries.retain(|s| !pred(&s.action));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_due_orders_by_time_then_insertion() {
        let mut s = Scheduler::new();
        s.schedule(2.0, Continuation::EndSlowMotion);
        s.schedule(1.0, Continuation::BeginNextWave { level: 2 });
        s.schedule(1.0, Continuation::BeginNextWave { level: 3 });
        s.schedule(5.0, Continuation::EndSlowMotion);

        let due = s.take_due(2.0);
        assert_eq!(
            due,
            vec![
                Continuation::BeginNextWave { level: 2 },
                Continuation::BeginNextWave { level: 3 },
                Continuation::EndSlowMotion,
            ]
        );
        assert_eq!(s.len(), 1);
        assert!(s.take_due(4.9).is_empty());
    }

    #[test]
    fn test_cancel_all() {
        let mut s = Scheduler::new();
        s.schedule(0.1, Continuation::EndSlowMotion);
        s.schedule(0.2, Continuation::EndSlowMotion);
        assert_eq!(s.cancel_all(), 2);
        assert!(s.take_due(10.0).is_empty());
    }

    #[test]
    fn test_cancel_where() {
        let mut s = Scheduler::new();
        s.schedule(
            0.1,
            Continuation::LaunchBall {
                direction: Vec2::Y,
                remaining: 2,
            },
        );
        s.schedule(0.1, Continuation::EndSlowMotion);
        s.cancel_where(|c| matches!(c, Continuation::LaunchBall { .. }));
        assert_eq!(s.take_due(1.0), vec![Continuation::EndSlowMotion]);
    }
}
