//! Capture trigger scheduling.
//!
//! Two trigger sources feed one decision function: the manual hotkey and
//! the auto-capture interval timer. A trigger arriving while a pass is in
//! flight is dropped, not queued — a slow backend must never build up a
//! backlog of stale captures.

use crate::pipeline::phase::PhaseCell;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// User pressed the translate hotkey. Fires immediately when idle.
    Manual,
    /// Interval timer tick. Fires only when auto-capture is enabled and
    /// the interval has elapsed since the last successful pass.
    Interval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    Fire,
    DroppedBusy,
    DroppedDisabled,
    DroppedTooSoon,
}

pub struct CaptureScheduler {
    phase: Arc<PhaseCell>,
    auto_capture_enabled: bool,
    interval: Duration,
    last_success: Option<Instant>,
}

impl CaptureScheduler {
    pub fn new(phase: Arc<PhaseCell>, auto_capture_enabled: bool, interval: Duration) -> Self {
        Self {
            phase,
            auto_capture_enabled,
            interval,
            last_success: None,
        }
    }

    pub fn set_auto_capture(&mut self, enabled: bool) {
        self.auto_capture_enabled = enabled;
    }

    /// Decide whether a trigger fires a pass. Never blocks, never queues.
    pub fn decide(&self, trigger: Trigger, now: Instant) -> TriggerDecision {
        if !self.phase.is_idle() {
            log::debug!("[SCHEDULER] {trigger:?} trigger dropped: pass in flight");
            return TriggerDecision::DroppedBusy;
        }
        match trigger {
            Trigger::Manual => TriggerDecision::Fire,
            Trigger::Interval => {
                if !self.auto_capture_enabled {
                    return TriggerDecision::DroppedDisabled;
                }
                let elapsed_ok = self
                    .last_success
                    .map(|t| now.duration_since(t) >= self.interval)
                    .unwrap_or(true);
                if elapsed_ok {
                    TriggerDecision::Fire
                } else {
                    TriggerDecision::DroppedTooSoon
                }
            }
        }
    }

    /// Record a successful pass; the next interval is measured from here.
    pub fn mark_pass_complete(&mut self, now: Instant) {
        self.last_success = Some(now);
    }
}
