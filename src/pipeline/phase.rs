//! Pipeline phase — the one piece of shared mutable state.
//!
//! The coordinator is the sole writer during a pass; the region editor
//! claims the cell for the duration of an edit session. Everyone else
//! only reads. Single-flight is enforced with a compare-exchange on
//! `Idle`, so two concurrent triggers can never both start a pass.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelinePhase {
    Idle = 0,
    EditingRegions = 1,
    Capturing = 2,
    Translating = 3,
    Rendering = 4,
}

impl PipelinePhase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::EditingRegions,
            2 => Self::Capturing,
            3 => Self::Translating,
            4 => Self::Rendering,
            _ => Self::Idle,
        }
    }
}

/// Atomic cell holding the current [`PipelinePhase`].
#[derive(Debug)]
pub struct PhaseCell(AtomicU8);

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(PipelinePhase::Idle as u8))
    }

    pub fn get(&self) -> PipelinePhase {
        PipelinePhase::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn is_idle(&self) -> bool {
        self.get() == PipelinePhase::Idle
    }

    /// Claim the cell for a pass: `Idle -> Capturing`. Returns false if a
    /// pass or edit session is already active (the trigger is dropped).
    pub fn try_begin_pass(&self) -> bool {
        self.0
            .compare_exchange(
                PipelinePhase::Idle as u8,
                PipelinePhase::Capturing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Claim the cell for an edit session: `Idle -> EditingRegions`.
    pub fn try_begin_edit(&self) -> bool {
        self.0
            .compare_exchange(
                PipelinePhase::Idle as u8,
                PipelinePhase::EditingRegions as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Coordinator-only: advance within an active pass.
    pub fn advance(&self, to: PipelinePhase) {
        self.0.store(to as u8, Ordering::Release);
    }

    /// Return to `Idle` on pass completion, edit completion or any error.
    pub fn reset(&self) {
        self.0.store(PipelinePhase::Idle as u8, Ordering::Release);
    }
}
