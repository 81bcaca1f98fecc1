//! Interactive region creation as an explicit finite state machine.
//!
//! States: `Idle`, `AddingCapture`, `AddingExclude`. The machine consumes
//! discrete edit events (drag, resize, add-box, remove-last, confirm,
//! cancel) and is independent of any event loop — the GUI layer forwards
//! its pointer/keyboard events here, and tests drive it directly.
//!
//! An edit session claims the pipeline phase cell for its whole lifetime,
//! so a capture pass can never run against a store that is mid-edit and
//! the editor can never open while a pass holds a store snapshot.

use super::{Rect, RegionError, RegionId, RegionKind, SharedRegionStore};
use crate::pipeline::phase::PhaseCell;
use std::sync::Arc;

/// Default size of a freshly seeded draft box.
const DEFAULT_DRAFT_W: u32 = 300;
const DEFAULT_DRAFT_H: u32 = 120;

/// Smallest edge a draft can be resized down to. Matches the minimum
/// selection size the drag-selector accepts.
const MIN_DRAFT_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    Idle,
    AddingCapture,
    AddingExclude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeEdge {
    Left,
    Right,
    Top,
    Bottom,
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("region editing is unavailable while a capture pass is active")]
    Busy,

    #[error("no edit session is active")]
    NotEditing,

    #[error("no draft with index {0} in the current session")]
    UnknownDraft(usize),

    #[error(transparent)]
    Region(#[from] RegionError),
}

/// Transient per-session state. Created on `start_add`, destroyed on
/// confirm/cancel, never persisted.
#[derive(Debug)]
struct EditSession {
    kind: RegionKind,
    drafts: Vec<Rect>,
}

pub struct RegionEditor {
    store: SharedRegionStore,
    phase: Arc<PhaseCell>,
    screen: Rect,
    session: Option<EditSession>,
}

impl RegionEditor {
    pub fn new(store: SharedRegionStore, phase: Arc<PhaseCell>, screen: Rect) -> Self {
        Self {
            store,
            phase,
            screen,
            session: None,
        }
    }

    pub fn state(&self) -> EditorState {
        match &self.session {
            None => EditorState::Idle,
            Some(s) if s.kind == RegionKind::Capture => EditorState::AddingCapture,
            Some(_) => EditorState::AddingExclude,
        }
    }

    /// Drafts of the active session, for the GUI layer to draw.
    pub fn drafts(&self) -> &[Rect] {
        self.session.as_ref().map(|s| s.drafts.as_slice()).unwrap_or(&[])
    }

    /// `Idle -> AddingCapture | AddingExclude`, seeding one default draft
    /// centered on screen. Rejected while the pipeline is not idle.
    pub fn start_add(&mut self, kind: RegionKind) -> Result<(), EditorError> {
        if self.session.is_some() {
            return Err(EditorError::Busy);
        }
        if !self.phase.try_begin_edit() {
            log::warn!("[EDITOR] start_add rejected: pipeline busy");
            return Err(EditorError::Busy);
        }
        self.session = Some(EditSession {
            kind,
            drafts: vec![self.default_draft()],
        });
        log::info!("[EDITOR] Edit session started ({kind:?})");
        Ok(())
    }

    /// Append one more default draft box to the session.
    pub fn add_box(&mut self) -> Result<(), EditorError> {
        let session = self.session.as_mut().ok_or(EditorError::NotEditing)?;
        let count = session.drafts.len() as i32;
        // Offset each new box so stacked drafts stay individually grabbable
        let draft = Self::centered_draft(self.screen).translated(count * 24, count * 24);
        session.drafts.push(draft);
        Ok(())
    }

    /// Pop the most recently added draft. A no-op (not an error) when only
    /// one draft remains.
    pub fn remove_last(&mut self) -> Result<(), EditorError> {
        let session = self.session.as_mut().ok_or(EditorError::NotEditing)?;
        if session.drafts.len() > 1 {
            session.drafts.pop();
        }
        Ok(())
    }

    pub fn drag(&mut self, draft: usize, dx: i32, dy: i32) -> Result<(), EditorError> {
        let rect = self.draft_mut(draft)?;
        *rect = rect.translated(dx, dy);
        Ok(())
    }

    /// Move one edge of a draft by `delta`, clamped so the draft never
    /// collapses below [`MIN_DRAFT_SIZE`].
    pub fn resize(&mut self, draft: usize, edge: ResizeEdge, delta: i32) -> Result<(), EditorError> {
        let rect = self.draft_mut(draft)?;
        match edge {
            ResizeEdge::Left => {
                let max_shift = rect.w as i32 - MIN_DRAFT_SIZE as i32;
                let shift = delta.min(max_shift);
                rect.x += shift;
                rect.w = (rect.w as i32 - shift) as u32;
            }
            ResizeEdge::Right => {
                rect.w = (rect.w as i32 + delta).max(MIN_DRAFT_SIZE as i32) as u32;
            }
            ResizeEdge::Top => {
                let max_shift = rect.h as i32 - MIN_DRAFT_SIZE as i32;
                let shift = delta.min(max_shift);
                rect.y += shift;
                rect.h = (rect.h as i32 - shift) as u32;
            }
            ResizeEdge::Bottom => {
                rect.h = (rect.h as i32 + delta).max(MIN_DRAFT_SIZE as i32) as u32;
            }
        }
        Ok(())
    }

    /// Commit all drafts into the store with the session's kind and return
    /// to `Idle`. Returns the ids of the committed regions.
    pub fn confirm(&mut self) -> Result<Vec<RegionId>, EditorError> {
        let session = self.session.take().ok_or(EditorError::NotEditing)?;
        // Lock poisoning only occurs if another holder panicked; the store
        // data itself is always consistent, so recover the guard.
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids = Vec::with_capacity(session.drafts.len());
        for draft in &session.drafts {
            ids.push(store.add(session.kind, *draft)?);
        }
        drop(store);
        self.phase.reset();
        log::info!("[EDITOR] Committed {} {:?} region(s)", ids.len(), session.kind);
        Ok(ids)
    }

    /// Discard the session without mutating the store.
    pub fn cancel(&mut self) -> Result<(), EditorError> {
        if self.session.take().is_none() {
            return Err(EditorError::NotEditing);
        }
        self.phase.reset();
        log::info!("[EDITOR] Edit session cancelled");
        Ok(())
    }

    fn draft_mut(&mut self, draft: usize) -> Result<&mut Rect, EditorError> {
        let session = self.session.as_mut().ok_or(EditorError::NotEditing)?;
        session
            .drafts
            .get_mut(draft)
            .ok_or(EditorError::UnknownDraft(draft))
    }

    fn default_draft(&self) -> Rect {
        Self::centered_draft(self.screen)
    }

    fn centered_draft(screen: Rect) -> Rect {
        let w = DEFAULT_DRAFT_W.min(screen.w);
        let h = DEFAULT_DRAFT_H.min(screen.h);
        Rect::new(
            screen.x + (screen.w.saturating_sub(w) / 2) as i32,
            screen.y + (screen.h.saturating_sub(h) / 2) as i32,
            w,
            h,
        )
    }
}
