//! Abstract hotkey surface.
//!
//! Hotkey *registration* belongs to the embedding application; the core
//! only consumes the resulting events. Global events are valid any time;
//! session events are only meaningful while a region edit session is
//! active and are rejected by the editor otherwise.

use crate::capture::scheduler::{CaptureScheduler, Trigger, TriggerDecision};
use crate::overlay::OverlayManager;
use crate::region::editor::{EditorError, RegionEditor};
use crate::region::RegionKind;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// Open a capture-region edit session.
    StartAddCapture,
    /// Open an exclude-region edit session.
    StartAddExclude,
    /// Manual capture trigger.
    TranslateNow,
    /// Toggle overlay visibility without destroying overlay state.
    ToggleRegionVisibility,
    /// Dismiss every overlay.
    ClearOverlays,
    /// In-session: append another draft box.
    AddBox,
    /// In-session: commit all drafts.
    Confirm,
    /// In-session: discard the session.
    Cancel,
    /// In-session: pop the most recently added draft.
    RemoveLast,
}

impl HotkeyEvent {
    /// Whether this event only makes sense inside an edit session.
    pub fn is_session_event(&self) -> bool {
        matches!(
            self,
            Self::AddBox | Self::Confirm | Self::Cancel | Self::RemoveLast
        )
    }
}

/// What the embedding event loop should do after an event was routed.
#[derive(Debug)]
pub enum Dispatch {
    /// Kick off a pipeline pass now.
    RunPass,
    /// Fully handled inside the core; nothing further to do.
    Handled,
    /// The manual trigger was dropped (pipeline busy or similar).
    TriggerDropped(TriggerDecision),
    /// The event does not apply in the current editor state.
    Rejected(EditorError),
}

/// Route one hotkey event to the component that owns it. The caller runs
/// the actual pass when `RunPass` comes back — dispatch itself never
/// blocks. After that pass succeeds, the caller must record it with
/// [`CaptureScheduler::mark_pass_complete`]; the interval clock measures
/// from the last successful pass.
pub fn dispatch(
    event: HotkeyEvent,
    editor: &mut RegionEditor,
    scheduler: &CaptureScheduler,
    overlays: &mut OverlayManager,
    hide_ack_timeout: Duration,
) -> Dispatch {
    let handled = |result: Result<(), EditorError>| match result {
        Ok(()) => Dispatch::Handled,
        Err(e) => Dispatch::Rejected(e),
    };
    match event {
        HotkeyEvent::StartAddCapture => handled(editor.start_add(RegionKind::Capture)),
        HotkeyEvent::StartAddExclude => handled(editor.start_add(RegionKind::Exclude)),
        HotkeyEvent::TranslateNow => match scheduler.decide(Trigger::Manual, Instant::now()) {
            TriggerDecision::Fire => Dispatch::RunPass,
            dropped => Dispatch::TriggerDropped(dropped),
        },
        HotkeyEvent::ToggleRegionVisibility => {
            overlays.toggle_visibility(hide_ack_timeout);
            Dispatch::Handled
        }
        HotkeyEvent::ClearOverlays => {
            overlays.clear_all();
            Dispatch::Handled
        }
        HotkeyEvent::AddBox => handled(editor.add_box()),
        HotkeyEvent::Confirm => handled(editor.confirm().map(|_| ())),
        HotkeyEvent::Cancel => handled(editor.cancel()),
        HotkeyEvent::RemoveLast => handled(editor.remove_last()),
    }
}
