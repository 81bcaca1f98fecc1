//! Overlay lifecycle management.
//!
//! The manager owns the set of rendered translation overlays and keeps
//! them glued to the regions they came from. It never talks to a
//! windowing system itself — an injected [`OverlayPresenter`] mirrors the
//! overlay set into actual windows and acknowledges visibility changes,
//! which is what lets the pipeline guarantee that a capture never
//! contains the overlay's own pixels.
//!
//! Overlays are click-through by construction; the presenter carves out
//! the drag/resize/double-click-to-dismiss affordances. Binding to a
//! region is a weak back-reference by id — deleting a region requires no
//! synchronous notification, a later reconcile pass just finds nothing
//! to keep.

use crate::backend::TranslationFragment;
use crate::region::{Rect, RegionId};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayId(pub u64);

/// One rendered translation bubble.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub id: OverlayId,
    /// `None` for ad-hoc overlays from full-screen passes.
    pub bound_region_id: Option<RegionId>,
    pub screen_rect: Rect,
    pub text: String,
    pub opacity: f32,
}

/// GUI-side sink for overlay state.
///
/// `set_visible` must not return before the change is observable on
/// screen (or the timeout elapses) — the hide acknowledgment is what
/// stands between the screenshot and the overlay's own pixels.
pub trait OverlayPresenter: Send {
    /// Returns true when the visibility change was acknowledged in time.
    fn set_visible(&mut self, visible: bool, ack_timeout: Duration) -> bool;

    /// Mirror the current overlay set. Default no-op for headless use.
    fn sync(&mut self, _overlays: &[Overlay]) {}
}

/// Presenter that acknowledges everything immediately. Used headless and
/// as a stand-in until the GUI layer registers its own.
#[derive(Debug, Default)]
pub struct NullPresenter;

impl OverlayPresenter for NullPresenter {
    fn set_visible(&mut self, _visible: bool, _ack_timeout: Duration) -> bool {
        true
    }
}

/// Margin kept between an overlay and the screen edge when clamping.
const SCREEN_MARGIN: i32 = 10;

pub struct OverlayManager {
    next_id: u64,
    overlays: Vec<Overlay>,
    /// Region rect at last render, for displacement-based repositioning.
    anchors: HashMap<RegionId, Rect>,
    visible: bool,
    opacity: f32,
    screen: Rect,
    presenter: Box<dyn OverlayPresenter>,
}

impl OverlayManager {
    pub fn new(opacity: f32, screen: Rect, presenter: Box<dyn OverlayPresenter>) -> Self {
        Self {
            next_id: 1,
            overlays: Vec::new(),
            anchors: HashMap::new(),
            visible: true,
            opacity,
            screen,
            presenter,
        }
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Replace all overlays bound to `region_id` with new ones positioned
    /// relative to the region's *current* rect — the live value, so
    /// overlays land correctly even if the region moved between capture
    /// and render. Pass `region_id = None` with the screen rect to render
    /// free overlays from a full-screen pass.
    pub fn render(
        &mut self,
        region_id: Option<RegionId>,
        live_rect: Rect,
        fragments: &[TranslationFragment],
    ) {
        self.overlays.retain(|o| o.bound_region_id != region_id);

        for fragment in fragments {
            let rect = match fragment.bbox {
                Some(bbox) => Rect::new(live_rect.x + bbox.x, live_rect.y + bbox.y, bbox.w, bbox.h),
                None => live_rect,
            };
            let id = OverlayId(self.next_id);
            self.next_id += 1;
            self.overlays.push(Overlay {
                id,
                bound_region_id: region_id,
                screen_rect: self.clamp_to_screen(rect),
                text: fragment.translated_text.clone(),
                opacity: self.opacity,
            });
        }
        if let Some(rid) = region_id {
            self.anchors.insert(rid, live_rect);
        }
        log::debug!(
            "[OVERLAY] Rendered {} fragment(s) for {:?} ({} total overlays)",
            fragments.len(),
            region_id,
            self.overlays.len()
        );
        self.presenter.sync(&self.overlays);
    }

    /// Hide every overlay without destroying overlay state. Returns the
    /// presenter's acknowledgment; already-hidden is acknowledged as-is.
    pub fn hide_all(&mut self, ack_timeout: Duration) -> bool {
        if !self.visible {
            return true;
        }
        let acked = self.presenter.set_visible(false, ack_timeout);
        if acked {
            self.visible = false;
        } else {
            log::warn!("[OVERLAY] Hide not acknowledged within {ack_timeout:?}");
        }
        acked
    }

    pub fn show_all(&mut self, ack_timeout: Duration) -> bool {
        if self.visible {
            return true;
        }
        let acked = self.presenter.set_visible(true, ack_timeout);
        if acked {
            self.visible = true;
        }
        acked
    }

    pub fn toggle_visibility(&mut self, ack_timeout: Duration) -> bool {
        if self.visible {
            self.hide_all(ack_timeout)
        } else {
            self.show_all(ack_timeout)
        }
    }

    /// Manual dismiss (double-click affordance).
    pub fn remove(&mut self, id: OverlayId) -> bool {
        let before = self.overlays.len();
        self.overlays.retain(|o| o.id != id);
        let removed = before != self.overlays.len();
        if removed {
            self.presenter.sync(&self.overlays);
        }
        removed
    }

    /// Drop everything bound to a deleted region. Returns the count.
    pub fn remove_for_region(&mut self, region_id: RegionId) -> usize {
        let before = self.overlays.len();
        self.overlays.retain(|o| o.bound_region_id != Some(region_id));
        self.anchors.remove(&region_id);
        let removed = before - self.overlays.len();
        if removed > 0 {
            self.presenter.sync(&self.overlays);
        }
        removed
    }

    pub fn clear_all(&mut self) {
        self.overlays.clear();
        self.anchors.clear();
        self.presenter.sync(&self.overlays);
        log::info!("[OVERLAY] Cleared all overlays");
    }

    /// Keep bound overlays glued to a region that moved or resized. The
    /// displacement since the last render (or last reposition) is applied
    /// to every bound overlay; repeating the same rect is a no-op.
    pub fn reposition_on_region_change(&mut self, region_id: RegionId, new_rect: Rect) {
        let anchor = match self.anchors.get(&region_id) {
            Some(a) => *a,
            None => return,
        };
        let (dx, dy) = (new_rect.x - anchor.x, new_rect.y - anchor.y);
        if dx == 0 && dy == 0 {
            self.anchors.insert(region_id, new_rect);
            return;
        }
        for overlay in self
            .overlays
            .iter_mut()
            .filter(|o| o.bound_region_id == Some(region_id))
        {
            overlay.screen_rect = overlay.screen_rect.translated(dx, dy);
        }
        self.anchors.insert(region_id, new_rect);
        self.presenter.sync(&self.overlays);
    }

    /// Keep the overlay on screen; positions only, never the size.
    fn clamp_to_screen(&self, rect: Rect) -> Rect {
        if !self.screen.is_valid() {
            return rect;
        }
        let min_x = self.screen.x + SCREEN_MARGIN;
        let min_y = self.screen.y + SCREEN_MARGIN;
        let max_x = (self.screen.right() - rect.w as i32 - SCREEN_MARGIN).max(min_x);
        let max_y = (self.screen.bottom() - rect.h as i32 - SCREEN_MARGIN).max(min_y);
        Rect::new(rect.x.clamp(min_x, max_x), rect.y.clamp(min_y, max_y), rect.w, rect.h)
    }
}
