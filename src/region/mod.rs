//! Capture/exclude region domain — pure data plus invariants.
//!
//! `RegionStore` is the single owner of committed regions. Everything else
//! holds a `RegionId` and looks the region up; nothing keeps a reference
//! into the store across a pipeline pass (passes work on a snapshot).

pub mod editor;

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Axis-aligned rectangle in flat screen coordinates.
///
/// `x`/`y` may be negative (a region dragged partially off the left/top
/// edge); width and height are always positive for committed regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn is_valid(&self) -> bool {
        self.w > 0 && self.h > 0
    }

    pub fn right(&self) -> i32 {
        self.x + self.w as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h as i32
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Intersection of two rects, `None` when they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 > x0 && y1 > y0 {
            Some(Rect::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32))
        } else {
            None
        }
    }
}

/// Stable identifier for a committed region. Survives move/resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    /// Pixels inside are captured and translated.
    Capture,
    /// Pixels inside are subtracted from any overlapping capture region.
    Exclude,
}

/// A committed user-defined screen region.
#[derive(Debug, Clone)]
pub struct Region {
    pub id: RegionId,
    pub kind: RegionKind,
    pub rect: Rect,
    pub created_at: Instant,
}

/// Persisted shape of a region, as it appears in [`crate::AppConfig`].
/// The store assigns fresh ids when seeds are loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSeed {
    pub kind: RegionKind,
    pub rect: Rect,
}

#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("region rect {0:?} has zero width or height")]
    InvalidRect(Rect),

    #[error("no region with id {0:?}")]
    UnknownRegion(RegionId),
}

/// Owner of all committed regions, in insertion order.
#[derive(Debug, Default)]
pub struct RegionStore {
    next_id: u64,
    regions: Vec<Region>,
}

/// Handle shared between the editor, the scheduler and the coordinator.
pub type SharedRegionStore = Arc<Mutex<RegionStore>>;

impl RegionStore {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            regions: Vec::new(),
        }
    }

    pub fn shared() -> SharedRegionStore {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Build a store from persisted seeds, skipping any degenerate rect.
    pub fn from_seeds(seeds: &[RegionSeed]) -> Self {
        let mut store = Self::new();
        for seed in seeds {
            if let Err(e) = store.add(seed.kind, seed.rect) {
                log::warn!("[REGION] Dropping persisted region: {e}");
            }
        }
        store
    }

    pub fn add(&mut self, kind: RegionKind, rect: Rect) -> Result<RegionId, RegionError> {
        if !rect.is_valid() {
            return Err(RegionError::InvalidRect(rect));
        }
        let id = RegionId(self.next_id);
        self.next_id += 1;
        self.regions.push(Region {
            id,
            kind,
            rect,
            created_at: Instant::now(),
        });
        log::debug!("[REGION] Added {kind:?} region {id:?} at {rect:?}");
        Ok(id)
    }

    pub fn remove(&mut self, id: RegionId) -> bool {
        let before = self.regions.len();
        self.regions.retain(|r| r.id != id);
        before != self.regions.len()
    }

    pub fn move_resize(&mut self, id: RegionId, new_rect: Rect) -> Result<(), RegionError> {
        if !new_rect.is_valid() {
            return Err(RegionError::InvalidRect(new_rect));
        }
        let region = self
            .regions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RegionError::UnknownRegion(id))?;
        region.rect = new_rect;
        Ok(())
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    /// Used by the coordinator to discard late backend results for a
    /// region deleted while the pass was in flight.
    pub fn contains(&self, id: RegionId) -> bool {
        self.get(id).is_some()
    }

    pub fn list(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }

    /// Immutable copy carried through one pipeline pass. Reads during an
    /// in-flight capture use these rects, never live values.
    pub fn snapshot(&self) -> Vec<Region> {
        self.regions.clone()
    }
}
