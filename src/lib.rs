//! Polyglass — a real-time screen translation core.
//!
//! The crate orchestrates a capture → translate → overlay pipeline:
//! user-defined screen regions are captured on demand or on a timer,
//! pushed through a local OCR+seq2seq pipeline or a remote
//! vision-language endpoint, and the translated fragments are rendered
//! as positioned overlays that track their source regions.
//!
//! The GUI shell is expected to live outside this crate: it implements
//! [`overlay::OverlayPresenter`] to mirror overlay state into windows,
//! feeds [`hotkeys::HotkeyEvent`]s to the region editor, and drives
//! [`pipeline::PipelineCoordinator::run_pass`] from its event loop.

pub mod backend;
pub mod capture;
pub mod config;
pub mod hotkeys;
pub mod overlay;
pub mod pipeline;
pub mod region;

pub use backend::{BackendError, RegionCrop, TranslationBackend, TranslationFragment};
pub use capture::scheduler::{CaptureScheduler, Trigger, TriggerDecision};
pub use capture::{PrimaryMonitor, ScreenSource, ScreenshotError};
pub use config::{AppConfig, BackendKind, TranslationMode};
pub use hotkeys::{dispatch, Dispatch, HotkeyEvent};
pub use overlay::{NullPresenter, Overlay, OverlayId, OverlayManager, OverlayPresenter};
pub use pipeline::{PassReport, PassWarning, PhaseCell, PipelineCoordinator, PipelineError, PipelinePhase};
pub use region::editor::{EditorError, EditorState, RegionEditor, ResizeEdge};
pub use region::{Rect, Region, RegionId, RegionKind, RegionStore, SharedRegionStore};
