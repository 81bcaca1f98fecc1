//! Pipeline coordination — one pass end to end.
//!
//! A pass is hide → capture → translate → render → show. The hide/show
//! pair is a strict ordering barrier: the screenshot must not contain the
//! overlay's own pixels, and overlays must not reappear before render has
//! consumed every fragment. The coordinator is the sole writer of the
//! pipeline phase and recovers every error kind back to `Idle` — nothing
//! in here crashes the process.

pub mod phase;

pub use phase::{PhaseCell, PipelinePhase};

use crate::backend::{BackendError, RegionCrop, TranslationBackend, TranslationFragment};
use crate::capture::{crop_region, ScreenSource};
use crate::config::{AppConfig, TranslationMode};
use crate::overlay::OverlayManager;
use crate::region::{Rect, Region, RegionId, RegionKind, SharedRegionStore};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;

/// Consecutive passes with an unreachable backend before a persistent
/// "backend down" warning is raised.
const BACKEND_DOWN_THRESHOLD: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("a pipeline pass is already in flight")]
    Busy,

    #[error("overlay hide was not acknowledged before capture; pass aborted")]
    CaptureAborted,

    #[error(transparent)]
    Capture(#[from] crate::capture::ScreenshotError),

    #[error(transparent)]
    Crop(#[from] crate::capture::CropError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Non-fatal findings of a pass, for the embedding UI's notification
/// channel. The pass itself still completes and returns to `Idle`.
#[derive(Debug)]
pub enum PassWarning {
    /// One region's backend call failed; its previous overlays are kept.
    RegionFailed {
        region_id: Option<RegionId>,
        error: BackendError,
    },
    /// The backend failed for the whole pass (batch failure, or a
    /// failure no region could survive, like a missing model).
    BackendFailed(BackendError),
    /// The backend has been unreachable for this many passes in a row.
    BackendDown { consecutive_passes: u32 },
}

#[derive(Debug, Default)]
pub struct PassReport {
    pub regions_translated: usize,
    pub fragments_rendered: usize,
    pub warnings: Vec<PassWarning>,
}

/// Everything captured at the start of a pass. Immutable; the snapshot
/// is the only region data carried across the blocking backend call.
struct CaptureJob {
    regions: Vec<Region>,
    image: DynamicImage,
    #[allow(dead_code)]
    requested_at: Instant,
}

pub struct PipelineCoordinator {
    config: AppConfig,
    store: SharedRegionStore,
    backend: TranslationBackend,
    overlays: OverlayManager,
    screen: Box<dyn ScreenSource>,
    phase: Arc<PhaseCell>,
    consecutive_unavailable: u32,
}

impl PipelineCoordinator {
    pub fn new(
        config: AppConfig,
        store: SharedRegionStore,
        backend: TranslationBackend,
        overlays: OverlayManager,
        screen: Box<dyn ScreenSource>,
    ) -> Self {
        Self {
            config,
            store,
            backend,
            overlays,
            screen,
            phase: Arc::new(PhaseCell::new()),
            consecutive_unavailable: 0,
        }
    }

    /// The shared phase cell, for wiring the editor and the scheduler.
    pub fn phase(&self) -> Arc<PhaseCell> {
        self.phase.clone()
    }

    /// For hotkey routing (`ClearOverlays`, `ToggleRegionVisibility`) and
    /// for forwarding region move/resize to `reposition_on_region_change`.
    pub fn overlays_mut(&mut self) -> &mut OverlayManager {
        &mut self.overlays
    }

    pub fn overlays(&self) -> &OverlayManager {
        &self.overlays
    }

    /// Run one capture–translate–render pass. Returns `Busy` (trigger is
    /// dropped, not queued) when a pass or edit session is active.
    ///
    /// On success the caller records the pass with
    /// `CaptureScheduler::mark_pass_complete` so interval triggers measure
    /// from the last successful pass.
    pub async fn run_pass(&mut self) -> Result<PassReport, PipelineError> {
        if !self.phase.try_begin_pass() {
            log::debug!("[PIPELINE] Trigger dropped: not idle");
            return Err(PipelineError::Busy);
        }
        let result = self.run_pass_inner().await;
        match &result {
            // Deliberately stay hidden: showing again could flash overlays
            // that no longer match the screen. The next successful pass
            // restores visibility.
            Err(PipelineError::CaptureAborted) => {}
            Err(_) => {
                let _ = self.overlays.show_all(self.config.hide_ack_timeout());
            }
            Ok(_) => {}
        }
        self.phase.reset();
        result
    }

    async fn run_pass_inner(&mut self) -> Result<PassReport, PipelineError> {
        let pass_start = Instant::now();
        self.backend.ensure_ready()?;

        let snapshot = {
            let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
            store.snapshot()
        };
        if self.config.mode == TranslationMode::RegionSelection
            && !snapshot.iter().any(|r| r.kind == RegionKind::Capture)
        {
            log::info!("[PIPELINE] No capture regions defined; nothing to do");
            return Ok(PassReport::default());
        }

        // Hide barrier: the screenshot below must not contain our own
        // overlay pixels, so capture waits for the acknowledgment.
        if !self.overlays.hide_all(self.config.hide_ack_timeout()) {
            return Err(PipelineError::CaptureAborted);
        }

        let capture_start = Instant::now();
        let image = self.screen.capture()?;
        let bounds = self.screen.bounds();
        let job = CaptureJob {
            regions: snapshot,
            image,
            requested_at: capture_start,
        };
        let capture_ms = capture_start.elapsed().as_millis();

        let crops = self.build_crops(&job, bounds)?;
        self.phase.advance(PipelinePhase::Translating);

        let translate_start = Instant::now();
        let (outcomes, mut warnings) = self.dispatch(&crops).await;
        let translate_ms = translate_start.elapsed().as_millis();

        let saw_unavailable = warnings.iter().any(|w| {
            matches!(
                w,
                PassWarning::RegionFailed { error: BackendError::Unavailable(_), .. }
                    | PassWarning::BackendFailed(BackendError::Unavailable(_))
            )
        });
        if saw_unavailable {
            self.consecutive_unavailable += 1;
            if self.consecutive_unavailable >= BACKEND_DOWN_THRESHOLD {
                warnings.push(PassWarning::BackendDown {
                    consecutive_passes: self.consecutive_unavailable,
                });
            }
        } else {
            self.consecutive_unavailable = 0;
        }

        self.phase.advance(PipelinePhase::Rendering);
        let mut report = PassReport {
            warnings,
            ..PassReport::default()
        };
        for (region_id, fragments) in outcomes {
            report.regions_translated += 1;
            match region_id {
                Some(rid) => {
                    // Live rect, not the snapshot: the region may have been
                    // dragged while the backend was working. A deleted
                    // region's late result is discarded, not rendered.
                    let live = {
                        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
                        store.get(rid).map(|r| r.rect)
                    };
                    match live {
                        Some(rect) => {
                            report.fragments_rendered += fragments.len();
                            self.overlays.render(Some(rid), rect, &fragments);
                        }
                        None => {
                            log::info!(
                                "[PIPELINE] Region {rid:?} deleted mid-pass; discarding {} fragment(s)",
                                fragments.len()
                            );
                        }
                    }
                }
                None => {
                    report.fragments_rendered += fragments.len();
                    self.overlays.render(None, bounds, &fragments);
                }
            }
        }

        if !self.overlays.show_all(self.config.hide_ack_timeout()) {
            log::warn!("[PIPELINE] Show not acknowledged after render");
        }

        log::info!(
            "[PIPELINE] Pass stats: capture {capture_ms}ms, translate {translate_ms}ms, \
             total {}ms, {} region(s), {} fragment(s), {} warning(s)",
            pass_start.elapsed().as_millis(),
            report.regions_translated,
            report.fragments_rendered,
            report.warnings.len()
        );
        Ok(report)
    }

    /// Crop the frame per region with exclude-wins masking. Regions that
    /// end up with no pixels (fully excluded or off-screen) produce no
    /// crop and therefore no fragments.
    fn build_crops(&self, job: &CaptureJob, bounds: Rect) -> Result<Vec<RegionCrop>, PipelineError> {
        let excludes: Vec<Rect> = job
            .regions
            .iter()
            .filter(|r| r.kind == RegionKind::Exclude)
            .map(|r| r.rect)
            .collect();

        let mut crops = Vec::new();
        match self.config.mode {
            TranslationMode::FullScreen => {
                if let Some(image) = crop_region(&job.image, bounds, bounds, &excludes)? {
                    crops.push(RegionCrop {
                        region_id: None,
                        image,
                    });
                }
            }
            TranslationMode::RegionSelection => {
                for region in job.regions.iter().filter(|r| r.kind == RegionKind::Capture) {
                    match crop_region(&job.image, bounds, region.rect, &excludes)? {
                        Some(image) => crops.push(RegionCrop {
                            region_id: Some(region.id),
                            image,
                        }),
                        None => log::debug!(
                            "[PIPELINE] Region {:?} fully excluded or off-screen; skipping",
                            region.id
                        ),
                    }
                }
            }
        }
        Ok(crops)
    }

    /// Dispatch crops to the backend. Batching backends get one call for
    /// everything; non-batching backends are called per region under a
    /// timeout so one slow or failing region cannot stall the rest.
    /// Returns (successful outcomes in crop order, warnings).
    async fn dispatch(
        &self,
        crops: &[RegionCrop],
    ) -> (
        Vec<(Option<RegionId>, Vec<TranslationFragment>)>,
        Vec<PassWarning>,
    ) {
        let mut outcomes = Vec::new();
        let mut warnings = Vec::new();
        if crops.is_empty() {
            return (outcomes, warnings);
        }
        let timeout = self.config.request_timeout();

        if self.backend.batches() {
            match tokio::time::timeout(timeout, self.backend.translate(crops)).await {
                Ok(Ok(fragments)) => {
                    for crop in crops {
                        let own: Vec<TranslationFragment> = fragments
                            .iter()
                            .filter(|f| f.source_region_id == crop.region_id)
                            .cloned()
                            .collect();
                        outcomes.push((crop.region_id, own));
                    }
                }
                Ok(Err(e)) => {
                    log::error!("[PIPELINE] Batched backend call failed: {e}");
                    warnings.push(PassWarning::BackendFailed(e));
                }
                Err(_) => {
                    warnings.push(PassWarning::BackendFailed(BackendError::Unavailable(
                        format!("batched call exceeded {timeout:?}"),
                    )));
                }
            }
        } else {
            for crop in crops {
                match tokio::time::timeout(timeout, self.backend.translate(std::slice::from_ref(crop)))
                    .await
                {
                    Ok(Ok(fragments)) => outcomes.push((crop.region_id, fragments)),
                    Ok(Err(e)) if e.is_per_region() => {
                        log::warn!("[PIPELINE] Region {:?} failed: {e} — continuing", crop.region_id);
                        warnings.push(PassWarning::RegionFailed {
                            region_id: crop.region_id,
                            error: e,
                        });
                    }
                    Ok(Err(e)) => {
                        // No region can succeed after this; abort the rest
                        log::error!("[PIPELINE] Backend unusable, aborting remaining regions: {e}");
                        warnings.push(PassWarning::BackendFailed(e));
                        break;
                    }
                    Err(_) => {
                        warnings.push(PassWarning::RegionFailed {
                            region_id: crop.region_id,
                            error: BackendError::Unavailable(format!(
                                "region call exceeded {timeout:?}"
                            )),
                        });
                    }
                }
            }
        }
        (outcomes, warnings)
    }
}
