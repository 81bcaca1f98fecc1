//! End-to-end pipeline behavior with a synthetic screen, an
//! acknowledging stub presenter, and stubbed detector/translator seams.
//! No OS capture, no network, no real model.

use image::DynamicImage;
use polyglass::backend::local::{DetectedLine, LocalPipeline, TextDetector, TextTranslator};
use polyglass::backend::{BackendError, TranslationBackend};
use polyglass::capture::scheduler::{CaptureScheduler, Trigger, TriggerDecision};
use polyglass::overlay::{OverlayManager, OverlayPresenter};
use polyglass::region::{Rect, RegionId, RegionKind, RegionStore, SharedRegionStore};
use polyglass::{
    AppConfig, PassReport, PassWarning, PipelineCoordinator, PipelineError, ScreenSource,
    ScreenshotError, TranslationMode,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SCREEN: Rect = Rect { x: 0, y: 0, w: 640, h: 480 };

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Presenter that flips a shared visibility flag, so the screen stub can
/// observe whether overlays were visible at the instant of capture.
struct FlagPresenter {
    visible: Arc<AtomicBool>,
    ack: bool,
}

impl OverlayPresenter for FlagPresenter {
    fn set_visible(&mut self, visible: bool, _ack_timeout: Duration) -> bool {
        if self.ack {
            self.visible.store(visible, Ordering::SeqCst);
        }
        self.ack
    }
}

struct SyntheticScreen {
    visible: Arc<AtomicBool>,
    captured_while_visible: Arc<AtomicBool>,
    captures: Arc<AtomicUsize>,
}

impl ScreenSource for SyntheticScreen {
    fn capture(&self) -> Result<DynamicImage, ScreenshotError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if self.visible.load(Ordering::SeqCst) {
            self.captured_while_visible.store(true, Ordering::SeqCst);
        }
        Ok(DynamicImage::new_rgba8(SCREEN.w, SCREEN.h))
    }

    fn bounds(&self) -> Rect {
        SCREEN
    }
}

struct FixedDetector {
    lines: Vec<DetectedLine>,
    calls: Arc<AtomicUsize>,
}

impl TextDetector for FixedDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<DetectedLine>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lines.clone())
    }
}

/// Translates everything to "Hello"; optionally deletes a region from the
/// store first, simulating the user removing it while a pass is in flight.
struct HelloTranslator {
    delete_during_call: Option<(SharedRegionStore, RegionId)>,
}

impl TextTranslator for HelloTranslator {
    fn translate_batch(
        &self,
        texts: &[String],
        _source: Option<&str>,
        _target: &str,
    ) -> Result<Vec<String>, BackendError> {
        if let Some((store, id)) = &self.delete_during_call {
            store.lock().unwrap().remove(*id);
        }
        Ok(texts.iter().map(|_| "Hello".to_string()).collect())
    }
}

/// Emits one fresh line per call so the translation cache never hits and
/// every pass reaches the translator.
struct CountingDetector {
    calls: Arc<AtomicUsize>,
}

impl TextDetector for CountingDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<DetectedLine>, BackendError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![DetectedLine {
            text: format!("line {n}"),
            bbox: Rect::new(0, 0, 40, 16),
            confidence: 0.9,
        }])
    }
}

struct FlakyTranslator {
    offline: Arc<AtomicBool>,
}

impl TextTranslator for FlakyTranslator {
    fn translate_batch(
        &self,
        texts: &[String],
        _source: Option<&str>,
        _target: &str,
    ) -> Result<Vec<String>, BackendError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("model server offline".to_string()));
        }
        Ok(texts.iter().map(|_| "Hello".to_string()).collect())
    }
}

struct Harness {
    coordinator: PipelineCoordinator,
    store: SharedRegionStore,
    captured_while_visible: Arc<AtomicBool>,
    captures: Arc<AtomicUsize>,
    detector_calls: Arc<AtomicUsize>,
}

fn harness(
    lines: Vec<DetectedLine>,
    presenter_acks: bool,
    delete_during_call: Option<RegionId>,
) -> Harness {
    init_logging();
    let config = AppConfig {
        mode: TranslationMode::RegionSelection,
        model_name: "facebook/nllb-200-distilled-600M".to_string(),
        source_lang: "Japanese".to_string(),
        target_lang: "English".to_string(),
        ..AppConfig::default()
    };
    let store = RegionStore::shared();
    let visible = Arc::new(AtomicBool::new(true));
    let captured_while_visible = Arc::new(AtomicBool::new(false));
    let captures = Arc::new(AtomicUsize::new(0));
    let detector_calls = Arc::new(AtomicUsize::new(0));

    let overlays = OverlayManager::new(
        config.opacity,
        SCREEN,
        Box::new(FlagPresenter {
            visible: visible.clone(),
            ack: presenter_acks,
        }),
    );
    let screen = SyntheticScreen {
        visible: visible.clone(),
        captured_while_visible: captured_while_visible.clone(),
        captures: captures.clone(),
    };
    let backend = TranslationBackend::Local(
        LocalPipeline::new(
            &config,
            Box::new(FixedDetector {
                lines,
                calls: detector_calls.clone(),
            }),
            Box::new(HelloTranslator {
                delete_during_call: delete_during_call.map(|id| (store.clone(), id)),
            }),
        )
        .unwrap(),
    );
    let coordinator =
        PipelineCoordinator::new(config, store.clone(), backend, overlays, Box::new(screen));
    Harness {
        coordinator,
        store,
        captured_while_visible,
        captures,
        detector_calls,
    }
}

fn hello_line() -> DetectedLine {
    DetectedLine {
        text: "こんにちは".to_string(),
        bbox: Rect::new(10, 10, 80, 20),
        confidence: 0.9,
    }
}

fn add_region(store: &SharedRegionStore, kind: RegionKind, rect: Rect) -> RegionId {
    store.lock().unwrap().add(kind, rect).unwrap()
}

#[tokio::test]
async fn pass_translates_a_region_into_one_overlay() {
    let mut h = harness(vec![hello_line()], true, None);
    let rect = Rect::new(100, 100, 200, 50);
    add_region(&h.store, RegionKind::Capture, rect);

    let report = h.coordinator.run_pass().await.unwrap();
    assert_eq!(report.regions_translated, 1);
    assert_eq!(report.fragments_rendered, 1);
    assert!(report.warnings.is_empty());

    let overlays = h.coordinator.overlays().overlays();
    assert_eq!(overlays.len(), 1);
    assert_eq!(overlays[0].text, "Hello");
    // bbox is crop-local; the overlay lands offset into the region
    assert_eq!(overlays[0].screen_rect, Rect::new(110, 110, 80, 20));
    assert!(h.coordinator.overlays().is_visible());
}

#[tokio::test]
async fn overlay_pixels_are_never_captured() {
    let mut h = harness(vec![hello_line()], true, None);
    add_region(&h.store, RegionKind::Capture, Rect::new(100, 100, 200, 50));

    // Two passes: the second must hide the overlays produced by the first
    // before its screenshot is taken.
    h.coordinator.run_pass().await.unwrap();
    h.coordinator.run_pass().await.unwrap();

    assert_eq!(h.captures.load(Ordering::SeqCst), 2);
    assert!(!h.captured_while_visible.load(Ordering::SeqCst));
    assert!(h.coordinator.overlays().is_visible());
}

#[tokio::test]
async fn unacknowledged_hide_aborts_before_capture() {
    let mut h = harness(vec![hello_line()], false, None);
    add_region(&h.store, RegionKind::Capture, Rect::new(100, 100, 200, 50));

    let err = h.coordinator.run_pass().await.unwrap_err();
    assert!(matches!(err, PipelineError::CaptureAborted));
    // The screenshot was never taken and the pipeline returned to idle
    assert_eq!(h.captures.load(Ordering::SeqCst), 0);
    assert!(h.coordinator.phase().is_idle());
}

#[tokio::test]
async fn triggers_during_a_pass_are_dropped_not_queued() {
    let mut h = harness(vec![hello_line()], true, None);
    add_region(&h.store, RegionKind::Capture, Rect::new(100, 100, 200, 50));

    // Simulate an in-flight pass holding the phase
    let phase = h.coordinator.phase();
    assert!(phase.try_begin_pass());

    let scheduler = CaptureScheduler::new(phase.clone(), true, Duration::from_secs(5));
    for _ in 0..5 {
        assert_eq!(
            scheduler.decide(Trigger::Manual, Instant::now()),
            TriggerDecision::DroppedBusy
        );
    }
    assert!(matches!(
        h.coordinator.run_pass().await.unwrap_err(),
        PipelineError::Busy
    ));
    assert_eq!(h.captures.load(Ordering::SeqCst), 0);

    // Once the pass completes, exactly one new pass runs
    phase.reset();
    assert_eq!(
        scheduler.decide(Trigger::Manual, Instant::now()),
        TriggerDecision::Fire
    );
    h.coordinator.run_pass().await.unwrap();
    assert_eq!(h.captures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn region_deleted_mid_pass_discards_its_fragments() {
    let rect = Rect::new(100, 100, 200, 50);
    // The id counter starts at 1, so the first added region is RegionId(1)
    let doomed = RegionId(1);
    let mut h = harness(vec![hello_line()], true, Some(doomed));
    let id = add_region(&h.store, RegionKind::Capture, rect);
    assert_eq!(id, doomed);

    let report = h.coordinator.run_pass().await.unwrap();
    assert_eq!(report.fragments_rendered, 0);
    assert!(h.coordinator.overlays().overlays().is_empty());
    assert!(h.coordinator.phase().is_idle());
}

#[tokio::test]
async fn empty_detection_is_success_with_zero_overlays() {
    let mut h = harness(Vec::new(), true, None);
    add_region(&h.store, RegionKind::Capture, Rect::new(100, 100, 200, 50));

    let report = h.coordinator.run_pass().await.unwrap();
    assert!(report.warnings.is_empty());
    assert_eq!(report.fragments_rendered, 0);
    assert!(h.coordinator.overlays().overlays().is_empty());
    assert!(h.coordinator.overlays().is_visible());
}

#[tokio::test]
async fn fully_excluded_region_never_reaches_the_backend() {
    let mut h = harness(vec![hello_line()], true, None);
    let rect = Rect::new(100, 100, 200, 50);
    add_region(&h.store, RegionKind::Capture, rect);
    // Exclude covers the capture region entirely: exclude wins
    add_region(&h.store, RegionKind::Exclude, Rect::new(90, 90, 220, 70));

    let report = h.coordinator.run_pass().await.unwrap();
    assert_eq!(h.detector_calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.regions_translated, 0);
    assert!(h.coordinator.overlays().overlays().is_empty());
}

#[tokio::test]
async fn no_regions_means_no_capture() {
    let mut h = harness(vec![hello_line()], true, None);
    let report = h.coordinator.run_pass().await.unwrap();
    assert_eq!(report.regions_translated, 0);
    assert_eq!(h.captures.load(Ordering::SeqCst), 0);
    assert!(h.coordinator.phase().is_idle());
}

#[tokio::test]
async fn interval_clock_measures_from_the_last_successful_pass() {
    let mut h = harness(vec![hello_line()], true, None);
    add_region(&h.store, RegionKind::Capture, Rect::new(100, 100, 200, 50));
    let mut scheduler =
        CaptureScheduler::new(h.coordinator.phase(), true, Duration::from_secs(5));

    let t0 = Instant::now();
    assert_eq!(scheduler.decide(Trigger::Interval, t0), TriggerDecision::Fire);
    h.coordinator.run_pass().await.unwrap();
    scheduler.mark_pass_complete(t0);

    assert_eq!(
        scheduler.decide(Trigger::Interval, t0 + Duration::from_secs(2)),
        TriggerDecision::DroppedTooSoon
    );
    assert_eq!(
        scheduler.decide(Trigger::Interval, t0 + Duration::from_secs(5)),
        TriggerDecision::Fire
    );
}

#[tokio::test]
async fn backend_down_raised_after_three_unavailable_passes_then_resets() {
    init_logging();
    let config = AppConfig {
        mode: TranslationMode::RegionSelection,
        model_name: "facebook/nllb-200-distilled-600M".to_string(),
        source_lang: "Japanese".to_string(),
        target_lang: "English".to_string(),
        ..AppConfig::default()
    };
    let store = RegionStore::shared();
    store
        .lock()
        .unwrap()
        .add(RegionKind::Capture, Rect::new(100, 100, 200, 50))
        .unwrap();

    let offline = Arc::new(AtomicBool::new(true));
    let visible = Arc::new(AtomicBool::new(true));
    let overlays = OverlayManager::new(
        config.opacity,
        SCREEN,
        Box::new(FlagPresenter { visible: visible.clone(), ack: true }),
    );
    let screen = SyntheticScreen {
        visible,
        captured_while_visible: Arc::new(AtomicBool::new(false)),
        captures: Arc::new(AtomicUsize::new(0)),
    };
    let backend = TranslationBackend::Local(
        LocalPipeline::new(
            &config,
            Box::new(CountingDetector { calls: Arc::new(AtomicUsize::new(0)) }),
            Box::new(FlakyTranslator { offline: offline.clone() }),
        )
        .unwrap(),
    );
    let mut coordinator =
        PipelineCoordinator::new(config, store, backend, overlays, Box::new(screen));

    let down = |r: &PassReport| {
        r.warnings
            .iter()
            .any(|w| matches!(w, PassWarning::BackendDown { .. }))
    };

    let first = coordinator.run_pass().await.unwrap();
    assert!(first
        .warnings
        .iter()
        .any(|w| matches!(w, PassWarning::BackendFailed(BackendError::Unavailable(_)))));
    assert!(!down(&first));

    let second = coordinator.run_pass().await.unwrap();
    assert!(!down(&second));

    let third = coordinator.run_pass().await.unwrap();
    assert!(third
        .warnings
        .iter()
        .any(|w| matches!(w, PassWarning::BackendDown { consecutive_passes: 3 })));

    // A successful pass resets the streak
    offline.store(false, Ordering::SeqCst);
    let recovered = coordinator.run_pass().await.unwrap();
    assert!(recovered.warnings.is_empty());

    offline.store(true, Ordering::SeqCst);
    let relapse = coordinator.run_pass().await.unwrap();
    assert!(!down(&relapse));
}

#[tokio::test]
async fn moved_region_renders_at_its_live_position() {
    let mut h = harness(vec![hello_line()], true, None);
    let id = add_region(&h.store, RegionKind::Capture, Rect::new(100, 100, 200, 50));

    h.coordinator.run_pass().await.unwrap();
    assert_eq!(
        h.coordinator.overlays().overlays()[0].screen_rect,
        Rect::new(110, 110, 80, 20)
    );

    // Drag the region, run another pass: overlays follow the live rect
    h.store
        .lock()
        .unwrap()
        .move_resize(id, Rect::new(300, 200, 200, 50))
        .unwrap();
    h.coordinator.run_pass().await.unwrap();
    let overlays = h.coordinator.overlays().overlays();
    assert_eq!(overlays.len(), 1);
    assert_eq!(overlays[0].screen_rect, Rect::new(310, 210, 80, 20));
}
