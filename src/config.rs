//! Resolved application configuration.
//!
//! One immutable value, threaded into constructors. Loading and saving it
//! is the embedding application's job; the core never touches disk for
//! configuration and never reads ambient global state.

use crate::region::RegionSeed;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationMode {
    /// Translate everything on screen; fragments become free overlays.
    FullScreen,
    /// Translate only the user-defined capture regions.
    RegionSelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Local text detection followed by a local seq2seq translation model.
    Local,
    /// Remote vision-language endpoint doing extraction + translation in one shot.
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: TranslationMode,
    pub backend: BackendKind,
    pub base_url: String,
    pub source_lang: String,
    pub target_lang: String,
    pub model_name: String,
    pub auto_capture_enabled: bool,
    pub interval_seconds: u64,
    pub request_timeout_seconds: u64,
    pub hide_ack_timeout_ms: u64,
    /// Overlay opacity, 0..1.
    pub opacity: f32,
    /// Detector lines below this confidence are discarded.
    pub min_ocr_confidence: f32,
    pub regions: Vec<RegionSeed>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: TranslationMode::RegionSelection,
            backend: BackendKind::Remote,
            base_url: "http://localhost:11434".to_string(),
            source_lang: "auto".to_string(),
            target_lang: "English".to_string(),
            model_name: "qwen3-vl:2b-instruct".to_string(),
            auto_capture_enabled: false,
            interval_seconds: 5,
            request_timeout_seconds: 60,
            hide_ack_timeout_ms: 250,
            opacity: 0.85,
            min_ocr_confidence: 0.2,
            regions: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn hide_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.hide_ack_timeout_ms)
    }
}
