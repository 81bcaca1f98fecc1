//! Translation backend abstraction.
//!
//! Two structurally different strategies are normalized into one result
//! shape: [`local::LocalPipeline`] detects text locally and pushes the
//! recognized strings through a seq2seq model; [`remote::RemoteService`]
//! sends the whole crop to a vision-language endpoint that extracts and
//! translates in a single shot. Both return [`TranslationFragment`]s that
//! are attributable back to exactly one source region, in crop order.

pub mod local;
pub mod parse;
pub mod prompts;
pub mod remote;

use crate::region::{Rect, RegionId};
use image::DynamicImage;

/// One crop handed to a backend. `region_id` is `None` for the synthetic
/// whole-screen crop used in full-screen mode.
#[derive(Debug, Clone)]
pub struct RegionCrop {
    pub region_id: Option<RegionId>,
    pub image: DynamicImage,
}

/// One unit of translated text. A region may yield zero or more fragments
/// (one per detected line for the local pipeline, whatever the model
/// grouped for the remote one).
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationFragment {
    pub source_region_id: Option<RegionId>,
    /// Recognized source text; the remote strategy does not report it.
    pub original_text: Option<String>,
    pub translated_text: String,
    /// Position within the crop, in crop-local pixels. `None` means the
    /// fragment fills its region.
    pub bbox: Option<Rect>,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("translation backend unreachable: {0}")]
    Unavailable(String),

    #[error("model '{model}' not found — try: ollama pull {model}")]
    ModelNotFound { model: String },

    // Field is `source_lang`, not `source`: thiserror reserves `source`
    // for the error cause chain.
    #[error(
        "cannot resolve language pair for '{model}': source '{source_lang}' and target \
         '{target_lang}' must both name a supported language"
    )]
    LanguagePairUnresolved {
        model: String,
        source_lang: String,
        target_lang: String,
    },

    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
}

impl BackendError {
    /// Whether a pass can keep going for other regions after this failure.
    /// `ModelNotFound` and `LanguagePairUnresolved` would fail identically
    /// for every region, so they abort the rest of the pass.
    pub fn is_per_region(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::MalformedResponse(_))
    }
}

/// Closed set of translation strategies behind one contract.
pub enum TranslationBackend {
    Local(local::LocalPipeline),
    Remote(remote::RemoteService),
}

impl TranslationBackend {
    /// Whether `translate` should be handed all crops in one call. The
    /// local pipeline batches every recognized string through the model
    /// together; the remote service is dispatched one region at a time so
    /// a failing region cannot take the others down with it.
    pub fn batches(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Fail-fast validation before any capture is attempted. Retrying a
    /// pass would repeat a language-pair failure, so it is surfaced here.
    pub fn ensure_ready(&self) -> Result<(), BackendError> {
        match self {
            Self::Local(p) => p.ensure_ready(),
            Self::Remote(_) => Ok(()),
        }
    }

    /// Translate the given crops. Fragment grouping preserves crop order:
    /// all fragments for crop N precede those for crop N+1.
    pub async fn translate(
        &self,
        crops: &[RegionCrop],
    ) -> Result<Vec<TranslationFragment>, BackendError> {
        match self {
            Self::Local(p) => p.translate(crops),
            Self::Remote(r) => r.translate(crops).await,
        }
    }
}
