//! Local detect-then-translate pipeline.
//!
//! Text detection and seq2seq translation are opaque external services
//! behind the [`TextDetector`] and [`TextTranslator`] traits — this module
//! owns everything around them: language-pair resolution, the confidence
//! floor, recognized-string batching, and an LRU cache that spares the
//! model from re-translating text that is still on screen.

use super::{BackendError, RegionCrop, TranslationFragment};
use crate::config::AppConfig;
use crate::region::Rect;
use image::DynamicImage;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

/// One line of recognized text, in crop-local pixel coordinates.
#[derive(Debug, Clone)]
pub struct DetectedLine {
    pub text: String,
    pub bbox: Rect,
    pub confidence: f32,
}

/// OCR seam. Implementations wrap whatever engine is installed.
pub trait TextDetector: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectedLine>, BackendError>;
}

/// Seq2seq translation seam. `source` is `None` when the model detects
/// the source language itself (multilingual families only).
pub trait TextTranslator: Send + Sync {
    fn translate_batch(
        &self,
        texts: &[String],
        source: Option<&str>,
        target: &str,
    ) -> Result<Vec<String>, BackendError>;
}

/// UI language name → (directional short code, multilingual model code).
const LANG_CODES: &[(&str, &str, &str)] = &[
    ("Japanese", "ja", "jpn_Jpan"),
    ("Korean", "ko", "kor_Kore"),
    ("Chinese", "zh", "zho_Hans"),
    ("Spanish", "es", "spa_Latn"),
    ("French", "fr", "fra_Latn"),
    ("English", "en", "eng_Latn"),
];

fn short_code(lang: &str) -> Option<&'static str> {
    LANG_CODES.iter().find(|(n, _, _)| *n == lang).map(|(_, s, _)| *s)
}

fn multilingual_code(lang: &str) -> Option<&'static str> {
    LANG_CODES.iter().find(|(n, _, _)| *n == lang).map(|(_, _, m)| *m)
}

/// A model name resolved against the configured language pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub checkpoint: String,
    pub source_code: Option<String>,
    pub target_code: String,
}

impl ResolvedModel {
    /// Where detector/translator implementations look for this
    /// checkpoint's downloaded weights. Path separators in the checkpoint
    /// name are flattened, hub-cache style.
    pub fn checkpoint_path(&self) -> PathBuf {
        checkpoint_dir().join(self.checkpoint.replace('/', "--"))
    }
}

/// Directional families (one checkpoint per language pair, no "auto"
/// source). Multilingual families like NLLB take language codes at
/// generation time instead.
fn is_directional(model: &str) -> bool {
    model.contains("opus-mt")
}

/// Resolve a configured model name + language pair into the concrete
/// checkpoint and generation codes. Fails fast — retrying a pass would
/// repeat the same failure.
pub fn resolve_model(model: &str, source: &str, target: &str) -> Result<ResolvedModel, BackendError> {
    let unresolved = || BackendError::LanguagePairUnresolved {
        model: model.to_string(),
        source_lang: source.to_string(),
        target_lang: target.to_string(),
    };

    if is_directional(model) {
        // No auto-detection: both ends of the pair are mandatory
        if source == "auto" {
            return Err(unresolved());
        }
        let src = short_code(source).ok_or_else(unresolved)?;
        let tgt = short_code(target).ok_or_else(unresolved)?;
        let checkpoint = if model.ends_with("opus-mt") {
            format!("{model}-{src}-{tgt}")
        } else {
            model.to_string()
        };
        return Ok(ResolvedModel {
            checkpoint,
            source_code: Some(src.to_string()),
            target_code: tgt.to_string(),
        });
    }

    let tgt = multilingual_code(target).ok_or_else(unresolved)?;
    let src = if source == "auto" {
        None
    } else {
        Some(multilingual_code(source).ok_or_else(unresolved)?.to_string())
    };
    Ok(ResolvedModel {
        checkpoint: model.to_string(),
        source_code: src,
        target_code: tgt.to_string(),
    })
}

/// Where detector/translator implementations look for downloaded weights.
pub fn checkpoint_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("polyglass")
        .join("models")
}

const CACHE_CAP: usize = 500;

/// Minimal LRU over recognized strings. The model name and language pair
/// are fixed per pipeline instance, so the recognized text alone keys
/// the cache.
struct LruCache {
    map: HashMap<String, String>,
    order: VecDeque<String>,
    cap: usize,
}

impl LruCache {
    fn new(cap: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            cap,
        }
    }

    fn get(&mut self, key: &str) -> Option<String> {
        let value = self.map.get(key).cloned()?;
        self.touch(key);
        Some(value)
    }

    fn put(&mut self, key: String, value: String) {
        if self.map.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
        } else {
            self.touch(&key);
        }
        while self.map.len() > self.cap {
            if let Some(evicted) = self.order.pop_front() {
                self.map.remove(&evicted);
            } else {
                break;
            }
        }
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos).unwrap_or_else(|| key.to_string());
            self.order.push_back(k);
        }
    }
}

pub struct LocalPipeline {
    detector: Box<dyn TextDetector>,
    translator: Box<dyn TextTranslator>,
    resolved: ResolvedModel,
    min_confidence: f32,
    cache: Mutex<LruCache>,
}

impl LocalPipeline {
    /// Resolves the language pair up front; a misconfigured pair never
    /// reaches the capture stage.
    pub fn new(
        config: &AppConfig,
        detector: Box<dyn TextDetector>,
        translator: Box<dyn TextTranslator>,
    ) -> Result<Self, BackendError> {
        let resolved = resolve_model(&config.model_name, &config.source_lang, &config.target_lang)?;
        log::info!(
            "[LOCAL] Using checkpoint '{}' ({:?} -> {}), weights at {}",
            resolved.checkpoint,
            resolved.source_code,
            resolved.target_code,
            resolved.checkpoint_path().display()
        );
        Ok(Self {
            detector,
            translator,
            resolved,
            min_confidence: config.min_ocr_confidence,
            cache: Mutex::new(LruCache::new(CACHE_CAP)),
        })
    }

    pub fn resolved(&self) -> &ResolvedModel {
        &self.resolved
    }

    pub fn ensure_ready(&self) -> Result<(), BackendError> {
        // Pair resolution already happened in the constructor
        Ok(())
    }

    /// Detect text in every crop, then push all uncached strings through
    /// the translation model in one batch. Fragments come back grouped in
    /// crop order; a detector failure on one crop skips that crop only.
    pub fn translate(&self, crops: &[RegionCrop]) -> Result<Vec<TranslationFragment>, BackendError> {
        let mut lines: Vec<(usize, DetectedLine)> = Vec::new();
        for (idx, crop) in crops.iter().enumerate() {
            match self.detector.detect(&crop.image) {
                Ok(detected) => {
                    let kept = detected
                        .into_iter()
                        .filter(|l| l.confidence >= self.min_confidence && !l.text.trim().is_empty());
                    lines.extend(kept.map(|l| (idx, l)));
                }
                Err(e) => {
                    log::warn!(
                        "[LOCAL] Detector failed for region {:?}: {e} — skipping",
                        crops[idx].region_id
                    );
                }
            }
        }

        if lines.is_empty() {
            return Ok(Vec::new());
        }

        // Cache pass: translated[i] is None for strings that need the model
        let mut translated: Vec<Option<String>> = Vec::with_capacity(lines.len());
        let mut pending: Vec<usize> = Vec::new();
        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            for (i, (_, line)) in lines.iter().enumerate() {
                match cache.get(line.text.trim()) {
                    Some(hit) => translated.push(Some(hit)),
                    None => {
                        translated.push(None);
                        pending.push(i);
                    }
                }
            }
        }

        if !pending.is_empty() {
            let texts: Vec<String> = pending
                .iter()
                .map(|&i| lines[i].1.text.trim().to_string())
                .collect();
            log::info!("[LOCAL] Translating batch of {} line(s)", texts.len());
            let start = std::time::Instant::now();
            let outputs = self.translator.translate_batch(
                &texts,
                self.resolved.source_code.as_deref(),
                &self.resolved.target_code,
            )?;
            if outputs.len() != texts.len() {
                return Err(BackendError::MalformedResponse(format!(
                    "translator returned {} results for {} inputs",
                    outputs.len(),
                    texts.len()
                )));
            }
            log::info!(
                "[LOCAL] Batch translated in {}ms",
                start.elapsed().as_millis()
            );

            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            for (slot, (input, output)) in pending.iter().zip(texts.iter().zip(outputs)) {
                cache.put(input.clone(), output.clone());
                translated[*slot] = Some(output);
            }
        }

        let fragments = lines
            .iter()
            .zip(translated)
            .filter_map(|((idx, line), text)| {
                Some(TranslationFragment {
                    source_region_id: crops[*idx].region_id,
                    original_text: Some(line.text.clone()),
                    translated_text: text?,
                    bbox: Some(line.bbox),
                })
            })
            .collect();
        Ok(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedDetector {
        lines: Vec<DetectedLine>,
    }

    impl TextDetector for FixedDetector {
        fn detect(&self, _image: &DynamicImage) -> Result<Vec<DetectedLine>, BackendError> {
            Ok(self.lines.clone())
        }
    }

    struct UppercaseTranslator {
        calls: Arc<AtomicUsize>,
    }

    impl TextTranslator for UppercaseTranslator {
        fn translate_batch(
            &self,
            texts: &[String],
            _source: Option<&str>,
            _target: &str,
        ) -> Result<Vec<String>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| t.to_uppercase()).collect())
        }
    }

    fn line(text: &str, confidence: f32) -> DetectedLine {
        DetectedLine {
            text: text.to_string(),
            bbox: Rect::new(0, 0, 50, 20),
            confidence,
        }
    }

    fn crop(id: u64) -> RegionCrop {
        RegionCrop {
            region_id: Some(RegionId(id)),
            image: DynamicImage::new_rgba8(10, 10),
        }
    }

    fn pipeline(detector: FixedDetector, calls: Arc<AtomicUsize>) -> LocalPipeline {
        let config = AppConfig {
            model_name: "facebook/nllb-200-distilled-600M".to_string(),
            source_lang: "Japanese".to_string(),
            target_lang: "English".to_string(),
            ..AppConfig::default()
        };
        LocalPipeline::new(
            &config,
            Box::new(detector),
            Box::new(UppercaseTranslator { calls }),
        )
        .unwrap()
    }

    #[test]
    fn directional_model_resolves_pair_specific_checkpoint() {
        let r = resolve_model("Helsinki-NLP/opus-mt", "Japanese", "English").unwrap();
        assert_eq!(r.checkpoint, "Helsinki-NLP/opus-mt-ja-en");
        assert_eq!(r.source_code.as_deref(), Some("ja"));
        assert_eq!(r.target_code, "en");
    }

    #[test]
    fn directional_model_rejects_auto_source() {
        let err = resolve_model("Helsinki-NLP/opus-mt", "auto", "English").unwrap_err();
        assert!(matches!(err, BackendError::LanguagePairUnresolved { .. }));
    }

    #[test]
    fn unresolved_pair_error_names_both_languages() {
        let err = resolve_model("Helsinki-NLP/opus-mt", "auto", "English").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'auto'"));
        assert!(msg.contains("'English'"));
    }

    #[test]
    fn multilingual_model_allows_auto_source() {
        let r = resolve_model("facebook/nllb-200-distilled-600M", "auto", "Japanese").unwrap();
        assert_eq!(r.source_code, None);
        assert_eq!(r.target_code, "jpn_Jpan");
    }

    #[test]
    fn checkpoint_path_lands_under_the_models_dir() {
        let r = resolve_model("facebook/nllb-200-distilled-600M", "auto", "English").unwrap();
        let p = r.checkpoint_path();
        assert_eq!(
            p.file_name().and_then(|n| n.to_str()),
            Some("facebook--nllb-200-distilled-600M")
        );
        assert!(p.parent().unwrap().ends_with("polyglass/models"));
    }

    #[test]
    fn unknown_target_language_is_unresolved() {
        let err = resolve_model("facebook/nllb-200-distilled-600M", "auto", "Klingon").unwrap_err();
        assert!(matches!(err, BackendError::LanguagePairUnresolved { .. }));
    }

    #[test]
    fn fragments_stay_attributed_to_their_region() {
        let calls = Arc::new(AtomicUsize::new(0));
        let p = pipeline(
            FixedDetector {
                lines: vec![line("one", 0.9), line("two", 0.9)],
            },
            calls,
        );
        let frags = p.translate(&[crop(1), crop(2), crop(3)]).unwrap();
        assert_eq!(frags.len(), 6);
        // Grouped in crop order: both lines of R1, then R2, then R3
        let ids: Vec<_> = frags.iter().map(|f| f.source_region_id.unwrap().0).collect();
        assert_eq!(ids, vec![1, 1, 2, 2, 3, 3]);
        assert!(frags.iter().all(|f| f.translated_text == "ONE" || f.translated_text == "TWO"));
    }

    #[test]
    fn low_confidence_lines_are_dropped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let p = pipeline(
            FixedDetector {
                lines: vec![line("keep", 0.5), line("drop", 0.1)],
            },
            calls,
        );
        let frags = p.translate(&[crop(1)]).unwrap();
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].original_text.as_deref(), Some("keep"));
    }

    #[test]
    fn repeat_text_is_served_from_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let p = pipeline(
            FixedDetector {
                lines: vec![line("hello", 0.9)],
            },
            calls.clone(),
        );
        let first = p.translate(&[crop(1)]).unwrap();
        let second = p.translate(&[crop(1)]).unwrap();
        assert_eq!(first[0].translated_text, "HELLO");
        assert_eq!(second[0].translated_text, "HELLO");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lru_evicts_oldest_beyond_capacity() {
        let mut cache = LruCache::new(2);
        cache.put("a".into(), "1".into());
        cache.put("b".into(), "2".into());
        // Touch "a" so "b" is the eviction candidate
        assert_eq!(cache.get("a").as_deref(), Some("1"));
        cache.put("c".into(), "3".into());
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a").as_deref(), Some("1"));
        assert_eq!(cache.get("c").as_deref(), Some("3"));
    }
}
