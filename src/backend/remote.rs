//! Remote vision-language inference client (Ollama-style API).
//!
//! Each region crop goes up as one `POST {base_url}/api/generate` request
//! carrying the PNG as base64 plus a prompt asking for simultaneous text
//! extraction and translation. No local text detection happens on this
//! path — the model does everything, and `parse.rs` turns its answer into
//! fragments.
//!
//! Failure mapping: connection refused / timed out is `Unavailable`
//! (the server is down); HTTP 404 is `ModelNotFound` (the server is up
//! but the model was never pulled). The two must stay distinguishable —
//! they have different remediations.

use super::parse::{parse_fragments, truncate_utf8};
use super::{prompts, BackendError, RegionCrop, TranslationFragment};
use crate::capture::encode_png;
use crate::config::{AppConfig, TranslationMode};
use base64::Engine;
use std::time::Duration;

pub struct RemoteService {
    client: reqwest::Client,
    base_url: String,
    model: String,
    mode: TranslationMode,
    source_lang: String,
    target_lang: String,
    timeout: Duration,
}

impl RemoteService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model_name.clone(),
            mode: config.mode,
            source_lang: config.source_lang.clone(),
            target_lang: config.target_lang.clone(),
            timeout: config.request_timeout(),
        }
    }

    /// Translate crops one request at a time, preserving crop order in
    /// the returned fragment stream.
    pub async fn translate(
        &self,
        crops: &[RegionCrop],
    ) -> Result<Vec<TranslationFragment>, BackendError> {
        let mut fragments = Vec::new();
        for crop in crops {
            fragments.extend(self.translate_crop(crop).await?);
        }
        Ok(fragments)
    }

    async fn translate_crop(
        &self,
        crop: &RegionCrop,
    ) -> Result<Vec<TranslationFragment>, BackendError> {
        let png = encode_png(&crop.image)
            .map_err(|e| BackendError::Unavailable(format!("crop encoding failed: {e}")))?;
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(&png);
        let payload = self.build_payload(&image_b64);

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::ModelNotFound {
                model: self.model.clone(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Unavailable(format!(
                "inference endpoint returned HTTP {status}: {}",
                truncate_utf8(&body, 200)
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;
        let content = body
            .get("response")
            .and_then(|r| r.as_str())
            .unwrap_or_default();

        log::info!(
            "[REMOTE] Region {:?}: {} chars in {}ms",
            crop.region_id,
            content.len(),
            start.elapsed().as_millis()
        );
        if content.is_empty() {
            log::warn!("[REMOTE] Empty response content for region {:?}", crop.region_id);
        }

        Ok(parse_fragments(
            content,
            crop.region_id,
            crop.image.width(),
            crop.image.height(),
        ))
    }

    fn build_payload(&self, image_b64: &str) -> serde_json::Value {
        let (prompt, format) = match self.mode {
            TranslationMode::FullScreen => {
                (prompts::extraction_prompt(&self.target_lang), "json")
            }
            TranslationMode::RegionSelection => {
                (prompts::region_prompt(&self.source_lang, &self.target_lang), "")
            }
        };
        serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "images": [image_b64],
            "stream": false,
            "format": format,
            "keep_alive": -1,
            "options": {
                "num_predict": prompts::MAX_PREDICT_TOKENS,
                "temperature": 0,
            },
        })
    }

    /// List models the endpoint serves, for UI population.
    pub async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(map_transport_error)?;
        if !response.status().is_success() {
            return Err(BackendError::Unavailable(format!(
                "model listing returned HTTP {}",
                response.status()
            )));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;
        let models = body
            .get("models")
            .and_then(|m| m.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
                    .map(|n| n.to_string())
                    .collect()
            })
            .unwrap_or_default();
        Ok(models)
    }

    pub async fn is_available(&self) -> bool {
        self.list_models().await.is_ok()
    }
}

fn map_transport_error(e: reqwest::Error) -> BackendError {
    let detail = if e.is_connect() {
        "connection refused"
    } else if e.is_timeout() {
        "request timed out"
    } else {
        "transport error"
    };
    BackendError::Unavailable(format!("{detail}: {e}"))
}
