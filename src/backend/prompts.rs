//! Prompt builders for the remote vision-language model.
//!
//! The extraction prompt demands a strict JSON shape with normalized
//! [0, 1000] coordinates; `parse.rs` is the matching consumer. The region
//! prompt asks for bare translated text since the crop already bounds the
//! area of interest.

pub const MAX_PREDICT_TOKENS: u32 = 2048;

/// Full-frame prompt: detect all text, translate, report positions.
pub fn extraction_prompt(target_lang: &str) -> String {
    format!(
        r#"<|im_start|>system
You are a professional translator and OCR engine.
Your task is to detect all text in the image and translate it to {target_lang}.
Return ONLY a JSON object with a "translations" list.

Rules:
1. "translated_text": MUST be in {target_lang}. NEVER return the original language.
2. "x", "y", "width", "height": Use NORMALIZED coordinates [0 to 1000] relative to the image size.
   - (0,0) is top-left, (1000,1000) is bottom-right.
3. Group nearby words that form a single phrase or sentence into a single item.
4. Do not translate the same text multiple times.

Example:
{{
  "translations": [
    {{ "translated_text": "Hello World", "x": 100, "y": 150, "width": 200, "height": 50 }}
  ]
}}
<|im_end|>
<|im_start|>user
<|vision_start|><|image_pad|><|vision_end|>
Translate all text in this image to {target_lang}. Use normalized [0-1000] coordinates.
<|im_end|>
<|im_start|>assistant
"#
    )
}

/// Region-crop prompt: bare translated text, no coordinates.
pub fn region_prompt(source_lang: &str, target_lang: &str) -> String {
    format!(
        r#"<|im_start|>system
You are a professional translator. Detect and translate the text in the image from {source_lang} to {target_lang}.
Return ONLY the translated text in {target_lang}. No preamble.
<|im_end|>
<|im_start|>user
<|vision_start|><|image_pad|><|vision_end|>Translate the text in this image to {target_lang}.
<|im_end|>
<|im_start|>assistant
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_mention_languages() {
        let p = extraction_prompt("German");
        assert!(p.contains("translate it to German"));
        assert!(p.contains("\"translations\""));

        let p = region_prompt("Japanese", "English");
        assert!(p.contains("from Japanese to English"));
    }
}
