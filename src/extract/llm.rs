//! One page image in, one page of Markdown out.
//!
//! Pages are sent as lossless PNG with `detail: "high"` so small print
//! survives. Failed calls are retried with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`); a page that still fails is reported
//! in its [`PageOutcome`] rather than aborting the document.

use crate::config::ExtractionConfig;
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use image::DynamicImage;
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Result of transcribing one page.
#[derive(Debug, Clone)]
pub(crate) struct PageOutcome {
    /// 1-based.
    pub page_num: usize,
    pub markdown: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub retries: u32,
    pub error: Option<String>,
}

/// Encode a rendered page as base64 PNG.
pub(crate) fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page image: {} bytes base64", b64.len());
    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

fn completion_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Ask the vision model to transcribe one page.
pub(crate) async fn transcribe_page(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    image: ImageData,
    config: &ExtractionConfig,
) -> PageOutcome {
    let start = Instant::now();
    let prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let messages = vec![
        ChatMessage::system(prompt),
        ChatMessage::user_with_images("", vec![image]),
    ];
    let options = completion_options(config);

    let mut last_err = None;
    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Page {}: retry {}/{} in {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                debug!(
                    "Page {}: {} in / {} out tokens in {:?}",
                    page_num,
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                return PageOutcome {
                    page_num,
                    markdown: response.content,
                    input_tokens: response.prompt_tokens,
                    output_tokens: response.completion_tokens,
                    retries: attempt,
                    error: None,
                };
            }
            Err(e) => {
                warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, e);
                last_err = Some(e.to_string());
            }
        }
    }

    PageOutcome {
        page_num,
        markdown: String::new(),
        input_tokens: 0,
        output_tokens: 0,
        retries: config.max_retries,
        error: Some(last_err.unwrap_or_else(|| "unknown error".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encodes_png() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255])));
        let data = encode_page(&img).unwrap();
        assert_eq!(data.mime_type, "image/png");
        let raw = STANDARD.decode(&data.data).unwrap();
        assert!(raw.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn options_follow_config() {
        let config = ExtractionConfig {
            temperature: 0.3,
            max_tokens: 1000,
            ..Default::default()
        };
        let opts = completion_options(&config);
        assert_eq!(opts.temperature, Some(0.3));
        assert_eq!(opts.max_tokens, Some(1000));
    }
}
