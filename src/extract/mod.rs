//! Built-in extraction backend: pdfium rasterisation + a vision LLM.
//!
//! ```text
//! bytes ─▶ render (pdfium, spawn_blocking) ─▶ encode (PNG/base64)
//!       ─▶ transcribe (≤ concurrency VLM calls, retried) ─▶ clean ─▶ join
//! ```
//!
//! [`VlmLoader`] is the [`CapabilityLoader`] used by default: loading binds
//! libpdfium once to prove it is present and resolves the LLM provider, so
//! both failures surface while the engine is "loading" rather than halfway
//! through a document.

mod cleanup;
mod llm;
mod render;

use crate::capability::{CapabilityLoader, ExtractionCapability};
use crate::config::ExtractionConfig;
use crate::error::StudioError;
use crate::session::SourceFile;
use async_trait::async_trait;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

/// Loads a [`VlmExtractor`].
#[derive(Debug, Clone, Default)]
pub struct VlmLoader {
    config: ExtractionConfig,
}

impl VlmLoader {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CapabilityLoader for VlmLoader {
    async fn load(&self) -> Result<Arc<dyn ExtractionCapability>, StudioError> {
        render::probe_pdfium(self.config.pdfium_library_path.clone()).await?;
        let provider = resolve_provider(&self.config)?;
        info!(
            "VLM extractor ready (model {})",
            self.config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL)
        );
        Ok(Arc::new(VlmExtractor {
            provider,
            config: self.config.clone(),
        }))
    }
}

/// Converts PDFs page by page with a vision model.
pub struct VlmExtractor {
    provider: Arc<dyn LLMProvider>,
    config: ExtractionConfig,
}

impl VlmExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: ExtractionConfig) -> Self {
        Self { provider, config }
    }
}

#[async_trait]
impl ExtractionCapability for VlmExtractor {
    fn name(&self) -> &str {
        "vlm"
    }

    async fn convert(&self, file: &SourceFile) -> Result<String, StudioError> {
        let start = Instant::now();
        let name = file
            .descriptor()
            .name
            .clone()
            .unwrap_or_else(|| "<unnamed>".into());
        let bytes = file.read_bytes().await?;

        let rendered = render::render_document(
            name.clone(),
            bytes,
            self.config.max_rendered_pixels,
            self.config.pdfium_library_path.clone(),
        )
        .await?;
        let total = rendered.len();

        let mut encoded = Vec::with_capacity(total);
        let mut outcomes = Vec::with_capacity(total);
        for (idx, img) in &rendered {
            match llm::encode_page(img) {
                Ok(data) => encoded.push((idx + 1, data)),
                Err(e) => {
                    warn!("Page {}: encoding failed: {}", idx + 1, e);
                    outcomes.push(llm::PageOutcome {
                        page_num: idx + 1,
                        markdown: String::new(),
                        input_tokens: 0,
                        output_tokens: 0,
                        retries: 0,
                        error: Some(format!("image encoding failed: {e}")),
                    });
                }
            }
        }
        drop(rendered);

        let transcribed: Vec<llm::PageOutcome> = stream::iter(encoded.into_iter().map(
            |(page_num, image)| {
                let provider = Arc::clone(&self.provider);
                let config = &self.config;
                async move { llm::transcribe_page(&provider, page_num, image, config).await }
            },
        ))
        .buffer_unordered(self.config.concurrency.max(1))
        .collect()
        .await;
        outcomes.extend(transcribed);
        outcomes.sort_by_key(|o| o.page_num);

        let succeeded = outcomes.iter().filter(|o| o.error.is_none()).count();
        if succeeded == 0 {
            let first_error = outcomes
                .iter()
                .find_map(|o| o.error.clone())
                .unwrap_or_else(|| "unknown error".into());
            return Err(StudioError::AllPagesFailed {
                total,
                retries: self.config.max_retries,
                first_error,
            });
        }

        let cleaned: Vec<String> = outcomes
            .iter()
            .filter(|o| o.error.is_none())
            .map(|o| cleanup::clean_page(&o.markdown))
            .collect();
        let markdown = cleanup::join_pages(cleaned.iter().map(String::as_str));

        let input_tokens: usize = outcomes.iter().map(|o| o.input_tokens).sum();
        let output_tokens: usize = outcomes.iter().map(|o| o.output_tokens).sum();
        let retries: u32 = outcomes.iter().map(|o| o.retries).sum();
        info!(
            "{}: {}/{} pages in {:?} ({} in / {} out tokens, {} retries)",
            name,
            succeeded,
            total,
            start.elapsed(),
            input_tokens,
            output_tokens,
            retries
        );
        Ok(markdown)
    }
}

/// Pick the LLM provider, most specific source first:
///
/// 1. a pre-built `config.provider`;
/// 2. `config.provider_name` with `config.model`;
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set;
/// 4. OpenAI, when `OPENAI_API_KEY` is set;
/// 5. whatever [`ProviderFactory::from_env`] detects.
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, StudioError> {
    if let Some(provider) = &config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
    if let Some(name) = &config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("openai", model);
    }

    let (llm, _embedding) =
        ProviderFactory::from_env().map_err(|e| StudioError::ProviderNotConfigured {
            provider: "auto".into(),
            hint: format!(
                "No LLM provider could be detected from the environment.\n\
                 Set OPENAI_API_KEY or ANTHROPIC_API_KEY, or pass --provider.\n\
                 Error: {e}"
            ),
        })?;
    Ok(llm)
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, StudioError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        StudioError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: e.to_string(),
        }
    })
}
