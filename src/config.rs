//! Configuration for a conversion studio.
//!
//! Everything the orchestrator, the progress estimator, the export formatter
//! and the VLM extraction backend need is collected in [`StudioConfig`],
//! built via [`StudioConfigBuilder`]. The config is cheap to clone and is
//! shared read-only once the orchestrator is constructed.

use crate::error::StudioError;
use crate::l10n::Locale;
use crate::progress::{
    ProgressCallback, ProgressSettings, DEFAULT_PROGRESS_CAP, DEFAULT_PROGRESS_STEP,
};
use crate::session::{DEFAULT_MAX_FILE_SIZE, PDF_MIME_TYPE};
use crate::styles::StylePresetId;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Base filename used when the source file has no usable name.
pub const DEFAULT_BASE_NAME: &str = "document";

/// Upper bound on a single exported payload (64 MiB).
pub const DEFAULT_MAX_EXPORT_BYTES: usize = 64 * 1024 * 1024;

/// Accepted range for [`ExtractionConfig::max_rendered_pixels`].
pub const RENDERED_PIXELS_RANGE: std::ops::RangeInclusive<u32> = 100..=8000;

/// Configuration for a [`crate::orchestrator::ConversionOrchestrator`].
///
/// # Example
/// ```rust
/// use pdf2md_studio::{StudioConfig, StylePresetId};
///
/// let config = StudioConfig::builder()
///     .max_file_size(5 * 1024 * 1024)
///     .default_preset(StylePresetId::Modern)
///     .build()
///     .unwrap();
/// assert_eq!(config.default_preset, StylePresetId::Modern);
/// ```
#[derive(Clone)]
pub struct StudioConfig {
    /// Largest file a selection may carry, in bytes. Default: 10 MiB.
    pub max_file_size: u64,

    /// The only declared MIME type accepted on selection. Default: `application/pdf`.
    pub accepted_mime_type: String,

    /// Milliseconds between progress ticks. Default: 100.
    pub tick_interval_ms: u64,

    /// Percentage added per tick. Default: 1.
    pub progress_step: u8,

    /// Highest percentage ticking alone can reach. Default: 90.
    pub progress_cap: u8,

    /// Preset applied when an export does not name one. Default: classic.
    pub default_preset: StylePresetId,

    /// Base filename when the source is unnamed. Default: `"document"`.
    pub default_base_name: String,

    /// Interface language for user-facing messages. Default: English.
    pub locale: Locale,

    /// Exports larger than this fail with an export error. Default: 64 MiB.
    pub max_export_bytes: usize,

    /// Where the CLI saves downloads. `None` means the current directory.
    pub output_dir: Option<PathBuf>,

    /// Knobs for the built-in vision-LLM extraction backend.
    pub extraction: ExtractionConfig,

    /// Optional observer notified as a conversion advances.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            accepted_mime_type: PDF_MIME_TYPE.to_string(),
            tick_interval_ms: 100,
            progress_step: DEFAULT_PROGRESS_STEP,
            progress_cap: DEFAULT_PROGRESS_CAP,
            default_preset: StylePresetId::default(),
            default_base_name: DEFAULT_BASE_NAME.to_string(),
            locale: Locale::default(),
            max_export_bytes: DEFAULT_MAX_EXPORT_BYTES,
            output_dir: None,
            extraction: ExtractionConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for StudioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudioConfig")
            .field("max_file_size", &self.max_file_size)
            .field("accepted_mime_type", &self.accepted_mime_type)
            .field("tick_interval_ms", &self.tick_interval_ms)
            .field("progress_step", &self.progress_step)
            .field("progress_cap", &self.progress_cap)
            .field("default_preset", &self.default_preset)
            .field("default_base_name", &self.default_base_name)
            .field("locale", &self.locale)
            .field("max_export_bytes", &self.max_export_bytes)
            .field("output_dir", &self.output_dir)
            .field("extraction", &self.extraction)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl StudioConfig {
    /// Create a new builder for `StudioConfig`.
    pub fn builder() -> StudioConfigBuilder {
        StudioConfigBuilder {
            config: Self::default(),
        }
    }

    /// Tick cadence for the progress estimator.
    pub fn progress_settings(&self) -> ProgressSettings {
        ProgressSettings {
            interval: Duration::from_millis(self.tick_interval_ms),
            step: self.progress_step,
            cap: self.progress_cap,
        }
    }
}

/// Builder for [`StudioConfig`].
pub struct StudioConfigBuilder {
    config: StudioConfig,
}

impl fmt::Debug for StudioConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudioConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl StudioConfigBuilder {
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn accepted_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.config.accepted_mime_type = mime.into();
        self
    }

    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.config.tick_interval_ms = ms;
        self
    }

    pub fn progress_step(mut self, step: u8) -> Self {
        self.config.progress_step = step;
        self
    }

    pub fn progress_cap(mut self, cap: u8) -> Self {
        self.config.progress_cap = cap;
        self
    }

    pub fn default_preset(mut self, preset: StylePresetId) -> Self {
        self.config.default_preset = preset;
        self
    }

    pub fn default_base_name(mut self, name: impl Into<String>) -> Self {
        self.config.default_base_name = name.into();
        self
    }

    pub fn locale(mut self, locale: Locale) -> Self {
        self.config.locale = locale;
        self
    }

    pub fn max_export_bytes(mut self, bytes: usize) -> Self {
        self.config.max_export_bytes = bytes;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.config.extraction = extraction;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StudioConfig, StudioError> {
        let c = &self.config;
        if c.max_file_size == 0 {
            return Err(StudioError::InvalidConfig(
                "max_file_size must be > 0".into(),
            ));
        }
        if !c.accepted_mime_type.contains('/') {
            return Err(StudioError::InvalidConfig(format!(
                "accepted_mime_type must look like type/subtype, got '{}'",
                c.accepted_mime_type
            )));
        }
        if c.tick_interval_ms == 0 {
            return Err(StudioError::InvalidConfig(
                "tick_interval_ms must be ≥ 1".into(),
            ));
        }
        if c.progress_step == 0 {
            return Err(StudioError::InvalidConfig(
                "progress_step must be ≥ 1".into(),
            ));
        }
        if c.progress_cap == 0 || c.progress_cap >= 100 {
            return Err(StudioError::InvalidConfig(format!(
                "progress_cap must be 1–99, got {}",
                c.progress_cap
            )));
        }
        if c.default_base_name.trim().is_empty() {
            return Err(StudioError::InvalidConfig(
                "default_base_name must not be empty".into(),
            ));
        }
        if matches!(c.default_base_name.trim(), "." | "..")
            || c
                .default_base_name
                .chars()
                .any(|ch| matches!(ch, '/' | '\\') || ch.is_control())
        {
            return Err(StudioError::InvalidConfig(format!(
                "default_base_name must be a plain file name, got {:?}",
                c.default_base_name
            )));
        }
        if c.max_export_bytes == 0 {
            return Err(StudioError::InvalidConfig(
                "max_export_bytes must be > 0".into(),
            ));
        }
        if !RENDERED_PIXELS_RANGE.contains(&c.extraction.max_rendered_pixels) {
            return Err(StudioError::InvalidConfig(format!(
                "max_rendered_pixels must be {}–{}, got {}",
                RENDERED_PIXELS_RANGE.start(),
                RENDERED_PIXELS_RANGE.end(),
                c.extraction.max_rendered_pixels
            )));
        }
        if c.extraction.concurrency == 0 {
            return Err(StudioError::InvalidConfig(
                "extraction concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Settings for the vision-LLM extraction backend.
///
/// Pages are rasterised with pdfium and transcribed one image at a time by a
/// vision model from `edgequake-llm`.
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Longest rendered page edge in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Concurrent VLM calls. Default: 8.
    pub concurrency: usize,

    /// Model identifier, e.g. "gpt-4.1-nano". `None` uses the provider default.
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Output token budget per page. Default: 4096.
    pub max_tokens: usize,

    /// Retries per page after the first attempt. Default: 3.
    pub max_retries: u32,

    /// First retry delay; doubles each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Replacement system prompt.
    pub system_prompt: Option<String>,

    /// Directory holding libpdfium. `None` tries `$PDFIUM_DYNAMIC_LIB_PATH`,
    /// then `./`, then the system library.
    pub pdfium_library_path: Option<PathBuf>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_rendered_pixels: 2000,
            concurrency: 8,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            system_prompt: None,
            pdfium_library_path: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .finish()
    }
}

impl ExtractionConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_max_rendered_pixels(mut self, px: u32) -> Self {
        self.max_rendered_pixels = px;
        self
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_pdfium_library_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pdfium_library_path = Some(dir.into());
        self
    }
}
