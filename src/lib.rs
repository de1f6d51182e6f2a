//! # pdf2md-studio
//!
//! A PDF → Markdown conversion session: pick a file, convert it with a
//! pluggable extraction engine, preview and edit the Markdown, then export
//! it as `.md` or as a styled `.doc` for word processors.
//!
//! ## Flow
//!
//! ```text
//! select_file ─▶ validate (type, ≤ 10 MiB)
//!      │
//!      ├─ begin_conversion ─▶ ExtractionCapability::convert   (one call)
//!      │        └─ ProgressEstimator: 0 → … → 90 (ticks) → 100 (on success)
//!      │
//!      ├─ render_preview   DocumentRenderer, preview classes
//!      └─ export           ExportFormatter + StylePreset ─▶ Downloader
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2md_studio::{ConversionOrchestrator, ExportTarget, SourceFile, StudioConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // pdfium + a vision LLM auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY
//!     let mut studio = ConversionOrchestrator::with_vlm(StudioConfig::default());
//!     studio.select_file(SourceFile::from_path("report.pdf").await?)?;
//!     studio.convert().await?;
//!
//!     let doc = studio.export(ExportTarget::WordDocument, None)?;
//!     std::fs::write(&doc.filename, &doc.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2md-studio` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod capability;
pub mod config;
pub mod download;
pub mod error;
pub mod export;
pub mod extract;
pub mod l10n;
pub mod orchestrator;
pub mod progress;
pub mod prompts;
pub mod render;
pub mod session;
pub mod styles;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use capability::{CapabilityHandle, CapabilityLoader, CapabilityState, ExtractionCapability};
pub use config::{ExtractionConfig, StudioConfig, StudioConfigBuilder};
pub use download::{Downloader, SavedDownload};
pub use error::{ErrorKind, SessionError, StudioError};
pub use export::{derive_filename, ExportFormatter, ExportJob, ExportPayload, ExportTarget};
pub use extract::{VlmExtractor, VlmLoader};
pub use l10n::{Locale, Localizer};
pub use orchestrator::{ConversionOrchestrator, Disposition, ExtractionOutcome, PendingExtraction};
pub use progress::{
    ConversionProgressCallback, NoopProgressCallback, ProgressCallback, ProgressEstimator,
    ProgressModel, ProgressPhase, ProgressSettings,
};
pub use render::{render_preview_html, DocumentRenderer, NodeType, RenderTarget, RenderedDocument, StructureSummary};
pub use session::{ConversionSession, FileDescriptor, SessionStatus, SourceFile};
pub use styles::{StylePreset, StylePresetId};
