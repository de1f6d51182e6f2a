//! Turning Markdown into downloadable payloads.
//!
//! Two targets exist. [`ExportTarget::MarkdownText`] is the Markdown itself,
//! byte for byte. [`ExportTarget::WordDocument`] is an HTML document that
//! word processors open as a `.doc`: the Markdown is rendered onto a
//! short-lived [`RenderSurface`] with [`RenderTarget::Export`] classes, the
//! markup is taken off the surface once rendering has signalled completion,
//! and the result is wrapped in a page template styled by a
//! [`StylePreset`](crate::styles::StylePreset).
//!
//! Formatting is a pure function of the [`ExportJob`]: the same Markdown,
//! preset and name always give the same bytes.

use crate::config::{StudioConfig, DEFAULT_BASE_NAME, DEFAULT_MAX_EXPORT_BYTES};
use crate::error::StudioError;
use crate::render::{DocumentRenderer, RenderTarget, RenderedDocument, StructureSummary};
use crate::styles::StylePresetId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Title of a Word export whose source has no usable name.
pub const DEFAULT_DOCUMENT_TITLE: &str = "Document";

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportTarget {
    /// The Markdown text, unchanged.
    MarkdownText,
    /// Styled HTML served as `application/msword`.
    WordDocument,
}

impl ExportTarget {
    pub fn extension(self) -> &'static str {
        match self {
            ExportTarget::MarkdownText => "md",
            ExportTarget::WordDocument => "doc",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportTarget::MarkdownText => "text/markdown",
            ExportTarget::WordDocument => "application/msword",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExportTarget::MarkdownText => "markdown-text",
            ExportTarget::WordDocument => "word-document",
        }
    }
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to produce one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportJob {
    pub target: ExportTarget,
    pub preset: StylePresetId,
    /// Snapshot of the session's Markdown.
    pub markdown: Arc<str>,
    /// The selected file's original name.
    pub source_name: Option<String>,
}

/// A finished export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    pub target: ExportTarget,
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub filename: String,
}

/// `"report.pdf"` → `"report"`, `"report.PDF"` → `"report"`,
/// `"archive.tar.gz"` → `"archive.tar"`.
///
/// Only a trailing run of ASCII letters and digits after the last dot
/// counts as an extension.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(i) => {
            let ext = &name[i + 1..];
            if !ext.is_empty() && ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
                &name[..i]
            } else {
                name
            }
        }
        None => name,
    }
}

/// `source` without its extension or any trailing dots.
fn source_stem(source: &str) -> &str {
    strip_extension(source.trim()).trim_end_matches('.').trim()
}

/// The download name for `source` exported as `target`.
///
/// The base is `source` with its extension stripped and path separators
/// replaced; an empty or missing base becomes `default_base`.
pub fn derive_filename(source: Option<&str>, target: ExportTarget, default_base: &str) -> String {
    let base = source
        .map(source_stem)
        .filter(|b| !b.is_empty())
        .unwrap_or(default_base);
    format!("{}.{}", sanitize_base(base), target.extension())
}

fn sanitize_base(base: &str) -> String {
    base.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Counts of render surfaces, shared with every surface a formatter mounts.
#[derive(Debug, Default)]
struct SurfaceCounters {
    live: AtomicUsize,
    created: AtomicUsize,
}

/// Proof that a surface finished rendering. Only [`RenderSurface::render`]
/// creates one.
#[derive(Debug)]
#[must_use]
pub struct RenderComplete {
    summary: StructureSummary,
}

impl RenderComplete {
    pub fn summary(&self) -> StructureSummary {
        self.summary
    }
}

/// A hidden rendering target that exists only for one export.
///
/// Unmounted when dropped, on every path out of the export.
pub struct RenderSurface {
    counters: Arc<SurfaceCounters>,
    document: Option<RenderedDocument>,
}

impl RenderSurface {
    fn mount(counters: &Arc<SurfaceCounters>) -> Self {
        counters.live.fetch_add(1, Ordering::SeqCst);
        counters.created.fetch_add(1, Ordering::SeqCst);
        Self {
            counters: Arc::clone(counters),
            document: None,
        }
    }

    /// Render `markdown` with export classes.
    pub fn render(&mut self, renderer: &DocumentRenderer, markdown: &str) -> RenderComplete {
        let doc = renderer.render(markdown, RenderTarget::Export);
        let summary = doc.summary();
        self.document = Some(doc);
        RenderComplete { summary }
    }

    /// Take the rendered markup. Requires the completion token.
    pub fn extract_markup(&self, done: RenderComplete) -> String {
        let _ = done;
        self.document
            .as_ref()
            .map(RenderedDocument::to_html)
            .unwrap_or_default()
    }
}

impl Drop for RenderSurface {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Produces [`ExportPayload`]s.
#[derive(Clone)]
pub struct ExportFormatter {
    renderer: DocumentRenderer,
    max_bytes: usize,
    default_base_name: String,
    surfaces: Arc<SurfaceCounters>,
}

impl Default for ExportFormatter {
    fn default() -> Self {
        Self {
            renderer: DocumentRenderer::default(),
            max_bytes: DEFAULT_MAX_EXPORT_BYTES,
            default_base_name: DEFAULT_BASE_NAME.to_string(),
            surfaces: Arc::default(),
        }
    }
}

impl fmt::Debug for ExportFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportFormatter")
            .field("max_bytes", &self.max_bytes)
            .field("default_base_name", &self.default_base_name)
            .field("live_surfaces", &self.live_surfaces())
            .finish()
    }
}

impl ExportFormatter {
    pub fn new(config: &StudioConfig) -> Self {
        Self {
            max_bytes: config.max_export_bytes,
            default_base_name: config.default_base_name.clone(),
            ..Self::default()
        }
    }

    /// Surfaces currently mounted. Zero whenever no export is running.
    pub fn live_surfaces(&self) -> usize {
        self.surfaces.live.load(Ordering::SeqCst)
    }

    /// Surfaces mounted over the formatter's lifetime.
    pub fn surfaces_created(&self) -> usize {
        self.surfaces.created.load(Ordering::SeqCst)
    }

    /// Produce the payload for `job`.
    pub fn format(&self, job: &ExportJob) -> Result<ExportPayload, StudioError> {
        let filename = derive_filename(
            job.source_name.as_deref(),
            job.target,
            &self.default_base_name,
        );
        let bytes = match job.target {
            ExportTarget::MarkdownText => job.markdown.as_bytes().to_vec(),
            ExportTarget::WordDocument => self.word_document(job).into_bytes(),
        };

        if bytes.len() > self.max_bytes {
            return Err(StudioError::ExportFailure {
                target: job.target.to_string(),
                detail: format!(
                    "output is {} bytes, over the {}-byte limit",
                    bytes.len(),
                    self.max_bytes
                ),
            });
        }

        info!(
            "Exported {} as {} ({} bytes, preset {})",
            filename,
            job.target,
            bytes.len(),
            job.preset
        );
        Ok(ExportPayload {
            target: job.target,
            bytes,
            mime_type: job.target.mime_type(),
            filename,
        })
    }

    fn word_document(&self, job: &ExportJob) -> String {
        let mut surface = RenderSurface::mount(&self.surfaces);
        let done = surface.render(&self.renderer, &job.markdown);
        debug!("Export surface rendered: {:?}", done.summary());
        let markup = surface.extract_markup(done);
        drop(surface);

        let title = job
            .source_name
            .as_deref()
            .map(source_stem)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_DOCUMENT_TITLE);
        let css = job.preset.preset().to_css();
        word_template(title, &css, &markup)
    }
}

fn word_template(title: &str, css: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
<html>\n\
<head>\n\
<meta charset=\"utf-8\">\n\
<title>{title}</title>\n\
<style>\n{css}</style>\n\
</head>\n\
<body>\n\
<div class=\"page\">\n{body}</div>\n\
</body>\n\
</html>\n",
        title = html_escape::encode_text(title),
    )
}
