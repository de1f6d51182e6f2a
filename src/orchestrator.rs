//! The conversion state machine.
//!
//! ```text
//!            select_file            begin_conversion
//!   Idle ───────────────▶ Selected ─────────────────▶ Converting
//!                           ▲  ▲                        │      │
//!                           │  │      success           ▼      ▼ error
//!                           │  └──── select_file ──── Ready  Failed
//!                           └─────── select_file ─────────────┘
//! ```
//!
//! [`ConversionOrchestrator`] owns the one [`ConversionSession`]. Selection
//! errors are returned synchronously and never touch the session. An
//! extraction is started by [`ConversionOrchestrator::begin_conversion`],
//! which hands back a [`PendingExtraction`] future; its
//! [`ExtractionOutcome`] comes back through
//! [`ConversionOrchestrator::apply`], success and failure alike.
//!
//! Every `Converting` episode gets an epoch number. Outcomes carry the epoch
//! they were started under, so a result that arrives after the user picked
//! another file (or after [`ConversionOrchestrator::reset`]) is ignored.

use crate::capability::{
    CapabilityHandle, CapabilityLoader, CapabilityState, ExtractionCapability,
};
use crate::config::StudioConfig;
use crate::error::{SessionError, StudioError};
use crate::export::{ExportFormatter, ExportJob, ExportPayload, ExportTarget};
use crate::extract::VlmLoader;
use crate::progress::{ProgressEstimator, ProgressModel};
use crate::render::{DocumentRenderer, RenderTarget, RenderedDocument};
use crate::session::{mime_essence, ConversionSession, FileDescriptor, SessionStatus, SourceFile};
use crate::styles::StylePresetId;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// The in-flight extraction for one `Converting` episode.
pub type PendingExtraction = BoxFuture<'static, ExtractionOutcome>;

/// What the extraction capability produced, tagged with its episode.
#[derive(Debug)]
pub struct ExtractionOutcome {
    epoch: u64,
    pub result: Result<String, StudioError>,
}

impl ExtractionOutcome {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Whether [`ConversionOrchestrator::apply`] used an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Applied,
    /// The outcome belonged to a discarded episode.
    Ignored,
}

/// Coordinates selection, extraction, progress and export.
pub struct ConversionOrchestrator {
    config: StudioConfig,
    session: ConversionSession,
    source: Option<SourceFile>,
    capability: Arc<CapabilityHandle>,
    estimator: Option<ProgressEstimator>,
    epoch: u64,
    notice: Option<SessionError>,
    renderer: DocumentRenderer,
    formatter: ExportFormatter,
}

impl fmt::Debug for ConversionOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionOrchestrator")
            .field("status", &self.session.status())
            .field("file", &self.session.file())
            .field("progress", &self.progress())
            .field("epoch", &self.epoch)
            .field("capability", &self.capability)
            .finish()
    }
}

impl ConversionOrchestrator {
    pub fn new(config: StudioConfig, capability: Arc<CapabilityHandle>) -> Self {
        let formatter = ExportFormatter::new(&config);
        Self {
            config,
            session: ConversionSession::idle(),
            source: None,
            capability,
            estimator: None,
            epoch: 0,
            notice: None,
            renderer: DocumentRenderer::default(),
            formatter,
        }
    }

    /// Use an already constructed capability.
    pub fn with_capability(config: StudioConfig, capability: Arc<dyn ExtractionCapability>) -> Self {
        Self::new(config, Arc::new(CapabilityHandle::ready(capability)))
    }

    /// Load the capability lazily through `loader`.
    pub fn with_loader(config: StudioConfig, loader: Arc<dyn CapabilityLoader>) -> Self {
        Self::new(config, Arc::new(CapabilityHandle::new(loader)))
    }

    /// Use the built-in pdfium + vision-LLM backend configured by
    /// `config.extraction`.
    pub fn with_vlm(config: StudioConfig) -> Self {
        let loader = VlmLoader::new(config.extraction.clone());
        Self::with_loader(config, Arc::new(loader))
    }

    // ── Reading ───────────────────────────────────────────────────────────

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn file(&self) -> Option<&FileDescriptor> {
        self.session.file()
    }

    /// Current Markdown; `Some` only in `Ready`.
    pub fn markdown(&self) -> Option<&str> {
        self.session.markdown()
    }

    /// Live progress: the estimator's value while converting.
    pub fn progress(&self) -> u8 {
        match &self.estimator {
            Some(est) => self.session.progress().max(est.percent()),
            None => self.session.progress(),
        }
    }

    /// The error recorded by the last failed conversion.
    pub fn last_error(&self) -> Option<&SessionError> {
        self.session.last_error()
    }

    /// The message from the last rejected selection or failed export.
    pub fn notice(&self) -> Option<&SessionError> {
        self.notice.as_ref()
    }

    /// A copy of the session with live progress filled in.
    pub fn snapshot(&self) -> ConversionSession {
        let mut s = self.session.clone();
        s.set_progress(self.progress());
        s
    }

    /// Watch the estimator while converting.
    pub fn subscribe_progress(&self) -> Option<watch::Receiver<ProgressModel>> {
        self.estimator.as_ref().map(ProgressEstimator::subscribe)
    }

    pub fn capability_state(&self) -> CapabilityState {
        self.capability.state()
    }

    pub fn capability_readiness(&self) -> watch::Receiver<CapabilityState> {
        self.capability.readiness()
    }

    /// The formatter used by [`Self::export`]. Clones share surface counters.
    pub fn formatter(&self) -> &ExportFormatter {
        &self.formatter
    }

    // ── Selection ─────────────────────────────────────────────────────────

    /// Validate and select `file`.
    ///
    /// A rejected file leaves the session exactly as it was; the rejection is
    /// returned and kept as the current [`Self::notice`].
    pub fn select_file(&mut self, file: SourceFile) -> Result<(), StudioError> {
        if let Err(e) = self.validate(file.descriptor()) {
            warn!("Selection rejected: {e}");
            self.notice = Some(e.to_session_error());
            return Err(e);
        }

        if self.session.status() == SessionStatus::Converting {
            warn!(
                "New selection during conversion; discarding episode {}",
                self.epoch
            );
            self.discard_episode();
        }

        info!(
            "Selected {} ({} bytes)",
            file.descriptor().name.as_deref().unwrap_or("<unnamed>"),
            file.descriptor().size
        );
        self.session = ConversionSession::selected(file.descriptor().clone());
        self.source = Some(file);
        self.notice = None;
        Ok(())
    }

    fn validate(&self, file: &FileDescriptor) -> Result<(), StudioError> {
        let name = file.name.clone().unwrap_or_else(|| "<unnamed>".into());
        if file.essence() != mime_essence(&self.config.accepted_mime_type) {
            return Err(StudioError::InvalidFileType {
                name,
                declared: file.mime_type.clone(),
                accepted: self.config.accepted_mime_type.clone(),
            });
        }
        if file.size > self.config.max_file_size {
            return Err(StudioError::FileTooLarge {
                name,
                size: file.size,
                limit: self.config.max_file_size,
            });
        }
        Ok(())
    }

    // ── Conversion ────────────────────────────────────────────────────────

    /// Load the extraction capability ahead of the first conversion.
    pub async fn prepare(&self) -> Result<(), StudioError> {
        self.capability.ensure_ready().await.map(|_| ())
    }

    /// Enter `Converting` and start the extraction.
    ///
    /// The returned future performs exactly one capability invocation; feed
    /// its output to [`Self::apply`]. Must be called from within a Tokio
    /// runtime; otherwise it returns [`StudioError::Internal`] and the
    /// session stays `Selected`.
    pub fn begin_conversion(&mut self) -> Result<PendingExtraction, StudioError> {
        self.expect_status(SessionStatus::Selected, "begin conversion")?;
        let Some(source) = self.source.clone() else {
            return Err(StudioError::Internal("selected session has no source".into()));
        };
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(StudioError::Internal(
                "begin_conversion must be called inside a Tokio runtime".into(),
            ));
        }

        self.epoch += 1;
        self.session.start_converting();
        self.notice = None;
        if let Some(cb) = &self.config.progress_callback {
            cb.on_conversion_start(source.descriptor());
        }
        self.estimator = Some(ProgressEstimator::start(
            self.config.progress_settings(),
            self.config.progress_callback.clone(),
        )?);
        info!("Conversion started (episode {})", self.epoch);

        let epoch = self.epoch;
        let capability = Arc::clone(&self.capability);
        Ok(async move {
            let result = match capability.ensure_ready().await {
                Ok(cap) => {
                    debug!("Invoking '{}' for episode {}", cap.name(), epoch);
                    cap.convert(&source).await
                }
                Err(e) => Err(e),
            };
            ExtractionOutcome { epoch, result }
        }
        .boxed())
    }

    /// Route an outcome to the success or error transition, unless it
    /// belongs to a discarded episode.
    pub fn apply(&mut self, outcome: ExtractionOutcome) -> Result<Disposition, StudioError> {
        if outcome.epoch != self.epoch || self.session.status() != SessionStatus::Converting {
            debug!(
                "Ignoring stale outcome from episode {} (current {}, {})",
                outcome.epoch,
                self.epoch,
                self.session.status()
            );
            return Ok(Disposition::Ignored);
        }
        match outcome.result {
            Ok(markdown) => self.on_extraction_success(markdown)?,
            Err(e) => self.record_failure(e.to_session_error())?,
        }
        Ok(Disposition::Applied)
    }

    /// Markdown arrived: snap progress to 100 and enter `Ready`.
    pub fn on_extraction_success(&mut self, markdown: String) -> Result<(), StudioError> {
        self.expect_status(SessionStatus::Converting, "complete a conversion")?;
        if let Some(mut est) = self.estimator.take() {
            est.complete();
        }
        if let Some(cb) = &self.config.progress_callback {
            cb.on_conversion_complete(markdown.len());
        }
        info!("Conversion finished: {} bytes of Markdown", markdown.len());
        self.session.finish_ready(markdown);
        Ok(())
    }

    /// The capability reported an error: enter `Failed`.
    pub fn on_extraction_error(&mut self, message: impl Into<String>) -> Result<(), StudioError> {
        let error = StudioError::ConversionFailure {
            message: message.into(),
        };
        self.record_failure(error.to_session_error())
    }

    fn record_failure(&mut self, error: SessionError) -> Result<(), StudioError> {
        self.expect_status(SessionStatus::Converting, "fail a conversion")?;
        if let Some(mut est) = self.estimator.take() {
            est.cancel();
            self.session.set_progress(est.percent());
        }
        if let Some(cb) = &self.config.progress_callback {
            cb.on_conversion_error(&error.message);
        }
        warn!("Conversion failed: {}", error.message);
        self.session.finish_failed(error);
        Ok(())
    }

    /// Begin, await and apply in one call.
    pub async fn convert(&mut self) -> Result<(), StudioError> {
        let outcome = self.begin_conversion()?.await;
        match outcome.result {
            Ok(markdown) => self.on_extraction_success(markdown),
            Err(e) => {
                self.record_failure(e.to_session_error())?;
                Err(e)
            }
        }
    }

    // ── Editing and output ────────────────────────────────────────────────

    /// Replace the Markdown of a `Ready` session.
    pub fn update_markdown(&mut self, markdown: impl Into<String>) -> Result<(), StudioError> {
        self.expect_status(SessionStatus::Ready, "edit the Markdown")?;
        let markdown = markdown.into();
        debug!("Markdown replaced ({} bytes)", markdown.len());
        self.session.replace_markdown(markdown);
        Ok(())
    }

    /// Render the current Markdown for on-screen preview.
    pub fn render_preview(&self) -> Result<RenderedDocument, StudioError> {
        let markdown = self.ready_markdown("render a preview")?;
        Ok(self.renderer.render(markdown, RenderTarget::Preview))
    }

    /// Freeze the current Markdown into a job. `None` uses the default preset.
    pub fn export_job(
        &self,
        target: ExportTarget,
        preset: Option<StylePresetId>,
    ) -> Result<ExportJob, StudioError> {
        let markdown = self.ready_markdown("export")?;
        Ok(ExportJob {
            target,
            preset: preset.unwrap_or(self.config.default_preset),
            markdown: Arc::from(markdown),
            source_name: self.session.file().and_then(|f| f.name.clone()),
        })
    }

    /// Produce a payload. A failure is kept as the [`Self::notice`] and never
    /// touches the `Ready` session.
    pub fn export(
        &mut self,
        target: ExportTarget,
        preset: Option<StylePresetId>,
    ) -> Result<ExportPayload, StudioError> {
        let result = self
            .export_job(target, preset)
            .and_then(|job| self.formatter.format(&job));
        if let Err(e) = &result {
            warn!("Export failed: {e}");
            self.notice = Some(e.to_session_error());
        }
        result
    }

    // ── Housekeeping ──────────────────────────────────────────────────────

    /// Clear the current notice and the session's last error.
    pub fn dismiss_error(&mut self) {
        self.notice = None;
        self.session.clear_error();
    }

    /// Back to `Idle`. Any running estimator stops and any in-flight
    /// outcome will be ignored.
    pub fn reset(&mut self) {
        self.discard_episode();
        self.session = ConversionSession::idle();
        self.source = None;
        self.notice = None;
        debug!("Orchestrator reset");
    }

    fn discard_episode(&mut self) {
        if let Some(mut est) = self.estimator.take() {
            est.cancel();
        }
        self.epoch += 1;
    }

    fn expect_status(
        &self,
        wanted: SessionStatus,
        operation: &'static str,
    ) -> Result<(), StudioError> {
        let status = self.session.status();
        if status == wanted {
            Ok(())
        } else {
            Err(StudioError::InvalidTransition { operation, status })
        }
    }

    fn ready_markdown(&self, operation: &'static str) -> Result<&str, StudioError> {
        self.expect_status(SessionStatus::Ready, operation)?;
        self.session
            .markdown()
            .ok_or_else(|| StudioError::Internal("ready session has no Markdown".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::session::{MIB, PDF_MIME_TYPE};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Fake {
        calls: AtomicUsize,
        delay: Duration,
        reply: Result<&'static str, &'static str>,
    }

    impl Fake {
        fn ok(md: &'static str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay: Duration::from_secs(3),
                reply: Ok(md),
            })
        }

        fn failing(msg: &'static str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay: Duration::from_millis(500),
                reply: Err(msg),
            })
        }
    }

    #[async_trait]
    impl ExtractionCapability for Fake {
        fn name(&self) -> &str {
            "fake"
        }

        async fn convert(&self, _file: &SourceFile) -> Result<String, StudioError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.reply.map(str::to_string).map_err(|m| StudioError::ConversionFailure {
                message: m.to_string(),
            })
        }
    }

    fn pdf(name: &str, size: usize) -> SourceFile {
        SourceFile::from_bytes(Some(name.into()), PDF_MIME_TYPE, vec![0u8; size])
    }

    fn orchestrator(fake: &Arc<Fake>) -> ConversionOrchestrator {
        ConversionOrchestrator::with_capability(StudioConfig::default(), fake.clone())
    }

    #[test]
    fn starts_idle() {
        let o = orchestrator(&Fake::ok("x"));
        assert_eq!(o.status(), SessionStatus::Idle);
        assert_eq!(o.progress(), 0);
        assert!(o.markdown().is_none());
    }

    #[test]
    fn wrong_type_is_rejected_without_state_change() {
        let mut o = orchestrator(&Fake::ok("x"));
        let txt = SourceFile::from_bytes(Some("notes.txt".into()), "text/plain", vec![1u8; 10]);
        let err = o.select_file(txt).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFileType);
        assert_eq!(o.status(), SessionStatus::Idle);
        assert!(o.file().is_none());
        assert_eq!(o.notice().map(|n| n.kind), Some(ErrorKind::InvalidFileType));
    }

    #[test]
    fn declared_type_match_ignores_case_and_parameters() {
        let mut o = orchestrator(&Fake::ok("x"));
        let f = pdf("a.pdf", 10).with_mime_type("Application/PDF; version=1.7");
        o.select_file(f).unwrap();
        assert_eq!(o.status(), SessionStatus::Selected);
    }

    #[test]
    fn size_limit_is_inclusive() {
        let mut o = orchestrator(&Fake::ok("x"));
        o.select_file(pdf("exact.pdf", (10 * MIB) as usize)).unwrap();
        let err = o.select_file(pdf("over.pdf", (10 * MIB) as usize + 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileTooLarge);
        assert_eq!(o.file().and_then(|f| f.name.as_deref()), Some("exact.pdf"));
    }

    #[test]
    fn begin_requires_selection() {
        let mut o = orchestrator(&Fake::ok("x"));
        let err = o.begin_conversion().err().unwrap();
        assert!(matches!(
            err,
            StudioError::InvalidTransition {
                status: SessionStatus::Idle,
                ..
            }
        ));
    }

    #[test]
    fn begin_outside_runtime_keeps_selection() {
        let fake = Fake::ok("x");
        let mut o = orchestrator(&fake);
        o.select_file(pdf("a.pdf", 10)).unwrap();

        let err = o.begin_conversion().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(o.status(), SessionStatus::Selected);
        assert_eq!(o.progress(), 0);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn success_requires_converting() {
        let mut o = orchestrator(&Fake::ok("x"));
        assert!(o.on_extraction_success("x".into()).is_err());
        assert!(o.on_extraction_error("boom").is_err());
        assert_eq!(o.status(), SessionStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn conversion_reaches_ready_with_full_progress() {
        let fake = Fake::ok("# Done\n");
        let mut o = orchestrator(&fake);
        o.select_file(pdf("r.pdf", 100)).unwrap();

        let pending = o.begin_conversion().unwrap();
        assert_eq!(o.status(), SessionStatus::Converting);
        assert_eq!(o.progress(), 0);

        tokio::time::sleep(Duration::from_millis(2_050)).await;
        let mid = o.progress();
        assert!((1..=90).contains(&mid), "mid-conversion progress {mid}");

        let outcome = pending.await;
        assert_eq!(o.apply(outcome).unwrap(), Disposition::Applied);
        assert_eq!(o.status(), SessionStatus::Ready);
        assert_eq!(o.progress(), 100);
        assert_eq!(o.markdown(), Some("# Done\n"));
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_stored_and_requires_reselection() {
        let fake = Fake::failing("engine crashed");
        let mut o = orchestrator(&fake);
        o.select_file(pdf("r.pdf", 100)).unwrap();

        let err = o.convert().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionFailure);
        assert_eq!(o.status(), SessionStatus::Failed);
        let stored = o.last_error().unwrap();
        assert!(stored.message.contains("engine crashed"));
        assert!(o.progress() <= 90);

        assert!(o.begin_conversion().is_err(), "no automatic retry");
        o.select_file(pdf("again.pdf", 100)).unwrap();
        assert_eq!(o.status(), SessionStatus::Selected);
        assert!(o.last_error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_outcome_is_ignored() {
        let fake = Fake::ok("# First\n");
        let mut o = orchestrator(&fake);
        o.select_file(pdf("one.pdf", 100)).unwrap();
        let stale = o.begin_conversion().unwrap();

        o.select_file(pdf("two.pdf", 100)).unwrap();
        assert_eq!(o.status(), SessionStatus::Selected);
        let fresh = o.begin_conversion().unwrap();

        assert_eq!(o.apply(stale.await).unwrap(), Disposition::Ignored);
        assert_eq!(o.status(), SessionStatus::Converting);
        assert_eq!(o.apply(fresh.await).unwrap(), Disposition::Applied);
        assert_eq!(o.file().and_then(|f| f.name.as_deref()), Some("two.pdf"));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_discards_in_flight_result() {
        let fake = Fake::ok("x");
        let mut o = orchestrator(&fake);
        o.select_file(pdf("r.pdf", 100)).unwrap();
        let pending = o.begin_conversion().unwrap();
        o.reset();
        assert_eq!(o.apply(pending.await).unwrap(), Disposition::Ignored);
        assert_eq!(o.status(), SessionStatus::Idle);
        assert_eq!(o.progress(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn edit_then_export_uses_edited_text() {
        let fake = Fake::ok("# Original\n");
        let mut o = orchestrator(&fake);
        o.select_file(pdf("r.pdf", 100)).unwrap();
        o.convert().await.unwrap();

        o.update_markdown("# Edited\n").unwrap();
        let payload = o.export(ExportTarget::MarkdownText, None).unwrap();
        assert_eq!(payload.bytes, b"# Edited\n");
        assert_eq!(payload.filename, "r.md");
    }

    #[tokio::test(start_paused = true)]
    async fn export_failure_keeps_ready_session() {
        let fake = Fake::ok("# Big\n");
        let config = StudioConfig::builder().max_export_bytes(16).build().unwrap();
        let mut o = ConversionOrchestrator::with_capability(config, fake.clone());
        o.select_file(pdf("r.pdf", 100)).unwrap();
        o.convert().await.unwrap();

        let err = o.export(ExportTarget::WordDocument, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExportFailure);
        assert_eq!(o.status(), SessionStatus::Ready);
        assert_eq!(o.markdown(), Some("# Big\n"));
        assert_eq!(o.notice().map(|n| n.kind), Some(ErrorKind::ExportFailure));
        assert_eq!(o.formatter().live_surfaces(), 0);

        o.dismiss_error();
        assert!(o.notice().is_none());
        assert!(o.render_preview().is_ok());
    }

    #[test]
    fn export_requires_ready() {
        let mut o = orchestrator(&Fake::ok("x"));
        let err = o.export(ExportTarget::MarkdownText, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}
