//! Simulated progress for an extraction that reports only start and finish.
//!
//! The extraction capability gives no intermediate events, so the
//! [`ProgressEstimator`] fabricates a monotonically increasing percentage:
//! a fixed step every tick, capped below 100, then a snap to exactly 100 when
//! the orchestrator signals completion.
//!
//! The numeric behaviour lives in the pure [`ProgressModel`]; the estimator
//! only adds a Tokio ticker around it. Both the ticker and the completion
//! snap mutate the model through the same [`tokio::sync::watch`] cell, so a
//! tick can never land after the final 100.
//!
//! Observers can either subscribe to the watch channel or implement
//! [`ConversionProgressCallback`].

use crate::error::StudioError;
use crate::session::FileDescriptor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Percentage that ticking alone never exceeds.
pub const DEFAULT_PROGRESS_CAP: u8 = 90;

/// Percentage added per tick.
pub const DEFAULT_PROGRESS_STEP: u8 = 1;

/// Interval between ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Where one `Converting` episode's estimate currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// Ticking.
    Running,
    /// Snapped to 100; no further changes.
    Complete,
    /// Torn down; no further changes.
    Cancelled,
}

/// Pure progress arithmetic for one `Converting` episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressModel {
    percent: u8,
    step: u8,
    cap: u8,
    phase: ProgressPhase,
}

impl ProgressModel {
    /// Start at 0 in `Running`.
    pub fn new(step: u8, cap: u8) -> Self {
        Self {
            percent: 0,
            step: step.max(1),
            cap: cap.min(99),
            phase: ProgressPhase::Running,
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn phase(&self) -> ProgressPhase {
        self.phase
    }

    /// Advance one step. Returns `true` if the value changed.
    pub fn tick(&mut self) -> bool {
        if self.phase != ProgressPhase::Running || self.percent >= self.cap {
            return false;
        }
        self.percent = self.percent.saturating_add(self.step).min(self.cap);
        true
    }

    /// Snap to 100. Has no effect after cancellation.
    pub fn complete(&mut self) -> bool {
        if self.phase == ProgressPhase::Cancelled {
            return false;
        }
        let changed = self.phase != ProgressPhase::Complete;
        self.percent = 100;
        self.phase = ProgressPhase::Complete;
        changed
    }

    /// Freeze the value. Has no effect after completion.
    pub fn cancel(&mut self) -> bool {
        if self.phase != ProgressPhase::Running {
            return false;
        }
        self.phase = ProgressPhase::Cancelled;
        true
    }
}

impl Default for ProgressModel {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_STEP, DEFAULT_PROGRESS_CAP)
    }
}

/// Tick cadence and bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSettings {
    pub interval: Duration,
    pub step: u8,
    pub cap: u8,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_TICK_INTERVAL,
            step: DEFAULT_PROGRESS_STEP,
            cap: DEFAULT_PROGRESS_CAP,
        }
    }
}

/// Called by the orchestrator as a conversion advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `on_progress` is invoked while the progress cell is
/// locked, which is what keeps notifications in order; implementations must
/// not read the estimator's watch channel from inside it.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once when a `Converting` episode begins.
    fn on_conversion_start(&self, file: &FileDescriptor) {
        let _ = file;
    }

    /// Called every time the estimate changes (including the final 100).
    fn on_progress(&self, percent: u8) {
        let _ = percent;
    }

    /// Called when Markdown arrives.
    fn on_conversion_complete(&self, markdown_len: usize) {
        let _ = markdown_len;
    }

    /// Called when the extraction reports an error.
    fn on_conversion_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::StudioConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Drives a [`ProgressModel`] from a background ticker.
///
/// Dropping the estimator cancels it and aborts the ticker.
pub struct ProgressEstimator {
    cell: Arc<watch::Sender<ProgressModel>>,
    ticker: Option<JoinHandle<()>>,
    callback: Option<ProgressCallback>,
}

impl ProgressEstimator {
    /// Start at 0 and begin ticking.
    ///
    /// Fails with [`StudioError::Internal`] when no Tokio runtime is entered.
    pub fn start(
        settings: ProgressSettings,
        callback: Option<ProgressCallback>,
    ) -> Result<Self, StudioError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            StudioError::Internal(format!("progress estimator needs a Tokio runtime: {e}"))
        })?;
        let (tx, _rx) = watch::channel(ProgressModel::new(settings.step, settings.cap));
        let cell = Arc::new(tx);
        if let Some(cb) = &callback {
            cb.on_progress(0);
        }

        let ticker = runtime.spawn(run_ticker(
            Arc::clone(&cell),
            settings.interval,
            callback.clone(),
        ));
        debug!("Progress estimator started ({:?} per tick)", settings.interval);

        Ok(Self {
            cell,
            ticker: Some(ticker),
            callback,
        })
    }

    /// Current percentage.
    pub fn percent(&self) -> u8 {
        self.cell.borrow().percent()
    }

    /// Current phase.
    pub fn phase(&self) -> ProgressPhase {
        self.cell.borrow().phase()
    }

    /// Watch every change to the model.
    pub fn subscribe(&self) -> watch::Receiver<ProgressModel> {
        self.cell.subscribe()
    }

    /// Snap to 100 and stop ticking.
    pub fn complete(&mut self) {
        self.stop_ticker();
        let cb = self.callback.clone();
        self.cell.send_if_modified(|model| {
            let changed = model.complete();
            if changed {
                if let Some(cb) = &cb {
                    cb.on_progress(100);
                }
            }
            changed
        });
        debug!("Progress estimator completed");
    }

    /// Stop ticking and freeze the value.
    pub fn cancel(&mut self) {
        self.stop_ticker();
        if self.cell.send_if_modified(ProgressModel::cancel) {
            debug!("Progress estimator cancelled at {}%", self.percent());
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl Drop for ProgressEstimator {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_ticker(
    cell: Arc<watch::Sender<ProgressModel>>,
    period: Duration,
    callback: Option<ProgressCallback>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick of a Tokio interval resolves immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        let mut running = true;
        cell.send_if_modified(|model| {
            let changed = model.tick();
            if changed {
                trace!("progress {}%", model.percent());
                if let Some(cb) = &callback {
                    cb.on_progress(model.percent());
                }
            }
            running = model.phase() == ProgressPhase::Running;
            changed
        });
        if !running {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn model_ticks_up_to_cap() {
        let mut m = ProgressModel::new(1, 90);
        for _ in 0..200 {
            m.tick();
        }
        assert_eq!(m.percent(), 90);
        assert!(!m.tick(), "ticking at the cap is a no-op");
    }

    #[test]
    fn model_step_does_not_overshoot_cap() {
        let mut m = ProgressModel::new(7, 90);
        while m.tick() {}
        assert_eq!(m.percent(), 90);
    }

    #[test]
    fn model_complete_supersedes_cap() {
        let mut m = ProgressModel::new(1, 90);
        m.tick();
        assert!(m.complete());
        assert_eq!(m.percent(), 100);
        assert!(!m.tick());
        assert_eq!(m.percent(), 100);
    }

    #[test]
    fn model_cancel_freezes_value() {
        let mut m = ProgressModel::new(5, 90);
        m.tick();
        m.tick();
        assert!(m.cancel());
        assert!(!m.tick());
        assert!(!m.complete(), "completion after teardown is ignored");
        assert_eq!(m.percent(), 10);
        assert_eq!(m.phase(), ProgressPhase::Cancelled);
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<u8>>,
    }

    impl ConversionProgressCallback for Recorder {
        fn on_progress(&self, percent: u8) {
            self.seen.lock().unwrap().push(percent);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn estimator_ticks_on_interval_and_caps() {
        let est = ProgressEstimator::start(ProgressSettings::default(), None).unwrap();
        assert_eq!(est.percent(), 0);

        tokio::time::sleep(Duration::from_millis(1_050)).await;
        let after_one_second = est.percent();
        assert!(
            (9..=11).contains(&after_one_second),
            "expected ~10%, got {after_one_second}"
        );

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(est.percent(), 90);
        assert_eq!(est.phase(), ProgressPhase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn estimator_sequence_is_monotonic_and_ends_at_100() {
        let recorder = Arc::new(Recorder::default());
        let mut est = ProgressEstimator::start(
            ProgressSettings::default(),
            Some(recorder.clone() as ProgressCallback),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        est.complete();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "not monotonic: {seen:?}");
        assert!(seen[..seen.len() - 1].iter().all(|&p| p <= 90));
        assert_eq!(est.percent(), 100);
    }

    #[test]
    fn estimator_without_runtime_is_an_error() {
        let recorder = Arc::new(Recorder::default());
        let err = ProgressEstimator::start(
            ProgressSettings::default(),
            Some(recorder.clone() as ProgressCallback),
        )
        .err()
        .unwrap();
        assert!(matches!(err, StudioError::Internal(_)));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_estimator_stops_mutating() {
        let est = ProgressEstimator::start(ProgressSettings::default(), None).unwrap();
        let rx = est.subscribe();
        tokio::time::sleep(Duration::from_millis(550)).await;
        drop(est);
        let frozen = rx.borrow().percent();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rx.borrow().percent(), frozen);
        assert_eq!(rx.borrow().phase(), ProgressPhase::Cancelled);
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_progress(50);
        cb.on_conversion_complete(10);
        cb.on_conversion_error("x");
    }
}
