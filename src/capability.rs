//! The pluggable text-extraction capability.
//!
//! The orchestrator never talks to pdfium or an LLM directly. It holds a
//! [`CapabilityHandle`], which lazily loads one [`ExtractionCapability`]
//! through a [`CapabilityLoader`] and then reuses it for every conversion.
//! Loading is observable through [`CapabilityHandle::readiness`], so a UI
//! can say "loading engine" before the first conversion.
//!
//! Tests plug in fakes at this seam.

use crate::error::StudioError;
use crate::session::SourceFile;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

/// Something that turns a document into Markdown.
#[async_trait]
pub trait ExtractionCapability: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Convert `file` to Markdown. Reports only completion.
    async fn convert(&self, file: &SourceFile) -> Result<String, StudioError>;
}

/// Produces an [`ExtractionCapability`]; may be slow (binding native
/// libraries, resolving providers).
#[async_trait]
pub trait CapabilityLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn ExtractionCapability>, StudioError>;
}

/// Load state of a [`CapabilityHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CapabilityState {
    #[default]
    NotLoaded,
    Loading,
    Ready,
    /// Last attempt failed; the next request tries again.
    LoadFailed(String),
}

/// A lazily loaded, shared capability.
pub struct CapabilityHandle {
    loader: Option<Arc<dyn CapabilityLoader>>,
    slot: Mutex<Option<Arc<dyn ExtractionCapability>>>,
    state: watch::Sender<CapabilityState>,
}

impl fmt::Debug for CapabilityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityHandle")
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl CapabilityHandle {
    /// Load through `loader` on first use.
    pub fn new(loader: Arc<dyn CapabilityLoader>) -> Self {
        let (state, _) = watch::channel(CapabilityState::NotLoaded);
        Self {
            loader: Some(loader),
            slot: Mutex::new(None),
            state,
        }
    }

    /// Wrap an already constructed capability.
    pub fn ready(capability: Arc<dyn ExtractionCapability>) -> Self {
        let (state, _) = watch::channel(CapabilityState::Ready);
        Self {
            loader: None,
            slot: Mutex::new(Some(capability)),
            state,
        }
    }

    pub fn state(&self) -> CapabilityState {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.state.borrow() == CapabilityState::Ready
    }

    /// Watch load-state changes.
    pub fn readiness(&self) -> watch::Receiver<CapabilityState> {
        self.state.subscribe()
    }

    /// Return the capability, loading it first if needed. Concurrent callers
    /// share one load.
    pub async fn ensure_ready(&self) -> Result<Arc<dyn ExtractionCapability>, StudioError> {
        let mut slot = self.slot.lock().await;
        if let Some(cap) = slot.as_ref() {
            return Ok(Arc::clone(cap));
        }
        let Some(loader) = &self.loader else {
            return Err(StudioError::CapabilityUnavailable {
                detail: "no loader configured".into(),
            });
        };

        self.state.send_replace(CapabilityState::Loading);
        match loader.load().await {
            Ok(cap) => {
                info!("Extraction capability '{}' loaded", cap.name());
                *slot = Some(Arc::clone(&cap));
                self.state.send_replace(CapabilityState::Ready);
                Ok(cap)
            }
            Err(e) => {
                warn!("Extraction capability failed to load: {e}");
                self.state.send_replace(CapabilityState::LoadFailed(e.to_string()));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo;

    #[async_trait]
    impl ExtractionCapability for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn convert(&self, file: &SourceFile) -> Result<String, StudioError> {
            Ok(format!("# {}", file.descriptor().name.clone().unwrap_or_default()))
        }
    }

    struct CountingLoader {
        loads: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl CapabilityLoader for CountingLoader {
        async fn load(&self) -> Result<Arc<dyn ExtractionCapability>, StudioError> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(StudioError::CapabilityUnavailable {
                    detail: "not yet".into(),
                });
            }
            Ok(Arc::new(Echo))
        }
    }

    #[tokio::test]
    async fn loads_once_and_reuses() {
        let loader = Arc::new(CountingLoader {
            loads: AtomicUsize::new(0),
            fail_first: false,
        });
        let handle = CapabilityHandle::new(loader.clone());
        assert_eq!(handle.state(), CapabilityState::NotLoaded);

        handle.ensure_ready().await.unwrap();
        handle.ensure_ready().await.unwrap();
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert!(handle.is_ready());
    }

    #[tokio::test]
    async fn failed_load_can_be_retried() {
        let loader = Arc::new(CountingLoader {
            loads: AtomicUsize::new(0),
            fail_first: true,
        });
        let handle = CapabilityHandle::new(loader.clone());

        assert!(handle.ensure_ready().await.is_err());
        assert!(matches!(handle.state(), CapabilityState::LoadFailed(_)));

        handle.ensure_ready().await.unwrap();
        assert_eq!(handle.state(), CapabilityState::Ready);
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn preloaded_handle_is_ready() {
        let handle = CapabilityHandle::ready(Arc::new(Echo));
        assert!(handle.is_ready());
        let cap = handle.ensure_ready().await.unwrap();
        assert_eq!(cap.name(), "echo");
    }
}
