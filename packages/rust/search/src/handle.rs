//! Process-wide handle to the search backend.
//!
//! The handle is created once at startup, cloned into every request path,
//! connected at most once (lazily, on first use or an explicit warm-up), and
//! closed once at shutdown. Losing the backend is never fatal: callers just
//! see [`SearchHandle::backend`] return `None`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::OnceCell;
use tracing::{info, warn};

use supportflow_shared::SearchConfig;

use crate::{SearchBackend, WeaviateClient};

/// Result of the one-time connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Ready,
    Unavailable { reason: String },
}

impl Availability {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

struct HandleInner {
    backend: Option<Arc<dyn SearchBackend>>,
    /// Reason used when there is no backend to probe at all.
    missing_reason: String,
    availability: OnceCell<Availability>,
    closed: AtomicBool,
}

/// Cheaply cloneable, reference-counted search backend handle.
#[derive(Clone)]
pub struct SearchHandle {
    inner: Arc<HandleInner>,
}

impl std::fmt::Debug for SearchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchHandle")
            .field("backend", &self.inner.backend.as_ref().map(|b| b.name().to_string()))
            .field("availability", &self.inner.availability.get())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SearchHandle {
    /// Wrap a backend; it is probed on first use.
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                backend: Some(backend),
                missing_reason: String::new(),
                availability: OnceCell::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// A handle that never has a backend.
    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                backend: None,
                missing_reason: reason.into(),
                availability: OnceCell::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Build the Weaviate-backed handle; a client construction error yields a
    /// disconnected handle instead of failing startup.
    pub fn from_config(config: &SearchConfig) -> Self {
        match WeaviateClient::from_config(config) {
            Ok(client) => Self::new(Arc::new(client)),
            Err(e) => {
                warn!(error = %e, "search client could not be built");
                Self::disconnected(e.to_string())
            }
        }
    }

    /// Probe the backend once; later calls return the cached result.
    pub async fn connect(&self) -> &Availability {
        self.inner
            .availability
            .get_or_init(|| async {
                let Some(backend) = &self.inner.backend else {
                    warn!(reason = %self.inner.missing_reason, "search backend not configured");
                    return Availability::Unavailable {
                        reason: self.inner.missing_reason.clone(),
                    };
                };

                match backend.ready().await {
                    Ok(true) => {
                        info!(backend = backend.name(), "search backend connected");
                        Availability::Ready
                    }
                    Ok(false) => {
                        warn!(backend = backend.name(), "search backend reported not ready");
                        Availability::Unavailable {
                            reason: "backend reported not ready".into(),
                        }
                    }
                    Err(e) => {
                        warn!(backend = backend.name(), error = %e, "search backend connection failed");
                        Availability::Unavailable {
                            reason: e.to_string(),
                        }
                    }
                }
            })
            .await
    }

    /// The live backend, or `None` when unavailable or already closed.
    pub async fn backend(&self) -> Option<Arc<dyn SearchBackend>> {
        if self.is_closed() {
            return None;
        }
        if !self.connect().await.is_ready() {
            return None;
        }
        self.inner.backend.clone()
    }

    /// Availability without triggering a probe.
    pub fn availability(&self) -> Option<&Availability> {
        self.inner.availability.get()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Release the backend. Only the first call reaches the backend.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(backend) = &self.inner.backend {
            backend.close().await;
        }
    }
}
