//! Process-local shared state: the store slot, the connection registry and
//! the per-poll countdown timers.

pub mod registry;
pub mod timers;

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{dao::poll_store::PollStore, error::ServiceError};

pub use self::registry::{ClientConnection, Role, SessionRegistry};
pub use self::timers::PollTimers;

/// Cheaply cloneable handle to [`AppState`].
pub type SharedState = Arc<AppState>;

/// Central application state storing live connections, countdown timers and
/// the storage handle.
pub struct AppState {
    poll_store: RwLock<Option<Arc<dyn PollStore>>>,
    registry: SessionRegistry,
    timers: PollTimers,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned
    /// cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is
    /// installed.
    pub fn new() -> SharedState {
        Arc::new(Self {
            poll_store: RwLock::new(None),
            registry: SessionRegistry::new(),
            timers: PollTimers::new(),
        })
    }

    /// Obtain a handle to the current poll store, if one is installed.
    pub async fn poll_store(&self) -> Option<Arc<dyn PollStore>> {
        let guard = self.poll_store.read().await;
        guard.as_ref().cloned()
    }

    /// Poll store handle, or a degraded-mode error for service operations.
    pub async fn require_poll_store(&self) -> Result<Arc<dyn PollStore>, ServiceError> {
        self.poll_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a storage backend and leave degraded mode.
    pub async fn install_poll_store(&self, store: Arc<dyn PollStore>) {
        let mut guard = self.poll_store.write().await;
        *guard = Some(store);
    }

    /// Remove the current storage backend and enter degraded mode.
    pub async fn clear_poll_store(&self) {
        let mut guard = self.poll_store.write().await;
        guard.take();
    }

    /// Whether the application currently has no storage backend.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.poll_store.read().await;
        guard.is_none()
    }

    /// Registry of live connections keyed by connection id.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Countdown tasks keyed by poll id.
    pub fn timers(&self) -> &PollTimers {
        &self.timers
    }
}
