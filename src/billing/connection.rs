use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex as AsyncMutex};

use super::BillingBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
}

/// Caches the connected billing client and reconnects after the platform
/// drops it.
pub struct BillingConnection<B: BillingBackend> {
    backend: B,
    client: Mutex<Option<Arc<B::Client>>>,
    /// Serializes connection attempts so concurrent callers share one.
    connecting: AsyncMutex<()>,
    state: watch::Sender<ConnectionState>,
}

impl<B: BillingBackend> BillingConnection<B> {
    pub fn new(backend: B) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            backend,
            client: Mutex::new(None),
            connecting: AsyncMutex::new(()),
            state,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn cached(&self) -> Option<Arc<B::Client>> {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return the cached client, connecting first if there is none.
    pub async fn client(&self) -> crate::Result<Arc<B::Client>> {
        if let Some(client) = self.cached() {
            return Ok(client);
        }

        let _attempt = self.connecting.lock().await;
        // Another caller may have connected while we waited.
        if let Some(client) = self.cached() {
            return Ok(client);
        }

        self.state.send_replace(ConnectionState::Connecting);
        log::debug!("connecting to billing service");

        match self.backend.connect().await {
            Ok(client) => {
                let client = Arc::new(client);
                *self.client.lock().unwrap_or_else(PoisonError::into_inner) = Some(client.clone());
                self.state.send_replace(ConnectionState::Ready);
                log::info!("billing service connected");
                Ok(client)
            }
            Err(err) => {
                self.state.send_replace(ConnectionState::Disconnected);
                log::warn!("billing setup failed: {err}");
                Err(err)
            }
        }
    }

    /// Drop the cached client so the next operation reconnects.
    pub fn disconnected(&self) {
        let dropped = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if dropped.is_some() {
            log::info!("billing service disconnected");
            self.state.send_replace(ConnectionState::Disconnected);
        }
    }
}
