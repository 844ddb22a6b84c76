//! Wallet discovery and the single active connection.

use crate::config::WalletConfig;
use crate::error::ConnectionError;
use crate::event::{emit, GatewayEvent, GatewayEventsSender};
use crate::ledger::Lamports;
use crate::wallet::provider::{WalletEnvironment, WalletProvider};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Catalog section a provider is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProviderCategory {
    /// Primary, most common providers.
    Suggested,
    /// Everything else in the catalog.
    Other,
}

/// One row of the provider list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderListing {
    /// Provider name.
    pub name: String,
    /// Whether the host environment has it installed.
    pub detected: bool,
    /// Catalog section.
    pub category: ProviderCategory,
}

/// Connection state of a discovery service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No wallet connected.
    Disconnected,
    /// A connect handshake is running.
    Connecting,
    /// A wallet is connected.
    Connected,
}

/// An established wallet connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletConnection {
    /// Provider that owns the connection.
    pub provider_name: String,
    /// Address reported by the provider.
    pub public_address: String,
    /// Last balance fetched for the address.
    pub cached_balance: Option<Lamports>,
    /// Identity of this connection. A reconnect gets a new one.
    pub connection_id: u64,
}

struct ActiveWallet {
    connection: WalletConnection,
    provider: Arc<dyn WalletProvider>,
}

struct DiscoveryState {
    phase: ConnectionState,
    active: Option<ActiveWallet>,
}

/// Resets a `Connecting` phase if the handshake future is dropped.
struct ConnectingGuard<'a> {
    state: &'a Mutex<DiscoveryState>,
    armed: bool,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock();
            if state.phase == ConnectionState::Connecting {
                state.phase = ConnectionState::Disconnected;
            }
        }
    }
}

/// Lists supported wallet providers and owns the active connection.
pub struct WalletDiscoveryService {
    catalog: Vec<(String, ProviderCategory)>,
    environment: Arc<dyn WalletEnvironment>,
    events: GatewayEventsSender,
    handshake: tokio::sync::Mutex<()>,
    state: Mutex<DiscoveryState>,
}

impl WalletDiscoveryService {
    /// Create a discovery service over `environment`.
    #[must_use]
    pub fn new(
        config: &WalletConfig,
        environment: Arc<dyn WalletEnvironment>,
        events: GatewayEventsSender,
    ) -> Self {
        let catalog = config
            .suggested
            .iter()
            .map(|name| (name.clone(), ProviderCategory::Suggested))
            .chain(
                config
                    .other
                    .iter()
                    .map(|name| (name.clone(), ProviderCategory::Other)),
            )
            .collect();

        Self {
            catalog,
            environment,
            events,
            handshake: tokio::sync::Mutex::new(()),
            state: Mutex::new(DiscoveryState {
                phase: ConnectionState::Disconnected,
                active: None,
            }),
        }
    }

    /// Catalog in display order (suggested first), with detection probed now.
    #[must_use]
    pub fn list_providers(&self) -> Vec<ProviderListing> {
        self.catalog
            .iter()
            .map(|(name, category)| ProviderListing {
                name: name.clone(),
                detected: self.environment.probe(name).is_some(),
                category: *category,
            })
            .collect()
    }

    /// Connect to `provider_name`, replacing any existing connection.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::ConnectInProgress`] if another handshake is running
    /// - [`ConnectionError::UnknownProvider`] if the name is not in the catalog
    /// - [`ConnectionError::NotDetected`] if the provider is not installed
    /// - [`ConnectionError::ConnectionRejected`] / [`ConnectionError::Network`]
    ///   if the handshake fails
    ///
    /// The state is [`ConnectionState::Disconnected`] after any error.
    pub async fn connect(&self, provider_name: &str) -> Result<WalletConnection, ConnectionError> {
        let _handshake = self
            .handshake
            .try_lock()
            .map_err(|_| ConnectionError::ConnectInProgress)?;

        if !self.catalog.iter().any(|(name, _)| name == provider_name) {
            return Err(ConnectionError::UnknownProvider(provider_name.to_string()));
        }
        let provider = self
            .environment
            .probe(provider_name)
            .ok_or_else(|| ConnectionError::NotDetected(provider_name.to_string()))?;

        self.disconnect_active().await;

        self.state.lock().phase = ConnectionState::Connecting;
        let mut guard = ConnectingGuard {
            state: &self.state,
            armed: true,
        };
        debug!("Connecting to {provider_name}");

        let address = match provider.connect().await {
            Ok(address) => address,
            Err(e) => {
                warn!("Connection to {provider_name} failed: {e}");
                return Err(e.into_connection_error());
            }
        };

        let connection = WalletConnection {
            provider_name: provider_name.to_string(),
            public_address: address,
            cached_balance: None,
            connection_id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        };
        {
            let mut state = self.state.lock();
            state.phase = ConnectionState::Connected;
            state.active = Some(ActiveWallet {
                connection: connection.clone(),
                provider,
            });
        }
        guard.armed = false;

        info!(
            "Connected to {provider_name} at {}",
            connection.public_address
        );
        emit(
            &self.events,
            GatewayEvent::WalletConnected {
                provider: provider_name.to_string(),
            },
        );
        Ok(connection)
    }

    /// Drop the active connection. Does nothing when already disconnected.
    pub async fn disconnect(&self) {
        let _handshake = self.handshake.lock().await;
        self.disconnect_active().await;
    }

    async fn disconnect_active(&self) {
        let active = {
            let mut state = self.state.lock();
            state.phase = ConnectionState::Disconnected;
            state.active.take()
        };
        let Some(active) = active else {
            return;
        };

        let name = active.connection.provider_name;
        if let Err(e) = active.provider.disconnect().await {
            warn!("Provider {name} reported an error on disconnect: {e}");
        }
        info!("Disconnected from {name}");
        emit(&self.events, GatewayEvent::WalletDisconnected { provider: name });
    }

    /// Fetch the current balance of `connection`'s address and cache it.
    ///
    /// Failures leave the connection state unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::NotConnected`] if `connection` is no longer
    /// the active one, or the provider's failure.
    pub async fn refresh_balance(
        &self,
        connection: &WalletConnection,
    ) -> Result<Lamports, ConnectionError> {
        let (provider, address) = self
            .active_provider(connection.connection_id)
            .ok_or(ConnectionError::NotConnected)?;

        let balance = provider
            .get_balance(&address)
            .await
            .map_err(|e| e.into_connection_error())?;

        if let Some(active) = self.state.lock().active.as_mut() {
            if active.connection.connection_id == connection.connection_id {
                active.connection.cached_balance = Some(balance);
            }
        }
        debug!("Balance of {address}: {balance}");
        Ok(balance)
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.lock().phase
    }

    /// The active connection, if any.
    #[must_use]
    pub fn active_connection(&self) -> Option<WalletConnection> {
        self.state
            .lock()
            .active
            .as_ref()
            .map(|active| active.connection.clone())
    }

    /// Provider and address of the connection with `connection_id`, if it is
    /// still the active one.
    pub(crate) fn active_provider(
        &self,
        connection_id: u64,
    ) -> Option<(Arc<dyn WalletProvider>, String)> {
        self.state.lock().active.as_ref().and_then(|active| {
            (active.connection.connection_id == connection_id).then(|| {
                (
                    Arc::clone(&active.provider),
                    active.connection.public_address.clone(),
                )
            })
        })
    }
}
