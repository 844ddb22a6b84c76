//! Full-balance transfer out of the connected wallet.
//!
//! The amount sent is the fetched balance minus the configured fee reserve.
//! With the default reserve of zero the whole balance is sent and the
//! provider is expected to cover the network fee.

use crate::config::TransferConfig;
use crate::error::{ConnectionError, TransferError};
use crate::event::{emit, GatewayEvent, GatewayEventsSender};
use crate::ledger::Lamports;
use crate::wallet::discovery::{WalletConnection, WalletDiscoveryService};
use crate::wallet::provider::TransferSpec;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Balance as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceView {
    /// Fetch in progress or not yet attempted.
    Loading,
    /// Last fetched balance.
    Loaded(Lamports),
    /// The last fetch failed.
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferPhase {
    Idle,
    Fetching,
    Sending,
    Completed,
}

struct TransferState {
    phase: TransferPhase,
    balance: BalanceView,
    stale: bool,
    acknowledged: bool,
    signature: Option<String>,
}

/// Returns a `Sending` phase to `Idle` if the send future is dropped.
struct SendingGuard<'a> {
    state: &'a Mutex<TransferState>,
    armed: bool,
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock();
            if state.phase == TransferPhase::Sending {
                state.phase = TransferPhase::Idle;
                state.stale = true;
            }
        }
    }
}

/// Sweeps the connected wallet's balance to the configured destination.
pub struct BalanceTransfer {
    discovery: Arc<WalletDiscoveryService>,
    connection: WalletConnection,
    config: TransferConfig,
    events: GatewayEventsSender,
    state: Mutex<TransferState>,
}

impl fmt::Debug for BalanceTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BalanceTransfer")
            .field("provider", &self.connection.provider_name)
            .field("connection_id", &self.connection.connection_id)
            .field("phase", &state.phase)
            .field("balance", &state.balance)
            .field("signature", &state.signature)
            .finish_non_exhaustive()
    }
}

impl BalanceTransfer {
    /// Open a transfer for the active connection and fetch its balance.
    ///
    /// A failed balance fetch does not fail the open; the balance shows as
    /// [`BalanceView::Unavailable`] and is fetched again before sending.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::NotConnected`] if no wallet is connected.
    pub async fn open(
        discovery: Arc<WalletDiscoveryService>,
        config: TransferConfig,
        events: GatewayEventsSender,
    ) -> Result<Self, TransferError> {
        let connection = discovery
            .active_connection()
            .ok_or(TransferError::NotConnected)?;

        let transfer = Self {
            discovery,
            connection,
            config,
            events,
            state: Mutex::new(TransferState {
                phase: TransferPhase::Idle,
                balance: BalanceView::Loading,
                stale: true,
                acknowledged: false,
                signature: None,
            }),
        };

        if let Err(e) = transfer.fetch_balance().await {
            warn!("Initial balance fetch failed: {e}");
        }
        Ok(transfer)
    }

    /// Fetch the wallet balance again.
    ///
    /// # Errors
    ///
    /// - [`TransferError::Busy`] if a fetch or send is running
    /// - [`TransferError::NotConnected`] if the wallet disconnected
    /// - [`TransferError::BalanceUnavailable`] if the provider failed
    pub async fn fetch_balance(&self) -> Result<Lamports, TransferError> {
        {
            let mut state = self.state.lock();
            if matches!(state.phase, TransferPhase::Fetching | TransferPhase::Sending) {
                return Err(TransferError::Busy);
            }
            state.phase = TransferPhase::Fetching;
        }

        let result = self.load_balance().await;

        let mut state = self.state.lock();
        if state.phase == TransferPhase::Fetching {
            state.phase = if state.signature.is_some() {
                TransferPhase::Completed
            } else {
                TransferPhase::Idle
            };
        }
        result
    }

    async fn load_balance(&self) -> Result<Lamports, TransferError> {
        self.state.lock().balance = BalanceView::Loading;

        match self.discovery.refresh_balance(&self.connection).await {
            Ok(balance) => {
                let mut state = self.state.lock();
                state.balance = BalanceView::Loaded(balance);
                state.stale = false;
                Ok(balance)
            }
            Err(e) => {
                let err = match e {
                    ConnectionError::NotConnected => TransferError::NotConnected,
                    other => TransferError::BalanceUnavailable(other.to_string()),
                };
                self.state.lock().balance = BalanceView::Unavailable(err.to_string());
                Err(err)
            }
        }
    }

    /// Set the user's confirmation that the whole balance will be sent.
    pub fn acknowledge(&self, acknowledged: bool) {
        self.state.lock().acknowledged = acknowledged;
    }

    /// Whether the send control is enabled.
    #[must_use]
    pub fn can_send(&self) -> bool {
        let state = self.state.lock();
        state.acknowledged && state.phase == TransferPhase::Idle
    }

    /// Balance as last fetched.
    #[must_use]
    pub fn balance(&self) -> BalanceView {
        self.state.lock().balance.clone()
    }

    /// Amount `send` would move, from the last fetched balance.
    #[must_use]
    pub fn transfer_amount(&self) -> Option<Lamports> {
        match self.state.lock().balance {
            BalanceView::Loaded(balance) => {
                Some(balance.saturating_sub(Lamports(self.config.reserve_fee_lamports)))
            }
            _ => None,
        }
    }

    /// Signature of the completed transfer.
    #[must_use]
    pub fn signature(&self) -> Option<String> {
        self.state.lock().signature.clone()
    }

    /// Connection the transfer draws from.
    #[must_use]
    pub fn connection(&self) -> &WalletConnection {
        &self.connection
    }

    /// Send the balance to the destination address.
    ///
    /// After a failure the balance is fetched again before the next attempt
    /// and the acknowledgment is kept.
    ///
    /// # Errors
    ///
    /// - [`TransferError::NotAcknowledged`] without a confirmation
    /// - [`TransferError::Busy`] if a fetch or send is running
    /// - [`TransferError::AlreadyCompleted`] after a successful send
    /// - [`TransferError::NothingToSend`] if the amount would be zero
    /// - balance fetch errors, or [`TransferError::Rejected`] /
    ///   [`TransferError::Network`] from the provider
    pub async fn send(&self) -> Result<String, TransferError> {
        let needs_fetch = {
            let mut state = self.state.lock();
            match state.phase {
                TransferPhase::Completed => return Err(TransferError::AlreadyCompleted),
                TransferPhase::Fetching | TransferPhase::Sending => {
                    return Err(TransferError::Busy)
                }
                TransferPhase::Idle => {}
            }
            if !state.acknowledged {
                return Err(TransferError::NotAcknowledged);
            }
            state.phase = TransferPhase::Sending;
            state.stale || !matches!(state.balance, BalanceView::Loaded(_))
        };

        let mut guard = SendingGuard {
            state: &self.state,
            armed: true,
        };
        let result = self.submit(needs_fetch).await;
        guard.armed = false;

        let mut state = self.state.lock();
        match &result {
            Ok(signature) => {
                state.phase = TransferPhase::Completed;
                state.signature = Some(signature.clone());
                drop(state);

                info!("Transfer submitted: {signature}");
                emit(
                    &self.events,
                    GatewayEvent::TransferSucceeded {
                        signature: signature.clone(),
                    },
                );
            }
            Err(e) => {
                state.phase = TransferPhase::Idle;
                state.stale = true;
                warn!("Transfer failed: {e}");
            }
        }
        result
    }

    async fn submit(&self, needs_fetch: bool) -> Result<String, TransferError> {
        if needs_fetch {
            debug!("Fetching balance before send");
            self.load_balance().await?;
        }

        let lamports = self.transfer_amount().unwrap_or(Lamports::ZERO);
        if lamports == Lamports::ZERO {
            return Err(TransferError::NothingToSend);
        }

        let (provider, address) = self
            .discovery
            .active_provider(self.connection.connection_id)
            .ok_or(TransferError::NotConnected)?;
        let spec = TransferSpec {
            from: address,
            to: self.config.destination_address.clone(),
            lamports,
        };
        info!("Sending {lamports} to {}", spec.to);

        provider
            .sign_and_send(&spec)
            .await
            .map_err(|e| e.into_transfer_error())
    }
}
