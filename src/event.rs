//! Outbound notifications for the calling page.
//!
//! Each completed flow emits its event exactly once. Subscribers that lag
//! behind the channel capacity lose the oldest events.

use crate::payment::{PaymentPurpose, RequestId};
use tokio::sync::broadcast;

/// Events emitted by payment, wallet and withdrawal flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// A payment request was verified.
    PaymentSucceeded {
        /// Request that was paid.
        request_id: RequestId,
        /// What the payment unlocks.
        purpose: PaymentPurpose,
    },

    /// A payment request ran out of time.
    PaymentExpired {
        /// Request that expired.
        request_id: RequestId,
    },

    /// The user closed a payment request.
    PaymentCancelled {
        /// Request that was discarded.
        request_id: RequestId,
    },

    /// A full-balance transfer was submitted.
    TransferSucceeded {
        /// Signature returned by the wallet.
        signature: String,
    },

    /// A wallet connected.
    WalletConnected {
        /// Provider name.
        provider: String,
    },

    /// The active wallet disconnected.
    WalletDisconnected {
        /// Provider name.
        provider: String,
    },

    /// A withdrawal path completed.
    WithdrawSucceeded {
        /// Token the withdrawal was for.
        token_id: String,
    },
}

/// Channel for receiving gateway events.
pub type GatewayEventsChannel = broadcast::Receiver<GatewayEvent>;

/// Sender for gateway events.
pub type GatewayEventsSender = broadcast::Sender<GatewayEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (GatewayEventsSender, GatewayEventsChannel) {
    broadcast::channel(256)
}

/// Send an event, ignoring the case where nobody is subscribed.
pub(crate) fn emit(sender: &GatewayEventsSender, event: GatewayEvent) {
    let _ = sender.send(event);
}
