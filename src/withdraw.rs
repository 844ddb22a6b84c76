//! Withdrawal entry point: pick "connect wallet" or "pay manually".

use crate::config::{PaymentFlowConfig, TransferConfig};
use crate::error::Result;
use crate::event::{emit, GatewayEvent, GatewayEventsSender};
use crate::ledger::Lamports;
use crate::payment::{Currency, FlowStep, PaymentFlow, PaymentPurpose, TransactionVerifier};
use crate::wallet::{BalanceTransfer, WalletDiscoveryService};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Token whose liquidity is being withdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawableToken {
    /// Token identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Liquidity available for withdrawal.
    pub liquidity: Lamports,
}

/// Path the user picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalPath {
    /// Connect a wallet and sweep its balance.
    ConnectWallet,
    /// Pay a payment request by hand.
    PayManually,
}

/// Dispatches a withdrawal to the wallet or manual payment flow.
///
/// The router remembers which path was chosen. Completion is reported only
/// against proof from that path: a verified payment flow or a transfer
/// signature.
pub struct WithdrawalRouter {
    token: WithdrawableToken,
    discovery: Arc<WalletDiscoveryService>,
    verifier: Arc<TransactionVerifier>,
    payment: PaymentFlowConfig,
    transfer: TransferConfig,
    events: GatewayEventsSender,
    chosen: Mutex<Option<WithdrawalPath>>,
    completed: AtomicBool,
}

impl WithdrawalRouter {
    /// Create a router for `token`.
    #[must_use]
    pub fn new(
        token: WithdrawableToken,
        discovery: Arc<WalletDiscoveryService>,
        verifier: Arc<TransactionVerifier>,
        payment: PaymentFlowConfig,
        transfer: TransferConfig,
        events: GatewayEventsSender,
    ) -> Self {
        Self {
            token,
            discovery,
            verifier,
            payment,
            transfer,
            events,
            chosen: Mutex::new(None),
            completed: AtomicBool::new(false),
        }
    }

    /// Token being withdrawn.
    #[must_use]
    pub fn token(&self) -> &WithdrawableToken {
        &self.token
    }

    /// Connect `provider_name` and open a balance transfer on it.
    ///
    /// # Errors
    ///
    /// Returns the connection or transfer error.
    pub async fn connect_wallet(&self, provider_name: &str) -> Result<BalanceTransfer> {
        *self.chosen.lock() = Some(WithdrawalPath::ConnectWallet);
        info!("Withdrawal of {} via wallet {provider_name}", self.token.id);

        self.discovery.connect(provider_name).await?;
        let transfer = BalanceTransfer::open(
            Arc::clone(&self.discovery),
            self.transfer.clone(),
            self.events.clone(),
        )
        .await?;
        Ok(transfer)
    }

    /// Open a manual liquidity payment flow for `amount`, with its countdown
    /// running.
    #[must_use]
    pub fn pay_manually(&self, amount: Lamports) -> PaymentFlow {
        *self.chosen.lock() = Some(WithdrawalPath::PayManually);
        info!("Withdrawal of {} via manual payment", self.token.id);

        PaymentFlow::start(
            Arc::clone(&self.verifier),
            self.payment.clone(),
            self.events.clone(),
            amount,
            Currency::Sol,
            PaymentPurpose::Liquidity,
        )
    }

    /// Path picked so far.
    #[must_use]
    pub fn chosen(&self) -> Option<WithdrawalPath> {
        *self.chosen.lock()
    }

    /// Complete a manual-payment withdrawal once `flow` has been verified.
    ///
    /// Returns `false` if the manual path was not chosen, `flow` has not
    /// reached [`FlowStep::Succeeded`], or the withdrawal already completed.
    pub fn complete_payment(&self, flow: &PaymentFlow) -> bool {
        if self.chosen() != Some(WithdrawalPath::PayManually) {
            return false;
        }
        let step = flow.step();
        if step != FlowStep::Succeeded {
            debug!("Withdrawal of {} not complete: payment is {step:?}", self.token.id);
            return false;
        }
        self.finish()
    }

    /// Complete a wallet withdrawal once `transfer` has a signature.
    ///
    /// Returns `false` if the wallet path was not chosen, nothing was sent,
    /// or the withdrawal already completed.
    pub fn complete_transfer(&self, transfer: &BalanceTransfer) -> bool {
        if self.chosen() != Some(WithdrawalPath::ConnectWallet) {
            return false;
        }
        if transfer.signature().is_none() {
            debug!("Withdrawal of {} not complete: no transfer sent", self.token.id);
            return false;
        }
        self.finish()
    }

    /// Whether a completion has been reported.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    fn finish(&self) -> bool {
        if self.completed.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!("Withdrawal of {} completed", self.token.id);
        emit(
            &self.events,
            GatewayEvent::WithdrawSucceeded {
                token_id: self.token.id.clone(),
            },
        );
        true
    }
}
