//! Gateway: wires the verifier, wallet discovery and event channel together.

use crate::config::GatewayConfig;
use crate::error::Result;
use crate::event::{create_event_channel, GatewayEventsChannel, GatewayEventsSender};
use crate::ledger::{Lamports, LedgerClient, RpcLedgerClient};
use crate::payment::{
    Currency, PaymentFlow, PaymentPurpose, PaymentRequest, TransactionVerifier,
    VerificationOutcome,
};
use crate::wallet::{StaticEnvironment, WalletDiscoveryService, WalletEnvironment};
use crate::withdraw::{WithdrawableToken, WithdrawalRouter};
use std::sync::Arc;
use tracing::info;

/// Builder for a [`Gateway`].
pub struct GatewayBuilder {
    config: GatewayConfig,
    ledger: Option<Arc<dyn LedgerClient>>,
    environment: Option<Arc<dyn WalletEnvironment>>,
}

impl GatewayBuilder {
    /// Create a new builder with the given configuration.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            ledger: None,
            environment: None,
        }
    }

    /// Use `ledger` instead of a JSON-RPC client built from the config.
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<dyn LedgerClient>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Use `environment` for wallet detection. Without one no wallet is
    /// detected.
    #[must_use]
    pub fn with_environment(mut self, environment: Arc<dyn WalletEnvironment>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the RPC client
    /// cannot be created.
    pub fn build(self) -> Result<Gateway> {
        self.config.validate()?;
        info!("Building payguard gateway with config: {:?}", self.config);

        let ledger: Arc<dyn LedgerClient> = match self.ledger {
            Some(ledger) => ledger,
            None => {
                let client = RpcLedgerClient::new(&self.config.rpc)?;
                info!("Reading transactions from {}", client.endpoint());
                Arc::new(client)
            }
        };
        let environment = self
            .environment
            .unwrap_or_else(|| Arc::new(StaticEnvironment::new()));

        let (events_tx, _) = create_event_channel();
        let verifier = Arc::new(TransactionVerifier::new(ledger, &self.config.verifier));
        let discovery = Arc::new(WalletDiscoveryService::new(
            &self.config.wallet,
            environment,
            events_tx.clone(),
        ));

        Ok(Gateway {
            config: self.config,
            verifier,
            discovery,
            events_tx,
        })
    }
}

/// Entry point for the calling page.
pub struct Gateway {
    config: GatewayConfig,
    verifier: Arc<TransactionVerifier>,
    discovery: Arc<WalletDiscoveryService>,
    events_tx: GatewayEventsSender,
}

impl Gateway {
    /// Open a payment request for `amount` and start its countdown.
    /// `purpose` is carried on the request and in
    /// [`GatewayEvent::PaymentSucceeded`](crate::GatewayEvent::PaymentSucceeded).
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn open_payment(&self, amount: Lamports, purpose: PaymentPurpose) -> PaymentFlow {
        PaymentFlow::start(
            Arc::clone(&self.verifier),
            self.config.payment.clone(),
            self.events_tx.clone(),
            amount,
            Currency::Sol,
            purpose,
        )
    }

    /// One-off check of `signature` against `amount`, outside any flow.
    ///
    /// # Errors
    ///
    /// Returns the verification failure.
    pub async fn verify_signature(
        &self,
        signature: &str,
        amount: Lamports,
    ) -> Result<VerificationOutcome> {
        let request = PaymentRequest::new(
            amount,
            Currency::Sol,
            self.config.payment.recipient_address.clone(),
            self.config.payment.window_secs,
        );
        Ok(self.verifier.verify(signature, &request).await?)
    }

    /// Start a withdrawal for `token`.
    #[must_use]
    pub fn withdrawal(&self, token: WithdrawableToken) -> WithdrawalRouter {
        WithdrawalRouter::new(
            token,
            Arc::clone(&self.discovery),
            Arc::clone(&self.verifier),
            self.config.payment.clone(),
            self.config.transfer.clone(),
            self.events_tx.clone(),
        )
    }

    /// Subscribe to gateway events.
    #[must_use]
    pub fn subscribe_events(&self) -> GatewayEventsChannel {
        self.events_tx.subscribe()
    }

    /// Wallet discovery service.
    #[must_use]
    pub fn discovery(&self) -> &Arc<WalletDiscoveryService> {
        &self.discovery
    }

    /// Shared transaction verifier.
    #[must_use]
    pub fn verifier(&self) -> &Arc<TransactionVerifier> {
        &self.verifier
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}
