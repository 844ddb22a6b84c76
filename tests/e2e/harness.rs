//! Test harness that assembles a gateway over scripted collaborators.
//!
//! The `TestHarness` owns the gateway, the ledger it reads from and the
//! wallet environment it probes, so tests can stage chain state and wallets
//! and then watch the events the gateway emits.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use payguard::config::GatewayConfig;
use payguard::ledger::{
    BalanceDelta, ConfirmationState, Lamports, LedgerClient, LedgerError, LedgerTransactionView,
};
use payguard::wallet::{ProviderError, StaticEnvironment, TransferSpec, WalletProvider};
use payguard::{Gateway, GatewayBuilder, GatewayEvent, GatewayEventsChannel};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A well-formed 88-character signature.
pub const SIG: &str =
    "5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnbJLgp8uirBgmQpjKhoR4tjF3ZpRzrFmBV6UjKdiSZkQUW";

/// A second well-formed signature that the ledger does not know by default.
pub const OTHER_SIG: &str =
    "3nqYf8XEcQdWJ3aBz7PLx2rT5kVjh9mGsU1oRwCyNiZbKe4AtHuMvpFD6gL8Xq2YsWn7EjcBkd5RoTiPzhMa9fV";

/// Error type for test harness operations.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Gateway error
    #[error("Gateway error: {0}")]
    Gateway(#[from] payguard::Error),

    /// Socket error from the mock RPC node
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// In-memory ledger keyed by signature.
#[derive(Default)]
pub struct MockLedger {
    transactions: Mutex<HashMap<String, LedgerTransactionView>>,
    lookups: AtomicUsize,
}

impl MockLedger {
    /// Record a successful transaction in which the recipient received `received`.
    pub fn record_payment(&self, signature: &str, received: Lamports) {
        self.record(signature, false, received);
    }

    /// Record a transaction whose execution failed.
    pub fn record_failed(&self, signature: &str, received: Lamports) {
        self.record(signature, true, received);
    }

    fn record(&self, signature: &str, error_present: bool, received: Lamports) {
        let payer_start = 10_000_000_000_u64;
        let view = LedgerTransactionView {
            signature: signature.to_string(),
            slot: Some(300_000_000),
            confirmation: ConfirmationState::Confirmed,
            error_present,
            balance_deltas: vec![
                BalanceDelta {
                    account_index: 0,
                    account: Some("Payer".into()),
                    pre_balance: payer_start,
                    post_balance: payer_start - received.get() - 5_000,
                },
                BalanceDelta {
                    account_index: 1,
                    account: Some(payguard::config::DEFAULT_RECIPIENT_ADDRESS.into()),
                    pre_balance: 0,
                    post_balance: received.get(),
                },
            ],
        };
        self.transactions
            .lock()
            .insert(signature.to_string(), view);
    }

    /// Number of lookups served.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_transaction(
        &self,
        signature: &str,
    ) -> std::result::Result<Option<LedgerTransactionView>, LedgerError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.transactions.lock().get(signature).cloned())
    }
}

/// Wallet provider with a fixed address and a settable balance.
pub struct MockWallet {
    name: String,
    address: String,
    /// Balance reported to `get_balance`.
    pub balance: Mutex<Lamports>,
    /// Error returned by the next connect handshakes.
    pub fail_connect: Mutex<Option<ProviderError>>,
    /// Error returned by `sign_and_send`.
    pub fail_send: Mutex<Option<ProviderError>>,
    /// Transfers submitted so far.
    pub sent: Mutex<Vec<TransferSpec>>,
}

impl MockWallet {
    /// Create a wallet called `name`.
    pub fn new(name: &str, address: &str, balance: Lamports) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
            balance: Mutex::new(balance),
            fail_connect: Mutex::new(None),
            fail_send: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> std::result::Result<String, ProviderError> {
        match self.fail_connect.lock().clone() {
            Some(err) => Err(err),
            None => Ok(self.address.clone()),
        }
    }

    async fn disconnect(&self) -> std::result::Result<(), ProviderError> {
        Ok(())
    }

    async fn get_balance(&self, _address: &str) -> std::result::Result<Lamports, ProviderError> {
        Ok(*self.balance.lock())
    }

    async fn sign_and_send(
        &self,
        spec: &TransferSpec,
    ) -> std::result::Result<String, ProviderError> {
        if let Some(err) = self.fail_send.lock().clone() {
            return Err(err);
        }
        *self.balance.lock() = Lamports::ZERO;
        self.sent.lock().push(spec.clone());
        Ok(OTHER_SIG.to_string())
    }
}

/// Test harness that manages the complete test environment.
pub struct TestHarness {
    gateway: Gateway,
    ledger: Arc<MockLedger>,
    environment: Arc<StaticEnvironment>,
    events: GatewayEventsChannel,
}

impl TestHarness {
    /// Create a harness with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway fails to build.
    pub fn setup() -> Result<Self> {
        Self::setup_with_config(GatewayConfig::default())
    }

    /// Create a harness with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway fails to build.
    pub fn setup_with_config(config: GatewayConfig) -> Result<Self> {
        let ledger = Arc::new(MockLedger::default());
        let environment = Arc::new(StaticEnvironment::new());
        let gateway = GatewayBuilder::new(config)
            .with_ledger(ledger.clone())
            .with_environment(environment.clone())
            .build()?;
        let events = gateway.subscribe_events();
        info!("Test harness ready");

        Ok(Self {
            gateway,
            ledger,
            environment,
            events,
        })
    }

    /// The gateway under test.
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// The scripted ledger.
    pub fn ledger(&self) -> &MockLedger {
        &self.ledger
    }

    /// Install a wallet into the environment.
    pub fn install_wallet(&self, name: &str, address: &str, balance: Lamports) -> Arc<MockWallet> {
        let wallet = Arc::new(MockWallet::new(name, address, balance));
        self.environment.install(wallet.clone());
        wallet
    }

    /// Events emitted since the last call.
    pub fn drain_events(&mut self) -> Vec<GatewayEvent> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }

    /// Wait for the next event.
    pub async fn next_event(&mut self) -> Option<GatewayEvent> {
        self.events.recv().await.ok()
    }
}

/// Minimal JSON-RPC node answering `getTransaction` from a fixed table.
///
/// Signatures missing from the table get `"result": null`.
pub struct MockRpcNode {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl MockRpcNode {
    /// Bind to a random local port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start(transactions: HashMap<String, Value>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = Router::new()
            .route("/", post(get_transaction))
            .with_state(Arc::new(transactions));

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                debug!("Mock RPC node stopped: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// URL to point an RPC client at.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for MockRpcNode {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn get_transaction(
    State(transactions): State<Arc<HashMap<String, Value>>>,
    Json(request): Json<Value>,
) -> Json<Value> {
    let signature = request["params"][0].as_str().unwrap_or_default();
    let result = transactions.get(signature).cloned().unwrap_or(Value::Null);

    Json(serde_json::json!({
        "jsonrpc": "2.0",
        "id": request["id"].clone(),
        "result": result,
    }))
}
