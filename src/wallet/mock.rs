//! Scriptable wallet provider for unit tests.

use crate::ledger::Lamports;
use crate::wallet::provider::{ProviderError, TransferSpec, WalletProvider};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub(crate) struct FakeWallet {
    name: String,
    address: String,
    pub balance: Mutex<Lamports>,
    pub fail_connect: Mutex<Option<ProviderError>>,
    pub fail_balance: Mutex<Option<ProviderError>>,
    pub fail_send: Mutex<Option<ProviderError>>,
    pub sent: Mutex<Vec<TransferSpec>>,
    pub balance_calls: AtomicUsize,
    pub disconnects: AtomicUsize,
    connect_gate: Option<Arc<Semaphore>>,
    send_gate: Option<Arc<Semaphore>>,
}

impl FakeWallet {
    pub fn new(name: &str, address: &str, balance: Lamports) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
            balance: Mutex::new(balance),
            fail_connect: Mutex::new(None),
            fail_balance: Mutex::new(None),
            fail_send: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            balance_calls: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            connect_gate: None,
            send_gate: None,
        }
    }

    /// Hold every connect handshake until a permit is added.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.connect_gate = Some(gate);
        self
    }

    /// Hold every `sign_and_send` until a permit is added.
    pub fn with_send_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.send_gate = Some(gate);
        self
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<String, ProviderError> {
        if let Some(gate) = &self.connect_gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        match self.fail_connect.lock().clone() {
            Some(err) => Err(err),
            None => Ok(self.address.clone()),
        }
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_balance(&self, _address: &str) -> Result<Lamports, ProviderError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_balance.lock().clone() {
            Some(err) => Err(err),
            None => Ok(*self.balance.lock()),
        }
    }

    async fn sign_and_send(&self, spec: &TransferSpec) -> Result<String, ProviderError> {
        if let Some(gate) = &self.send_gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if let Some(err) = self.fail_send.lock().clone() {
            return Err(err);
        }
        let mut sent = self.sent.lock();
        sent.push(spec.clone());
        Ok(format!("sig-{}-{}", self.name, sent.len()))
    }
}
