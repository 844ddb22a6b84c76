//! Seam to the external wallet environment.

use crate::error::{ConnectionError, TransferError};
use crate::ledger::Lamports;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a wallet provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The user declined in the wallet's own prompt.
    #[error("User rejected the request")]
    UserRejected,

    /// The provider refused or failed for its own reasons.
    #[error("{0}")]
    Provider(String),

    /// The provider could not reach the network.
    #[error("{0}")]
    Network(String),
}

impl ProviderError {
    pub(crate) fn into_connection_error(self) -> ConnectionError {
        match self {
            Self::UserRejected => ConnectionError::ConnectionRejected(self.to_string()),
            Self::Provider(msg) => ConnectionError::ConnectionRejected(msg),
            Self::Network(msg) => ConnectionError::Network(msg),
        }
    }

    pub(crate) fn into_transfer_error(self) -> TransferError {
        match self {
            Self::UserRejected => TransferError::Rejected(self.to_string()),
            Self::Provider(msg) => TransferError::Rejected(msg),
            Self::Network(msg) => TransferError::Network(msg),
        }
    }
}

/// A transfer for the wallet to build, sign and submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSpec {
    /// Sending address (the connected wallet).
    pub from: String,
    /// Receiving address.
    pub to: String,
    /// Amount to move.
    pub lamports: Lamports,
}

/// A wallet provider installed in the host environment.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Catalog name, e.g. `"Phantom"`.
    fn name(&self) -> &str;

    /// Run the provider's connect handshake. Returns the public address.
    async fn connect(&self) -> Result<String, ProviderError>;

    /// Drop the provider's connection.
    async fn disconnect(&self) -> Result<(), ProviderError>;

    /// Current balance of `address`.
    async fn get_balance(&self, address: &str) -> Result<Lamports, ProviderError>;

    /// Sign `spec` and submit it. Returns the transaction signature.
    async fn sign_and_send(&self, spec: &TransferSpec) -> Result<String, ProviderError>;
}

/// Capability probe over the host environment.
pub trait WalletEnvironment: Send + Sync {
    /// The provider called `name`, if it is installed.
    fn probe(&self, name: &str) -> Option<Arc<dyn WalletProvider>>;
}

/// Environment backed by an in-memory map of installed providers.
#[derive(Default)]
pub struct StaticEnvironment {
    providers: RwLock<HashMap<String, Arc<dyn WalletProvider>>>,
}

impl StaticEnvironment {
    /// Empty environment: nothing is detected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`StaticEnvironment::install`].
    #[must_use]
    pub fn with_provider(self, provider: Arc<dyn WalletProvider>) -> Self {
        self.install(provider);
        self
    }

    /// Make `provider` detectable under its own name.
    pub fn install(&self, provider: Arc<dyn WalletProvider>) {
        self.providers
            .write()
            .insert(provider.name().to_string(), provider);
    }

    /// Remove a provider. Returns `true` if it was installed.
    pub fn uninstall(&self, name: &str) -> bool {
        self.providers.write().remove(name).is_some()
    }
}

impl WalletEnvironment for StaticEnvironment {
    fn probe(&self, name: &str) -> Option<Arc<dyn WalletProvider>> {
        self.providers.read().get(name).cloned()
    }
}

impl fmt::Debug for StaticEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.providers.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("StaticEnvironment")
            .field("providers", &names)
            .finish()
    }
}
