//! Wallet providers: discovery, connection and full-balance transfers.
//!
//! Wallets live outside this crate. [`WalletEnvironment`] answers whether a
//! provider is installed and [`WalletProvider`] runs its handshake, balance
//! query and signing. Tests and the CLI use [`StaticEnvironment`].

mod discovery;
#[cfg(test)]
pub(crate) mod mock;
mod provider;
mod transfer;

pub use discovery::{
    ConnectionState, ProviderCategory, ProviderListing, WalletConnection, WalletDiscoveryService,
};
pub use provider::{
    ProviderError, StaticEnvironment, TransferSpec, WalletEnvironment, WalletProvider,
};
pub use transfer::{BalanceTransfer, BalanceView};
