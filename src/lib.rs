//! # payguard
//!
//! Payment confirmation and wallet withdrawal flows for Solana.
//!
//! ## Overview
//!
//! A user is shown an amount and a recipient address, pays from any wallet,
//! and pastes the transaction signature back. payguard reads that transaction
//! from a ledger node and confirms that some account received the amount.
//! Alternatively the user connects a browser wallet and sweeps its balance.
//!
//! ## Components
//!
//! - [`payment::PaymentFlow`]: countdown-bound payment request state machine
//! - [`payment::TransactionVerifier`]: signature to balance-change check
//! - [`wallet::WalletDiscoveryService`]: provider catalog and connection
//! - [`wallet::BalanceTransfer`]: full-balance transfer to a fixed address
//! - [`withdraw::WithdrawalRouter`]: choose between the two paths
//!
//! ## Example
//!
//! ```rust,ignore
//! use payguard::{GatewayBuilder, GatewayConfig, Lamports, PaymentPurpose};
//!
//! #[tokio::main]
//! async fn main() -> payguard::Result<()> {
//!     let gateway = GatewayBuilder::new(GatewayConfig::default()).build()?;
//!     let flow = gateway.open_payment(Lamports(250_000_000), PaymentPurpose::Token);
//!     flow.proceed()?;
//!     flow.submit_signature("5VERv8NMvz...").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod gateway;
pub mod ledger;
pub mod payment;
pub mod wallet;
pub mod withdraw;

pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use event::{GatewayEvent, GatewayEventsChannel};
pub use gateway::{Gateway, GatewayBuilder};
pub use ledger::{Lamports, LedgerClient, RpcLedgerClient};
pub use payment::{
    FlowStep, PaymentFlow, PaymentPurpose, TransactionVerifier, VerificationOutcome,
};
pub use wallet::{BalanceTransfer, WalletDiscoveryService, WalletProvider};
pub use withdraw::{WithdrawableToken, WithdrawalRouter};
