//! Payment confirmation for payguard.
//!
//! A [`PaymentFlow`] shows the user an amount and a recipient address, then
//! waits for a transaction signature and hands it to the
//! [`TransactionVerifier`], which reads the transaction back from a ledger
//! node.
//!
//! # Architecture
//!
//! ```text
//! signature submitted
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ Bypass allow-list   │──MATCH──▶ Valid
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ Length 80..=90      │──OUTSIDE──▶ FormatInvalid
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ Check LRU cache     │──HIT──▶ Valid
//! └─────────┬───────────┘
//!           ▼
//!   getTransaction (confirmed)
//!           │
//!    ┌──────┼──────────────┐
//!    │      │              │
//!  NONE   meta.err    balance deltas
//!    │      │              │
//!    ▼      ▼       ┌──────┴──────┐
//! NotFound Failed  MATCH       NO MATCH
//!                   │             │
//!                   ▼             ▼
//!              Cache + Valid  AmountMismatch
//! ```

mod cache;
mod flow;
mod request;
mod verifier;

pub use cache::{CacheStats, VerifiedCache};
pub use flow::{FlowSnapshot, FlowStep, PaymentFlow};
pub use request::{
    Currency, Network, PaymentPurpose, PaymentRequest, RequestId, VerificationAttempt,
    VerificationStatus,
};
pub use verifier::{find_matching_delta, BypassList, TransactionVerifier, VerificationOutcome};
