//! Read-only view of the remote ledger.
//!
//! The verifier only needs one question answered: what did a given
//! transaction do to account balances? [`LedgerClient`] is that seam, with
//! [`RpcLedgerClient`] talking JSON-RPC to a real node.

mod rpc;

pub use rpc::{Commitment, RpcLedgerClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Amount in the ledger's smallest unit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Lamports(pub u64);

impl Lamports {
    /// Zero lamports.
    pub const ZERO: Self = Self(0);

    /// Convert a whole-unit amount, rounding to the nearest lamport.
    ///
    /// Returns `None` for negative, non-finite or out-of-range input.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn from_sol(sol: f64) -> Option<Self> {
        if !sol.is_finite() || sol < 0.0 {
            return None;
        }
        let lamports = (sol * LAMPORTS_PER_SOL as f64).round();
        if lamports > u64::MAX as f64 {
            return None;
        }
        Some(Self(lamports as u64))
    }

    /// Amount in whole units.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_sol(self) -> f64 {
        self.0 as f64 / LAMPORTS_PER_SOL as f64
    }

    /// Raw lamport count.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Absolute difference between two amounts.
    #[must_use]
    pub const fn abs_diff(self, other: Self) -> Self {
        Self(self.0.abs_diff(other.0))
    }

    /// Subtraction clamped at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

/// Renders whole units with six decimals, rounded half up.
impl fmt::Display for Lamports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const LAMPORTS_PER_MICRO: u64 = LAMPORTS_PER_SOL / 1_000_000;
        let micro = self.0 / LAMPORTS_PER_MICRO
            + u64::from(self.0 % LAMPORTS_PER_MICRO >= LAMPORTS_PER_MICRO / 2);
        write!(f, "{}.{:06} SOL", micro / 1_000_000, micro % 1_000_000)
    }
}

/// Finality of a transaction as reported by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationState {
    /// Voted on by a supermajority.
    Confirmed,
    /// Rooted.
    Finalized,
}

/// Balance change of one account referenced by a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDelta {
    /// Position in the transaction's account list.
    pub account_index: usize,
    /// Account address, when the node reported one for this index.
    pub account: Option<String>,
    /// Balance before execution.
    pub pre_balance: u64,
    /// Balance after execution.
    pub post_balance: u64,
}

impl BalanceDelta {
    /// Signed change in lamports.
    #[must_use]
    pub fn delta(&self) -> i128 {
        i128::from(self.post_balance) - i128::from(self.pre_balance)
    }

    /// Amount received, if the balance went up.
    #[must_use]
    pub fn received(&self) -> Option<Lamports> {
        u64::try_from(self.delta())
            .ok()
            .filter(|gain| *gain > 0)
            .map(Lamports)
    }
}

/// What the verifier needs to know about a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransactionView {
    /// Transaction signature.
    pub signature: String,
    /// Slot the transaction landed in.
    pub slot: Option<u64>,
    /// Finality at which the node returned it.
    pub confirmation: ConfirmationState,
    /// Execution metadata reports an error (or is missing).
    pub error_present: bool,
    /// Per-account balance changes, in account order.
    pub balance_deltas: Vec<BalanceDelta>,
}

/// Errors talking to the ledger node.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Request could not be sent or the connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Node answered with a non-success HTTP status.
    #[error("node returned HTTP {0}")]
    Status(u16),

    /// Node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Lookup of transactions by signature.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch a transaction. `Ok(None)` means the node does not know it.
    async fn get_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<LedgerTransactionView>, LedgerError>;
}
