//! Error types for payguard.
//!
//! Each component has its own taxonomy so callers can match on the exact
//! failure and decide whether to offer a retry. [`Error`] wraps all of them
//! for code that only needs to propagate.

use crate::payment::VerificationStatus;
use thiserror::Error;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded, saved or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network setup or transport error outside a verification attempt.
    #[error("Network error: {0}")]
    Network(String),

    /// Payment amount could not be represented in lamports.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Transaction verification failed.
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Wallet discovery or connection failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Balance transfer failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Payment flow rejected an action.
    #[error(transparent)]
    Flow(#[from] FlowError),
}

/// Why a claimed transaction signature does not satisfy a payment request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Signature length is outside the accepted bound.
    #[error("Invalid transaction signature format")]
    FormatInvalid,

    /// The node has no transaction with this signature (yet).
    #[error("Transaction not found")]
    NotFound,

    /// The transaction executed but the ledger recorded an error.
    #[error("Transaction failed or not confirmed")]
    Failed,

    /// No account in the transaction received the required amount.
    #[error("Payment not found in transaction")]
    AmountMismatch,

    /// The ledger lookup itself failed.
    #[error("Ledger lookup failed: {0}")]
    Network(String),
}

impl VerificationError {
    /// Whether the user may retry with the same signature.
    ///
    /// `NotFound` can be a propagation delay and `Network` a transient
    /// transport failure. The rest need a different signature.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotFound | Self::Network(_))
    }

    /// Attempt status recorded for this failure.
    #[must_use]
    pub fn status(&self) -> VerificationStatus {
        match self {
            Self::FormatInvalid => VerificationStatus::FormatInvalid,
            Self::NotFound => VerificationStatus::NotFound,
            Self::Failed => VerificationStatus::Failed,
            Self::AmountMismatch => VerificationStatus::AmountMismatch,
            Self::Network(_) => VerificationStatus::NetworkError,
        }
    }

    /// Message suitable for showing next to the signature input.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::FormatInvalid => {
                "Invalid transaction signature format. Please enter a valid Solana transaction signature."
            }
            Self::NotFound => "Transaction not found. It may still be propagating, try again shortly.",
            Self::Failed => "Transaction failed or not confirmed.",
            Self::AmountMismatch => {
                "Payment Not Found - Either use a different wallet or contact support."
            }
            Self::Network(_) => "Payment verification failed. Please try again.",
        }
    }
}

/// Wallet discovery and connection failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The provider is not part of the supported catalog.
    #[error("Unknown wallet provider: {0}")]
    UnknownProvider(String),

    /// The provider is not present in the host environment.
    #[error("Wallet {0} not detected, install it to continue")]
    NotDetected(String),

    /// The user or the provider declined the request.
    #[error("Connection rejected: {0}")]
    ConnectionRejected(String),

    /// Another connect handshake has not finished yet.
    #[error("A wallet connection is already in progress")]
    ConnectInProgress,

    /// The operation needs an active connection.
    #[error("No wallet connected")]
    NotConnected,

    /// The provider could not reach the network.
    #[error("Wallet network error: {0}")]
    Network(String),
}

/// Full-balance transfer failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// No wallet is connected.
    #[error("No wallet connected")]
    NotConnected,

    /// The user has not acknowledged the transfer.
    #[error("Please confirm the transfer before sending")]
    NotAcknowledged,

    /// A balance fetch or send is already running.
    #[error("A balance fetch or send is already in progress")]
    Busy,

    /// The wallet balance could not be fetched.
    #[error("Failed to fetch wallet balance: {0}")]
    BalanceUnavailable(String),

    /// The balance left after fee reservation is zero.
    #[error("Nothing to send")]
    NothingToSend,

    /// The wallet or the user declined the transfer.
    #[error("Transfer rejected: {0}")]
    Rejected(String),

    /// Submitting the transfer failed in transit.
    #[error("Transfer network error: {0}")]
    Network(String),

    /// This transfer already produced a signature.
    #[error("Transfer already completed")]
    AlreadyCompleted,
}

/// Actions a payment flow refused to perform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// The action is not valid in the current step.
    #[error("Cannot {action} while {step}")]
    InvalidTransition {
        /// Step the flow was in.
        step: &'static str,
        /// Action that was attempted.
        action: &'static str,
    },

    /// A verification is already running for this request.
    #[error("A verification is already in progress")]
    VerificationInFlight,

    /// The flow reached a terminal step.
    #[error("Payment flow is closed ({0})")]
    Closed(&'static str),

    /// The verification resolved after the request was expired, cancelled or
    /// replaced. Its result was dropped.
    #[error("Verification result discarded, payment request is no longer active")]
    Discarded,

    /// The verifier rejected the signature. The flow is awaiting a new one.
    #[error(transparent)]
    Verification(#[from] VerificationError),
}
