//! Payment requests and verification attempts.

use crate::ledger::Lamports;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one payment request. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Currency a request is denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Currency {
    /// The chain's native coin.
    #[default]
    Sol,
}

/// Chain the payment is expected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Network {
    /// Solana mainnet.
    #[default]
    Solana,
}

/// What a payment unlocks for the payer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentPurpose {
    /// Token creation fee.
    #[default]
    Token,
    /// Liquidity withdrawal fee.
    Liquidity,
}

impl fmt::Display for PaymentPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token => f.write_str("token"),
            Self::Liquidity => f.write_str("liquidity"),
        }
    }
}

/// A single user-facing payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    id: RequestId,
    amount: Lamports,
    currency: Currency,
    network: Network,
    purpose: PaymentPurpose,
    recipient_address: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl PaymentRequest {
    /// Create a request that expires `window_secs` from now.
    #[must_use]
    pub fn new(
        amount: Lamports,
        currency: Currency,
        recipient_address: impl Into<String>,
        window_secs: u64,
    ) -> Self {
        let created_at = Utc::now();
        let window = Duration::seconds(i64::try_from(window_secs).unwrap_or(i64::MAX));
        Self {
            id: RequestId::next(),
            amount,
            currency,
            network: Network::default(),
            purpose: PaymentPurpose::default(),
            recipient_address: recipient_address.into(),
            created_at,
            expires_at: created_at + window,
        }
    }

    /// Tag the request with what it pays for.
    #[must_use]
    pub fn with_purpose(mut self, purpose: PaymentPurpose) -> Self {
        self.purpose = purpose;
        self
    }

    /// Request identity.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Amount the user must send.
    #[must_use]
    pub fn amount(&self) -> Lamports {
        self.amount
    }

    /// Currency of the amount.
    #[must_use]
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Chain the payment is expected on.
    #[must_use]
    pub fn network(&self) -> Network {
        self.network
    }

    /// What the payment unlocks.
    #[must_use]
    pub fn purpose(&self) -> PaymentPurpose {
        self.purpose
    }

    /// Address shown to the user.
    #[must_use]
    pub fn recipient_address(&self) -> &str {
        &self.recipient_address
    }

    /// Creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Fixed expiry time.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the request has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Outcome recorded for a verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    /// Lookup in flight.
    Pending,
    /// Payment confirmed.
    Valid,
    /// Ledger has no such transaction.
    NotFound,
    /// Transaction recorded an execution error.
    Failed,
    /// No account received the required amount.
    AmountMismatch,
    /// Signature failed the format check.
    FormatInvalid,
    /// The caller stopped waiting before the lookup finished.
    Abandoned,
    /// The lookup itself failed.
    NetworkError,
}

/// One "check transaction" action against a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationAttempt {
    /// Request being paid.
    pub request_id: RequestId,
    /// Signature the user submitted.
    pub claimed_signature: String,
    /// Current status.
    pub status: VerificationStatus,
    /// When the status was last set.
    pub checked_at: DateTime<Utc>,
}

impl VerificationAttempt {
    pub(crate) fn pending(request_id: RequestId, signature: &str) -> Self {
        Self {
            request_id,
            claimed_signature: signature.to_string(),
            status: VerificationStatus::Pending,
            checked_at: Utc::now(),
        }
    }

    pub(crate) fn resolve(&mut self, status: VerificationStatus) {
        self.status = status;
        self.checked_at = Utc::now();
    }
}
