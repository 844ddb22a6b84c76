//! Transaction verifier: decides whether a claimed signature paid a request.
//!
//! The verifier never trusts the client beyond the signature string. Funds
//! are confirmed by reading balance changes straight from the ledger node.

use crate::config::VerifierConfig;
use crate::error::VerificationError;
use crate::ledger::{BalanceDelta, Lamports, LedgerClient};
use crate::payment::cache::{CacheStats, VerifiedCache};
use crate::payment::request::PaymentRequest;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a signature satisfied a payment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Signature is on the bypass allow-list. No lookup was made.
    Bypassed,
    /// Signature was verified earlier for the same amount.
    Cached,
    /// The ledger shows an account receiving the required amount.
    Verified {
        /// Index of the matching account in the transaction.
        account_index: usize,
        /// Address of the matching account, if reported.
        account: Option<String>,
        /// Lamports the account received.
        received: Lamports,
    },
}

/// Fixed set of signatures that skip ledger verification.
///
/// Only exact, whole-string matches count.
#[derive(Debug, Clone, Default)]
pub struct BypassList {
    entries: HashSet<String>,
}

impl BypassList {
    /// Build from a list of exact signatures.
    #[must_use]
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `signature` is on the list.
    #[must_use]
    pub fn matches(&self, signature: &str) -> bool {
        self.entries.contains(signature)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Find the first account whose balance rose by the required amount, within
/// `tolerance` either side (inclusive).
///
/// Any account in the transaction may match, not only the configured
/// recipient.
#[must_use]
pub fn find_matching_delta(
    deltas: &[BalanceDelta],
    required: Lamports,
    tolerance: Lamports,
) -> Option<&BalanceDelta> {
    deltas.iter().find(|delta| {
        delta
            .received()
            .is_some_and(|received| received.abs_diff(required) <= tolerance)
    })
}

/// Verifies claimed transaction signatures against a ledger node.
pub struct TransactionVerifier {
    ledger: Arc<dyn LedgerClient>,
    bypass: BypassList,
    cache: VerifiedCache,
    tolerance: Lamports,
    min_signature_len: usize,
    max_signature_len: usize,
}

impl TransactionVerifier {
    /// Create a verifier over `ledger`.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerClient>, config: &VerifierConfig) -> Self {
        let bypass = BypassList::new(config.bypass_signatures.iter().cloned());
        info!(
            "Transaction verifier initialized (tolerance={} lamports, signature_len={}..={}, bypass_entries={}, cache_capacity={})",
            config.tolerance_lamports,
            config.min_signature_len,
            config.max_signature_len,
            bypass.len(),
            config.cache_capacity
        );

        Self {
            ledger,
            bypass,
            cache: VerifiedCache::with_capacity(config.cache_capacity),
            tolerance: Lamports(config.tolerance_lamports),
            min_signature_len: config.min_signature_len,
            max_signature_len: config.max_signature_len,
        }
    }

    /// Check that `signature` proves payment of `request`.
    ///
    /// Steps, in order:
    /// 1. Exact match against the bypass allow-list
    /// 2. Signature length within the accepted bound
    /// 3. Verified-signature cache
    /// 4. Ledger lookup at "confirmed" commitment (not retried)
    /// 5. Existence and execution-error check
    /// 6. Amount matching across every account in the transaction
    ///
    /// # Errors
    ///
    /// Returns the [`VerificationError`] for the first step that fails.
    pub async fn verify(
        &self,
        signature: &str,
        request: &PaymentRequest,
    ) -> Result<VerificationOutcome, VerificationError> {
        let required = request.amount();

        if self.bypass.matches(signature) {
            info!("Bypass signature accepted for {}", request.id());
            return Ok(VerificationOutcome::Bypassed);
        }

        let len = signature.chars().count();
        if len < self.min_signature_len || len > self.max_signature_len {
            debug!(
                "Rejecting signature of length {len} for {} (accepted {}..={})",
                request.id(),
                self.min_signature_len,
                self.max_signature_len
            );
            return Err(VerificationError::FormatInvalid);
        }

        if self.cache.contains(signature, required) {
            debug!("Signature {signature} found in verified cache");
            return Ok(VerificationOutcome::Cached);
        }

        let view = match self.ledger.get_transaction(signature).await {
            Ok(Some(view)) => view,
            Ok(None) => {
                debug!("Transaction {signature} not found on ledger");
                return Err(VerificationError::NotFound);
            }
            Err(e) => {
                warn!("Ledger lookup failed for {signature}: {e}");
                return Err(VerificationError::Network(e.to_string()));
            }
        };

        if view.error_present {
            info!("Transaction {signature} recorded an execution error");
            return Err(VerificationError::Failed);
        }

        let Some(matched) = find_matching_delta(&view.balance_deltas, required, self.tolerance)
        else {
            info!(
                "Transaction {signature} moved no amount within {} of {required}",
                self.tolerance
            );
            return Err(VerificationError::AmountMismatch);
        };

        let outcome = VerificationOutcome::Verified {
            account_index: matched.account_index,
            account: matched.account.clone(),
            received: matched.received().unwrap_or_default(),
        };

        self.cache.insert(signature, required);
        info!(
            "Payment verified for {}: account #{} received {}",
            request.id(),
            matched.account_index,
            matched.received().unwrap_or_default()
        );

        Ok(outcome)
    }

    /// Absolute tolerance applied when matching amounts.
    #[must_use]
    pub fn tolerance(&self) -> Lamports {
        self.tolerance
    }

    /// Get cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Get the number of cached entries.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}
