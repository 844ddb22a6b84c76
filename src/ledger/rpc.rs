//! JSON-RPC ledger client.
//!
//! Issues `getTransaction` against a Solana-compatible node and projects the
//! response down to a [`LedgerTransactionView`].

use super::{BalanceDelta, ConfirmationState, LedgerClient, LedgerError, LedgerTransactionView};
use crate::config::RpcConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Commitment level requested from the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    /// Highest level a transaction reaches within seconds.
    #[default]
    Confirmed,
    /// Rooted, slower to reach.
    Finalized,
}

impl Commitment {
    /// Wire name of the commitment level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }

    fn confirmation_state(self) -> ConfirmationState {
        match self {
            Self::Confirmed => ConfirmationState::Confirmed,
            Self::Finalized => ConfirmationState::Finalized,
        }
    }
}

/// Newest transaction envelope version the client accepts.
const MAX_SUPPORTED_TRANSACTION_VERSION: u8 = 0;

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncodedTransaction {
    #[serde(default)]
    slot: Option<u64>,
    #[serde(default)]
    meta: Option<TransactionMeta>,
    transaction: TransactionBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionMeta {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    pre_balances: Vec<u64>,
    #[serde(default)]
    post_balances: Vec<u64>,
    #[serde(default)]
    loaded_addresses: Option<LoadedAddresses>,
}

#[derive(Debug, Default, Deserialize)]
struct LoadedAddresses {
    #[serde(default)]
    writable: Vec<String>,
    #[serde(default)]
    readonly: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionBody {
    message: TransactionMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionMessage {
    #[serde(default)]
    account_keys: Vec<String>,
}

/// Ledger client speaking JSON-RPC over HTTP.
pub struct RpcLedgerClient {
    http: Client,
    endpoint: String,
    commitment: Commitment,
}

impl RpcLedgerClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &RpcConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Network(format!("Failed to build RPC client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.url.clone(),
            commitment: config.commitment,
        })
    }

    /// The node URL this client talks to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> std::result::Result<Option<T>, LedgerError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LedgerError::Timeout
                } else {
                    LedgerError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(method, status = %status, "RPC endpoint returned error status");
            return Err(LedgerError::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        decode_envelope(&bytes)
    }
}

fn decode_envelope<T: DeserializeOwned>(
    bytes: &[u8],
) -> std::result::Result<Option<T>, LedgerError> {
    let envelope: RpcEnvelope<T> =
        serde_json::from_slice(bytes).map_err(|e| LedgerError::Decode(e.to_string()))?;

    if let Some(err) = envelope.error {
        warn!(code = err.code, message = %err.message, "RPC returned error response");
        return Err(LedgerError::Rpc {
            code: err.code,
            message: err.message,
        });
    }

    Ok(envelope.result)
}

fn into_view(
    signature: &str,
    tx: EncodedTransaction,
    confirmation: ConfirmationState,
) -> LedgerTransactionView {
    let Some(meta) = tx.meta else {
        return LedgerTransactionView {
            signature: signature.to_string(),
            slot: tx.slot,
            confirmation,
            error_present: true,
            balance_deltas: Vec::new(),
        };
    };

    let loaded = meta.loaded_addresses.unwrap_or_default();
    let accounts: Vec<String> = tx
        .transaction
        .message
        .account_keys
        .into_iter()
        .chain(loaded.writable)
        .chain(loaded.readonly)
        .collect();

    let balance_deltas = meta
        .pre_balances
        .iter()
        .zip(meta.post_balances.iter())
        .enumerate()
        .map(|(index, (pre, post))| BalanceDelta {
            account_index: index,
            account: accounts.get(index).cloned(),
            pre_balance: *pre,
            post_balance: *post,
        })
        .collect();

    LedgerTransactionView {
        signature: signature.to_string(),
        slot: tx.slot,
        confirmation,
        error_present: meta.err.is_some_and(|err| !err.is_null()),
        balance_deltas,
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn get_transaction(
        &self,
        signature: &str,
    ) -> std::result::Result<Option<LedgerTransactionView>, LedgerError> {
        debug!(signature, endpoint = %self.endpoint, "Querying ledger for transaction");

        let params = json!([
            signature,
            {
                "commitment": self.commitment.as_str(),
                "maxSupportedTransactionVersion": MAX_SUPPORTED_TRANSACTION_VERSION,
                "encoding": "json",
            }
        ]);

        let tx: Option<EncodedTransaction> = self.call("getTransaction", params).await?;
        Ok(tx.map(|tx| into_view(signature, tx, self.commitment.confirmation_state())))
    }
}
