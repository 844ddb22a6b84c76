//! Command-line interface definition.

use clap::{Parser, Subcommand, ValueEnum};
use payguard::config::{default_config_path, GatewayConfig};
use payguard::ledger::Commitment;
use std::path::PathBuf;

/// Payment confirmation and wallet withdrawal flows for Solana.
#[derive(Parser, Debug)]
#[command(name = "payguard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short, global = true, env = "PAYGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Ledger JSON-RPC endpoint.
    #[arg(long, global = true, env = "PAYGUARD_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Commitment level for transaction lookups.
    #[arg(long, value_enum, global = true)]
    pub commitment: Option<CliCommitment>,

    /// Log level.
    #[arg(long, global = true, env = "RUST_LOG")]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a transaction signature against an amount on the live ledger.
    Verify {
        /// Transaction signature.
        #[arg(long, short)]
        signature: String,

        /// Required amount in SOL.
        #[arg(long, short)]
        amount: f64,
    },

    /// List the supported wallet providers.
    Providers {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Write a configuration file with the effective settings.
    InitConfig {
        /// Destination path. Defaults to the per-user config location.
        path: Option<PathBuf>,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Commitment CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliCommitment {
    /// Optimistically confirmed.
    Confirmed,
    /// Rooted.
    Finalized,
}

impl Cli {
    /// Build the effective configuration: file (or defaults) plus CLI
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn load_config(&self) -> color_eyre::Result<GatewayConfig> {
        let mut config = match &self.config {
            Some(path) => GatewayConfig::from_file(path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    GatewayConfig::from_file(&path)?
                } else {
                    GatewayConfig::default()
                }
            }
        };

        if let Some(url) = &self.rpc_url {
            config.rpc.url.clone_from(url);
        }
        if let Some(commitment) = self.commitment {
            config.rpc.commitment = commitment.into();
        }
        if let Some(level) = &self.log_level {
            config.log_level.clone_from(level);
        }

        Ok(config)
    }
}

impl From<CliCommitment> for Commitment {
    fn from(c: CliCommitment) -> Self {
        match c {
            CliCommitment::Confirmed => Commitment::Confirmed,
            CliCommitment::Finalized => Commitment::Finalized,
        }
    }
}
