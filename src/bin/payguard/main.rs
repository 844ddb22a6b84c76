//! payguard CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::{bail, eyre};
use payguard::config::{default_config_path, GatewayConfig};
use payguard::error::Error;
use payguard::payment::VerificationOutcome;
use payguard::{GatewayBuilder, Lamports};
use tracing::info;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = cli.load_config()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(log_layer(cli.json_logs, std::io::stderr))
        .with(filter)
        .init();

    info!("payguard v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Verify { signature, amount } => verify(config, &signature, amount).await,
        Command::Providers { json } => providers(config, json),
        Command::InitConfig { path, force } => init_config(&config, path, force),
    }
}

/// Plain or JSON log output on `writer`. Command output owns stdout.
fn log_layer<S, W>(json: bool, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if json {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        fmt::layer().with_writer(writer).boxed()
    }
}

async fn verify(config: GatewayConfig, signature: &str, amount: f64) -> color_eyre::Result<()> {
    let lamports = Lamports::from_sol(amount)
        .ok_or_else(|| eyre!(Error::InvalidAmount(amount.to_string())))?;
    let gateway = GatewayBuilder::new(config).build()?;

    match gateway.verify_signature(signature, lamports).await {
        Ok(VerificationOutcome::Verified {
            account_index,
            account,
            received,
        }) => {
            let account = account.unwrap_or_else(|| format!("#{account_index}"));
            println!("Payment verified: {account} received {received}");
            Ok(())
        }
        Ok(VerificationOutcome::Bypassed) => {
            println!("Payment accepted (bypass signature)");
            Ok(())
        }
        Ok(VerificationOutcome::Cached) => {
            println!("Payment verified (cached)");
            Ok(())
        }
        Err(Error::Verification(e)) => bail!("{} ({e})", e.user_message()),
        Err(e) => Err(e.into()),
    }
}

fn providers(config: GatewayConfig, json: bool) -> color_eyre::Result<()> {
    let gateway = GatewayBuilder::new(config).build()?;
    let listing = gateway.discovery().list_providers();

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    for provider in listing {
        let detected = if provider.detected {
            "detected"
        } else {
            "not detected"
        };
        println!(
            "{:<10} {:<10} {detected}",
            provider.name,
            format!("{:?}", provider.category)
        );
    }
    Ok(())
}

fn init_config(
    config: &GatewayConfig,
    path: Option<std::path::PathBuf>,
    force: bool,
) -> color_eyre::Result<()> {
    let path = path.unwrap_or_else(default_config_path);
    if path.exists() && !force {
        bail!(
            "{} already exists, pass --force to overwrite",
            path.display()
        );
    }
    config.to_file(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
