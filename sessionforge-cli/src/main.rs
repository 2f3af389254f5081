//! Sessionforge CLI
//!
//! Command-line interface for provisioning credentials as environment
//! variables and discovering credentials already present on the machine.
//!
//! # Usage
//!
//! ```bash
//! # Temporary AWS credentials for an item, cached for the session
//! eval "$(sessionforge provision sts --item aws-prod --fields aws-prod.toml)"
//!
//! # Nirmata API token as NIRMATA_TOKEN / NIRMATA_URL
//! eval "$(sessionforge provision token --fields nirmata.toml)"
//!
//! # Look for Nirmata tokens in the environment and ~/.nirmata/config
//! sessionforge discover
//! ```

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;
use sessionforge_core::{
    ImportContext, ItemFields, ItemScope, ProvisionContext, ProvisionInput, ProvisionOutput,
    Provisioner, StsProvisioner, create_store, presets,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

mod config;
mod exchange;
mod shell;

use config::CliConfig;
use exchange::CommandExchangeClient;

#[derive(Parser)]
#[command(name = "sessionforge")]
#[command(about = "Provision credentials as environment variables")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this configuration file instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print `export` lines for a credential item
    #[command(subcommand)]
    Provision(ProvisionCommand),

    /// Look for credentials in the environment and config files
    Discover {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,

        /// Print secret values instead of redacting them
        #[arg(long)]
        show_secrets: bool,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum ProvisionCommand {
    /// Temporary STS credentials derived from a long-lived AWS access key
    Sts {
        /// Item identifier, scopes the credential cache
        #[arg(long)]
        item: String,

        /// TOML file with the item's fields
        #[arg(long)]
        fields: PathBuf,

        /// MFA device serial number or ARN
        #[arg(long, requires = "code")]
        mfa_serial: Option<String>,

        /// Current MFA code
        #[arg(long, requires = "mfa_serial")]
        code: Option<String>,

        /// Exchange timeout in seconds, overrides the configured one
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Nirmata API token
    Token {
        /// TOML file with the item's fields
        #[arg(long)]
        fields: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    init_logging(&config.log_level, cli.verbose);
    debug!("Loaded configuration from {:?}", config.config_path);

    match cli.command {
        Commands::Provision(ProvisionCommand::Sts {
            item,
            fields,
            mfa_serial,
            code,
            timeout,
        }) => {
            let mfa = mfa_serial.zip(code);
            provision_sts(&config, &item, &fields, mfa, timeout).await
        }
        Commands::Provision(ProvisionCommand::Token { fields }) => provision_token(&fields).await,
        Commands::Discover { json, show_secrets } => discover(json, show_secrets),
        Commands::Config => show_config(&config),
    }
}

fn init_logging(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_fields(path: &Path) -> Result<ItemFields> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fields from {:?}", path))?;
    toml::from_str(&contents).with_context(|| format!("Failed to parse fields from {:?}", path))
}

async fn provision_sts(
    config: &CliConfig,
    item: &str,
    fields_path: &Path,
    mfa: Option<(String, String)>,
    timeout: Option<u64>,
) -> Result<()> {
    let fields = read_fields(fields_path)?;

    let Some(client) = CommandExchangeClient::from_command(&config.exchange.command) else {
        bail!(
            "No exchange command configured. Set exchange.command in {:?}",
            config.config_path
        );
    };

    let mut provisioner = StsProvisioner::new(Arc::new(client), create_store(Some(&config.cache_dir)));
    if let Some((serial, code)) = mfa {
        provisioner = provisioner.with_mfa(serial, code);
    }

    let cancellation = CancellationToken::new();
    let mut ctx = ProvisionContext::new().with_cancellation(cancellation.clone());
    let timeout = match timeout {
        Some(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        Some(_) => None,
        None => config.exchange.timeout(),
    };
    if let Some(timeout) = timeout {
        ctx = ctx.with_timeout(timeout);
    }

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling exchange");
            cancellation.cancel();
        }
    });

    let mut out = ProvisionOutput::new();
    provisioner
        .provision(&ctx, &ProvisionInput::new(ItemScope::new(item), fields), &mut out)
        .await;
    interrupt.abort();

    let (env, error) = out.into_parts();
    for line in shell::export_lines(&env) {
        println!("{}", line);
    }

    match error {
        Some(e) => Err(e).with_context(|| format!("Failed to provision {}", item)),
        None => Ok(()),
    }
}

async fn provision_token(fields_path: &Path) -> Result<()> {
    let fields = read_fields(fields_path)?;
    let provisioner = presets::nirmata_provisioner();

    let mut out = ProvisionOutput::new();
    provisioner
        .provision(
            &ProvisionContext::new(),
            &ProvisionInput::new(ItemScope::random(), fields),
            &mut out,
        )
        .await;

    let env = out.into_result()?;
    for line in shell::export_lines(&env) {
        println!("{}", line);
    }
    Ok(())
}

fn discover(as_json: bool, show_secrets: bool) -> Result<()> {
    let attempt = presets::nirmata_discovery_chain().run(&ImportContext::from_environment());
    let (candidates, errors) = attempt.into_parts();

    let render = |value: &sessionforge_core::Secret| {
        if show_secrets {
            value.expose().to_string()
        } else {
            value.to_string()
        }
    };

    if as_json {
        let candidates: Vec<_> = candidates
            .iter()
            .map(|candidate| {
                let fields: serde_json::Map<_, _> = candidate
                    .fields
                    .iter()
                    .map(|(name, value)| (name.to_string(), json!(render(value))))
                    .collect();
                json!({ "source": candidate.source, "fields": fields })
            })
            .collect();
        let errors: Vec<String> = errors.iter().map(|e| e.to_string()).collect();

        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "candidates": candidates, "errors": errors }))?
        );
        return Ok(());
    }

    if candidates.is_empty() {
        println!("No credentials found");
    }
    for candidate in &candidates {
        println!("{}", candidate.source);
        for (name, value) in candidate.fields.iter() {
            println!("  {}: {}", name, render(value));
        }
    }
    for error in &errors {
        eprintln!("warning: {}", error);
    }
    Ok(())
}

fn show_config(config: &CliConfig) -> Result<()> {
    println!("# {}", config.config_path.display());
    print!("{}", toml::to_string_pretty(config).context("Failed to render configuration")?);
    Ok(())
}
