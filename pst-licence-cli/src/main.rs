//! PST licence client
//!
//! Activates and re-validates licences for the products listed in a
//! configuration file, keeping the licence table in a local JSON file.
//!
//! Usage:
//!   pst-licence --config site.toml activate pst-gateway/init.php --email you@example.com --key KEY
//!   pst-licence --config site.toml refresh

use std::{path::PathBuf, sync::Arc};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pst_licence::{ActivateRequest, ReqwestClient, RequestContext};
use pst_licence_cli::{CliConfig, TextPanelRenderer, status_lines};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "pst-licence")]
#[command(about = "Activate and check PST product licences")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "pst-licence.toml")]
    config: PathBuf,

    /// Print JSON responses instead of the text panel
    #[arg(long)]
    json: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Activate a product's licence key
    Activate {
        /// Product init as registered in the configuration
        product: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        key: String,
    },
    /// Re-validate one product's licence
    Check { product: String },
    /// Re-validate every registered product
    Refresh,
    /// Show stored licence state without contacting the server
    Status,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { "debug" } else { "info" };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = CliConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    debug!(
        family = ?config.family,
        products = config.products.len(),
        store = %config.store_path.display(),
        "Configuration loaded"
    );

    let store = Arc::new(config.open_store().context("Failed to open licence store")?);
    let http = Arc::new(ReqwestClient::new(&config.licence).context("Failed to build HTTP client")?);
    let renderer = Arc::new(TextPanelRenderer::stdout());
    let controller = config.controller(store, http, renderer);
    let ctx = RequestContext { ajax: args.json };

    match args.command {
        Command::Activate { product, email, key } => {
            let request = ActivateRequest {
                product_init: product,
                email,
                licence_key: key,
            };
            let envelope = controller.activate(&request, ctx)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&envelope)?);
            } else {
                match &envelope.body {
                    None => warn!("Could not reach the licensing server, please try again later"),
                    Some(body) => {
                        if let Some(error) = body.get("error").and_then(|v| v.as_str()) {
                            warn!("Licence not activated: {}", error);
                        }
                    }
                }
            }
        }
        Command::Check { product } => {
            let active = controller.check(&product)?;
            if args.json {
                println!("{}", serde_json::json!({ "product": product, "activated": active }));
            } else {
                info!("{} is {}", product, if active { "active" } else { "not active" });
            }
        }
        Command::Refresh => {
            let envelope = controller.update_licence_information(ctx)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&envelope)?);
            }
        }
        Command::Status => {
            let today = chrono::Local::now().date_naive();
            let lines = status_lines(&controller, today)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&lines)?);
            } else {
                for line in lines {
                    println!("{:<32} {:<12} {}", line.init, line.state, line.expiry_label());
                }
            }
        }
    }

    Ok(())
}
