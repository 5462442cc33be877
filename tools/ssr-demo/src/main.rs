//! ssr-demo - Demo server for streaming server rendering.
//!
//! Commands:
//! - `ssr-demo basic` - A tiny page streamed one line per second
//! - `ssr-demo suspense` - An async page in every render mode

mod app;
mod basic;
mod config;
mod output;
mod suspense;

use anyhow::{Context, Result};
use axum::Router;
use clap::{Args, Parser, Subcommand};

use config::DemoConfig;
use output::Output;

/// ssr-demo - Watch HTML arrive in chunks
#[derive(Parser)]
#[command(name = "ssr-demo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (TOML, or JSON by extension)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a page written one line at a time
    Basic(ServeArgs),

    /// Serve the async text page in every render mode
    Suspense(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Interface to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Delay before each line of the basic page (ms)
    #[arg(long)]
    chunk_delay_ms: Option<u64>,

    /// Lower bound of the async text delay (ms)
    #[arg(long)]
    min_delay_ms: Option<u64>,

    /// Upper bound of the async text delay (ms)
    #[arg(long)]
    max_delay_ms: Option<u64>,

    /// Abort render sessions running longer than this (ms)
    #[arg(long)]
    session_timeout_ms: Option<u64>,

    /// Make the n-th async text reject (1-based)
    #[arg(long)]
    fail: Option<usize>,
}

impl ServeArgs {
    fn apply(self, config: &mut DemoConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ms) = self.chunk_delay_ms {
            config.chunk_delay_ms = ms;
        }
        if let Some(ms) = self.min_delay_ms {
            config.min_delay_ms = ms;
        }
        if let Some(ms) = self.max_delay_ms {
            config.max_delay_ms = ms;
        }
        if self.session_timeout_ms.is_some() {
            config.session_timeout_ms = self.session_timeout_ms;
        }
        if self.fail.is_some() {
            config.fail_slot = self.fail;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let output = Output::new(cli.verbose);

    if let Err(e) = run(cli, &output).await {
        output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let mut config = match cli.config.as_deref() {
        Some(path) => DemoConfig::load(path)?,
        None => DemoConfig::default(),
    };

    let (router, basic) = match cli.command {
        Commands::Basic(args) => {
            args.apply(&mut config);
            config.validate()?;
            (basic::router(config.chunk_delay()), true)
        }
        Commands::Suspense(args) => {
            args.apply(&mut config);
            config.validate()?;
            let state = suspense::AppState::new(config.clone(), output.clone());
            (suspense::router(state), false)
        }
    };
    output.debug(&format!("config: {:?}", config));

    let addr = config.addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    if basic {
        output.basic_banner(&config.base_url());
    } else {
        output.suspense_banner(&config.base_url());
    }

    serve(listener, router).await
}

async fn serve(listener: tokio::net::TcpListener, router: Router) -> Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("shutdown signal received"),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to install CTRL+C handler");
                    std::future::pending::<()>().await
                }
            }
        })
        .await
        .context("Server error")
}
