#![deny(unsafe_code)]

//! connidx CLI: one-shot scans and control of a running daemon.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use connidx_config::AppConfig;
use connidx_core::build_info;
use connidx_core::connections::ConnectionsModule;
use connidx_core::host::{ConfiguredHost, TokioScheduler};
use connidx_core::ipc::{IpcClient, socket_path_from_config};

/// connidx: index the connection extensions declared by installed packages.
#[derive(Parser)]
#[command(name = "connidx", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "connidx.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one index pass in-process and print the registry as JSON.
    Scan {
        /// Library directory to scan; repeatable. Replaces `library.paths`.
        #[arg(short, long = "library")]
        libraries: Vec<PathBuf>,

        /// Pretty-print the JSON.
        #[arg(long)]
        pretty: bool,
    },

    /// Run the daemon in the foreground.
    Serve,

    /// Print the registry served by a running daemon.
    Query {
        /// Wait for a fresh index pass instead of reading the cached registry.
        #[arg(long)]
        refresh: bool,
    },

    /// Forward one console line to the daemon's re-index triggers.
    Console {
        /// The console line, e.g. `install.packages("odbc")`.
        line: String,
    },

    /// Show daemon status.
    Status,

    /// Stop a running daemon.
    Stop,

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
    debug!(version = %build_info::version_string(), "connidx starting");

    match cli.command {
        Commands::Scan { libraries, pretty } => cmd_scan(config, libraries, pretty).await?,
        Commands::Serve => cmd_serve(config, &cli.config).await?,
        Commands::Query { refresh } => cmd_query(&config, refresh).await?,
        Commands::Console { line } => cmd_console(&config, &line).await?,
        Commands::Status => cmd_status(&config).await?,
        Commands::Stop => cmd_stop(&config).await?,
        Commands::Config { show } => cmd_config(&config, &cli.config, show)?,
    }

    Ok(())
}

async fn cmd_scan(mut config: AppConfig, libraries: Vec<PathBuf>, pretty: bool) -> Result<()> {
    if !libraries.is_empty() {
        config.library.paths = libraries;
    }
    info!(libraries = config.library.paths.len(), "Scanning package libraries");

    let module = ConnectionsModule::new(
        &config,
        Arc::new(ConfiguredHost::from_config(&config)),
        Arc::new(TokioScheduler::new()),
    );
    let registry = module.refresh().await;
    println!("{}", render_json(&registry, pretty)?);
    Ok(())
}

async fn cmd_serve(config: AppConfig, config_path: &Path) -> Result<()> {
    let daemon = connidx_core::Daemon::with_config_path(config, config_path);
    daemon.run().await?;
    Ok(())
}

async fn cmd_query(config: &AppConfig, refresh: bool) -> Result<()> {
    let client = client_for(config);
    let registry = if refresh {
        client.refresh().await?
    } else {
        client.connections().await?
    };
    println!("{}", render_json(&registry, true)?);
    Ok(())
}

async fn cmd_console(config: &AppConfig, line: &str) -> Result<()> {
    let reply = client_for(config).console_input(line).await?;
    if reply.scheduled {
        println!("Re-index scheduled.");
    } else {
        println!("No re-index scheduled.");
    }
    Ok(())
}

async fn cmd_status(config: &AppConfig) -> Result<()> {
    let status = client_for(config).status().await?;
    println!("daemon:        {} (pid {})", status.version, status.pid);
    println!("uptime:        {}s", status.uptime_secs);
    println!("indexer:       {}", status.indexer_state);
    println!("passes:        {}", status.passes_completed);
    println!("connections:   {}", status.connections);
    println!("pending:       {} continuation(s)", status.pending_continuations);
    println!("reindex:       {}", if status.reindex_pending { "pending" } else { "none" });
    println!("session:       {}", if status.session_busy { "busy" } else { "idle" });
    for library in &status.libraries {
        println!("library:       {}", library.display());
    }
    Ok(())
}

async fn cmd_stop(config: &AppConfig) -> Result<()> {
    let reply = client_for(config).stop().await?;
    println!("{}", reply.message);
    Ok(())
}

fn cmd_config(config: &AppConfig, config_path: &Path, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(config).context("failed to serialize config")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

fn client_for(config: &AppConfig) -> IpcClient {
    IpcClient::new(socket_path_from_config(config))
}

fn render_json(value: &serde_json::Value, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.context("failed to serialize registry")
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display()))
    } else {
        Ok(AppConfig::default())
    }
}
