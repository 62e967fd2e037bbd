//! InstantllyCards admin console - Main entry point
//!
//! Serves the admin dashboard and feedback triage UI, and offers a few
//! one-shot commands against the backend (wake-up, stats, CSV exports).

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use instantlly_admin::admin::{AdminAuthStore, AdminState};
use instantlly_admin::backend::{AdminBackend, WakeStatus};
use instantlly_admin::config::{self, Config};
use instantlly_admin::dashboard::{self, ExportKind};
use instantlly_admin::http::run_http_server;
use instantlly_api::ApiClient;

/// InstantllyCards admin console
#[derive(Parser)]
#[command(name = "instantlly-admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value_os_t = Config::default_path())]
    config: PathBuf,

    /// Data directory for logs
    #[arg(short, long, default_value_os_t = Config::default_data_dir())]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the admin console
    Serve {
        /// Address to listen on (overrides config)
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// Hash an admin password for the config file
    HashPassword {
        /// Password to hash (read from stdin if omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Generate a default configuration file
    InitConfig {
        /// Output path (defaults to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Wake the backend and wait until it answers
    Wake,

    /// Print platform statistics
    Stats,

    /// Download a CSV export
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
}

#[derive(Subcommand)]
enum ExportCommands {
    /// All users
    Users {
        /// Output path (defaults to a timestamped file in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Phone numbers of all users
    Phones {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Contacts of a single user
    Contacts {
        /// User ID
        user_id: String,

        /// Name used in the default file name
        #[arg(long)]
        name: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    match cli.command {
        Commands::Serve { listen } => {
            // For daemon mode: log to both stdout and file with rotation
            init_daemon_logging(&cli.data_dir, filter)?;
            serve(&cli.config, listen).await
        }
        Commands::HashPassword { password } => {
            init_cli_logging(filter);
            hash_password(password)
        }
        Commands::InitConfig { output } => {
            init_cli_logging(filter);
            generate_config(output)
        }
        Commands::Wake => {
            init_cli_logging(filter);
            wake(&cli.config).await
        }
        Commands::Stats => {
            init_cli_logging(filter);
            print_stats(&cli.config).await
        }
        Commands::Export { command } => {
            init_cli_logging(filter);
            export(&cli.config, command).await
        }
    }
}

/// Initialize logging for CLI commands (stdout only).
fn init_cli_logging(filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

/// Initialize logging for daemon mode (stdout + rotating file).
fn init_daemon_logging(data_dir: &Path, filter: EnvFilter) -> Result<()> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    // Daily rotating file, e.g. instantlly-admin.2026-01-15.log
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("instantlly-admin")
        .filename_suffix("log")
        .build(&log_dir)
        .with_context(|| "Failed to create log file appender")?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer alive for the lifetime of the process
    std::mem::forget(guard);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_target(true).with_ansi(false).with_writer(non_blocking))
        .init();

    info!("Logging to: {}", log_dir.display());
    Ok(())
}

fn api_client(config: &Config) -> Result<ApiClient> {
    ApiClient::new(
        &config.backend.base_url,
        &config.backend.admin_key,
        config.backend.retry_policy(),
    )
    .with_context(|| format!("Invalid backend URL: {}", config.backend.base_url))
}

/// Run the admin console
async fn serve(config_path: &Path, listen_override: Option<SocketAddr>) -> Result<()> {
    let config = Config::load(config_path)?;

    let listen_addr: SocketAddr = match listen_override {
        Some(addr) => addr,
        None => config
            .http
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid listen address in config: {}", config.http.listen_addr))?,
    };

    let password_hash = config.admin.require_password_hash()?;
    let auth_store = AdminAuthStore::new(
        config.admin.username.clone(),
        password_hash,
        config.admin.session_timeout()?,
    );

    let client = api_client(&config)?;
    let wake_status = Arc::new(WakeStatus::new());
    wake_status.follow(client.subscribe());

    info!("InstantllyCards admin console starting...");
    info!("Backend: {}", client.base_url());
    info!("Health check: {}", client.health_url());

    let backend: Arc<dyn AdminBackend> = Arc::new(client);
    let state = Arc::new(AdminState {
        auth_store,
        backend,
        wake_status,
    });

    run_http_server(listen_addr, state).await
}

/// Print the argon2 hash of a password
fn hash_password(password: Option<String>) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => {
            eprintln!("Enter password:");
            let mut line = String::new();
            io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read password from stdin")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if password.is_empty() {
        bail!("Password must not be empty");
    }

    let hash = AdminAuthStore::hash_password(&password)?;
    println!("{hash}");
    eprintln!();
    eprintln!("Add this to the [admin] section of your config:");
    eprintln!("  password_hash = \"{hash}\"");
    Ok(())
}

/// Generate a default configuration file
fn generate_config(output: Option<PathBuf>) -> Result<()> {
    let config = config::default_config_template();

    match output {
        Some(path) => {
            std::fs::write(&path, &config)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Configuration written to: {}", path.display());
        }
        None => {
            print!("{}", config);
        }
    }

    Ok(())
}

/// Wake the backend, printing progress as it goes
async fn wake(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let client = api_client(&config)?;

    let mut progress = client.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = progress.recv().await {
            println!("{}", event.message);
        }
    });

    let result = client.wake_up().await;
    drop(client);
    printer.await.ok();

    result.context("Backend did not wake up")?;
    Ok(())
}

/// Print platform statistics
async fn print_stats(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let client = api_client(&config)?;
    let stats = client.stats().await.context("Failed to fetch stats")?;

    println!("{:<22} {:>12}", "Total users", stats.total_users);
    println!("{:<22} {:>12}", "Total cards", stats.total_cards);
    println!("{:<22} {:>12}", "Total messages", stats.total_messages);
    println!("{:<22} {:>12}", "Total groups", stats.total_groups);
    println!("{:<22} {:>12}", "App downloads", stats.downloads());
    println!("{:<22} {:>12}", "Installed audience", stats.active_users());
    println!("{:<22} {:>12}", "Downloads trend", stats.downloads_trend());
    Ok(())
}

/// Write a CSV export to disk
async fn export(config_path: &Path, command: ExportCommands) -> Result<()> {
    let config = Config::load(config_path)?;
    let client = api_client(&config)?;

    let (kind, output) = match command {
        ExportCommands::Users { output } => (ExportKind::AllUsers, output),
        ExportCommands::Phones { output } => (ExportKind::PhoneNumbers, output),
        ExportCommands::Contacts {
            user_id,
            name,
            output,
        } => {
            let user_name = name.unwrap_or_else(|| user_id.clone());
            (ExportKind::UserContacts { user_id, user_name }, output)
        }
    };

    let csv = dashboard::run_export(&client, &kind, Utc::now())
        .await
        .context(kind.failure_message())?;
    let path = output.unwrap_or_else(|| PathBuf::from(&csv.filename));
    std::fs::write(&path, &csv.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Wrote {} bytes to {}", csv.bytes.len(), path.display());
    Ok(())
}
