use anyhow::{Context, Result};
use campusdual_sync::calendar::GoogleCalendar;
use campusdual_sync::config::AppConfig;
use campusdual_sync::portal::{PortalSession, RawEvent};
use campusdual_sync::store::SyncStore;
use campusdual_sync::sync::SyncEngine;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "campusdual-sync", version)]
#[command(about = "Mirrors a Campus Dual timetable into a dedicated Google calendar")]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true, default_value = "campusdual.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to Campus Dual and store the session credentials
    Login {
        #[arg(short, long)]
        username: String,

        /// Portal password; read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Run one synchronization cycle; exit code 0 = success, 1 = retry
    Sync,
    /// Show the stored credentials, snapshot and calendar id
    Status,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;
    let store = Arc::new(SyncStore::open(&config.store.path).context("failed to open state store")?);

    match cli.command {
        Commands::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password()?,
            };
            PortalSession::login(&config.portal, &store, &username, &password)
                .await
                .context("login failed")?;
            println!("Login succeeded; session credentials stored.");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Sync => {
            // An unavailable token is retryable, not fatal: the scheduler
            // re-runs once the external OAuth side has refreshed it.
            let calendar = match GoogleCalendar::new(config.calendar.clone()) {
                Ok(client) => client,
                Err(e) => {
                    warn!(error = %e, "calendar client unavailable, retry later");
                    return Ok(ExitCode::from(1));
                }
            };
            let engine = SyncEngine::new(store, config.portal.clone(), &config.calendar, calendar);
            let outcome = engine.run().await;
            Ok(ExitCode::from(outcome.exit_code()))
        }
        Commands::Status => {
            print_status(&store)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn prompt_password() -> Result<String> {
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_status(store: &SyncStore) -> Result<()> {
    match store.credentials()? {
        Some(credentials) => println!("user:      {}", credentials.username),
        None => println!("user:      (not logged in)"),
    }
    match store.snapshot()? {
        Some(snapshot) => match serde_json::from_str::<Vec<RawEvent>>(&snapshot.body) {
            Ok(events) => println!(
                "snapshot:  {} events, fetched {}",
                events.len(),
                snapshot.fetched_at
            ),
            Err(_) => println!("snapshot:  unreadable (will be treated as empty)"),
        },
        None => println!("snapshot:  (none)"),
    }
    match store.calendar_id()? {
        Some(id) => println!("calendar:  {}", id),
        None => println!("calendar:  (not created yet)"),
    }
    Ok(())
}
