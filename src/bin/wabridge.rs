//! wabridge
//!
//! Runs the bridge (`serve`) and a few one-shot maintenance commands.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use wabridge::backend::Backend;
use wabridge::config::{
    apply_env_overrides, load_config, load_config_from_path, validate_config, BackendKind, Config,
};
use wabridge::discovery::Observable;
use wabridge::engine::{Command, InstanceId};
use wabridge::session::{ChromeLauncher, LoginState, SessionClient};
use wabridge::{logging, AppContext, VERSION};

#[derive(Parser)]
#[command(
    name = "wabridge",
    version = VERSION,
    about = "WhatsApp bridge for home automation",
    long_about = None
)]
struct Cli {
    /// Config file (JSON5 or TOML); defaults to the user config directory
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Override the snapshot backend (engine or browser)
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordinator, discovery and the local server until Ctrl-C
    Serve,

    /// Log the browser session in, writing the QR code to a file if needed
    Login {
        /// Where to write the QR code PNG
        #[arg(long, default_value = "qr.png")]
        qr_out: PathBuf,
    },

    /// Send one message through the configured backend
    Send {
        /// Jid, phone number or display name
        #[arg(long)]
        contact: String,
        #[arg(long)]
        message: String,
        #[arg(long, default_value_t = 1)]
        instance: InstanceId,
    },

    /// Fetch one snapshot and print it as JSON
    Snapshot,

    /// Validate the configuration and exit
    CheckConfig,
}

fn load(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match cli.config {
        Some(ref path) => {
            let mut config = load_config_from_path(path)?;
            apply_env_overrides(&mut config);
            config
        }
        None => load_config()?,
    };
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load(&cli).context("Failed to load configuration")?;

    if let Commands::CheckConfig = cli.command {
        return check_config(&config);
    }

    logging::init(&config.log);

    let validation = validate_config(&config);
    for warning in &validation.warnings {
        warn!("{}", warning);
    }
    if !validation.valid {
        for issue in &validation.errors {
            error!("{}", issue);
        }
        anyhow::bail!("Invalid configuration ({} errors)", validation.errors.len());
    }

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Login { qr_out } => login(config, qr_out).await,
        Commands::Send {
            contact,
            message,
            instance,
        } => send(config, contact, message, instance).await,
        Commands::Snapshot => snapshot(config).await,
        Commands::CheckConfig => Ok(()),
    }
}

fn check_config(config: &Config) -> anyhow::Result<()> {
    let validation = validate_config(config);
    for issue in &validation.errors {
        println!("error: {}", issue);
    }
    for issue in &validation.warnings {
        println!("warning: {}", issue);
    }
    if validation.valid {
        println!("Configuration OK (backend: {})", config.backend);
        Ok(())
    } else {
        anyhow::bail!("Configuration has {} errors", validation.errors.len())
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("Starting wabridge v{}", VERSION);

    let app = AppContext::build(config)?;
    app.add_discovery_sink(Arc::new(|batch: &[Observable]| {
        for observable in batch {
            info!(unique_id = %observable.unique_id, name = %observable.name, "Discovered");
        }
    }));

    if let Err(e) = app.start().await {
        app.shutdown().await;
        return Err(e).context("Initial snapshot failed");
    }
    let addr = app.spawn_server().await?;
    info!(%addr, "wabridge is ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Received Ctrl-C");

    app.shutdown().await;
    Ok(())
}

async fn login(config: Config, qr_out: PathBuf) -> anyhow::Result<()> {
    let launcher = Arc::new(ChromeLauncher::from_config(&config.session));
    let session = SessionClient::new(&config.session, launcher);

    let result = run_login(&session, &qr_out).await;
    session.close().await;
    result
}

async fn run_login(session: &SessionClient, qr_out: &Path) -> anyhow::Result<()> {
    match session.start().await? {
        LoginState::LoggedIn => {
            println!("Already logged in as '{}'", session.account());
        }
        LoginState::AwaitingQr(png) => {
            std::fs::write(qr_out, &png)
                .with_context(|| format!("Failed to write {}", qr_out.display()))?;
            println!("Scan the QR code saved to {}", qr_out.display());
            if !session.wait_for_scan().await? {
                anyhow::bail!("QR code was not scanned in time");
            }
            println!("Logged in as '{}'", session.account());
        }
        LoginState::Error(failure) => anyhow::bail!("Login failed: {}", failure),
    }
    Ok(())
}

async fn send(
    config: Config,
    contact: String,
    message: String,
    instance: InstanceId,
) -> anyhow::Result<()> {
    let app = AppContext::build(config)?;
    let backend = app.backend();

    if let Backend::Browser(session) = backend {
        if let LoginState::Error(failure) = session.start().await? {
            session.close().await;
            anyhow::bail!("Browser session unavailable: {}", failure);
        }
    }

    let command = Command::SendMessage {
        instance_id: instance,
        contact,
        message,
    };
    let result = backend.execute(&command).await;

    if let Some(session) = backend.session() {
        session.close().await;
    }

    match result? {
        Some(reply) => println!("{}", serde_json::to_string_pretty(&reply)?),
        None => println!("Message sent"),
    }
    Ok(())
}

async fn snapshot(config: Config) -> anyhow::Result<()> {
    let app = AppContext::build(config)?;
    let backend = app.backend();

    if let Some(session) = backend.session() {
        session.start().await?;
    }
    let result = backend.snapshot_source().fetch().await;
    if let Some(session) = backend.session() {
        session.close().await;
    }

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}
