//! `helpdesk`: triage bot for chat commands and support email.
//!
//! Configuration comes from an optional YAML file (`--config`), overlaid by
//! environment variables. A `.env` file in the working directory is loaded
//! first.

mod doctor;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use helpdesk_core::commands::format_triage;
use helpdesk_core::{
    GithubTracker, GraphClient, HelpdeskConfig, PollReport, SupportDesk, command_definitions,
    label_taxonomy, run_poller, seed_labels,
};
use helpdesk_server::{AppState, DiscordApi};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "helpdesk", version, about = "Turns support messages into triaged tracker issues")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true, env = "HELPDESK_CONFIG")]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server (email webhook, chat interactions)
    Serve {
        /// Also poll the mailbox in the background
        #[arg(long)]
        poll: bool,

        /// Override the listen port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Poll the support mailbox for new messages
    Poll {
        /// Run a single poll and exit
        #[arg(long)]
        once: bool,

        /// Seconds between polls
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },

    /// Triage a message and print the result
    Triage {
        /// Message text
        #[arg(required = true)]
        text: Vec<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Create or update the issue tracker labels
    SeedLabels,

    /// Register slash commands with the chat platform
    RegisterCommands {
        /// Register globally instead of in the configured guild
        #[arg(long)]
        global: bool,
    },

    /// Replace the mailbox change-notification subscription
    Subscribe,

    /// Report which configuration values are present
    Doctor(doctor::DoctorArgs),
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Routes panics through tracing so they land in the same log stream.
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<unknown payload>".to_string());
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        error!(panic = %payload, %location, "panic");
        previous(info);
    }));
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();
    install_panic_hook();
    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = HelpdeskConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Serve { poll, port } => serve(config, poll, port).await,
        Commands::Poll { once, interval } => poll(&config, once, interval).await,
        Commands::Triage { text, json } => triage(&config, &text.join(" "), json).await,
        Commands::SeedLabels => seed(&config).await,
        Commands::RegisterCommands { global } => register_commands(&config, global).await,
        Commands::Subscribe => subscribe(&config).await,
        Commands::Doctor(args) => doctor::execute(&config, &args),
    }
}

async fn serve(mut config: HelpdeskConfig, poll: bool, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    let desk = Arc::new(SupportDesk::from_config(&config)?);
    let chat = match config.chat.require() {
        Ok(settings) => Some(DiscordApi::new(&settings)),
        Err(e) => {
            warn!(error = %e, "chat interactions will not receive deferred replies");
            None
        }
    };
    let state = AppState::new(Arc::clone(&desk))
        .with_chat(chat)
        .with_client_state(config.mail.client_state.clone());

    let (stop_tx, stop_rx) = watch::channel(false);
    let poller = poll.then(|| {
        tokio::spawn(run_poller(
            Arc::clone(&desk),
            Duration::from_secs(config.poll.interval_secs),
            stop_rx,
        ))
    });

    let shutdown = async move {
        ctrl_c().await;
        let _ = stop_tx.send(true);
    };
    helpdesk_server::serve(Arc::new(state), &config.server.address(), shutdown).await?;

    if let Some(handle) = poller {
        handle.await.context("poller task failed")?;
    }
    Ok(())
}

fn print_report(report: &PollReport) {
    println!(
        "fetched {}, processed {}, skipped {}, duplicates {}, failed {}",
        report.fetched,
        report.processed.to_string().green(),
        report.skipped,
        report.duplicates,
        if report.failed > 0 {
            report.failed.to_string().red()
        } else {
            report.failed.to_string().normal()
        }
    );
}

async fn poll(config: &HelpdeskConfig, once: bool, interval: Option<u64>) -> Result<()> {
    let desk = Arc::new(SupportDesk::from_config(config)?);
    if once {
        let report = desk.poll_once().await?;
        print_report(&report);
        return Ok(());
    }

    let period = Duration::from_secs(interval.unwrap_or(config.poll.interval_secs));
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(run_poller(desk, period, stop_rx));
    ctrl_c().await;
    let _ = stop_tx.send(true);
    let totals = handle.await.context("poller task failed")?;
    print_report(&totals);
    Ok(())
}

async fn triage(config: &HelpdeskConfig, text: &str, json: bool) -> Result<()> {
    let desk = SupportDesk::from_config(config)?;
    let record = desk.triage(text).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("{}", format_triage(&record));
    }
    Ok(())
}

async fn seed(config: &HelpdeskConfig) -> Result<()> {
    let tracker = GithubTracker::new(&config.github.require()?)?;
    let report = seed_labels(&tracker, &label_taxonomy(config.profile)).await;
    for name in &report.created {
        println!("  {} {name}", "created".green());
    }
    for name in &report.updated {
        println!("  {} {name}", "updated".cyan());
    }
    for (name, reason) in &report.failed {
        println!("  {} {name}: {reason}", "failed".red());
    }
    if !report.is_clean() {
        bail!("{} label(s) could not be seeded", report.failed.len());
    }
    Ok(())
}

async fn register_commands(config: &HelpdeskConfig, global: bool) -> Result<()> {
    let settings = config.chat.require()?;
    let guild = if global { None } else { settings.guild_id.as_deref() };
    if guild.is_none() && !global {
        warn!("DISCORD_GUILD_ID not set, registering global commands");
    }
    let count = DiscordApi::new(&settings)
        .register_commands(guild, &command_definitions())
        .await?;
    println!("{} {count} command(s) registered", "✓".green());
    Ok(())
}

async fn subscribe(config: &HelpdeskConfig) -> Result<()> {
    let notification_url = config.mail.require_notification_url()?;
    let graph = GraphClient::new(config.mail.require()?);
    let (subscription, removed) = graph
        .refresh_subscription(&notification_url, &config.mail.client_state)
        .await?;
    if removed > 0 {
        println!("removed {removed} previous subscription(s)");
    }
    println!(
        "{} subscription {} for {} expires {}",
        "✓".green(),
        subscription.id,
        subscription.resource,
        subscription.expiration_date_time
    );
    Ok(())
}
