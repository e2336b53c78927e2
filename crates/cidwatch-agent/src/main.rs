//! # cidwatch-agent
//!
//! Binary entry point: loads settings, opens the logs, and either watches the
//! stream forever or runs a one-shot pin or fetch for identifiers given on the
//! command line.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use cidwatch_client::{SessionConfig, Supervisor, WsConnector};
use cidwatch_core::{ActionKind, DispatchOutcome, Identifier};
use cidwatch_dispatch::{
    GatewayFetcher, MessageHandler, PinService, PinataClient, ReqwestGatewayFetcher, gateway_urls,
};
use cidwatch_logging::{EventLog, LogEvent, RawLog};
use cidwatch_settings::CidwatchSettings;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tokio::time::Instant;

/// Stream subscriber that pins and prefetches every identifier it sees.
#[derive(Parser, Debug)]
#[command(name = "cidwatch-agent", about = "Watch a NATS stream and fan out identifiers")]
struct Cli {
    /// Settings file (defaults to `~/.cidwatch/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stream URL, overriding settings and environment.
    #[arg(long)]
    url: Option<String>,

    /// Event log destination; `-` for stdout.
    #[arg(long)]
    event_log: Option<String>,

    /// Diagnostic level when `RUST_LOG` is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit diagnostics as JSON lines.
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Subscribe and dispatch until interrupted (default).
    Watch,
    /// Pin identifiers once; exits non-zero if any pin fails.
    Pin {
        /// Identifiers to pin.
        #[arg(required = true)]
        cids: Vec<String>,
    },
    /// Fetch identifiers from every gateway once and print the outcomes.
    Fetch {
        /// Identifiers to fetch.
        #[arg(required = true)]
        cids: Vec<String>,
    },
}

impl Cli {
    fn load_settings(&self) -> Result<CidwatchSettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(cidwatch_settings::settings_path);
        let mut settings = cidwatch_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        if let Some(url) = &self.url {
            settings.stream.url.clone_from(url);
        }
        if let Some(target) = &self.event_log {
            settings.logging.event_log_path.clone_from(target);
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;
    cidwatch_logging::init_subscriber(&settings.logging.level, cli.log_json);

    let events = EventLog::from_target(&settings.logging.event_log_path).with_context(|| {
        format!(
            "Failed to open event log {}",
            settings.logging.event_log_path
        )
    })?;

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(settings, events).await,
        Command::Pin { cids } => pin_once(&settings, &events, &cids).await,
        Command::Fetch { cids } => fetch_once(&settings, &events, &cids).await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Watch
// ─────────────────────────────────────────────────────────────────────────────

async fn watch(settings: CidwatchSettings, events: EventLog) -> Result<()> {
    let raw = match &settings.logging.raw_log_path {
        Some(path) => RawLog::open(Path::new(path))
            .with_context(|| format!("Failed to open raw log {path}"))?,
        None => RawLog::disabled(),
    };

    events.record(LogEvent::StartupConfig {
        config: startup_summary(&settings),
    });

    let handler = Arc::new(MessageHandler::from_settings(&settings, events.clone(), raw));
    let supervisor = Supervisor::new(
        WsConnector::new(settings.stream.clone()),
        SessionConfig::from_settings(&settings),
        handler,
        events,
        settings.reconnect.clone(),
    );

    tracing::info!(url = %settings.stream.url, "cidwatch watching");
    tokio::select! {
        never = supervisor.run() => match never {},
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
        }
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Effective configuration with secrets reduced to `present`/`absent`.
fn startup_summary(settings: &CidwatchSettings) -> Value {
    let session = SessionConfig::from_settings(settings);
    let subjects: Vec<&str> = settings
        .stream
        .subscriptions
        .iter()
        .map(|s| s.subject.as_str())
        .collect();
    json!({
        "url": settings.stream.url,
        "subjects": subjects,
        "auth": session.connect.auth().kind(),
        "bearer": presence(settings.stream.bearer.as_deref()),
        "pin_endpoint": settings.pin.endpoint,
        "pin_jwt": presence(settings.pin.jwt.as_deref()),
        "pin_timeout_ms": settings.pin.timeout_ms,
        "gateways": settings.gateway.templates,
        "gateway_timeout_ms": settings.gateway.timeout_ms,
        "gateway_max_bytes": settings.gateway.max_bytes,
        "strategy": settings.gateway.strategy,
        "local_gateway": settings.gateway.local_gateway,
        "reconnect_initial_ms": settings.reconnect.initial_delay_ms,
        "reconnect_max_ms": settings.reconnect.max_delay_ms,
        "validation": settings.validation.enabled,
        "raw_log": settings.logging.raw_log_path,
    })
}

fn presence(secret: Option<&str>) -> &'static str {
    if secret.is_some_and(|s| !s.is_empty()) {
        "present"
    } else {
        "absent"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// One-shot commands
// ─────────────────────────────────────────────────────────────────────────────

const CLI_SUBJECT: &str = "cli";

async fn pin_once(settings: &CidwatchSettings, events: &EventLog, cids: &[String]) -> Result<()> {
    let Some(jwt) = settings.pin.jwt.as_deref() else {
        bail!("No pin credential configured (set PINATA_JWT)");
    };
    let client = PinataClient::new(settings.pin.endpoint.clone());
    let timeout = Duration::from_millis(settings.pin.timeout_ms);

    let mut failed = 0usize;
    for cid in cids.iter().map(Identifier::new) {
        let started = Instant::now();
        let response = client.pin(&cid, jwt, timeout).await;
        let outcome = DispatchOutcome::new(
            ActionKind::Pin,
            cid,
            client.endpoint(),
            response.status,
            elapsed_ms(started),
        )
        .with_subject(CLI_SUBJECT)
        .with_error(response.error)
        .with_response(response.body);
        if !outcome.ok {
            failed += 1;
        }
        print_outcome(&outcome)?;
        events.record(LogEvent::Dispatch(outcome));
    }

    if failed > 0 {
        bail!("{failed} of {} pins failed", cids.len());
    }
    Ok(())
}

async fn fetch_once(settings: &CidwatchSettings, events: &EventLog, cids: &[String]) -> Result<()> {
    let fetcher = ReqwestGatewayFetcher::new(settings.gateway.max_bytes);
    let timeout = Duration::from_millis(settings.gateway.timeout_ms);

    let attempts = cids.iter().map(Identifier::new).flat_map(|cid| {
        gateway_urls(&settings.gateway.templates, &cid)
            .into_iter()
            .map(move |url| (cid.clone(), url))
    });
    let outcomes = futures::future::join_all(attempts.map(|(cid, url)| {
        let fetcher = &fetcher;
        async move {
            let started = Instant::now();
            let response = fetcher.fetch(&url, timeout).await;
            DispatchOutcome::new(
                ActionKind::GatewayFetch,
                cid,
                url,
                response.status,
                elapsed_ms(started),
            )
            .with_subject(CLI_SUBJECT)
            .with_size(response.size_bytes)
            .with_error(response.error)
        }
    }))
    .await;

    for outcome in outcomes {
        print_outcome(&outcome)?;
        events.record(LogEvent::Dispatch(outcome));
    }
    Ok(())
}

fn print_outcome(outcome: &DispatchOutcome) -> Result<()> {
    let line = serde_json::to_string(outcome).context("Failed to serialize outcome")?;
    println!("{line}");
    Ok(())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
