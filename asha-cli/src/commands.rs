use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::sync::Arc;
use tracing::{info, warn};

use asha_sync::connectivity::spawn_health_probe;
use asha_sync::{
    ConnectivityController, HttpGateway, HydrationOutcome, ReconcileOutcome, ReconcileReport,
    RemoteGateway, SqliteStateStore, SyncConfig, SyncEngine,
};

/// Engine over the configured SQLite file and HTTP API
struct Session {
    engine: Arc<SyncEngine>,
    gateway: Arc<dyn RemoteGateway>,
    store: Arc<SqliteStateStore>,
}

impl Session {
    async fn open(config: SyncConfig) -> Result<Self> {
        let store = Arc::new(
            SqliteStateStore::open(&config.state_db_path)
                .await
                .with_context(|| format!("Failed to open state database {}", config.state_db_path))?,
        );
        let gateway: Arc<dyn RemoteGateway> =
            Arc::new(HttpGateway::new(&config).context("Failed to build API client")?);

        let storage_key = config.storage_key.clone();
        let engine = Arc::new(SyncEngine::new(config, gateway.clone(), store.clone()));
        match engine.hydrate().await {
            Some(HydrationOutcome::Malformed(e)) => {
                eprintln!("{} stored state unreadable, starting empty: {}", "warning:".yellow(), e)
            }
            Some(HydrationOutcome::UnsupportedVersion(v)) => {
                eprintln!(
                    "{} stored state has unknown version {}, starting empty (old record kept as {})",
                    "warning:".yellow(),
                    v,
                    SyncEngine::backup_key(&storage_key, v)
                )
            }
            Some(HydrationOutcome::Unavailable(e)) => {
                anyhow::bail!("State database unavailable: {}", e)
            }
            _ => {}
        }

        Ok(Self {
            engine,
            gateway,
            store,
        })
    }

    async fn close(self) {
        self.store.close().await;
    }
}

fn format_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn flag(value: bool) -> colored::ColoredString {
    if value {
        "yes".green()
    } else {
        "no".red()
    }
}

fn print_reconcile(report: &ReconcileReport) {
    for slice in &report.refreshed {
        println!("  {} {}", "✓".green(), slice);
    }
    for failure in &report.failed {
        println!("  {} {} ({})", "✗".red(), failure.slice, failure.error);
    }
}

pub async fn status(config: SyncConfig) -> Result<()> {
    let session = Session::open(config).await?;
    let status = session.engine.status();

    println!("{}", "ASHA sync status".bold());
    println!("  online:        {}", flag(status.online));
    println!("  hydrated:      {}", flag(status.hydrated));
    if status.read_only {
        println!("  storage:       {}", "read-only".red());
    }
    println!("  authenticated: {}", flag(status.authenticated));
    match &status.current_user {
        Some(user) => println!("  user:          {} ({:?})", user.name, user.role),
        None => println!("  user:          {}", "none".dimmed()),
    }
    println!("  queued:        {}", status.queue_len);
    println!("  dead letters:  {}", status.dead_letters);

    let queue = session.engine.queue();
    if !queue.is_empty() {
        println!();
        println!("{}", "Pending operations".bold());
        for item in &queue {
            println!(
                "  {} {:<20} {:<38} retries={} queued={}",
                item.id.to_string().dimmed(),
                item.kind().to_string().cyan(),
                item.operation.entity_id(),
                item.retry_count,
                format_millis(item.timestamp)
            );
        }
    }

    session.close().await;
    Ok(())
}

pub async fn replay(config: SyncConfig) -> Result<()> {
    let session = Session::open(config).await?;

    if !session.engine.is_online() {
        println!("{} engine is offline, nothing replayed", "!".yellow());
        session.close().await;
        return Ok(());
    }

    let report = session.engine.replay_queue().await;
    println!(
        "Replayed {} item(s): {} confirmed, {} already applied, {} retained, {} dead-lettered",
        report.attempted,
        report.confirmed.to_string().green(),
        report.conflicts,
        report.retained.to_string().yellow(),
        report.dead_lettered.to_string().red()
    );
    if let Some(reconciled) = &report.reconciled {
        println!("Refreshed after replay:");
        print_reconcile(reconciled);
    }

    session.close().await;
    Ok(())
}

pub async fn refresh(config: SyncConfig) -> Result<()> {
    let session = Session::open(config).await?;

    match session.engine.reconcile(true).await {
        ReconcileOutcome::Completed(report) => {
            println!("{}", "Refresh finished".bold());
            print_reconcile(&report);
        }
        ReconcileOutcome::Offline => println!("{} engine is offline, nothing refreshed", "!".yellow()),
        ReconcileOutcome::Busy => println!("{} another refresh is running", "!".yellow()),
    }

    session.close().await;
    Ok(())
}

pub async fn dead_letters(config: SyncConfig, clear: bool) -> Result<()> {
    let session = Session::open(config).await?;
    let letters = if clear {
        session.engine.take_dead_letters().await
    } else {
        session.engine.dead_letters()
    };

    if letters.is_empty() {
        println!("No dead letters");
    }
    for letter in &letters {
        let status = letter
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} {} {} status={} retries={} dropped={}",
            "✗".red(),
            letter.item.kind().to_string().cyan(),
            letter.item.operation.entity_id(),
            status,
            letter.item.retry_count,
            format_millis(letter.dropped_at)
        );
        println!("    {}", letter.reason.dimmed());
    }
    if clear && !letters.is_empty() {
        println!("Cleared {} dead letter(s)", letters.len());
    }

    session.close().await;
    Ok(())
}

pub fn show_config(config: &SyncConfig) -> Result<()> {
    let mut shown = config.clone();
    if shown.auth_token.is_some() {
        shown.auth_token = Some("********".to_string());
    }
    print!("{}", serde_yaml::to_string(&shown).context("Failed to render settings")?);
    Ok(())
}

pub async fn run(config: SyncConfig) -> Result<()> {
    let probe_interval = config.probe_interval();
    let session = Session::open(config).await?;

    let controller = ConnectivityController::new(session.engine.clone()).spawn();
    let probe = spawn_health_probe(
        session.gateway.clone(),
        controller.events(),
        probe_interval,
        session.engine.is_online(),
    );

    info!(probe_secs = probe_interval.as_secs(), "Sync engine running, press Ctrl-C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
    }

    probe.abort();
    controller.shutdown().await;

    let status = session.engine.status();
    info!(queued = status.queue_len, dead_letters = status.dead_letters, "Stopped");
    session.close().await;
    Ok(())
}
