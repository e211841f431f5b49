//! # CLI Command Implementations

use crate::config::Settings;
use crate::daemon::{self, DaemonStatus, DaemonSupervisor, StopOutcome};
use egregore_core::{BackendKind, EgregoreError, GraphSnapshot, GraphStore, StorageBackend};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// DAEMON COMMANDS
// =============================================================================

/// Run the server attached to this process.
pub async fn cmd_serve(settings: &Settings) -> Result<(), EgregoreError> {
    println!("Egregore {} starting", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Configuration:");
    println!("  Instance: {}", settings.instance);
    println!("  Address:  {}", settings.server.addr());
    println!("  Backend:  {}", settings.storage.backend);
    println!("  Database: {}", settings.storage.database.display());
    println!("  Index:    {:?}", settings.index.kind);
    println!();
    println!("Tools:");
    println!("  POST /tools/recall       - Semantic recall");
    println!("  POST /tools/store        - Store a memory (graph + index)");
    println!("  GET  /tools/health_check - Probe both stores");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    daemon::serve(settings).await
}

/// Start the daemon in the background.
pub async fn cmd_start(settings: &Settings, config: Option<&Path>) -> Result<(), EgregoreError> {
    let supervisor = DaemonSupervisor::new(&settings.daemon);
    let pid = supervisor.start(config).await?;

    println!("Egregore started (PID {})", pid);
    println!("  URL:  {}", settings.server.url());
    println!("  Logs: {}", settings.daemon.log_file.display());
    Ok(())
}

/// Stop the daemon.
pub async fn cmd_stop(settings: &Settings) -> Result<(), EgregoreError> {
    let supervisor = DaemonSupervisor::new(&settings.daemon);
    match supervisor.stop().await? {
        StopOutcome::NotRunning => println!("Egregore is not running"),
        StopOutcome::Stopped { pid, forced: false } => println!("Egregore stopped (PID {})", pid),
        StopOutcome::Stopped { pid, forced: true } => {
            println!("Egregore killed after grace period (PID {})", pid);
        }
    }
    Ok(())
}

/// Stop, then start.
pub async fn cmd_restart(settings: &Settings, config: Option<&Path>) -> Result<(), EgregoreError> {
    let supervisor = DaemonSupervisor::new(&settings.daemon);
    let pid = supervisor.restart(config).await?;
    println!("Egregore restarted (PID {})", pid);
    println!("  URL:  {}", settings.server.url());
    Ok(())
}

/// Show daemon status.
pub fn cmd_status(settings: &Settings, json_mode: bool) -> Result<(), EgregoreError> {
    let status = DaemonSupervisor::new(&settings.daemon).status()?;
    let pid = match status {
        DaemonStatus::Running { pid } => pid,
        DaemonStatus::Stopped => None,
    };
    let running = status != DaemonStatus::Stopped;

    if json_mode {
        print_json(&serde_json::json!({
            "instance": settings.instance,
            "state": status.state().as_str(),
            "pid": pid,
            "url": running.then(|| settings.server.url()),
        }));
        return Ok(());
    }

    match (running, pid) {
        (true, Some(pid)) => println!(
            "Egregore is RUNNING (PID {}) at {}",
            pid,
            settings.server.url()
        ),
        (true, None) => println!(
            "Egregore is RUNNING (PID not yet recorded) at {}",
            settings.server.url()
        ),
        (false, _) => println!("Egregore is STOPPED"),
    }
    Ok(())
}

/// Show or follow the daemon log.
pub async fn cmd_logs(settings: &Settings, follow: bool, lines: usize) -> Result<(), EgregoreError> {
    let path = &settings.daemon.log_file;
    if !path.exists() {
        println!("No log file at {}", path.display());
        if !follow {
            return Ok(());
        }
    }

    if follow {
        let stop = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };
        return daemon::follow(path, lines, &mut std::io::stdout(), stop).await;
    }

    for line in daemon::tail(path, lines)? {
        println!("{}", line);
    }
    Ok(())
}

// =============================================================================
// STATS COMMAND
// =============================================================================

/// Graph statistics as printed by `stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsView {
    pub nodes: usize,
    pub edges: usize,
    pub relation_types: usize,
    pub density: f64,
}

impl From<GraphSnapshot> for StatsView {
    fn from(snapshot: GraphSnapshot) -> Self {
        Self {
            nodes: snapshot.nodes,
            edges: snapshot.edges,
            relation_types: snapshot.relation_types,
            density: snapshot.display_density(),
        }
    }
}

/// Read statistics straight from the database.
///
/// The database file is exclusively open while the daemon runs, so in that
/// case the numbers come from its `/stats` endpoint instead.
pub async fn cmd_stats(settings: &Settings, json_mode: bool) -> Result<(), EgregoreError> {
    let running = DaemonSupervisor::new(&settings.daemon).status()? != DaemonStatus::Stopped;
    let stats = if running {
        fetch_stats(settings).await?
    } else {
        read_stats(settings)?
    };

    if json_mode {
        print_json(&serde_json::json!(stats));
        return Ok(());
    }

    println!("Egregore Graph Statistics");
    println!("=========================");
    println!("Memories:           {}", stats.nodes);
    println!("Relationships:      {}", stats.edges);
    println!("Relationship types: {}", stats.relation_types);
    println!("Density:            {:.4}", stats.density);
    Ok(())
}

/// Statistics from a database that no daemon has open.
///
/// A database file that does not exist yet reads as an empty graph and is
/// not created.
pub fn read_stats(settings: &Settings) -> Result<StatsView, EgregoreError> {
    let database = &settings.storage.database;
    if settings.storage.backend == BackendKind::Redb && !database.exists() {
        tracing::debug!(database = %database.display(), "no database yet, reporting an empty graph");
        return Ok(GraphSnapshot {
            nodes: 0,
            edges: 0,
            relation_types: 0,
            density: egregore_core::density(0, 0),
        }
        .into());
    }
    let backend = StorageBackend::open(settings.storage.backend, &settings.storage.database)?;
    let store: &dyn GraphStore = &backend;
    Ok(GraphSnapshot::collect(store)?.into())
}

async fn fetch_stats(settings: &Settings) -> Result<StatsView, EgregoreError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(settings.storage.timeout_ms))
        .build()
        .map_err(|e| EgregoreError::IoError(format!("HTTP client: {}", e)))?;

    let mut request = client.get(format!("{}/stats", settings.server.url()));
    if let Some(key) = settings.http.api_key.as_deref().filter(|k| !k.is_empty()) {
        request = request.bearer_auth(key);
    }

    let response = request
        .send()
        .await
        .map_err(|e| EgregoreError::StoreUnavailable(format!("daemon unreachable: {}", e)))?;
    if !response.status().is_success() {
        return Err(EgregoreError::StoreUnavailable(format!(
            "daemon answered /stats with {}",
            response.status()
        )));
    }
    response
        .json::<StatsView>()
        .await
        .map_err(|e| EgregoreError::SerializationError(format!("Invalid /stats body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use egregore_core::{Metadata, RelationType, Relationship};
    use tempfile::TempDir;

    #[test]
    fn stats_read_from_closed_database() {
        let dir = TempDir::new().expect("tempdir");
        let mut settings = Settings::default();
        settings.storage.backend = BackendKind::Redb;
        settings.storage.database = dir.path().join("egregore.redb");

        {
            let mut backend =
                StorageBackend::open(BackendKind::Redb, &settings.storage.database).expect("open");
            let a = backend
                .create_node("fix CORS bug", Metadata::new())
                .expect("a");
            let b = backend
                .create_node("use explicit origins", Metadata::new())
                .expect("b");
            backend
                .create_relationship(Relationship::new(a, b, RelationType::new("FIXES")))
                .expect("relate");
        }

        let stats = read_stats(&settings).expect("stats");
        assert_eq!(
            stats,
            StatsView {
                nodes: 2,
                edges: 1,
                relation_types: 1,
                density: 0.5,
            }
        );
    }

    #[test]
    fn stats_without_database_leave_no_file_behind() {
        let dir = TempDir::new().expect("tempdir");
        let mut settings = Settings::default();
        settings.storage.backend = BackendKind::Redb;
        settings.storage.database = dir.path().join("never-created.redb");

        let stats = read_stats(&settings).expect("stats");
        assert_eq!(
            stats,
            StatsView {
                nodes: 0,
                edges: 0,
                relation_types: 0,
                density: 0.0,
            }
        );
        assert!(!settings.storage.database.exists());
    }

    #[test]
    fn view_rounds_density() {
        let view = StatsView::from(GraphSnapshot {
            nodes: 3,
            edges: 2,
            relation_types: 1,
            density: egregore_core::density(3, 2),
        });
        assert_eq!(view.density, 0.3333);
    }
}
