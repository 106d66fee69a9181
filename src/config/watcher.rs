//! Hot reload of the API table.
//!
//! # Data Flow
//! ```text
//! file event (modify/create) → load_config → validated GatewayConfig
//!     → mpsc channel → HttpServer reload loop → ApiRouter rebuilt and swapped
//! ```
//!
//! A file that fails to parse or validate is logged and dropped; the gateway
//! keeps dispatching with the API table it already has.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GatewayConfig;

/// Watches the gateway configuration file and publishes every valid revision.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiver the reload loop consumes.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, update_tx } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_reload_trigger(&event.kind) => {
                    publish_revision(&path, &update_tx);
                }
                Ok(event) => {
                    tracing::trace!(path = %path.display(), kind = ?event.kind, "Ignoring config file event");
                }
                Err(e) => tracing::error!(path = %path.display(), error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&watched, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %watched.display(), "Watching API configuration");
        Ok(watcher)
    }
}

fn is_reload_trigger(kind: &EventKind) -> bool {
    kind.is_modify() || kind.is_create()
}

/// Load the file and hand a valid revision to the reload loop.
/// Returns whether a revision was published.
fn publish_revision(path: &Path, tx: &mpsc::UnboundedSender<GatewayConfig>) -> bool {
    let config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "Rejected API configuration, keeping current API table"
            );
            return false;
        }
    };

    let apis: Vec<&str> = config.apis.iter().map(|api| api.name.as_str()).collect();
    let endpoint_count: usize = config.apis.iter().map(|api| api.endpoints.len()).sum();
    tracing::info!(
        path = %path.display(),
        api_count = apis.len(),
        endpoint_count,
        apis = %apis.join(","),
        "API configuration changed"
    );

    if tx.send(config).is_err() {
        tracing::warn!(path = %path.display(), "Reload loop has stopped, configuration change dropped");
        return false;
    }
    true
}
