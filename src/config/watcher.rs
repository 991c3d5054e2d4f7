//! Hot reload of resilience policies from the configuration file.
//!
//! # Data Flow
//! ```text
//! notify event (modify / create)
//!     → load_config (parse + validate)
//!     → channel
//!     → PolicyReloader → PolicyRegistry::reload (diffed by policy name)
//! ```
//!
//! A file that fails to load or validate is logged and skipped; the
//! registry keeps serving the last good policy set.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::loader::load_config;
use crate::config::schema::CoreConfig;
use crate::resilience::PolicyRegistry;

/// What a single file-system event led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Not a content change.
    Ignored,
    /// A validated config was sent for reload.
    Published,
    /// The file could not be loaded or failed validation.
    Rejected,
}

/// Watches the configuration file and publishes validated configs.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<CoreConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<CoreConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                handle_event(&path, res, &tx);
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn handle_event(
    path: &Path,
    res: notify::Result<Event>,
    tx: &mpsc::UnboundedSender<CoreConfig>,
) -> ReloadOutcome {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = ?e, "Config watch error");
            return ReloadOutcome::Ignored;
        }
    };
    if !(event.kind.is_modify() || event.kind.is_create()) {
        return ReloadOutcome::Ignored;
    }

    match load_config(path) {
        Ok(config) => {
            tracing::info!(path = ?path, policies = config.policies.len(), "Config change detected");
            if tx.send(config).is_err() {
                tracing::warn!("Policy reloader has stopped; change dropped");
            }
            ReloadOutcome::Published
        }
        Err(e) => {
            tracing::error!(path = ?path, error = %e, "Config reload rejected, keeping current policies");
            ReloadOutcome::Rejected
        }
    }
}

/// Apply every published config to `registry` until the sender is dropped.
pub fn spawn_policy_reloader(
    registry: Arc<PolicyRegistry>,
    mut updates: mpsc::UnboundedReceiver<CoreConfig>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(config) = updates.recv().await {
            registry.reload(&config.policies);
        }
        tracing::debug!("Policy reloader stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitState;
    use notify::event::{AccessKind, DataChange, EventKind, ModifyKind};

    fn temp_config(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("booking-core-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn modified() -> notify::Result<Event> {
        Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))))
    }

    #[test]
    fn test_valid_change_is_published() {
        let path = temp_config(
            r#"
            [[policies]]
            name = "roomService"
            bulkhead_max_concurrent = 4
            "#,
        );
        let (watcher, mut rx) = ConfigWatcher::new(&path);

        assert_eq!(handle_event(&path, modified(), &watcher.update_tx), ReloadOutcome::Published);
        let config = rx.try_recv().unwrap();
        assert_eq!(config.policies[0].bulkhead_max_concurrent, 4);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_invalid_change_is_rejected() {
        let path = temp_config(
            r#"
            [[policies]]
            name = "roomService"
            sliding_window_size = 0
            "#,
        );
        let (watcher, mut rx) = ConfigWatcher::new(&path);

        assert_eq!(handle_event(&path, modified(), &watcher.update_tx), ReloadOutcome::Rejected);
        assert!(rx.try_recv().is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_access_events_are_ignored() {
        let path = PathBuf::from("/nonexistent/booking-core.toml");
        let (watcher, mut rx) = ConfigWatcher::new(&path);
        let event = Ok(Event::new(EventKind::Access(AccessKind::Any)));

        assert_eq!(handle_event(&path, event, &watcher.update_tx), ReloadOutcome::Ignored);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reloader_preserves_unchanged_breakers() {
        let mut rooms = crate::config::PolicyConfig::named("roomService");
        rooms.sliding_window_size = 1;
        rooms.minimum_calls = 1;
        let registry = Arc::new(PolicyRegistry::from_configs(&[rooms.clone()]));
        registry
            .get("roomService")
            .unwrap()
            .circuit_breaker
            .try_acquire()
            .unwrap()
            .record_failure();

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_policy_reloader(registry.clone(), rx);
        tx.send(CoreConfig {
            policies: vec![rooms, crate::config::PolicyConfig::named("userService")],
            ..CoreConfig::default()
        })
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(registry.snapshot("roomService").unwrap().circuit_state, CircuitState::Open);
        assert!(registry.contains("userService"));
    }
}
