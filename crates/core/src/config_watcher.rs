use crate::config::AppConfig;
use crate::config_loader::ConfigLoader;
use anyhow::Result;
use notify::{Event, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

type Overrides = Box<dyn Fn(AppConfig) -> Result<AppConfig> + Send + Sync>;

/// Republishes the configuration whenever its file changes on disk.
pub struct ConfigWatcher {
    tx: watch::Sender<AppConfig>,
    path: PathBuf,
    overrides: Option<Overrides>,
}

impl ConfigWatcher {
    /// Creates a watcher for `path` seeded with an already-loaded configuration.
    ///
    /// Returns the watcher and a receiver that observes every successful reload.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, initial: AppConfig) -> (Self, watch::Receiver<AppConfig>) {
        let (tx, rx) = watch::channel(initial);
        (
            Self {
                tx,
                path: path.into(),
                overrides: None,
            },
            rx,
        )
    }

    /// Re-applies `overrides` (e.g. command-line flags) to every reloaded
    /// file before it is published.
    #[must_use]
    pub fn with_overrides<F>(mut self, overrides: F) -> Self
    where
        F: Fn(AppConfig) -> Result<AppConfig> + Send + Sync + 'static,
    {
        self.overrides = Some(Box::new(overrides));
        self
    }

    /// Reloads the file once and publishes the result if it parses.
    ///
    /// An invalid file keeps the previous configuration in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or validated, or if the
    /// overrides reject it.
    pub fn reload(&self) -> Result<()> {
        let mut config = ConfigLoader::load(&self.path)?;
        if let Some(overrides) = &self.overrides {
            config = overrides(config)?;
        }
        self.tx.send_replace(config);
        Ok(())
    }

    /// Blocks a worker thread watching the file until the receivers are gone.
    ///
    /// # Errors
    ///
    /// Returns an error if file watching cannot be initiated or if the watcher task fails.
    pub async fn watch(self) -> Result<()> {
        tokio::task::spawn_blocking(move || {
            let (notify_tx, notify_rx) = std::sync::mpsc::channel();

            let mut watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            })?;

            watcher.watch(Path::new(&self.path), RecursiveMode::NonRecursive)?;

            for event in notify_rx {
                if self.tx.is_closed() {
                    break;
                }
                if event.kind.is_modify() {
                    tracing::info!(path = %self.path.display(), "Config file changed, reloading");
                    match self.reload() {
                        Ok(()) => tracing::info!("Config reloaded successfully"),
                        Err(e) => tracing::error!(error = %e, "Failed to reload config"),
                    }
                }
            }

            Ok::<_, anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}
