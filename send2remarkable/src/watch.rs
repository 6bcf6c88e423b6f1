//! Change watcher: re-run the sync whenever the bibliography is modified.
//!
//! The parent directory is watched non-recursively and events are filtered to
//! modifications of the one target path. Each match runs the pipeline as a
//! fresh `sync` subprocess. The handler blocks `notify`'s event thread until
//! the child exits, so changes made meanwhile are not queued.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{error, info};

/// True when `event` is a modification of `target`.
pub fn is_target_modification(event: &Event, target: &Path) -> bool {
    matches!(event.kind, EventKind::Modify(_)) && event.paths.iter().any(|p| p == target)
}

/// Runs one pipeline invocation as a child process.
#[derive(Debug, Clone)]
pub struct SubprocessTrigger {
    program: PathBuf,
    args: Vec<OsString>,
}

impl SubprocessTrigger {
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `<this executable> sync --config <config_path>`
    pub fn resync(config_path: &Path) -> Result<Self> {
        let program = std::env::current_exe().context("Cannot determine own executable")?;
        Ok(Self::new(
            program,
            vec![
                OsString::from("sync"),
                OsString::from("--config"),
                config_path.as_os_str().to_os_string(),
            ],
        ))
    }

    /// Runs the child to completion. Returns whether it exited successfully.
    pub fn run(&self) -> bool {
        match Command::new(&self.program).args(&self.args).status() {
            Ok(status) if status.success() => {
                info!("Script finished successfully");
                true
            }
            Ok(status) => {
                error!(code = ?status.code(), "Error running script");
                false
            }
            Err(e) => {
                error!(program = %self.program.display(), error = %e, "Failed to launch script");
                false
            }
        }
    }
}

/// Watches a single file through its parent directory.
#[derive(Debug, Clone)]
pub struct ChangeWatcher {
    target: PathBuf,
    watch_dir: PathBuf,
}

impl ChangeWatcher {
    pub fn new(target: &Path) -> Result<Self> {
        let file_name = target
            .file_name()
            .with_context(|| format!("{target:?} does not name a file"))?;
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        // Events carry canonical paths on some platforms.
        let watch_dir = parent
            .canonicalize()
            .with_context(|| format!("Cannot watch directory {parent:?}"))?;
        Ok(Self {
            target: watch_dir.join(file_name),
            watch_dir,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Starts watching; `on_change` runs on the event thread for each match.
    /// Dropping the returned watcher stops it.
    pub fn start<F>(&self, mut on_change: F) -> Result<RecommendedWatcher>
    where
        F: FnMut() + Send + 'static,
    {
        let target = self.target.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_target_modification(&event, &target) => {
                info!(path = %target.display(), "Detected change, running script");
                on_change();
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "Watch error"),
        })?;
        watcher.watch(&self.watch_dir, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }
}

/// Watches the configured bibliography until Ctrl-C.
pub async fn watch(config_path: &Path, bibliography: &Path) -> Result<()> {
    let config_path = config_path
        .canonicalize()
        .with_context(|| format!("Cannot resolve config path {config_path:?}"))?;
    let watcher = ChangeWatcher::new(bibliography)?;
    let trigger = SubprocessTrigger::resync(&config_path)?;

    let _guard = watcher.start(move || {
        trigger.run();
    })?;
    info!(path = %watcher.target().display(), "Watching for changes. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Interrupted, stopping watcher");
    Ok(())
}
