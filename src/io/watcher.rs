use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::io::config_io::CONFIG_FILE;

/// Watches a vault for changes to notes and to the config file.
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<Vec<PathBuf>>,
}

impl VaultWatcher {
    pub fn start(root: &Path) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let root_owned = root.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(error = %e, "watch error");
                        return;
                    }
                };
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    return;
                }

                let relevant: Vec<PathBuf> = event
                    .paths
                    .into_iter()
                    .filter(|p| is_relevant(&root_owned, p))
                    .collect();
                if !relevant.is_empty() {
                    let _ = tx.send(relevant);
                }
            },
            Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok(VaultWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Non-blocking: every changed path queued so far.
    pub fn poll(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        while let Ok(batch) = self.rx.try_recv() {
            paths.extend(batch);
        }
        paths.sort();
        paths.dedup();
        paths
    }

    /// Block up to `timeout` for the first change, then drain the rest.
    pub fn wait(&self, timeout: Duration) -> Vec<PathBuf> {
        match self.rx.recv_timeout(timeout) {
            Ok(mut paths) => {
                paths.extend(self.poll());
                paths.sort();
                paths.dedup();
                paths
            }
            Err(_) => Vec::new(),
        }
    }
}

/// Markdown notes and the config file count; hidden directories do not.
fn is_relevant(root: &Path, path: &Path) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    if rel == Path::new(CONFIG_FILE) {
        return true;
    }
    let hidden = rel
        .components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'));
    !hidden && path.extension().and_then(|e| e.to_str()) == Some("md")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevance_filter() {
        let root = Path::new("/vault");
        assert!(is_relevant(root, Path::new("/vault/day.md")));
        assert!(is_relevant(root, Path::new("/vault/journal/2024-01-01.md")));
        assert!(is_relevant(root, Path::new("/vault/.dayplan.toml")));
        assert!(!is_relevant(root, Path::new("/vault/.dayplan-state.json")));
        assert!(!is_relevant(root, Path::new("/vault/.obsidian/cache.md")));
        assert!(!is_relevant(root, Path::new("/vault/image.png")));
        assert!(!is_relevant(root, Path::new("/elsewhere/day.md")));
    }
}
