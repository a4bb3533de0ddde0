use crate::error::{EngineError, Result};
use crate::render::Artifact;
use crate::report::FailedArtifact;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Writes artifacts under a tree root, recording each outcome independently
pub struct ArtifactWriter {
    root: PathBuf,
    written: Vec<String>,
    failed: Vec<FailedArtifact>,
}

impl ArtifactWriter {
    /// Create the destination directory before anything is written
    pub fn create(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| EngineError::io(root, e))?;
        Ok(Self {
            root: root.to_path_buf(),
            written: Vec::new(),
            failed: Vec::new(),
        })
    }

    /// Write one artifact; a failure is recorded and does not stop later writes
    pub fn write(&mut self, artifact: &Artifact) -> bool {
        match self.try_write(&artifact.path, &artifact.contents) {
            Ok(()) => {
                log::debug!("Wrote {}", artifact.path);
                self.written.push(artifact.path.clone());
                true
            }
            Err(err) => {
                log::error!("Failed to write {}: {err}", artifact.path);
                self.failed.push(FailedArtifact {
                    path: artifact.path.clone(),
                    error: err.to_string(),
                });
                false
            }
        }
    }

    pub fn record_failure(&mut self, path: impl Into<String>, error: impl Into<String>) {
        self.failed.push(FailedArtifact {
            path: path.into(),
            error: error.into(),
        });
    }

    fn try_write(&self, relative: &str, contents: &str) -> std::io::Result<()> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        if !path.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "file missing after write",
            ));
        }
        Ok(())
    }

    /// Delete files a previous run created that this run no longer produces.
    ///
    /// Directories left empty are removed too. Returns the deleted paths.
    pub fn remove_stale(&self, previous: &[String], current: &HashSet<&str>) -> Vec<String> {
        let mut removed = Vec::new();
        for relative in previous {
            if current.contains(relative.as_str()) || !is_tree_relative(relative) {
                continue;
            }
            let path = self.root.join(relative);
            if !path.is_file() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    log::info!("Removed stale artifact {relative}");
                    removed.push(relative.clone());
                    if let Some(parent) = path.parent().filter(|p| *p != self.root) {
                        prune_empty_dir(parent);
                    }
                }
                Err(err) => log::warn!("Could not remove stale artifact {relative}: {err}"),
            }
        }
        removed
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn into_outcome(self) -> (Vec<String>, Vec<FailedArtifact>) {
        (self.written, self.failed)
    }
}

fn is_tree_relative(relative: &str) -> bool {
    let path = Path::new(relative);
    !relative.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none())
}

/// Remove `dir` if it is empty; returns whether it was removed
fn prune_empty_dir(dir: &Path) -> bool {
    if !is_empty_dir(dir) {
        return false;
    }
    match std::fs::remove_dir(dir) {
        Ok(()) => true,
        Err(err) => {
            log::debug!("Keeping directory {}: {err}", dir.display());
            false
        }
    }
}
