//! Writing emitted artifacts below the output root

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use kiln_compiler::output_path_for;
use kiln_core::{EmittedArtifact, PathError, resolve_within};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    PathOutsideRoot(#[from] PathError),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WriteError {
    /// Failures that may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WriteError::Io { .. })
    }
}

/// An artifact that could not be written.
#[derive(Debug)]
pub struct WriteFailure {
    pub source: PathBuf,
    pub error: WriteError,
}

#[derive(Debug, Default)]
pub struct WriteOutcome {
    /// Absolute output paths, in artifact order.
    pub written: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    pub failures: Vec<WriteFailure>,
}

impl WriteOutcome {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    out_root: PathBuf,
    root_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(out_root: impl Into<PathBuf>, root_dir: impl Into<PathBuf>) -> Self {
        ArtifactWriter {
            out_root: out_root.into(),
            root_dir: root_dir.into(),
        }
    }

    pub fn out_root(&self) -> &Path {
        &self.out_root
    }

    async fn write_one(&self, artifact: &EmittedArtifact) -> Result<PathBuf, WriteError> {
        let path = resolve_within(&self.out_root, &artifact.out_rel_path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| WriteError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&path, artifact.text.as_bytes())
            .await
            .map_err(|source| WriteError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Write every artifact. A failure does not stop the others.
    pub async fn write_all(&self, artifacts: &[EmittedArtifact]) -> WriteOutcome {
        let mut outcome = WriteOutcome::default();
        for artifact in artifacts {
            match self.write_one(artifact).await {
                Ok(path) => {
                    tracing::debug!("Wrote {}", path.display());
                    outcome.written.push(path);
                }
                Err(error) => {
                    tracing::error!("{}", error);
                    outcome.failures.push(WriteFailure {
                        source: artifact.source.clone(),
                        error,
                    });
                }
            }
        }
        outcome
    }

    /// Delete the outputs of sources that left the program.
    pub async fn remove_outputs(&self, sources: &BTreeSet<PathBuf>, outcome: &mut WriteOutcome) {
        for source in sources {
            let Some(relative) = output_path_for(&self.root_dir, source) else {
                continue;
            };
            let path = match resolve_within(&self.out_root, &relative) {
                Ok(path) => path,
                Err(e) => {
                    tracing::debug!("Not removing output of {}: {}", source.display(), e);
                    continue;
                }
            };
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!("Removed {}", path.display());
                    outcome.deleted.push(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source_err) => outcome.failures.push(WriteFailure {
                    source: source.clone(),
                    error: WriteError::Io {
                        path,
                        source: source_err,
                    },
                }),
            }
        }
    }

    /// Remove the output root entirely.
    pub async fn clean(&self) -> Result<(), WriteError> {
        match tokio::fs::remove_dir_all(&self.out_root).await {
            Ok(()) => {
                tracing::info!("Cleaned {}", self.out_root.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(WriteError::Io {
                path: self.out_root.clone(),
                source,
            }),
        }
    }
}
