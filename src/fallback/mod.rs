//! Last-mile fallback for applications the catalog has no recipe for.
//!
//! Two collaborators sit behind traits: a [`DownloadUrlFinder`] that locates
//! a direct download for the application, and a [`RecipeAuthor`] that turns
//! that download into new recipe files. [`LastMileProcessor`] runs them for
//! every `not_found` outcome and attaches a [`FallbackRecord`]; the outcome's
//! status is never changed.

mod discovery;
mod recipe_robot;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::recipe::{FallbackRecord, ResolutionOutcome, ResolutionStatus};

pub use discovery::{CommandDownloadFinder, NO_DIRECT_DOWNLOAD, classify_download_url};
pub use recipe_robot::{DEFAULT_AUTHOR_TIMEOUT, RecipeRobotAuthor, RobotOutput};

/// Default identifier prefix for recipes authored by the fallback.
pub const DEFAULT_LAST_MILE_PREFIX: &str = "com.github.anywhereops.anywhereops-recipes";

/// Pause between applications handled by the fallback.
pub const DEFAULT_FALLBACK_DELAY: Duration = Duration::from_secs(2);

/// Errors raised by fallback collaborators.
#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    /// The external program could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The external program did not finish in time.
    #[error("{program} timed out after {seconds}s")]
    Timeout {
        /// Program that was killed.
        program: PathBuf,
        /// Limit that was exceeded.
        seconds: u64,
    },

    /// The external program exited unsuccessfully.
    #[error("{program} failed: {detail}")]
    Failed {
        /// Program that failed.
        program: PathBuf,
        /// Stderr output, or the exit status when stderr was empty.
        detail: String,
    },

    /// Moving authored files into the output tree failed.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl FallbackError {
    pub(crate) fn spawn(program: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    pub(crate) fn timeout(program: impl Into<PathBuf>, limit: Duration) -> Self {
        Self::Timeout {
            program: program.into(),
            seconds: limit.as_secs(),
        }
    }

    pub(crate) fn failed(program: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Failed {
            program: program.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result of looking for a direct download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadDiscovery {
    /// A direct download URL was located.
    pub found: bool,
    /// The download URL when found.
    pub url: Option<String>,
    /// `pkg`, `dmg`, `zip` or `unknown`.
    pub download_type: Option<String>,
}

impl DownloadDiscovery {
    /// No usable download.
    #[must_use]
    pub fn not_found() -> Self {
        Self::default()
    }

    /// A direct download at `url`, typed from its extension.
    #[must_use]
    pub fn found(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            found: true,
            download_type: Some(classify_download_url(&url).to_string()),
            url: Some(url),
        }
    }
}

/// Result of authoring recipes from a download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthoringResult {
    /// The authoring tool completed without error.
    pub success: bool,
    /// Produced files, relative to the output root.
    pub produced_files: Vec<String>,
    /// Failure description when `success` is false.
    pub error: Option<String>,
    /// Files left in place because a different file already existed.
    pub notes: Vec<String>,
}

/// Locates a direct download URL for an application.
#[async_trait]
pub trait DownloadUrlFinder: Send + Sync {
    async fn find_download_url(
        &self,
        application: &str,
    ) -> Result<DownloadDiscovery, FallbackError>;
}

/// Authors recipes for an application from a download URL.
#[async_trait]
pub trait RecipeAuthor: Send + Sync {
    async fn create_from_download(
        &self,
        application: &str,
        url: &str,
    ) -> Result<AuthoringResult, FallbackError>;
}

/// Runs discovery and authoring for `not_found` outcomes.
pub struct LastMileProcessor {
    finder: Arc<dyn DownloadUrlFinder>,
    author: Arc<dyn RecipeAuthor>,
    delay: Duration,
}

impl std::fmt::Debug for LastMileProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LastMileProcessor")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl LastMileProcessor {
    #[must_use]
    pub fn new(finder: Arc<dyn DownloadUrlFinder>, author: Arc<dyn RecipeAuthor>) -> Self {
        Self {
            finder,
            author,
            delay: DEFAULT_FALLBACK_DELAY,
        }
    }

    /// Overrides the pause between applications.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Attaches a fallback record to every `not_found` outcome.
    ///
    /// Returns how many applications were processed. `stop` is checked
    /// before each application.
    pub async fn apply(&self, outcomes: &mut [ResolutionOutcome], stop: &AtomicBool) -> usize {
        let pending: Vec<usize> = outcomes
            .iter()
            .enumerate()
            .filter(|(_, outcome)| outcome.status == ResolutionStatus::NotFound)
            .map(|(index, _)| index)
            .collect();
        if pending.is_empty() {
            return 0;
        }
        info!(count = pending.len(), "running last-mile fallback");

        let mut processed = 0;
        for (position, index) in pending.into_iter().enumerate() {
            if stop.load(Ordering::SeqCst) {
                warn!(processed, "stop requested, ending last-mile fallback");
                break;
            }
            if position > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let outcome = &mut outcomes[index];
            let (record, notes) = self.process(&outcome.application).await;
            outcome.notes.extend(notes);
            outcome.fallback = Some(record);
            processed += 1;
        }
        processed
    }

    #[instrument(skip(self))]
    async fn process(&self, application: &str) -> (FallbackRecord, Vec<String>) {
        let mut record = FallbackRecord {
            attempted: true,
            ..FallbackRecord::default()
        };

        let discovery = match self.finder.find_download_url(application).await {
            Ok(discovery) => discovery,
            Err(err) => {
                warn!(application, error = %err, "download discovery failed");
                record.error = Some(err.to_string());
                return (record, Vec::new());
            }
        };
        let Some(url) = discovery.url.filter(|_| discovery.found) else {
            info!(application, "no direct download found");
            record.error = Some("No direct download URL found".to_string());
            return (record, Vec::new());
        };
        info!(
            application,
            url = %url,
            download_type = ?discovery.download_type,
            "direct download found"
        );
        record.download_url = Some(url.clone());
        record.download_type = discovery.download_type;

        let mut notes = Vec::new();
        match self.author.create_from_download(application, &url).await {
            Ok(result) => {
                record.success = result.success;
                record.produced_files = result.produced_files;
                record.error = result.error;
                notes = result.notes;
                if record.success {
                    info!(
                        application,
                        files = record.produced_files.len(),
                        "fallback recipes created"
                    );
                } else {
                    warn!(application, error = ?record.error, "recipe authoring failed");
                }
            }
            Err(err) => {
                warn!(application, error = %err, "recipe authoring failed");
                record.error = Some(err.to_string());
            }
        }
        (record, notes)
    }
}
