//! Recipe authoring through the Recipe Robot command-line tool.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::{AuthoringResult, FallbackError, RecipeAuthor};
use crate::layout::path_component;

/// Upper bound on one authoring run.
pub const DEFAULT_AUTHOR_TIMEOUT: Duration = Duration::from_secs(120);

#[allow(clippy::expect_used)]
static CREATED_RECIPE: LazyLock<Regex> = LazyLock::new(|| {
    // Static pattern, safe to panic
    Regex::new(r"Created recipe: (.+\.recipe\S*)").expect("valid created-recipe regex")
});

/// What one tool run reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotOutput {
    /// Exit status was zero and stderr carried no error marker.
    pub success: bool,
    /// Recipe paths the tool says it created, in output order.
    pub created: Vec<PathBuf>,
    /// The tool skipped work because recipes already existed.
    pub already_exists: bool,
    /// Trimmed stderr on failure.
    pub error: Option<String>,
}

/// Authored files placed in the output tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Collected {
    /// Moved or already identical files, relative to the output root.
    pub(crate) produced_files: Vec<String>,
    /// One note per file left in place because of a collision.
    pub(crate) notes: Vec<String>,
}

/// How one authored file was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Moved,
    /// An identical file was already at the destination.
    Reused,
    /// A different file was already at the destination; nothing was moved.
    Collision,
}

impl RobotOutput {
    /// Interprets the tool's output streams and exit status.
    #[must_use]
    pub fn parse(stdout: &str, stderr: &str, exit_success: bool) -> Self {
        if !exit_success || stderr.contains("ERROR") {
            let error = match stderr.trim() {
                "" => "Unknown error".to_string(),
                trimmed => trimmed.to_string(),
            };
            return Self {
                error: Some(error),
                ..Self::default()
            };
        }

        let created = CREATED_RECIPE
            .captures_iter(stdout)
            .map(|caps| PathBuf::from(caps[1].trim()))
            .collect();
        Self {
            success: true,
            created,
            already_exists: stdout.contains("already exists"),
            error: None,
        }
    }
}

/// Runs Recipe Robot against a download URL and collects what it wrote.
#[derive(Debug, Clone)]
pub struct RecipeRobotAuthor {
    tool: PathBuf,
    identifier_prefix: String,
    output_root: PathBuf,
    timeout: Duration,
}

impl RecipeRobotAuthor {
    /// Authored files land in `<output_root>/<identifier_prefix>/<app>/`.
    #[must_use]
    pub fn new(
        tool: impl Into<PathBuf>,
        identifier_prefix: impl Into<String>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tool: tool.into(),
            identifier_prefix: identifier_prefix.into(),
            output_root: output_root.into(),
            timeout: DEFAULT_AUTHOR_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command_args(&self, url: &str) -> Vec<String> {
        vec![
            "--verbose".to_string(),
            "--ignore-existing".to_string(),
            format!("--recipe-identifier-prefix={}", self.identifier_prefix),
            url.to_string(),
        ]
    }

    fn target_dir(&self, application: &str) -> PathBuf {
        self.output_root
            .join(path_component(&self.identifier_prefix))
            .join(path_component(application))
    }

    /// Moves every recipe file next to the created ones into the target directory.
    ///
    /// An existing identical file is reused; an existing different file is
    /// left untouched and reported in `notes`.
    pub(crate) async fn collect_created(
        &self,
        application: &str,
        created: &[PathBuf],
    ) -> Result<Collected, FallbackError> {
        let source_dirs: BTreeSet<&Path> = created
            .iter()
            .filter_map(|path| path.parent())
            .map(|dir| if dir.as_os_str().is_empty() { Path::new(".") } else { dir })
            .collect();
        if source_dirs.is_empty() {
            return Ok(Collected::default());
        }

        let target = self.target_dir(application);
        tokio::fs::create_dir_all(&target)
            .await
            .map_err(|e| FallbackError::io(&target, e))?;

        let mut placed = Vec::new();
        let mut collisions = Vec::new();
        for dir in source_dirs {
            if dir == target.as_path() {
                continue;
            }
            let mut entries = tokio::fs::read_dir(dir)
                .await
                .map_err(|e| FallbackError::io(dir, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| FallbackError::io(dir, e))?
            {
                let name = entry.file_name();
                if !name.to_string_lossy().contains(".recipe") {
                    continue;
                }
                if !entry.file_type().await.is_ok_and(|kind| kind.is_file()) {
                    continue;
                }
                let source = entry.path();
                let destination = target.join(&name);
                match place_file(&source, &destination).await? {
                    Placement::Moved | Placement::Reused => placed.push(destination),
                    Placement::Collision => collisions.push(destination),
                }
            }
        }

        placed.sort();
        collisions.sort();
        Ok(Collected {
            produced_files: placed.iter().map(|path| self.relative(path)).collect(),
            notes: collisions
                .iter()
                .map(|path| {
                    format!(
                        "collision: {} already exists with different content, not overwritten",
                        self.relative(path)
                    )
                })
                .collect(),
        })
    }

    /// Path relative to the output root, `/`-separated.
    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.output_root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Moves `source` to `destination` unless a file is already there.
async fn place_file(source: &Path, destination: &Path) -> Result<Placement, FallbackError> {
    match tokio::fs::read(destination).await {
        Ok(existing) => {
            let incoming = tokio::fs::read(source)
                .await
                .map_err(|e| FallbackError::io(source, e))?;
            if existing != incoming {
                warn!(
                    path = %destination.display(),
                    "different recipe file already present, not overwriting"
                );
                return Ok(Placement::Collision);
            }
            debug!(path = %destination.display(), "identical authored recipe already present");
            tokio::fs::remove_file(source)
                .await
                .map_err(|e| FallbackError::io(source, e))?;
            return Ok(Placement::Reused);
        }
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => return Err(FallbackError::io(destination, error)),
    }

    move_file(source, destination).await?;
    debug!(from = %source.display(), to = %destination.display(), "moved authored recipe");
    Ok(Placement::Moved)
}

/// Renames, falling back to copy and remove across filesystems.
async fn move_file(source: &Path, destination: &Path) -> Result<(), FallbackError> {
    if tokio::fs::rename(source, destination).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(source, destination)
        .await
        .map_err(|e| FallbackError::io(destination, e))?;
    tokio::fs::remove_file(source)
        .await
        .map_err(|e| FallbackError::io(source, e))
}

#[async_trait]
impl RecipeAuthor for RecipeRobotAuthor {
    #[instrument(skip(self), fields(tool = %self.tool.display()))]
    async fn create_from_download(
        &self,
        application: &str,
        url: &str,
    ) -> Result<AuthoringResult, FallbackError> {
        let run = Command::new(&self.tool)
            .args(self.command_args(url))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| FallbackError::timeout(&self.tool, self.timeout))?
            .map_err(|e| FallbackError::spawn(&self.tool, e))?;

        let parsed = RobotOutput::parse(
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
            output.status.success(),
        );
        if !parsed.success {
            return Ok(AuthoringResult {
                error: parsed.error,
                ..AuthoringResult::default()
            });
        }
        if parsed.created.is_empty() {
            if parsed.already_exists {
                warn!(application, "recipes already exist, nothing new created");
            } else {
                warn!(application, "tool succeeded but reported no created recipes");
            }
            return Ok(AuthoringResult {
                success: true,
                ..AuthoringResult::default()
            });
        }

        let collected = self.collect_created(application, &parsed.created).await?;
        info!(
            application,
            files = collected.produced_files.len(),
            collisions = collected.notes.len(),
            "authored recipes collected"
        );
        Ok(AuthoringResult {
            success: true,
            produced_files: collected.produced_files,
            notes: collected.notes,
            error: None,
        })
    }
}
