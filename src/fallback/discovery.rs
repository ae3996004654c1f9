//! Download discovery by delegating to an external command.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{DownloadDiscovery, DownloadUrlFinder, FallbackError};

/// Sentinel a discovery command prints when no direct download exists.
pub const NO_DIRECT_DOWNLOAD: &str = "NO_DIRECT_DOWNLOAD";

const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Classifies a download URL by the extension of its path.
#[must_use]
pub fn classify_download_url(url: &str) -> &'static str {
    let path = url::Url::parse(url)
        .map_or_else(|_| url.to_string(), |parsed| parsed.path().to_string());
    let path = path.to_ascii_lowercase();
    if path.ends_with(".pkg") {
        "pkg"
    } else if path.ends_with(".dmg") {
        "dmg"
    } else if path.ends_with(".zip") {
        "zip"
    } else {
        "unknown"
    }
}

/// Interprets the first stdout line of a discovery command.
pub(crate) fn interpret_discovery_output(stdout: &str) -> DownloadDiscovery {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    if line.is_empty() || line == NO_DIRECT_DOWNLOAD {
        return DownloadDiscovery::not_found();
    }
    if !(line.starts_with("http://") || line.starts_with("https://")) {
        debug!(output = line, "discovery output is not an http URL");
        return DownloadDiscovery::not_found();
    }
    DownloadDiscovery::found(line)
}

/// Runs `<program> [args...] <application>` and reads a URL from its output.
#[derive(Debug, Clone)]
pub struct CommandDownloadFinder {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandDownloadFinder {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }

    /// Arguments placed before the application name.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl DownloadUrlFinder for CommandDownloadFinder {
    #[instrument(skip(self), fields(program = %self.program.display()))]
    async fn find_download_url(
        &self,
        application: &str,
    ) -> Result<DownloadDiscovery, FallbackError> {
        let run = Command::new(&self.program)
            .args(&self.args)
            .arg(application)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| FallbackError::timeout(&self.program, self.timeout))?
            .map_err(|e| FallbackError::spawn(&self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = match stderr.trim() {
                "" => format!("exit status {}", output.status),
                trimmed => trimmed.to_string(),
            };
            return Err(FallbackError::failed(&self.program, detail));
        }
        Ok(interpret_discovery_output(&String::from_utf8_lossy(&output.stdout)))
    }
}
