//! Resolution policy configuration and optional TOML file overrides.
//!
//! [`ResolutionConfig`] carries every policy value the engine and catalog
//! client depend on (type priority, suffix list, retry bounds, delays), so
//! callers and tests can vary policy per run instead of relying on globals.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default recipe type priority (managed install before plain download).
pub const DEFAULT_TYPE_PRIORITY: [&str; 2] = ["munki", "download"];

/// Default recipe name suffixes used to infer a recipe type.
pub const DEFAULT_RECIPE_SUFFIXES: [&str; 6] =
    [".download", ".munki", ".pkg", ".install", ".jss", ".jamf"];

/// Default maximum attempts per network call (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default fixed delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Default minimum delay between consecutive requests to the same host.
pub const DEFAULT_POLITENESS_DELAY: Duration = Duration::from_millis(500);

/// Default total timeout for a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout for a single request.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default catalog base URL.
pub const DEFAULT_CATALOG_URL: &str = "https://autopkgweb.com";

/// Default prefix for repository directories in the output tree.
pub const DEFAULT_REPOSITORY_PREFIX: &str = "com.github.autopkg.";

/// Default maximum number of pages followed for one paginated query.
pub const DEFAULT_MAX_PAGES: u32 = 50;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for the expected schema.
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its accepted range.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        /// Offending field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Wire format spoken by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogFormat {
    /// HTML search page with one `tr.recipe-row` per recipe.
    Web,
    /// Paginated index API returning tab-separated lines.
    Index,
}

impl CatalogFormat {
    /// Parses a user-facing label (`web` or `index`).
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "web" | "html" => Some(Self::Web),
            "index" | "lines" => Some(Self::Index),
            _ => None,
        }
    }
}

/// Policy values for one resolution run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionConfig {
    /// Recipe types in order of preference.
    pub type_priority: Vec<String>,
    /// Known name suffixes used to infer recipe types (longest match wins).
    pub recipe_suffixes: Vec<String>,
    /// Maximum attempts per network call (including the first).
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Minimum delay between consecutive requests to the same host.
    pub politeness_delay: Duration,
    /// Total timeout per request.
    pub request_timeout: Duration,
    /// Connect timeout per request.
    pub connect_timeout: Duration,
    /// Remaining-quota value at or below which pagination waits for reset.
    pub quota_floor: u64,
    /// Maximum pages followed for a single query.
    pub max_pages: u32,
    /// Catalog base URL.
    pub catalog_url: String,
    /// Catalog response format.
    pub catalog_format: CatalogFormat,
    /// Prefix joined with the repository identifier for output directories.
    pub repository_prefix: String,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            type_priority: DEFAULT_TYPE_PRIORITY.iter().map(ToString::to_string).collect(),
            recipe_suffixes: DEFAULT_RECIPE_SUFFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            politeness_delay: DEFAULT_POLITENESS_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            quota_floor: 1,
            max_pages: DEFAULT_MAX_PAGES,
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            catalog_format: CatalogFormat::Web,
            repository_prefix: DEFAULT_REPOSITORY_PREFIX.to_string(),
        }
    }
}

impl ResolutionConfig {
    /// Validates cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty priority list, zero
    /// attempts, or zero timeouts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.type_priority.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::invalid(
                "type_priority",
                "at least one recipe type is required",
            ));
        }
        if !(1..=10).contains(&self.max_attempts) {
            return Err(ConfigError::invalid(
                "max_attempts",
                format!("{} is outside 1..=10", self.max_attempts),
            ));
        }
        if self.request_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(ConfigError::invalid("timeout", "timeouts must be non-zero"));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::invalid("max_pages", "must be at least 1"));
        }
        if url::Url::parse(&self.catalog_url).is_err() {
            return Err(ConfigError::invalid(
                "catalog_url",
                format!("'{}' is not an absolute URL", self.catalog_url),
            ));
        }
        Ok(())
    }

    /// Applies values present in a file config on top of `self`.
    #[must_use]
    pub fn merged_with(mut self, file: &FileConfig) -> Self {
        if let Some(priority) = &file.type_priority {
            self.type_priority.clone_from(priority);
        }
        if let Some(suffixes) = &file.recipe_suffixes {
            self.recipe_suffixes.clone_from(suffixes);
        }
        if let Some(attempts) = file.max_attempts {
            self.max_attempts = attempts;
        }
        if let Some(ms) = file.retry_delay_ms {
            self.retry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.politeness_delay_ms {
            self.politeness_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.connect_timeout_secs {
            self.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(floor) = file.quota_floor {
            self.quota_floor = floor;
        }
        if let Some(pages) = file.max_pages {
            self.max_pages = pages;
        }
        if let Some(url) = &file.catalog_url {
            self.catalog_url.clone_from(url);
        }
        if let Some(format) = file.catalog_format {
            self.catalog_format = format;
        }
        if let Some(prefix) = &file.repository_prefix {
            self.repository_prefix.clone_from(prefix);
        }
        self
    }
}

/// TOML-backed overrides. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Recipe types in preference order.
    pub type_priority: Option<Vec<String>>,
    /// Type suffixes stripped when deriving directory names.
    pub recipe_suffixes: Option<Vec<String>>,
    /// Total attempts per request.
    pub max_attempts: Option<u32>,
    /// Delay between retries in milliseconds.
    pub retry_delay_ms: Option<u64>,
    /// Minimum spacing between requests to one host in milliseconds.
    pub politeness_delay_ms: Option<u64>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Remaining-quota level at which pagination waits for the reset.
    pub quota_floor: Option<u64>,
    /// Upper bound on search result pages.
    pub max_pages: Option<u32>,
    /// Catalog base URL.
    pub catalog_url: Option<String>,
    /// Response format of the catalog.
    pub catalog_format: Option<CatalogFormat>,
    /// Prefix joined to repository names for output directories.
    pub repository_prefix: Option<String>,
    /// Root of the recipe output tree.
    pub output_dir: Option<PathBuf>,
    /// Recipe Robot executable used by the last-mile fallback.
    pub recipe_robot_path: Option<PathBuf>,
    /// Command that prints a direct download URL for an application.
    pub discovery_command: Option<PathBuf>,
    /// Identifier prefix for recipes authored by the fallback.
    pub last_mile_prefix: Option<String>,
}

impl FileConfig {
    /// Validates value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for out-of-range delays or timeouts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_range("retry_delay_ms", self.retry_delay_ms, 0..=60_000)?;
        validate_range("politeness_delay_ms", self.politeness_delay_ms, 0..=60_000)?;
        validate_range("request_timeout_secs", self.request_timeout_secs, 1..=3600)?;
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1..=3600)?;
        if let Some(priority) = &self.type_priority
            && priority.is_empty()
        {
            return Err(ConfigError::invalid(
                "type_priority",
                "list cannot be empty",
            ));
        }
        Ok(())
    }
}

fn validate_range(
    field: &'static str,
    value: Option<u64>,
    range: std::ops::RangeInclusive<u64>,
) -> Result<(), ConfigError> {
    match value {
        Some(v) if !range.contains(&v) => Err(ConfigError::invalid(
            field,
            format!("{v} is outside {}..={}", range.start(), range.end()),
        )),
        _ => Ok(()),
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/recipe-finder/config.toml`
/// 2. `$HOME/.config/recipe-finder/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join("recipe-finder").join("config.toml"));
    }
    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("recipe-finder")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads and validates a config file.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read, parsed, or validated.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads the config file at the default path when it exists.
///
/// # Errors
///
/// Returns [`ConfigError`] if an existing file is unreadable or invalid.
pub fn load_default_file_config() -> Result<Option<FileConfig>, ConfigError> {
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn parse_config_str(raw: &str) -> Result<FileConfig, toml::de::Error> {
    toml::from_str(raw)
}
