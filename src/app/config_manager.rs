//! Merges defaults, the TOML config file, and CLI flags into one run configuration.
//!
//! Precedence: CLI flag > config file > built-in default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use recipe_finder_core::config::{self, FileConfig, ResolutionConfig};
use recipe_finder_core::fallback::DEFAULT_LAST_MILE_PREFIX;
use tracing::debug;

use crate::cli::{Args, DEFAULT_OUTPUT_DIR};

/// Everything the runtime needs beyond the parsed arguments.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub(crate) resolution: ResolutionConfig,
    pub(crate) output_dir: PathBuf,
    pub(crate) last_mile: Option<LastMileSettings>,
}

/// Fallback collaborators; present only when enabled and fully configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LastMileSettings {
    pub(crate) recipe_robot: PathBuf,
    pub(crate) discovery_command: PathBuf,
    pub(crate) prefix: String,
}

pub(crate) fn resolve_config(args: &Args) -> Result<ResolvedConfig> {
    let file = match &args.config {
        Some(path) => Some(
            config::load_file_config(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?,
        ),
        None => config::load_default_file_config().context("Failed to load default config file")?,
    };
    if file.is_some() {
        debug!("config file loaded");
    }
    merge(args, file.unwrap_or_default())
}

fn merge(args: &Args, file: FileConfig) -> Result<ResolvedConfig> {
    let mut resolution = ResolutionConfig::default().merged_with(&file);

    if let Some(priority) = &args.type_priority {
        resolution.type_priority = priority
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }
    if let Some(url) = &args.catalog_url {
        resolution.catalog_url.clone_from(url);
    }
    if let Some(format) = args.catalog_format {
        resolution.catalog_format = format;
    }
    if let Some(attempts) = args.max_retries {
        resolution.max_attempts = attempts;
    }
    if let Some(ms) = args.rate_limit {
        resolution.politeness_delay = Duration::from_millis(ms);
    }
    resolution.validate().context("Invalid resolution settings")?;

    let output_dir = args
        .output_dir
        .clone()
        .or(file.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    let last_mile = if args.no_last_mile {
        None
    } else {
        let recipe_robot = args.recipe_robot.clone().or(file.recipe_robot_path.clone());
        let discovery_command = args
            .discovery_command
            .clone()
            .or(file.discovery_command.clone());
        match (recipe_robot, discovery_command) {
            (Some(recipe_robot), Some(discovery_command)) => Some(LastMileSettings {
                recipe_robot,
                discovery_command,
                prefix: file
                    .last_mile_prefix
                    .clone()
                    .unwrap_or_else(|| DEFAULT_LAST_MILE_PREFIX.to_string()),
            }),
            _ => {
                debug!("last-mile fallback needs both a recipe robot and a discovery command");
                None
            }
        }
    };

    Ok(ResolvedConfig {
        resolution,
        output_dir,
        last_mile,
    })
}
