//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use recipe_finder_core::config::CatalogFormat;

/// Default output directory for retrieved recipes.
pub const DEFAULT_OUTPUT_DIR: &str = "./autopkg-recipes";

/// Find, rank, and retrieve packaging recipes for a list of applications.
///
/// For each application the best recipe is selected from the catalog by type
/// priority and popularity, then the recipe and its parent chain are saved
/// under the output directory.
#[derive(Parser, Debug)]
#[command(name = "recipe-finder")]
#[command(author, version, about)]
pub struct Args {
    /// Application names to resolve (merged after names read from --input)
    pub applications: Vec<String>,

    /// CSV file with an `Application` column, or a plain list with one name per line
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Directory retrieved recipes are written under
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Write per-application outcomes as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub results: Option<PathBuf>,

    /// Write the run summary as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Recipe types in priority order, comma-separated (e.g. munki,download)
    #[arg(short = 't', long, value_delimiter = ',', value_name = "TYPES")]
    pub type_priority: Option<Vec<String>>,

    /// Catalog base URL
    #[arg(long, value_name = "URL")]
    pub catalog_url: Option<String>,

    /// Catalog response format
    #[arg(long, value_name = "FORMAT", value_parser = parse_catalog_format)]
    pub catalog_format: Option<CatalogFormat>,

    /// Maximum attempts per catalog request (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_retries: Option<u32>,

    /// Minimum delay between requests to the same host in milliseconds (0 to disable, max 60000)
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_limit: Option<u64>,

    /// Skip the last-mile fallback for applications with no catalog recipe
    #[arg(long)]
    pub no_last_mile: bool,

    /// Path to the Recipe Robot executable used by the fallback
    #[arg(long, value_name = "PATH")]
    pub recipe_robot: Option<PathBuf>,

    /// Command printing a direct download URL for an application name
    #[arg(long, value_name = "PATH")]
    pub discovery_command: Option<PathBuf>,

    /// Config file (defaults to $XDG_CONFIG_HOME/recipe-finder/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

fn parse_catalog_format(value: &str) -> Result<CatalogFormat, String> {
    CatalogFormat::from_label(value)
        .ok_or_else(|| format!("expected 'web' or 'index', got '{value}'"))
}
