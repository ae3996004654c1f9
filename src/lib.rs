//! Recipe Finder Core Library
//!
//! Resolves application names to packaging recipes: searches a recipe
//! catalog, selects the best candidate by type priority and popularity,
//! follows the recipe's parent chain, and writes every retrieved recipe into
//! an output tree.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`catalog`] - HTTP catalog client, result parsing, retry and rate limiting
//! - [`ranking`] - Candidate selection policy
//! - [`dependency`] - Parent chain resolution
//! - [`engine`] - Per-application orchestration and output tree writes
//! - [`fallback`] - Last-mile recipe authoring for applications with no catalog recipe
//! - [`report`] - Run summary statistics
//! - [`config`] - Resolution policy and TOML overrides

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod dependency;
pub mod descriptor;
pub mod engine;
pub mod fallback;
pub mod input;
pub mod layout;
pub mod ranking;
pub mod recipe;
pub mod report;
mod user_agent;

// Re-export commonly used types
pub use catalog::{
    CatalogClient, CatalogError, FailureType, HttpCatalog, RateLimiter, RawResults, RecipeCatalog,
    ResultParser, RetryDecision, RetryPolicy, classify_error,
};
pub use config::{CatalogFormat, ConfigError, FileConfig, ResolutionConfig};
pub use dependency::{ChainTermination, DependencyResolver, ResolvedChain, RetrievedRecipe};
pub use descriptor::RecipeDescriptor;
pub use engine::{EngineError, RetrievalEngine, RunStats};
pub use fallback::{
    AuthoringResult, CommandDownloadFinder, DownloadDiscovery, DownloadUrlFinder, FallbackError,
    LastMileProcessor, RecipeAuthor, RecipeRobotAuthor,
};
pub use input::parse_application_list;
pub use ranking::RankingPolicy;
pub use recipe::{CandidateRecipe, FallbackRecord, ResolutionOutcome, ResolutionStatus};
pub use report::RunReport;
