//! Per-application orchestration: select, resolve, persist, classify.
//!
//! The engine processes applications one at a time, in input order. For each
//! it searches the catalog type by type in priority order until
//! [`RankingPolicy`] selects a candidate, resolves the parent chain with
//! [`DependencyResolver`], writes every retrieved member to the output tree,
//! and emits one [`ResolutionOutcome`].
//!
//! Failures inside one application never abort the batch: unexpected errors
//! and panics become `error` outcomes and processing moves on.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use recipe_finder_core::{HttpCatalog, ResolutionConfig, RetrievalEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ResolutionConfig::default();
//! let catalog = Arc::new(HttpCatalog::new(&config)?);
//! let engine = RetrievalEngine::new(config, catalog, "./autopkg-recipes");
//! let outcomes = engine.process(&["Firefox".to_string()]).await;
//! println!("{}: {}", outcomes[0].application, outcomes[0].status);
//! # Ok(())
//! # }
//! ```

mod persistence;

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures_util::FutureExt;
use tracing::{error, info, instrument, warn};

use crate::catalog::RecipeCatalog;
use crate::config::ResolutionConfig;
use crate::dependency::{ChainTermination, DependencyResolver};
use crate::ranking::RankingPolicy;
use crate::recipe::{CandidateRecipe, ResolutionOutcome, ResolutionStatus};

use persistence::{PersistOutcome, RecipeStore};

/// Error type for failures inside one application's processing.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The application name was empty after trimming.
    #[error("no application name provided")]
    EmptyApplication,

    /// Writing to the output tree failed.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Counters for one run.
///
/// `found` counts applications with a selected recipe, `downloaded` those
/// whose root recipe was retrieved.
#[derive(Debug, Default)]
pub struct RunStats {
    total: AtomicUsize,
    found: AtomicUsize,
    downloaded: AtomicUsize,
    errors: AtomicUsize,
}

impl RunStats {
    /// Creates a zeroed stats tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applications processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Applications with a selected recipe.
    #[must_use]
    pub fn found(&self) -> usize {
        self.found.load(Ordering::SeqCst)
    }

    /// Applications whose root recipe was retrieved.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Applications that ended in an unexpected error.
    #[must_use]
    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    fn record(&self, outcome: &ResolutionOutcome) {
        self.total.fetch_add(1, Ordering::SeqCst);
        if outcome.is_found() {
            self.found.fetch_add(1, Ordering::SeqCst);
        }
        match outcome.status {
            ResolutionStatus::FoundAndRetrieved => {
                self.downloaded.fetch_add(1, Ordering::SeqCst);
            }
            ResolutionStatus::Error => {
                self.errors.fetch_add(1, Ordering::SeqCst);
            }
            ResolutionStatus::FoundNotRetrieved | ResolutionStatus::NotFound => {}
        }
    }
}

/// Drives resolution for a batch of applications.
pub struct RetrievalEngine {
    config: ResolutionConfig,
    catalog: Arc<dyn RecipeCatalog>,
    store: RecipeStore,
    stats: RunStats,
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("config", &self.config)
            .field("output_root", &self.store.root())
            .finish_non_exhaustive()
    }
}

impl RetrievalEngine {
    /// Creates an engine writing under `output_root`.
    #[must_use]
    pub fn new(
        config: ResolutionConfig,
        catalog: Arc<dyn RecipeCatalog>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        let store = RecipeStore::new(
            output_root,
            config.repository_prefix.clone(),
            config.recipe_suffixes.clone(),
        );
        Self {
            config,
            catalog,
            store,
            stats: RunStats::new(),
        }
    }

    /// Counters accumulated across every `process` call on this engine.
    #[must_use]
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Output root recipes are written under.
    #[must_use]
    pub fn output_root(&self) -> &Path {
        self.store.root()
    }

    /// Processes every application; returns one outcome per input, in order.
    pub async fn process(&self, applications: &[String]) -> Vec<ResolutionOutcome> {
        let never = AtomicBool::new(false);
        self.process_observed(applications, &never, |_| {}).await
    }

    /// Processes applications until done or `stop` is set.
    ///
    /// `stop` is checked before each application; applications not started
    /// are absent from the result. `observer` sees each outcome as it is
    /// produced.
    pub async fn process_observed<F>(
        &self,
        applications: &[String],
        stop: &AtomicBool,
        mut observer: F,
    ) -> Vec<ResolutionOutcome>
    where
        F: FnMut(&ResolutionOutcome),
    {
        let mut outcomes = Vec::with_capacity(applications.len());
        for (index, application) in applications.iter().enumerate() {
            if stop.load(Ordering::SeqCst) {
                warn!(
                    processed = index,
                    remaining = applications.len() - index,
                    "stop requested, skipping remaining applications"
                );
                break;
            }
            info!(
                position = index + 1,
                total = applications.len(),
                application = %application,
                "processing application"
            );

            let outcome = self.process_guarded(application).await;
            self.stats.record(&outcome);
            observer(&outcome);
            outcomes.push(outcome);
        }
        outcomes
    }

    /// The per-application boundary: errors and panics become `error` outcomes.
    async fn process_guarded(&self, application: &str) -> ResolutionOutcome {
        match std::panic::AssertUnwindSafe(self.process_one(application))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                error!(application, error = %err, "application failed");
                ResolutionOutcome::error(application, err.to_string())
            }
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                error!(application, detail = %detail, "application processing panicked");
                ResolutionOutcome::error(application, format!("unexpected failure: {detail}"))
            }
        }
    }

    #[instrument(skip(self))]
    async fn process_one(&self, application: &str) -> Result<ResolutionOutcome, EngineError> {
        let application = application.trim();
        if application.is_empty() {
            return Err(EngineError::EmptyApplication);
        }

        let Some(selected) = self.select(application).await else {
            info!(application, "no recipe found");
            return Ok(ResolutionOutcome::not_found(application));
        };
        info!(
            application,
            recipe = %selected.name,
            recipe_type = %selected.recipe_type,
            repository = %selected.repository,
            "selected recipe"
        );

        let chain =
            DependencyResolver::resolve_chain(selected.clone(), self.catalog.as_ref()).await;
        if chain.members.is_empty() {
            let detail = match &chain.termination {
                ChainTermination::RootUnretrieved { error } => error.clone(),
                other => other.to_string(),
            };
            warn!(
                application,
                recipe = %selected.name,
                detail = %detail,
                "selected recipe not retrieved"
            );
            return Ok(ResolutionOutcome::not_retrieved(application, selected, detail));
        }

        let mut outcome = ResolutionOutcome {
            selected: Some(selected),
            status: ResolutionStatus::FoundAndRetrieved,
            chain_complete: chain.termination.is_complete(),
            ..ResolutionOutcome::not_found(application)
        };

        for member in &chain.members {
            if member.descriptor.is_deprecated {
                outcome.notes.push(format!(
                    "{} is marked deprecated in its recipe file",
                    member.candidate.name
                ));
            }
            match self.store.persist(&member.candidate, &member.content).await? {
                PersistOutcome::Written(path) | PersistOutcome::Reused(path) => {
                    outcome.local_paths.push(self.store.relative(&path));
                }
                PersistOutcome::Collision(path) => {
                    outcome.notes.push(format!(
                        "collision: {} already exists with different content, not overwritten",
                        self.store.relative(&path)
                    ));
                }
            }
            outcome.chain.push(member.candidate.clone());
        }

        if !chain.termination.is_complete() {
            outcome.notes.push(chain.termination.to_string());
        }

        info!(
            application,
            chain_len = outcome.chain.len(),
            chain_complete = outcome.chain_complete,
            "recipe chain retrieved"
        );
        Ok(outcome)
    }

    /// Searches type by type in priority order until a candidate is selected.
    async fn select(&self, application: &str) -> Option<CandidateRecipe> {
        for recipe_type in &self.config.type_priority {
            let hits = self.catalog.search(application, Some(recipe_type)).await;
            if let Some(selected) = RankingPolicy::select(&hits, &self.config.type_priority) {
                return Some(selected);
            }
        }
        None
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
