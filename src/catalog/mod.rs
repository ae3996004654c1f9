//! Remote recipe catalog access.
//!
//! [`CatalogClient`] speaks HTTP and returns raw pages, [`ResultParser`] turns
//! them into [`CandidateRecipe`]s. [`RecipeCatalog`] is the seam the resolver
//! and engine depend on; [`HttpCatalog`] implements it on top of the two.

mod client;
mod error;
mod parser;
pub mod rate_limiter;
mod retry;

use async_trait::async_trait;

pub use client::{CatalogClient, RawResults, rewrite_github_blob};
pub use error::CatalogError;
pub use parser::ResultParser;
pub use rate_limiter::RateLimiter;
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error};

use crate::config::ResolutionConfig;
use crate::recipe::CandidateRecipe;

/// Search and fetch operations over a recipe catalog.
#[async_trait]
pub trait RecipeCatalog: Send + Sync {
    /// Returns parsed candidates for `query`, optionally restricted to one type.
    ///
    /// Implementations degrade to an empty list instead of failing.
    async fn search(&self, query: &str, type_filter: Option<&str>) -> Vec<CandidateRecipe>;

    /// Returns the text of the candidate's recipe file.
    async fn fetch(&self, candidate: &CandidateRecipe) -> Result<String, CatalogError>;
}

/// [`RecipeCatalog`] backed by a live HTTP catalog.
#[derive(Debug)]
pub struct HttpCatalog {
    client: CatalogClient,
    parser: ResultParser,
}

impl HttpCatalog {
    /// Builds the client and parser from one resolution policy.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the HTTP client cannot be constructed.
    pub fn new(config: &ResolutionConfig) -> Result<Self, CatalogError> {
        Ok(Self {
            client: CatalogClient::new(config)?,
            parser: ResultParser::new(config.recipe_suffixes.clone()),
        })
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn from_parts(client: CatalogClient, parser: ResultParser) -> Self {
        Self { client, parser }
    }
}

#[async_trait]
impl RecipeCatalog for HttpCatalog {
    async fn search(&self, query: &str, type_filter: Option<&str>) -> Vec<CandidateRecipe> {
        let raw = self.client.search(query, type_filter).await;
        self.parser.parse(&raw)
    }

    async fn fetch(&self, candidate: &CandidateRecipe) -> Result<String, CatalogError> {
        self.client.fetch(&candidate.source_locator).await
    }
}
