//! Core data model: catalog candidates and per-application outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One catalog search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecipe {
    /// Recipe identifier, e.g. `Firefox.munki.recipe`. Never empty.
    pub name: String,
    /// Recipe type (`munki`, `download`, `pkg`, ...). Empty when unknown.
    pub recipe_type: String,
    /// Owning repository identifier.
    pub repository: String,
    /// Popularity signal (star count), 0 when unknown.
    pub popularity: u64,
    /// URL or repo-relative path that resolves to the recipe file.
    pub source_locator: String,
    /// Catalog-level deprecation (badge text or name contains "deprecated").
    pub deprecated: bool,
    /// File name the recipe is stored under.
    pub file_name: String,
    /// Catalog description, possibly empty.
    #[serde(default)]
    pub description: String,
}

impl CandidateRecipe {
    /// Creates a candidate with the required fields; everything else defaults.
    ///
    /// `file_name` is derived from the locator's last path segment, falling
    /// back to `name`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        recipe_type: impl Into<String>,
        repository: impl Into<String>,
        source_locator: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let source_locator = source_locator.into();
        let file_name = file_name_from_locator(&source_locator).unwrap_or_else(|| name.clone());
        Self {
            name,
            recipe_type: recipe_type.into(),
            repository: repository.into(),
            popularity: 0,
            source_locator,
            deprecated: false,
            file_name,
            description: String::new(),
        }
    }

    /// Sets the popularity signal.
    #[must_use]
    pub fn with_popularity(mut self, popularity: u64) -> Self {
        self.popularity = popularity;
        self
    }

    /// Sets the catalog-level deprecation flag.
    #[must_use]
    pub fn with_deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    /// Overrides the on-disk file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }
}

/// Returns the last non-empty path segment of a URL or relative path.
///
/// Query strings and fragments are ignored.
#[must_use]
pub fn file_name_from_locator(locator: &str) -> Option<String> {
    let without_query = locator.split(['?', '#']).next().unwrap_or(locator);
    without_query
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .filter(|segment| !segment.contains(':'))
        .map(ToString::to_string)
}

/// Classification of one application's processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// A recipe was selected and at least its root file was persisted.
    FoundAndRetrieved,
    /// A recipe was selected but its root file could not be fetched.
    FoundNotRetrieved,
    /// No candidate survived ranking.
    NotFound,
    /// Processing failed unexpectedly.
    Error,
}

impl ResolutionStatus {
    /// Stable label used in logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FoundAndRetrieved => "found_and_retrieved",
            Self::FoundNotRetrieved => "found_not_retrieved",
            Self::NotFound => "not_found",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the last-mile fallback for an application with no catalog match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRecord {
    /// Whether the fallback ran at all.
    pub attempted: bool,
    /// Whether recipes were authored and moved into the output tree.
    pub success: bool,
    /// Download URL found by discovery, if any.
    pub download_url: Option<String>,
    /// Download type classified from the URL (`pkg`, `dmg`, `zip`, `unknown`).
    pub download_type: Option<String>,
    /// Files produced by the authoring tool, relative to the output root.
    pub produced_files: Vec<String>,
    /// Failure description.
    pub error: Option<String>,
}

/// One record per input application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    /// Input application name.
    pub application: String,
    /// Selected candidate, absent when nothing was found.
    pub selected: Option<CandidateRecipe>,
    /// Retrieved chain, root first.
    pub chain: Vec<CandidateRecipe>,
    /// Outcome classification.
    pub status: ResolutionStatus,
    /// Diagnostic for `error` outcomes and fetch failures.
    pub error_detail: Option<String>,
    /// Persisted files relative to the output root.
    pub local_paths: Vec<String>,
    /// False when the parent walk stopped before reaching a recipe without parent.
    pub chain_complete: bool,
    /// Non-fatal diagnostics (incomplete chain, collisions, file-level deprecation).
    pub notes: Vec<String>,
    /// Last-mile fallback record, only for `not_found` outcomes.
    pub fallback: Option<FallbackRecord>,
}

impl ResolutionOutcome {
    /// Outcome for an application with no surviving candidate.
    #[must_use]
    pub fn not_found(application: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            selected: None,
            chain: Vec::new(),
            status: ResolutionStatus::NotFound,
            error_detail: None,
            local_paths: Vec::new(),
            chain_complete: false,
            notes: Vec::new(),
            fallback: None,
        }
    }

    /// Outcome for an application whose processing failed unexpectedly.
    #[must_use]
    pub fn error(application: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: ResolutionStatus::Error,
            error_detail: Some(detail.into()),
            ..Self::not_found(application)
        }
    }

    /// Outcome for a selected recipe whose root file could not be fetched.
    #[must_use]
    pub fn not_retrieved(
        application: impl Into<String>,
        selected: CandidateRecipe,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            selected: Some(selected),
            status: ResolutionStatus::FoundNotRetrieved,
            error_detail: Some(detail.into()),
            ..Self::not_found(application)
        }
    }

    /// Returns true when a candidate was selected, regardless of retrieval.
    #[must_use]
    pub fn is_found(&self) -> bool {
        self.selected.is_some()
    }
}
