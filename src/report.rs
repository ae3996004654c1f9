//! Run summary statistics derived from the outcome list.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use serde::Serialize;

use crate::recipe::{ResolutionOutcome, ResolutionStatus};

/// Number of repositories listed in [`RunReport::top_repositories`].
const TOP_REPOSITORY_COUNT: usize = 10;

/// Repository and how many selected recipes came from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryCount {
    /// Repository identifier.
    pub repository: String,
    /// Number of applications whose selected recipe lives there.
    pub count: usize,
}

/// Last-mile fallback counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FallbackSummary {
    /// Applications the fallback ran for.
    pub processed: usize,
    /// Applications that got authored recipes.
    pub successful: usize,
    /// Applications where the fallback ran but produced nothing.
    pub failed: usize,
}

/// Aggregate view over one run's outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub total: usize,
    /// Applications with a selected recipe, retrieved or not.
    pub found: usize,
    pub found_and_retrieved: usize,
    pub found_not_retrieved: usize,
    pub not_found: usize,
    pub errors: usize,
    /// `found / total` as a percentage, 0 for an empty run.
    pub success_rate: f64,
    /// `found_and_retrieved / found` as a percentage, 0 when nothing was found.
    pub download_rate: f64,
    /// Selected recipe count per recipe type.
    pub by_type: BTreeMap<String, usize>,
    /// Most common repositories, descending by count then by name.
    pub top_repositories: Vec<RepositoryCount>,
    /// Applications that did not end in `found_and_retrieved`, in input order.
    pub needs_attention: Vec<String>,
    pub fallback: FallbackSummary,
}

impl RunReport {
    /// Builds a report from outcomes.
    #[must_use]
    pub fn from_outcomes(outcomes: &[ResolutionOutcome]) -> Self {
        let mut by_status: HashMap<ResolutionStatus, usize> = HashMap::new();
        let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_repo: HashMap<&str, usize> = HashMap::new();
        let mut needs_attention = Vec::new();
        let mut fallback = FallbackSummary::default();

        for outcome in outcomes {
            *by_status.entry(outcome.status).or_default() += 1;
            if let Some(selected) = &outcome.selected {
                let recipe_type = if selected.recipe_type.is_empty() {
                    "unknown".to_string()
                } else {
                    selected.recipe_type.clone()
                };
                *by_type.entry(recipe_type).or_default() += 1;
                *by_repo.entry(selected.repository.as_str()).or_default() += 1;
            }
            if outcome.status != ResolutionStatus::FoundAndRetrieved {
                needs_attention.push(outcome.application.clone());
            }
            if let Some(record) = outcome.fallback.as_ref().filter(|r| r.attempted) {
                fallback.processed += 1;
                if record.success {
                    fallback.successful += 1;
                } else {
                    fallback.failed += 1;
                }
            }
        }

        let count = |status| by_status.get(&status).copied().unwrap_or(0);
        let total = outcomes.len();
        let found_and_retrieved = count(ResolutionStatus::FoundAndRetrieved);
        let found_not_retrieved = count(ResolutionStatus::FoundNotRetrieved);
        let found = found_and_retrieved + found_not_retrieved;

        let mut top_repositories: Vec<RepositoryCount> = by_repo
            .into_iter()
            .map(|(repository, count)| RepositoryCount {
                repository: repository.to_string(),
                count,
            })
            .collect();
        top_repositories
            .sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.repository.cmp(&b.repository)));
        top_repositories.truncate(TOP_REPOSITORY_COUNT);

        Self {
            total,
            found,
            found_and_retrieved,
            found_not_retrieved,
            not_found: count(ResolutionStatus::NotFound),
            errors: count(ResolutionStatus::Error),
            success_rate: percentage(found, total),
            download_rate: percentage(found_and_retrieved, found),
            by_type,
            top_repositories,
            needs_attention,
            fallback,
        }
    }

    /// Renders a plain-text summary.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Recipe resolution summary");
        let _ = writeln!(out, "  Applications:        {}", self.total);
        let _ = writeln!(out, "  Found:               {} ({:.1}%)", self.found, self.success_rate);
        let _ = writeln!(
            out,
            "  Retrieved:           {} ({:.1}% of found)",
            self.found_and_retrieved, self.download_rate
        );
        let _ = writeln!(out, "  Found, not retrieved: {}", self.found_not_retrieved);
        let _ = writeln!(out, "  Not found:           {}", self.not_found);
        let _ = writeln!(out, "  Errors:              {}", self.errors);

        if !self.by_type.is_empty() {
            let _ = writeln!(out, "Recipes by type:");
            for (recipe_type, count) in &self.by_type {
                let _ = writeln!(out, "  {recipe_type}: {count}");
            }
        }
        if !self.top_repositories.is_empty() {
            let _ = writeln!(out, "Top repositories:");
            for entry in &self.top_repositories {
                let _ = writeln!(out, "  {}: {}", entry.repository, entry.count);
            }
        }
        if self.fallback.processed > 0 {
            let _ = writeln!(
                out,
                "Last-mile fallback: {} processed, {} successful, {} failed",
                self.fallback.processed, self.fallback.successful, self.fallback.failed
            );
        }
        if !self.needs_attention.is_empty() {
            let _ = writeln!(out, "Needs attention: {}", self.needs_attention.join(", "));
        }
        out
    }
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::recipe::{CandidateRecipe, FallbackRecord};

    fn retrieved(app: &str, recipe_type: &str, repo: &str) -> ResolutionOutcome {
        let selected =
            CandidateRecipe::new(format!("{app}.{recipe_type}.recipe"), recipe_type, repo, "x");
        ResolutionOutcome {
            selected: Some(selected.clone()),
            chain: vec![selected],
            status: ResolutionStatus::FoundAndRetrieved,
            chain_complete: true,
            ..ResolutionOutcome::not_found(app)
        }
    }

    #[test]
    fn test_from_outcomes_counts_and_rates() {
        let selected = CandidateRecipe::new("Zoom.munki.recipe", "munki", "recipes", "x");
        let outcomes = vec![
            retrieved("Firefox", "munki", "recipes"),
            retrieved("Slack", "download", "homebysix-recipes"),
            retrieved("Chrome", "munki", "recipes"),
            ResolutionOutcome::not_retrieved("Zoom", selected, "HTTP 500"),
            ResolutionOutcome::not_found("Nothing"),
            ResolutionOutcome::error("Broken", "boom"),
        ];
        let report = RunReport::from_outcomes(&outcomes);

        assert_eq!(report.total, 6);
        assert_eq!(report.found, 4);
        assert_eq!(report.found_and_retrieved, 3);
        assert_eq!(report.found_not_retrieved, 1);
        assert_eq!(report.not_found, 1);
        assert_eq!(report.errors, 1);
        assert!((report.success_rate - 4.0 / 6.0 * 100.0).abs() < 1e-9);
        assert!((report.download_rate - 75.0).abs() < 1e-9);
        assert_eq!(report.by_type.get("munki"), Some(&3));
        assert_eq!(report.by_type.get("download"), Some(&1));
        assert_eq!(
            report.top_repositories[0],
            RepositoryCount {
                repository: "recipes".to_string(),
                count: 3
            }
        );
        assert_eq!(report.needs_attention, vec!["Zoom", "Nothing", "Broken"]);
    }

    #[test]
    fn test_from_outcomes_empty_run() {
        let report = RunReport::from_outcomes(&[]);
        assert_eq!(report.total, 0);
        assert!(report.success_rate.abs() < f64::EPSILON);
        assert!(report.download_rate.abs() < f64::EPSILON);
        assert!(report.top_repositories.is_empty());
    }

    #[test]
    fn test_top_repositories_limited_to_ten() {
        let outcomes: Vec<_> = (0..15)
            .map(|i| retrieved(&format!("App{i}"), "munki", &format!("repo{i:02}")))
            .collect();
        let report = RunReport::from_outcomes(&outcomes);
        assert_eq!(report.top_repositories.len(), 10);
        assert_eq!(report.top_repositories[0].repository, "repo00");
    }

    #[test]
    fn test_fallback_summary() {
        let mut ok = ResolutionOutcome::not_found("A");
        ok.fallback = Some(FallbackRecord {
            attempted: true,
            success: true,
            ..FallbackRecord::default()
        });
        let mut failed = ResolutionOutcome::not_found("B");
        failed.fallback = Some(FallbackRecord {
            attempted: true,
            ..FallbackRecord::default()
        });
        let report = RunReport::from_outcomes(&[ok, failed, ResolutionOutcome::not_found("C")]);
        assert_eq!(
            report.fallback,
            FallbackSummary {
                processed: 2,
                successful: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn test_render_text_and_json() {
        let report = RunReport::from_outcomes(&[
            retrieved("Firefox", "munki", "recipes"),
            ResolutionOutcome::not_found("Nothing"),
        ]);
        let text = report.render_text();
        assert!(text.contains("Applications:        2"));
        assert!(text.contains("Found:               1 (50.0%)"));
        assert!(text.contains("Needs attention: Nothing"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["found_and_retrieved"], 1);
        assert_eq!(json["by_type"]["munki"], 1);
    }
}
