//! Candidate selection by type priority, deprecation, and popularity.

use crate::recipe::CandidateRecipe;

/// Stateless selection policy.
///
/// Selection is deterministic: the same candidates and priority list always
/// yield the same result.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingPolicy;

impl RankingPolicy {
    /// Picks the best candidate.
    ///
    /// Deprecated candidates and types missing from `type_priority` are
    /// discarded. The first priority type with any survivors wins regardless
    /// of popularity elsewhere; within it the most popular candidate wins,
    /// ties going to the earliest in input order.
    #[must_use]
    pub fn select(
        candidates: &[CandidateRecipe],
        type_priority: &[String],
    ) -> Option<CandidateRecipe> {
        type_priority.iter().find_map(|wanted| {
            let mut best: Option<&CandidateRecipe> = None;
            for candidate in candidates
                .iter()
                .filter(|c| !c.deprecated && c.recipe_type.eq_ignore_ascii_case(wanted))
            {
                // strict comparison keeps the first-seen candidate on ties
                if best.is_none_or(|b| candidate.popularity > b.popularity) {
                    best = Some(candidate);
                }
            }
            best.cloned()
        })
    }
}
