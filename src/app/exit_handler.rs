//! Exit code logic for the recipe-finder process.
//!
//! Single responsibility: map the outcome list to the process exit outcome.

use recipe_finder_core::{ResolutionOutcome, ResolutionStatus};

use crate::ProcessExit;

/// `Success` when every processed application was retrieved or legitimately
/// not found, `Partial` when any ended unretrieved or in error, or when the
/// run stopped before every application was processed.
pub(crate) fn determine_exit_outcome(
    outcomes: &[ResolutionOutcome],
    requested: usize,
) -> ProcessExit {
    let troubled = outcomes.iter().any(|outcome| {
        matches!(
            outcome.status,
            ResolutionStatus::FoundNotRetrieved | ResolutionStatus::Error
        )
    });
    if troubled || outcomes.len() < requested {
        ProcessExit::Partial
    } else {
        ProcessExit::Success
    }
}
