//! Progress bar for resolution runs.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use recipe_finder_core::ResolutionOutcome;

/// Creates the run progress bar, hidden when `visible` is false.
pub(crate) fn create_progress(visible: bool, total: usize) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Advances the bar for one finished application.
pub(crate) fn record_outcome(bar: &ProgressBar, outcome: &ResolutionOutcome) {
    bar.set_message(format!("{}: {}", outcome.application, outcome.status));
    bar.inc(1);
}
