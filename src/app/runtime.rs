use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use recipe_finder_core::{
    CommandDownloadFinder, HttpCatalog, LastMileProcessor, RecipeRobotAuthor, ResolutionOutcome,
    RetrievalEngine, RunReport,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::config_manager::{self, LastMileSettings};
use crate::app::{exit_handler, input_processor, progress_manager, terminal};
use crate::cli::Args;

pub(crate) async fn run_recipe_finder() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let no_color = terminal::should_disable_color(
        terminal::no_color_env_requested(),
        terminal::is_dumb_terminal(),
    );
    terminal::init_tracing(terminal::default_log_level(args.quiet, args.verbose), no_color);

    debug!(?args, "CLI arguments parsed");

    let resolved = config_manager::resolve_config(&args)?;
    let applications = input_processor::collect_applications(&args)?;
    if applications.is_empty() {
        info!("No applications provided. Pass names as arguments, use --input, or pipe a list via stdin.");
        return Ok(ProcessExit::Success);
    }
    info!(
        applications = applications.len(),
        output_dir = %resolved.output_dir.display(),
        "recipe-finder starting"
    );

    let catalog = HttpCatalog::new(&resolved.resolution).context("Failed to build catalog client")?;
    let engine = RetrievalEngine::new(
        resolved.resolution.clone(),
        Arc::new(catalog),
        resolved.output_dir.clone(),
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    let show_progress = terminal::should_show_progress(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    );
    let progress = progress_manager::create_progress(show_progress, applications.len());
    let mut outcomes = engine
        .process_observed(&applications, &interrupted, |outcome| {
            progress_manager::record_outcome(&progress, outcome);
        })
        .await;
    progress.finish_and_clear();

    if let Some(settings) = &resolved.last_mile {
        run_last_mile(settings, &resolved.output_dir, &mut outcomes, &interrupted).await;
    }

    let report = RunReport::from_outcomes(&outcomes);
    if let Some(path) = &args.results {
        write_json(path, &outcomes).context("Failed to write results file")?;
        info!(path = %path.display(), "results written");
    }
    if let Some(path) = &args.report {
        write_json(path, &report).context("Failed to write report file")?;
        info!(path = %path.display(), "report written");
    }
    if !args.quiet {
        print!("{}", report.render_text());
    }

    if interrupted.load(Ordering::SeqCst) {
        warn!(
            processed = outcomes.len(),
            requested = applications.len(),
            "run interrupted"
        );
    }
    Ok(exit_handler::determine_exit_outcome(&outcomes, applications.len()))
}

async fn run_last_mile(
    settings: &LastMileSettings,
    output_dir: &Path,
    outcomes: &mut [ResolutionOutcome],
    stop: &AtomicBool,
) {
    let processor = LastMileProcessor::new(
        Arc::new(CommandDownloadFinder::new(&settings.discovery_command)),
        Arc::new(RecipeRobotAuthor::new(
            &settings.recipe_robot,
            settings.prefix.clone(),
            output_dir,
        )),
    );
    let processed = processor.apply(outcomes, stop).await;
    if processed > 0 {
        info!(processed, "last-mile fallback finished");
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
