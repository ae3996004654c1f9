//! CLI entry point for the recipe-finder tool.

use std::process::ExitCode;

mod app;
mod cli;

/// Process exit outcome mapped to the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every application was retrieved or legitimately not found.
    Success,
    /// Some applications ended unretrieved or in error.
    Partial,
    /// Setup failed before any application was processed.
    Failure,
}

impl ProcessExit {
    fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let exit = match app::runtime::run_recipe_finder().await {
        Ok(exit) => exit,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "fatal error");
            eprintln!("Error: {err:#}");
            ProcessExit::Failure
        }
    };
    ExitCode::from(exit.code())
}
