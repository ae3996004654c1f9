//! Assembly of the application list from --input, positional names, and stdin.

use std::io::{self, IsTerminal, Read};

use anyhow::{Context, Result};
use recipe_finder_core::parse_application_list;
use tracing::debug;

use crate::cli::Args;

/// Returns application names in input order: file entries first, then
/// positional names. Piped stdin is read only when neither is given.
pub(crate) fn collect_applications(args: &Args) -> Result<Vec<String>> {
    let stdin_text = if args.input.is_none()
        && args.applications.is_empty()
        && !io::stdin().is_terminal()
    {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read application names from stdin")?;
        Some(buffer)
    } else {
        None
    };
    assemble(args, stdin_text.as_deref())
}

fn assemble(args: &Args, stdin_text: Option<&str>) -> Result<Vec<String>> {
    let mut applications = Vec::new();

    if let Some(path) = &args.input {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display()))?;
        let names = parse_application_list(&text);
        debug!(path = %path.display(), count = names.len(), "applications read from input file");
        applications.extend(names);
    }

    applications.extend(
        args.applications
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()),
    );

    if let Some(text) = stdin_text {
        applications.extend(parse_application_list(text));
    }
    Ok(applications)
}
