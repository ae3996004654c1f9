//! Output tree naming: repository directories and sanitized recipe names.

use std::path::{Path, PathBuf};

/// Characters that are never allowed in a directory component.
const UNSAFE_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Recipe file extensions stripped before type-suffix handling, longest first.
const RECIPE_EXTENSIONS: [&str; 3] = [".recipe.yaml", ".recipe.plist", ".recipe"];

/// Replaces filesystem-unsafe characters with `_` and trims whitespace.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Sanitized name usable as a single path component.
///
/// Empty or dot-only names (`.`, `..`) become `_` so a component can never
/// escape its parent directory.
#[must_use]
pub fn path_component(name: &str) -> String {
    let clean = sanitize_name(name);
    if clean.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        clean
    }
}

/// Strips a trailing `.recipe`, `.recipe.yaml`, or `.recipe.plist` (case-insensitive).
#[must_use]
pub fn strip_recipe_extension(name: &str) -> &str {
    let lower = name.to_ascii_lowercase();
    for ext in RECIPE_EXTENSIONS {
        if lower.ends_with(ext) {
            return &name[..name.len() - ext.len()];
        }
    }
    name
}

/// Returns the longest suffix from `suffixes` that ends `stem`, case-insensitively.
#[must_use]
pub fn matching_suffix<'a>(stem: &str, suffixes: &'a [String]) -> Option<&'a str> {
    let lower = stem.to_ascii_lowercase();
    suffixes
        .iter()
        .filter(|s| !s.is_empty() && lower.ends_with(&s.to_ascii_lowercase()))
        .max_by_key(|s| s.len())
        .map(String::as_str)
}

/// Recipe name without its file extension and type suffix.
///
/// `Firefox.munki.recipe` becomes `Firefox`. A name that is nothing but a
/// suffix keeps its stem so the result is never empty for non-empty input.
#[must_use]
pub fn strip_type_suffix<'a>(name: &'a str, suffixes: &[String]) -> &'a str {
    let stem = strip_recipe_extension(name);
    match matching_suffix(stem, suffixes) {
        Some(suffix) if suffix.len() < stem.len() => &stem[..stem.len() - suffix.len()],
        _ => stem,
    }
}

/// Directory name for a repository: `prefix` + sanitized repository identifier.
///
/// Repository identifiers that already carry the prefix are not prefixed twice.
#[must_use]
pub fn repository_dir_name(prefix: &str, repository: &str) -> String {
    let repo = if repository.trim().is_empty() {
        "unknown".to_string()
    } else {
        path_component(repository)
    };
    if !prefix.is_empty() && repo.starts_with(prefix) {
        repo
    } else {
        format!("{prefix}{repo}")
    }
}

/// Directory holding one recipe's files: `<root>/<repo-dir>/<sanitized-name>`.
#[must_use]
pub fn recipe_dir(
    root: &Path,
    prefix: &str,
    repository: &str,
    recipe_name: &str,
    suffixes: &[String],
) -> PathBuf {
    let app_dir = path_component(strip_type_suffix(recipe_name, suffixes));
    root.join(repository_dir_name(prefix, repository)).join(app_dir)
}
