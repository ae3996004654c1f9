//! Conversion of raw catalog responses into [`CandidateRecipe`] lists.
//!
//! Two response formats are understood:
//! - HTML search pages, one `<tr class="recipe-row">` per recipe with at least
//!   five cells: name, type badge, description, repository link, file link.
//! - Line-oriented index text, one tab-separated record per line:
//!   `name, repository, locator[, popularity[, badge]]`.
//!
//! Parsing never fails as a whole: rows that cannot be interpreted are logged
//! and skipped.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace, warn};

use super::client::RawResults;
use crate::config::CatalogFormat;
use crate::layout::{matching_suffix, strip_recipe_extension};
use crate::recipe::{CandidateRecipe, file_name_from_locator};

/// Minimum number of `<td>` cells for a usable HTML row.
const MIN_ROW_CELLS: usize = 5;

#[allow(clippy::expect_used)]
static ROW_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<tr\b([^>]*)>(.*?)</tr>").expect("row regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static CELL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>").expect("cell regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static CLASS_ATTR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bclass\s*=\s*["']([^"']*)["']"#).expect("class regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static HREF_ATTR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']*)["']"#).expect("href regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static STARS_ATTR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bdata-stars\s*=\s*["']?([\d,]+)"#).expect("stars attr regex is valid") // Static pattern, safe to panic
});

/// Opening tag of any element, capturing tag name and attributes.
#[allow(clippy::expect_used)]
static ELEMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<([a-z][a-z0-9]*)\b([^>]*)>").expect("element regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a>").expect("link regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<[^>]*>").expect("tag regex is valid") // Static pattern, safe to panic
});

/// Normalizes catalog responses into candidates.
#[derive(Debug, Clone)]
pub struct ResultParser {
    suffixes: Vec<String>,
}

impl ResultParser {
    /// Creates a parser deriving recipe types from `suffixes` when no badge is present.
    #[must_use]
    pub fn new(suffixes: Vec<String>) -> Self {
        Self { suffixes }
    }

    /// Parses every page of a raw result set, preserving catalog order.
    #[must_use]
    pub fn parse(&self, raw: &RawResults) -> Vec<CandidateRecipe> {
        raw.pages
            .iter()
            .flat_map(|page| match raw.format {
                CatalogFormat::Web => self.parse_html(page),
                CatalogFormat::Index => self.parse_lines(page),
            })
            .collect()
    }

    /// Parses an HTML search page.
    #[must_use]
    pub fn parse_html(&self, html: &str) -> Vec<CandidateRecipe> {
        let mut candidates = Vec::new();
        for (index, row) in ROW_PATTERN.captures_iter(html).enumerate() {
            let attrs = row.get(1).map_or("", |m| m.as_str());
            if !has_class(attrs, "recipe-row") {
                continue;
            }
            let body = row.get(2).map_or("", |m| m.as_str());
            match self.parse_row(attrs, body) {
                Ok(candidate) => candidates.push(candidate),
                Err(reason) => debug!(row = index, reason, "skipping catalog row"),
            }
        }
        trace!(count = candidates.len(), "parsed HTML results");
        candidates
    }

    fn parse_row(&self, attrs: &str, body: &str) -> Result<CandidateRecipe, &'static str> {
        let cells: Vec<&str> = CELL_PATTERN
            .captures_iter(body)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        if cells.len() < MIN_ROW_CELLS {
            return Err("fewer than five cells");
        }

        let name = text_content(cells[0]);
        if name.is_empty() {
            return Err("empty recipe name");
        }

        let badges = elements_with_class(cells[1], "badge");
        let badge_deprecated = badges
            .iter()
            .any(|b| b.to_ascii_lowercase().contains("deprecated"));
        let badge_type = badges
            .iter()
            .find(|b| !b.to_ascii_lowercase().contains("deprecated"))
            .map(|b| b.trim().to_ascii_lowercase());

        let description = elements_with_class(cells[2], "description-content")
            .into_iter()
            .next()
            .unwrap_or_default();

        let (repo_text, repo_href) = first_link(cells[3]).unwrap_or_default();
        let repository = if repo_text.is_empty() {
            file_name_from_locator(&repo_href).unwrap_or_default()
        } else {
            repo_text
        };

        let (file_text, locator) = first_link(cells[4]).unwrap_or_default();

        let popularity = popularity_from(attrs).or_else(|| popularity_from(body));

        let recipe_type = badge_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.derive_type(&name));
        let deprecated = badge_deprecated || is_lexically_deprecated(&name);

        let mut candidate = CandidateRecipe::new(name, recipe_type, repository, locator)
            .with_popularity(popularity.unwrap_or(0))
            .with_deprecated(deprecated);
        if !file_text.is_empty() {
            candidate = candidate.with_file_name(file_text);
        }
        candidate.description = description;
        Ok(candidate)
    }

    /// Parses line-oriented index text.
    #[must_use]
    pub fn parse_lines(&self, text: &str) -> Vec<CandidateRecipe> {
        let mut candidates = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            if fields[0].eq_ignore_ascii_case("name") {
                continue;
            }
            match self.parse_line(index + 1, &fields) {
                Ok(candidate) => candidates.push(candidate),
                Err(reason) => warn!(line = index + 1, reason, "skipping malformed index line"),
            }
        }
        trace!(count = candidates.len(), "parsed index results");
        candidates
    }

    /// Missing trailing fields read as empty; only an empty name rejects the line.
    fn parse_line(&self, line: usize, fields: &[&str]) -> Result<CandidateRecipe, &'static str> {
        let field = |i: usize| fields.get(i).copied().unwrap_or("");
        let name = field(0);
        if name.is_empty() {
            return Err("empty recipe name");
        }
        let popularity = match field(3) {
            "" => 0,
            raw => parse_count(raw).unwrap_or_else(|| {
                warn!(line, value = raw, "popularity is not a number, using 0");
                0
            }),
        };
        let badge = field(4).to_ascii_lowercase();
        let badge_deprecated = badge.contains("deprecated");
        let recipe_type = if badge.is_empty() || badge_deprecated {
            self.derive_type(name)
        } else {
            badge
        };

        Ok(CandidateRecipe::new(name, recipe_type, field(1), field(2))
            .with_popularity(popularity)
            .with_deprecated(badge_deprecated || is_lexically_deprecated(name)))
    }

    /// Type from the longest configured suffix on `name`, empty when none match.
    #[must_use]
    pub fn derive_type(&self, name: &str) -> String {
        matching_suffix(strip_recipe_extension(name), &self.suffixes)
            .map(|s| s.trim_start_matches('.').to_ascii_lowercase())
            .unwrap_or_default()
    }
}

fn is_lexically_deprecated(name: &str) -> bool {
    name.to_ascii_lowercase().contains("deprecated")
}

fn has_class(attrs: &str, class: &str) -> bool {
    CLASS_ATTR_PATTERN
        .captures(attrs)
        .and_then(|c| c.get(1))
        .is_some_and(|m| m.as_str().split_whitespace().any(|c| c == class))
}

/// Text of every element in `html` carrying `class`, up to its matching close tag.
fn elements_with_class(html: &str, class: &str) -> Vec<String> {
    let mut texts = Vec::new();
    for open in ELEMENT_PATTERN.captures_iter(html) {
        let (Some(whole), Some(tag), Some(attrs)) = (open.get(0), open.get(1), open.get(2)) else {
            continue;
        };
        if !has_class(attrs.as_str(), class) {
            continue;
        }
        let rest = &html[whole.end()..];
        let close = format!("</{}", tag.as_str().to_ascii_lowercase());
        let end = rest.to_ascii_lowercase().find(&close).unwrap_or(rest.len());
        texts.push(text_content(&rest[..end]));
    }
    texts
}

fn first_link(html: &str) -> Option<(String, String)> {
    let link = LINK_PATTERN.captures(html)?;
    let attrs = link.get(1).map_or("", |m| m.as_str());
    let href = HREF_ATTR_PATTERN
        .captures(attrs)
        .and_then(|c| c.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
        .unwrap_or_default();
    let text = text_content(link.get(2).map_or("", |m| m.as_str()));
    Some((text, href))
}

fn popularity_from(html: &str) -> Option<u64> {
    if let Some(raw) = STARS_ATTR_PATTERN.captures(html).and_then(|c| c.get(1)) {
        return parse_count(raw.as_str());
    }
    elements_with_class(html, "stars")
        .into_iter()
        .find_map(|text| parse_count(&text))
}

/// Parses `1,234` or `★ 42`-style counts by keeping the first digit run.
fn parse_count(raw: &str) -> Option<u64> {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Strips tags, decodes common entities and collapses whitespace.
fn text_content(html: &str) -> String {
    let stripped = TAG_PATTERN.replace_all(html, " ");
    decode_entities(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}
