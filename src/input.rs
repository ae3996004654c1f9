//! Application list input: CSV with an `Application` column, or one name per line.

use tracing::{debug, warn};

/// Column holding application names in CSV input.
pub const APPLICATION_COLUMN: &str = "Application";

/// Extracts application names from input text, preserving order.
///
/// When the first non-blank line is a CSV header containing an
/// `Application` column (case-insensitive), that column is read from every
/// following row. Otherwise each non-blank line not starting with `#` is one
/// name. Blank names are dropped.
#[must_use]
pub fn parse_application_list(text: &str) -> Vec<String> {
    let mut lines = text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .peekable();

    let column = lines.peek().and_then(|header| {
        split_csv_line(header)
            .iter()
            .position(|field| field.trim().eq_ignore_ascii_case(APPLICATION_COLUMN))
    });

    let Some(column) = column else {
        return lines
            .filter(|line| !line.trim_start().starts_with('#'))
            .map(|line| line.trim().to_string())
            .collect();
    };

    lines.next();
    let mut names = Vec::new();
    for (row, line) in lines.enumerate() {
        let fields = split_csv_line(line);
        match fields.get(column).map(|f| f.trim()) {
            Some(name) if !name.is_empty() => names.push(name.to_string()),
            Some(_) => debug!(row = row + 2, "empty application name, skipping"),
            None => warn!(row = row + 2, "row has no Application column, skipping"),
        }
    }
    names
}

/// Splits one CSV line, honoring double-quoted fields and `""` escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', _) => in_quotes = !in_quotes,
            (',', false) => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}
