#![allow(dead_code)]

pub mod socket_guard;

use std::time::Duration;

use recipe_finder_core::ResolutionConfig;

/// Resolution policy pointed at a mock catalog, with delays shrunk for tests.
pub fn test_config(catalog_url: &str) -> ResolutionConfig {
    ResolutionConfig {
        catalog_url: catalog_url.to_string(),
        retry_delay: Duration::from_millis(10),
        politeness_delay: Duration::ZERO,
        request_timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        ..ResolutionConfig::default()
    }
}

/// One `tr.recipe-row` as rendered by the catalog search page.
pub fn recipe_row(name: &str, badge: &str, repository: &str, locator: &str, stars: u64) -> String {
    format!(
        r#"<tr class="recipe-row" data-stars="{stars}">
  <td><strong>{name}</strong></td>
  <td><span class="badge">{badge}</span></td>
  <td><div class="description-content">Recipe for {name}</div></td>
  <td><a href="https://github.com/autopkg/{repository}">{repository}</a></td>
  <td><a href="{locator}">{name}</a></td>
</tr>"#
    )
}

/// Search page wrapping the given rows.
pub fn search_page(rows: &[String]) -> String {
    format!(
        "<html><body><table><thead><tr><th>Name</th></tr></thead><tbody>\n{}\n</tbody></table></body></html>",
        rows.join("\n")
    )
}

/// Minimal plist recipe, optionally naming a parent.
pub fn plist_recipe(identifier: &str, parent: Option<&str>) -> String {
    let parent = parent
        .map(|p| format!("    <key>ParentRecipe</key>\n    <string>{p}</string>\n"))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>Identifier</key>
    <string>{identifier}</string>
{parent}    <key>Process</key>
    <array/>
</dict>
</plist>
"#
    )
}
