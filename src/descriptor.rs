//! Minimal recipe descriptor parsing: parent reference and deprecation flag.
//!
//! Only plist XML and YAML recipes are recognized, and only the two facts the
//! resolver needs are extracted. Nothing else about the recipe is validated.

use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static PLIST_PARENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<key>\s*ParentRecipe\s*</key>\s*<string>([^<]+)</string>")
        .expect("plist parent regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static YAML_PARENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*ParentRecipe:[ \t]*([^\n]+)").expect("yaml parent regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static DEPRECATION_PROCESSOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(<string>\s*[\w.]*DeprecationWarning\s*</string>|^[ \t-]*Processor:[ \t]*[\w.]*DeprecationWarning\b)")
        .expect("deprecation processor regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static DEPRECATED_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)(<key>\s*Deprecated\s*</key>\s*<true\s*/>|^[ \t]*Deprecated:[ \t]*(true|yes)\b)")
        .expect("deprecated key regex is valid") // Static pattern, safe to panic
});

/// Facts extracted from a fetched recipe file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeDescriptor {
    /// Identifier of the parent recipe, if any.
    pub parent_reference: Option<String>,
    /// File-level deprecation, independent of the catalog flag.
    pub is_deprecated: bool,
}

impl RecipeDescriptor {
    /// Parses recipe content. Unrecognized content yields an empty descriptor.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let parent_reference = PLIST_PARENT
            .captures(content)
            .or_else(|| YAML_PARENT.captures(content))
            .and_then(|c| c.get(1))
            .map(|m| clean_reference(m.as_str()))
            .filter(|r| !r.is_empty());

        Self {
            parent_reference,
            is_deprecated: DEPRECATION_PROCESSOR.is_match(content)
                || DEPRECATED_KEY.is_match(content),
        }
    }
}

/// Trims whitespace, surrounding quotes, and trailing YAML comments.
fn clean_reference(raw: &str) -> String {
    let raw = match raw.find(" #") {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    raw.trim().trim_matches(['"', '\'']).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLIST_CHILD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>Identifier</key>
    <string>com.github.autopkg.munki.Firefox</string>
    <key>ParentRecipe</key>
    <string>com.github.autopkg.download.Firefox</string>
    <key>Process</key>
    <array/>
</dict>
</plist>"#;

    const YAML_CHILD: &str = "Identifier: com.github.example.munki.Zoom\n\
                              ParentRecipe: \"com.github.example.download.Zoom\"  # upstream\n\
                              Process: []\n";

    #[test]
    fn test_parse_plist_parent() {
        let descriptor = RecipeDescriptor::parse(PLIST_CHILD);
        assert_eq!(
            descriptor.parent_reference.as_deref(),
            Some("com.github.autopkg.download.Firefox")
        );
        assert!(!descriptor.is_deprecated);
    }

    #[test]
    fn test_parse_yaml_parent_strips_quotes_and_comment() {
        let descriptor = RecipeDescriptor::parse(YAML_CHILD);
        assert_eq!(
            descriptor.parent_reference.as_deref(),
            Some("com.github.example.download.Zoom")
        );
    }

    #[test]
    fn test_parse_without_parent() {
        let descriptor = RecipeDescriptor::parse(
            "<plist><dict><key>Identifier</key><string>x</string></dict></plist>",
        );
        assert_eq!(descriptor, RecipeDescriptor::default());
        assert_eq!(RecipeDescriptor::parse(""), RecipeDescriptor::default());
    }

    #[test]
    fn test_parse_empty_parent_is_none() {
        let descriptor = RecipeDescriptor::parse("ParentRecipe: ''\n");
        assert_eq!(descriptor.parent_reference, None);
    }

    #[test]
    fn test_parse_deprecation_warning_processor() {
        let plist = "<dict><key>Processor</key><string>DeprecationWarning</string></dict>";
        assert!(RecipeDescriptor::parse(plist).is_deprecated);

        let yaml = "Process:\n  - Processor: DeprecationWarning\n    Arguments: {}\n";
        assert!(RecipeDescriptor::parse(yaml).is_deprecated);
    }

    #[test]
    fn test_parse_deprecated_key() {
        assert!(RecipeDescriptor::parse("<key>Deprecated</key>\n<true/>").is_deprecated);
        assert!(RecipeDescriptor::parse("Deprecated: true\n").is_deprecated);
        assert!(!RecipeDescriptor::parse("Deprecated: false\n").is_deprecated);
    }
}
