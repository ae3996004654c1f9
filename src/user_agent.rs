//! User-Agent string sent with every catalog and recipe request.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/autopkg/autopkg/wiki/Finding-Recipes";

/// Default User-Agent identifying the tool and its version.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("recipe-finder/{version} (recipe-resolver; +{PROJECT_UA_URL})")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_version_and_project_url() {
        let ua = default_user_agent();
        assert!(ua.contains(PROJECT_UA_URL), "UA must contain project URL: {ua}");
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("recipe-finder/")
                .and_then(|s| s.split(' ').next())
                .unwrap(),
        );
    }
}
