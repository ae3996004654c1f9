use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::EngineError;
use crate::layout::{path_component, recipe_dir};
use crate::recipe::CandidateRecipe;

/// Result of writing one recipe file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PersistOutcome {
    /// File was newly written.
    Written(PathBuf),
    /// An identical file already existed.
    Reused(PathBuf),
    /// A different file already existed; nothing was written.
    Collision(PathBuf),
}

/// Writes recipe files into `<root>/<repo-dir>/<sanitized-name>/<file-name>`.
#[derive(Debug, Clone)]
pub(crate) struct RecipeStore {
    root: PathBuf,
    repository_prefix: String,
    suffixes: Vec<String>,
}

impl RecipeStore {
    pub(crate) fn new(
        root: impl Into<PathBuf>,
        repository_prefix: impl Into<String>,
        suffixes: Vec<String>,
    ) -> Self {
        Self {
            root: root.into(),
            repository_prefix: repository_prefix.into(),
            suffixes,
        }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn target_path(&self, candidate: &CandidateRecipe) -> PathBuf {
        let file_name = if candidate.file_name.trim().is_empty() {
            &candidate.name
        } else {
            &candidate.file_name
        };
        recipe_dir(
            &self.root,
            &self.repository_prefix,
            &candidate.repository,
            &candidate.name,
            &self.suffixes,
        )
        .join(path_component(file_name))
    }

    /// Path relative to the output root, `/`-separated.
    pub(crate) fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Writes `content` for `candidate`, never replacing a different existing file.
    pub(crate) async fn persist(
        &self,
        candidate: &CandidateRecipe,
        content: &str,
    ) -> Result<PersistOutcome, EngineError> {
        let path = self.target_path(candidate);

        match tokio::fs::read(&path).await {
            Ok(existing) if existing == content.as_bytes() => {
                debug!(path = %path.display(), "identical recipe already present");
                return Ok(PersistOutcome::Reused(path));
            }
            Ok(_) => {
                warn!(
                    path = %path.display(),
                    recipe = %candidate.name,
                    "different recipe file already present, not overwriting"
                );
                return Ok(PersistOutcome::Collision(path));
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => return Err(EngineError::io(path, error)),
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EngineError::io(parent, e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| EngineError::io(&path, e))?;
        debug!(path = %path.display(), bytes = content.len(), "recipe written");
        Ok(PersistOutcome::Written(path))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ResolutionConfig;

    fn store(root: &Path) -> RecipeStore {
        let config = ResolutionConfig::default();
        RecipeStore::new(root, config.repository_prefix, config.recipe_suffixes)
    }

    fn candidate() -> CandidateRecipe {
        CandidateRecipe::new(
            "Firefox.munki.recipe",
            "munki",
            "recipes",
            "https://github.com/autopkg/recipes/blob/master/Mozilla/Firefox.munki.recipe",
        )
    }

    #[test]
    fn test_target_path_layout() {
        let store = store(Path::new("/out"));
        let path = store.target_path(&candidate());
        assert_eq!(
            path,
            PathBuf::from("/out/com.github.autopkg.recipes/Firefox/Firefox.munki.recipe")
        );
        assert_eq!(
            store.relative(&path),
            "com.github.autopkg.recipes/Firefox/Firefox.munki.recipe"
        );
    }

    #[test]
    fn test_target_path_neutralizes_traversal() {
        let store = store(Path::new("/out"));
        let evil = CandidateRecipe::new("../../x.munki.recipe", "munki", "..", "")
            .with_file_name("..");
        let path = store.target_path(&evil);
        assert!(path.starts_with("/out"));
        assert!(!path.components().any(|c| c.as_os_str() == ".."));
    }

    #[tokio::test]
    async fn test_persist_writes_then_reuses_identical() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = store(temp.path());

        let first = store.persist(&candidate(), "<plist/>").await.unwrap();
        let PersistOutcome::Written(path) = first else {
            panic!("expected Written, got {first:?}");
        };
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<plist/>");

        let second = store.persist(&candidate(), "<plist/>").await.unwrap();
        assert_eq!(second, PersistOutcome::Reused(path));
    }

    #[tokio::test]
    async fn test_persist_collision_keeps_existing_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = store(temp.path());

        store.persist(&candidate(), "original").await.unwrap();
        let outcome = store.persist(&candidate(), "different").await.unwrap();
        let PersistOutcome::Collision(path) = outcome else {
            panic!("expected Collision, got {outcome:?}");
        };
        assert_eq!(std::fs::read_to_string(path).unwrap(), "original");
    }
}
