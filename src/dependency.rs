//! Parent-chain resolution for a selected recipe.
//!
//! Starting from the selected recipe, each member is fetched, its descriptor
//! parsed, and its parent (if any) looked up in the catalog. The walk is a
//! plain loop over the current work item with a visited set of normalized
//! identifiers, so cyclic or self-referencing chains always terminate.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, info, instrument, warn};

use crate::catalog::RecipeCatalog;
use crate::descriptor::RecipeDescriptor;
use crate::layout::strip_recipe_extension;
use crate::recipe::CandidateRecipe;

/// One fetched chain member.
#[derive(Debug, Clone)]
pub struct RetrievedRecipe {
    /// Catalog entry the file was fetched for.
    pub candidate: CandidateRecipe,
    /// Raw file content.
    pub content: String,
    /// Facts parsed from the content.
    pub descriptor: RecipeDescriptor,
}

/// Why the parent walk stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainTermination {
    /// The last member has no parent.
    Complete,
    /// The selected recipe itself could not be fetched.
    RootUnretrieved {
        /// Fetch failure description.
        error: String,
    },
    /// An ancestor was found in the catalog but could not be fetched.
    ParentUnretrieved {
        /// Name of the ancestor.
        recipe: String,
        /// Fetch failure description.
        error: String,
    },
    /// A parent reference matched nothing in the catalog.
    ParentNotFound {
        /// The unresolved reference.
        reference: String,
    },
    /// A parent reference pointed back into the chain.
    Cycle {
        /// The repeated identifier.
        reference: String,
    },
}

impl ChainTermination {
    /// True when the walk reached a recipe without parent.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl fmt::Display for ChainTermination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => f.write_str("chain complete"),
            Self::RootUnretrieved { error } => write!(f, "recipe could not be retrieved: {error}"),
            Self::ParentUnretrieved { recipe, error } => {
                write!(f, "incomplete chain: parent {recipe} could not be retrieved: {error}")
            }
            Self::ParentNotFound { reference } => {
                write!(f, "incomplete chain: parent {reference} not found in catalog")
            }
            Self::Cycle { reference } => {
                write!(f, "incomplete chain: parent {reference} repeats an earlier recipe")
            }
        }
    }
}

/// Retrieved chain members, root first, and the reason the walk stopped.
#[derive(Debug, Clone)]
pub struct ResolvedChain {
    /// Fetched members in order; empty when the root fetch failed.
    pub members: Vec<RetrievedRecipe>,
    /// Why resolution stopped.
    pub termination: ChainTermination,
}

/// Walks parent references through a catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyResolver;

impl DependencyResolver {
    /// Fetches `root` and each ancestor until none remain or one is unresolvable.
    #[instrument(skip_all, fields(root = %root.name))]
    pub async fn resolve_chain(
        root: CandidateRecipe,
        catalog: &dyn RecipeCatalog,
    ) -> ResolvedChain {
        let mut members: Vec<RetrievedRecipe> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(normalize_identifier(&root.name));
        let mut current = root;

        let termination = loop {
            let content = match catalog.fetch(&current).await {
                Ok(content) => content,
                Err(error) => {
                    warn!(recipe = %current.name, error = %error, "recipe fetch failed");
                    break if members.is_empty() {
                        ChainTermination::RootUnretrieved {
                            error: error.to_string(),
                        }
                    } else {
                        ChainTermination::ParentUnretrieved {
                            recipe: current.name.clone(),
                            error: error.to_string(),
                        }
                    };
                }
            };

            let descriptor = RecipeDescriptor::parse(&content);
            if descriptor.is_deprecated {
                warn!(recipe = %current.name, "recipe file is marked deprecated");
            }
            let parent = descriptor.parent_reference.clone();
            debug!(recipe = %current.name, parent = ?parent, "fetched chain member");
            members.push(RetrievedRecipe {
                candidate: current,
                content,
                descriptor,
            });

            let Some(reference) = parent else {
                break ChainTermination::Complete;
            };

            let reference_key = normalize_identifier(&reference);
            if visited.contains(&reference_key) {
                warn!(reference = %reference, "parent reference cycle detected");
                break ChainTermination::Cycle { reference };
            }

            let Some(next) = lookup_parent(&reference, catalog, &visited).await else {
                warn!(reference = %reference, "parent recipe not found in catalog");
                break ChainTermination::ParentNotFound { reference };
            };

            let name_key = normalize_identifier(&next.name);
            if visited.contains(&name_key) {
                warn!(
                    reference = %reference,
                    recipe = %next.name,
                    "parent resolves to an earlier recipe"
                );
                break ChainTermination::Cycle { reference: next.name };
            }
            visited.insert(reference_key);
            visited.insert(name_key);

            info!(reference = %reference, parent = %next.name, "resolved parent recipe");
            current = next;
        };

        ResolvedChain {
            members,
            termination,
        }
    }
}

/// Finds the catalog entry best matching a parent reference.
///
/// Hits from every query are pooled first, then tried in order: exact name,
/// name derived from a dotted identifier, first non-deprecated hit not
/// already in the chain.
async fn lookup_parent(
    reference: &str,
    catalog: &dyn RecipeCatalog,
    visited: &HashSet<String>,
) -> Option<CandidateRecipe> {
    let derived = derived_recipe_name(reference);
    let mut queries = vec![reference.to_string()];
    if let Some((_, app)) = identifier_parts(reference)
        && !app.eq_ignore_ascii_case(reference)
    {
        queries.push(app.to_string());
    }

    let mut hits = Vec::new();
    for query in queries {
        hits.extend(catalog.search(&query, None).await);
    }
    best_match(&hits, reference, derived.as_deref(), visited)
}

fn best_match(
    hits: &[CandidateRecipe],
    reference: &str,
    derived: Option<&str>,
    visited: &HashSet<String>,
) -> Option<CandidateRecipe> {
    let wanted = normalize_identifier(reference);
    if let Some(hit) = hits.iter().find(|c| normalize_identifier(&c.name) == wanted) {
        return Some(hit.clone());
    }
    if let Some(derived) = derived.map(normalize_identifier)
        && let Some(hit) = hits.iter().find(|c| normalize_identifier(&c.name) == derived)
    {
        return Some(hit.clone());
    }
    hits.iter()
        .find(|c| !c.deprecated && !visited.contains(&normalize_identifier(&c.name)))
        .cloned()
}

/// Splits a reverse-domain identifier into `(type, app)`.
///
/// `com.github.autopkg.download.Firefox` yields `("download", "Firefox")`.
/// Plain recipe names are not identifiers.
fn identifier_parts(reference: &str) -> Option<(&str, &str)> {
    let reference = reference.trim();
    if strip_recipe_extension(reference).len() != reference.len() {
        return None;
    }
    let mut segments = reference.rsplitn(3, '.');
    let app = segments.next()?;
    let recipe_type = segments.next()?;
    segments.next()?;
    if app.is_empty() || recipe_type.is_empty() {
        return None;
    }
    Some((recipe_type, app))
}

/// Recipe file name implied by an identifier, e.g. `Firefox.download.recipe`.
fn derived_recipe_name(reference: &str) -> Option<String> {
    identifier_parts(reference).map(|(recipe_type, app)| format!("{app}.{recipe_type}.recipe"))
}

/// Case-insensitive identifier with any recipe file extension removed.
fn normalize_identifier(identifier: &str) -> String {
    strip_recipe_extension(identifier.trim()).to_ascii_lowercase()
}
