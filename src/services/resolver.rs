//! API display-name resolution
//!
//! Turns what an operator types ("Compute Engine", "storage api") into a
//! service id. Tiers, first decision wins:
//!
//! 1. exact display name
//! 2. normalized name (lowercase, "cloud" removed, whitespace collapsed)
//! 3. for inputs under 10 characters, case-insensitive substring; more than
//!    one hit is ambiguous, none falls through
//! 4. similarity ratio of at least 0.6; exactly one candidate wins

use super::registry::ApiNameTable;
use super::similarity::close_matches;
use crate::error::{Error, Result};

/// Inputs shorter than this go through the substring tier
const SHORT_QUERY_LEN: usize = 10;

const FUZZY_CUTOFF: f64 = 0.6;

/// Candidates reported with an ambiguity error
const MAX_CANDIDATES: usize = 5;

/// How a name was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Normalized,
    Substring,
    Fuzzy,
}

/// A resolved API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiMatch {
    pub display_name: String,
    pub service_id: String,
    pub kind: MatchKind,
}

/// Lowercase, drop every "cloud", collapse whitespace
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
        .replace("cloud", "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves API display names against a table
#[derive(Debug, Clone)]
pub struct ApiResolver {
    table: ApiNameTable,
    /// (normalized name, display name), in display-name order
    normalized: Vec<(String, String)>,
}

impl ApiResolver {
    pub fn new(table: ApiNameTable) -> Self {
        let normalized = table
            .names()
            .map(|name| (normalize(name), name.to_string()))
            .collect();
        Self { table, normalized }
    }

    /// Resolver over the bundled table
    pub fn bundled() -> Result<Self> {
        Ok(Self::new(ApiNameTable::bundled()?))
    }

    pub fn table(&self) -> &ApiNameTable {
        &self.table
    }

    /// Service id for `name`
    pub fn resolve(&self, name: &str) -> Result<String> {
        self.lookup(name).map(|m| m.service_id)
    }

    /// Resolve `name`, reporting which tier matched
    pub fn lookup(&self, name: &str) -> Result<ApiMatch> {
        if let Some(id) = self.table.get(name) {
            return Ok(self.found(name, id, MatchKind::Exact));
        }

        let wanted = normalize(name);
        if let Some((_, display)) = self.normalized.iter().find(|(n, _)| *n == wanted) {
            return Ok(self.matched(display, MatchKind::Normalized));
        }

        if name.chars().count() < SHORT_QUERY_LEN {
            let needle = name.to_lowercase();
            let hits: Vec<&str> = self
                .table
                .names()
                .filter(|k| k.to_lowercase().contains(&needle))
                .collect();

            match hits.as_slice() {
                [] => {},
                [only] => return Ok(self.matched(only, MatchKind::Substring)),
                several => {
                    tracing::debug!("'{}' matches {} API names", name, several.len());
                    return Err(Error::Ambiguous {
                        query: name.to_string(),
                        candidates: several
                            .iter()
                            .take(MAX_CANDIDATES)
                            .map(|s| s.to_string())
                            .collect(),
                    });
                },
            }
        }

        let candidates = close_matches(name, self.table.names(), MAX_CANDIDATES, FUZZY_CUTOFF);
        match candidates.as_slice() {
            [] => Err(Error::not_found(format!("API '{}'", name))),
            [(only, score)] => {
                tracing::debug!("'{}' fuzzy-matched '{}' ({:.3})", name, only, score);
                Ok(self.matched(only, MatchKind::Fuzzy))
            },
            several => Err(Error::Ambiguous {
                query: name.to_string(),
                candidates: several.iter().map(|(c, _)| c.to_string()).collect(),
            }),
        }
    }

    fn matched(&self, display_name: &str, kind: MatchKind) -> ApiMatch {
        let id = self.table.get(display_name).unwrap_or_default();
        self.found(display_name, id, kind)
    }

    fn found(&self, display_name: &str, id: &str, kind: MatchKind) -> ApiMatch {
        ApiMatch {
            display_name: display_name.to_string(),
            service_id: id.to_string(),
            kind,
        }
    }
}
