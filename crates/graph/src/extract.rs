use crate::error::GraphError;
use crate::lexical::LexicalEdgeExtractor;
use crate::types::Edge;
use refactor_catalog::{MetadataStore, ObjectKind, Result, RoutineRef};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Produces the objects one routine depends on.
///
/// Implementations must not fail on odd source text; errors are reserved for
/// metadata store failures.
pub trait EdgeExtractor {
    fn strategy(&self) -> ExtractionStrategy;

    fn extract_edges(
        &self,
        store: &dyn MetadataStore,
        routine: &RoutineRef,
        source: &str,
    ) -> Result<Vec<Edge>>;

    /// Key under which `edge` is claimed in the visited set
    fn visit_key(&self, edge: &Edge) -> String {
        edge.target.canonical_key()
    }

    /// Key under which the root routine is claimed
    fn root_key(&self, root: &RoutineRef) -> String {
        root.canonical_key()
    }
}

/// Edges from the catalog's dependency records.
///
/// Exact for statically bound references; blind to dynamic SQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogEdgeExtractor;

impl EdgeExtractor for CatalogEdgeExtractor {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::Catalog
    }

    fn extract_edges(
        &self,
        store: &dyn MetadataStore,
        routine: &RoutineRef,
        _source: &str,
    ) -> Result<Vec<Edge>> {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();

        for dep in store.fetch_dependencies(routine)? {
            if dep.kind == ObjectKind::Unknown {
                log::debug!("{routine}: skipping {} (unsupported object type)", dep.target);
                continue;
            }
            if seen.insert(dep.target.canonical_key()) {
                edges.push(Edge::catalog(dep.target, dep.kind));
            }
        }

        Ok(edges)
    }
}

/// Selectable edge extraction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategy {
    #[default]
    Catalog,
    Lexical,
}

impl ExtractionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionStrategy::Catalog => "catalog",
            ExtractionStrategy::Lexical => "lexical",
        }
    }

    pub fn extractor(self) -> Box<dyn EdgeExtractor> {
        match self {
            ExtractionStrategy::Catalog => Box::new(CatalogEdgeExtractor),
            ExtractionStrategy::Lexical => Box::new(LexicalEdgeExtractor),
        }
    }
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionStrategy {
    type Err = GraphError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "catalog" => Ok(ExtractionStrategy::Catalog),
            "lexical" => Ok(ExtractionStrategy::Lexical),
            other => Err(GraphError::UnknownStrategy(other.to_string())),
        }
    }
}
