//! # Refactor Graph
//!
//! Dependency resolution for stored routines: starting from one procedure or
//! function, discover every table, view, function and procedure it reaches
//! within a bounded depth and describe each of them for a downstream prompt.
//!
//! ## Architecture
//!
//! ```text
//! RoutineRef + max_depth
//!     │
//!     ├──> Edge Extractor (strategy)
//!     │      ├─ Catalog: dependency records of the metadata store
//!     │      └─ Lexical: FROM/JOIN/INTO/UPDATE/DELETE, name(, EXEC patterns
//!     │
//!     ├──> Graph Resolver
//!     │      ├─ claim each object once (VisitedSet)
//!     │      ├─ tables/views → column lists (leaves)
//!     │      ├─ functions/procedures → 500-char snippet, recurse depth - 1
//!     │      └─ lookup failures → error nodes, traversal continues
//!     │
//!     └──> ResolutionContext (+ DependencyGraph when traced)
//!            └─ { "<name>": { "type", "columns" | "definition" } | { "error" } }
//! ```

mod error;
mod extract;
mod graph;
mod lexical;
mod params;
mod resolver;
mod types;

pub use error::{GraphError, Result};
pub use extract::{CatalogEdgeExtractor, EdgeExtractor, ExtractionStrategy};
pub use graph::{DependencyGraph, GraphObject};
pub use lexical::{scan_candidates, LexicalCandidates, LexicalEdgeExtractor};
pub use params::{describe_parameter_types, extract_parameter_types, TypeDescription, TypeReference};
pub use resolver::{GraphResolver, Resolution, VisitedSet};
pub use types::{
    definition_snippet, DependencyNode, Edge, EdgeOrigin, NodeDetail, ResolutionContext,
    DEFINITION_SNIPPET_CHARS,
};
