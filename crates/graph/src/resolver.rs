use crate::error::{GraphError, Result};
use crate::extract::EdgeExtractor;
use crate::graph::DependencyGraph;
use crate::types::{DependencyNode, Edge, EdgeOrigin, ResolutionContext};
use refactor_catalog::{MetadataStore, ObjectKind, RoutineClass, RoutineRef};
use std::collections::HashSet;

/// Keys already claimed by one top-level resolution
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    keys: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Membership check and insertion in one step: `true` if the caller now
    /// owns `key`, `false` if someone claimed it before.
    pub fn claim(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn claimed_count(&self) -> usize {
        self.keys.len()
    }
}

/// Everything one traversal produced
#[derive(Debug)]
pub struct Resolution {
    pub root: RoutineRef,
    pub root_kind: ObjectKind,
    pub context: ResolutionContext,
    pub graph: DependencyGraph,
    pub visited: VisitedSet,
}

impl Resolution {
    fn new(root: &RoutineRef, root_kind: ObjectKind) -> Self {
        Self {
            root: root.clone(),
            root_kind,
            context: ResolutionContext::new(),
            graph: DependencyGraph::new(),
            visited: VisitedSet::new(),
        }
    }
}

/// Bounded, cycle-safe dependency traversal from one root routine.
///
/// Each call to a `resolve*` method starts from a fresh [`Resolution`]; the
/// resolver itself holds no traversal state and can be reused.
pub struct GraphResolver<'a> {
    store: &'a dyn MetadataStore,
    extractor: &'a dyn EdgeExtractor,
}

impl<'a> GraphResolver<'a> {
    pub fn new(store: &'a dyn MetadataStore, extractor: &'a dyn EdgeExtractor) -> Self {
        Self { store, extractor }
    }

    /// Root definition, looked up as a procedure first and a function second.
    /// `None` when neither exists.
    pub fn fetch_root(&self, root: &RoutineRef) -> Result<Option<(RoutineClass, String)>> {
        for class in [RoutineClass::Procedure, RoutineClass::Function] {
            let definition = self
                .store
                .fetch_routine_definition(&root.name, &root.schema, class)
                .map_err(|source| GraphError::RootDefinition {
                    routine: root.to_string(),
                    source,
                })?;
            if !definition.is_empty() {
                return Ok(Some((class, definition)));
            }
        }
        Ok(None)
    }

    /// Context of everything `root` reaches within `max_depth` routine hops.
    ///
    /// `Ok(None)` means the root routine does not exist.
    pub fn resolve(&self, root: &RoutineRef, max_depth: i32) -> Result<Option<ResolutionContext>> {
        Ok(self
            .resolve_traced(root, max_depth)?
            .map(|resolution| resolution.context))
    }

    /// Like [`resolve`](Self::resolve), keeping the walked graph and visited keys
    pub fn resolve_traced(&self, root: &RoutineRef, max_depth: i32) -> Result<Option<Resolution>> {
        let mut resolution = Resolution::new(root, ObjectKind::Unknown);
        resolution.visited.claim(self.extractor.root_key(root));
        if max_depth < 0 {
            return Ok(Some(resolution));
        }

        let Some((class, source)) = self.fetch_root(root)? else {
            log::info!("Routine {root} not found, nothing to resolve");
            return Ok(None);
        };
        resolution.root_kind = match class {
            RoutineClass::Procedure => ObjectKind::Procedure,
            RoutineClass::Function => ObjectKind::Function,
        };

        self.expand_root(&source, max_depth, &mut resolution)?;
        Ok(Some(resolution))
    }

    /// Resolve from source text the caller already holds
    pub fn resolve_with_source(
        &self,
        root: &RoutineRef,
        source: &str,
        max_depth: i32,
    ) -> Result<ResolutionContext> {
        Ok(self
            .resolve_with_source_traced(root, source, max_depth)?
            .context)
    }

    pub fn resolve_with_source_traced(
        &self,
        root: &RoutineRef,
        source: &str,
        max_depth: i32,
    ) -> Result<Resolution> {
        let mut resolution = Resolution::new(root, ObjectKind::Unknown);
        resolution.visited.claim(self.extractor.root_key(root));
        if max_depth >= 0 {
            self.expand_root(source, max_depth, &mut resolution)?;
        }
        Ok(resolution)
    }

    fn expand_root(&self, source: &str, max_depth: i32, state: &mut Resolution) -> Result<()> {
        let root = state.root.clone();
        let root_kind = state.root_kind;
        state.graph.add_node(&root, root_kind);

        let edges = self
            .extractor
            .extract_edges(self.store, &root, source)
            .map_err(|source| GraphError::RootEdges {
                routine: root.to_string(),
                source,
            })?;
        self.visit_edges(&root, root_kind, edges, max_depth, state);

        log::info!(
            "Resolved {root} ({} strategy, depth {max_depth}): {} objects, {} errors, {} references, {} keys claimed",
            self.extractor.strategy(),
            state.context.len(),
            state.context.error_count(),
            state.graph.edge_count(),
            state.visited.claimed_count()
        );
        Ok(())
    }

    fn expand(
        &self,
        routine: &RoutineRef,
        kind: ObjectKind,
        source: &str,
        depth: i32,
        state: &mut Resolution,
    ) {
        if depth < 0 {
            return;
        }
        match self.extractor.extract_edges(self.store, routine, source) {
            Ok(edges) => self.visit_edges(routine, kind, edges, depth, state),
            Err(e) => {
                log::warn!("{routine}: dependency lookup failed, not expanding: {e}");
                state
                    .context
                    .record_dependency_error(routine, format!("dependency lookup failed: {e}"));
            }
        }
    }

    fn visit_edges(
        &self,
        from: &RoutineRef,
        from_kind: ObjectKind,
        edges: Vec<Edge>,
        depth: i32,
        state: &mut Resolution,
    ) {
        for edge in edges {
            if state.visited.claim(self.extractor.visit_key(&edge)) {
                self.visit(from, from_kind, edge, depth, state);
            } else if state.graph.find_node(&edge.target).is_some() {
                // already resolved (or being resolved further up): keep the reference
                state.graph.add_edge(from, from_kind, &edge.target, edge.kind);
            }
        }
    }

    fn visit(
        &self,
        from: &RoutineRef,
        from_kind: ObjectKind,
        edge: Edge,
        depth: i32,
        state: &mut Resolution,
    ) {
        let Edge {
            target,
            kind,
            origin,
        } = edge;

        if kind.is_leaf() {
            let node = match self.store.fetch_table_columns(&target.name, &target.schema) {
                Ok(columns) => DependencyNode::columns(target.clone(), kind, columns),
                Err(e) => {
                    log::warn!("{from}: columns of {kind} {target} unavailable: {e}");
                    DependencyNode::error(target.clone(), kind, e.to_string())
                }
            };
            state.graph.add_edge(from, from_kind, &target, kind);
            state.context.insert(node);
            return;
        }

        let Some(class) = kind.routine_class() else {
            log::debug!("{from}: {target} has unsupported kind {kind}, skipped");
            return;
        };

        match self
            .store
            .fetch_routine_definition(&target.name, &target.schema, class)
        {
            Ok(definition) if definition.is_empty() && origin == EdgeOrigin::Lexical => {
                log::debug!("{from}: {target} is not a known {kind}, dropped");
            }
            Ok(definition) => {
                state.graph.add_edge(from, from_kind, &target, kind);
                state
                    .context
                    .insert(DependencyNode::definition(target.clone(), kind, &definition));
                self.expand(&target, kind, &definition, depth - 1, state);
            }
            Err(e) => {
                log::warn!("{from}: definition of {kind} {target} unavailable: {e}");
                state.graph.add_edge(from, from_kind, &target, kind);
                state
                    .context
                    .insert(DependencyNode::error(target, kind, e.to_string()));
            }
        }
    }
}
