use refactor_catalog::{ColumnInfo, ObjectKind, RoutineRef};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{BTreeMap, HashMap};

/// Recorded routine definitions never exceed this many characters
pub const DEFINITION_SNIPPET_CHARS: usize = 500;

/// First [`DEFINITION_SNIPPET_CHARS`] characters of a definition (whole text if shorter)
pub fn definition_snippet(definition: &str) -> String {
    definition.chars().take(DEFINITION_SNIPPET_CHARS).collect()
}

/// Where an edge came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeOrigin {
    /// Authoritative dependency record of the catalog
    Catalog,
    /// Pattern match over source text; may name objects that do not exist
    Lexical,
}

/// Reference from one routine to another object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub target: RoutineRef,
    pub kind: ObjectKind,
    pub origin: EdgeOrigin,
}

impl Edge {
    pub fn catalog(target: RoutineRef, kind: ObjectKind) -> Self {
        Self {
            target,
            kind,
            origin: EdgeOrigin::Catalog,
        }
    }

    pub fn lexical(target: RoutineRef, kind: ObjectKind) -> Self {
        Self {
            target,
            kind,
            origin: EdgeOrigin::Lexical,
        }
    }
}

/// What the resolver learned about one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeDetail {
    /// Table or view columns; may legitimately be empty
    Columns(Vec<ColumnInfo>),
    /// Routine definition, already cut to [`DEFINITION_SNIPPET_CHARS`]
    Definition(String),
    /// Metadata lookup failed
    Error(String),
}

/// One entry of a [`ResolutionContext`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    pub target: RoutineRef,
    pub kind: ObjectKind,
    pub detail: NodeDetail,
    /// Set when the object was described but its own dependencies could not be listed
    pub dependency_error: Option<String>,
}

impl DependencyNode {
    pub fn columns(target: RoutineRef, kind: ObjectKind, columns: Vec<ColumnInfo>) -> Self {
        Self {
            target,
            kind,
            detail: NodeDetail::Columns(columns),
            dependency_error: None,
        }
    }

    /// Node for a routine; `definition` is truncated here
    pub fn definition(target: RoutineRef, kind: ObjectKind, definition: &str) -> Self {
        Self {
            target,
            kind,
            detail: NodeDetail::Definition(definition_snippet(definition)),
            dependency_error: None,
        }
    }

    pub fn error(target: RoutineRef, kind: ObjectKind, message: impl Into<String>) -> Self {
        Self {
            target,
            kind,
            detail: NodeDetail::Error(message.into()),
            dependency_error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.target.name
    }

    pub fn column_list(&self) -> Option<&[ColumnInfo]> {
        match &self.detail {
            NodeDetail::Columns(cols) => Some(cols),
            _ => None,
        }
    }

    pub fn definition_text(&self) -> Option<&str> {
        match &self.detail {
            NodeDetail::Definition(def) => Some(def),
            _ => None,
        }
    }

    /// Lookup failure for the object itself, or else for its dependencies
    pub fn error_message(&self) -> Option<&str> {
        match &self.detail {
            NodeDetail::Error(msg) => Some(msg),
            _ => self.dependency_error.as_deref(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_message().is_some()
    }
}

impl Serialize for DependencyNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.detail {
            NodeDetail::Columns(cols) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", self.kind.as_str())?;
                map.serialize_entry("columns", cols)?;
                map.end()
            }
            NodeDetail::Definition(def) => {
                let len = 2 + usize::from(self.dependency_error.is_some());
                let mut map = serializer.serialize_map(Some(len))?;
                map.serialize_entry("type", self.kind.as_str())?;
                map.serialize_entry("definition", def)?;
                if let Some(msg) = &self.dependency_error {
                    map.serialize_entry("error", msg)?;
                }
                map.end()
            }
            NodeDetail::Error(msg) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", msg)?;
                map.end()
            }
        }
    }
}

/// Objects discovered by one resolution, keyed by canonical key.
///
/// The first node recorded for a key wins. Serialized keys are bare object
/// names; a name shared by objects in different schemas is written
/// schema-qualified instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionContext {
    nodes: BTreeMap<String, DependencyNode>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node unless its object is already present. Returns whether it was added.
    pub fn insert(&mut self, node: DependencyNode) -> bool {
        let key = node.target.canonical_key();
        if self.nodes.contains_key(&key) {
            return false;
        }
        self.nodes.insert(key, node);
        true
    }

    /// Note that the dependencies of an already recorded object could not be
    /// listed. Returns `false` when the object is not in the context.
    pub fn record_dependency_error(
        &mut self,
        target: &RoutineRef,
        message: impl Into<String>,
    ) -> bool {
        match self.nodes.get_mut(&target.canonical_key()) {
            Some(node) => {
                node.dependency_error = Some(message.into());
                true
            }
            None => false,
        }
    }

    pub fn get_ref(&self, target: &RoutineRef) -> Option<&DependencyNode> {
        self.nodes.get(&target.canonical_key())
    }

    /// Look up by `name` or `schema.name`, case-insensitively.
    ///
    /// A bare name matches the first node with that name in canonical key order.
    pub fn get(&self, name: &str) -> Option<&DependencyNode> {
        if name.contains('.') || name.contains('[') {
            return self.get_ref(&RoutineRef::parse(name));
        }
        self.nodes
            .values()
            .find(|node| node.target.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes.values()
    }

    pub fn error_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_error()).count()
    }

    /// `(display key, node)` pairs in canonical key order
    pub fn entries(&self) -> Vec<(String, &DependencyNode)> {
        let mut bare_names: HashMap<String, usize> = HashMap::new();
        for node in self.nodes.values() {
            *bare_names.entry(node.target.name.to_lowercase()).or_default() += 1;
        }

        self.nodes
            .values()
            .map(|node| {
                let clashes = bare_names
                    .get(&node.target.name.to_lowercase())
                    .copied()
                    .unwrap_or_default()
                    > 1;
                let key = if clashes {
                    node.target.to_string()
                } else {
                    node.target.name.clone()
                };
                (key, node)
            })
            .collect()
    }

    /// JSON document in the shape consumed by the prompt builder
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for ResolutionContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, node) in entries {
            map.serialize_entry(&key, node)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn nodes_serialize_to_documented_shape() {
        let mut ctx = ResolutionContext::new();
        ctx.insert(DependencyNode::columns(
            RoutineRef::in_default_schema("Orders"),
            ObjectKind::Table,
            vec![ColumnInfo::new("OrderId", "int").not_null()],
        ));
        ctx.insert(DependencyNode::definition(
            RoutineRef::in_default_schema("CalcTotal"),
            ObjectKind::Function,
            "CREATE FUNCTION dbo.CalcTotal() RETURNS money AS BEGIN RETURN 0 END",
        ));
        ctx.insert(DependencyNode::error(
            RoutineRef::in_default_schema("Audit"),
            ObjectKind::View,
            "Permission denied: VIEW DEFINITION",
        ));

        assert_eq!(
            ctx.to_json(),
            json!({
                "Orders": {
                    "type": "table",
                    "columns": [
                        { "name": "OrderId", "data_type": "int", "max_length": null, "nullable": false }
                    ]
                },
                "CalcTotal": {
                    "type": "function",
                    "definition": "CREATE FUNCTION dbo.CalcTotal() RETURNS money AS BEGIN RETURN 0 END"
                },
                "Audit": { "error": "Permission denied: VIEW DEFINITION" }
            })
        );
    }

    #[test]
    fn zero_columns_and_errors_stay_distinct() {
        let empty = DependencyNode::columns(
            RoutineRef::in_default_schema("V"),
            ObjectKind::View,
            Vec::new(),
        );
        let failed = DependencyNode::error(RoutineRef::in_default_schema("V"), ObjectKind::View, "boom");
        assert_eq!(empty.column_list(), Some(&[][..]));
        assert!(!empty.is_error());
        assert!(failed.is_error());
        assert_eq!(failed.column_list(), None);
    }

    #[test]
    fn first_writer_wins_and_casing_collapses() {
        let mut ctx = ResolutionContext::new();
        assert!(ctx.insert(DependencyNode::columns(
            RoutineRef::in_default_schema("Orders"),
            ObjectKind::Table,
            Vec::new(),
        )));
        assert!(!ctx.insert(DependencyNode::error(
            RoutineRef::new("DBO", "ORDERS"),
            ObjectKind::Table,
            "late",
        )));
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.get("orders").unwrap().name(), "Orders");
        assert!(!ctx.get("Orders").unwrap().is_error());
    }

    #[test]
    fn clashing_bare_names_are_schema_qualified() {
        let mut ctx = ResolutionContext::new();
        ctx.insert(DependencyNode::columns(
            RoutineRef::new("dbo", "Orders"),
            ObjectKind::Table,
            Vec::new(),
        ));
        ctx.insert(DependencyNode::columns(
            RoutineRef::new("sales", "Orders"),
            ObjectKind::Table,
            Vec::new(),
        ));
        ctx.insert(DependencyNode::columns(
            RoutineRef::new("sales", "Regions"),
            ObjectKind::Table,
            Vec::new(),
        ));

        let keys: Vec<String> = ctx.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["dbo.Orders", "sales.Orders", "Regions"]);
        assert!(ctx.get("sales.orders").is_some());
    }

    #[test]
    fn dependency_error_rides_along_with_the_definition() {
        let mut ctx = ResolutionContext::new();
        ctx.insert(DependencyNode::definition(
            RoutineRef::in_default_schema("CalcTotal"),
            ObjectKind::Function,
            "CREATE FUNCTION dbo.CalcTotal() RETURNS money AS BEGIN RETURN 0 END",
        ));
        assert_eq!(ctx.error_count(), 0);

        assert!(ctx.record_dependency_error(
            &RoutineRef::in_default_schema("calctotal"),
            "Query timed out: dependencies"
        ));
        assert!(!ctx.record_dependency_error(&RoutineRef::in_default_schema("Nope"), "x"));

        let node = ctx.get("CalcTotal").unwrap();
        assert!(node.is_error());
        assert!(node.definition_text().is_some());
        assert_eq!(ctx.error_count(), 1);
        assert_eq!(
            ctx.to_json()["CalcTotal"],
            json!({
                "type": "function",
                "definition": "CREATE FUNCTION dbo.CalcTotal() RETURNS money AS BEGIN RETURN 0 END",
                "error": "Query timed out: dependencies"
            })
        );
    }

    proptest! {
        #[test]
        fn snippet_is_a_bounded_prefix(text in ".{0,1200}") {
            let snippet = definition_snippet(&text);
            let chars = text.chars().count();
            prop_assert_eq!(snippet.chars().count(), chars.min(DEFINITION_SNIPPET_CHARS));
            prop_assert!(text.starts_with(&snippet));
        }
    }
}
