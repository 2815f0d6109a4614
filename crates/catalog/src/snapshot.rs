//! Offline catalog dump usable as a [`MetadataStore`].
//!
//! ```json
//! {
//!   "routines": [
//!     { "schema": "dbo", "name": "GetOrders", "class": "procedure",
//!       "definition": "CREATE PROCEDURE ...",
//!       "dependencies": [ { "name": "Orders", "kind": "table" } ] }
//!   ],
//!   "relations": [
//!     { "name": "Orders", "kind": "table",
//!       "columns": [ { "name": "OrderId", "data_type": "int", "nullable": false } ] }
//!   ],
//!   "table_types": [],
//!   "scalar_types": []
//! }
//! ```
//!
//! `schema` defaults to `dbo` everywhere; names match case-insensitively.

use crate::error::{MetadataAccessError, Result};
use crate::store::{CatalogDependency, MetadataStore};
use crate::types::{
    ColumnInfo, ObjectKind, RoutineClass, RoutineRef, ScalarTypeInfo, DEFAULT_SCHEMA,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDependency {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub name: String,
    pub kind: ObjectKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRoutine {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub name: String,
    pub class: RoutineClass,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub dependencies: Vec<SnapshotDependency>,
}

/// Table or view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRelation {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub name: String,
    pub kind: ObjectKind,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotTableType {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

pub type SnapshotScalarType = ScalarTypeInfo;

/// In-memory catalog, typically loaded from a JSON file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub routines: Vec<SnapshotRoutine>,
    #[serde(default)]
    pub relations: Vec<SnapshotRelation>,
    #[serde(default)]
    pub table_types: Vec<SnapshotTableType>,
    #[serde(default)]
    pub scalar_types: Vec<SnapshotScalarType>,
}

fn same(schema_a: &str, name_a: &str, schema_b: &str, name_b: &str) -> bool {
    schema_a.eq_ignore_ascii_case(schema_b) && name_a.eq_ignore_ascii_case(name_b)
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a snapshot from JSON text
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| MetadataAccessError::Other(format!("invalid catalog snapshot: {e}")))
    }

    /// Read a snapshot file. An unreadable file is a connection failure of this store.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MetadataAccessError::connection(format!(
                "failed to read catalog snapshot {}: {e}",
                path.display()
            ))
        })?;
        let snapshot = Self::from_json_str(&raw)?;
        log::debug!(
            "Loaded catalog snapshot {}: {} routines, {} relations, {} table types, {} scalar types",
            path.display(),
            snapshot.routines.len(),
            snapshot.relations.len(),
            snapshot.table_types.len(),
            snapshot.scalar_types.len()
        );
        Ok(snapshot)
    }

    /// Add a routine with its catalog dependency records
    pub fn with_routine(
        mut self,
        routine: RoutineRef,
        class: RoutineClass,
        definition: impl Into<String>,
        dependencies: Vec<(RoutineRef, ObjectKind)>,
    ) -> Self {
        self.routines.push(SnapshotRoutine {
            schema: routine.schema,
            name: routine.name,
            class,
            definition: definition.into(),
            dependencies: dependencies
                .into_iter()
                .map(|(target, kind)| SnapshotDependency {
                    schema: target.schema,
                    name: target.name,
                    kind,
                })
                .collect(),
        });
        self
    }

    /// Add a table or view
    pub fn with_relation(
        mut self,
        relation: RoutineRef,
        kind: ObjectKind,
        columns: Vec<ColumnInfo>,
    ) -> Self {
        self.relations.push(SnapshotRelation {
            schema: relation.schema,
            name: relation.name,
            kind,
            columns,
        });
        self
    }

    pub fn with_table_type(mut self, table_type: RoutineRef, columns: Vec<ColumnInfo>) -> Self {
        self.table_types.push(SnapshotTableType {
            schema: table_type.schema,
            name: table_type.name,
            columns,
        });
        self
    }

    pub fn with_scalar_type(mut self, info: ScalarTypeInfo) -> Self {
        self.scalar_types.push(info);
        self
    }

    fn routine(&self, name: &str, schema: &str) -> Option<&SnapshotRoutine> {
        self.routines
            .iter()
            .find(|r| same(&r.schema, &r.name, schema, name))
    }
}

impl MetadataStore for CatalogSnapshot {
    fn fetch_routine_definition(
        &self,
        name: &str,
        schema: &str,
        class: RoutineClass,
    ) -> Result<String> {
        Ok(self
            .routines
            .iter()
            .find(|r| r.class == class && same(&r.schema, &r.name, schema, name))
            .map(|r| r.definition.clone())
            .unwrap_or_default())
    }

    fn fetch_table_columns(&self, name: &str, schema: &str) -> Result<Vec<ColumnInfo>> {
        Ok(self
            .relations
            .iter()
            .find(|r| same(&r.schema, &r.name, schema, name))
            .map(|r| r.columns.clone())
            .unwrap_or_default())
    }

    fn fetch_relation_kind(&self, name: &str, schema: &str) -> Result<Option<ObjectKind>> {
        Ok(self
            .relations
            .iter()
            .find(|r| same(&r.schema, &r.name, schema, name))
            .map(|r| r.kind))
    }

    fn fetch_table_type_columns(&self, name: &str, schema: &str) -> Result<Vec<ColumnInfo>> {
        Ok(self
            .table_types
            .iter()
            .find(|t| same(&t.schema, &t.name, schema, name))
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    fn fetch_scalar_type_info(&self, name: &str) -> Result<Option<ScalarTypeInfo>> {
        Ok(self
            .scalar_types
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    fn fetch_dependencies(&self, routine: &RoutineRef) -> Result<Vec<CatalogDependency>> {
        Ok(self
            .routine(&routine.name, &routine.schema)
            .map(|r| {
                r.dependencies
                    .iter()
                    .map(|d| CatalogDependency {
                        target: RoutineRef::new(d.schema.clone(), d.name.clone()),
                        kind: d.kind,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
