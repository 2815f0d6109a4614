use crate::error::Result;
use crate::types::{ColumnInfo, ObjectKind, RoutineClass, RoutineRef, ScalarTypeInfo};
use serde::{Deserialize, Serialize};

/// One row of the catalog's dependency records: the routine references
/// `target`, whose type descriptor classified as `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDependency {
    pub target: RoutineRef,
    pub kind: ObjectKind,
}

/// Read-only lookups against a relational metadata store.
///
/// Every method is idempotent. Absence is reported through empty values,
/// never through `Err`; errors mean the store itself could not answer
/// (connectivity, permissions, timeouts).
pub trait MetadataStore {
    /// Full source text of a procedure or function, or `""` if not found
    fn fetch_routine_definition(
        &self,
        name: &str,
        schema: &str,
        class: RoutineClass,
    ) -> Result<String>;

    /// Columns of a table or view in ordinal order; empty if it does not exist
    fn fetch_table_columns(&self, name: &str, schema: &str) -> Result<Vec<ColumnInfo>>;

    /// Whether `schema.name` is a table or a view, `None` if it is neither
    fn fetch_relation_kind(&self, name: &str, schema: &str) -> Result<Option<ObjectKind>>;

    /// Columns of a table-valued type in ordinal order; empty if it does not exist
    fn fetch_table_type_columns(&self, name: &str, schema: &str) -> Result<Vec<ColumnInfo>>;

    /// User-defined scalar type, `None` when unknown
    fn fetch_scalar_type_info(&self, name: &str) -> Result<Option<ScalarTypeInfo>>;

    /// Objects the routine's compiled definition references, excluding
    /// system-shipped objects. Kinds outside table/view/function/procedure
    /// are reported as [`ObjectKind::Unknown`].
    fn fetch_dependencies(&self, routine: &RoutineRef) -> Result<Vec<CatalogDependency>>;
}

impl<S: MetadataStore + ?Sized> MetadataStore for &S {
    fn fetch_routine_definition(
        &self,
        name: &str,
        schema: &str,
        class: RoutineClass,
    ) -> Result<String> {
        (**self).fetch_routine_definition(name, schema, class)
    }

    fn fetch_table_columns(&self, name: &str, schema: &str) -> Result<Vec<ColumnInfo>> {
        (**self).fetch_table_columns(name, schema)
    }

    fn fetch_relation_kind(&self, name: &str, schema: &str) -> Result<Option<ObjectKind>> {
        (**self).fetch_relation_kind(name, schema)
    }

    fn fetch_table_type_columns(&self, name: &str, schema: &str) -> Result<Vec<ColumnInfo>> {
        (**self).fetch_table_type_columns(name, schema)
    }

    fn fetch_scalar_type_info(&self, name: &str) -> Result<Option<ScalarTypeInfo>> {
        (**self).fetch_scalar_type_info(name)
    }

    fn fetch_dependencies(&self, routine: &RoutineRef) -> Result<Vec<CatalogDependency>> {
        (**self).fetch_dependencies(routine)
    }
}
