//! SQL Server catalog queries behind the [`MetadataStore`] contract.

use crate::error::{MetadataAccessError, Result};
use crate::store::{CatalogDependency, MetadataStore};
use crate::types::{ColumnInfo, ObjectKind, RoutineClass, RoutineRef, ScalarTypeInfo, DEFAULT_SCHEMA};

/// Loosely typed value of one result column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Bool(bool),
    Text(String),
}

impl SqlValue {
    fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Int(v) => Some(v.to_string()),
            SqlValue::Bool(v) => Some(v.to_string()),
            SqlValue::Text(v) => Some(v.clone()),
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            SqlValue::Bool(v) => Some(i64::from(*v)),
            SqlValue::Text(v) => v.trim().parse().ok(),
            SqlValue::Null => None,
        }
    }

    // INFORMATION_SCHEMA reports 'YES'/'NO', sys.columns reports bit
    fn as_flag(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(v) => Some(*v),
            SqlValue::Int(v) => Some(*v != 0),
            SqlValue::Text(v) => match v.trim().to_ascii_uppercase().as_str() {
                "YES" | "TRUE" | "1" => Some(true),
                "NO" | "FALSE" | "0" => Some(false),
                _ => None,
            },
            SqlValue::Null => None,
        }
    }
}

/// One result row, columns in SELECT order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SqlRow(pub Vec<SqlValue>);

impl SqlRow {
    fn value(&self, idx: usize) -> Result<&SqlValue> {
        self.0.get(idx).ok_or_else(|| {
            MetadataAccessError::unexpected_row(format!(
                "expected at least {} columns, got {}",
                idx + 1,
                self.0.len()
            ))
        })
    }

    fn text(&self, idx: usize) -> Result<Option<String>> {
        Ok(self.value(idx)?.as_text())
    }

    fn required_text(&self, idx: usize) -> Result<String> {
        self.text(idx)?.ok_or_else(|| {
            MetadataAccessError::unexpected_row(format!("column {idx} is NULL"))
        })
    }

    fn int(&self, idx: usize) -> Result<Option<i64>> {
        Ok(self.value(idx)?.as_int())
    }

    fn flag(&self, idx: usize) -> Result<Option<bool>> {
        Ok(self.value(idx)?.as_flag())
    }
}

/// Caller-owned handle able to run a parameterized read query.
///
/// Parameters are positional and bound to `?` placeholders in order.
pub trait QueryConnection {
    fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<SqlRow>>;
}

impl<C: QueryConnection + ?Sized> QueryConnection for &C {
    fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<SqlRow>> {
        (**self).query(sql, params)
    }
}

const PROCEDURE_DEFINITION_SQL: &str = "\
SELECT m.definition
FROM sys.sql_modules m
JOIN sys.objects o ON m.object_id = o.object_id
JOIN sys.schemas s ON o.schema_id = s.schema_id
WHERE o.type = 'P' AND o.name = ? AND s.name = ?";

const FUNCTION_DEFINITION_SQL: &str = "\
SELECT m.definition
FROM sys.objects o
JOIN sys.sql_modules m ON o.object_id = m.object_id
JOIN sys.schemas s ON o.schema_id = s.schema_id
WHERE o.type IN ('FN', 'IF', 'TF') AND o.name = ? AND s.name = ?";

const TABLE_COLUMNS_SQL: &str = "\
SELECT COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH, IS_NULLABLE
FROM INFORMATION_SCHEMA.COLUMNS
WHERE TABLE_NAME = ? AND TABLE_SCHEMA = ?
ORDER BY ORDINAL_POSITION";

const RELATION_KIND_SQL: &str = "\
SELECT TABLE_TYPE
FROM INFORMATION_SCHEMA.TABLES
WHERE TABLE_NAME = ? AND TABLE_SCHEMA = ?";

const TABLE_TYPE_COLUMNS_SQL: &str = "\
SELECT c.name AS column_name, ty.name AS data_type, c.max_length, c.is_nullable
FROM sys.table_types t
JOIN sys.columns c ON t.type_table_object_id = c.object_id
JOIN sys.types ty ON c.user_type_id = ty.user_type_id
JOIN sys.schemas s ON t.schema_id = s.schema_id
WHERE t.name = ? AND s.name = ?
ORDER BY c.column_id";

const SCALAR_TYPE_SQL: &str = "\
SELECT t.name, bt.name AS base_type, t.max_length
FROM sys.types t
LEFT JOIN sys.types bt ON t.system_type_id = bt.user_type_id
WHERE t.is_user_defined = 1 AND t.is_table_type = 0 AND t.name = ?";

const DEPENDENCIES_SQL: &str = "\
SELECT DISTINCT ro.name AS referenced_name, rs.name AS referenced_schema, ro.type AS referenced_type
FROM sys.sql_expression_dependencies d
JOIN sys.objects o ON d.referencing_id = o.object_id
JOIN sys.schemas s ON o.schema_id = s.schema_id
JOIN sys.objects ro ON d.referenced_id = ro.object_id
JOIN sys.schemas rs ON ro.schema_id = rs.schema_id
WHERE o.name = ? AND s.name = ? AND ro.is_ms_shipped = 0";

/// [`MetadataStore`] issuing SQL Server catalog queries over a [`QueryConnection`]
pub struct SqlMetadataAccessor<C> {
    conn: C,
}

impl<C: QueryConnection> SqlMetadataAccessor<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    fn run(&self, sql: &str, params: &[&str]) -> Result<Vec<SqlRow>> {
        log::debug!("catalog query ({} params): {}", params.len(), first_line(sql));
        self.conn.query(sql, params)
    }

    fn columns(&self, sql: &str, name: &str, schema: &str) -> Result<Vec<ColumnInfo>> {
        self.run(sql, &[name, schema])?
            .iter()
            .map(|row| -> Result<ColumnInfo> {
                Ok(ColumnInfo {
                    name: row.required_text(0)?,
                    data_type: row.required_text(1)?,
                    max_length: row.int(2)?,
                    nullable: row.flag(3)?.unwrap_or(true),
                })
            })
            .collect()
    }
}

impl<C: QueryConnection> MetadataStore for SqlMetadataAccessor<C> {
    fn fetch_routine_definition(
        &self,
        name: &str,
        schema: &str,
        class: RoutineClass,
    ) -> Result<String> {
        let sql = match class {
            RoutineClass::Procedure => PROCEDURE_DEFINITION_SQL,
            RoutineClass::Function => FUNCTION_DEFINITION_SQL,
        };
        let rows = self.run(sql, &[name, schema])?;
        match rows.first() {
            Some(row) => Ok(row.text(0)?.unwrap_or_default()),
            None => Ok(String::new()),
        }
    }

    fn fetch_table_columns(&self, name: &str, schema: &str) -> Result<Vec<ColumnInfo>> {
        self.columns(TABLE_COLUMNS_SQL, name, schema)
    }

    fn fetch_relation_kind(&self, name: &str, schema: &str) -> Result<Option<ObjectKind>> {
        let rows = self.run(RELATION_KIND_SQL, &[name, schema])?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let table_type = row.text(0)?.unwrap_or_default();
        Ok(match table_type.trim().to_ascii_uppercase().as_str() {
            "VIEW" => Some(ObjectKind::View),
            _ => Some(ObjectKind::Table),
        })
    }

    fn fetch_table_type_columns(&self, name: &str, schema: &str) -> Result<Vec<ColumnInfo>> {
        self.columns(TABLE_TYPE_COLUMNS_SQL, name, schema)
    }

    fn fetch_scalar_type_info(&self, name: &str) -> Result<Option<ScalarTypeInfo>> {
        let rows = self.run(SCALAR_TYPE_SQL, &[name])?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        Ok(Some(ScalarTypeInfo {
            name: row.required_text(0)?,
            base_type_name: row.text(1)?.unwrap_or_default(),
            max_length: row.int(2)?,
        }))
    }

    fn fetch_dependencies(&self, routine: &RoutineRef) -> Result<Vec<CatalogDependency>> {
        let rows = self.run(DEPENDENCIES_SQL, &[routine.name.as_str(), routine.schema.as_str()])?;
        rows.iter()
            .map(|row| -> Result<CatalogDependency> {
                let name = row.required_text(0)?;
                let schema = row
                    .text(1)?
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
                let kind = ObjectKind::from_type_code(&row.text(2)?.unwrap_or_default());
                Ok(CatalogDependency {
                    target: RoutineRef::new(schema, name),
                    kind,
                })
            })
            .collect()
    }
}

fn first_line(sql: &str) -> &str {
    sql.lines().next().unwrap_or_default()
}
