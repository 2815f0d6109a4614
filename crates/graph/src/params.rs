//! User-defined types used by a routine's parameters and local variables.

use once_cell::sync::Lazy;
use refactor_catalog::{ColumnInfo, MetadataStore, RoutineRef, ScalarTypeInfo};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

const TYPE_NAME: &str =
    r"((?:\[[^\]\r\n]+\]|[A-Za-z_][A-Za-z0-9_]*)(?:\s*\.\s*(?:\[[^\]\r\n]+\]|[A-Za-z_][A-Za-z0-9_]*))?)";

static PARAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)@([A-Za-z_][A-Za-z0-9_]*)\s+(?:AS\s+)?{TYPE_NAME}(?:\s*\([^)]*\))?(\s+READONLY\b)?"
    ))
    .expect("parameter pattern")
});

static DECLARE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\bDECLARE\s+@([A-Za-z_][A-Za-z0-9_]*)\s+(?:AS\s+)?{TYPE_NAME}"
    ))
    .expect("declare pattern")
});

static AS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bAS\b").expect("as pattern"));

static TRAILING_PARAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@[A-Za-z_][A-Za-z0-9_]*\s*$").expect("trailing parameter pattern"));

const BUILTIN_TYPES: &[&str] = &[
    "bigint", "binary", "bit", "char", "cursor", "date", "datetime", "datetime2",
    "datetimeoffset", "decimal", "float", "geography", "geometry", "hierarchyid", "image", "int",
    "money", "nchar", "ntext", "numeric", "nvarchar", "real", "rowversion", "smalldatetime",
    "smallint", "smallmoney", "sql_variant", "sysname", "table", "text", "time", "timestamp",
    "tinyint", "uniqueidentifier", "varbinary", "varchar", "xml",
];

/// A parameter or variable typed with a non-builtin type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeReference {
    pub variable: String,
    pub type_ref: RoutineRef,
    /// Declared `READONLY`, i.e. a table-valued parameter
    pub read_only: bool,
}

/// Metadata of a user-defined type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDescription {
    TableType { columns: Vec<ColumnInfo> },
    Scalar {
        base_type: String,
        max_length: Option<i64>,
    },
    Error { error: String },
}

impl From<ScalarTypeInfo> for TypeDescription {
    fn from(info: ScalarTypeInfo) -> Self {
        TypeDescription::Scalar {
            base_type: info.base_type_name,
            max_length: info.max_length,
        }
    }
}

/// Routine header: everything before the first `AS` that is not part of a
/// `@param AS type` declaration.
fn header(source: &str) -> &str {
    for m in AS_RE.find_iter(source) {
        if !TRAILING_PARAM_RE.is_match(&source[..m.start()]) {
            return &source[..m.start()];
        }
    }
    source
}

fn is_builtin(type_ref: &RoutineRef, raw: &str) -> bool {
    !raw.contains('.') && BUILTIN_TYPES.contains(&type_ref.name.to_ascii_lowercase().as_str())
}

/// Header parameters and `DECLARE`d variables whose type is not built in.
///
/// Best effort: one reference per distinct type, first occurrence wins.
pub fn extract_parameter_types(source: &str) -> Vec<TypeReference> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    let params = PARAM_RE
        .captures_iter(header(source))
        .map(|c| (c, true))
        .chain(DECLARE_RE.captures_iter(source).map(|c| (c, false)));

    for (caps, in_header) in params {
        let (Some(var), Some(ty)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let type_ref = RoutineRef::parse(ty.as_str());
        if type_ref.name.eq_ignore_ascii_case("as") || is_builtin(&type_ref, ty.as_str()) {
            continue;
        }
        let read_only = in_header && caps.get(3).is_some();
        if seen.insert(type_ref.canonical_key()) {
            out.push(TypeReference {
                variable: var.as_str().to_string(),
                type_ref,
                read_only,
            });
        }
    }

    out
}

/// Describe every user-defined type `source` uses, keyed by `schema.name`.
///
/// `READONLY` parameters are looked up as table types, everything else as a
/// scalar alias type first and as a table type second. Unknown types are
/// left out; lookup failures become [`TypeDescription::Error`].
pub fn describe_parameter_types(
    store: &dyn MetadataStore,
    source: &str,
) -> BTreeMap<String, TypeDescription> {
    let mut described = BTreeMap::new();

    for reference in extract_parameter_types(source) {
        let ty = &reference.type_ref;
        let key = ty.to_string();

        let description = if reference.read_only {
            table_type(store, ty)
        } else {
            match store.fetch_scalar_type_info(&ty.name) {
                Ok(Some(info)) => Some(info.into()),
                Ok(None) => table_type(store, ty),
                Err(e) => Some(TypeDescription::Error {
                    error: e.to_string(),
                }),
            }
        };

        match description {
            Some(d) => {
                described.insert(key, d);
            }
            None => log::debug!("@{}: type {key} not found in catalog", reference.variable),
        }
    }

    described
}

fn table_type(store: &dyn MetadataStore, ty: &RoutineRef) -> Option<TypeDescription> {
    match store.fetch_table_type_columns(&ty.name, &ty.schema) {
        Ok(columns) if columns.is_empty() => None,
        Ok(columns) => Some(TypeDescription::TableType { columns }),
        Err(e) => Some(TypeDescription::Error {
            error: e.to_string(),
        }),
    }
}
