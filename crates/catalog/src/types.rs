use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema assumed when a reference is not schema-qualified
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Schema-qualified name of a database object (routine, table, view, ...)
///
/// Identity is case-insensitive: two refs naming the same object with
/// different casing share one [`RoutineRef::canonical_key`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineRef {
    pub schema: String,
    pub name: String,
}

impl RoutineRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Ref in the default schema
    pub fn in_default_schema(name: impl Into<String>) -> Self {
        Self::new(DEFAULT_SCHEMA, name)
    }

    /// Parse `name`, `schema.name` or `[schema].[name]`.
    ///
    /// A leading database part (`db.schema.name`) is ignored.
    pub fn parse(qualified: &str) -> Self {
        let parts = split_qualified(qualified);
        match parts.as_slice() {
            [] => Self::in_default_schema(""),
            [name] => Self::in_default_schema(name.clone()),
            [.., schema, name] => {
                if schema.is_empty() {
                    Self::in_default_schema(name.clone())
                } else {
                    Self::new(schema.clone(), name.clone())
                }
            }
        }
    }

    /// `lower(schema).lower(name)`, the identity used for dedup and cycle tracking
    pub fn canonical_key(&self) -> String {
        format!(
            "{}.{}",
            self.schema.to_lowercase(),
            self.name.to_lowercase()
        )
    }

    /// Whether this ref lives in [`DEFAULT_SCHEMA`]
    pub fn is_default_schema(&self) -> bool {
        self.schema.eq_ignore_ascii_case(DEFAULT_SCHEMA)
    }
}

impl PartialEq for RoutineRef {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_key() == other.canonical_key()
    }
}

impl Eq for RoutineRef {}

impl std::hash::Hash for RoutineRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.canonical_key().hash(state);
    }
}

impl fmt::Display for RoutineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Split a dotted identifier into its parts, honouring `[bracketed]` and
/// `"quoted"` segments (which may themselves contain dots).
pub(crate) fn split_qualified(qualified: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut closing: Option<char> = None;

    for ch in qualified.trim().chars() {
        match closing {
            Some(close) if ch == close => closing = None,
            Some(_) => current.push(ch),
            None => match ch {
                '[' => closing = Some(']'),
                '"' => closing = Some('"'),
                '.' => parts.push(std::mem::take(&mut current)),
                c if c.is_whitespace() => {}
                c => current.push(c),
            },
        }
    }
    // Empty segments (`db..name`) are kept so the schema falls back to the default.
    parts.push(current);
    parts
}

/// Which kind of routine a definition lookup targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineClass {
    Procedure,
    Function,
}

impl RoutineClass {
    /// `sys.objects.type` codes for this class
    pub fn type_codes(self) -> &'static [&'static str] {
        match self {
            RoutineClass::Procedure => &["P"],
            RoutineClass::Function => &["FN", "IF", "TF"],
        }
    }
}

/// Classification of a referenced database object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Table,
    View,
    Function,
    Procedure,
    Unknown,
}

impl ObjectKind {
    /// Map a `sys.objects.type` descriptor to a kind.
    ///
    /// Codes outside tables, views, SQL/CLR functions and procedures map to
    /// [`ObjectKind::Unknown`].
    pub fn from_type_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "U" => ObjectKind::Table,
            "V" => ObjectKind::View,
            "FN" | "IF" | "TF" | "FS" | "FT" => ObjectKind::Function,
            "P" | "PC" => ObjectKind::Procedure,
            _ => ObjectKind::Unknown,
        }
    }

    /// Tables and views contribute columns and end recursion
    pub fn is_leaf(self) -> bool {
        matches!(self, ObjectKind::Table | ObjectKind::View)
    }

    /// Routine class for definition lookups, if this kind is a routine
    pub fn routine_class(self) -> Option<RoutineClass> {
        match self {
            ObjectKind::Function => Some(RoutineClass::Function),
            ObjectKind::Procedure => Some(RoutineClass::Procedure),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Table => "table",
            ObjectKind::View => "view",
            ObjectKind::Function => "function",
            ObjectKind::Procedure => "procedure",
            ObjectKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column of a table, view or table-valued type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub max_length: Option<i64>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            max_length: None,
            nullable: true,
        }
    }

    pub fn max_length(mut self, max_length: i64) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// User-defined scalar type (alias type)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarTypeInfo {
    pub name: String,
    pub base_type_name: String,
    #[serde(default)]
    pub max_length: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn canonical_key_is_case_insensitive() {
        let a = RoutineRef::new("DBO", "GetOrders");
        let b = RoutineRef::new("dbo", "getorders");
        assert_eq!(a.canonical_key(), "dbo.getorders");
        assert_eq!(a, b);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn parse_handles_brackets_and_default_schema() {
        assert_eq!(RoutineRef::parse("Orders"), RoutineRef::new("dbo", "Orders"));
        assert_eq!(
            RoutineRef::parse("[sales].[Order Lines]"),
            RoutineRef::new("sales", "Order Lines")
        );
        assert_eq!(
            RoutineRef::parse("Shop.sales.Orders"),
            RoutineRef::new("sales", "Orders")
        );
        assert_eq!(RoutineRef::parse("Shop..Orders"), RoutineRef::new("dbo", "Orders"));
        assert_eq!(RoutineRef::parse("[a.b].c").schema, "a.b");
    }

    #[test]
    fn type_codes_classify_objects() {
        assert_eq!(ObjectKind::from_type_code("U "), ObjectKind::Table);
        assert_eq!(ObjectKind::from_type_code("v"), ObjectKind::View);
        assert_eq!(ObjectKind::from_type_code("IF"), ObjectKind::Function);
        assert_eq!(ObjectKind::from_type_code("P"), ObjectKind::Procedure);
        assert_eq!(ObjectKind::from_type_code("SN"), ObjectKind::Unknown);
        assert!(ObjectKind::View.is_leaf());
        assert!(!ObjectKind::Function.is_leaf());
    }
}
