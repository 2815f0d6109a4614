//! Pattern-based dependency discovery over raw routine text.
//!
//! This is a fallback for stores without dependency tracking and for routines
//! the catalog cannot see into. It is not a SQL parser:
//!
//! - it over-approximates: aliases, CTE names and variables can look like
//!   object names, so every candidate is confirmed by a metadata lookup and
//!   dropped if the lookup finds nothing;
//! - it under-approximates: object names assembled at runtime (dynamic SQL)
//!   are invisible.
//!
//! Comments and string literals are blanked before scanning.

use crate::extract::{EdgeExtractor, ExtractionStrategy};
use crate::types::Edge;
use once_cell::sync::Lazy;
use refactor_catalog::{MetadataStore, ObjectKind, Result, RoutineRef};
use regex::Regex;
use std::collections::HashSet;

const IDENT: &str = r"(?:\[[^\]\r\n]+\]|[A-Za-z_][A-Za-z0-9_$#@]*)";

fn qualified() -> String {
    format!(r"{IDENT}(?:[ \t]*\.[ \t]*{IDENT}){{0,2}}")
}

static TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:FROM|JOIN|INTO|UPDATE|DELETE)\s+(?:TOP\s*\(\s*\d+\s*\)\s*(?:PERCENT\s+)?)?(?:FROM\s+)?({})",
        qualified()
    ))
    .expect("table pattern")
});

static FUNCTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"({})\(", qualified())).expect("function pattern"));

static EXEC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\bEXEC(?:UTE)?\s+(?:@[A-Za-z_][A-Za-z0-9_]*\s*=\s*)?({})",
        qualified()
    ))
    .expect("exec pattern")
});

/// Words that follow the trigger keywords without being object names
const KEYWORDS: &[&str] = &[
    "all", "and", "apply", "as", "begin", "by", "case", "cross", "declare", "delete", "distinct",
    "else", "end", "exec", "execute", "exists", "for", "from", "full", "group", "having", "if",
    "in", "inner", "insert", "into", "join", "left", "merge", "not", "on", "or", "order", "outer",
    "output", "over", "percent", "return", "returns", "right", "select", "set", "table", "then",
    "top", "union", "update", "values", "when", "where", "while", "with",
];

/// Built-in functions; only checked for unqualified names
const BUILTIN_FUNCTIONS: &[&str] = &[
    "abs", "app_name", "ascii", "avg", "binary", "cast", "ceiling", "char", "charindex",
    "checksum", "choose", "coalesce", "concat", "concat_ws", "contains", "convert", "count",
    "count_big", "datalength", "dateadd", "datediff", "datefromparts", "datename", "datepart",
    "datetime2", "datetimeoffset", "day", "db_name", "decimal", "dense_rank", "eomonth",
    "error_line", "error_message", "error_number", "error_procedure", "error_severity",
    "error_state", "first_value", "float", "floor", "format", "freetext", "getdate",
    "getutcdate", "hashbytes", "host_name", "iif", "isjson", "isnull", "isnumeric", "json_modify",
    "json_query", "json_value", "lag", "last_value", "lead", "len", "lower", "ltrim", "max",
    "min", "month", "nchar", "newid", "ntile", "nullif", "numeric", "nvarchar", "object_id",
    "object_name", "openjson", "openquery", "openrowset", "patindex", "power", "quotename",
    "raiserror", "rank", "replace", "replicate", "reverse", "round", "row_number", "rtrim",
    "schema_name", "scope_identity", "sign", "space", "sqrt", "stuff", "string_agg",
    "string_split", "substring", "sum", "suser_sname", "sysdatetime", "sysutcdatetime", "time",
    "trim", "try_cast", "try_convert", "unicode", "upper", "user_name", "varbinary", "varchar",
    "year",
];

/// Candidate objects found in one routine's text, each list deduplicated
/// case-insensitively and kept in first-seen order and casing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexicalCandidates {
    pub tables: Vec<RoutineRef>,
    pub functions: Vec<RoutineRef>,
    pub procedures: Vec<RoutineRef>,
}

impl LexicalCandidates {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.functions.is_empty() && self.procedures.is_empty()
    }

    fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|r| r.name.as_str()).collect()
    }
}

/// Scan routine text for table/view, function and procedure candidates
pub fn scan_candidates(source: &str) -> LexicalCandidates {
    let text = blank_comments_and_literals(source);

    LexicalCandidates {
        tables: collect(&TABLE_RE, &text, false),
        functions: collect(&FUNCTION_RE, &text, true),
        procedures: collect(&EXEC_RE, &text, false),
    }
}

fn collect(re: &Regex, text: &str, check_prefix: bool) -> Vec<RoutineRef> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(1) else {
            continue;
        };
        // `@var(`, `#tmp(`, `x.y(` continuations are not function names
        if check_prefix {
            let prev = text[..m.start()].chars().next_back();
            if matches!(prev, Some(c) if c.is_alphanumeric() || matches!(c, '_' | '@' | '#' | '.' | '$' | ']'))
            {
                continue;
            }
        }

        let raw = m.as_str();
        let qualified = raw.contains('.');
        let target = RoutineRef::parse(raw);
        if !is_candidate(&target.name, qualified) {
            continue;
        }
        if seen.insert(target.canonical_key()) {
            out.push(target);
        }
    }

    out
}

fn is_candidate(name: &str, qualified: bool) -> bool {
    if name.is_empty() {
        return false;
    }
    let lower = name.to_ascii_lowercase();
    if KEYWORDS.contains(&lower.as_str()) {
        return false;
    }
    qualified || !BUILTIN_FUNCTIONS.contains(&lower.as_str())
}

/// Replace comment and string literal contents with spaces, leaving
/// bracketed identifiers untouched.
fn blank_comments_and_literals(source: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Literal,
        Bracket,
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();

    while let Some(ch) = chars.next() {
        match state {
            State::Code => match ch {
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::BlockComment;
                }
                '\'' => {
                    out.push(' ');
                    state = State::Literal;
                }
                '[' => {
                    out.push(ch);
                    state = State::Bracket;
                }
                _ => out.push(ch),
            },
            State::LineComment => {
                if ch == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    out.push(' ');
                }
            }
            State::BlockComment => {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = State::Code;
                } else {
                    out.push(if ch == '\n' { '\n' } else { ' ' });
                }
            }
            State::Literal => {
                if ch == '\'' {
                    // '' is an escaped quote inside the literal
                    if chars.peek() == Some(&'\'') {
                        chars.next();
                        out.push_str("  ");
                    } else {
                        out.push(' ');
                        state = State::Code;
                    }
                } else {
                    out.push(if ch == '\n' { '\n' } else { ' ' });
                }
            }
            State::Bracket => {
                out.push(ch);
                if ch == ']' {
                    state = State::Code;
                }
            }
        }
    }

    out
}

/// Edges from [`scan_candidates`]. Relation candidates are classified as
/// table or view by the store and dropped when it knows neither; the rest
/// become functions and procedures.
///
/// Visited keys carry a `relation:`/`routine:` prefix so a name caught by
/// both the table and the function pattern (`FROM dbo.Split(@list)`) is
/// looked up both ways.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalEdgeExtractor;

impl EdgeExtractor for LexicalEdgeExtractor {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::Lexical
    }

    fn extract_edges(
        &self,
        store: &dyn MetadataStore,
        routine: &RoutineRef,
        source: &str,
    ) -> Result<Vec<Edge>> {
        let candidates = scan_candidates(source);
        log::debug!(
            "{routine}: lexical scan found tables {:?}, {} function and {} procedure candidates",
            candidates.table_names(),
            candidates.functions.len(),
            candidates.procedures.len()
        );

        let mut relations = Vec::with_capacity(candidates.tables.len());
        for table in candidates.tables {
            match store.fetch_relation_kind(&table.name, &table.schema) {
                Ok(Some(kind)) => relations.push(Edge::lexical(table, kind)),
                Ok(None) => log::debug!("{routine}: {table} is not a known table or view, dropped"),
                // keep it so the column lookup records the failure
                Err(e) => {
                    log::debug!("{routine}: could not classify {table}: {e}");
                    relations.push(Edge::lexical(table, ObjectKind::Table));
                }
            }
        }

        let edges = relations
            .into_iter()
            .chain(
                candidates
                    .functions
                    .into_iter()
                    .map(|f| Edge::lexical(f, ObjectKind::Function)),
            )
            .chain(
                candidates
                    .procedures
                    .into_iter()
                    .map(|p| Edge::lexical(p, ObjectKind::Procedure)),
            )
            .collect();

        Ok(edges)
    }

    fn visit_key(&self, edge: &Edge) -> String {
        let class = if edge.kind.is_leaf() {
            "relation"
        } else {
            "routine"
        };
        format!("{class}:{}", edge.target.canonical_key())
    }

    fn root_key(&self, root: &RoutineRef) -> String {
        format!("routine:{}", root.canonical_key())
    }
}
