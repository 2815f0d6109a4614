use refactor_graph::{ResolutionContext, TypeDescription};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const REFACTOR_INSTRUCTION: &str = "Format, refactor and optimize the stored procedure below \
using the dependency metadata provided. Keep its behavior and signature unchanged. Return clean, \
logically structured T-SQL without redundant or outdated constructs.";

/// Request body sent to the rewrite service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefactorPrompt {
    pub instruction: String,
    pub proc_name: String,
    pub sql: String,
    pub context: serde_json::Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub types: BTreeMap<String, serde_json::Value>,
    /// Answer of the previous attempt, which `lint_feedback` refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_sql: Option<String>,
    /// Violations reported for the previous attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lint_feedback: Option<Vec<String>>,
}

pub fn build_prompt(
    proc_name: &str,
    sql: &str,
    context: &ResolutionContext,
    types: &BTreeMap<String, TypeDescription>,
) -> RefactorPrompt {
    RefactorPrompt {
        instruction: REFACTOR_INSTRUCTION.to_string(),
        proc_name: proc_name.to_string(),
        sql: sql.to_string(),
        context: context.to_json(),
        types: types
            .iter()
            .filter_map(|(name, ty)| Some((name.clone(), serde_json::to_value(ty).ok()?)))
            .collect(),
        previous_sql: None,
        lint_feedback: None,
    }
}

impl RefactorPrompt {
    /// Same request, asking the service to fix `violations` found in
    /// `previous_sql`, its last answer
    pub fn with_lint_feedback(&self, previous_sql: &str, violations: &[String]) -> Self {
        Self {
            previous_sql: Some(previous_sql.to_string()),
            lint_feedback: Some(violations.to_vec()),
            ..self.clone()
        }
    }
}
