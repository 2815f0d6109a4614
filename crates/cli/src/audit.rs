use crate::lint::LintReport;
use crate::prompt::RefactorPrompt;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResponse {
    pub refactored_sql: String,
}

/// One rewrite attempt, as written to the audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// RFC 3339, UTC
    pub timestamp: String,
    pub proc_name: String,
    pub attempt: u32,
    pub prompt: RefactorPrompt,
    pub response: AuditResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lint: Option<LintReport>,
}

impl AuditEntry {
    pub fn new(
        attempt: u32,
        prompt: &RefactorPrompt,
        refactored_sql: &str,
        lint: Option<LintReport>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            proc_name: prompt.proc_name.clone(),
            attempt,
            prompt: prompt.clone(),
            response: AuditResponse {
                refactored_sql: refactored_sql.to_string(),
            },
            lint,
        }
    }
}

/// Append-only JSON Lines log
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, entry: &AuditEntry) -> Result<()> {
        let path = &self.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut line = serde_json::to_string(entry).context("Failed to encode audit entry")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to open audit log {}", path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to write audit log {}", path.display()))?;
        file.flush().await?;
        Ok(())
    }

    /// Every entry written so far
    pub async fn read_all(&self) -> Result<Vec<AuditEntry>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read audit log {}", self.path.display()))?;
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("Corrupt audit line"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::build_prompt;
    use pretty_assertions::assert_eq;
    use refactor_graph::ResolutionContext;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn entries_are_appended_one_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("logs/audit.jsonl"));
        let prompt = build_prompt("GetOrders", "select 1", &ResolutionContext::new(), &BTreeMap::new());

        log.append(&AuditEntry::new(1, &prompt, "SELECT 1;", None))
            .await
            .unwrap();
        log.append(&AuditEntry::new(2, &prompt, "SELECT 1;", Some(LintReport::clean())))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);

        let entries = log.read_all().await.unwrap();
        assert_eq!(entries[0].attempt, 1);
        assert_eq!(entries[0].proc_name, "GetOrders");
        assert_eq!(entries[0].response.refactored_sql, "SELECT 1;");
        assert!(entries[0].lint.is_none());
        assert_eq!(entries[1].lint, Some(LintReport::clean()));
        assert!(chrono::DateTime::parse_from_rfc3339(&entries[1].timestamp).is_ok());
    }
}
