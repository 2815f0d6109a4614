use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;

/// Outcome of linting one SQL text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintReport {
    pub passed: bool,
    pub violations: Vec<String>,
}

impl LintReport {
    pub fn clean() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    pub fn failed(violations: Vec<String>) -> Self {
        Self {
            passed: false,
            violations,
        }
    }
}

#[async_trait]
pub trait Linter: Send + Sync {
    async fn lint(&self, sql: &str) -> Result<LintReport>;
}

/// External linter fed the SQL on stdin. Exit status 0 means clean;
/// otherwise each non-empty output line is one violation.
#[derive(Debug, Clone)]
pub struct CommandLinter {
    program: String,
    args: Vec<String>,
}

impl CommandLinter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Linter for CommandLinter {
    async fn lint(&self, sql: &str) -> Result<LintReport> {
        let program = &self.program;
        let mut child = tokio::process::Command::new(program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start linter {program}"))?;

        // output is drained while the SQL is written
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(sql.as_bytes()).await?;
            }
            Ok::<_, std::io::Error>(())
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());

        // a linter may exit before reading all of its input
        match fed {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                return Err(e).with_context(|| format!("Failed to send SQL to {program}"));
            }
            _ => {}
        }
        let output = output.with_context(|| format!("Linter {program} did not finish"))?;
        if output.status.success() {
            return Ok(LintReport::clean());
        }

        let mut violations: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .chain(String::from_utf8_lossy(&output.stderr).lines())
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        if violations.is_empty() {
            violations.push(format!("{program} exited with {}", output.status));
        }
        Ok(LintReport::failed(violations))
    }
}
