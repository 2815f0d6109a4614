use crate::audit::{AuditEntry, AuditLog};
use crate::lint::{LintReport, Linter};
use crate::prompt::RefactorPrompt;
use crate::rewrite::RewriteService;
use anyhow::Result;

/// Result of the rewrite/lint loop
#[derive(Debug, Clone, PartialEq)]
pub struct RefactorOutcome {
    /// Last SQL the service returned
    pub sql: String,
    pub attempts: u32,
    /// Lint result of `sql`; `None` when no linter is configured
    pub lint: Option<LintReport>,
}

impl RefactorOutcome {
    pub fn is_clean(&self) -> bool {
        self.lint.as_ref().map_or(true, |report| report.passed)
    }
}

/// Rewrite a routine, lint the answer and ask again with the violations
/// until it lints clean or `max_attempts` rewrites were made.
pub struct RefactorPipeline<'a> {
    rewriter: &'a dyn RewriteService,
    linter: Option<&'a dyn Linter>,
    audit: Option<&'a AuditLog>,
    max_attempts: u32,
}

impl<'a> RefactorPipeline<'a> {
    pub fn new(rewriter: &'a dyn RewriteService) -> Self {
        Self {
            rewriter,
            linter: None,
            audit: None,
            max_attempts: 1,
        }
    }

    pub fn with_linter(mut self, linter: &'a dyn Linter, max_attempts: u32) -> Self {
        self.linter = Some(linter);
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_audit(mut self, audit: &'a AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub async fn run(&self, prompt: RefactorPrompt) -> Result<RefactorOutcome> {
        let mut prompt = prompt;
        let mut attempt = 0;

        loop {
            attempt += 1;
            log::info!("Requesting rewrite of {} (attempt {attempt})", prompt.proc_name);
            let sql = self.rewriter.rewrite(&prompt).await?;

            let lint = match self.linter {
                Some(linter) => Some(linter.lint(&sql).await?),
                None => None,
            };

            if let Some(audit) = self.audit {
                audit
                    .append(&AuditEntry::new(attempt, &prompt, &sql, lint.clone()))
                    .await?;
            }

            let violations = match &lint {
                Some(report) if !report.passed => report.violations.clone(),
                _ => {
                    return Ok(RefactorOutcome {
                        sql,
                        attempts: attempt,
                        lint,
                    })
                }
            };

            if attempt >= self.max_attempts {
                log::warn!(
                    "{}: {} lint violation(s) left after {attempt} attempt(s)",
                    prompt.proc_name,
                    violations.len()
                );
                return Ok(RefactorOutcome {
                    sql,
                    attempts: attempt,
                    lint,
                });
            }

            log::warn!(
                "{}: {} lint violation(s), retrying",
                prompt.proc_name,
                violations.len()
            );
            prompt = prompt.with_lint_feedback(&sql, &violations);
        }
    }
}
