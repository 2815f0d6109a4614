use anyhow::Result;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use refactor_cli::{
    build_prompt, AuditLog, LintReport, Linter, RefactorPipeline, RefactorPrompt, RewriteService,
};
use refactor_graph::ResolutionContext;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Answers with the next scripted SQL and remembers every prompt
struct ScriptedRewriter {
    answers: Mutex<Vec<String>>,
    prompts: Mutex<Vec<RefactorPrompt>>,
}

impl ScriptedRewriter {
    fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().rev().map(|s| s.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RewriteService for ScriptedRewriter {
    async fn rewrite(&self, prompt: &RefactorPrompt) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.answers
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| anyhow::anyhow!("no more answers"))
    }
}

/// Flags lower-case `select`
struct KeywordCaseLinter;

#[async_trait]
impl Linter for KeywordCaseLinter {
    async fn lint(&self, sql: &str) -> Result<LintReport> {
        if sql.contains("select") {
            Ok(LintReport::failed(vec!["L010: keywords must be upper case".into()]))
        } else {
            Ok(LintReport::clean())
        }
    }
}

fn prompt() -> RefactorPrompt {
    build_prompt(
        "GetOrders",
        "select * from dbo.Orders",
        &ResolutionContext::new(),
        &BTreeMap::new(),
    )
}

#[tokio::test]
async fn without_linter_one_attempt_is_made() {
    let rewriter = ScriptedRewriter::new(&["select Id from dbo.Orders"]);
    let outcome = RefactorPipeline::new(&rewriter).run(prompt()).await.unwrap();

    assert_eq!(outcome.sql, "select Id from dbo.Orders");
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.lint, None);
    assert!(outcome.is_clean());
}

#[tokio::test]
async fn violations_are_fed_back_until_clean() {
    let rewriter = ScriptedRewriter::new(&["select Id from dbo.Orders", "SELECT Id FROM dbo.Orders"]);
    let outcome = RefactorPipeline::new(&rewriter)
        .with_linter(&KeywordCaseLinter, 3)
        .run(prompt())
        .await
        .unwrap();

    assert_eq!(outcome.sql, "SELECT Id FROM dbo.Orders");
    assert_eq!(outcome.attempts, 2);
    assert!(outcome.is_clean());

    let prompts = rewriter.prompts.lock().unwrap();
    assert_eq!(prompts[0].lint_feedback, None);
    assert_eq!(prompts[0].previous_sql, None);
    // the retry shows the service the answer the violations were found in
    assert_eq!(
        prompts[1].previous_sql.as_deref(),
        Some("select Id from dbo.Orders")
    );
    assert_eq!(
        prompts[1].lint_feedback,
        Some(vec!["L010: keywords must be upper case".to_string()])
    );
    assert_eq!(prompts[1].sql, prompts[0].sql);
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let rewriter = ScriptedRewriter::new(&["select 1", "select 2", "select 3", "SELECT 4"]);
    let outcome = RefactorPipeline::new(&rewriter)
        .with_linter(&KeywordCaseLinter, 2)
        .run(prompt())
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.sql, "select 2");
    assert!(!outcome.is_clean());
}

#[tokio::test]
async fn every_attempt_is_audited() {
    let dir = tempfile::tempdir().unwrap();
    let audit = AuditLog::new(dir.path().join("audit.jsonl"));
    let rewriter = ScriptedRewriter::new(&["select Id from dbo.Orders", "SELECT Id FROM dbo.Orders"]);

    RefactorPipeline::new(&rewriter)
        .with_linter(&KeywordCaseLinter, 3)
        .with_audit(&audit)
        .run(prompt())
        .await
        .unwrap();

    let entries = audit.read_all().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries.iter().map(|e| e.attempt).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(entries[0].proc_name, "GetOrders");
    assert_eq!(entries[0].response.refactored_sql, "select Id from dbo.Orders");
    assert_eq!(entries[0].lint.as_ref().map(|l| l.passed), Some(false));
    assert!(entries[1].prompt.lint_feedback.is_some());
    assert_eq!(
        entries[1].prompt.previous_sql.as_deref(),
        Some("select Id from dbo.Orders")
    );
    assert_eq!(entries[1].lint, Some(LintReport::clean()));
}

#[tokio::test]
async fn service_errors_propagate() {
    let rewriter = ScriptedRewriter::new(&[]);
    assert!(RefactorPipeline::new(&rewriter).run(prompt()).await.is_err());
}
