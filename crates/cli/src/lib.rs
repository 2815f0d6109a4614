//! Orchestration around the dependency resolver: configuration, prompt
//! assembly, the rewrite service client, the lint-and-retry loop and the
//! JSONL audit trail used by the `proc-refactor` binary.

pub mod audit;
pub mod config;
pub mod lint;
pub mod pipeline;
pub mod prompt;
pub mod rewrite;

pub use audit::{AuditEntry, AuditLog, AuditResponse};
pub use config::{Config, API_KEY_ENV, DEFAULT_CONFIG_PATH};
pub use lint::{CommandLinter, LintReport, Linter};
pub use pipeline::{RefactorOutcome, RefactorPipeline};
pub use prompt::{build_prompt, RefactorPrompt, REFACTOR_INSTRUCTION};
pub use rewrite::{HttpRewriteClient, RewriteService};

use anyhow::{Context, Result};
use refactor_catalog::CatalogSnapshot;
use std::path::Path;

/// Catalog snapshot named by `--catalog`, falling back to `[catalog] snapshot`
pub fn load_catalog(config: &Config, override_path: Option<&Path>) -> Result<CatalogSnapshot> {
    let path = override_path
        .or(config.catalog.snapshot.as_deref())
        .context("No catalog configured: pass --catalog or set [catalog] snapshot")?;
    CatalogSnapshot::load(path).with_context(|| format!("Failed to load catalog {}", path.display()))
}
