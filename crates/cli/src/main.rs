use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use refactor_catalog::{CatalogSnapshot, RoutineRef};
use refactor_cli::{
    build_prompt, load_catalog, AuditLog, CommandLinter, Config, HttpRewriteClient,
    RefactorPipeline,
};
use refactor_graph::{
    describe_parameter_types, extract_parameter_types, scan_candidates, ExtractionStrategy,
    GraphResolver,
};
use serde_json::json;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "proc-refactor")]
#[command(about = "Dependency-aware stored procedure refactoring", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Configuration file (default: config/default_config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog snapshot JSON (overrides [catalog] snapshot)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dependency context of a routine as JSON
    Resolve(TargetArgs),

    /// Print the traversal graph of a routine: objects, references, cycles
    Graph(TargetArgs),

    /// List the object names a SQL file appears to reference
    Scan(ScanArgs),

    /// Rewrite a routine through the configured service
    Refactor(RefactorArgs),
}

#[derive(Args)]
struct TargetArgs {
    /// Routine to start from
    #[arg(long)]
    proc_name: String,

    /// Schema of the routine
    #[arg(long, default_value = "dbo")]
    schema: String,

    /// Routine hops followed below the root (overrides [resolver] depth)
    #[arg(long, allow_hyphen_values = true)]
    depth: Option<i32>,

    /// Edge extraction: catalog|lexical (overrides [resolver] strategy)
    #[arg(long)]
    strategy: Option<ExtractionStrategy>,
}

impl TargetArgs {
    fn routine(&self) -> RoutineRef {
        RoutineRef::new(&self.schema, &self.proc_name)
    }

    fn apply(&self, config: &mut Config) {
        if let Some(depth) = self.depth {
            config.resolver.depth = depth;
        }
        if let Some(strategy) = self.strategy {
            config.resolver.strategy = strategy;
        }
    }
}

#[derive(Args)]
struct ScanArgs {
    /// SQL file to scan
    path: PathBuf,
}

#[derive(Args)]
struct RefactorArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// JSONL audit log (overrides [audit] path)
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Show SQL, context and prompt without calling the service
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    let json_output = matches!(
        cli.command,
        Commands::Resolve(_) | Commands::Graph(_) | Commands::Scan(_)
    );
    if json_output && !cli.verbose {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let mut config = Config::load(cli.config.as_deref())?;
    log::debug!("Configuration: {config:?}");

    match &cli.command {
        Commands::Resolve(args) => {
            args.apply(&mut config);
            run_resolve(&cli, &config, args)?
        }
        Commands::Graph(args) => {
            args.apply(&mut config);
            run_graph(&cli, &config, args)?
        }
        Commands::Scan(args) => run_scan(args)?,
        Commands::Refactor(args) => {
            args.target.apply(&mut config);
            run_refactor(&cli, &config, args).await?
        }
    }

    Ok(())
}

fn open_catalog(cli: &Cli, config: &Config, needs_api: bool) -> Result<CatalogSnapshot> {
    config
        .validate(needs_api)
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;
    load_catalog(config, cli.catalog.as_deref())
}

fn run_resolve(cli: &Cli, config: &Config, args: &TargetArgs) -> Result<()> {
    let store = open_catalog(cli, config, false)?;
    let extractor = config.resolver.strategy.extractor();
    let resolver = GraphResolver::new(&store, extractor.as_ref());

    let root = args.routine();
    let Some(context) = resolver.resolve(&root, config.resolver.depth)? else {
        anyhow::bail!("Procedure {root} not found.");
    };
    println!("{}", serde_json::to_string_pretty(&context)?);
    Ok(())
}

fn run_graph(cli: &Cli, config: &Config, args: &TargetArgs) -> Result<()> {
    let store = open_catalog(cli, config, false)?;
    let extractor = config.resolver.strategy.extractor();
    let resolver = GraphResolver::new(&store, extractor.as_ref());

    let root = args.routine();
    let Some(resolution) = resolver.resolve_traced(&root, config.resolver.depth)? else {
        anyhow::bail!("Procedure {root} not found.");
    };

    let graph = &resolution.graph;
    let edges: Vec<_> = graph
        .edges()
        .into_iter()
        .map(|(from, to)| json!({ "from": from.target.to_string(), "to": to.target.to_string() }))
        .collect();
    let cycles: Vec<Vec<String>> = graph
        .cycles()
        .into_iter()
        .map(|cycle| cycle.iter().map(ToString::to_string).collect())
        .collect();
    let output = json!({
        "root": root.to_string(),
        "kind": resolution.root_kind,
        "strategy": config.resolver.strategy,
        "depth": config.resolver.depth,
        "objects": graph.node_count(),
        "edges": edges,
        "cycles": cycles,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_scan(args: &ScanArgs) -> Result<()> {
    let source = fs::read_to_string(&args.path)
        .with_context(|| format!("Failed to read {}", args.path.display()))?;

    let candidates = scan_candidates(&source);
    let names = |refs: &[RoutineRef]| -> Vec<String> { refs.iter().map(ToString::to_string).collect() };
    let types: Vec<_> = extract_parameter_types(&source)
        .into_iter()
        .map(|t| json!({ "variable": t.variable, "type": t.type_ref.to_string(), "readonly": t.read_only }))
        .collect();

    let output = json!({
        "tables": names(&candidates.tables),
        "functions": names(&candidates.functions),
        "procedures": names(&candidates.procedures),
        "types": types,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_refactor(cli: &Cli, config: &Config, args: &RefactorArgs) -> Result<()> {
    let store = open_catalog(cli, config, !args.dry_run)?;
    let extractor = config.resolver.strategy.extractor();
    let resolver = GraphResolver::new(&store, extractor.as_ref());

    let root = args.target.routine();
    let Some((_, source)) = resolver.fetch_root(&root)? else {
        anyhow::bail!("Procedure {root} not found.");
    };

    log::info!("Analyzing dependencies of {root}");
    let context = resolver.resolve_with_source(&root, &source, config.resolver.depth)?;
    let types = describe_parameter_types(&store, &source);
    let prompt = build_prompt(&args.target.proc_name, &source, &context, &types);

    if args.dry_run {
        println!("=== DRY RUN ===");
        println!("\n-- Procedure SQL:");
        println!("{}", source.trim());
        println!("\n-- Dependency context:");
        println!("{}", serde_json::to_string_pretty(&context)?);
        println!("\n-- Prompt:");
        println!("{}", serde_json::to_string_pretty(&prompt)?);
        return Ok(());
    }

    let rewriter = HttpRewriteClient::new(&config.api)?;
    let linter = config
        .lint
        .command
        .as_ref()
        .map(|command| CommandLinter::new(command, config.lint.args.clone()));
    let audit = args
        .audit_log
        .clone()
        .or_else(|| config.audit.path.clone())
        .map(AuditLog::new);

    let mut pipeline = RefactorPipeline::new(&rewriter);
    if let Some(linter) = &linter {
        pipeline = pipeline.with_linter(linter, config.lint.max_attempts);
    }
    if let Some(audit) = &audit {
        pipeline = pipeline.with_audit(audit);
    }

    let outcome = pipeline.run(prompt).await?;
    if !outcome.is_clean() {
        log::warn!(
            "Returning SQL that still fails lint after {} attempt(s)",
            outcome.attempts
        );
    }
    println!("{}", outcome.sql);
    Ok(())
}
