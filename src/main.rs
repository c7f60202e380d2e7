use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;

use plansmith::models::enums::{Dialect, PlannerTier};
use plansmith::models::schema::Schema;
use plansmith::{CompilerConfig, PatchOperation, PatchSession, audit, normalize_plan, synthesize_with_defaults};

/// Audit a planner-authored query plan and print the SQL it compiles to.
#[derive(Debug, Parser)]
#[command(name = "plansmith", version, about)]
struct Cli {
    /// Plan JSON produced by the planner
    plan: PathBuf,

    /// Schema JSON, either `{table: {columns, foreign_keys}}` or a list of `{table_name, columns}`
    schema: PathBuf,

    /// Target dialect (tsql, sqlite, postgres, mysql)
    #[arg(long)]
    dialect: Option<Dialect>,

    /// Default row limit when the plan has none
    #[arg(long)]
    limit: Option<u64>,

    /// Planner tier the plan was produced by (minimal, standard, full)
    #[arg(long)]
    tier: Option<PlannerTier>,

    /// Patch operation file(s) applied in order after the audit
    #[arg(long = "patch", value_name = "PATCH")]
    patches: Vec<PathBuf>,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _ = env_logger::Builder::from_default_env()
        .filter_module("plansmith", log::LevelFilter::Debug)
        .is_test(false)
        .try_init();

    let cli = Cli::parse();
    let mut config = CompilerConfig::from_env();
    if let Some(d) = cli.dialect {
        config.dialect = d;
    }
    if let Some(t) = cli.tier {
        config.tier = t;
    }
    if let Some(l) = cli.limit {
        config.default_limit = (l > 0).then_some(l);
    }

    let raw: Value = read_json(&cli.plan)?;
    let plan = normalize_plan(&raw, config.tier)?;
    let schema = read_schema(&cli.schema)?;

    let outcome = audit(&plan, &schema)?;
    for issue in &outcome.issues {
        eprintln!("[{:?}] {}", issue.severity(), issue);
    }
    let (audited, _) = outcome.into_validated().context("plan was flagged by the audit")?;

    let mut session = PatchSession::new(audited);
    for path in &cli.patches {
        for op in read_patches(path)? {
            let name = op.name();
            session
                .apply(op, &schema)
                .with_context(|| format!("applying {} from {}", name, path.display()))?;
        }
    }

    let query = synthesize_with_defaults(session.current(), config.dialect, &config.synthesis_defaults())?;
    println!("{}", query.sql);
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn read_schema(path: &Path) -> Result<Schema> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    match serde_json::from_str::<Schema>(&content) {
        Ok(schema) => Ok(schema),
        Err(_) => Schema::from_table_list(&content).with_context(|| format!("parsing schema {}", path.display())),
    }
}

/// A patch file holds one operation object or a list of them.
fn read_patches(path: &Path) -> Result<Vec<PatchOperation>> {
    let items = match read_json(path)? {
        Value::Array(items) => items,
        single => vec![single],
    };
    items
        .iter()
        .map(|v| PatchOperation::from_json(v).with_context(|| format!("in {}", path.display())))
        .collect()
}
