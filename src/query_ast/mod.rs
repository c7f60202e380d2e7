//! Join synthesizer: plan IR to a typed SELECT tree to dialect SQL.
//!
//! Pure over its inputs; the plan is never mutated and the same plan,
//! dialect and defaults always yield the same text.

pub mod ast;
pub mod builder;
pub mod emitter;
pub mod expression;
pub mod literal;
pub mod plan_cache;
pub mod rewrite;

pub use ast::SelectAst;
pub use plan_cache::PlanCache;
pub use rewrite::SynthesisDefaults;

use crate::errors::SynthesisError;
use crate::models::enums::Dialect;
use crate::models::structs::QueryPlan;

/// Hand-off value for the executor: one statement, its dialect, and the tree
/// it was rendered from.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub dialect: Dialect,
    pub ast: SelectAst,
}

pub fn synthesize(plan: &QueryPlan, dialect: Dialect) -> Result<CompiledQuery, SynthesisError> {
    synthesize_with_defaults(plan, dialect, &SynthesisDefaults::default())
}

pub fn synthesize_with_defaults(
    plan: &QueryPlan,
    dialect: Dialect,
    defaults: &SynthesisDefaults,
) -> Result<CompiledQuery, SynthesisError> {
    let ast = builder::build_select(plan, defaults)?;
    let sql = emitter::emit_sql(&ast, dialect)?;
    log::debug!("synthesized {} SQL over {} table(s): {}", dialect, plan.selections.len(), sql);
    Ok(CompiledQuery { sql, dialect, ast })
}
