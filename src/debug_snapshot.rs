//! Per-request debug artifacts: the plan, the SQL and the audit findings,
//! written side by side for later inspection. Never part of the result.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use sqlformat::{FormatOptions, Indent, QueryParams};

use crate::audit::{AuditIssue, Severity};
use crate::models::structs::QueryPlan;

pub fn default_sqlformat_options() -> FormatOptions<'static> {
    FormatOptions {
        joins_as_top_level: true,
        indent: Indent::Spaces(4),
        uppercase: Some(true),
        lines_between_queries: 2,
        inline: false,
        max_inline_block: 50,
        max_inline_arguments: Some(40),
        max_inline_top_level: Some(40),
        ..Default::default()
    }
}

#[derive(Serialize)]
struct IssueRecord<'a> {
    severity: Severity,
    message: String,
    #[serde(flatten)]
    issue: &'a AuditIssue,
}

pub struct DebugSnapshot<'a> {
    pub plan: &'a QueryPlan,
    pub sql: Option<&'a str>,
    pub issues: &'a [AuditIssue],
}

impl DebugSnapshot<'_> {
    /// Writes into a fresh `<utc timestamp>_<plan md5>` directory under `dir`
    /// and returns its path.
    pub fn write(&self, dir: &Path) -> io::Result<PathBuf> {
        let result = self.write_inner(dir);
        if let Err(e) = &result {
            log::warn!("Could not save debug snapshot under {}: {}", dir.display(), e);
        }
        result
    }

    fn write_inner(&self, dir: &Path) -> io::Result<PathBuf> {
        let plan_json = serde_json::to_string_pretty(self.plan).map_err(io::Error::other)?;
        let digest = format!("{:x}", md5::compute(plan_json.as_bytes()));
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let target = dir.join(format!("{}_{}", stamp, &digest[..12]));
        fs::create_dir_all(&target)?;

        fs::write(target.join("plan.json"), plan_json)?;
        if let Some(sql) = self.sql {
            let pretty = sqlformat::format(sql, &QueryParams::None, &default_sqlformat_options());
            fs::write(target.join("query.sql"), pretty)?;
        }
        let records: Vec<IssueRecord<'_>> = self
            .issues
            .iter()
            .map(|issue| IssueRecord { severity: issue.severity(), message: issue.to_string(), issue })
            .collect();
        let issues_json = serde_json::to_string_pretty(&records).map_err(io::Error::other)?;
        fs::write(target.join("audit_issues.json"), issues_json)?;

        log::debug!("debug snapshot written to {}", target.display());
        Ok(target)
    }
}
