//! Per-target SQL rendering rules.
//!
//! Each target implements this trait to provide its quoting, row limiting
//! and literal rendering, and to declare which constructs it cannot express.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::models::enums::Dialect;
use crate::query_ast::ast::JoinKind;

/// Rendering rules for one target dialect.
pub trait SqlDialect: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Quotes a table, alias or column name, escaping the closing delimiter.
    fn quote_ident(&self, ident: &str) -> String;

    /// Single-quoted literal with embedded quotes doubled.
    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    fn emit_boolean(&self, value: bool) -> String {
        if value { "TRUE" } else { "FALSE" }.to_string()
    }

    fn emit_null(&self) -> String {
        "NULL".to_string()
    }

    /// Row limit placed right after `SELECT`; `None` when the dialect uses a
    /// trailing clause instead.
    fn emit_top(&self, _limit: u64) -> Option<String> {
        None
    }

    fn emit_limit(&self, limit: u64) -> String {
        format!(" LIMIT {}", limit)
    }

    fn emit_join_kind(&self, kind: JoinKind) -> &'static str {
        match kind {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }

    fn supports_full_join(&self) -> bool {
        true
    }

    /// Whether function-call literals from the planner can be passed through.
    fn supports_raw_expressions(&self) -> bool {
        false
    }

    /// Ranking/analytic windows must carry ORDER BY.
    fn requires_window_order(&self) -> bool {
        false
    }

    fn emit_cast(&self, expr: &str, target_type: &str) -> String {
        format!("CAST({} AS {})", expr, target_type)
    }

    fn emit_date(&self, date: NaiveDate) -> String {
        self.emit_cast(&self.quote_string(&date.format("%Y-%m-%d").to_string()), "DATE")
    }

    fn emit_datetime(&self, ts: NaiveDateTime) -> String {
        self.emit_cast(&self.quote_string(&ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()), "TIMESTAMP")
    }

    /// Case-insensitive match; lowers both sides where there is no native ILIKE.
    fn emit_ilike(&self, expr: &str, pattern: &str) -> String {
        format!("LOWER({}) LIKE LOWER({})", expr, pattern)
    }
}

/// SQL Server: bracket identifiers, TOP, bit booleans.
pub struct TsqlDialect;

impl SqlDialect for TsqlDialect {
    fn dialect(&self) -> Dialect {
        Dialect::Tsql
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn emit_top(&self, limit: u64) -> Option<String> {
        Some(format!("TOP {}", limit))
    }

    fn emit_limit(&self, _limit: u64) -> String {
        String::new()
    }

    fn emit_boolean(&self, value: bool) -> String {
        if value { "1" } else { "0" }.to_string()
    }

    fn supports_raw_expressions(&self) -> bool {
        true
    }

    fn requires_window_order(&self) -> bool {
        true
    }

    /// DATETIME holds milliseconds only; anything finer goes to DATETIME2,
    /// truncated to its 100ns resolution.
    fn emit_datetime(&self, ts: NaiveDateTime) -> String {
        let nanos = ts.nanosecond();
        if nanos % 1_000_000 == 0 {
            return self.emit_cast(&self.quote_string(&ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()), "DATETIME");
        }
        let text = format!("{}.{:07}", ts.format("%Y-%m-%d %H:%M:%S"), (nanos % 1_000_000_000) / 100);
        self.emit_cast(&self.quote_string(&text), "DATETIME2")
    }
}

/// SQLite: double-quoted identifiers, trailing LIMIT, dates as text.
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn emit_boolean(&self, value: bool) -> String {
        if value { "1" } else { "0" }.to_string()
    }

    fn supports_raw_expressions(&self) -> bool {
        true
    }

    // SQLite compares dates as ISO-8601 text.
    fn emit_date(&self, date: NaiveDate) -> String {
        self.quote_string(&date.format("%Y-%m-%d").to_string())
    }

    fn emit_datetime(&self, ts: NaiveDateTime) -> String {
        self.quote_string(&ts.format("%Y-%m-%d %H:%M:%S%.f").to_string())
    }
}

/// PostgreSQL: native ILIKE and TIMESTAMP casts.
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn emit_ilike(&self, expr: &str, pattern: &str) -> String {
        format!("{} ILIKE {}", expr, pattern)
    }
}

/// MySQL: backtick identifiers, no FULL JOIN.
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    // Backslash is an escape character inside MySQL string literals.
    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn supports_full_join(&self) -> bool {
        false
    }

    fn emit_datetime(&self, ts: NaiveDateTime) -> String {
        self.emit_cast(&self.quote_string(&ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()), "DATETIME")
    }
}

/// Rendering rules for `dialect`.
pub fn get_dialect(dialect: Dialect) -> Box<dyn SqlDialect> {
    match dialect {
        Dialect::Tsql => Box::new(TsqlDialect),
        Dialect::Sqlite => Box::new(SqliteDialect),
        Dialect::Postgres => Box::new(PostgresDialect),
        Dialect::Mysql => Box::new(MySqlDialect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_escape_their_own_quote_character() {
        assert_eq!(get_dialect(Dialect::Tsql).quote_ident("a]b"), "[a]]b]");
        assert_eq!(get_dialect(Dialect::Sqlite).quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(get_dialect(Dialect::Mysql).quote_ident("a`b"), "`a``b`");
    }

    #[test]
    fn tsql_limits_with_top() {
        let d = get_dialect(Dialect::Tsql);
        assert_eq!(d.emit_top(10).as_deref(), Some("TOP 10"));
        assert_eq!(d.emit_limit(10), "");
        assert_eq!(get_dialect(Dialect::Sqlite).emit_top(10), None);
        assert_eq!(get_dialect(Dialect::Sqlite).emit_limit(10), " LIMIT 10");
    }

    #[test]
    fn date_literals_per_dialect() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 31).unwrap();
        assert_eq!(get_dialect(Dialect::Tsql).emit_date(date), "CAST('2025-10-31' AS DATE)");
        assert_eq!(get_dialect(Dialect::Sqlite).emit_date(date), "'2025-10-31'");
        let ts = date.and_hms_opt(13, 5, 0).unwrap();
        assert_eq!(get_dialect(Dialect::Tsql).emit_datetime(ts), "CAST('2025-10-31 13:05:00' AS DATETIME)");
    }

    #[test]
    fn tsql_sub_millisecond_datetimes_use_datetime2() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 31).unwrap();
        let tsql = get_dialect(Dialect::Tsql);
        let millis = date.and_hms_milli_opt(8, 30, 0, 250).unwrap();
        assert_eq!(tsql.emit_datetime(millis), "CAST('2025-10-31 08:30:00.250' AS DATETIME)");
        let micros = date.and_hms_micro_opt(8, 30, 0, 123_456).unwrap();
        assert_eq!(tsql.emit_datetime(micros), "CAST('2025-10-31 08:30:00.1234560' AS DATETIME2)");
        let nanos = date.and_hms_nano_opt(8, 30, 0, 123_456_789).unwrap();
        assert_eq!(tsql.emit_datetime(nanos), "CAST('2025-10-31 08:30:00.1234567' AS DATETIME2)");
    }

    #[test]
    fn mysql_escapes_backslashes() {
        assert_eq!(get_dialect(Dialect::Mysql).quote_string("a\\'b"), "'a\\\\''b'");
    }
}
