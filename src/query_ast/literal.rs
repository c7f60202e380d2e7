//! Classification of text filter values before they become AST literals.
//!
//! Upstream planners often quote a date/time function call
//! (`'DATEADD(DAY, -60, GETDATE())'`). Such values are unwrapped into raw
//! expressions, but only after the tokenizer confirms the text is a single
//! function call with balanced parentheses and nothing statement-like in it.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};

static QUOTED_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*'\s*([A-Za-z_][A-Za-z0-9_]*\s*\(.*\))\s*'\s*$").expect("valid quoted call pattern")
});
static BARE_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*([A-Z_][A-Z0-9_]*\(.*\))\s*$").expect("valid bare call pattern"));
static DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date pattern"));
static DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}(\.\d{1,9})?$").expect("valid datetime pattern")
});

const STATEMENT_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "EXEC", "EXECUTE", "MERGE",
    "GRANT", "REVOKE", "UNION", "DECLARE", "SHUTDOWN",
];

#[derive(Debug, Clone, PartialEq)]
pub enum TextLiteral {
    /// Verified function-call expression, quotes stripped.
    FunctionCall(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text,
}

pub fn classify_text(value: &str) -> TextLiteral {
    if let Some(call) = detect_function_call(value) {
        return TextLiteral::FunctionCall(call);
    }
    if DATE.is_match(value)
        && let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
    {
        return TextLiteral::Date(d);
    }
    if DATETIME.is_match(value)
        && let Ok(ts) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
    {
        return TextLiteral::DateTime(ts);
    }
    TextLiteral::Text
}

/// Returns the unquoted call text when `value` is a (possibly quoted)
/// function-call expression.
pub fn detect_function_call(value: &str) -> Option<String> {
    let candidate = if let Some(caps) = QUOTED_CALL.captures(value) {
        caps[1].trim().to_string()
    } else if let Some(caps) = BARE_CALL.captures(value) {
        caps[1].to_string()
    } else {
        return None;
    };
    is_single_call(&candidate).then_some(candidate)
}

fn is_single_call(expr: &str) -> bool {
    let dialect = GenericDialect {};
    let Ok(tokens) = Tokenizer::new(&dialect, expr).tokenize() else {
        return false;
    };
    let mut depth = 0i32;
    let mut closed = false;
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Whitespace(Whitespace::SingleLineComment { .. } | Whitespace::MultiLineComment(_)) => return false,
            Token::Whitespace(_) | Token::EOF => continue,
            _ if closed => return false,
            Token::SemiColon => return false,
            Token::Word(w) => {
                if i == 0 && w.quote_style.is_some() {
                    return false;
                }
                if w.quote_style.is_none() && STATEMENT_KEYWORDS.contains(&w.value.to_ascii_uppercase().as_str()) {
                    return false;
                }
            }
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
                if depth == 0 {
                    closed = true;
                }
            }
            _ if i == 0 => return false,
            _ => {}
        }
    }
    closed && depth == 0
}
