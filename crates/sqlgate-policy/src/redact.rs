//! Log redaction for query text.
//!
//! Query previews go through [`redact`] before reaching any log line so
//! secret-bearing statements (e.g. `SET PASSWORD`, DSN fragments) never
//! land in logs verbatim.

use once_cell::sync::Lazy;
use regex::Regex;

static PASSWORD_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(password|pwd)\s*=\s*['"][^'"]*['"]"#).expect("valid pattern")
});

/// Mask password-looking values in a string destined for a log line.
pub fn redact(value: &str) -> String {
    PASSWORD_VALUE.replace_all(value, "$1=***").into_owned()
}

/// A redacted, length-capped preview of a query for logging.
pub fn preview(query: &str, max_len: usize) -> String {
    let redacted = redact(query);
    if redacted.len() > max_len {
        let mut cut = max_len;
        while !redacted.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &redacted[..cut])
    } else {
        redacted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_password_values() {
        assert_eq!(
            redact("SET PASSWORD FOR u = password('x'); password='hunter2'"),
            "SET PASSWORD FOR u = password('x'); password=***"
        );
        assert_eq!(redact(r#"pwd = "secret""#), "pwd=***");
    }

    #[test]
    fn leaves_ordinary_text_alone() {
        assert_eq!(redact("SELECT * FROM users"), "SELECT * FROM users");
    }

    #[test]
    fn preview_truncates_long_queries() {
        let long = "SELECT ".to_string() + &"x, ".repeat(100);
        let p = preview(&long, 50);
        assert!(p.len() <= 53);
        assert!(p.ends_with("..."));
    }
}
