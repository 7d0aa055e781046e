//! Query inspection: keyword, schema-reference, and injection scanning.
//!
//! The scanning sits behind [`QueryInspector`] so the regex heuristics can
//! be swapped for a tokenizer-based implementation without touching the
//! validator.

use crate::keywords::{DANGEROUS_KEYWORDS, DDL_KEYWORDS};
use once_cell::sync::Lazy;
use regex::Regex;

/// Scans raw SQL text for policy-relevant shapes.
pub trait QueryInspector: Send + Sync {
    /// First DDL keyword present in the query, if any.
    fn ddl_keyword(&self, query: &str) -> Option<String>;

    /// First dangerous keyword present in the query, if any.
    fn dangerous_keyword(&self, query: &str) -> Option<String>;

    /// Description of the first injection-shaped pattern found, if any.
    fn injection_pattern(&self, query: &str) -> Option<&'static str>;

    /// Schema qualifiers referenced in FROM/JOIN/INTO/UPDATE clauses.
    fn schema_references(&self, query: &str) -> Vec<String>;
}

/// How one keyword is matched against query text.
enum Matcher {
    /// Single word: word-boundary match, case-insensitive. A naive
    /// substring match would flag identifiers like `created_at` or
    /// `dropdown`.
    Word { keyword: &'static str, pattern: Regex },
    /// Multi-word phrase: literal substring of the upper-cased query.
    Phrase { keyword: &'static str },
}

impl Matcher {
    fn new(keyword: &'static str) -> Self {
        if keyword.contains(' ') {
            Matcher::Phrase { keyword }
        } else {
            let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(keyword)))
                .expect("keyword pattern is valid");
            Matcher::Word { keyword, pattern }
        }
    }

    fn matches(&self, query: &str, upper_query: &str) -> Option<&'static str> {
        match self {
            Matcher::Word { keyword, pattern } => pattern.is_match(query).then_some(*keyword),
            Matcher::Phrase { keyword } => upper_query.contains(keyword).then_some(*keyword),
        }
    }
}

static INJECTION_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(?i)'\s*(OR|AND)\s*'\s*=\s*'").expect("valid pattern"),
            "quoted tautology",
        ),
        (
            Regex::new(r"(?i)\b(OR|AND)\s+1\s*=\s*1\b").expect("valid pattern"),
            "numeric tautology",
        ),
        (
            Regex::new(r"(?i)UNION\s+SELECT").expect("valid pattern"),
            "UNION SELECT",
        ),
        (
            Regex::new(r"/\*.*\*/").expect("valid pattern"),
            "block comment",
        ),
        (Regex::new(r"-{2,}").expect("valid pattern"), "line comment"),
        (
            Regex::new(r"(?i);\s*(DROP|DELETE|INSERT)").expect("valid pattern"),
            "statement chaining",
        ),
    ]
});

static SCHEMA_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    // FROM/JOIN/INTO/UPDATE followed by an optional `schema.` qualifier.
    Regex::new(r#"(?i)\b(?:FROM|JOIN|INTO|UPDATE)\s+(?:[`"]?(\w+)[`"]?\.)?[`"]?\w+"#)
        .expect("valid pattern")
});

/// Regex-based [`QueryInspector`].
///
/// Best-effort: matching runs over raw SQL text, so a keyword inside a
/// string literal is a false positive and a schema name buried in a
/// subquery expression may be missed. These are accepted limitations of
/// the heuristic layer.
pub struct RegexInspector {
    ddl: Vec<Matcher>,
    dangerous: Vec<Matcher>,
}

impl RegexInspector {
    /// Build an inspector with the common keyword tables plus
    /// backend-specific dangerous keywords.
    pub fn new(extra_dangerous: &[&'static str]) -> Self {
        let ddl = DDL_KEYWORDS.iter().copied().map(Matcher::new).collect();
        let dangerous = DANGEROUS_KEYWORDS
            .iter()
            .chain(extra_dangerous.iter())
            .copied()
            .map(Matcher::new)
            .collect();
        Self { ddl, dangerous }
    }
}

impl Default for RegexInspector {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl QueryInspector for RegexInspector {
    fn ddl_keyword(&self, query: &str) -> Option<String> {
        let upper = query.to_ascii_uppercase();
        self.ddl
            .iter()
            .find_map(|m| m.matches(query, &upper))
            .map(String::from)
    }

    fn dangerous_keyword(&self, query: &str) -> Option<String> {
        let upper = query.to_ascii_uppercase();
        self.dangerous
            .iter()
            .find_map(|m| m.matches(query, &upper))
            .map(String::from)
    }

    fn injection_pattern(&self, query: &str) -> Option<&'static str> {
        INJECTION_PATTERNS
            .iter()
            .find(|(pattern, _)| pattern.is_match(query))
            .map(|(_, name)| *name)
    }

    fn schema_references(&self, query: &str) -> Vec<String> {
        let mut schemas = Vec::new();
        for caps in SCHEMA_REFERENCE.captures_iter(query) {
            if let Some(schema) = caps.get(1) {
                let schema = schema.as_str().to_string();
                if !schemas.contains(&schema) {
                    schemas.push(schema);
                }
            }
        }
        schemas
    }
}
