//! SQL operation-kind classification.

use std::fmt;

/// The classified verb of a SQL statement, driving permission checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Select,
    Insert,
    Update,
    Delete,
    Truncate,
    Create,
    Alter,
    Drop,
    Show,
    Describe,
    Explain,
    Unknown,
}

const KEYWORDS: &[(&str, OperationKind)] = &[
    ("SELECT", OperationKind::Select),
    ("INSERT", OperationKind::Insert),
    ("UPDATE", OperationKind::Update),
    ("DELETE", OperationKind::Delete),
    ("TRUNCATE", OperationKind::Truncate),
    ("CREATE", OperationKind::Create),
    ("ALTER", OperationKind::Alter),
    ("DROP", OperationKind::Drop),
    ("SHOW", OperationKind::Show),
    ("DESCRIBE", OperationKind::Describe),
    ("EXPLAIN", OperationKind::Explain),
];

impl OperationKind {
    /// Classify a statement by its first keyword token.
    pub fn classify(query: &str) -> Self {
        let upper = query.trim().to_ascii_uppercase();
        for (keyword, kind) in KEYWORDS {
            if let Some(rest) = upper.strip_prefix(keyword) {
                // The keyword must be a whole token, not a prefix of an
                // identifier (e.g. "SELECTION_LOG" is not a SELECT).
                if rest
                    .chars()
                    .next()
                    .map_or(true, |c| !c.is_ascii_alphanumeric() && c != '_')
                {
                    return *kind;
                }
            }
        }
        OperationKind::Unknown
    }

    /// Whether the statement produces a result set to fetch.
    pub fn returns_rows(&self) -> bool {
        matches!(
            self,
            OperationKind::Select
                | OperationKind::Show
                | OperationKind::Describe
                | OperationKind::Explain
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Select => "SELECT",
            OperationKind::Insert => "INSERT",
            OperationKind::Update => "UPDATE",
            OperationKind::Delete => "DELETE",
            OperationKind::Truncate => "TRUNCATE",
            OperationKind::Create => "CREATE",
            OperationKind::Alter => "ALTER",
            OperationKind::Drop => "DROP",
            OperationKind::Show => "SHOW",
            OperationKind::Describe => "DESCRIBE",
            OperationKind::Explain => "EXPLAIN",
            OperationKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_verb() {
        assert_eq!(
            OperationKind::classify("SELECT * FROM users"),
            OperationKind::Select
        );
        assert_eq!(
            OperationKind::classify("  insert into t values (1)"),
            OperationKind::Insert
        );
        assert_eq!(
            OperationKind::classify("Update t SET a = 1"),
            OperationKind::Update
        );
        assert_eq!(
            OperationKind::classify("DELETE FROM t WHERE id = 1"),
            OperationKind::Delete
        );
        assert_eq!(
            OperationKind::classify("TRUNCATE TABLE t"),
            OperationKind::Truncate
        );
        assert_eq!(
            OperationKind::classify("CREATE TABLE t (id INT)"),
            OperationKind::Create
        );
        assert_eq!(
            OperationKind::classify("alter table t add c int"),
            OperationKind::Alter
        );
        assert_eq!(OperationKind::classify("DROP TABLE t"), OperationKind::Drop);
        assert_eq!(OperationKind::classify("SHOW TABLES"), OperationKind::Show);
        assert_eq!(
            OperationKind::classify("DESCRIBE users"),
            OperationKind::Describe
        );
        assert_eq!(
            OperationKind::classify("EXPLAIN SELECT 1"),
            OperationKind::Explain
        );
    }

    #[test]
    fn unknown_for_anything_else() {
        assert_eq!(OperationKind::classify(""), OperationKind::Unknown);
        assert_eq!(OperationKind::classify("WITH x AS (..)"), OperationKind::Unknown);
        assert_eq!(OperationKind::classify("GRANT ALL"), OperationKind::Unknown);
    }

    #[test]
    fn keyword_must_be_a_whole_token() {
        assert_eq!(
            OperationKind::classify("SELECTION_LOG"),
            OperationKind::Unknown
        );
        assert_eq!(
            OperationKind::classify("UPDATES_PENDING"),
            OperationKind::Unknown
        );
    }

    #[test]
    fn read_like_kinds_return_rows() {
        assert!(OperationKind::Select.returns_rows());
        assert!(OperationKind::Show.returns_rows());
        assert!(OperationKind::Describe.returns_rows());
        assert!(OperationKind::Explain.returns_rows());
        assert!(!OperationKind::Insert.returns_rows());
        assert!(!OperationKind::Unknown.returns_rows());
    }
}
