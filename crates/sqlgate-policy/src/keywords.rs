//! Static keyword classification tables.

/// Schema-definition keywords, gated by the DDL permission flag.
pub const DDL_KEYWORDS: &[&str] = &["CREATE", "ALTER", "DROP"];

/// Administrative keywords blocked when dangerous-keyword blocking is on.
/// Backends add their own on top (see `Dialect::dangerous_keyword_extras`).
pub const DANGEROUS_KEYWORDS: &[&str] = &[
    "GRANT",
    "REVOKE",
    "LOAD_FILE",
    "LOAD DATA",
    "INTO OUTFILE",
    "INTO DUMPFILE",
    "SYSTEM",
    "EXEC",
    "SHUTDOWN",
    "FLUSH",
    "RESET",
    "KILL",
    "SET PASSWORD",
];
