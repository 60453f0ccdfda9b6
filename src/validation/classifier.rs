//! Structural safety classification of candidate SQL
//!
//! The forbidden-keyword scan and the allowed-prefix check are the security
//! boundary. The suspicious-pattern scan is advisory only.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Statements that would make the query anything other than read-only
pub const FORBIDDEN_KEYWORDS: [&str; 13] = [
    "DROP", "DELETE", "UPDATE", "INSERT", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE",
    "EXECUTE", "CALL", "MERGE", "REPLACE",
];

/// Accepted leading tokens of a query
pub const ALLOWED_PREFIXES: [&str; 6] = ["SELECT", "WITH", "(", "SHOW", "DESCRIBE", "DESC"];

static FORBIDDEN_REGEXES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    FORBIDDEN_KEYWORDS
        .iter()
        .map(|keyword| {
            let regex = Regex::new(&format!(r"(?i)\b{}\b", keyword))
                .expect("forbidden keyword pattern must compile");
            (*keyword, regex)
        })
        .collect()
});

static SUSPICIOUS_REGEXES: Lazy<Vec<(SuspiciousPattern, Regex)>> = Lazy::new(|| {
    SuspiciousPattern::ALL
        .iter()
        .map(|pattern| {
            let regex =
                Regex::new(pattern.regex()).expect("suspicious pattern regex must compile");
            (*pattern, regex)
        })
        .collect()
});

/// Injection-like shapes that are reported but never block a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspiciousPattern {
    StatementTermination,
    LineComment,
    BlockComment,
    Tautology,
    Xor,
    UnionSelect,
}

impl SuspiciousPattern {
    pub const ALL: [SuspiciousPattern; 6] = [
        SuspiciousPattern::StatementTermination,
        SuspiciousPattern::LineComment,
        SuspiciousPattern::BlockComment,
        SuspiciousPattern::Tautology,
        SuspiciousPattern::Xor,
        SuspiciousPattern::UnionSelect,
    ];

    fn regex(&self) -> &'static str {
        match self {
            Self::StatementTermination => r"';",
            Self::LineComment => r"--",
            Self::BlockComment => r"/\*",
            Self::Tautology => r"(?i)\bor\s+1\s*=\s*1\b",
            Self::Xor => r"(?i)\bxor\b",
            Self::UnionSelect => r"(?is)\bunion\b.*\bselect\b",
        }
    }

    /// Short label used in advisory warnings
    pub fn label(&self) -> &'static str {
        match self {
            Self::StatementTermination => "';",
            Self::LineComment => "--",
            Self::BlockComment => "/*",
            Self::Tautology => "OR 1=1",
            Self::Xor => "XOR",
            Self::UnionSelect => "UNION ... SELECT",
        }
    }
}

impl fmt::Display for SuspiciousPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of classifying one candidate query
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Classification {
    pub forbidden_keywords_found: Vec<&'static str>,
    pub has_allowed_prefix: bool,
    pub suspicious_patterns_found: Vec<SuspiciousPattern>,
}

impl Classification {
    /// True when nothing in the classification blocks execution
    pub fn is_structurally_safe(&self) -> bool {
        self.forbidden_keywords_found.is_empty() && self.has_allowed_prefix
    }
}

/// Classify a query. Pure function over the text.
pub fn classify(query: &str) -> Classification {
    Classification {
        forbidden_keywords_found: find_forbidden_keywords(query),
        has_allowed_prefix: has_allowed_prefix(query),
        suspicious_patterns_found: find_suspicious_patterns(query),
    }
}

/// Whole-word, case-insensitive scan for write/DDL/privilege keywords
pub fn find_forbidden_keywords(query: &str) -> Vec<&'static str> {
    FORBIDDEN_REGEXES
        .iter()
        .filter(|(_, regex)| regex.is_match(query))
        .map(|(keyword, _)| *keyword)
        .collect()
}

pub fn has_allowed_prefix(query: &str) -> bool {
    let head = query.trim().to_uppercase();
    ALLOWED_PREFIXES.iter().any(|prefix| head.starts_with(prefix))
}

pub fn find_suspicious_patterns(query: &str) -> Vec<SuspiciousPattern> {
    SUSPICIOUS_REGEXES
        .iter()
        .filter(|(_, regex)| regex.is_match(query))
        .map(|(pattern, _)| *pattern)
        .collect()
}
