//! Row-cap enforcement and the missing-filter advisory

use once_cell::sync::Lazy;
use regex::Regex;

/// Default row cap appended to unbounded queries
pub const DEFAULT_MAX_ROWS: u32 = 1000;

static LIMIT_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bLIMIT\b").expect("valid regex"));
static WHERE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bWHERE\b").expect("valid regex"));
static FROM_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bFROM\b").expect("valid regex"));

/// What the enforcer did to a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enforcement {
    /// The bounded query text
    pub query: String,
    /// A `LIMIT` was appended
    pub limit_added: bool,
    /// The query reads `FROM` something with no `WHERE` filter
    pub missing_where: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitEnforcer {
    max_rows: u32,
}

impl LimitEnforcer {
    pub fn new(max_rows: u32) -> Self {
        Self { max_rows }
    }

    pub fn max_rows(&self) -> u32 {
        self.max_rows
    }

    /// Bound the query. Never guesses a filter, only reports its absence.
    pub fn enforce(&self, query: &str) -> Enforcement {
        let missing_where = !has_where(query) && has_from(query);

        if has_limit(query) {
            return Enforcement {
                query: query.to_string(),
                limit_added: false,
                missing_where,
            };
        }

        let body = query.trim().trim_end_matches(';').trim_end();
        Enforcement {
            query: format!("{}\nLIMIT {}", body, self.max_rows),
            limit_added: true,
            missing_where,
        }
    }
}

impl Default for LimitEnforcer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ROWS)
    }
}

pub fn has_limit(query: &str) -> bool {
    LIMIT_TOKEN.is_match(query)
}

pub fn has_where(query: &str) -> bool {
    WHERE_TOKEN.is_match(query)
}

pub fn has_from(query: &str) -> bool {
    FROM_TOKEN.is_match(query)
}
