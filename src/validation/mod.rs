//! SQL validation and normalization for LLM-generated queries
//!
//! [`SqlValidator::validate`] is a pure function over the candidate text:
//! normalize, classify, bound, and fold everything into a [`ValidationVerdict`].
//! Blocking problems land in `errors`, advisories in `warnings`.

pub mod classifier;
pub mod enforcer;
pub mod normalizer;

pub use classifier::{classify, Classification, SuspiciousPattern, ALLOWED_PREFIXES, FORBIDDEN_KEYWORDS};
pub use enforcer::{Enforcement, LimitEnforcer, DEFAULT_MAX_ROWS};
pub use normalizer::{normalize, strip_accents, NormalizationPass, PASSES};

use crate::config::ValidatorConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Error recorded when the generation step produced nothing to validate
pub const NO_QUERY_ERROR: &str = "Nenhuma query foi gerada.";

/// Immutable outcome of validating one candidate query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    is_valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
    sanitized_query: Option<String>,
}

impl ValidationVerdict {
    fn new(errors: Vec<String>, warnings: Vec<String>, sanitized_query: Option<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            sanitized_query,
        }
    }

    /// Verdict for an empty or missing candidate
    pub fn no_query() -> Self {
        Self::new(vec![NO_QUERY_ERROR.to_string()], Vec::new(), None)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Normalized, limit-enforced text. Present for invalid queries too so
    /// callers can see what would have run.
    pub fn sanitized_query(&self) -> Option<&str> {
        self.sanitized_query.as_deref()
    }

    /// One-line description of the blocking errors, if any
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(format!("Erros de validação: {}", self.errors.join("; ")))
        }
    }
}

/// Stateless validator configured with the row cap
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlValidator {
    enforcer: LimitEnforcer,
}

impl SqlValidator {
    pub fn new(max_rows: u32) -> Self {
        Self {
            enforcer: LimitEnforcer::new(max_rows),
        }
    }

    pub fn from_config(config: &ValidatorConfig) -> Self {
        Self::new(config.max_rows)
    }

    pub fn max_rows(&self) -> u32 {
        self.enforcer.max_rows()
    }

    /// Validate a non-empty candidate. Emptiness is the caller's concern, see
    /// [`ValidationVerdict::no_query`].
    pub fn validate(&self, raw_query: &str) -> ValidationVerdict {
        let normalized = normalize(raw_query);
        let classification = classify(&normalized);

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if !classification.forbidden_keywords_found.is_empty() {
            warn!(
                keywords = ?classification.forbidden_keywords_found,
                "blocked query containing forbidden keywords"
            );
            errors.push(format!(
                "Comandos não permitidos encontrados: {}",
                classification.forbidden_keywords_found.join(", ")
            ));
        }

        if !classification.has_allowed_prefix {
            warn!("blocked query with disallowed statement prefix");
            errors.push(format!(
                "Query deve começar com {}",
                ALLOWED_PREFIXES.join(", ")
            ));
        }

        let enforcement = self.enforcer.enforce(&normalized);

        if enforcement.limit_added {
            warnings.push(format!(
                "Query sem LIMIT pode retornar muitos registros. Adicionando LIMIT {}",
                self.enforcer.max_rows()
            ));
        }

        if enforcement.missing_where {
            warnings.push(
                "Query sem WHERE pode fazer table scan. Recomendado adicionar filtro de ano."
                    .to_string(),
            );
        }

        if !classification.suspicious_patterns_found.is_empty() {
            let labels: Vec<&str> = classification
                .suspicious_patterns_found
                .iter()
                .map(SuspiciousPattern::label)
                .collect();
            warnings.push(format!("Padrões suspeitos detectados: {}", labels.join(", ")));
        }

        debug!(
            errors = errors.len(),
            warnings = warnings.len(),
            "validated candidate query"
        );

        ValidationVerdict::new(errors, warnings, Some(enforcement.query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_query_passes_unchanged() {
        let validator = SqlValidator::default();
        let verdict = validator.validate("SELECT * FROM t WHERE ano=2024 LIMIT 10");
        assert!(verdict.is_valid());
        assert!(verdict.errors().is_empty());
        assert!(verdict.warnings().is_empty());
        assert_eq!(verdict.sanitized_query(), Some("SELECT * FROM t WHERE ano=2024 LIMIT 10"));
        assert_eq!(verdict.error_summary(), None);
    }

    #[test]
    fn test_drop_is_blocked() {
        let verdict = SqlValidator::default().validate("DROP TABLE t");
        assert!(!verdict.is_valid());
        assert!(verdict.errors().iter().any(|e| e.contains("DROP")));
        // Rejected queries are still bounded so the caller can inspect them
        assert!(verdict.sanitized_query().unwrap().ends_with("LIMIT 1000"));
    }

    #[test]
    fn test_prefix_and_keyword_errors_accumulate() {
        let verdict = SqlValidator::default().validate("DELETE FROM t WHERE ano = 2024");
        assert_eq!(verdict.errors().len(), 2);
        assert!(verdict.errors()[0].contains("DELETE"));
        assert!(verdict.errors()[1].starts_with("Query deve começar com"));
    }

    #[test]
    fn test_warning_order() {
        let verdict = SqlValidator::new(25).validate("SELECT * FROM t -- all of it");
        assert!(verdict.is_valid());
        assert_eq!(verdict.warnings().len(), 3);
        assert!(verdict.warnings()[0].contains("LIMIT 25"));
        assert!(verdict.warnings()[1].contains("WHERE"));
        assert!(verdict.warnings()[2].contains("--"));
    }

    #[test]
    fn test_no_query_verdict() {
        let verdict = ValidationVerdict::no_query();
        assert!(!verdict.is_valid());
        assert_eq!(verdict.sanitized_query(), None);
        assert_eq!(
            verdict.error_summary().as_deref(),
            Some("Erros de validação: Nenhuma query foi gerada.")
        );
    }

    #[test]
    fn test_verdict_serializes() {
        let verdict = SqlValidator::default().validate("SELECT 1");
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["is_valid"], true);
        assert_eq!(json["sanitized_query"], "SELECT 1\nLIMIT 1000");
    }
}
