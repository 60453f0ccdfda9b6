//! Transition rule out of the validation step

use crate::validation::ValidationVerdict;

/// Where the turn goes after a candidate has been validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationRoute {
    /// Run the sanitized query
    Execute { sql: String },
    /// Blocking error with attempts left: generate again
    Retry,
    /// Blocking error and no attempts left
    Exhausted,
    /// Nothing to run and nothing to report
    Stop,
}

/// Deterministic routing. Never mutates the attempt counter.
pub fn route_after_validation(
    verdict: &ValidationVerdict,
    attempt_count: u32,
    max_attempts: u32,
) -> ValidationRoute {
    if !verdict.errors().is_empty() {
        return if attempt_count < max_attempts {
            ValidationRoute::Retry
        } else {
            ValidationRoute::Exhausted
        };
    }

    match verdict.sanitized_query() {
        Some(sql) => ValidationRoute::Execute {
            sql: sql.to_string(),
        },
        None => ValidationRoute::Stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::SqlValidator;

    #[test]
    fn test_valid_verdict_executes_even_on_last_attempt() {
        let verdict = SqlValidator::default().validate("SELECT 1 FROM t WHERE a = 1 LIMIT 1");
        assert_eq!(
            route_after_validation(&verdict, 3, 3),
            ValidationRoute::Execute {
                sql: "SELECT 1 FROM t WHERE a = 1 LIMIT 1".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_verdict_retries_until_ceiling() {
        let verdict = SqlValidator::default().validate("DROP TABLE x");
        assert_eq!(route_after_validation(&verdict, 1, 3), ValidationRoute::Retry);
        assert_eq!(route_after_validation(&verdict, 2, 3), ValidationRoute::Retry);
        assert_eq!(route_after_validation(&verdict, 3, 3), ValidationRoute::Exhausted);
        assert_eq!(route_after_validation(&verdict, 4, 3), ValidationRoute::Exhausted);
    }

    #[test]
    fn test_no_query_follows_error_path() {
        let verdict = ValidationVerdict::no_query();
        assert_eq!(route_after_validation(&verdict, 1, 2), ValidationRoute::Retry);
        assert_eq!(route_after_validation(&verdict, 2, 2), ValidationRoute::Exhausted);
    }
}
