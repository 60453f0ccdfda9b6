//! SQL Validator Security Tests
//!
//! End-to-end checks of the validator's public API: the reference queries
//! plus safety, prefix, limit and idempotence properties over a small corpus
//! of benign and hostile candidates.

use antaq_sql_agent::validation::{normalize, SqlValidator, ALLOWED_PREFIXES, FORBIDDEN_KEYWORDS};

const ACCENT_FIELD: &str = "REGEXP_REPLACE(NORMALIZE(LOWER(porto_atracacao), NFD), r'\\pM', '')";

fn corpus() -> Vec<&'static str> {
    vec![
        "SELECT * FROM t WHERE ano=2024 LIMIT 10",
        "SELECT * FROM t WHERE ano=2024",
        "SELECT porto_atracacao, SUM(vlpesocargabruta_oficial) FROM v GROUP BY 1",
        "WITH x AS (SELECT 1 AS n) SELECT n FROM x",
        "  select * from v where LOWER(porto_atracacao) LIKE '%Porto de Paranaguá%' limit 5;",
        "SELECT * FROM v WHERE porto_atracacao LIKE '%Terminais de Santos%'",
        "SELECT * FROM v WHERE porto_atracacao LIKE '%porto de  %' AND ano = 2024",
        "SELECT * FROM v WHERE LOWER(porto_atracacao) LIKE '%portos do paraná%'",
        "SELECT * FROM v WHERE natureza_carga = 'Granel Sólido'",
        "SELECT REGEXP_REPLACE(nome, 'a', 'b') FROM v WHERE ano = 2023",
        "DROP TABLE t",
        "SELECT * FROM t; DELETE FROM t",
        "SELECT * FROM t WHERE 1=1 OR 1=1 -- comment",
        "UPDATE t SET a = 1",
        "INSERT INTO t VALUES (1)",
        "GRANT ALL ON t TO someone",
        "SELECT a FROM t UNION SELECT b FROM u",
        "CALL proc()",
        "hello there",
        "SELECT * FROM t WHERE nome = 'truncate'",
    ]
}

fn contains_word(haystack: &str, word: &str) -> bool {
    let upper = haystack.to_uppercase();
    upper
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .any(|token| token == word)
}

#[test]
fn test_reference_valid_query_passes_untouched() {
    let verdict = SqlValidator::default().validate("SELECT * FROM t WHERE ano=2024 LIMIT 10");

    assert!(verdict.is_valid());
    assert!(verdict.errors().is_empty());
    assert!(verdict.warnings().is_empty());
    assert_eq!(
        verdict.sanitized_query(),
        Some("SELECT * FROM t WHERE ano=2024 LIMIT 10")
    );
}

#[test]
fn test_reference_drop_is_rejected() {
    let verdict = SqlValidator::default().validate("DROP TABLE t");

    assert!(!verdict.is_valid());
    assert!(verdict.errors().iter().any(|e| e.contains("DROP")));
}

#[test]
fn test_reference_missing_limit_is_bounded() {
    let verdict = SqlValidator::default().validate("SELECT * FROM t WHERE ano=2024");

    assert!(verdict.is_valid());
    assert!(verdict.warnings().iter().any(|w| w.contains("LIMIT")));
    let sanitized = verdict.sanitized_query().unwrap_or_default();
    assert!(sanitized.ends_with("LIMIT 1000"), "got {sanitized}");
}

#[test]
fn test_reference_port_prefix_is_collapsed_and_accent_folded() {
    let verdict = SqlValidator::default()
        .validate("SELECT * FROM t WHERE LOWER(porto_atracacao) LIKE '%porto de itaqui%' LIMIT 10");

    assert!(verdict.is_valid());
    assert_eq!(
        verdict.sanitized_query().map(str::to_string),
        Some(format!(
            "SELECT * FROM t WHERE {ACCENT_FIELD} LIKE '%itaqui%' LIMIT 10"
        ))
    );
}

#[test]
fn test_valid_verdicts_never_contain_forbidden_keywords() {
    let validator = SqlValidator::default();

    for query in corpus() {
        let verdict = validator.validate(query);
        if !verdict.is_valid() {
            continue;
        }
        let sanitized = verdict.sanitized_query().unwrap_or_default();
        for keyword in FORBIDDEN_KEYWORDS {
            assert!(
                !contains_word(sanitized, keyword),
                "valid verdict for {query:?} contains {keyword}"
            );
        }
    }
}

#[test]
fn test_valid_verdicts_start_with_allowed_prefix() {
    let validator = SqlValidator::default();

    for query in corpus() {
        let verdict = validator.validate(query);
        if !verdict.is_valid() {
            continue;
        }
        let sanitized = verdict.sanitized_query().unwrap_or_default().trim().to_uppercase();
        assert!(
            ALLOWED_PREFIXES.iter().any(|p| sanitized.starts_with(p)),
            "valid verdict for {query:?} has no allowed prefix"
        );
    }
}

#[test]
fn test_valid_verdicts_are_always_bounded() {
    let validator = SqlValidator::new(250);

    for query in corpus() {
        let verdict = validator.validate(query);
        if verdict.is_valid() {
            let sanitized = verdict.sanitized_query().unwrap_or_default();
            assert!(contains_word(sanitized, "LIMIT"), "unbounded: {sanitized}");
        }
    }
}

#[test]
fn test_regexp_replace_in_rewrites_is_not_forbidden() {
    let validator = SqlValidator::default();
    let verdict = validator.validate(
        "SELECT SUM(vlpesocargabruta_oficial) FROM v WHERE porto_atracacao LIKE '%Itajaí%' AND ano = 2024",
    );

    assert!(verdict.is_valid(), "errors: {:?}", verdict.errors());
    assert!(verdict.sanitized_query().unwrap_or_default().contains("REGEXP_REPLACE"));
}

#[test]
fn test_normalization_is_idempotent_over_corpus() {
    for query in corpus() {
        let once = normalize(query);
        assert_eq!(normalize(&once), once, "not idempotent for {query:?}");
    }
}

#[test]
fn test_validation_is_deterministic() {
    let validator = SqlValidator::default();
    for query in corpus() {
        assert_eq!(validator.validate(query), validator.validate(query));
    }
}

#[test]
fn test_suspicious_patterns_only_warn() {
    let verdict = SqlValidator::default()
        .validate("SELECT a FROM t WHERE ano = 2024 UNION SELECT b FROM u LIMIT 5");

    assert!(verdict.is_valid());
    assert!(verdict
        .warnings()
        .iter()
        .any(|w| w.starts_with("Padrões suspeitos detectados")));
}

#[test]
fn test_statement_chaining_is_blocked() {
    let verdict = SqlValidator::default().validate("SELECT * FROM t; DELETE FROM t");

    assert!(!verdict.is_valid());
    assert!(verdict.errors().iter().any(|e| e.contains("DELETE")));
    assert!(verdict.error_summary().unwrap_or_default().starts_with("Erros de validação"));
}

#[test]
fn test_plural_terminal_words_are_stripped_from_port_filters() {
    let verdict = SqlValidator::default().validate(
        "SELECT * FROM t WHERE LOWER(porto_atracacao) LIKE '%terminais de santos%' LIMIT 10",
    );

    assert!(verdict.is_valid());
    assert_eq!(
        verdict.sanitized_query().map(str::to_string),
        Some(format!(
            "SELECT * FROM t WHERE {ACCENT_FIELD} LIKE '%santos%' LIMIT 10"
        ))
    );

    let verdict = SqlValidator::default().validate(
        "SELECT * FROM t WHERE porto_atracacao LIKE '%Terminais Portuários do Rio de Janeiro%' LIMIT 10",
    );
    assert_eq!(
        verdict.sanitized_query().map(str::to_string),
        Some(format!(
            "SELECT * FROM t WHERE {ACCENT_FIELD} LIKE '%rio de janeiro%' LIMIT 10"
        ))
    );
}
