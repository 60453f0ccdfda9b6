//! Text rendering of query results and SQL for prompts and terminals

use crate::agent::Row;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Rows considered at all when rendering for the answer model
pub const MAX_RESULT_ROWS: usize = 100;
/// Rows actually printed in the table
pub const MAX_DISPLAY_ROWS: usize = 20;
pub const MAX_CELL_CHARS: usize = 50;
const MAX_RULE_WIDTH: usize = 100;

/// Raw commodity code column of the cargo view
pub const COMMODITY_CODE_COLUMN: &str = "cdmercadoria";
/// Column added by [`enrich_commodity_names`]
pub const COMMODITY_NAME_COLUMN: &str = "mercadoria_nome";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static CLAUSE_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:SELECT|FROM|WHERE|GROUP\s+BY|ORDER\s+BY|HAVING|LIMIT)\b")
        .expect("valid regex")
});

/// Render rows as a pipe-separated table
///
/// Column order follows the first row. At most [`MAX_DISPLAY_ROWS`] rows are
/// printed and every cell is cut to [`MAX_CELL_CHARS`] characters. When rows
/// carry [`COMMODITY_NAME_COLUMN`], the raw code column is not printed.
pub fn format_results_for_llm(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return "Nenhum resultado encontrado.".to_string();
    };

    let total = rows.len();
    let header = if total > MAX_RESULT_ROWS {
        format!("Primeiros {} de {} resultados:", MAX_RESULT_ROWS, total)
    } else {
        format!("{} resultados:", total)
    };

    let has_names = first.contains_key(COMMODITY_NAME_COLUMN);
    let columns: Vec<&str> = first
        .keys()
        .map(String::as_str)
        .filter(|column| !(has_names && *column == COMMODITY_CODE_COLUMN))
        .collect();
    let column_line = columns.join(" | ");
    let rule = "-".repeat(column_line.chars().count().min(MAX_RULE_WIDTH));

    let mut lines = vec![header, column_line, rule];

    for row in rows.iter().take(MAX_DISPLAY_ROWS) {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| render_cell(row.get(*column)))
            .collect();
        lines.push(cells.join(" | "));
    }

    if total > MAX_DISPLAY_ROWS {
        lines.push(format!("... e mais {} linhas", total - MAX_DISPLAY_ROWS));
    }

    lines.join("\n")
}

fn render_cell(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => return String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    text.chars().take(MAX_CELL_CHARS).collect()
}

/// Distinct non-empty commodity codes present in the rows, sorted
pub fn collect_commodity_codes(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| commodity_code(row.get(COMMODITY_CODE_COLUMN)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Copy of the rows with `mercadoria_nome` set to `"<name> (<code>)"`, or to
/// the bare code when no name is known. Rows without a code are unchanged.
pub fn enrich_commodity_names(rows: &[Row], names: &HashMap<String, String>) -> Vec<Row> {
    rows.iter()
        .map(|row| {
            let mut enriched = row.clone();
            if let Some(code) = commodity_code(row.get(COMMODITY_CODE_COLUMN)) {
                let label = match names.get(&code) {
                    Some(name) if *name != code => format!("{} ({})", name, code),
                    _ => code,
                };
                enriched.insert(COMMODITY_NAME_COLUMN.to_string(), Value::String(label));
            }
            enriched
        })
        .collect()
}

fn commodity_code(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Collapse whitespace and break lines before the main clauses
pub fn format_sql_query(sql: &str) -> String {
    let collapsed = WHITESPACE.replace_all(sql.trim(), " ");
    let broken = CLAUSE_KEYWORDS.replace_all(&collapsed, "\n$0");
    broken
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
