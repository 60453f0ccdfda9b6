//! Rewrite passes that repair common LLM phrasing mistakes against the cargo view
//!
//! Every pass is a pure `&str -> String` function and idempotent on its own
//! output. The three passes touching `porto_atracacao` must run in the order
//! listed in [`PASSES`]: the Paraná expansion has to see the original phrase,
//! and the accent-insensitive rewrite has to be last because its output no
//! longer matches the `<column> LIKE '<value>'` shape the others look for.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonical column holding the cargo nature
pub const CARGO_NATURE_COLUMN: &str = "natureza_carga";

/// Ports that make up the "Portos do Paraná" administration
pub const PARANA_PORTS: [&str; 2] = ["paranagua", "antonina"];

pub type NormalizationPass = fn(&str) -> String;

/// Fixed pass order
pub const PASSES: [(&str, NormalizationPass); 5] = [
    ("cargo_nature_alias", normalize_cargo_nature_alias),
    ("parana_ports", expand_parana_ports),
    ("porto_prefix", collapse_porto_prefix),
    ("terminal_words", strip_terminal_words),
    ("accent_insensitive_port", accent_insensitive_port_like),
];

static CARGO_NATURE_ALIAS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:tipo_carga|tipo_de_carga|tipo_da_carga)\b").expect("valid regex")
});

/// `porto_atracacao LIKE '...'`, optionally wrapped in `LOWER(...)` and
/// optionally table-qualified
static PORT_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:LOWER\(\s*(?P<wrapped>[\w.]*porto_atracacao)\s*\)|(?P<bare>[\w.]*porto_atracacao))\s+LIKE\s+'(?P<value>[^']*)'",
    )
    .expect("valid regex")
});

static PARANA_PHRASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bportos?\s+do\s+parana\b").expect("valid regex"));

static PORTO_PREFIX_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?P<head>LIKE\s+')%?porto\s+(?:de|da|do)\s+(?P<name>[^%']+?)%?'")
        .expect("valid regex")
});

static LEADING_PORTO_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^porto\s+(?:de|da|do)\s+").expect("valid regex"));

static TERMINAL_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:termina(?:l(?:es)?|is)|portos?|portuári[oa]s?)\b").expect("valid regex")
});

static LEADING_CONNECTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:de|da|do|dos|das)\s+").expect("valid regex"));

static TRAILING_CONNECTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:de|da|do|dos|das)$").expect("valid regex"));

static LONE_CONNECTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:de|da|do|dos|das)$").expect("valid regex"));

/// Run every pass in order over the trimmed query
pub fn normalize(query: &str) -> String {
    let mut current = query.trim().to_string();
    for (name, pass) in PASSES {
        let next = pass(&current);
        if next != current {
            debug!(pass = name, "normalization pass rewrote query");
            current = next;
        }
    }
    current
}

/// `tipo_carga`, `tipo_de_carga` and `tipo_da_carga` become `natureza_carga`
pub fn normalize_cargo_nature_alias(query: &str) -> String {
    CARGO_NATURE_ALIAS
        .replace_all(query, CARGO_NATURE_COLUMN)
        .into_owned()
}

/// A port filter naming "portos do Paraná" becomes an OR over the real ports
pub fn expand_parana_ports(query: &str) -> String {
    PORT_LIKE
        .replace_all(query, |caps: &Captures| {
            let value = caps["value"].to_lowercase().replace(['á', 'ã'], "a");
            if !PARANA_PHRASE.is_match(&value) {
                return caps[0].to_string();
            }
            let field = lowered_field(caps);
            let predicates: Vec<String> = PARANA_PORTS
                .iter()
                .map(|port| format!("{} LIKE '%{}%'", field, port))
                .collect();
            format!("({})", predicates.join(" OR "))
        })
        .into_owned()
}

/// `LIKE '%porto de itaqui%'` becomes `LIKE '%itaqui%'` on any column
pub fn collapse_porto_prefix(query: &str) -> String {
    PORTO_PREFIX_LIKE
        .replace_all(query, |caps: &Captures| {
            let mut name = caps["name"].trim().to_string();
            while LEADING_PORTO_PREFIX.is_match(&name) {
                name = LEADING_PORTO_PREFIX.replace(&name, "").trim().to_string();
            }
            if name.is_empty() {
                return caps[0].to_string();
            }
            format!("{}%{}%'", &caps["head"], name)
        })
        .into_owned()
}

/// Generic words such as "terminais" or "porto" are dropped from port
/// filters, leaving a substring match on the place name
pub fn strip_terminal_words(query: &str) -> String {
    PORT_LIKE
        .replace_all(query, |caps: &Captures| {
            let cleaned = clean_port_phrase(&caps["value"]);
            if cleaned.is_empty() {
                return caps[0].to_string();
            }
            format!("{} LIKE '%{}%'", field_expr(caps), cleaned)
        })
        .into_owned()
}

fn clean_port_phrase(raw: &str) -> String {
    let without_words = TERMINAL_WORDS.replace_all(raw, " ");
    let collapsed = without_words.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut phrase = collapsed.trim_matches('%').trim().to_string();

    loop {
        let stripped = LEADING_CONNECTOR.replace(&phrase, "");
        let stripped = TRAILING_CONNECTOR.replace(&stripped, "");
        let stripped = stripped.trim_matches('%').trim().to_string();
        if stripped == phrase {
            break;
        }
        phrase = stripped;
    }

    if LONE_CONNECTOR.is_match(&phrase) {
        return String::new();
    }
    phrase
}

/// Remaining port filters compare accent-stripped, lower-cased text on both sides
pub fn accent_insensitive_port_like(query: &str) -> String {
    PORT_LIKE
        .replace_all(query, |caps: &Captures| {
            let column = column_name(caps);
            let value = strip_accents(&caps["value"]).to_lowercase();
            format!(
                "REGEXP_REPLACE(NORMALIZE(LOWER({}), NFD), r'\\pM', '') LIKE '{}'",
                column, value
            )
        })
        .into_owned()
}

/// NFD-decompose and drop combining marks
pub fn strip_accents(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

fn column_name<'c>(caps: &'c Captures<'_>) -> &'c str {
    caps.name("wrapped")
        .or_else(|| caps.name("bare"))
        .map(|m| m.as_str())
        .unwrap_or("porto_atracacao")
}

fn field_expr(caps: &Captures<'_>) -> String {
    match caps.name("wrapped") {
        Some(column) => format!("LOWER({})", column.as_str()),
        None => column_name(caps).to_string(),
    }
}

fn lowered_field(caps: &Captures<'_>) -> String {
    format!("LOWER({})", column_name(caps))
}
