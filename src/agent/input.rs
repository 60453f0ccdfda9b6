//! Question sanitisation

/// Drop NUL bytes, cap the length in characters and trim
pub fn sanitize_question(text: &str, max_chars: usize) -> String {
    let cleaned: String = text.chars().filter(|c| *c != '\0').take(max_chars).collect();
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nul_bytes_removed_and_trimmed() {
        assert_eq!(sanitize_question("  quantas\0 toneladas?\n", 100), "quantas toneladas?");
    }

    #[test]
    fn test_length_capped_on_char_boundary() {
        assert_eq!(sanitize_question("Paranaguá", 9), "Paranaguá");
        assert_eq!(sanitize_question("Paranaguá", 8), "Paranagu");
    }

    #[test]
    fn test_blank_input() {
        assert_eq!(sanitize_question(" \0 ", 10), "");
    }
}
