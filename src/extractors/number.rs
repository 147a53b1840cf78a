// src/extractors/number.rs
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::utils::error::ExtractError;

static DIGIT_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+").expect("Failed to compile DIGIT_RUN_RE"));

/// Locale settings shared by every numeric field.
#[derive(Debug, Clone)]
pub struct NumberFormat {
    pub thousands_separator: String,
    /// Lowercased textual numerals, e.g. "null" -> 0, "zwei" -> 2.
    pub numerals: HashMap<String, i64>,
    /// Marker for "no data yet" cells.
    pub none_pattern: Regex,
}

impl NumberFormat {
    pub fn parse(&self, text: &str) -> Result<i64, ExtractError> {
        parse_number(text, &self.numerals, &self.thousands_separator)
    }

    pub fn parse_or_none(&self, text: &str) -> Result<Option<i64>, ExtractError> {
        parse_number_or_none(text, &self.none_pattern, &self.numerals, &self.thousands_separator)
    }
}

/// Parses the first digit run of `text` after removing thousands separators,
/// falling back to the numeral map for spelled-out numbers.
pub fn parse_number(
    text: &str,
    numerals: &HashMap<String, i64>,
    thousands_separator: &str,
) -> Result<i64, ExtractError> {
    let mut cleaned = text.trim().to_string();
    if !thousands_separator.is_empty() {
        cleaned = cleaned.replace(thousands_separator, "");
    }

    if let Some(m) = DIGIT_RUN_RE.find(&cleaned) {
        return m
            .as_str()
            .parse::<i64>()
            .map_err(|_| ExtractError::NumberParse(text.to_string()));
    }

    numerals
        .get(&text.to_lowercase())
        .copied()
        .ok_or_else(|| ExtractError::NumberParse(text.to_string()))
}

/// Like [`parse_number`], but returns `None` for text matching `none_pattern`.
pub fn parse_number_or_none(
    text: &str,
    none_pattern: &Regex,
    numerals: &HashMap<String, i64>,
    thousands_separator: &str,
) -> Result<Option<i64>, ExtractError> {
    if none_pattern.is_match(text) {
        return Ok(None);
    }
    parse_number(text, numerals, thousands_separator).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numerals() -> HashMap<String, i64> {
        [("null", 0), ("eins", 1), ("zwei", 2)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_digit_run_ignores_surrounding_text() {
        let map = numerals();
        assert_eq!(parse_number("1.234", &map, ".").unwrap(), 1234);
        assert_eq!(parse_number(" 12.089 Fälle", &map, ".").unwrap(), 12089);
        assert_eq!(parse_number("ca. 17 (+3)", &map, ".").unwrap(), 17);
        assert_eq!(parse_number("1,234", &map, ",").unwrap(), 1234);
    }

    #[test]
    fn test_numeral_fallback() {
        let map = numerals();
        assert_eq!(parse_number("Zwei", &map, ".").unwrap(), 2);
        assert_eq!(parse_number("null", &map, ".").unwrap(), 0);
    }

    #[test]
    fn test_unparsable_number() {
        let err = parse_number("keine Angabe", &numerals(), ".").unwrap_err();
        assert!(matches!(err, ExtractError::NumberParse(ref s) if s == "keine Angabe"));
    }

    #[test]
    fn test_none_marker_skips_numeric_path() {
        let none = Regex::new(r"^\s*(-|k\. ?A\.)\s*$").unwrap();
        // An empty numeral map would make "-" fail, so a None proves the map was never consulted
        let empty = HashMap::new();
        assert_eq!(parse_number_or_none("-", &none, &empty, ".").unwrap(), None);
        assert_eq!(parse_number_or_none("k. A.", &none, &empty, ".").unwrap(), None);
        assert_eq!(parse_number_or_none("3.001", &none, &empty, ".").unwrap(), Some(3001));
    }

    #[test]
    fn test_number_format_wrapper() {
        let format = NumberFormat {
            thousands_separator: ".".to_string(),
            numerals: numerals(),
            none_pattern: Regex::new(r"^-$").unwrap(),
        };
        assert_eq!(format.parse("eins").unwrap(), 1);
        assert_eq!(format.parse_or_none("-").unwrap(), None);
    }
}
