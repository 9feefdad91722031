use rust_decimal::Decimal;
use std::str::FromStr;

/// Decodes a Windows-1251 byte stream, the code page every supported CSV export uses.
pub fn decode_windows_1251(bytes: &[u8]) -> String {
    let (text, _) = encoding_rs::WINDOWS_1251.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// Parses `-1 234,56` style amounts: space or NBSP thousands, decimal comma,
/// optional leading sign.
pub fn parse_comma_decimal(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(cleaned).ok()
}

/// Parses `1.234,56` style amounts: dot thousands, decimal comma.
pub fn parse_dotted_decimal(s: &str) -> Option<Decimal> {
    parse_comma_decimal(&s.replace('.', ""))
}

pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}
