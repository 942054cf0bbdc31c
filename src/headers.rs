// Raw header block helpers
// Headers travel as newline-joined `name: value` lines. Appending never
// de-duplicates; repeated names stay repeated until the transport sees them.

use crate::parameters::coercion::to_text;
use crate::parameters::report::ValueMap;

/// Splits a header block into ordered `(name, value)` pairs. Lines without a
/// colon are skipped.
pub fn parse_headers(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

/// Joins pairs back into a header block.
pub fn stringify_headers(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Appends one header line.
pub fn append_header(headers: &str, name: &str, value: &str) -> String {
    let line = format!("{}: {}", name, value);
    if headers.trim().is_empty() {
        line
    } else {
        format!("{}\n{}", headers.trim_end_matches('\n'), line)
    }
}

/// Adds a cookie to the `cookie` header, creating it when missing.
pub fn append_cookie(headers: &str, name: &str, value: &str) -> String {
    let mut pairs = parse_headers(headers);
    let cookie = format!("{}={}", name, value);
    match pairs.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case("cookie")) {
        Some((_, existing)) if !existing.is_empty() => {
            existing.push_str("; ");
            existing.push_str(&cookie);
        }
        Some((_, existing)) => *existing = cookie,
        None => pairs.push(("cookie".to_string(), cookie)),
    }
    stringify_headers(&pairs)
}

/// Header block for the report's `header` map; list values are comma-joined.
pub fn headers_from_map(headers: &str, map: &ValueMap) -> String {
    map.iter()
        .fold(headers.to_string(), |acc, (name, value)| append_header(&acc, name, &to_text(value)))
}

/// Merges the report's `cookie` map into the header block.
pub fn cookies_from_map(headers: &str, map: &ValueMap) -> String {
    map.iter()
        .fold(headers.to_string(), |acc, (name, value)| append_cookie(&acc, name, &to_text(value)))
}

/// First value of header `name`, compared case-insensitively.
pub fn header_value(headers: &str, name: &str) -> Option<String> {
    parse_headers(headers)
        .into_iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}
