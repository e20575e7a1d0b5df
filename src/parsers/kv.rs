//! Delimited `key: value` / `key=value` parsing, shared by the handshake,
//! `showconfig`, and `paths`.

use std::collections::HashMap;

/// Splits `input` into lines and, for each non-empty line, splits on the
/// first occurrence of any delimiter in `delimiters` (tried in order, the
/// earliest match in the line wins). Lines with no matching delimiter are
/// skipped.
pub fn parse_kv(input: &str, delimiters: &[&str]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in input.split('\n') {
        if line.is_empty() {
            continue;
        }
        if let Some((key, value)) = split_on_first_delimiter(line, delimiters) {
            map.insert(key.to_string(), value.to_string());
        }
    }
    map
}

fn split_on_first_delimiter<'a>(line: &'a str, delimiters: &[&str]) -> Option<(&'a str, &'a str)> {
    delimiters
        .iter()
        .filter_map(|delim| line.find(delim).map(|idx| (idx, delim.len())))
        .min_by_key(|(idx, _)| *idx)
        .map(|(idx, len)| (&line[..idx], &line[idx + len..]))
}
