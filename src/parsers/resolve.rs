//! `hg resolve --list` output parsing.

use std::collections::HashMap;

/// Parses `hg resolve --list` output into a map of path to resolved state.
/// Each line's first character is `R` (resolved) or `U` (unresolved); the
/// rest of the line, starting at byte 2 and trimmed, is the path.
pub fn parse_resolve(output: &str) -> HashMap<String, bool> {
    let mut map = HashMap::new();
    for line in output.split('\n') {
        if line.len() <= 2 {
            continue;
        }
        let resolved = line.as_bytes()[0] == b'R';
        let path = line[2..].trim().to_string();
        map.insert(path, resolved);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_resolved_and_unresolved_lines() {
        let map = parse_resolve("R file1.txt\nU file2.txt\n");
        assert_eq!(map["file1.txt"], true);
        assert_eq!(map["file2.txt"], false);
    }

    #[test]
    fn trims_trailing_whitespace_from_path() {
        let map = parse_resolve("R file1.txt \n");
        assert!(map.contains_key("file1.txt"));
    }
}
