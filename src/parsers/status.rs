//! `hg status` output parsing.

use std::collections::HashMap;

use crate::types::FileStatus;

/// Parses `hg status` output into a map of path to [`FileStatus`].
///
/// Splits on `\n`; lines of length 2 or less are skipped (this also
/// discards the trailing empty line from a `\n`-terminated output). The
/// first character is the status code (unrecognized codes map to
/// [`FileStatus::Clean`]); the rest of the line, starting at byte 2, is the
/// path.
pub fn parse_status(output: &str) -> HashMap<String, FileStatus> {
    let mut map = HashMap::new();
    for line in output.split('\n') {
        if line.len() <= 2 {
            continue;
        }
        let code = line.as_bytes()[0] as char;
        let path = &line[2..];
        map.insert(path.to_string(), FileStatus::from_char(code));
    }
    map
}
