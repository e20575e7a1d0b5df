/// A single file's status as reported by `hg status`.
///
/// `Default` and `All` are not real status codes; they only exist as filter
/// inputs to [`crate::commands::StatusOptions`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FileStatus {
    /// `M` — modified.
    Modified,
    /// `A` — added.
    Added,
    /// `R` — removed.
    Removed,
    /// `C` — clean (tracked, unchanged).
    Clean,
    /// `!` — missing (tracked but deleted from disk).
    Missing,
    /// `?` — not tracked.
    Unknown,
    /// `I` — ignored.
    Ignored,
    /// ` ` — origin of a copy/rename, printed under `-C`.
    Origin,
    /// `U` — unresolved merge conflict.
    Conflicted,
    /// Not a real status; requests the server's default status set.
    Default,
    /// Not a real status; requests every status.
    All,
}

impl FileStatus {
    /// Maps the leading character of an `hg status` line to a [`FileStatus`].
    /// Unrecognized characters are treated as [`FileStatus::Clean`], since
    /// that is the only status `hg status` does not print a line for.
    pub fn from_char(c: char) -> FileStatus {
        match c {
            'M' => FileStatus::Modified,
            'A' => FileStatus::Added,
            'R' => FileStatus::Removed,
            'C' => FileStatus::Clean,
            '!' => FileStatus::Missing,
            '?' => FileStatus::Unknown,
            'I' => FileStatus::Ignored,
            ' ' => FileStatus::Origin,
            'U' => FileStatus::Conflicted,
            _ => FileStatus::Clean,
        }
    }

    /// The argument flag this status maps to, for building `hg status` argv.
    pub fn flag(self) -> Option<&'static str> {
        match self {
            FileStatus::Modified => Some("--modified"),
            FileStatus::Added => Some("--added"),
            FileStatus::Removed => Some("--removed"),
            FileStatus::Clean => Some("--clean"),
            FileStatus::Missing => Some("--deleted"),
            FileStatus::Unknown => Some("--unknown"),
            FileStatus::Ignored => Some("--ignored"),
            FileStatus::Conflicted => Some("--unresolved"),
            FileStatus::Origin | FileStatus::Default | FileStatus::All => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_real_status_character_to_a_distinct_variant() {
        let pairs = [
            ('M', FileStatus::Modified),
            ('A', FileStatus::Added),
            ('R', FileStatus::Removed),
            ('C', FileStatus::Clean),
            ('!', FileStatus::Missing),
            ('?', FileStatus::Unknown),
            ('I', FileStatus::Ignored),
            (' ', FileStatus::Origin),
            ('U', FileStatus::Conflicted),
        ];
        for (c, expected) in pairs {
            assert_eq!(FileStatus::from_char(c), expected);
        }
    }

    #[test]
    fn unrecognized_character_is_clean() {
        assert_eq!(FileStatus::from_char('x'), FileStatus::Clean);
    }
}
