use chrono::{DateTime, FixedOffset};

/// A single changeset, as parsed from `hg log --style xml` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    /// The local, repository-specific revision number, as a string (it may
    /// be displayed, but should not be parsed as an integer across
    /// repositories).
    pub revision_id: String,
    /// The full 40-character hex node hash.
    pub hash: String,
    /// Commit date and time, as reported by the server.
    pub date: DateTime<FixedOffset>,
    /// The commit author's display name.
    pub author_name: String,
    /// The commit author's email address.
    pub author_email: String,
    /// The full commit message.
    pub message: String,
    /// The named branch this revision belongs to, if the server reported
    /// one (either via `<branch>` or an `<extra key="branch">` entry).
    pub branch: Option<String>,
}
