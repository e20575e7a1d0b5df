//! Parsers for the heterogeneous text formats `hg` prints on its output
//! channel: XML changeset logs, `key: value`/`key=value` tables, `hg
//! status`/`hg resolve --list` lines, and the `hg version` banner.

pub mod kv;
pub mod resolve;
pub mod status;
pub mod version;
pub mod xml;

pub use kv::parse_kv;
pub use resolve::parse_resolve;
pub use status::parse_status;
pub use version::parse_version;
pub use xml::parse_log;
