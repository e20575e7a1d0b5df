//! `hg version` banner parsing and normalization.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::HgError;

static VERSION_RE: OnceLock<Regex> = OnceLock::new();

fn version_re() -> &'static Regex {
    VERSION_RE.get_or_init(|| {
        Regex::new(
            r"^[^)]+\([^\d]+(?P<major>\d)\.(?P<minor>\d)(?:\.(?P<trivial>\d)|(?P<additional>.*))\)",
        )
        .expect("version regex is a compile-time constant")
    })
}

/// Parses the first line of `hg version` output (e.g. `Mercurial Distributed
/// SCM (version 5.7.1)`) and normalizes it to `{major}.{minor}.{trivial}{additional}`
/// when a trivial segment was present, or `{major}.{minor}0{additional}`
/// (trivial collapsed into the minor segment, no separating dot) when it
/// was not.
pub fn parse_version(output: &str) -> Result<String, HgError> {
    let banner = output.trim();
    let caps = version_re()
        .captures(banner)
        .ok_or_else(|| HgError::ParseError(format!("unparseable version banner: {banner:?}")))?;

    let major = &caps["major"];
    let minor = &caps["minor"];
    let trivial = match caps.name("trivial") {
        Some(m) => format!(".{}", m.as_str()),
        None => "0".to_string(),
    };
    let additional = caps.name("additional").map(|m| m.as_str()).unwrap_or("");

    Ok(format!("{major}.{minor}{trivial}{additional}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalizes_a_full_trivial_version() {
        let version = parse_version("Mercurial Distributed SCM (version 5.7.1)").unwrap();
        assert_eq!(version, "5.7.1");
    }

    #[test]
    fn defaults_a_missing_trivial_segment_to_zero() {
        let version = parse_version("Mercurial Distributed SCM (version 5.7)").unwrap();
        assert_eq!(version, "5.70");
    }

    #[test]
    fn unparseable_banner_is_a_parse_error() {
        let err = parse_version("not a version string at all").unwrap_err();
        assert!(matches!(err, HgError::ParseError(_)));
    }
}
