//! `hg log/heads/parents/incoming/outgoing --style xml` parsing.

use chrono::DateTime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::HgError;
use crate::types::Revision;

/// Which child element of `<logentry>` is currently accumulating text.
#[derive(PartialEq, Eq)]
enum Field {
    None,
    Author,
    Date,
    Msg,
    Branch,
    Extra,
}

/// Finds the first `<?xml` declaration in `output` and parses everything
/// from there as a `<log>` document, building one [`Revision`] per
/// `<logentry>` in document order.
pub fn parse_log(output: &str) -> Result<Vec<Revision>, HgError> {
    let start = output
        .find("<?xml")
        .ok_or_else(|| HgError::ParseError("no <?xml declaration found in output".to_string()))?;
    let xml = &output[start..];

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text = true;

    let mut revisions = Vec::new();
    let mut buf = Vec::new();

    let mut in_entry = false;
    let mut revision_id = String::new();
    let mut hash = String::new();
    let mut date_text = String::new();
    let mut author_name = String::new();
    let mut author_email = String::new();
    let mut message = String::new();
    let mut branch: Option<String> = None;
    let mut extra_branch: Option<String> = None;
    let mut extra_key: Option<String> = None;
    let mut field = Field::None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| HgError::ParseError(format!("malformed log xml: {e}")))?;

        match event {
            Event::Eof => break,
            Event::Start(e) => match local_name(&e).as_str() {
                "logentry" => {
                    in_entry = true;
                    revision_id = attr(&e, "revision").unwrap_or_default();
                    hash = attr(&e, "node").unwrap_or_default();
                    date_text.clear();
                    author_name.clear();
                    author_email.clear();
                    message.clear();
                    branch = None;
                    extra_branch = None;
                    extra_key = None;
                }
                "author" if in_entry => {
                    author_email = attr(&e, "email").unwrap_or_default();
                    field = Field::Author;
                }
                "date" if in_entry => field = Field::Date,
                "msg" if in_entry => field = Field::Msg,
                "branch" if in_entry => field = Field::Branch,
                "extra" if in_entry => {
                    extra_key = attr(&e, "key");
                    field = Field::Extra;
                }
                _ => {}
            },
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| HgError::ParseError(format!("malformed log xml: {e}")))?
                    .into_owned();
                append_to_field(
                    &field,
                    &text,
                    &mut author_name,
                    &mut date_text,
                    &mut message,
                    &mut branch,
                    &extra_key,
                    &mut extra_branch,
                );
            }
            Event::CData(t) => {
                let text = String::from_utf8_lossy(t.as_ref()).into_owned();
                append_to_field(
                    &field,
                    &text,
                    &mut author_name,
                    &mut date_text,
                    &mut message,
                    &mut branch,
                    &extra_key,
                    &mut extra_branch,
                );
            }
            Event::End(e) => match local_name_close(&e).as_str() {
                "author" | "date" | "msg" | "branch" | "extra" => field = Field::None,
                "logentry" => {
                    in_entry = false;
                    let date = DateTime::parse_from_rfc3339(date_text.trim()).map_err(|e| {
                        HgError::ParseError(format!("invalid logentry date {date_text:?}: {e}"))
                    })?;
                    revisions.push(Revision {
                        revision_id: std::mem::take(&mut revision_id),
                        hash: std::mem::take(&mut hash),
                        date,
                        author_name: author_name.trim().to_string(),
                        author_email: std::mem::take(&mut author_email),
                        message: std::mem::take(&mut message),
                        branch: branch.take().or_else(|| extra_branch.take()),
                    });
                }
                _ => {}
            },
            _ => {}
        }

        buf.clear();
    }

    Ok(revisions)
}

#[allow(clippy::too_many_arguments)]
fn append_to_field(
    field: &Field,
    text: &str,
    author_name: &mut String,
    date_text: &mut String,
    message: &mut String,
    branch: &mut Option<String>,
    extra_key: &Option<String>,
    extra_branch: &mut Option<String>,
) {
    match field {
        Field::Author => author_name.push_str(text),
        Field::Date => date_text.push_str(text),
        Field::Msg => message.push_str(text),
        Field::Branch => push_optional(branch, text),
        Field::Extra => {
            if extra_key
                .as_deref()
                .is_some_and(|k| k.eq_ignore_ascii_case("branch"))
            {
                push_optional(extra_branch, text);
            }
        }
        Field::None => {}
    }
}

fn push_optional(slot: &mut Option<String>, text: &str) {
    match slot {
        Some(existing) => existing.push_str(text),
        None => *slot = Some(text.to_string()),
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn local_name_close(e: &quick_xml::events::BytesEnd<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attr(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes().filter_map(|a| a.ok()).find_map(|a| {
        if a.key.local_name().as_ref() == name.as_bytes() {
            a.unescape_value().ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0"?><log><logentry revision="3" node="abc1234567890abcdef1234567890abcdef1234"><author email="x@y">Name</author><date>2023-01-02T03:04:05+00:00</date><msg>m</msg><branch>default</branch></logentry></log>"#;

    #[test]
    fn parses_the_spec_example() {
        let revisions = parse_log(SAMPLE).unwrap();
        assert_eq!(revisions.len(), 1);

        let rev = &revisions[0];
        assert_eq!(rev.revision_id, "3");
        assert_eq!(rev.hash, "abc1234567890abcdef1234567890abcdef1234");
        assert_eq!(rev.author_name, "Name");
        assert_eq!(rev.author_email, "x@y");
        assert_eq!(rev.message, "m");
        assert_eq!(rev.branch.as_deref(), Some("default"));
    }

    #[test]
    fn falls_back_to_extra_branch_case_insensitively() {
        let xml = r#"<?xml version="1.0"?><log><logentry revision="0" node="abc"><author email="a@b">A</author><date>2023-01-02T03:04:05+00:00</date><msg>m</msg><extra key="Branch">feature</extra></logentry></log>"#;
        let revisions = parse_log(xml).unwrap();
        assert_eq!(revisions[0].branch.as_deref(), Some("feature"));
    }

    #[test]
    fn missing_branch_and_extra_yields_none() {
        let xml = r#"<?xml version="1.0"?><log><logentry revision="0" node="abc"><author email="a@b">A</author><date>2023-01-02T03:04:05+00:00</date><msg>m</msg></logentry></log>"#;
        let revisions = parse_log(xml).unwrap();
        assert_eq!(revisions[0].branch, None);
    }

    #[test]
    fn multiple_logentries_are_returned_in_document_order() {
        let xml = format!(
            "<?xml version=\"1.0\"?><log>{}{}{}</log>",
            entry(1),
            entry(2),
            entry(3)
        );
        let revisions = parse_log(&xml).unwrap();
        assert_eq!(
            revisions.iter().map(|r| r.revision_id.as_str()).collect::<Vec<_>>(),
            vec!["1", "2", "3"]
        );
    }

    fn entry(revision: u32) -> String {
        format!(
            r#"<logentry revision="{revision}" node="hash{revision}"><author email="a@b">A</author><date>2023-01-0{revision}T03:04:05+00:00</date><msg>m{revision}</msg></logentry>"#
        )
    }

    #[test]
    fn missing_xml_declaration_is_a_parse_error() {
        let err = parse_log("not xml at all").unwrap_err();
        assert!(matches!(err, HgError::ParseError(_)));
    }
}
