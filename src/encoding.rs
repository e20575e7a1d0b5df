//! Resolution of the handshake's advertised encoding name to a concrete
//! text decoder.

use encoding_rs::Encoding;

use crate::error::HgError;

/// A resolved text encoding, paired with the name the server reported.
#[derive(Debug, Clone)]
pub struct TextEncoding {
    name: String,
    encoding: &'static Encoding,
}

impl TextEncoding {
    /// Resolves a handshake encoding name to a concrete decoder.
    ///
    /// Plain WHATWG labels (`utf-8`, `ascii`, ...) are looked up directly.
    /// Names of the form `cpNNN` (case-insensitive) are mapped to the
    /// corresponding Windows code page label when one exists.
    pub fn resolve(name: &str) -> Result<TextEncoding, HgError> {
        let encoding = Encoding::for_label(name.as_bytes())
            .or_else(|| codepage_label(name).and_then(|label| Encoding::for_label(label.as_bytes())))
            .ok_or_else(|| HgError::HandshakeError(format!("unknown encoding: {name}")))?;

        Ok(TextEncoding {
            name: name.to_string(),
            encoding,
        })
    }

    /// The encoding name as reported by the server.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decodes bytes using this encoding, replacing malformed sequences
    /// with the Unicode replacement character (matching the behavior of
    /// text-mode reads against a well-behaved Mercurial server).
    pub fn decode(&self, bytes: &[u8]) -> String {
        self.encoding.decode(bytes).0.into_owned()
    }

    /// Encodes a string using this encoding.
    pub fn encode(&self, s: &str) -> Vec<u8> {
        self.encoding.encode(s).0.into_owned()
    }
}

/// Maps an `hg`-style `cpNNN` codepage alias to a WHATWG encoding label,
/// where a corresponding one exists.
fn codepage_label(name: &str) -> Option<&'static str> {
    let digits = name.strip_prefix("cp").or_else(|| name.strip_prefix("CP"))?;
    let page: u32 = digits.parse().ok()?;

    Some(match page {
        437 | 850 => "ibm866", // closest widely available DOS-era label
        936 => "gbk",
        949 => "euc-kr",
        950 => "big5",
        1200 => "utf-16le",
        1250 => "windows-1250",
        1251 => "windows-1251",
        1252 => "windows-1252",
        1253 => "windows-1253",
        1254 => "windows-1254",
        1255 => "windows-1255",
        1256 => "windows-1256",
        1257 => "windows-1257",
        1258 => "windows-1258",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_plain_labels() {
        let enc = TextEncoding::resolve("UTF-8").unwrap();
        assert_eq!(enc.decode(b"hello"), "hello");
    }

    #[test]
    fn resolves_codepage_aliases() {
        let enc = TextEncoding::resolve("cp1252").unwrap();
        assert_eq!(enc.name(), "cp1252");
        assert_eq!(enc.decode(b"hello"), "hello");
    }

    #[test]
    fn rejects_unknown_names() {
        assert!(TextEncoding::resolve("not-a-real-encoding").is_err());
    }
}
