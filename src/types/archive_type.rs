/// Archive format accepted by the `archive` command's `--type` flag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum ArchiveType {
    /// Let the server infer the type from the destination filename.
    #[default]
    Default,
    /// A plain directory of files.
    Directory,
    /// An uncompressed tar archive.
    Tar,
    /// A bzip2-compressed tar archive.
    TarBzip2,
    /// A gzip-compressed tar archive.
    TarGzip,
    /// An uncompressed zip archive.
    UncompressedZip,
    /// A deflate-compressed zip archive.
    Zip,
}

impl ArchiveType {
    /// The value to pass to `--type`, or `None` when the server should infer
    /// the type from the destination's extension.
    pub fn as_arg(self) -> Option<&'static str> {
        match self {
            ArchiveType::Default => None,
            ArchiveType::Directory => Some("files"),
            ArchiveType::Tar => Some("tar"),
            ArchiveType::TarBzip2 => Some("tbz2"),
            ArchiveType::TarGzip => Some("tgz"),
            ArchiveType::UncompressedZip => Some("uzip"),
            ArchiveType::Zip => Some("zip"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_infers_type_from_destination() {
        assert_eq!(ArchiveType::Default.as_arg(), None);
    }

    #[test]
    fn maps_to_expected_cli_strings() {
        assert_eq!(ArchiveType::Tar.as_arg(), Some("tar"));
        assert_eq!(ArchiveType::TarBzip2.as_arg(), Some("tbz2"));
        assert_eq!(ArchiveType::Zip.as_arg(), Some("zip"));
    }
}
