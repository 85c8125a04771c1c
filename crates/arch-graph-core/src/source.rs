//! Where a class came from: origin URI, source file name and content checksum.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::artifact::Origin;

/// Content checksum of a class artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Checksum {
    /// SHA-256 over the artifact bytes.
    Digest([u8; 32]),
    /// The artifact could not be read back.
    Undetermined,
    /// The origin has no location the bytes could be re-read from.
    NotSupported,
    /// Checksums are turned off in the import configuration.
    Disabled,
}

impl Checksum {
    /// Hashes the given bytes.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self::Digest(Sha256::digest(bytes).into())
    }

    /// Re-reads the bytes behind `origin` and hashes them.
    ///
    /// In-memory origins yield [`Checksum::NotSupported`]; read failures
    /// yield [`Checksum::Undetermined`].
    #[must_use]
    pub fn of_origin(origin: &Origin) -> Self {
        if matches!(origin, Origin::Memory(_)) {
            return Self::NotSupported;
        }
        match origin.read() {
            Ok(bytes) => Self::of_bytes(&bytes),
            Err(err) => {
                tracing::debug!("Cannot read {origin} for checksum: {err}");
                Self::Undetermined
            }
        }
    }

    /// Lowercase hex rendering of the digest, `None` for the other states.
    #[must_use]
    pub fn to_hex(&self) -> Option<String> {
        match self {
            Self::Digest(bytes) => Some(to_hex(bytes)),
            _ => None,
        }
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digest(bytes) => f.write_str(&to_hex(bytes)),
            Self::Undetermined => f.write_str("undetermined"),
            Self::NotSupported => f.write_str("not supported"),
            Self::Disabled => f.write_str("disabled"),
        }
    }
}

/// Renders bytes as lowercase hex, two digits per byte.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    use fmt::Write as _;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Provenance of an imported class.
///
/// Two sources are equal when URI and checksum are equal; the source file
/// name is informational.
#[derive(Debug, Clone)]
pub struct Source {
    uri: String,
    file_name: Option<String>,
    checksum: Checksum,
}

impl Source {
    /// Creates a source.
    #[must_use]
    pub fn new(uri: impl Into<String>, file_name: Option<String>, checksum: Checksum) -> Self {
        Self {
            uri: uri.into(),
            file_name,
            checksum,
        }
    }

    /// Creates a source for bytes already read from `origin`.
    #[must_use]
    pub fn from_bytes(
        origin: &Origin,
        bytes: &[u8],
        file_name: Option<String>,
        checksums: bool,
    ) -> Self {
        let checksum = if checksums {
            Checksum::of_bytes(bytes)
        } else {
            Checksum::Disabled
        };
        Self::new(origin.uri(), file_name, checksum)
    }

    /// Creates a source for `origin`, re-reading it for the checksum when enabled.
    #[must_use]
    pub fn for_origin(origin: &Origin, file_name: Option<String>, checksums: bool) -> Self {
        let checksum = if checksums {
            Checksum::of_origin(origin)
        } else {
            Checksum::Disabled
        };
        Self::new(origin.uri(), file_name, checksum)
    }

    /// Origin URI (`file:`, `jar:file:` or `memory:`).
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Name from the `SourceFile` attribute, e.g. `Foo.java`.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Content checksum.
    #[must_use]
    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri && self.checksum == other.checksum
    }
}

impl Eq for Source {}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [checksum='{}']", self.uri, self.checksum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn hex_is_two_lowercase_digits_per_byte() {
        assert_eq!(to_hex(&[0x80, 0x25]), "8025");
        assert_eq!(to_hex(&[0x0a, 0xff]), "0aff");
        assert_eq!(to_hex(&[]), "");
    }

    #[test]
    fn checksum_is_deterministic() {
        let a = Checksum::of_bytes(b"same bytes");
        let b = Checksum::of_bytes(b"same bytes");
        assert_eq!(a, b);
        assert_ne!(a, Checksum::of_bytes(b"other bytes"));
        assert_eq!(a.to_hex().map(|h| h.len()), Some(64));
    }

    #[test]
    fn unreadable_origin_is_undetermined() {
        let origin = Origin::File(PathBuf::from("/definitely/not/here/Missing.class"));
        assert_eq!(Checksum::of_origin(&origin), Checksum::Undetermined);
        assert_eq!(Checksum::Undetermined.to_hex(), None);
    }

    #[test]
    fn memory_origin_is_not_supported() {
        let origin = Origin::Memory("Foo".into());
        assert_eq!(Checksum::of_origin(&origin), Checksum::NotSupported);
    }

    #[test]
    fn equal_bytes_in_different_files_give_equal_checksums() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("A.class");
        let b = dir.path().join("B.class");
        std::fs::write(&a, b"\xca\xfe").unwrap();
        std::fs::write(&b, b"\xca\xfe").unwrap();

        let sa = Source::for_origin(&Origin::File(a), None, true);
        let sb = Source::for_origin(&Origin::File(b), None, true);
        assert_eq!(sa.checksum(), sb.checksum());
        assert_ne!(sa, sb);
    }

    #[test]
    fn disabled_checksum_skips_reading() {
        let origin = Origin::File(PathBuf::from("/definitely/not/here/Missing.class"));
        let source = Source::for_origin(&origin, Some("Missing.java".into()), false);
        assert_eq!(source.checksum(), &Checksum::Disabled);
        assert_eq!(source.file_name(), Some("Missing.java"));
    }

    #[test]
    fn display_includes_checksum() {
        let source = Source::new("memory:Foo", None, Checksum::Digest([0; 32]));
        insta::assert_snapshot!(
            source.to_string(),
            @"memory:Foo [checksum='0000000000000000000000000000000000000000000000000000000000000000']"
        );
    }
}
