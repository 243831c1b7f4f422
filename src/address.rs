//! Destination Addressing
//!
//! Parsing and validation of the two halves of a probe target: the
//! dotted application-name signature (`app.aspect[.aspect...]`) and the
//! hexadecimal destination hash.

use std::fmt;
use thiserror::Error;

/// Length in bytes of a truncated destination hash (128 bits).
pub const TRUNCATED_HASH_LEN: usize = 16;

/// Separator between the application name and its aspects.
pub const NAME_SEPARATOR: char = '.';

/// Errors produced while parsing user-supplied addressing input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("destination name is empty")]
    EmptyName,

    #[error("destination name '{0}' must include at least one aspect (app.aspect)")]
    MissingAspects(String),

    #[error("destination name '{0}' has an empty application name")]
    EmptySegment(String),

    #[error(
        "Destination length is invalid, must be {} hexadecimal characters ({expected} bytes).",
        .expected * 2
    )]
    InvalidHashLength { expected: usize, got: usize },

    #[error("Invalid destination entered. Check your input.")]
    InvalidHashEncoding,
}

/// Application name plus ordered aspect list identifying a destination type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DestinationSignature {
    app_name: String,
    aspects: Vec<String>,
}

impl DestinationSignature {
    /// Parse a dotted full name such as `example.utilities.echo`.
    ///
    /// The first segment is the application name, the remaining segments are
    /// the aspects in left-to-right order. At least one aspect is required and
    /// the application name may not be empty. Aspects are kept verbatim, so
    /// `app..echo` and `app.` are valid names with empty aspects.
    pub fn parse(full_name: &str) -> Result<Self, AddressError> {
        if full_name.is_empty() {
            return Err(AddressError::EmptyName);
        }

        let mut segments = full_name.split(NAME_SEPARATOR);
        // split() always yields at least one item
        let app_name = segments.next().unwrap_or_default();
        let aspects: Vec<String> = segments.map(str::to_owned).collect();

        if aspects.is_empty() {
            return Err(AddressError::MissingAspects(full_name.to_owned()));
        }
        if app_name.is_empty() {
            return Err(AddressError::EmptySegment(full_name.to_owned()));
        }

        Ok(Self {
            app_name: app_name.to_owned(),
            aspects,
        })
    }

    /// Return the application name.
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Return the aspects in order.
    pub fn aspects(&self) -> &[String] {
        &self.aspects
    }

    /// Re-join into dotted notation.
    pub fn full_name(&self) -> String {
        let mut name = self.app_name.clone();
        for aspect in &self.aspects {
            name.push(NAME_SEPARATOR);
            name.push_str(aspect);
        }
        name
    }
}

impl fmt::Display for DestinationSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

/// Truncated hash identifying a destination on the mesh.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DestinationHash([u8; TRUNCATED_HASH_LEN]);

impl DestinationHash {
    /// Create a DestinationHash from a 16-byte array.
    pub fn from_bytes(bytes: [u8; TRUNCATED_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a hex string that must encode exactly `expected_len` bytes.
    ///
    /// The length is checked on characters before decoding, so a string of
    /// the wrong length is always reported as a length error.
    pub fn parse_with_len(hex_str: &str, expected_len: usize) -> Result<Vec<u8>, AddressError> {
        let got = hex_str.chars().count();
        if got != expected_len * 2 {
            return Err(AddressError::InvalidHashLength {
                expected: expected_len,
                got,
            });
        }
        hex::decode(hex_str).map_err(|_| AddressError::InvalidHashEncoding)
    }

    /// Parse a 32-character hex destination hash.
    pub fn parse(hex_str: &str) -> Result<Self, AddressError> {
        let bytes = Self::parse_with_len(hex_str, TRUNCATED_HASH_LEN)?;
        let mut hash = [0u8; TRUNCATED_HASH_LEN];
        hash.copy_from_slice(&bytes);
        Ok(Self(hash))
    }

    /// Return the raw bytes.
    pub fn as_bytes(&self) -> &[u8; TRUNCATED_HASH_LEN] {
        &self.0
    }

    /// Lowercase hex encoding without delimiters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for DestinationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DestinationHash({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for DestinationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.to_hex())
    }
}

impl AsRef<[u8]> for DestinationHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip() {
        for name in [
            "example.echo",
            "fips.utilities.probe",
            "app.a.b.c.d",
            "x.y",
        ] {
            let sig = DestinationSignature::parse(name).unwrap();
            assert_eq!(sig.full_name(), name);
            assert_eq!(sig.to_string(), name);
        }
    }

    #[test]
    fn test_signature_splits_app_and_aspects() {
        let sig = DestinationSignature::parse("fips.utilities.probe").unwrap();
        assert_eq!(sig.app_name(), "fips");
        assert_eq!(sig.aspects(), &["utilities".to_string(), "probe".to_string()]);
    }

    #[test]
    fn test_signature_rejects_malformed() {
        assert_eq!(DestinationSignature::parse(""), Err(AddressError::EmptyName));
        assert!(matches!(
            DestinationSignature::parse("standalone"),
            Err(AddressError::MissingAspects(_))
        ));
        assert!(matches!(
            DestinationSignature::parse(".echo"),
            Err(AddressError::EmptySegment(_))
        ));
        assert!(matches!(
            DestinationSignature::parse("..echo"),
            Err(AddressError::EmptySegment(_))
        ));
    }

    #[test]
    fn test_signature_keeps_empty_aspects() {
        let sig = DestinationSignature::parse("app..echo").unwrap();
        assert_eq!(sig.app_name(), "app");
        assert_eq!(sig.aspects(), &["".to_string(), "echo".to_string()]);
        assert_eq!(sig.full_name(), "app..echo");

        let sig = DestinationSignature::parse("app.").unwrap();
        assert_eq!(sig.aspects(), &["".to_string()]);
        assert_eq!(sig.full_name(), "app.");

        let sig = DestinationSignature::parse("app.echo.").unwrap();
        assert_eq!(sig.aspects(), &["echo".to_string(), "".to_string()]);
        assert_eq!(sig.to_string(), "app.echo.");
    }

    #[test]
    fn test_hash_rejects_wrong_length() {
        for input in ["", "abc", "00112233445566778899aabbccddeef", "00112233445566778899aabbccddeeff00"] {
            let result = DestinationHash::parse(input);
            assert_eq!(
                result,
                Err(AddressError::InvalidHashLength {
                    expected: 16,
                    got: input.len(),
                })
            );
        }
    }

    #[test]
    fn test_hash_length_counts_characters() {
        // 31 ASCII chars plus one two-byte char: correct length, bad content
        let input = "00112233445566778899aabbccddeefé";
        assert_eq!(input.chars().count(), 32);
        assert_eq!(
            DestinationHash::parse(input),
            Err(AddressError::InvalidHashEncoding)
        );
    }

    #[test]
    fn test_hash_rejects_non_hex() {
        for input in [
            "00112233445566778899aabbccddeegg",
            "zz112233445566778899aabbccddeeff",
            "0011223344556677 899aabbccddeeff",
        ] {
            assert_eq!(
                DestinationHash::parse(input),
                Err(AddressError::InvalidHashEncoding)
            );
        }
    }

    #[test]
    fn test_hash_hex_roundtrip_case_insensitive() {
        let upper = "00112233445566778899AABBCCDDEEFF";
        let hash = DestinationHash::parse(upper).unwrap();
        assert_eq!(hash.to_hex(), upper.to_lowercase());
        assert_eq!(hash.as_bytes()[15], 0xff);
    }

    #[test]
    fn test_hash_expected_len_parameter() {
        let bytes = DestinationHash::parse_with_len("abcd", 2).unwrap();
        assert_eq!(bytes, vec![0xab, 0xcd]);
        assert!(matches!(
            DestinationHash::parse_with_len("abc", 32),
            Err(AddressError::InvalidHashLength { expected: 32, got: 3 })
        ));
    }

    #[test]
    fn test_hash_display_pretty() {
        let hash = DestinationHash::from_bytes([0xab; 16]);
        assert_eq!(hash.to_string(), format!("<{}>", "ab".repeat(16)));
    }

    #[test]
    fn test_length_error_message() {
        let err = DestinationHash::parse("abc").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Destination length is invalid, must be 32 hexadecimal characters (16 bytes)."
        );
    }
}
