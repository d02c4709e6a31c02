//! Register keys and their two presentations.
//!
//! The *mangled* form is the raw `(owner, key)` byte pair the execution engine works with. The
//! *readable* form is what rdb writes to disk and shows to operators: the owner as `0x`-prefixed
//! hex, and the key verbatim, except for slab keys whose raw identifier is hex-encoded after the
//! leading `$`.

use std::fmt;

use crate::error::FormatError;

/// Raw register content. Absence is modelled as `Option<RegisterValue>::None`.
pub type RegisterValue = Vec<u8>;

/// First byte of every slab key.
pub const SLAB_PREFIX: u8 = b'$';

/// A register address in its mangled (raw byte) form.
///
/// Equality, ordering and hashing are defined over the raw bytes only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegisterKey {
    pub owner: Vec<u8>,
    pub key: Vec<u8>,
}

impl RegisterKey {
    pub fn new(owner: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        Self { owner: owner.into(), key: key.into() }
    }

    /// Decode a key whose owner and key bytes are both given as hex.
    pub fn from_hex(owner: &str, key: &str) -> Result<Self, FormatError> {
        Ok(Self { owner: decode_hex("register owner", owner)?, key: decode_hex("register key", key)? })
    }

    /// Whether the key addresses a slab, i.e. starts with `$`.
    pub fn is_slab(&self) -> bool {
        self.key.first() == Some(&SLAB_PREFIX)
    }

    /// The owner as `0x`-prefixed hex.
    pub fn owner_hex(&self) -> String {
        hex::encode_prefixed(&self.owner)
    }

    /// Whether [`Self::to_readable`] can be reversed exactly.
    ///
    /// Slab keys always can. Any other key is shown verbatim, so it must be valid UTF-8.
    pub fn has_exact_readable(&self) -> bool {
        self.is_slab() || std::str::from_utf8(&self.key).is_ok()
    }

    pub fn to_readable(&self) -> ReadableKey {
        let key = if self.is_slab() {
            format!("${}", hex::encode(&self.key[1..]))
        } else {
            String::from_utf8_lossy(&self.key).into_owned()
        };
        ReadableKey { owner: self.owner_hex(), key }
    }
}

impl fmt::Display for RegisterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_readable(), f)
    }
}

/// A register address in its human-readable form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReadableKey {
    pub owner: String,
    pub key: String,
}

impl ReadableKey {
    pub fn new(owner: impl Into<String>, key: impl Into<String>) -> Self {
        Self { owner: owner.into(), key: key.into() }
    }

    pub fn is_slab(&self) -> bool {
        self.key.as_bytes().first() == Some(&SLAB_PREFIX)
    }

    /// Decode back to the raw form. The `0x` owner prefix is optional.
    pub fn to_mangled(&self) -> Result<RegisterKey, FormatError> {
        let owner = decode_hex("register owner", &self.owner)?;
        let key = if self.is_slab() {
            let mut raw = vec![SLAB_PREFIX];
            raw.extend(decode_hex("slab identifier", &self.key[1..])?);
            raw
        } else {
            self.key.as_bytes().to_vec()
        };
        Ok(RegisterKey { owner, key })
    }
}

impl fmt::Display for ReadableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]: {}", self.owner, self.key)
    }
}

/// Strict hex decoding with an optional `0x` prefix.
pub(crate) fn decode_hex(what: &'static str, input: &str) -> Result<Vec<u8>, FormatError> {
    let digits = input.strip_prefix("0x").unwrap_or(input);
    hex::decode(digits).map_err(|source| FormatError::Hex { what, input: input.to_string(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slab_detection() {
        assert!(RegisterKey::new(vec![1], b"$\x00\x01".to_vec()).is_slab());
        assert!(!RegisterKey::new(vec![1], "balance").is_slab());
        assert!(!RegisterKey::new(vec![1], "").is_slab());
        assert!(ReadableKey::new("0x01", "$0001").is_slab());
    }

    #[test]
    fn test_readable_form() {
        let key = RegisterKey::new(vec![0, 0, 0, 0, 0, 0, 0, 1], "code.Foo");
        let readable = key.to_readable();
        assert_eq!(readable, ReadableKey::new("0x0000000000000001", "code.Foo"));
        assert_eq!(key.to_string(), "[0x0000000000000001]: code.Foo");

        let slab = RegisterKey::new(vec![0xab], vec![b'$', 0, 0, 0, 0, 0, 0, 0, 7]);
        assert_eq!(slab.to_readable(), ReadableKey::new("0xab", "$0000000000000007"));
    }

    #[test]
    fn test_mangled_readable_mangled_is_exact() {
        let keys = [
            RegisterKey::new(vec![], "uuid"),
            RegisterKey::new(vec![0x1e, 0x3c, 0x78, 0xc6, 0xd5, 0x80, 0x27, 0x3b], "storage_used"),
            RegisterKey::new(vec![0x01], vec![b'$']),
            RegisterKey::new(vec![0x01], vec![b'$', 0xff, 0x00, b'$', 0x7f]),
            RegisterKey::new(vec![0xff; 8], "public_key_0"),
        ];
        for key in keys {
            assert!(key.has_exact_readable());
            assert_eq!(key.to_readable().to_mangled().unwrap(), key);
        }
    }

    #[test]
    fn test_owner_prefix_is_optional() {
        let with = ReadableKey::new("0x01", "balance").to_mangled().unwrap();
        let without = ReadableKey::new("01", "balance").to_mangled().unwrap();
        assert_eq!(with, without);
        assert_eq!(with, RegisterKey::new(vec![1], "balance"));
    }

    #[test]
    fn test_malformed_hex_is_rejected() {
        assert!(matches!(
            ReadableKey::new("0xzz", "balance").to_mangled(),
            Err(FormatError::Hex { what: "register owner", .. })
        ));
        assert!(matches!(
            ReadableKey::new("0x01", "$abc").to_mangled(),
            Err(FormatError::Hex { what: "slab identifier", .. })
        ));
    }

    #[test]
    fn test_non_utf8_key_is_not_exact() {
        let key = RegisterKey::new(vec![1], vec![0xc3, 0x28]);
        assert!(!key.has_exact_readable());
    }

    #[test]
    fn test_from_hex() {
        let key = RegisterKey::from_hex("0x01", "62616c616e6365").unwrap();
        assert_eq!(key, RegisterKey::new(vec![1], "balance"));
        assert!(RegisterKey::from_hex("0x01", "6").is_err());
    }
}
