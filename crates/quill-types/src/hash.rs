use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::TypeError;

/// Digest algorithms a [`Hash`] may be tagged with.
///
/// Only SHA-256 is supported; the tag is kept in the textual form so that
/// stored references stay self-describing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashAlgo {
    Sha256,
}

impl HashAlgo {
    /// The textual tag used in `algo:hex` strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgo {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(Self::Sha256),
            other => Err(TypeError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Content-addressed identifier for any stored object.
///
/// A `Hash` is the SHA-256 digest of an object's packed bytes together with
/// its algorithm tag. Identical content always produces the same `Hash`,
/// so objects are deduplicated on write and verifiable on read.
///
/// The textual form is `sha256:<64 hex chars>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash {
    algo: HashAlgo,
    digest: [u8; 32],
}

impl Hash {
    /// Hash raw bytes with SHA-256.
    pub fn digest_of(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self {
            algo: HashAlgo::Sha256,
            digest: hasher.finalize().into(),
        }
    }

    /// Wrap a pre-computed SHA-256 digest.
    pub fn from_sha256(digest: [u8; 32]) -> Self {
        Self {
            algo: HashAlgo::Sha256,
            digest,
        }
    }

    pub fn algo(&self) -> HashAlgo {
        self.algo
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.digest
    }

    /// Hex-encoded digest, without the algorithm tag.
    pub fn to_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Short hex representation (first 8 characters), for logs.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.digest[..4])
    }

    /// Two-level sharded relative path, e.g. `f63b/82de/c4c45a50...`.
    ///
    /// The first two digest bytes and the next two name the directories;
    /// the remaining 28 bytes name the file.
    pub fn to_path_name(&self) -> PathBuf {
        let mut path = PathBuf::from(hex::encode(&self.digest[0..2]));
        path.push(hex::encode(&self.digest[2..4]));
        path.push(hex::encode(&self.digest[4..]));
        path
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}:{})", self.algo, self.short_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algo, self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algo, hex_part) = s
            .split_once(':')
            .ok_or_else(|| TypeError::InvalidHash(s.to_string()))?;
        let algo: HashAlgo = algo.parse()?;
        let bytes = hex::decode(hex_part).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes);
        Ok(Self { algo, digest })
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let h1 = Hash::digest_of(b"hello world");
        let h2 = Hash::digest_of(b"hello world");
        assert_eq!(h1, h2);
        assert_ne!(h1, Hash::digest_of(b"hello"));
    }

    #[test]
    fn known_sha256_of_foo() {
        let h = Hash::digest_of(b"foo");
        assert_eq!(
            h.to_string(),
            "sha256:2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae"
        );
    }

    #[test]
    fn display_parse_roundtrip() {
        let h = Hash::digest_of(b"test");
        let parsed: Hash = h.to_string().parse().unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn parse_rejects_missing_separator() {
        let err = "deadbeef".parse::<Hash>().unwrap_err();
        assert!(matches!(err, TypeError::InvalidHash(_)));
    }

    #[test]
    fn parse_rejects_unknown_algorithm() {
        let s = format!("md5:{}", "00".repeat(32));
        let err = s.parse::<Hash>().unwrap_err();
        assert_eq!(err, TypeError::UnsupportedAlgorithm("md5".into()));
    }

    #[test]
    fn parse_rejects_bad_hex_and_length() {
        assert!(matches!(
            "sha256:zz".parse::<Hash>(),
            Err(TypeError::InvalidHex(_))
        ));
        assert!(matches!(
            "sha256:abcd".parse::<Hash>(),
            Err(TypeError::InvalidLength {
                expected: 32,
                actual: 2
            })
        ));
    }

    #[test]
    fn path_name_is_two_level_sharded() {
        let h = Hash::digest_of(b"foo");
        assert_eq!(
            h.to_path_name(),
            PathBuf::from("2c26")
                .join("b46b")
                .join("68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae")
        );
    }

    #[test]
    fn short_hex_is_8_chars() {
        assert_eq!(Hash::digest_of(b"test").short_hex().len(), 8);
    }

    #[test]
    fn serde_uses_textual_form() {
        let h = Hash::digest_of(b"serde test");
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{h}\""));
        let parsed: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, parsed);
    }
}
