//! Content checksums and the service that computes them.
//!
//! Backends report checksums as bare hex strings; [`Checksum::parse`] infers
//! the algorithm from the digest length. Local checksums are computed by a
//! [`ChecksumService`] keyed on the remote's algorithm so both sides can be
//! compared like for like.

use crate::error::{ErrorKind, Result};
use derive_more::Display;
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::str::FromStr;

const BUFFER_SIZE: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Algorithm {
    #[display("md5")]
    Md5,
    #[display("sha1")]
    Sha1,
    #[display("sha256")]
    Sha256,
    #[display("crc32")]
    Crc32,
    #[display("blake3")]
    Blake3,
}
impl FromStr for Algorithm {
    type Err = ErrorKind;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" | "sha-1" => Ok(Self::Sha1),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "crc32" => Ok(Self::Crc32),
            "blake3" => Ok(Self::Blake3),
            other => Err(ErrorKind::Interoperability(format!("unknown checksum algorithm `{other}`"))),
        }
    }
}

/// A digest together with the algorithm that produced it.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash)]
#[display("{algorithm}:{hash}")]
pub struct Checksum {
    pub algorithm: Algorithm,
    /// Lowercase hex digest.
    pub hash: String,
}

impl Checksum {
    pub fn new(algorithm: Algorithm, hash: impl Into<String>) -> Self {
        Self {
            algorithm,
            hash: hash.into().to_ascii_lowercase(),
        }
    }

    /// Parse a bare hex digest as reported by a provider.
    ///
    /// The algorithm is inferred from the digest length. Anything that isn't
    /// hex (multipart ETags such as `abc-3`, the literal `none`, empty
    /// strings) yields `None`. A 64 character digest is assumed to be SHA-256.
    ///
    /// ```
    /// use stratus_storage::checksum::{Algorithm, Checksum};
    /// let parsed = Checksum::parse("D41D8CD98F00B204E9800998ECF8427E").unwrap();
    /// assert_eq!(parsed.algorithm, Algorithm::Md5);
    /// assert_eq!(parsed.hash, "d41d8cd98f00b204e9800998ecf8427e");
    /// assert!(Checksum::parse("none").is_none());
    /// ```
    pub fn parse(hash: &str) -> Option<Self> {
        let hash = hash.trim().trim_matches('"');
        if hash.is_empty() || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let algorithm = match hash.len() {
            8 => Algorithm::Crc32,
            32 => Algorithm::Md5,
            40 => Algorithm::Sha1,
            64 => Algorithm::Sha256,
            _ => return None,
        };
        Some(Self::new(algorithm, hash))
    }

    /// Digest an in-memory buffer.
    pub fn of(algorithm: Algorithm, data: &[u8]) -> Self {
        let mut digester = Digester::new(algorithm);
        digester.update(data);
        digester.finish()
    }

    /// Whether both checksums use the same algorithm and digest.
    pub fn matches(&self, other: &Checksum) -> bool {
        self.algorithm == other.algorithm && self.hash.eq_ignore_ascii_case(&other.hash)
    }
}

/// Computes checksums of byte streams.
///
/// Implementations perform blocking reads; callers inside an async runtime
/// should run them on the blocking pool.
pub trait ChecksumService: Send + Sync {
    /// Whether `algorithm` can be computed by this service.
    fn supports(&self, algorithm: Algorithm) -> bool {
        let _ = algorithm;
        true
    }

    /// Read `reader` to the end and digest its contents.
    fn compute(&self, algorithm: Algorithm, reader: &mut dyn Read) -> Result<Checksum>;
}

/// Computes every [`Algorithm`] with the hashing crates directly.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultChecksumService;

impl ChecksumService for DefaultChecksumService {
    fn compute(&self, algorithm: Algorithm, reader: &mut dyn Read) -> Result<Checksum> {
        let mut digester = Digester::new(algorithm);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        loop {
            let read = reader.read(&mut buffer).map_err(ErrorKind::Io)?;
            if read == 0 {
                break;
            }
            digester.update(&buffer[..read]);
        }
        Ok(digester.finish())
    }
}

enum Digester {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Crc32(crc32fast::Hasher),
    Blake3(Box<blake3::Hasher>),
}
impl Digester {
    fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Md5 => Self::Md5(Md5::new()),
            Algorithm::Sha1 => Self::Sha1(Sha1::new()),
            Algorithm::Sha256 => Self::Sha256(Sha256::new()),
            Algorithm::Crc32 => Self::Crc32(crc32fast::Hasher::new()),
            Algorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(hasher) => hasher.update(data),
            Self::Sha1(hasher) => hasher.update(data),
            Self::Sha256(hasher) => hasher.update(data),
            Self::Crc32(hasher) => hasher.update(data),
            Self::Blake3(hasher) => {
                hasher.update(data);
            },
        }
    }

    fn finish(self) -> Checksum {
        match self {
            Self::Md5(hasher) => Checksum::new(Algorithm::Md5, format!("{:x}", hasher.finalize())),
            Self::Sha1(hasher) => Checksum::new(Algorithm::Sha1, format!("{:x}", hasher.finalize())),
            Self::Sha256(hasher) => Checksum::new(Algorithm::Sha256, format!("{:x}", hasher.finalize())),
            Self::Crc32(hasher) => Checksum::new(Algorithm::Crc32, format!("{:08x}", hasher.finalize())),
            Self::Blake3(hasher) => Checksum::new(Algorithm::Blake3, hasher.finalize().to_hex().to_string()),
        }
    }
}
