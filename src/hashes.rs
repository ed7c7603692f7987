use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashError {
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid {algorithm} digest length: {got} (expected {expected})")]
    InvalidDigestLength {
        algorithm: HashAlgorithm,
        got: usize,
        expected: usize,
    },
}

/// Digest algorithms accepted for artifact hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha2_256,
}

impl HashAlgorithm {
    /// Size of the digest in bytes
    pub fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Sha2_256 => 32,
        }
    }

    /// Name used by the transparency log in `hashedrekord` bodies
    pub fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Sha2_256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha2_256" | "sha2-256" => Ok(HashAlgorithm::Sha2_256),
            other => Err(HashError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// A digest together with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hashed {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl Hashed {
    pub fn new(algorithm: HashAlgorithm, digest: Vec<u8>) -> Result<Self, HashError> {
        let expected = algorithm.output_len();
        if digest.len() != expected {
            return Err(HashError::InvalidDigestLength {
                algorithm,
                got: digest.len(),
                expected,
            });
        }
        Ok(Self { algorithm, digest })
    }

    pub fn sha256(data: &[u8]) -> Self {
        Self {
            algorithm: HashAlgorithm::Sha2_256,
            digest: Sha256::digest(data).to_vec(),
        }
    }

    /// Stream a reader through SHA-256
    pub fn from_reader<R: Read>(mut reader: R) -> std::io::Result<Self> {
        let mut hasher = Sha256::new();
        let mut buffer = [0; 8192];

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(Self {
            algorithm: HashAlgorithm::Sha2_256,
            digest: hasher.finalize().to_vec(),
        })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    pub fn hex(&self) -> String {
        hex::encode(&self.digest)
    }
}

impl fmt::Display for Hashed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_value() {
        let hashed = Hashed::sha256(b"abc");
        assert_eq!(
            hashed.hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hashed.to_string(), format!("sha256:{}", hashed.hex()));
    }

    #[test]
    fn test_from_reader_matches_one_shot() {
        let data = vec![7u8; 20_000];
        let streamed = Hashed::from_reader(&data[..]).unwrap();
        assert_eq!(streamed, Hashed::sha256(&data));
    }

    #[test]
    fn test_rejects_wrong_digest_length() {
        let err = Hashed::new(HashAlgorithm::Sha2_256, vec![0; 20]).unwrap_err();
        assert_eq!(
            err,
            HashError::InvalidDigestLength {
                algorithm: HashAlgorithm::Sha2_256,
                got: 20,
                expected: 32
            }
        );
    }

    #[test]
    fn test_unsupported_algorithm_is_an_error() {
        assert_eq!("SHA256".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Sha2_256));
        assert!(matches!(
            "md5".parse::<HashAlgorithm>(),
            Err(HashError::UnsupportedAlgorithm(_))
        ));
    }
}
