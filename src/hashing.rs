use std::fmt::LowerHex;
use std::io::{self, Read};

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Hash algorithm used for function identities and file digests.
///
/// This is the hash-algorithm factory handed to every cacher: it produces a
/// fresh [`ContentHasher`] per digest and names itself in persisted metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha1,
}

impl HashAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha1 => "sha1",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sha256" => Some(HashAlgorithm::Sha256),
            "sha1" => Some(HashAlgorithm::Sha1),
            _ => None,
        }
    }

    pub fn hasher(self) -> ContentHasher {
        match self {
            HashAlgorithm::Sha256 => ContentHasher::Sha256(Sha256::new()),
            HashAlgorithm::Sha1 => ContentHasher::Sha1(Sha1::new()),
        }
    }

    /// One-shot hex digest of `data`.
    pub fn digest_hex(self, data: impl AsRef<[u8]>) -> String {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize_hex()
    }
}

/// Streaming hasher for one of the supported algorithms.
#[derive(Debug, Clone)]
pub enum ContentHasher {
    Sha256(Sha256),
    Sha1(Sha1),
}

impl ContentHasher {
    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            ContentHasher::Sha256(_) => HashAlgorithm::Sha256,
            ContentHasher::Sha1(_) => HashAlgorithm::Sha1,
        }
    }

    pub fn update(&mut self, data: impl AsRef<[u8]>) {
        match self {
            ContentHasher::Sha256(hasher) => hasher.update(data),
            ContentHasher::Sha1(hasher) => hasher.update(data),
        }
    }

    /// Feed everything `reader` yields into the hasher.
    pub fn update_reader(&mut self, mut reader: impl Read) -> io::Result<u64> {
        let mut buffer = [0_u8; 64 * 1024];
        let mut total = 0_u64;
        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                return Ok(total);
            }
            self.update(&buffer[..read]);
            total += read as u64;
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            ContentHasher::Sha256(hasher) => hex(hasher.finalize()),
            ContentHasher::Sha1(hasher) => hex(hasher.finalize()),
        }
    }
}

fn hex(digest: impl LowerHex) -> String {
    format!("{digest:x}")
}
