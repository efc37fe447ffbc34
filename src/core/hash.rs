//! Content hashes for content-addressed storage

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
	#[serde(rename = "SHA-256")]
	Sha256,
}

impl HashAlgorithm {
	pub fn as_str(&self) -> &'static str {
		match self {
			HashAlgorithm::Sha256 => "SHA-256",
		}
	}

	/// Directory name used for blobs of this algorithm
	pub fn dir_name(&self) -> &'static str {
		match self {
			HashAlgorithm::Sha256 => "sha256",
		}
	}
}

/// Equal iff algorithm and hex value are equal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StoredHash")]
pub struct ContentHash {
	algorithm: HashAlgorithm,
	value: String,
}

/// Unchecked wire form; persisted hashes go through the same validation as parsed ones
#[derive(Deserialize)]
struct StoredHash {
	algorithm: HashAlgorithm,
	value: String,
}

impl TryFrom<StoredHash> for ContentHash {
	type Error = String;

	fn try_from(stored: StoredHash) -> Result<Self, Self::Error> {
		match stored.algorithm {
			HashAlgorithm::Sha256 => Self::sha256(&stored.value)
				.ok_or_else(|| format!("invalid {} digest: {:?}", stored.algorithm.as_str(), stored.value)),
		}
	}
}

impl ContentHash {
	/// SHA-256 of the given bytes
	pub fn of(bytes: &[u8]) -> Self {
		let digest = Sha256::digest(bytes);
		Self {
			algorithm: HashAlgorithm::Sha256,
			value: format!("{:x}", digest),
		}
	}

	/// Parse a hex SHA-256 digest (64 hex chars, any case)
	pub fn sha256(hex: &str) -> Option<Self> {
		let hex = hex.trim();
		if hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
			Some(Self {
				algorithm: HashAlgorithm::Sha256,
				value: hex.to_ascii_lowercase(),
			})
		} else {
			None
		}
	}

	pub fn algorithm(&self) -> HashAlgorithm {
		self.algorithm
	}

	pub fn value(&self) -> &str {
		&self.value
	}

	pub fn short(&self) -> &str {
		self.value.get(..12).unwrap_or(&self.value)
	}
}

impl std::fmt::Display for ContentHash {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.algorithm.dir_name(), self.value)
	}
}
