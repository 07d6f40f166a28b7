use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::AccountId;

/// Leading byte value reserved for host identity accounts. Derived record
/// addresses must not fall in this namespace.
const RESERVED_PREFIX: u8 = 0x00;

/// Derived storage slot for a gateway or session record.
///
/// Addresses are BLAKE3 hashes over a domain tag, the structured seed
/// fields, and a disambiguation byte (the "bump"). Derivation is pure:
/// the same seed always yields the same address, and distinct seeds yield
/// distinct addresses by construction (domain separation plus collision
/// resistance of the hash).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageAddress {
    hash: [u8; 32],
}

impl StorageAddress {
    /// The raw 32-byte address. Also used verbatim as the settlement-proof
    /// `session_id`.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.hash
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Short identifier (first 8 hex characters).
    pub fn short_id(&self) -> String {
        format!("addr:{}", hex::encode(&self.hash[..4]))
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("addr:").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self { hash: arr })
    }

    /// Create from a raw 32-byte value. Use [`AddressSeed::derive`] for
    /// production code.
    pub fn from_raw(hash: [u8; 32]) -> Self {
        Self { hash }
    }
}

impl fmt::Debug for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageAddress({})", self.short_id())
    }
}

impl fmt::Display for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_id())
    }
}

/// Structured key fed to the address deriver.
///
/// One variant per record kind. The session nonce is caller-supplied so the
/// same agent can hold several concurrent sessions against one gateway;
/// each (agent, gateway, nonce) triple derives its own slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressSeed {
    Gateway {
        slug: String,
    },
    Session {
        agent: AccountId,
        gateway: StorageAddress,
        nonce: u64,
    },
}

impl AddressSeed {
    /// Derive the storage address and bump byte for this seed.
    ///
    /// Bumps are searched from 255 downward; the first candidate outside
    /// the reserved namespace wins. Exhausting all 256 bumps means the
    /// host's address plane cannot hold this key — a fatal configuration
    /// error, not something callers retry.
    pub fn derive(&self) -> Result<(StorageAddress, u8), TypeError> {
        for bump in (0u8..=255).rev() {
            let candidate = self.candidate(bump);
            if candidate[0] != RESERVED_PREFIX {
                return Ok((StorageAddress { hash: candidate }, bump));
            }
        }
        Err(TypeError::BumpExhausted)
    }

    fn candidate(&self, bump: u8) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"tollgate-address-v1:");
        match self {
            AddressSeed::Gateway { slug } => {
                hasher.update(b"gateway:");
                hasher.update(slug.as_bytes());
            }
            AddressSeed::Session {
                agent,
                gateway,
                nonce,
            } => {
                hasher.update(b"session:");
                hasher.update(agent.as_bytes());
                hasher.update(gateway.as_bytes());
                hasher.update(&nonce.to_le_bytes());
            }
        }
        hasher.update(&[bump]);
        *hasher.finalize().as_bytes()
    }
}
