use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::StorageAddress;
use crate::evm::EvmAddress;

/// Unique identifier for a settlement proof.
///
/// A BLAKE3 content hash over the proof fields, making the proof both
/// self-identifying and tamper-evident. Downstream relays dedupe on
/// `session_id`, but the proof id lets the event log itself be audited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProofId {
    pub hash: [u8; 32],
}

impl ProofId {
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self { hash }
    }

    /// Short hex representation (first 8 hex chars).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.hash[..4])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl fmt::Display for ProofId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proof:{}", self.short_hex())
    }
}

/// Immutable settlement record emitted when a session transitions to
/// `Settled`.
///
/// This is the wire schema consumed by the external cross-chain relay:
/// enough to pay `provider_evm_address` the metered `used_amount` on behalf
/// of `agent_evm_address`. Exactly one proof exists per settled session;
/// delivery is at-least-once, so consumers dedupe by `session_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementProof {
    /// Derived session address, as a 32-byte identifier.
    pub session_id: StorageAddress,
    /// Agent's external-chain address, fixed at session open.
    pub agent_evm_address: EvmAddress,
    /// Provider's external-chain payout address, from the gateway record.
    pub provider_evm_address: EvmAddress,
    /// Final metered usage at the moment of settlement.
    pub used_amount: u64,
    /// Unix timestamp (seconds) of the settlement transition.
    pub timestamp: i64,
}

impl SettlementProof {
    /// Content-addressed id of this proof.
    pub fn id(&self) -> ProofId {
        ProofId::from_hash(self.integrity_hash())
    }

    /// Verify the given id matches this proof's content.
    pub fn verify(&self, id: &ProofId) -> bool {
        self.integrity_hash() == id.hash
    }

    /// BLAKE3 hash over the proof's wire fields.
    fn integrity_hash(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"tollgate-settlement-v1:");
        hasher.update(self.session_id.as_bytes());
        hasher.update(self.agent_evm_address.as_bytes());
        hasher.update(self.provider_evm_address.as_bytes());
        hasher.update(&self.used_amount.to_le_bytes());
        hasher.update(&self.timestamp.to_le_bytes());
        *hasher.finalize().as_bytes()
    }
}
