use serde::{Deserialize, Serialize};

use tollgate_types::{AccountId, EvmAddress, StorageAddress};

use crate::error::LedgerError;

/// Maximum gateway slug length in bytes.
pub const MAX_SLUG_LEN: usize = 32;

/// Fixed-width type discriminator prefixed to every persisted record.
///
/// A record decoded under the wrong discriminator is rejected instead of
/// being reinterpreted as the other type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RecordKind {
    Gateway = 0x01,
    Session = 0x02,
}

impl RecordKind {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Gateway),
            0x02 => Some(Self::Session),
            _ => None,
        }
    }
}

/// Lifecycle state of a session.
///
/// The logical "no session" state is the absence of a record at the derived
/// address; it is never persisted. `Active` is entered only by opening a
/// session; the other three states are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Active,
    Settled,
    Cancelled,
    Expired,
}

impl SessionState {
    /// Terminal states never re-enter `Active`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// A registered API provider's pricing/activity record, keyed by slug.
///
/// Never deleted; deactivation is the terminal soft delete. The counters
/// are updated only by the ledger itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gateway {
    pub slug: String,
    pub provider: AccountId,
    pub provider_evm_address: EvmAddress,
    pub price_per_request: u64,
    pub is_active: bool,
    pub total_sessions: u64,
    pub total_volume: u64,
    pub created_at: i64,
    pub bump: u8,
}

/// A prepaid usage allowance opened by an agent against a gateway.
///
/// `provider` is copied from the gateway at open time so settlement does
/// not need a second lookup. Invariant: `used <= estimated_deposit` at all
/// times.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub agent: AccountId,
    pub agent_evm_address: EvmAddress,
    pub gateway: StorageAddress,
    pub provider: AccountId,
    pub estimated_deposit: u64,
    pub used: u64,
    pub created_at: i64,
    pub expires_at: i64,
    pub state: SessionState,
    pub usage_count: u32,
    pub nonce: u64,
    pub bump: u8,
}

impl Gateway {
    pub fn encode(&self) -> Result<Vec<u8>, LedgerError> {
        encode_record(RecordKind::Gateway, self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, LedgerError> {
        decode_record(RecordKind::Gateway, bytes)
    }
}

impl Session {
    pub fn encode(&self) -> Result<Vec<u8>, LedgerError> {
        encode_record(RecordKind::Session, self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, LedgerError> {
        decode_record(RecordKind::Session, bytes)
    }
}

fn encode_record<T: Serialize>(kind: RecordKind, record: &T) -> Result<Vec<u8>, LedgerError> {
    let body = bincode::serialize(record).map_err(|e| LedgerError::Codec(e.to_string()))?;
    let mut bytes = Vec::with_capacity(1 + body.len());
    bytes.push(kind as u8);
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

fn decode_record<T: for<'de> Deserialize<'de>>(
    expected: RecordKind,
    bytes: &[u8],
) -> Result<T, LedgerError> {
    let (&tag, body) = bytes
        .split_first()
        .ok_or_else(|| LedgerError::Codec("empty record".into()))?;
    match RecordKind::from_byte(tag) {
        Some(kind) if kind == expected => {
            bincode::deserialize(body).map_err(|e| LedgerError::Codec(e.to_string()))
        }
        Some(kind) => Err(LedgerError::Codec(format!(
            "record discriminator mismatch: expected {expected:?}, found {kind:?}"
        ))),
        None => Err(LedgerError::Codec(format!(
            "unknown record discriminator 0x{tag:02x}"
        ))),
    }
}
