use tollgate_types::{AccountId, EvmAddress, SettlementProof, StorageAddress};

use crate::error::LedgerError;
use crate::records::{Gateway, Session};

/// Write boundary for gateway registration and maintenance.
///
/// Every method takes the invoking identity explicitly; authorization is an
/// equality check against the record's stored owner, performed before any
/// mutation.
pub trait GatewayRegistry: Send + Sync {
    /// Create a gateway at the address derived from its slug. The caller
    /// becomes the owning provider.
    fn register_gateway(
        &self,
        caller: &AccountId,
        slug: &str,
        price_per_request: u64,
        provider_evm_address: EvmAddress,
    ) -> Result<StorageAddress, LedgerError>;

    /// Update the per-request price. Provider only.
    fn update_gateway_price(
        &self,
        caller: &AccountId,
        slug: &str,
        new_price: u64,
    ) -> Result<(), LedgerError>;

    /// Deactivate the gateway. Provider only; irreversible through this
    /// interface.
    fn deactivate_gateway(&self, caller: &AccountId, slug: &str) -> Result<(), LedgerError>;
}

/// Write boundary for the session state machine.
pub trait SessionLedger: Send + Sync {
    /// Open a deposit-backed session against an active gateway. The caller
    /// becomes the session's agent.
    fn open_session(
        &self,
        caller: &AccountId,
        gateway_slug: &str,
        estimated_deposit: u64,
        duration_seconds: i64,
        nonce: u64,
        agent_evm_address: EvmAddress,
    ) -> Result<StorageAddress, LedgerError>;

    /// Meter usage against the deposit. Provider of the referenced gateway
    /// only. Hot path: exists → authorized → active → unexpired → within
    /// deposit, then commit.
    fn record_usage(
        &self,
        caller: &AccountId,
        session: &StorageAddress,
        amount: u64,
    ) -> Result<(), LedgerError>;

    /// Settle an active session and emit exactly one settlement proof.
    /// Any caller; the proof is self-describing and re-validated downstream.
    fn settle_session(
        &self,
        caller: &AccountId,
        session: &StorageAddress,
    ) -> Result<SettlementProof, LedgerError>;

    /// Cancel an untouched session. Agent only; fails once any usage has
    /// been recorded.
    fn cancel_session(
        &self,
        caller: &AccountId,
        session: &StorageAddress,
    ) -> Result<(), LedgerError>;
}

/// Read boundary over the address-keyed store.
pub trait LedgerReader: Send + Sync {
    /// Fetch a gateway by slug. Absence is `Ok(None)`, not an error.
    fn gateway_by_slug(&self, slug: &str) -> Result<Option<Gateway>, LedgerError>;

    /// Fetch a session by its derived address.
    fn session(&self, address: &StorageAddress) -> Result<Option<Session>, LedgerError>;

    /// All registered gateways, in registration order.
    fn gateways(&self) -> Result<Vec<(StorageAddress, Gateway)>, LedgerError>;

    /// All sessions ever opened against a gateway, in open order.
    fn sessions_for_gateway(
        &self,
        gateway: &StorageAddress,
    ) -> Result<Vec<(StorageAddress, Session)>, LedgerError>;
}

/// Boundary through which settlement proofs leave the ledger.
///
/// Delivery is fire-and-forget from the ledger's perspective; retry and
/// backoff belong to the consumer side of the sink.
pub trait ProofSink: Send + Sync {
    fn publish(&self, proof: &SettlementProof);
}

/// A sink that drops every proof. Useful when no relay is attached.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl ProofSink for NullSink {
    fn publish(&self, _proof: &SettlementProof) {}
}
