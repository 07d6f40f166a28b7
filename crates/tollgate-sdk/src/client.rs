use std::sync::Arc;

use tollgate_ledger::{
    AuditReport, Clock, Gateway, GatewayRegistry, InMemoryLedger, LedgerAuditor, LedgerReader,
    Session, SessionLedger, SystemClock,
};
use tollgate_settle::{HubConfig, ProofFilter, ProofStream, SettlementHub, SubscriptionId};
use tollgate_types::{AccountId, EvmAddress, SettlementProof, StorageAddress};

use crate::error::SdkResult;

/// Result of opening a session: the derived address plus the nonce that
/// disambiguates it (needed again to re-derive the address client-side).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenedSession {
    pub address: StorageAddress,
    pub nonce: u64,
}

/// Embedded tollgate instance: ledger plus settlement hub, wired together.
///
/// Callers pass their identity explicitly on every write; the transaction
/// and signature layer that would normally prove that identity sits outside
/// this core.
pub struct Tollgate {
    ledger: InMemoryLedger,
    hub: Arc<SettlementHub>,
    clock: Arc<dyn Clock>,
}

impl Tollgate {
    /// Wall-clock instance with default hub capacity.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Instance with an explicit clock (manual clocks for expiry tests).
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let hub = Arc::new(SettlementHub::new(HubConfig::default()));
        let ledger = InMemoryLedger::with_parts(clock.clone(), hub.clone());
        Self { ledger, hub, clock }
    }

    // ---- Gateway operations ----

    pub fn register_gateway(
        &self,
        provider: &AccountId,
        slug: &str,
        price_per_request: u64,
        provider_evm_address: EvmAddress,
    ) -> SdkResult<StorageAddress> {
        Ok(self
            .ledger
            .register_gateway(provider, slug, price_per_request, provider_evm_address)?)
    }

    pub fn update_gateway_price(
        &self,
        provider: &AccountId,
        slug: &str,
        new_price: u64,
    ) -> SdkResult<()> {
        Ok(self.ledger.update_gateway_price(provider, slug, new_price)?)
    }

    pub fn deactivate_gateway(&self, provider: &AccountId, slug: &str) -> SdkResult<()> {
        Ok(self.ledger.deactivate_gateway(provider, slug)?)
    }

    // ---- Session operations ----

    /// Open a session. When `nonce` is `None`, the current time in
    /// milliseconds is used, so the same agent can open concurrent sessions
    /// against one gateway without coordinating nonces.
    pub fn open_session(
        &self,
        agent: &AccountId,
        gateway_slug: &str,
        estimated_deposit: u64,
        duration_seconds: i64,
        nonce: Option<u64>,
        agent_evm_address: EvmAddress,
    ) -> SdkResult<OpenedSession> {
        let nonce = nonce.unwrap_or_else(|| self.clock.millis_now());
        let address = self.ledger.open_session(
            agent,
            gateway_slug,
            estimated_deposit,
            duration_seconds,
            nonce,
            agent_evm_address,
        )?;
        Ok(OpenedSession { address, nonce })
    }

    pub fn record_usage(
        &self,
        provider: &AccountId,
        session: &StorageAddress,
        amount: u64,
    ) -> SdkResult<()> {
        Ok(self.ledger.record_usage(provider, session, amount)?)
    }

    pub fn settle_session(
        &self,
        caller: &AccountId,
        session: &StorageAddress,
    ) -> SdkResult<SettlementProof> {
        Ok(self.ledger.settle_session(caller, session)?)
    }

    pub fn cancel_session(
        &self,
        agent: &AccountId,
        session: &StorageAddress,
    ) -> SdkResult<()> {
        Ok(self.ledger.cancel_session(agent, session)?)
    }

    // ---- Reads ----

    pub fn gateway(&self, slug: &str) -> SdkResult<Option<Gateway>> {
        Ok(self.ledger.gateway_by_slug(slug)?)
    }

    pub fn session(&self, address: &StorageAddress) -> SdkResult<Option<Session>> {
        Ok(self.ledger.session(address)?)
    }

    pub fn gateways(&self) -> SdkResult<Vec<(StorageAddress, Gateway)>> {
        Ok(self.ledger.gateways()?)
    }

    pub fn sessions_for_gateway(
        &self,
        gateway: &StorageAddress,
    ) -> SdkResult<Vec<(StorageAddress, Session)>> {
        Ok(self.ledger.sessions_for_gateway(gateway)?)
    }

    /// Re-check the ledger's global invariants.
    pub fn audit(&self) -> SdkResult<AuditReport> {
        Ok(LedgerAuditor::audit(&self.ledger)?)
    }

    // ---- Settlement consumption ----

    pub fn subscribe_settlements(&self, filter: ProofFilter) -> (SubscriptionId, ProofStream) {
        self.hub.subscribe(filter)
    }

    pub fn unsubscribe_settlements(&self, id: SubscriptionId) -> bool {
        self.hub.unsubscribe(id)
    }

    /// Replay the full settlement-proof log.
    pub fn settlement_proofs(&self) -> Vec<SettlementProof> {
        self.hub.proofs()
    }
}

impl Default for Tollgate {
    fn default() -> Self {
        Self::new()
    }
}
