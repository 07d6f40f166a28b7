use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use tollgate_types::{
    AccountId, AddressSeed, EvmAddress, SettlementProof, StorageAddress,
};

use crate::clock::{Clock, SystemClock};
use crate::error::LedgerError;
use crate::records::{Gateway, Session, SessionState, MAX_SLUG_LEN};
use crate::traits::{GatewayRegistry, LedgerReader, NullSink, ProofSink, SessionLedger};

/// In-memory tollgate ledger for tests, local demos, and embedding.
///
/// Records live in an address-keyed map of discriminator-tagged bytes; the
/// address deriver is the index computation. Every operation validates all
/// preconditions against the locked state before mutating anything, so a
/// failed operation leaves no partial field updates behind. The single
/// write lock stands in for the host ledger's per-account serialization
/// guarantee.
pub struct InMemoryLedger {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn ProofSink>,
    inner: RwLock<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<StorageAddress, Vec<u8>>,
    // Registration/open order, for enumeration and audit.
    gateway_order: Vec<StorageAddress>,
    gateway_sessions: HashMap<StorageAddress, Vec<StorageAddress>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_parts(Arc::new(SystemClock), Arc::new(NullSink))
    }

    /// Build a ledger with an explicit clock and proof sink.
    pub fn with_parts(clock: Arc<dyn Clock>, sink: Arc<dyn ProofSink>) -> Self {
        Self {
            clock,
            sink,
            inner: RwLock::new(LedgerState::default()),
        }
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, LedgerState>, LedgerError> {
        self.inner.read().map_err(|_| LedgerError::LockPoisoned)
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, LedgerState>, LedgerError> {
        self.inner.write().map_err(|_| LedgerError::LockPoisoned)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerState {
    fn gateway_at(&self, address: &StorageAddress) -> Result<Option<Gateway>, LedgerError> {
        self.accounts
            .get(address)
            .map(|bytes| Gateway::decode(bytes))
            .transpose()
    }

    fn session_at(&self, address: &StorageAddress) -> Result<Option<Session>, LedgerError> {
        self.accounts
            .get(address)
            .map(|bytes| Session::decode(bytes))
            .transpose()
    }

    fn put_gateway(
        &mut self,
        address: &StorageAddress,
        gateway: &Gateway,
    ) -> Result<(), LedgerError> {
        self.accounts.insert(*address, gateway.encode()?);
        Ok(())
    }

    fn put_session(
        &mut self,
        address: &StorageAddress,
        session: &Session,
    ) -> Result<(), LedgerError> {
        self.accounts.insert(*address, session.encode()?);
        Ok(())
    }

    /// Load the gateway a session points at. Gateways are never deleted,
    /// so absence here means the store has been corrupted out-of-band.
    fn gateway_for_session(&self, session: &Session) -> Result<Gateway, LedgerError> {
        self.gateway_at(&session.gateway)?
            .ok_or_else(|| LedgerError::Codec("session references a missing gateway".into()))
    }
}

fn validate_slug(slug: &str) -> Result<(), LedgerError> {
    if slug.is_empty() {
        return Err(LedgerError::EmptySlug);
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(LedgerError::SlugTooLong {
            len: slug.len(),
            max: MAX_SLUG_LEN,
        });
    }
    Ok(())
}

impl GatewayRegistry for InMemoryLedger {
    fn register_gateway(
        &self,
        caller: &AccountId,
        slug: &str,
        price_per_request: u64,
        provider_evm_address: EvmAddress,
    ) -> Result<StorageAddress, LedgerError> {
        validate_slug(slug)?;
        if price_per_request == 0 {
            return Err(LedgerError::InvalidPrice);
        }

        let (address, bump) = AddressSeed::Gateway { slug: slug.into() }.derive()?;

        let mut state = self.write_state()?;
        if state.accounts.contains_key(&address) {
            return Err(LedgerError::GatewayExists {
                address: address.to_hex(),
            });
        }

        let gateway = Gateway {
            slug: slug.into(),
            provider: *caller,
            provider_evm_address,
            price_per_request,
            is_active: true,
            total_sessions: 0,
            total_volume: 0,
            created_at: self.clock.unix_now(),
            bump,
        };

        state.put_gateway(&address, &gateway)?;
        state.gateway_order.push(address);
        state.gateway_sessions.entry(address).or_default();

        info!(slug, %address, provider = %caller, price_per_request, "gateway registered");
        Ok(address)
    }

    fn update_gateway_price(
        &self,
        caller: &AccountId,
        slug: &str,
        new_price: u64,
    ) -> Result<(), LedgerError> {
        if new_price == 0 {
            return Err(LedgerError::InvalidPrice);
        }

        let (address, _) = AddressSeed::Gateway { slug: slug.into() }.derive()?;

        let mut state = self.write_state()?;
        let mut gateway = state
            .gateway_at(&address)?
            .ok_or_else(|| LedgerError::GatewayNotFound { slug: slug.into() })?;

        if gateway.provider != *caller {
            return Err(LedgerError::Unauthorized);
        }

        gateway.price_per_request = new_price;
        state.put_gateway(&address, &gateway)?;

        info!(slug, new_price, "gateway price updated");
        Ok(())
    }

    fn deactivate_gateway(&self, caller: &AccountId, slug: &str) -> Result<(), LedgerError> {
        let (address, _) = AddressSeed::Gateway { slug: slug.into() }.derive()?;

        let mut state = self.write_state()?;
        let mut gateway = state
            .gateway_at(&address)?
            .ok_or_else(|| LedgerError::GatewayNotFound { slug: slug.into() })?;

        if gateway.provider != *caller {
            return Err(LedgerError::Unauthorized);
        }

        gateway.is_active = false;
        state.put_gateway(&address, &gateway)?;

        info!(slug, "gateway deactivated");
        Ok(())
    }
}

impl SessionLedger for InMemoryLedger {
    fn open_session(
        &self,
        caller: &AccountId,
        gateway_slug: &str,
        estimated_deposit: u64,
        duration_seconds: i64,
        nonce: u64,
        agent_evm_address: EvmAddress,
    ) -> Result<StorageAddress, LedgerError> {
        if estimated_deposit == 0 {
            return Err(LedgerError::InvalidDeposit);
        }
        if duration_seconds <= 0 {
            return Err(LedgerError::InvalidDuration);
        }

        let (gateway_address, _) = AddressSeed::Gateway {
            slug: gateway_slug.into(),
        }
        .derive()?;

        let mut state = self.write_state()?;
        let mut gateway = state
            .gateway_at(&gateway_address)?
            .ok_or(LedgerError::GatewayNotActive)?;
        if !gateway.is_active {
            return Err(LedgerError::GatewayNotActive);
        }

        let (session_address, bump) = AddressSeed::Session {
            agent: *caller,
            gateway: gateway_address,
            nonce,
        }
        .derive()?;
        if state.accounts.contains_key(&session_address) {
            return Err(LedgerError::SessionExists {
                address: session_address.to_hex(),
            });
        }

        let now = self.clock.unix_now();
        let session = Session {
            agent: *caller,
            agent_evm_address,
            gateway: gateway_address,
            provider: gateway.provider,
            estimated_deposit,
            used: 0,
            created_at: now,
            expires_at: now.saturating_add(duration_seconds),
            state: SessionState::Active,
            usage_count: 0,
            nonce,
            bump,
        };

        gateway.total_sessions = gateway.total_sessions.saturating_add(1);

        state.put_session(&session_address, &session)?;
        state.put_gateway(&gateway_address, &gateway)?;
        state
            .gateway_sessions
            .entry(gateway_address)
            .or_default()
            .push(session_address);

        info!(
            gateway = gateway_slug,
            session = %session_address,
            agent = %caller,
            estimated_deposit,
            expires_at = session.expires_at,
            "session opened"
        );
        Ok(session_address)
    }

    fn record_usage(
        &self,
        caller: &AccountId,
        session_address: &StorageAddress,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let mut state = self.write_state()?;
        let mut session = state
            .session_at(session_address)?
            .ok_or_else(|| LedgerError::SessionNotFound {
                address: session_address.to_hex(),
            })?;

        if session.provider != *caller {
            return Err(LedgerError::Unauthorized);
        }
        if session.state != SessionState::Active {
            return Err(LedgerError::SessionNotActive);
        }

        // Expiry is checked before the deposit ceiling. An overdue session
        // is reclassified lazily: this is the one "failing" path that
        // commits a transition.
        if self.clock.unix_now() >= session.expires_at {
            session.state = SessionState::Expired;
            state.put_session(session_address, &session)?;
            debug!(session = %session_address, "session expired on access");
            return Err(LedgerError::SessionExpired);
        }

        let new_used = session
            .used
            .checked_add(amount)
            .ok_or(LedgerError::UsageExceedsDeposit)?;
        if new_used > session.estimated_deposit {
            return Err(LedgerError::UsageExceedsDeposit);
        }

        let mut gateway = state.gateway_for_session(&session)?;

        session.used = new_used;
        session.usage_count = session.usage_count.saturating_add(1);
        gateway.total_volume = gateway.total_volume.saturating_add(amount);

        state.put_session(session_address, &session)?;
        state.put_gateway(&session.gateway, &gateway)?;

        debug!(
            session = %session_address,
            amount,
            used = session.used,
            usage_count = session.usage_count,
            "usage recorded"
        );
        Ok(())
    }

    fn settle_session(
        &self,
        caller: &AccountId,
        session_address: &StorageAddress,
    ) -> Result<SettlementProof, LedgerError> {
        let proof = {
            let mut state = self.write_state()?;
            let mut session = state.session_at(session_address)?.ok_or_else(|| {
                LedgerError::SessionNotFound {
                    address: session_address.to_hex(),
                }
            })?;

            if session.state != SessionState::Active {
                return Err(LedgerError::SessionNotActive);
            }

            let gateway = state.gateway_for_session(&session)?;

            session.state = SessionState::Settled;
            state.put_session(session_address, &session)?;

            SettlementProof {
                session_id: *session_address,
                agent_evm_address: session.agent_evm_address,
                provider_evm_address: gateway.provider_evm_address,
                used_amount: session.used,
                timestamp: self.clock.unix_now(),
            }
        };

        // The transition is committed; delivery is fire-and-forget.
        self.sink.publish(&proof);

        info!(
            session = %session_address,
            settler = %caller,
            used_amount = proof.used_amount,
            "session settled"
        );
        Ok(proof)
    }

    fn cancel_session(
        &self,
        caller: &AccountId,
        session_address: &StorageAddress,
    ) -> Result<(), LedgerError> {
        let mut state = self.write_state()?;
        let mut session = state
            .session_at(session_address)?
            .ok_or_else(|| LedgerError::SessionNotFound {
                address: session_address.to_hex(),
            })?;

        if session.agent != *caller {
            return Err(LedgerError::Unauthorized);
        }
        if session.state != SessionState::Active {
            return Err(LedgerError::SessionNotActive);
        }
        if session.used != 0 {
            return Err(LedgerError::CannotCancelWithUsage);
        }

        session.state = SessionState::Cancelled;
        state.put_session(session_address, &session)?;

        info!(session = %session_address, "session cancelled");
        Ok(())
    }
}

impl LedgerReader for InMemoryLedger {
    fn gateway_by_slug(&self, slug: &str) -> Result<Option<Gateway>, LedgerError> {
        let (address, _) = AddressSeed::Gateway { slug: slug.into() }.derive()?;
        self.read_state()?.gateway_at(&address)
    }

    fn session(&self, address: &StorageAddress) -> Result<Option<Session>, LedgerError> {
        self.read_state()?.session_at(address)
    }

    fn gateways(&self) -> Result<Vec<(StorageAddress, Gateway)>, LedgerError> {
        let state = self.read_state()?;
        state
            .gateway_order
            .iter()
            .filter_map(|addr| match state.gateway_at(addr) {
                Ok(Some(gw)) => Some(Ok((*addr, gw))),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            })
            .collect()
    }

    fn sessions_for_gateway(
        &self,
        gateway: &StorageAddress,
    ) -> Result<Vec<(StorageAddress, Session)>, LedgerError> {
        let state = self.read_state()?;
        let Some(addresses) = state.gateway_sessions.get(gateway) else {
            return Ok(vec![]);
        };
        addresses
            .iter()
            .filter_map(|addr| match state.session_at(addr) {
                Ok(Some(s)) => Some(Ok((*addr, s))),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::clock::ManualClock;
    use proptest::prelude::*;

    const T0: i64 = 1_700_000_000;

    /// Sink that records every published proof.
    #[derive(Default)]
    struct CapturingSink {
        proofs: Mutex<Vec<SettlementProof>>,
    }

    impl ProofSink for CapturingSink {
        fn publish(&self, proof: &SettlementProof) {
            self.proofs.lock().unwrap().push(proof.clone());
        }
    }

    struct Fixture {
        ledger: InMemoryLedger,
        clock: Arc<ManualClock>,
        sink: Arc<CapturingSink>,
        provider: AccountId,
        agent: AccountId,
    }

    impl Fixture {
        fn new() -> Self {
            let clock = Arc::new(ManualClock::new(T0));
            let sink = Arc::new(CapturingSink::default());
            let ledger = InMemoryLedger::with_parts(clock.clone(), sink.clone());
            Self {
                ledger,
                clock,
                sink,
                provider: AccountId::from_raw([1; 32]),
                agent: AccountId::from_raw([2; 32]),
            }
        }

        fn register(&self, slug: &str, price: u64) -> StorageAddress {
            self.ledger
                .register_gateway(&self.provider, slug, price, EvmAddress::new([0xaa; 20]))
                .unwrap()
        }

        fn open(&self, slug: &str, deposit: u64, duration: i64, nonce: u64) -> StorageAddress {
            self.ledger
                .open_session(
                    &self.agent,
                    slug,
                    deposit,
                    duration,
                    nonce,
                    EvmAddress::new([0xbb; 20]),
                )
                .unwrap()
        }

        fn proofs(&self) -> Vec<SettlementProof> {
            self.sink.proofs.lock().unwrap().clone()
        }
    }

    #[test]
    fn register_and_fetch_gateway() {
        let fx = Fixture::new();
        fx.register("demo", 1000);

        let gw = fx.ledger.gateway_by_slug("demo").unwrap().unwrap();
        assert_eq!(gw.slug, "demo");
        assert_eq!(gw.provider, fx.provider);
        assert_eq!(gw.price_per_request, 1000);
        assert!(gw.is_active);
        assert_eq!(gw.total_sessions, 0);
        assert_eq!(gw.total_volume, 0);
        assert_eq!(gw.created_at, T0);
    }

    #[test]
    fn missing_gateway_reads_as_none() {
        let fx = Fixture::new();
        assert!(fx.ledger.gateway_by_slug("nope").unwrap().is_none());
    }

    #[test]
    fn duplicate_slug_is_rejected() {
        let fx = Fixture::new();
        fx.register("demo", 1000);
        let err = fx
            .ledger
            .register_gateway(&fx.provider, "demo", 2000, EvmAddress::ZERO)
            .unwrap_err();
        assert!(matches!(err, LedgerError::GatewayExists { .. }));
    }

    #[test]
    fn slug_length_bounds() {
        let fx = Fixture::new();
        let err = fx
            .ledger
            .register_gateway(&fx.provider, "", 1, EvmAddress::ZERO)
            .unwrap_err();
        assert_eq!(err, LedgerError::EmptySlug);

        let long = "x".repeat(33);
        let err = fx
            .ledger
            .register_gateway(&fx.provider, &long, 1, EvmAddress::ZERO)
            .unwrap_err();
        assert_eq!(err, LedgerError::SlugTooLong { len: 33, max: 32 });

        // 32 bytes is the inclusive maximum.
        fx.register(&"y".repeat(32), 1);
    }

    #[test]
    fn zero_price_is_rejected() {
        let fx = Fixture::new();
        let err = fx
            .ledger
            .register_gateway(&fx.provider, "demo", 0, EvmAddress::ZERO)
            .unwrap_err();
        assert_eq!(err, LedgerError::InvalidPrice);
    }

    #[test]
    fn price_update_requires_provider() {
        let fx = Fixture::new();
        fx.register("demo", 1000);

        let stranger = AccountId::from_raw([9; 32]);
        assert_eq!(
            fx.ledger
                .update_gateway_price(&stranger, "demo", 1500)
                .unwrap_err(),
            LedgerError::Unauthorized
        );

        fx.ledger
            .update_gateway_price(&fx.provider, "demo", 1500)
            .unwrap();
        let gw = fx.ledger.gateway_by_slug("demo").unwrap().unwrap();
        assert_eq!(gw.price_per_request, 1500);
    }

    #[test]
    fn price_update_rejects_zero_and_missing() {
        let fx = Fixture::new();
        fx.register("demo", 1000);
        assert_eq!(
            fx.ledger
                .update_gateway_price(&fx.provider, "demo", 0)
                .unwrap_err(),
            LedgerError::InvalidPrice
        );
        assert!(matches!(
            fx.ledger
                .update_gateway_price(&fx.provider, "ghost", 10)
                .unwrap_err(),
            LedgerError::GatewayNotFound { .. }
        ));
    }

    #[test]
    fn deactivation_gates_new_sessions_only() {
        let fx = Fixture::new();
        fx.register("demo", 1000);
        let session = fx.open("demo", 100_000, 3600, 1);

        fx.ledger.deactivate_gateway(&fx.provider, "demo").unwrap();

        // New sessions are blocked.
        let err = fx
            .ledger
            .open_session(&fx.agent, "demo", 1000, 60, 2, EvmAddress::ZERO)
            .unwrap_err();
        assert_eq!(err, LedgerError::GatewayNotActive);

        // Existing sessions keep metering; activity is only checked at open.
        fx.ledger.record_usage(&fx.provider, &session, 500).unwrap();
    }

    #[test]
    fn deactivate_requires_provider() {
        let fx = Fixture::new();
        fx.register("demo", 1000);
        assert_eq!(
            fx.ledger
                .deactivate_gateway(&fx.agent, "demo")
                .unwrap_err(),
            LedgerError::Unauthorized
        );
    }

    #[test]
    fn open_against_unknown_gateway_is_not_active() {
        let fx = Fixture::new();
        let err = fx
            .ledger
            .open_session(&fx.agent, "ghost", 1000, 60, 1, EvmAddress::ZERO)
            .unwrap_err();
        assert_eq!(err, LedgerError::GatewayNotActive);
    }

    #[test]
    fn open_validates_deposit_and_duration() {
        let fx = Fixture::new();
        fx.register("demo", 1000);
        assert_eq!(
            fx.ledger
                .open_session(&fx.agent, "demo", 0, 60, 1, EvmAddress::ZERO)
                .unwrap_err(),
            LedgerError::InvalidDeposit
        );
        assert_eq!(
            fx.ledger
                .open_session(&fx.agent, "demo", 1000, 0, 1, EvmAddress::ZERO)
                .unwrap_err(),
            LedgerError::InvalidDuration
        );
    }

    #[test]
    fn open_initializes_session_and_counts_it() {
        let fx = Fixture::new();
        fx.register("demo", 1000);
        let address = fx.open("demo", 100_000, 3600, 7);

        let session = fx.ledger.session(&address).unwrap().unwrap();
        assert_eq!(session.agent, fx.agent);
        assert_eq!(session.provider, fx.provider);
        assert_eq!(session.estimated_deposit, 100_000);
        assert_eq!(session.used, 0);
        assert_eq!(session.usage_count, 0);
        assert_eq!(session.state, SessionState::Active);
        assert_eq!(session.created_at, T0);
        assert_eq!(session.expires_at, T0 + 3600);
        assert_eq!(session.nonce, 7);

        let gw = fx.ledger.gateway_by_slug("demo").unwrap().unwrap();
        assert_eq!(gw.total_sessions, 1);
    }

    #[test]
    fn nonce_allows_concurrent_sessions_per_pair() {
        let fx = Fixture::new();
        fx.register("demo", 1000);
        let s1 = fx.open("demo", 1000, 3600, 1);
        let s2 = fx.open("demo", 1000, 3600, 2);
        assert_ne!(s1, s2);

        let err = fx
            .ledger
            .open_session(&fx.agent, "demo", 1000, 3600, 1, EvmAddress::ZERO)
            .unwrap_err();
        assert!(matches!(err, LedgerError::SessionExists { .. }));
    }

    #[test]
    fn usage_accrues_and_feeds_gateway_volume() {
        let fx = Fixture::new();
        fx.register("demo", 1000);
        let session = fx.open("demo", 100_000, 3600, 1);

        fx.ledger
            .record_usage(&fx.provider, &session, 5000)
            .unwrap();
        fx.ledger
            .record_usage(&fx.provider, &session, 5000)
            .unwrap();

        let s = fx.ledger.session(&session).unwrap().unwrap();
        assert_eq!(s.used, 10_000);
        assert_eq!(s.usage_count, 2);

        let gw = fx.ledger.gateway_by_slug("demo").unwrap().unwrap();
        assert_eq!(gw.total_volume, 10_000);
    }

    #[test]
    fn usage_requires_gateway_provider() {
        let fx = Fixture::new();
        fx.register("demo", 1000);
        let session = fx.open("demo", 100_000, 3600, 1);

        assert_eq!(
            fx.ledger
                .record_usage(&fx.agent, &session, 100)
                .unwrap_err(),
            LedgerError::Unauthorized
        );
    }

    #[test]
    fn usage_beyond_deposit_fails_and_leaves_state_untouched() {
        let fx = Fixture::new();
        fx.register("demo", 1000);
        let session = fx.open("demo", 10_000, 3600, 1);

        fx.ledger
            .record_usage(&fx.provider, &session, 9_000)
            .unwrap();
        assert_eq!(
            fx.ledger
                .record_usage(&fx.provider, &session, 1_001)
                .unwrap_err(),
            LedgerError::UsageExceedsDeposit
        );

        let s = fx.ledger.session(&session).unwrap().unwrap();
        assert_eq!(s.used, 9_000);
        assert_eq!(s.usage_count, 1);
        let gw = fx.ledger.gateway_by_slug("demo").unwrap().unwrap();
        assert_eq!(gw.total_volume, 9_000);

        // Exact fill is allowed.
        fx.ledger
            .record_usage(&fx.provider, &session, 1_000)
            .unwrap();
        let s = fx.ledger.session(&session).unwrap().unwrap();
        assert_eq!(s.used, 10_000);
    }

    #[test]
    fn usage_addition_overflow_is_checked() {
        let fx = Fixture::new();
        fx.register("demo", 1000);
        let session = fx.open("demo", u64::MAX, 3600, 1);

        fx.ledger.record_usage(&fx.provider, &session, 1).unwrap();
        assert_eq!(
            fx.ledger
                .record_usage(&fx.provider, &session, u64::MAX)
                .unwrap_err(),
            LedgerError::UsageExceedsDeposit
        );
    }

    #[test]
    fn overdue_usage_expires_the_session() {
        let fx = Fixture::new();
        fx.register("demo", 1000);
        let session = fx.open("demo", 100_000, 3600, 1);
        fx.ledger
            .record_usage(&fx.provider, &session, 100)
            .unwrap();

        fx.clock.advance(3600);
        assert_eq!(
            fx.ledger
                .record_usage(&fx.provider, &session, 100)
                .unwrap_err(),
            LedgerError::SessionExpired
        );

        // The reclassification is persisted and terminal.
        let s = fx.ledger.session(&session).unwrap().unwrap();
        assert_eq!(s.state, SessionState::Expired);
        assert_eq!(s.used, 100);

        assert_eq!(
            fx.ledger
                .settle_session(&fx.provider, &session)
                .unwrap_err(),
            LedgerError::SessionNotActive
        );
        assert_eq!(
            fx.ledger.cancel_session(&fx.agent, &session).unwrap_err(),
            LedgerError::SessionNotActive
        );
        assert!(fx.proofs().is_empty());
    }

    #[test]
    fn overdue_untouched_session_can_still_settle() {
        // Settlement has no expiry gate; only a usage access persists
        // the Expired state.
        let fx = Fixture::new();
        fx.register("demo", 1000);
        let session = fx.open("demo", 100_000, 3600, 1);
        fx.ledger
            .record_usage(&fx.provider, &session, 2_500)
            .unwrap();

        fx.clock.advance(7200);
        let proof = fx.ledger.settle_session(&fx.agent, &session).unwrap();
        assert_eq!(proof.used_amount, 2_500);
    }

    #[test]
    fn settle_emits_exactly_one_proof() {
        let fx = Fixture::new();
        fx.register("demo", 1000);
        let session = fx.open("demo", 100_000, 3600, 1);
        fx.ledger
            .record_usage(&fx.provider, &session, 15_000)
            .unwrap();

        let settler = AccountId::from_raw([7; 32]); // any caller may settle
        let proof = fx.ledger.settle_session(&settler, &session).unwrap();

        assert_eq!(proof.session_id, session);
        assert_eq!(proof.used_amount, 15_000);
        assert_eq!(proof.agent_evm_address, EvmAddress::new([0xbb; 20]));
        assert_eq!(proof.provider_evm_address, EvmAddress::new([0xaa; 20]));
        assert_eq!(proof.timestamp, T0);

        assert_eq!(fx.proofs(), vec![proof]);

        let s = fx.ledger.session(&session).unwrap().unwrap();
        assert_eq!(s.state, SessionState::Settled);

        // Terminal: no double settlement, no further usage.
        assert_eq!(
            fx.ledger.settle_session(&settler, &session).unwrap_err(),
            LedgerError::SessionNotActive
        );
        assert_eq!(
            fx.ledger
                .record_usage(&fx.provider, &session, 1)
                .unwrap_err(),
            LedgerError::SessionNotActive
        );
        assert_eq!(fx.proofs().len(), 1);
    }

    #[test]
    fn cancel_only_before_any_usage() {
        let fx = Fixture::new();
        fx.register("demo", 1000);
        let s1 = fx.open("demo", 100_000, 3600, 1);
        let s2 = fx.open("demo", 100_000, 3600, 2);

        fx.ledger.record_usage(&fx.provider, &s1, 1).unwrap();
        assert_eq!(
            fx.ledger.cancel_session(&fx.agent, &s1).unwrap_err(),
            LedgerError::CannotCancelWithUsage
        );

        // Only the agent may cancel.
        assert_eq!(
            fx.ledger.cancel_session(&fx.provider, &s2).unwrap_err(),
            LedgerError::Unauthorized
        );

        fx.ledger.cancel_session(&fx.agent, &s2).unwrap();
        let s = fx.ledger.session(&s2).unwrap().unwrap();
        assert_eq!(s.state, SessionState::Cancelled);

        assert_eq!(
            fx.ledger.cancel_session(&fx.agent, &s2).unwrap_err(),
            LedgerError::SessionNotActive
        );
    }

    #[test]
    fn missing_session_is_reported() {
        let fx = Fixture::new();
        let ghost = StorageAddress::from_raw([0xee; 32]);
        assert!(matches!(
            fx.ledger.record_usage(&fx.provider, &ghost, 1).unwrap_err(),
            LedgerError::SessionNotFound { .. }
        ));
        assert!(matches!(
            fx.ledger.settle_session(&fx.provider, &ghost).unwrap_err(),
            LedgerError::SessionNotFound { .. }
        ));
        assert!(matches!(
            fx.ledger.cancel_session(&fx.agent, &ghost).unwrap_err(),
            LedgerError::SessionNotFound { .. }
        ));
        assert!(fx.ledger.session(&ghost).unwrap().is_none());
    }

    #[test]
    fn enumeration_tracks_registration_and_open_order() {
        let fx = Fixture::new();
        let gw1 = fx.register("alpha", 10);
        let gw2 = fx.register("beta", 20);
        let s1 = fx.open("alpha", 100, 60, 1);
        let s2 = fx.open("alpha", 100, 60, 2);

        let gateways = fx.ledger.gateways().unwrap();
        assert_eq!(
            gateways.iter().map(|(a, _)| *a).collect::<Vec<_>>(),
            vec![gw1, gw2]
        );

        let sessions = fx.ledger.sessions_for_gateway(&gw1).unwrap();
        assert_eq!(
            sessions.iter().map(|(a, _)| *a).collect::<Vec<_>>(),
            vec![s1, s2]
        );
        assert!(fx.ledger.sessions_for_gateway(&gw2).unwrap().is_empty());
    }

    #[test]
    fn demo_scenario_end_to_end() {
        // register "demo" at price 1000; open deposit=100_000 for 3600s;
        // record 5000 three times; settle → proof carries 15_000.
        let fx = Fixture::new();
        fx.register("demo", 1000);
        let session = fx.open("demo", 100_000, 3600, 1);

        for _ in 0..3 {
            fx.ledger
                .record_usage(&fx.provider, &session, 5000)
                .unwrap();
        }

        let proof = fx.ledger.settle_session(&fx.provider, &session).unwrap();
        assert_eq!(proof.used_amount, 15_000);

        assert_eq!(
            fx.ledger
                .record_usage(&fx.provider, &session, 5000)
                .unwrap_err(),
            LedgerError::SessionNotActive
        );
    }

    proptest! {
        #[test]
        fn used_never_exceeds_deposit(
            deposit in 1u64..=1_000_000,
            amounts in proptest::collection::vec(0u64..=200_000, 1..40),
        ) {
            let fx = Fixture::new();
            fx.register("prop", 1);
            let session = fx.open("prop", deposit, 3600, 1);

            let mut accepted = 0u64;
            for amount in amounts {
                match fx.ledger.record_usage(&fx.provider, &session, amount) {
                    Ok(()) => accepted += amount,
                    Err(LedgerError::UsageExceedsDeposit) => {}
                    Err(other) => prop_assert!(false, "unexpected error: {other}"),
                }
                let s = fx.ledger.session(&session).unwrap().unwrap();
                prop_assert!(s.used <= s.estimated_deposit);
                prop_assert_eq!(s.used, accepted);
            }

            let gw = fx.ledger.gateway_by_slug("prop").unwrap().unwrap();
            prop_assert_eq!(gw.total_volume, accepted);
        }
    }
}
