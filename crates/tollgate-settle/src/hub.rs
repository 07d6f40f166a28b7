use std::fmt;
use std::sync::RwLock;

use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use tollgate_ledger::ProofSink;
use tollgate_types::{SettlementProof, StorageAddress};

/// Filter for subscribing to a subset of settlement proofs.
#[derive(Clone, Debug, Default)]
pub struct ProofFilter {
    /// If set, only proofs for these sessions are delivered.
    pub sessions: Option<Vec<StorageAddress>>,
}

impl ProofFilter {
    /// Returns `true` if the given proof matches this filter.
    pub fn matches(&self, proof: &SettlementProof) -> bool {
        match &self.sessions {
            Some(sessions) => sessions.contains(&proof.session_id),
            None => true,
        }
    }
}

/// A broadcast channel receiver for settlement proofs.
pub type ProofStream = broadcast::Receiver<SettlementProof>;

/// Handle returned by [`SettlementHub::subscribe`]; pass it back to
/// [`SettlementHub::unsubscribe`] to detach.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

/// Internal subscriber: a filter paired with a broadcast sender.
struct Subscriber {
    id: SubscriptionId,
    filter: ProofFilter,
    sender: broadcast::Sender<SettlementProof>,
}

/// Configuration for the [`SettlementHub`].
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Capacity of per-subscriber broadcast channels. A consumer that lags
    /// past this loses the oldest entries and must replay from the log.
    pub channel_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Append-only settlement-proof log with subscriber fan-out.
///
/// Publishing never blocks and never fails: the log append is the source of
/// truth, fan-out is best-effort, and a closed or lagging receiver only
/// affects that subscriber. The proof log is immutable once written.
pub struct SettlementHub {
    config: HubConfig,
    log: RwLock<Vec<SettlementProof>>,
    subscribers: RwLock<Vec<Subscriber>>,
}

impl SettlementHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            log: RwLock::new(Vec::new()),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Append a proof to the log and route it to matching subscribers.
    pub fn emit(&self, proof: &SettlementProof) {
        // Log first: the append-only record must exist before any
        // subscriber can observe the proof.
        self.log
            .write()
            .expect("hub log lock poisoned")
            .push(proof.clone());

        let mut subs = self.subscribers.write().expect("hub router lock poisoned");
        subs.retain(|sub| {
            if sub.filter.matches(proof) {
                // If send fails (no receivers), the subscriber is stale.
                sub.sender.send(proof.clone()).is_ok()
            } else {
                // Keep non-matching subscribers unless their channel closed.
                sub.sender.receiver_count() > 0
            }
        });

        debug!(id = %proof.id(), session = %proof.session_id, "settlement proof emitted");
    }

    /// Subscribe to proofs matching the given filter.
    pub fn subscribe(&self, filter: ProofFilter) -> (SubscriptionId, ProofStream) {
        let (tx, rx) = broadcast::channel(self.config.channel_capacity);
        let id = SubscriptionId(Uuid::new_v4());
        self.subscribers
            .write()
            .expect("hub router lock poisoned")
            .push(Subscriber {
                id,
                filter,
                sender: tx,
            });
        info!(subscription = ?id, "relay subscribed");
        (id, rx)
    }

    /// Detach a subscription. Returns `true` if it was still registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.write().expect("hub router lock poisoned");
        let before = subs.len();
        subs.retain(|sub| sub.id != id);
        let removed = subs.len() < before;
        if removed {
            info!(subscription = ?id, "relay unsubscribed");
        }
        removed
    }

    /// Replay the full proof log (for late or recovering consumers).
    pub fn proofs(&self) -> Vec<SettlementProof> {
        self.log.read().expect("hub log lock poisoned").clone()
    }

    /// Number of proofs emitted so far.
    pub fn proof_count(&self) -> usize {
        self.log.read().expect("hub log lock poisoned").len()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .expect("hub router lock poisoned")
            .len()
    }
}

impl Default for SettlementHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl ProofSink for SettlementHub {
    fn publish(&self, proof: &SettlementProof) {
        self.emit(proof);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_types::EvmAddress;

    fn proof(session_byte: u8, used: u64) -> SettlementProof {
        SettlementProof {
            session_id: StorageAddress::from_raw([session_byte; 32]),
            agent_evm_address: EvmAddress::new([1; 20]),
            provider_evm_address: EvmAddress::new([2; 20]),
            used_amount: used,
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn emit_appends_to_log() {
        let hub = SettlementHub::default();
        hub.emit(&proof(1, 100));
        hub.emit(&proof(2, 200));

        let log = hub.proofs();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].used_amount, 100);
        assert_eq!(log[1].used_amount, 200);
        assert_eq!(hub.proof_count(), 2);
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        let hub = SettlementHub::default();
        hub.emit(&proof(1, 1));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn subscriber_receives_matching_proofs() {
        let hub = SettlementHub::default();
        let target = StorageAddress::from_raw([7; 32]);

        let (_id, mut stream) = hub.subscribe(ProofFilter {
            sessions: Some(vec![target]),
        });
        assert_eq!(hub.subscriber_count(), 1);

        hub.emit(&proof(7, 500));
        hub.emit(&proof(8, 600)); // filtered out

        let received = stream.try_recv().unwrap();
        assert_eq!(received.session_id, target);
        assert_eq!(received.used_amount, 500);
        assert!(stream.try_recv().is_err());
    }

    #[test]
    fn empty_filter_matches_everything() {
        let hub = SettlementHub::default();
        let (_id, mut stream) = hub.subscribe(ProofFilter::default());

        hub.emit(&proof(1, 1));
        hub.emit(&proof(2, 2));

        assert_eq!(stream.try_recv().unwrap().used_amount, 1);
        assert_eq!(stream.try_recv().unwrap().used_amount, 2);
    }

    #[test]
    fn unsubscribe_stops_delivery_without_touching_others() {
        let hub = SettlementHub::default();
        let (id_a, mut stream_a) = hub.subscribe(ProofFilter::default());
        let (_id_b, mut stream_b) = hub.subscribe(ProofFilter::default());

        assert!(hub.unsubscribe(id_a));
        assert!(!hub.unsubscribe(id_a)); // idempotent: already gone
        assert_eq!(hub.subscriber_count(), 1);

        hub.emit(&proof(1, 42));

        // Detached sender is dropped; the old stream reports closure.
        assert!(matches!(
            stream_a.try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        ));
        assert_eq!(stream_b.try_recv().unwrap().used_amount, 42);
    }

    #[test]
    fn dropped_receiver_is_pruned_on_next_emit() {
        let hub = SettlementHub::default();
        let (_id, stream) = hub.subscribe(ProofFilter::default());
        drop(stream);

        hub.emit(&proof(1, 1));
        assert_eq!(hub.subscriber_count(), 0);
        // The log is unaffected by subscriber churn.
        assert_eq!(hub.proof_count(), 1);
    }

    #[test]
    fn log_replay_serves_late_consumers() {
        let hub = SettlementHub::default();
        hub.emit(&proof(1, 10));
        hub.emit(&proof(2, 20));

        // A consumer arriving after the fact replays the log and dedupes
        // by session_id downstream.
        let replay = hub.proofs();
        assert_eq!(replay.len(), 2);
        assert!(replay[0].verify(&replay[0].id()));
    }

    #[test]
    fn lagging_subscriber_does_not_block_emission() {
        let hub = SettlementHub::new(HubConfig {
            channel_capacity: 2,
        });
        let (_id, mut stream) = hub.subscribe(ProofFilter::default());

        for i in 0..5u8 {
            hub.emit(&proof(i, i as u64));
        }
        assert_eq!(hub.proof_count(), 5);

        // The channel lagged; the consumer is told, then sees the newest
        // entries and can replay the rest from the log.
        assert!(matches!(
            stream.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));
    }

    #[test]
    fn concurrent_emit_is_safe() {
        use std::sync::Arc;
        use std::thread;

        let hub = Arc::new(SettlementHub::default());
        let mut handles = Vec::new();
        for i in 0u8..4 {
            let hub = Arc::clone(&hub);
            handles.push(thread::spawn(move || {
                for j in 0..25u64 {
                    hub.emit(&proof(i, j));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(hub.proof_count(), 100);
    }
}
