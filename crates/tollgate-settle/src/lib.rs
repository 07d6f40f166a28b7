//! Settlement emission for tollgate.
//!
//! The [`SettlementHub`] sits behind the ledger's `ProofSink` seam. Every
//! settled session produces exactly one [`SettlementProof`]; the hub appends
//! it to an immutable in-process log and fans it out to subscribers (the
//! cross-chain relay being the intended consumer). Delivery is at-least-once:
//! late subscribers replay the log, live ones drain a broadcast channel, and
//! consumers dedupe by `session_id`.

pub mod hub;

pub use hub::{HubConfig, ProofFilter, ProofStream, SettlementHub, SubscriptionId};
pub use tollgate_types::{ProofId, SettlementProof};
