//! High-level SDK for the tollgate prepaid-session ledger.
//!
//! Provides a unified, typed API over the ledger core and the settlement
//! hub. This is the main entry point for applications embedding tollgate.

pub mod client;
pub mod error;

pub use client::{OpenedSession, Tollgate};
pub use error::{SdkError, SdkResult};

// Re-export key types
pub use tollgate_ledger::{AuditReport, Gateway, Session, SessionState};
pub use tollgate_settle::{ProofFilter, ProofStream, SubscriptionId};
pub use tollgate_types::{AccountId, EvmAddress, SettlementProof, StorageAddress};
