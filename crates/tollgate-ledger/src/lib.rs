//! Prepaid-session ledger core for tollgate.
//!
//! This crate is the heart of tollgate. It provides:
//! - `Gateway` and `Session` records with discriminator-tagged encoding
//! - The session state machine (open → usage accrual → settle/cancel/expire)
//! - `GatewayRegistry` / `SessionLedger` / `LedgerReader` trait boundaries
//! - `InMemoryLedger`: an address-keyed store implementing the six operations
//! - `ProofSink`: the seam through which settlement proofs leave the ledger
//! - `LedgerAuditor`: global invariant re-checks over a live store

pub mod audit;
pub mod clock;
pub mod error;
pub mod memory;
pub mod records;
pub mod traits;

pub use audit::{AuditReport, AuditViolation, LedgerAuditor, ViolationKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::LedgerError;
pub use memory::InMemoryLedger;
pub use records::{Gateway, RecordKind, Session, SessionState, MAX_SLUG_LEN};
pub use traits::{GatewayRegistry, LedgerReader, NullSink, ProofSink, SessionLedger};
