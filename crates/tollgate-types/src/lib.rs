//! Foundation types for the tollgate prepaid-session ledger.
//!
//! This crate provides the identity, addressing, and settlement-proof types
//! used throughout the tollgate system. Every other tollgate crate depends
//! on `tollgate-types`.
//!
//! # Key Types
//!
//! - [`AccountId`] — Caller identity derived from key material (BLAKE3)
//! - [`EvmAddress`] — Fixed 20-byte external-chain payout address
//! - [`StorageAddress`] — Derived storage slot for gateway/session records
//! - [`AddressSeed`] — Structured key fed to the address deriver
//! - [`SettlementProof`] — Immutable proof record emitted at settlement

pub mod address;
pub mod error;
pub mod evm;
pub mod identity;
pub mod proof;

pub use address::{AddressSeed, StorageAddress};
pub use error::TypeError;
pub use evm::EvmAddress;
pub use identity::{AccountId, KeyMaterial};
pub use proof::{ProofId, SettlementProof};
