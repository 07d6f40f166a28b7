use tollgate_types::TypeError;

/// Errors produced by ledger operations.
///
/// Input-validation errors mean the caller must correct and resubmit.
/// `Unauthorized` is fatal to that caller. State-consistency errors signal
/// a logical conflict with current ledger state; callers should re-read
/// before retrying. Nothing here is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    // -- input validation --
    #[error("gateway slug cannot be empty")]
    EmptySlug,

    #[error("gateway slug too long: {len} bytes (max {max})")]
    SlugTooLong { len: usize, max: usize },

    #[error("price must be greater than 0")]
    InvalidPrice,

    #[error("duration must be greater than 0")]
    InvalidDuration,

    #[error("deposit must be greater than 0")]
    InvalidDeposit,

    // -- authorization --
    #[error("caller is not authorized to perform this action")]
    Unauthorized,

    // -- state consistency --
    #[error("gateway not found or inactive")]
    GatewayNotActive,

    #[error("session is not active")]
    SessionNotActive,

    #[error("session has expired")]
    SessionExpired,

    #[error("usage amount exceeds estimated deposit")]
    UsageExceedsDeposit,

    #[error("cannot cancel a session with recorded usage")]
    CannotCancelWithUsage,

    // -- storage --
    #[error("gateway already registered at {address}")]
    GatewayExists { address: String },

    #[error("session already open at {address}")]
    SessionExists { address: String },

    #[error("no gateway registered under slug {slug:?}")]
    GatewayNotFound { slug: String },

    #[error("no session at {address}")]
    SessionNotFound { address: String },

    #[error("record encoding error: {0}")]
    Codec(String),

    #[error("ledger lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Derivation(#[from] TypeError),
}
