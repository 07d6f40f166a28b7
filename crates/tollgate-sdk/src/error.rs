use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("ledger error: {0}")]
    Ledger(#[from] tollgate_ledger::LedgerError),

    #[error("type error: {0}")]
    Types(#[from] tollgate_types::TypeError),
}

pub type SdkResult<T> = Result<T, SdkError>;
