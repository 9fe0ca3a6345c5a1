//! Error taxonomy for the replay engine, matching the recoverable/fatal
//! split in the design: most variants are handled locally by the
//! producing component, a few unwind to the main loop.

use thiserror::Error;

pub type CResult<T> = Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid option, missing file, incompatible flags. Always fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Bad block header, bad checksum after retries, impossible field
    /// length. Fatal unless `on-error-continue` is set.
    #[error("corrupt log: {0}")]
    CorruptLog(String),

    /// A required archived log cannot be located. Fatal.
    #[error("log unavailable: {0}")]
    LogUnavailable(String),

    /// An online log's sequence has advanced past what the reader is
    /// consuming, and no archived copy appeared within the bounded wait.
    #[error("log overwritten: {0}")]
    LogOverwritten(String),

    /// A record references an unknown object id. Not fatal unless strict.
    #[error("schema miss: object {0}")]
    SchemaMiss(u32),

    /// Arena cap hit mid-transaction; the transaction is marked overflow.
    #[error("transaction too large: xid {0}")]
    TransactionTooLarge(String),

    /// Stop was requested; the reader finished its current record cleanly.
    #[error("cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error must unwind to the main loop and terminate the
    /// process (after writing a final checkpoint if safe), per the
    /// propagation policy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_)
                | Error::LogUnavailable(_)
                | Error::LogOverwritten(_)
                | Error::Internal(_)
        )
    }
}
