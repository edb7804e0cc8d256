use thiserror::Error;

#[derive(Debug, Error)]
pub enum PiApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The destination already has an open app-to-user payment: {0}")]
    OngoingPayment(String),
    #[error("No payment exists with identifier {0}")]
    PaymentNotFound(String),
    #[error("The client is running in mock mode and cannot perform this call")]
    MockMode,
}

impl PiApiError {
    /// Transport failures and server-side errors are worth retrying; everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            PiApiError::RestResponseError(_) => true,
            PiApiError::QueryError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("No wallet seed has been configured")]
    MissingSeed,
    #[error("The wallet seed is not a valid ed25519 seed: {0}")]
    InvalidSeed(String),
    #[error("Could not reach the ledger: {0}")]
    SubmissionError(String),
    #[error("The ledger rejected the transaction. Error {status}. {message}")]
    TransactionRejected { status: u16, message: String },
    #[error("Could not deserialize ledger response: {0}")]
    JsonError(String),
}
