use super::internal_rpc;
use jsonrpsee::core::ClientError;

/// JSON-RPC error code some ledger endpoints return when throttling.
const RATE_LIMIT_CODE: i32 = -32005;

/// Errors returned by the ledger adapter.
///
/// The settlement policy hangs off [`LedgerError::is_transient`]: transient errors revert the
/// batch to pending for a later retry, permanent errors fail it.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The request did not complete within the configured timeout.
    #[error("ledger request timed out")]
    Timeout,
    /// The endpoint could not be reached.
    #[error("ledger endpoint unreachable: {0}")]
    Unreachable(String),
    /// The endpoint is throttling requests.
    #[error("ledger endpoint rate limited")]
    RateLimited,
    /// The ledger rejected the submission at the contract level.
    #[error("ledger rejected submission: {reason}")]
    Rejected {
        /// Rejection reason reported by the ledger.
        reason: String,
    },
    /// Any other client-side RPC failure.
    #[error(transparent)]
    Client(ClientError),
    /// An internal error occurred.
    #[error(transparent)]
    Internal(#[from] eyre::Error),
}

impl LedgerError {
    /// Whether the settlement loop should retry after this error.
    ///
    /// Only a contract-level rejection is permanent; everything else is assumed to be an endpoint
    /// or transport problem that a later tick against a healthy endpoint can recover from.
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

impl From<ClientError> for LedgerError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::RequestTimeout => Self::Timeout,
            ClientError::Transport(err) => Self::Unreachable(err.to_string()),
            ClientError::Call(obj) if obj.code() == RATE_LIMIT_CODE => Self::RateLimited,
            ClientError::Call(obj) => Self::Rejected { reason: obj.message().to_string() },
            other => Self::Client(other),
        }
    }
}

impl From<LedgerError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(_: LedgerError) -> Self {
        internal_rpc("an internal error occurred")
    }
}
