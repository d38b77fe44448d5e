use super::{LedgerError, StorageError, app_error, codes, internal_rpc, invalid_params};
use crate::types::RequestId;

/// Errors returned when an issuance request is rejected at intake.
///
/// All rejections are synchronous; no queue state is mutated beyond the rejected attempt being
/// logged.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// A non-terminal request for the same wallet and issuance type already exists.
    #[error("an issuance request for this wallet is already in flight")]
    AlreadyInFlight,
    /// The wallet failed eligibility verification.
    #[error("wallet is not eligible for the requested issuance")]
    NotEligible,
    /// The wallet already holds an issuance record that the request would duplicate.
    #[error("wallet has already received this issuance")]
    AlreadyIssued,
    /// The device the request came from is not bound to the wallet.
    #[error("device is not bound to this wallet")]
    DeviceMismatch,
    /// The referenced request does not exist.
    #[error("unknown request {0}")]
    UnknownRequest(RequestId),
    /// The commitment root could not be read from the ledger.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Storage error.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// An internal error occurred.
    #[error(transparent)]
    Internal(#[from] eyre::Error),
}

impl From<IntakeError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::AlreadyInFlight => app_error(codes::ALREADY_IN_FLIGHT, err.to_string()),
            IntakeError::NotEligible => app_error(codes::NOT_ELIGIBLE, err.to_string()),
            IntakeError::AlreadyIssued => app_error(codes::ALREADY_ISSUED, err.to_string()),
            IntakeError::DeviceMismatch => app_error(codes::DEVICE_MISMATCH, err.to_string()),
            IntakeError::UnknownRequest(..) => invalid_params(err.to_string()),
            IntakeError::Storage(inner) => inner.into(),
            IntakeError::Ledger(..) | IntakeError::Internal(..) => {
                internal_rpc("an internal error occurred")
            }
        }
    }
}
