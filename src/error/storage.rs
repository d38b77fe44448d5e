use super::{internal_rpc, invalid_params};
use crate::types::{IssuanceType, RequestId};
use alloy::primitives::Address;

/// Errors returned by the issuance store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A non-terminal request for the wallet and issuance type already exists.
    #[error("a {issuance_type} issuance request for wallet {wallet} is already in flight")]
    InFlightExists {
        /// The conflicting wallet.
        wallet: Address,
        /// The conflicting issuance type.
        issuance_type: IssuanceType,
    },
    /// A first issuance record for the wallet already exists.
    #[error("a first issuance record for wallet {0} already exists")]
    DuplicateFirstRecord(Address),
    /// The referenced request does not exist.
    #[error("unknown request {0}")]
    UnknownRequest(RequestId),
    /// A deserialization error occurred.
    #[error("a deserialization error occurred")]
    Serde(#[from] serde_json::Error),
    /// An internal error occurred.
    #[error("an internal error occurred")]
    Internal(#[from] eyre::Error),
}

impl From<StorageError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InFlightExists { .. }
            | StorageError::DuplicateFirstRecord(..)
            | StorageError::UnknownRequest(..) => invalid_params(err.to_string()),
            StorageError::Serde(..) | StorageError::Internal(..) => {
                internal_rpc("an internal error occurred")
            }
        }
    }
}
