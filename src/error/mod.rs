//! Issuer error types.

use jsonrpsee::types::error::{ErrorObject, INTERNAL_ERROR_CODE, INVALID_PARAMS_CODE};

mod intake;
pub use intake::IntakeError;

mod ledger;
pub use ledger::LedgerError;

mod storage;
pub use storage::StorageError;

/// Application error codes surfaced to RPC callers on intake rejection.
pub mod codes {
    /// A non-terminal request for the same wallet and issuance type already exists.
    pub const ALREADY_IN_FLIGHT: i32 = -32021;
    /// The wallet failed eligibility verification.
    pub const NOT_ELIGIBLE: i32 = -32022;
    /// The wallet already holds a record for the requested issuance.
    pub const ALREADY_ISSUED: i32 = -32023;
    /// The device is not bound to the wallet.
    pub const DEVICE_MISMATCH: i32 = -32024;
}

/// Builds an invalid-params RPC error with the given message.
pub(crate) fn invalid_params(msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned::<()>(INVALID_PARAMS_CODE, msg.into(), None)
}

/// Builds an internal RPC error with the given message.
pub(crate) fn internal_rpc(msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned::<()>(INTERNAL_ERROR_CODE, msg.into(), None)
}

/// Builds an RPC error with an application error code.
pub(crate) fn app_error(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned::<()>(code, msg.into(), None)
}
