//! Core types for the issuer.

mod issuance;
pub use issuance::{
    IssuanceRecord, IssuanceRequest, IssuanceStatus, IssuanceType, RequestId, TxRef,
};

pub mod rpc;
