use alloy::primitives::{Address, Bytes, U256, keccak256, wrap_fixed_bytes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

wrap_fixed_bytes! {
    /// An id of an issuance request handled by the issuer.
    ///
    /// Derived from the request contents and intake time, so it is stable for the lifetime of the
    /// request but unique across repeated requests from the same wallet.
    pub struct RequestId<32>;
}

wrap_fixed_bytes! {
    /// A reference to a batch mint transaction on the ledger.
    ///
    /// One [`TxRef`] covers a whole submitted partition, not a single wallet.
    pub struct TxRef<32>;
}

/// The kind of issuance a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssuanceType {
    /// One-time issuance, gated by a membership proof against the published commitment root.
    First,
    /// Recurring issuance, gated by the rolling eligibility window.
    Periodic,
}

impl IssuanceType {
    /// String form used in storage and logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Periodic => "periodic",
        }
    }
}

impl fmt::Display for IssuanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssuanceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(Self::First),
            "periodic" => Ok(Self::Periodic),
            other => Err(format!("unknown issuance type: {other}")),
        }
    }
}

/// Status of an [`IssuanceRequest`].
///
/// `Pending → InBatch → Submitted → Completed`, with escape edges `InBatch → Pending` (transient
/// failure), `InBatch → Failed` (permanent failure or retries exhausted) and `Pending →
/// Cancelled`. `Completed`, `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuanceStatus {
    /// Waiting to be picked up by a batch.
    Pending,
    /// Claimed by the scheduler for the current batch.
    InBatch,
    /// Submitted to the ledger, awaiting confirmation.
    Submitted,
    /// Confirmed on the ledger.
    Completed,
    /// Permanently failed.
    Failed,
    /// Cancelled by the requester before batching.
    Cancelled,
}

impl IssuanceStatus {
    /// Whether the status has no outgoing edges.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// String form used in storage and logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InBatch => "in_batch",
            Self::Submitted => "submitted",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for IssuanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssuanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_batch" => Ok(Self::InBatch),
            "submitted" => Ok(Self::Submitted),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown issuance status: {other}")),
        }
    }
}

/// An issuance request owned by the queue.
///
/// Requests are never deleted; terminal rows are retained for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceRequest {
    /// Id of the request.
    pub id: RequestId,
    /// Wallet to be credited.
    pub wallet: Address,
    /// Id of the platform user that owns the request.
    pub user_id: String,
    /// Device the request was submitted from.
    pub device_id: String,
    /// The kind of issuance requested.
    pub issuance_type: IssuanceType,
    /// Current status.
    pub status: IssuanceStatus,
    /// Membership proof, present for [`IssuanceType::First`] only.
    ///
    /// Frozen at enqueue time; the ledger contract remains the final authority at submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Bytes>,
    /// Number of transient settlement failures so far.
    pub retry_count: u32,
    /// Human-readable reason for the most recent failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Time the request entered the queue.
    pub created_at: DateTime<Utc>,
    /// Time the request reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    /// Ledger transaction reference. Set iff the status is `Submitted` or `Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<TxRef>,
}

impl IssuanceRequest {
    /// Creates a new `Pending` request.
    pub fn new(
        wallet: Address,
        user_id: String,
        device_id: String,
        issuance_type: IssuanceType,
        proof: Option<Bytes>,
    ) -> Self {
        let created_at = Utc::now();
        let id = Self::derive_id(wallet, issuance_type, &device_id, created_at);
        Self {
            id,
            wallet,
            user_id,
            device_id,
            issuance_type,
            status: IssuanceStatus::Pending,
            proof,
            retry_count: 0,
            last_error: None,
            created_at,
            processed_at: None,
            transaction_ref: None,
        }
    }

    fn derive_id(
        wallet: Address,
        issuance_type: IssuanceType,
        device_id: &str,
        created_at: DateTime<Utc>,
    ) -> RequestId {
        let mut buf = Vec::with_capacity(Address::len_bytes() + 1 + 16 + device_id.len());
        buf.extend_from_slice(wallet.as_slice());
        buf.push(matches!(issuance_type, IssuanceType::Periodic) as u8);
        buf.extend_from_slice(&created_at.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
        buf.extend_from_slice(device_id.as_bytes());
        RequestId(keccak256(&buf))
    }
}

/// An immutable record of a settled issuance.
///
/// Created exactly once per successful settlement; the durable source of truth for "has this
/// wallet already received first issuance" and "when was the last periodic issuance".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceRecord {
    /// Wallet that was credited.
    pub wallet: Address,
    /// The kind of issuance settled.
    pub issuance_type: IssuanceType,
    /// Amount credited.
    pub amount: U256,
    /// Ledger transaction reference of the settling batch.
    pub transaction_ref: TxRef,
    /// Device the originating request was submitted from.
    pub device_id: String,
    /// Settlement time.
    pub timestamp: DateTime<Utc>,
}
