//! Issuer constants.

use std::time::Duration;

/// Default maximum number of requests claimed per batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

/// Default scheduler tick interval.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(15);

/// Default queue depth at which a tick is triggered ahead of the timer.
pub const DEFAULT_QUEUE_DEPTH_THRESHOLD: usize = 25;

/// Default maximum number of transient-failure retries before a request is failed.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default number of consecutive failures after which an endpoint is marked unhealthy.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Default interval between reinstatement probes of unhealthy endpoints.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Default timeout for a single ledger request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of consecutive all-endpoints-down ticks before the operator alert fires.
pub const DEFAULT_EXHAUSTED_TICK_ALERT: u32 = 3;

/// Default issuance amount, in base units (18 decimals).
pub const DEFAULT_ISSUANCE_AMOUNT: u128 = 100_000_000_000_000_000_000;

/// Length of the periodic eligibility window, in days.
///
/// A wallet becomes eligible for another periodic issuance exactly this many days after its most
/// recent one.
pub const PERIODIC_WINDOW_DAYS: i64 = 365;

/// Maximum accepted membership proof depth. Longer proofs are rejected as malformed.
pub const MAX_PROOF_DEPTH: usize = 32;

/// Maximum confirmation poll attempts per partition per tick.
pub const CONFIRMATION_MAX_ATTEMPTS: u32 = 5;

/// Initial backoff between confirmation polls. Doubles on every attempt.
pub const CONFIRMATION_BACKOFF: Duration = Duration::from_millis(500);

/// How long a fetched commitment root is reused before it is re-read from the ledger.
pub const COMMITMENT_ROOT_TTL: Duration = Duration::from_secs(60);
