//! Scheduler-facing constants for transaction sync.
//!
//! The engine does not self-schedule; an external task scheduler re-invokes
//! `sync_transactions` on demand or on a cadence and honors `has_more`.

/// Advisory-lock staleness window in seconds. An `in_progress` item older
/// than this is treated as abandoned by a crashed worker and may be re-locked.
pub const SYNC_STALENESS_WINDOW_SECS: i64 = 300;

/// Recovery attempts allowed per broken session before the engine stops
/// retrying and demands manual remediation.
pub const SYNC_MAX_RECOVERY_ATTEMPTS: i32 = 3;

/// Suggested scheduler cadence in seconds for items with `has_more` pending.
pub const SYNC_CONTINUATION_INTERVAL_SECS: u64 = 5;

/// Suggested scheduler cadence in seconds for steady-state polling.
pub const SYNC_POLL_INTERVAL_SECS: u64 = 60 * 60 * 4;
