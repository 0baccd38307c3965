// crates/querygate-core/src/core/time.rs
// ============================================================================
// Module: QueryGate Time Model
// Description: Millisecond timestamps for session and execution records.
// Purpose: Represent "not yet happened" as zero, matching record semantics.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Records use unix-epoch milliseconds where zero means the event has not
//! occurred yet (a running execution has a zero finish timestamp). Retention
//! trimming relies on that convention to tell open entries from finished ones.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Unix epoch milliseconds; zero means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Sentinel for an event that has not happened yet.
    pub const UNSET: Self = Self(0);

    /// Creates a timestamp from unix milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Reads the wall clock. Never returns [`Self::UNSET`].
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        Self(millis.max(1))
    }

    /// Returns the raw millisecond value.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns true when the timestamp has not been set.
    #[must_use]
    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }
}
