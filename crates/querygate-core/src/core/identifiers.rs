// crates/querygate-core/src/core/identifiers.rs
// ============================================================================
// Module: QueryGate Identifiers
// Description: Opaque identifiers for sessions, executions, and job groups.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: rand, serde
// ============================================================================

//! ## Overview
//! Sessions and executions are addressed by opaque string identifiers that
//! serialize transparently. Identifiers are issued by [`IdGenerator`], which
//! combines a boot-scoped random seed with a monotonic counter so IDs never
//! repeat within a process lifetime and are unlikely to collide across restarts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Client session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new session identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Statement execution identifier, independent of the owning session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(String);

impl ExecutionId {
    /// Creates a new execution identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ExecutionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ExecutionId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Engine job group tag. Every engine job spawned on behalf of an execution
/// carries its group, which is how job-start events and cancellation find it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobGroupId(String);

impl JobGroupId {
    /// Creates a new job group identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for JobGroupId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<&ExecutionId> for JobGroupId {
    fn from(value: &ExecutionId) -> Self {
        Self::new(value.as_str())
    }
}

// ============================================================================
// SECTION: Identifier Generation
// ============================================================================

/// Boot-scoped identifier generator.
///
/// # Invariants
/// - Issued identifiers are unique within the process lifetime.
#[derive(Debug)]
pub struct IdGenerator {
    /// Prefix included in every generated identifier.
    prefix: &'static str,
    /// Boot-scoped random identifier for entropy.
    boot_id: u64,
    /// Monotonic counter for IDs issued in this process.
    counter: AtomicU64,
}

impl IdGenerator {
    /// Creates a new generator with the given prefix.
    #[must_use]
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            boot_id: OsRng.next_u64(),
            counter: AtomicU64::new(1),
        }
    }

    /// Issues the next raw identifier string.
    #[must_use]
    pub fn issue(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:016x}-{seq:08x}", self.prefix, self.boot_id)
    }

    /// Issues a new session identifier.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        SessionId::new(self.issue())
    }

    /// Issues a new execution identifier.
    #[must_use]
    pub fn execution_id(&self) -> ExecutionId {
        ExecutionId::new(self.issue())
    }
}

#[cfg(test)]
mod tests {
    use super::IdGenerator;
    use super::JobGroupId;

    #[test]
    fn generator_issues_distinct_prefixed_ids() {
        let generator = IdGenerator::new("exec");
        let first = generator.execution_id();
        let second = generator.execution_id();
        assert_ne!(first, second);
        assert!(first.as_str().starts_with("exec-"));
    }

    #[test]
    fn job_group_follows_execution_id() {
        let generator = IdGenerator::new("exec");
        let id = generator.execution_id();
        assert_eq!(JobGroupId::from(&id).as_str(), id.as_str());
    }
}
