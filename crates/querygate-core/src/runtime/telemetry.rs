// crates/querygate-core/src/runtime/telemetry.rs
// ============================================================================
// Module: QueryGate Telemetry Tracker
// Description: Bounded registries of session and execution records.
// Purpose: Keep an operational history in bounded memory for observability.
// Dependencies: crate::{core, interfaces}, tracing
// ============================================================================

//! ## Overview
//! The tracker keeps two insertion-ordered registries under one coarse lock and
//! is fed by lifecycle events from the session registry and the executor.
//! When a registry grows past its limit, up to `max(limit / 10, 1)` finished
//! entries are removed from the front of insertion order. Open sessions and
//! unfinished executions are never evicted, so a registry may temporarily
//! exceed its limit.
//!
//! The tracker is an explicit context object: created when the gateway
//! starts, stopped when it shuts down. Events arriving after [`TelemetryTracker::stop`]
//! are dropped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use tracing::debug;

use crate::core::identifiers::ExecutionId;
use crate::core::identifiers::JobGroupId;
use crate::core::identifiers::SessionId;
use crate::core::records::ErrorDetail;
use crate::core::records::ExecutionRecord;
use crate::core::records::SessionRecord;
use crate::core::state::ExecutionState;
use crate::core::time::Timestamp;
use crate::interfaces::JobListener;
use crate::runtime::audit::LifecycleAuditEvent;
use crate::runtime::audit::LifecycleAuditEventParams;
use crate::runtime::audit::LifecycleAuditSink;
use crate::runtime::audit::LifecycleEventKind;
use crate::runtime::audit::NoopAuditSink;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default number of retained session records.
pub const DEFAULT_MAX_RETAINED_SESSIONS: usize = 200;
/// Default number of retained execution records.
pub const DEFAULT_MAX_RETAINED_EXECUTIONS: usize = 200;

/// Retention limits for the telemetry registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Session records kept before trimming.
    pub max_retained_sessions: usize,
    /// Execution records kept before trimming.
    pub max_retained_executions: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_retained_sessions: DEFAULT_MAX_RETAINED_SESSIONS,
            max_retained_executions: DEFAULT_MAX_RETAINED_EXECUTIONS,
        }
    }
}

// ============================================================================
// SECTION: Ordered Registry
// ============================================================================

/// Record that knows whether it may be evicted.
trait Retainable {
    /// Returns true once the record has a finish timestamp.
    fn is_finished(&self) -> bool;
}

impl Retainable for SessionRecord {
    fn is_finished(&self) -> bool {
        !self.is_open()
    }
}

impl Retainable for ExecutionRecord {
    fn is_finished(&self) -> bool {
        !self.is_unfinished()
    }
}

/// Insertion-ordered map.
struct OrderedRegistry<K, V> {
    /// Next insertion sequence.
    next_seq: u64,
    /// Keys by insertion sequence.
    order: BTreeMap<u64, K>,
    /// Records with their insertion sequence.
    entries: HashMap<K, (u64, V)>,
}

impl<K, V> OrderedRegistry<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone + Retainable,
{
    /// Creates an empty registry.
    fn new() -> Self {
        Self {
            next_seq: 0,
            order: BTreeMap::new(),
            entries: HashMap::new(),
        }
    }

    /// Inserts or replaces a record; replacement keeps the original position.
    fn insert(&mut self, key: K, value: V) {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.1 = value;
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.entries.insert(key, (seq, value));
    }

    /// Returns a mutable record.
    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key).map(|(_, value)| value)
    }

    /// Returns a record.
    fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|(_, value)| value)
    }

    /// Iterates records in insertion order.
    fn values(&self) -> impl Iterator<Item = &V> {
        self.order.values().filter_map(|key| self.get(key))
    }

    /// Iterates records mutably, in no particular order.
    fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.values_mut().map(|(_, value)| value)
    }

    /// Returns the number of records.
    fn len(&self) -> usize {
        self.entries.len()
    }

    /// Evicts finished records from the front when over `limit`.
    fn trim(&mut self, limit: usize) -> usize {
        if self.entries.len() <= limit {
            return 0;
        }
        let batch = (limit / 10).max(1);
        let victims: Vec<(u64, K)> = self
            .order
            .iter()
            .filter(|(_, key)| self.get(key).is_some_and(|record| record.is_finished()))
            .take(batch)
            .map(|(seq, key)| (*seq, key.clone()))
            .collect();
        for (seq, key) in &victims {
            self.order.remove(seq);
            self.entries.remove(key);
        }
        victims.len()
    }
}

// ============================================================================
// SECTION: Tracker
// ============================================================================

/// Mutable tracker state behind the coarse lock.
struct TrackerState {
    /// Set by [`TelemetryTracker::stop`].
    stopped: bool,
    /// Session records.
    sessions: OrderedRegistry<SessionId, SessionRecord>,
    /// Execution records.
    executions: OrderedRegistry<ExecutionId, ExecutionRecord>,
}

/// Process-wide bounded telemetry tracker.
///
/// # Invariants
/// - Open sessions and unfinished executions are never evicted.
/// - Events after [`Self::stop`] are dropped.
pub struct TelemetryTracker {
    /// Retention limits.
    retention: RetentionConfig,
    /// Registries and lifecycle flag.
    state: Mutex<TrackerState>,
    /// Sink receiving every applied event.
    audit: Arc<dyn LifecycleAuditSink>,
}

impl TelemetryTracker {
    /// Creates a started tracker that forwards events to `audit`.
    #[must_use]
    pub fn new(retention: RetentionConfig, audit: Arc<dyn LifecycleAuditSink>) -> Self {
        Self {
            retention,
            state: Mutex::new(TrackerState {
                stopped: false,
                sessions: OrderedRegistry::new(),
                executions: OrderedRegistry::new(),
            }),
            audit,
        }
    }

    /// Creates a started tracker without an audit sink.
    #[must_use]
    pub fn without_audit(retention: RetentionConfig) -> Self {
        Self::new(retention, Arc::new(NoopAuditSink))
    }

    /// Returns the retention limits.
    #[must_use]
    pub const fn retention(&self) -> RetentionConfig {
        self.retention
    }

    /// Stops the tracker; later events are dropped.
    pub fn stop(&self) {
        self.lock().stopped = true;
        debug!("telemetry tracker stopped");
    }

    /// Returns true after [`Self::stop`].
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Locks the state, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forwards an applied event to the audit sink.
    fn emit(&self, params: LifecycleAuditEventParams) {
        self.audit.record(&LifecycleAuditEvent::new(params));
    }

    // ------------------------------------------------------------------------
    // Session events
    // ------------------------------------------------------------------------

    /// Records a newly opened session.
    pub fn on_session_created(&self, session_id: &SessionId, user: &str, address: &str) {
        let mut state = self.lock();
        if state.stopped {
            return;
        }
        state.sessions.insert(
            session_id.clone(),
            SessionRecord {
                session_id: session_id.clone(),
                user: user.to_string(),
                address: address.to_string(),
                start_timestamp: Timestamp::now(),
                finish_timestamp: Timestamp::UNSET,
                total_executions: 0,
            },
        );
        state.sessions.trim(self.retention.max_retained_sessions);
        self.emit(LifecycleAuditEventParams {
            kind: LifecycleEventKind::SessionCreated,
            session_id: Some(session_id.clone()),
            execution_id: None,
            user: Some(user.to_string()),
            state: None,
            detail: Some(address.to_string()),
        });
    }

    /// Records a session close.
    pub fn on_session_closed(&self, session_id: &SessionId) {
        let mut state = self.lock();
        if state.stopped {
            return;
        }
        let Some(record) = state.sessions.get_mut(session_id) else {
            return;
        };
        record.finish_timestamp = Timestamp::now();
        let user = record.user.clone();
        state.sessions.trim(self.retention.max_retained_sessions);
        self.emit(LifecycleAuditEventParams {
            kind: LifecycleEventKind::SessionClosed,
            session_id: Some(session_id.clone()),
            execution_id: None,
            user: Some(user),
            state: None,
            detail: None,
        });
    }

    // ------------------------------------------------------------------------
    // Execution events
    // ------------------------------------------------------------------------

    /// Records a submitted statement and bumps its session's counter.
    pub fn on_statement_start(
        &self,
        execution_id: &ExecutionId,
        session_id: &SessionId,
        statement: &str,
        group_id: &JobGroupId,
        user: &str,
    ) {
        let mut state = self.lock();
        if state.stopped {
            return;
        }
        state.executions.insert(
            execution_id.clone(),
            ExecutionRecord {
                execution_id: execution_id.clone(),
                session_id: session_id.clone(),
                statement: statement.to_string(),
                group_id: group_id.clone(),
                user: user.to_string(),
                start_timestamp: Timestamp::now(),
                finish_timestamp: Timestamp::UNSET,
                close_timestamp: Timestamp::UNSET,
                plan: None,
                error: None,
                state: ExecutionState::Started,
                job_ids: Vec::new(),
            },
        );
        if let Some(session) = state.sessions.get_mut(session_id) {
            session.total_executions += 1;
        }
        state.executions.trim(self.retention.max_retained_executions);
        self.emit(LifecycleAuditEventParams {
            kind: LifecycleEventKind::StatementStart,
            session_id: Some(session_id.clone()),
            execution_id: Some(execution_id.clone()),
            user: Some(user.to_string()),
            state: Some(ExecutionState::Started),
            detail: None,
        });
    }

    /// Records a compiled statement and its plan.
    pub fn on_statement_parsed(&self, execution_id: &ExecutionId, plan: &str) {
        self.update_execution(execution_id, LifecycleEventKind::StatementParsed, None, |record| {
            record.plan = Some(plan.to_string());
            record.state = ExecutionState::Compiled;
        });
    }

    /// Records a canceled statement.
    pub fn on_statement_canceled(&self, execution_id: &ExecutionId) {
        self.update_execution(execution_id, LifecycleEventKind::StatementCanceled, None, |record| {
            record.finish_timestamp = Timestamp::now();
            record.state = ExecutionState::Canceled;
        });
    }

    /// Records a failed statement.
    pub fn on_statement_error(&self, execution_id: &ExecutionId, error: &ErrorDetail) {
        let detail = Some(error.message.clone());
        self.update_execution(execution_id, LifecycleEventKind::StatementError, detail, |record| {
            record.finish_timestamp = Timestamp::now();
            record.error = Some(error.clone());
            record.state = ExecutionState::Failed;
        });
    }

    /// Records a statement whose result is available.
    pub fn on_statement_finish(&self, execution_id: &ExecutionId) {
        self.update_execution(execution_id, LifecycleEventKind::StatementFinish, None, |record| {
            record.finish_timestamp = Timestamp::now();
            record.state = ExecutionState::Finished;
        });
    }

    /// Records a released execution.
    pub fn on_operation_closed(&self, execution_id: &ExecutionId) {
        self.update_execution(execution_id, LifecycleEventKind::OperationClosed, None, |record| {
            let now = Timestamp::now();
            if record.finish_timestamp.is_unset() {
                record.finish_timestamp = now;
            }
            record.close_timestamp = now;
            record.state = ExecutionState::Closed;
        });
    }

    /// Appends `job_id` to every execution whose group equals `group_id`.
    pub fn on_job_start(&self, job_id: &str, group_id: &JobGroupId) {
        let mut state = self.lock();
        if state.stopped {
            return;
        }
        let mut matched = Vec::new();
        for record in state.executions.values_mut() {
            if &record.group_id == group_id {
                record.job_ids.push(job_id.to_string());
                matched.push((record.session_id.clone(), record.execution_id.clone()));
            }
        }
        for (session_id, execution_id) in matched {
            self.emit(LifecycleAuditEventParams {
                kind: LifecycleEventKind::JobStart,
                session_id: Some(session_id),
                execution_id: Some(execution_id),
                user: None,
                state: None,
                detail: Some(job_id.to_string()),
            });
        }
    }

    /// Applies `update` to a tracked execution, then trims and audits.
    fn update_execution(
        &self,
        execution_id: &ExecutionId,
        kind: LifecycleEventKind,
        detail: Option<String>,
        update: impl FnOnce(&mut ExecutionRecord),
    ) {
        let mut state = self.lock();
        if state.stopped {
            return;
        }
        let Some(record) = state.executions.get_mut(execution_id) else {
            debug!(execution_id = %execution_id, "telemetry event for untracked execution");
            return;
        };
        update(record);
        let session_id = record.session_id.clone();
        let user = record.user.clone();
        let new_state = record.state;
        state.executions.trim(self.retention.max_retained_executions);
        self.emit(LifecycleAuditEventParams {
            kind,
            session_id: Some(session_id),
            execution_id: Some(execution_id.clone()),
            user: Some(user),
            state: Some(new_state),
            detail,
        });
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    /// Returns the number of open sessions.
    #[must_use]
    pub fn online_session_count(&self) -> usize {
        self.lock().sessions.values().filter(|record| record.is_open()).count()
    }

    /// Returns the number of running executions.
    #[must_use]
    pub fn total_running_count(&self) -> usize {
        self.lock().executions.values().filter(|record| record.state.is_running()).count()
    }

    /// Returns retained session records in insertion order.
    #[must_use]
    pub fn session_list(&self) -> Vec<SessionRecord> {
        self.lock().sessions.values().cloned().collect()
    }

    /// Returns one session record.
    #[must_use]
    pub fn session(&self, session_id: &SessionId) -> Option<SessionRecord> {
        self.lock().sessions.get(session_id).cloned()
    }

    /// Returns retained execution records in insertion order.
    #[must_use]
    pub fn execution_list(&self) -> Vec<ExecutionRecord> {
        self.lock().executions.values().cloned().collect()
    }

    /// Returns one execution record.
    #[must_use]
    pub fn execution(&self, execution_id: &ExecutionId) -> Option<ExecutionRecord> {
        self.lock().executions.get(execution_id).cloned()
    }

    /// Returns retained execution records of one session in insertion order.
    #[must_use]
    pub fn executions_for_session(&self, session_id: &SessionId) -> Vec<ExecutionRecord> {
        self.lock()
            .executions
            .values()
            .filter(|record| &record.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Returns the number of retained session records.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Returns the number of retained execution records.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.lock().executions.len()
    }
}

impl JobListener for TelemetryTracker {
    fn on_job_start(&self, job_id: &str, group: &JobGroupId) {
        Self::on_job_start(self, job_id, group);
    }
}
