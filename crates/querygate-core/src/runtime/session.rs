// crates/querygate-core/src/runtime/session.rs
// ============================================================================
// Module: QueryGate Session Registry
// Description: Session lifecycle, engine contexts, and pool bindings.
// Purpose: Own per-session engine state and validate sessions for the executor.
// Dependencies: crate::{core, interfaces}, tracing
// ============================================================================

//! ## Overview
//! Each open session owns exactly one engine context, created on open and
//! closed on close. In single-session mode every session borrows the engine's
//! shared context instead, which sessions never close. Sessions also carry an
//! optional scheduler pool name that statements may rebind.
//!
//! Session configuration entries:
//! - `set:<key>` (also `set:hiveconf:<key>` and `set:hivevar:<key>`) is applied
//!   to the new context with the prefix stripped.
//! - `use:database` selects the initial database.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::identifiers::IdGenerator;
use crate::core::identifiers::SessionId;
use crate::core::time::Timestamp;
use crate::interfaces::EngineContext;
use crate::interfaces::EngineError;
use crate::interfaces::QueryEngine;
use crate::runtime::error::GatewayError;
use crate::runtime::telemetry::TelemetryTracker;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Session config key selecting the initial database.
pub const INITIAL_DATABASE_KEY: &str = "use:database";

/// Prefix of session config entries applied to the engine context.
const SET_PREFIX: &str = "set:";

/// Variable namespaces stripped from `set:` keys.
const SET_NAMESPACES: [&str; 2] = ["hiveconf:", "hivevar:"];

// ============================================================================
// SECTION: Sessions
// ============================================================================

/// One open session.
struct Session {
    /// Owning user.
    user: String,
    /// Originating address.
    address: String,
    /// Creation time.
    opened_at: Timestamp,
    /// Engine context used by this session's statements.
    context: Arc<dyn EngineContext>,
    /// Whether `context` is the shared single-session context.
    shared: bool,
    /// Scheduler pool bound by a `SetPool` effect.
    active_pool: Option<String>,
}

/// Read-only description of an open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Session identifier.
    pub session_id: SessionId,
    /// Owning user.
    pub user: String,
    /// Originating address.
    pub address: String,
    /// Creation time.
    pub opened_at: Timestamp,
    /// Bound scheduler pool.
    pub active_pool: Option<String>,
}

/// Registry of open sessions.
///
/// # Invariants
/// - One engine context per open session, except in single-session mode.
/// - The shared context is never closed by a session.
pub struct SessionRegistry {
    /// Backing engine.
    engine: Arc<dyn QueryEngine>,
    /// Telemetry sink for session events.
    telemetry: Arc<TelemetryTracker>,
    /// Session identifier source.
    ids: IdGenerator,
    /// Share one engine context across all sessions.
    single_session: bool,
    /// Open sessions.
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        telemetry: Arc<TelemetryTracker>,
        single_session: bool,
    ) -> Self {
        Self {
            engine,
            telemetry,
            ids: IdGenerator::new("session"),
            single_session,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns true when every session shares one context.
    #[must_use]
    pub const fn single_session(&self) -> bool {
        self.single_session
    }

    /// Acquires the read lock.
    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<SessionId, Session>>, GatewayError> {
        self.sessions
            .read()
            .map_err(|_| GatewayError::Internal("session registry lock poisoned".to_string()))
    }

    /// Acquires the write lock.
    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<SessionId, Session>>, GatewayError> {
        self.sessions
            .write()
            .map_err(|_| GatewayError::Internal("session registry lock poisoned".to_string()))
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Opens a session and initializes its engine context from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::EngineInit`] when the context cannot be created
    /// or initialized; a freshly created context is closed before returning.
    pub fn open_session(
        &self,
        user: &str,
        address: &str,
        config: &BTreeMap<String, String>,
    ) -> Result<SessionId, GatewayError> {
        let (context, shared) = if self.single_session {
            (self.engine.shared_context().map_err(GatewayError::EngineInit)?, true)
        } else {
            (self.engine.new_context(user).map_err(GatewayError::EngineInit)?, false)
        };

        if let Err(err) = initialize_context(context.as_ref(), config) {
            warn!(user, error = %err, "session context initialization failed");
            if !shared {
                context.close();
            }
            return Err(GatewayError::EngineInit(err));
        }

        let session_id = self.ids.session_id();
        let session = Session {
            user: user.to_string(),
            address: address.to_string(),
            opened_at: Timestamp::now(),
            context: Arc::clone(&context),
            shared,
            active_pool: None,
        };
        match self.write() {
            Ok(mut sessions) => {
                sessions.insert(session_id.clone(), session);
            }
            Err(err) => {
                if !shared {
                    context.close();
                }
                return Err(err);
            }
        }
        self.telemetry.on_session_created(&session_id, user, address);
        info!(session_id = %session_id, user, address, shared, "session opened");
        Ok(session_id)
    }

    /// Closes a session and releases its context.
    ///
    /// Open executions are not touched here; the gateway closes them first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownSession`] for unknown or closed sessions.
    pub fn close_session(&self, session_id: &SessionId) -> Result<(), GatewayError> {
        let session = self
            .write()?
            .remove(session_id)
            .ok_or_else(|| GatewayError::UnknownSession(session_id.clone()))?;
        self.telemetry.on_session_closed(session_id);
        if !session.shared {
            session.context.close();
        }
        info!(session_id = %session_id, user = %session.user, "session closed");
        Ok(())
    }

    /// Closes every open session; used at shutdown.
    pub fn close_all(&self) {
        let ids = self.session_ids();
        for session_id in ids {
            if let Err(err) = self.close_session(&session_id) {
                debug!(session_id = %session_id, error = %err, "session already closed");
            }
        }
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    /// Returns the session's engine context.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownSession`] when the session is not open.
    pub fn context(&self, session_id: &SessionId) -> Result<Arc<dyn EngineContext>, GatewayError> {
        self.read()?
            .get(session_id)
            .map(|session| Arc::clone(&session.context))
            .ok_or_else(|| GatewayError::UnknownSession(session_id.clone()))
    }

    /// Returns the session's owning user.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownSession`] when the session is not open.
    pub fn user_of(&self, session_id: &SessionId) -> Result<String, GatewayError> {
        self.read()?
            .get(session_id)
            .map(|session| session.user.clone())
            .ok_or_else(|| GatewayError::UnknownSession(session_id.clone()))
    }

    /// Returns a description of an open session.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownSession`] when the session is not open.
    pub fn info(&self, session_id: &SessionId) -> Result<SessionInfo, GatewayError> {
        self.read()?
            .get(session_id)
            .map(|session| SessionInfo {
                session_id: session_id.clone(),
                user: session.user.clone(),
                address: session.address.clone(),
                opened_at: session.opened_at,
                active_pool: session.active_pool.clone(),
            })
            .ok_or_else(|| GatewayError::UnknownSession(session_id.clone()))
    }

    /// Returns true when the session is open.
    #[must_use]
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.read().is_ok_and(|sessions| sessions.contains_key(session_id))
    }

    /// Returns the identifiers of all open sessions.
    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.read().map(|sessions| sessions.keys().cloned().collect()).unwrap_or_default()
    }

    /// Returns the number of open sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.read().map(|sessions| sessions.len()).unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Pool binding
    // ------------------------------------------------------------------------

    /// Binds the session to a scheduler pool.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownSession`] when the session is not open.
    pub fn set_active_pool(
        &self,
        session_id: &SessionId,
        pool: impl Into<String>,
    ) -> Result<(), GatewayError> {
        let mut sessions = self.write()?;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| GatewayError::UnknownSession(session_id.clone()))?;
        session.active_pool = Some(pool.into());
        Ok(())
    }

    /// Returns the session's scheduler pool.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownSession`] when the session is not open.
    pub fn active_pool(&self, session_id: &SessionId) -> Result<Option<String>, GatewayError> {
        self.read()?
            .get(session_id)
            .map(|session| session.active_pool.clone())
            .ok_or_else(|| GatewayError::UnknownSession(session_id.clone()))
    }

    /// Removes the session's scheduler pool binding.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownSession`] when the session is not open.
    pub fn clear_active_pool(&self, session_id: &SessionId) -> Result<(), GatewayError> {
        let mut sessions = self.write()?;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| GatewayError::UnknownSession(session_id.clone()))?;
        session.active_pool = None;
        Ok(())
    }
}

// ============================================================================
// SECTION: Context Initialization
// ============================================================================

/// Applies `set:` entries, then the initial database.
fn initialize_context(
    context: &dyn EngineContext,
    config: &BTreeMap<String, String>,
) -> Result<(), EngineError> {
    for (key, value) in config {
        if let Some(name) = key.strip_prefix(SET_PREFIX) {
            let name = SET_NAMESPACES
                .iter()
                .find_map(|namespace| name.strip_prefix(namespace))
                .unwrap_or(name);
            context.set_conf(name, value)?;
        }
    }
    if let Some(database) = config.get(INITIAL_DATABASE_KEY) {
        context.use_database(database)?;
    }
    Ok(())
}
