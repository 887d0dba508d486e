//! Ambiguity resolution sessions
//!
//! A session holds the candidate list of one ambiguous request until the
//! caller picks an index, cancels, or lets it expire.
//!
//! # Policy
//!
//! - One open session per caller. A new ambiguous request from the same
//!   caller replaces the pending session, which becomes `Cancelled`.
//! - An out-of-range selection leaves the session open and refreshes its
//!   inactivity timer.
//! - Terminal sessions stay as tombstones for one more inactivity window so a
//!   late duplicate selection gets a precise error; [`SessionStore::sweep`]
//!   drops them afterwards.
//! - The store never holds more than `TOMBSTONE_FACTOR * max_sessions`
//!   entries. Opening a session first drops stale tombstones and then the
//!   oldest ones over that bound.
//!
//! The store is the only shared mutable state in the core. All access goes
//! through one `parking_lot::Mutex`, and no method awaits while holding it.

use crate::action::ValidatedRequest;
use crate::error::SelectionError;
use crate::resolver::ResolvedPackage;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Default inactivity window
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(300);

/// Default bound on concurrently open sessions
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Entries held, open and terminal, per allowed open session
const TOMBSTONE_FACTOR: usize = 2;

/// Opaque session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Open,
    Resolved,
    Cancelled,
}

/// In-progress disambiguation
#[derive(Debug, Clone)]
pub struct AmbiguitySession {
    pub id: SessionId,
    pub caller: String,
    pub candidates: Vec<ResolvedPackage>,
    pub originating_request: ValidatedRequest,
    pub created_at: DateTime<Utc>,
    pub state: SessionState,
    last_activity: Instant,
}

impl AmbiguitySession {
    fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) >= ttl
    }
}

/// A successful selection
#[derive(Debug, Clone)]
pub struct Selection {
    pub session_id: SessionId,
    pub caller: String,
    pub package: ResolvedPackage,
    pub request: ValidatedRequest,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, AmbiguitySession>,
    by_caller: HashMap<String, SessionId>,
}

impl Inner {
    fn expire_stale(&mut self, now: Instant, ttl: Duration) {
        for session in self.sessions.values_mut() {
            if session.state == SessionState::Open && session.is_stale(now, ttl) {
                session.state = SessionState::Cancelled;
                session.last_activity = now;
                info!(session_id = %session.id, caller = %session.caller, "Selection session expired");
                if self.by_caller.get(&session.caller) == Some(&session.id) {
                    self.by_caller.remove(&session.caller);
                }
            }
        }
    }

    /// Drop terminal sessions idle for longer than `ttl`
    fn drop_stale_tombstones(&mut self, now: Instant, ttl: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| s.state == SessionState::Open || !s.is_stale(now, ttl));
        before - self.sessions.len()
    }

    /// Drop the oldest terminal sessions until one more entry fits under `limit`
    fn trim_tombstones(&mut self, limit: usize) {
        if self.sessions.len() < limit {
            return;
        }
        let excess = self.sessions.len() + 1 - limit;
        let mut finished: Vec<(Instant, SessionId, String)> = self
            .sessions
            .values()
            .filter(|s| s.state != SessionState::Open)
            .map(|s| (s.last_activity, s.id.clone(), s.caller.clone()))
            .collect();
        finished.sort_by_key(|(at, _, _)| *at);
        for (_, id, caller) in finished.into_iter().take(excess) {
            self.sessions.remove(&id);
            self.release_caller(&caller, &id);
        }
        debug!(excess, remaining = self.sessions.len(), "Trimmed selection tombstones");
    }

    fn release_caller(&mut self, caller: &str, id: &SessionId) {
        if self.by_caller.get(caller) == Some(id) {
            self.by_caller.remove(caller);
        }
    }

    fn open_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.state == SessionState::Open)
            .count()
    }
}

/// Bounded, expiring store of ambiguity sessions
pub struct SessionStore {
    inner: Mutex<Inner>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Open a session for `caller`, replacing any session it already has open
    pub fn open(
        &self,
        caller: &str,
        candidates: Vec<ResolvedPackage>,
        request: ValidatedRequest,
    ) -> SessionId {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.expire_stale(now, self.ttl);

        if let Some(previous) = inner.by_caller.remove(caller) {
            if let Some(session) = inner.sessions.get_mut(&previous) {
                if session.state == SessionState::Open {
                    session.state = SessionState::Cancelled;
                    session.last_activity = now;
                    info!(session_id = %previous, caller, "Selection session replaced by newer request");
                }
            }
        }

        if inner.open_count() >= self.max_sessions {
            let oldest = inner
                .sessions
                .values()
                .filter(|s| s.state == SessionState::Open)
                .min_by_key(|s| s.last_activity)
                .map(|s| (s.id.clone(), s.caller.clone()));
            if let Some((id, owner)) = oldest {
                if let Some(session) = inner.sessions.get_mut(&id) {
                    session.state = SessionState::Cancelled;
                    session.last_activity = now;
                }
                inner.release_caller(&owner, &id);
                info!(session_id = %id, "Selection session evicted, store at capacity");
            }
        }

        inner.drop_stale_tombstones(now, self.ttl);
        inner.trim_tombstones(self.max_sessions.saturating_mul(TOMBSTONE_FACTOR));

        let id = SessionId::generate();
        inner.sessions.insert(
            id.clone(),
            AmbiguitySession {
                id: id.clone(),
                caller: caller.to_string(),
                candidates,
                originating_request: request,
                created_at: Utc::now(),
                state: SessionState::Open,
                last_activity: now,
            },
        );
        inner.by_caller.insert(caller.to_string(), id.clone());
        debug!(session_id = %id, caller, "Selection session opened");
        id
    }

    /// Apply a selection. At most one selection per session ever succeeds.
    pub fn select(&self, id: &SessionId, index: usize) -> Result<Selection, SelectionError> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let ttl = self.ttl;

        let session = inner
            .sessions
            .get_mut(id)
            .ok_or_else(|| SelectionError::SessionNotFound {
                session_id: id.to_string(),
            })?;

        if session.state == SessionState::Open && session.is_stale(now, ttl) {
            session.state = SessionState::Cancelled;
            session.last_activity = now;
            info!(session_id = %id, "Selection session expired");
        }

        match session.state {
            SessionState::Resolved => Err(SelectionError::SessionAlreadyResolved {
                session_id: id.to_string(),
            }),
            SessionState::Cancelled => {
                let caller = session.caller.clone();
                inner.release_caller(&caller, id);
                Err(SelectionError::SessionExpired {
                    session_id: id.to_string(),
                })
            }
            SessionState::Open => {
                session.last_activity = now;
                let len = session.candidates.len();
                if index >= len {
                    return Err(SelectionError::OutOfRange { index, len });
                }
                session.state = SessionState::Resolved;
                let selection = Selection {
                    session_id: id.clone(),
                    caller: session.caller.clone(),
                    package: session.candidates[index].clone(),
                    request: session.originating_request.clone(),
                };
                inner.release_caller(&selection.caller, id);
                debug!(session_id = %id, index, "Selection session resolved");
                Ok(selection)
            }
        }
    }

    /// Cancel an open session on caller request. Cancelling twice is a no-op.
    pub fn cancel(&self, id: &SessionId) -> Result<(), SelectionError> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or_else(|| SelectionError::SessionNotFound {
                session_id: id.to_string(),
            })?;

        match session.state {
            SessionState::Resolved => Err(SelectionError::SessionAlreadyResolved {
                session_id: id.to_string(),
            }),
            SessionState::Cancelled => Ok(()),
            SessionState::Open => {
                session.state = SessionState::Cancelled;
                session.last_activity = now;
                let caller = session.caller.clone();
                inner.release_caller(&caller, id);
                info!(session_id = %id, "Selection session cancelled");
                Ok(())
            }
        }
    }

    /// Force an open session into `Cancelled`. Returns whether it was open.
    pub fn expire(&self, id: &SessionId) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let Some(session) = inner.sessions.get_mut(id) else {
            return false;
        };
        if session.state != SessionState::Open {
            return false;
        }
        session.state = SessionState::Cancelled;
        session.last_activity = now;
        let caller = session.caller.clone();
        inner.release_caller(&caller, id);
        true
    }

    /// Snapshot of a session with expiry applied
    pub fn get(&self, id: &SessionId) -> Option<AmbiguitySession> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.expire_stale(now, self.ttl);
        inner.sessions.get(id).cloned()
    }

    /// Expire idle sessions and drop tombstones older than one window.
    /// Returns the number of sessions removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let ttl = self.ttl;
        let mut inner = self.inner.lock();
        inner.expire_stale(now, ttl);
        let removed = inner.drop_stale_tombstones(now, ttl);
        if removed > 0 {
            debug!(removed, remaining = inner.sessions.len(), "Swept selection sessions");
        }
        removed
    }

    /// Number of sessions currently open
    pub fn open_count(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.expire_stale(now, self.ttl);
        inner.open_count()
    }

    /// Number of entries held, tombstones included
    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open session of `caller`, if any
    pub fn open_session_of(&self, caller: &str) -> Option<SessionId> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.expire_stale(now, self.ttl);
        inner.by_caller.get(caller).cloned()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL, DEFAULT_MAX_SESSIONS)
    }
}
