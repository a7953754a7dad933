//! Live sessions, keyed by id.
//!
//! A session can only be expired while nothing is processing for it: the
//! in-flight flag and the closed flag share one lock, so expiry and
//! [`SessionHandle::begin_processing`] cannot interleave.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use concierge_core::ids::{ClientId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session is closed")]
pub struct SessionClosed;

#[derive(Debug)]
struct Activity {
    last_activity: Instant,
    in_flight: bool,
    closed: bool,
}

#[derive(Debug)]
pub struct SessionHandle {
    session_id: SessionId,
    client_id: ClientId,
    cancel: CancellationToken,
    activity: Mutex<Activity>,
}

impl SessionHandle {
    fn new(client_id: ClientId) -> Self {
        Self {
            session_id: SessionId::new(),
            client_id,
            cancel: CancellationToken::new(),
            activity: Mutex::new(Activity {
                last_activity: Instant::now(),
                in_flight: false,
                closed: false,
            }),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Cancelled when the session is removed or expires.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_closed(&self) -> bool {
        self.activity.lock().closed
    }

    pub fn is_processing(&self) -> bool {
        self.activity.lock().in_flight
    }

    pub fn last_activity(&self) -> Instant {
        self.activity.lock().last_activity
    }

    /// Record activity without starting work, e.g. a message queued for
    /// the worker. No effect once closed.
    pub fn touch(&self) {
        let mut activity = self.activity.lock();
        if !activity.closed {
            activity.last_activity = Instant::now();
        }
    }

    /// Mark a message as in flight until the returned guard drops.
    pub fn begin_processing(self: &Arc<Self>) -> Result<ProcessingGuard, SessionClosed> {
        let mut activity = self.activity.lock();
        if activity.closed {
            return Err(SessionClosed);
        }
        activity.in_flight = true;
        activity.last_activity = Instant::now();
        Ok(ProcessingGuard {
            handle: Arc::clone(self),
        })
    }

    fn close(&self) {
        self.activity.lock().closed = true;
        self.cancel.cancel();
    }

    /// Close the session if it has been idle for `timeout` and is not
    /// processing. Returns whether it was closed.
    fn try_expire(&self, now: Instant, timeout: Duration) -> bool {
        let mut activity = self.activity.lock();
        if activity.in_flight || activity.closed {
            return false;
        }
        if now.saturating_duration_since(activity.last_activity) < timeout {
            return false;
        }
        activity.closed = true;
        true
    }
}

/// Held while a message is processed. Dropping it records activity.
#[derive(Debug)]
pub struct ProcessingGuard {
    handle: Arc<SessionHandle>,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        let mut activity = self.handle.activity.lock();
        activity.in_flight = false;
        activity.last_activity = Instant::now();
    }
}

pub struct SessionStore {
    sessions: DashMap<SessionId, Arc<SessionHandle>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
        }
    }

    pub fn create(&self, client_id: ClientId) -> Arc<SessionHandle> {
        let handle = Arc::new(SessionHandle::new(client_id));
        self.sessions
            .insert(handle.session_id.clone(), Arc::clone(&handle));
        debug!(session_id = %handle.session_id, client_id = %handle.client_id, "session created");
        handle
    }

    pub fn get(&self, session_id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions.get(session_id).map(|h| Arc::clone(h.value()))
    }

    /// Remove and close a session, cancelling any in-flight work.
    pub fn remove(&self, session_id: &SessionId) -> Option<Arc<SessionHandle>> {
        let (_, handle) = self.sessions.remove(session_id)?;
        handle.close();
        debug!(session_id = %session_id, "session removed");
        Some(handle)
    }

    /// Close and drop every session idle longer than the timeout.
    /// Sessions with a message in flight are skipped.
    pub fn expire_idle(&self, now: Instant) -> Vec<Arc<SessionHandle>> {
        let candidates: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| {
                now.saturating_duration_since(entry.value().last_activity()) >= self.idle_timeout
            })
            .map(|entry| entry.key().clone())
            .collect();

        let mut expired = Vec::new();
        for id in candidates {
            let removed = self
                .sessions
                .remove_if(&id, |_, handle| handle.try_expire(now, self.idle_timeout));
            if let Some((_, handle)) = removed {
                handle.cancel.cancel();
                info!(session_id = %id, "session expired");
                expired.push(handle);
            }
        }
        expired
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
