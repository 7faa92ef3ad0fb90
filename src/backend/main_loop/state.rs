//! Per-session bookkeeping on the backend side.

use std::collections::HashMap;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::protocol::SessionId;

/// A live feed session: its cancellation token and subscription task
#[derive(Debug)]
pub struct SessionHandle {
    pub token: CancellationToken,
    /// Task forwarding stream records to the UI
    pub forwarder: Option<JoinHandle<()>>,
}

/// All sessions the UI has opened and not yet closed
#[derive(Debug, Default)]
pub struct Sessions {
    active: HashMap<SessionId, SessionHandle>,
}

impl Sessions {
    /// Register a session. Returns `None` if it is already open.
    pub fn open(&mut self, session: SessionId) -> Option<CancellationToken> {
        if self.active.contains_key(&session) {
            return None;
        }
        let token = CancellationToken::new();
        self.active.insert(
            session,
            SessionHandle {
                token: token.clone(),
                forwarder: None,
            },
        );
        Some(token)
    }

    pub fn attach_forwarder(&mut self, session: SessionId, task: JoinHandle<()>) {
        if let Some(handle) = self.active.get_mut(&session) {
            handle.forwarder = Some(task);
        }
    }

    /// Token of an open session, for work that must stop when it closes.
    pub fn token(&self, session: SessionId) -> Option<CancellationToken> {
        self.active.get(&session).map(|h| h.token.clone())
    }

    /// Cancel and forget a session. Its forwarder unsubscribes on its own.
    pub fn close(&mut self, session: SessionId) -> bool {
        match self.active.remove(&session) {
            Some(handle) => {
                handle.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every session and wait for the forwarders to unsubscribe.
    pub async fn shutdown(&mut self) {
        let handles: Vec<SessionHandle> = self.active.drain().map(|(_, h)| h).collect();
        for handle in &handles {
            handle.token.cancel();
        }
        for handle in handles {
            if let Some(task) = handle.forwarder {
                let _ = task.await;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
