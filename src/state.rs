//! Feed state owned by the UI thread.
//!
//! `FeedState` holds the feed, the active session and the current message
//! length limit. Only event processing and controller calls on the UI
//! thread touch it.

use crate::feed::Feed;
use crate::protocol::SessionId;

/// Core state for one feed controller.
#[derive(Debug)]
pub struct FeedState {
    /// Messages received during the active session.
    pub feed: Feed,

    /// Maximum length of the pending input, in chars.
    pub message_length_limit: usize,

    /// Session whose events may mutate the feed.
    session: Option<SessionId>,

    /// Id handed to the next session.
    next_session: u64,
}

impl FeedState {
    pub fn new(message_length_limit: usize) -> Self {
        Self {
            feed: Feed::new(),
            message_length_limit,
            session: None,
            next_session: 1,
        }
    }

    /// Start a new session with an empty feed.
    pub fn begin_session(&mut self) -> SessionId {
        let id = SessionId(self.next_session);
        self.next_session += 1;
        self.session = Some(id);
        self.feed = Feed::new();
        id
    }

    /// End the active session, returning it if there was one.
    pub fn end_session(&mut self) -> Option<SessionId> {
        self.session.take()
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Whether events tagged with `session` may still touch the feed.
    pub fn is_current(&self, session: SessionId) -> bool {
        self.session == Some(session)
    }
}
