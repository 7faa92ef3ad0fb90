//! The message feed controller.
//!
//! `MessageFeedController` lives on the UI thread. It owns the feed and the
//! composer input, turns user intent into [`BackendAction`]s, and applies
//! the backend's [`GuiEvent`]s one at a time in `process_events`. That drain
//! is the only place completions from the stream, the blob store or remote
//! config reach the feed.

use std::ops::Range;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::run_backend;
use crate::capabilities::Capabilities;
use crate::config::Settings;
use crate::error::FeedError;
use crate::events::{self, FeedChange};
use crate::feed::{Feed, RenderedRow};
use crate::input_state::InputState;
use crate::message::LocalImageHandle;
use crate::notifications::{self, Alert};
use crate::protocol::{BackendAction, GuiEvent, ImageSlot, SessionId};
use crate::state::FeedState;
use crate::validation;

pub struct MessageFeedController {
    // Feed, session and length limit
    pub state: FeedState,

    // Message being composed
    pub input: InputState,

    settings: Settings,

    // Channels for backend communication
    action_tx: Sender<BackendAction>,
    event_rx: Receiver<GuiEvent>,
}

impl MessageFeedController {
    /// Build a controller around existing backend channels.
    pub fn new(
        settings: Settings,
        action_tx: Sender<BackendAction>,
        event_rx: Receiver<GuiEvent>,
    ) -> Self {
        Self {
            state: FeedState::new(settings.default_message_length),
            input: InputState::new(),
            settings,
            action_tx,
            event_rx,
        }
    }

    /// Start a backend thread over `caps` and return a controller wired to it.
    ///
    /// The backend exits on its own once the controller is dropped.
    pub fn spawn(caps: Capabilities, settings: Settings) -> Self {
        // Create channels for UI <-> Backend
        let (action_tx, action_rx) = unbounded::<BackendAction>();
        let (event_tx, event_rx) = unbounded::<GuiEvent>();

        // Spawn the backend thread
        thread::spawn(move || {
            run_backend(caps, action_rx, event_tx);
        });

        Self::new(settings, action_tx, event_rx)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn feed(&self) -> &Feed {
        &self.state.feed
    }

    pub fn message_length_limit(&self) -> usize {
        self.state.message_length_limit
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn session(&self) -> Option<SessionId> {
        self.state.session()
    }

    /// Start listening for appended messages with a fresh, empty feed.
    ///
    /// If the stream refuses the subscription, event processing reports
    /// [`FeedChange::SubscriptionFailed`] and ends the session.
    pub fn subscribe(&mut self) -> Result<SessionId, FeedError> {
        if self.state.is_active() {
            return Err(FeedError::AlreadySubscribed);
        }
        let session = self.state.begin_session();
        let action = BackendAction::Subscribe {
            session,
            path: self.settings.messages_path.clone(),
        };
        if let Err(e) = self.send_action(action) {
            self.state.end_session();
            return Err(e);
        }
        debug!(?session, "Feed subscribed");
        Ok(session)
    }

    /// Tear the active session down. Returns false if there was none.
    pub fn unsubscribe(&mut self) -> bool {
        let Some(session) = self.state.end_session() else {
            return false;
        };
        // A gone backend has no subscription left to cancel
        let _ = self.send_action(BackendAction::Unsubscribe { session });
        debug!(?session, "Feed unsubscribed");
        true
    }

    /// Keystroke-level edit of the composer, rejected if it would exceed the
    /// message length limit.
    pub fn edit_input(&mut self, range: Range<usize>, replacement: &str) -> bool {
        let limit = self.state.message_length_limit;
        self.input.replace_range(range, replacement, limit)
    }

    /// Type text at the end of the composer, subject to the length limit.
    pub fn type_text(&mut self, text: &str) -> bool {
        let limit = self.state.message_length_limit;
        self.input.type_text(text, limit)
    }

    /// Send whatever is in the composer and clear it.
    pub fn submit_input(&mut self) -> bool {
        let text = self.input.take();
        self.compose_and_send(&text)
    }

    /// Queue a text message for the stream. Fire-and-forget: returns whether
    /// the message was handed to the backend, never whether it was stored.
    pub fn compose_and_send(&mut self, text: &str) -> bool {
        let Some(session) = self.state.session() else {
            debug!("Send ignored: feed is not active");
            return false;
        };
        let Some(text) = validation::sanitize_outgoing(text) else {
            return false;
        };
        let action = BackendAction::SendText {
            session,
            path: self.settings.messages_path.clone(),
            text,
        };
        self.send_or_log(action)
    }

    /// Queue an image upload; a message is appended only if the upload succeeds.
    pub fn compose_and_send_image(&mut self, image: LocalImageHandle) -> bool {
        let Some(session) = self.state.session() else {
            debug!("Image send ignored: feed is not active");
            return false;
        };
        let action = BackendAction::SendImage {
            session,
            path: self.settings.messages_path.clone(),
            image,
        };
        self.send_or_log(action)
    }

    /// Present row `index` and start resolving its image in the background.
    ///
    /// Returns `None` for unknown indices and after teardown.
    pub fn render(&mut self, index: usize) -> Option<RenderedRow> {
        let session = self.state.session()?;
        let message = &self.state.feed.get(index)?.message;

        let resolution = match (&message.image_reference, &message.sender_photo_url) {
            (Some(reference), _) => Some((ImageSlot::Content, reference.clone())),
            (None, Some(photo_url)) => Some((ImageSlot::Avatar, photo_url.clone())),
            (None, None) => None,
        };

        if let Some((slot, reference)) = resolution {
            if slot == ImageSlot::Content {
                self.state.feed.begin_loading(index);
            }
            self.send_or_log(BackendAction::ResolveImage {
                session,
                index,
                slot,
                reference,
            });
        }

        self.state.feed.row(index)
    }

    /// Ask remote config for a new `friendly_msg_length`.
    pub fn refresh_message_length_limit(&self) -> Result<(), FeedError> {
        self.send_action(BackendAction::FetchConfig {
            expiration: self.settings.fetch_expiration(),
        })
    }

    /// Sign the current user out; the feed is torn down once that succeeds.
    pub fn sign_out(&self) -> Result<(), FeedError> {
        self.send_action(BackendAction::SignOut)
    }

    /// Turn a push payload received in the foreground into an alert.
    pub fn handle_notification(&self, payload: &Value) -> Option<Alert> {
        notifications::alert_from_payload(payload)
    }

    /// Apply every pending backend event, in arrival order.
    pub fn process_events(&mut self) -> Vec<FeedChange> {
        let mut changes = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            self.process_single_event(event, &mut changes);
        }
        changes
    }

    /// Wait up to `timeout` for the next event, then drain the rest.
    ///
    /// If the backend has gone away the active session is ended, so
    /// `is_active` turns false.
    pub fn poll_events(&mut self, timeout: Duration) -> Vec<FeedChange> {
        let mut changes = Vec::new();
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => self.process_single_event(event, &mut changes),
            Err(RecvTimeoutError::Timeout) => return changes,
            Err(RecvTimeoutError::Disconnected) => {
                // Nothing can reach the feed any more
                if self.unsubscribe() {
                    warn!("Backend event channel closed; feed torn down");
                }
                return changes;
            }
        }
        changes.extend(self.process_events());
        changes
    }

    fn process_single_event(&mut self, event: GuiEvent, changes: &mut Vec<FeedChange>) {
        if let Some(change) = events::process_single_event(&mut self.state, event) {
            if matches!(change, FeedChange::SignedOut | FeedChange::SubscriptionFailed) {
                self.unsubscribe();
            }
            changes.push(change);
        }
    }

    fn send_action(&self, action: BackendAction) -> Result<(), FeedError> {
        self.action_tx
            .send(action)
            .map_err(|_| FeedError::BackendGone)
    }

    fn send_or_log(&self, action: BackendAction) -> bool {
        match self.send_action(action) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Action dropped");
                false
            }
        }
    }
}

impl Drop for MessageFeedController {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
