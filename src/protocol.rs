use std::time::Duration;

use bytes::Bytes;

use crate::capabilities::ConfigValue;
use crate::message::{LocalImageHandle, Message};

/// Identifies one subscribe/unsubscribe activation of the feed.
///
/// Every event tied to a session carries its id; the UI drops events whose
/// session is no longer active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

/// Which image of a row a resolution is for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageSlot {
    /// The message's own image (`image_reference`)
    Content,
    /// The sender's profile picture on a text message
    Avatar,
}

/// Actions sent from the UI to the Backend
#[derive(Debug, Clone)]
pub enum BackendAction {
    /// Start listening for appends under `path`
    Subscribe { session: SessionId, path: String },
    /// Cancel the session's subscription
    Unsubscribe { session: SessionId },
    /// Compose a text message from the current identity and append it
    SendText {
        session: SessionId,
        path: String,
        text: String,
    },
    /// Upload an image, then append a message referencing it
    SendImage {
        session: SessionId,
        path: String,
        image: LocalImageHandle,
    },
    /// Resolve an image for one row
    ResolveImage {
        session: SessionId,
        index: usize,
        slot: ImageSlot,
        reference: String,
    },
    /// Fetch `friendly_msg_length` from remote config
    FetchConfig { expiration: Duration },
    /// Sign the current identity out
    SignOut,
}

/// Events sent from the Backend to the UI
#[derive(Debug, Clone)]
pub enum GuiEvent {
    /// The stream delivered an appended record
    MessageAdded {
        session: SessionId,
        key: String,
        message: Message,
    },
    /// Subscribing failed; the session stays open but receives nothing
    SubscriptionFailed { session: SessionId, reason: String },
    /// An image resolution finished. `image` is `None` on failure.
    ImageResolved {
        session: SessionId,
        index: usize,
        slot: ImageSlot,
        image: Option<Bytes>,
    },
    /// A config fetch succeeded
    ConfigFetched(ConfigValue),
    /// The identity provider signed the user out
    SignedOut,
}
