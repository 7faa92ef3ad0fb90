//! Backend event processing (appended messages, image completions, config).

use tracing::{debug, warn};

use crate::capabilities::{ConfigValue, ValueSource};
use crate::feed::RowImage;
use crate::protocol::{GuiEvent, ImageSlot};
use crate::state::FeedState;

/// What the view has to refresh after an event was applied
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedChange {
    /// A message was appended at this index
    Inserted(usize),
    /// The image of this row changed
    RowUpdated(usize),
    LengthLimitChanged(usize),
    /// The stream refused the subscription and the session was ended
    SubscriptionFailed,
    /// The user signed out and the feed was torn down
    SignedOut,
}

/// Apply a single backend event to the feed state.
///
/// Events that belong to a session other than the active one are dropped,
/// so nothing arriving after teardown can mutate the feed.
pub fn process_single_event(state: &mut FeedState, event: GuiEvent) -> Option<FeedChange> {
    match event {
        GuiEvent::MessageAdded {
            session,
            key,
            message,
        } => {
            if !state.is_current(session) {
                debug!(?session, %key, "Dropping message for inactive session");
                return None;
            }
            let index = state.feed.push(key, message);
            Some(FeedChange::Inserted(index))
        }

        GuiEvent::SubscriptionFailed { session, reason } => {
            if !state.is_current(session) {
                debug!(?session, %reason, "Dropping subscription failure for inactive session");
                return None;
            }
            warn!(?session, %reason, "Feed subscription failed");
            Some(FeedChange::SubscriptionFailed)
        }

        GuiEvent::ImageResolved {
            session,
            index,
            slot,
            image,
        } => {
            if !state.is_current(session) {
                debug!(?session, index, "Dropping image for inactive session");
                return None;
            }
            let current = state.feed.image(index)?;
            let next = match (image, slot) {
                (Some(bytes), _) => RowImage::Loaded(bytes),
                // Keep showing an image that already loaded once
                (None, _) if matches!(current, RowImage::Loaded(_)) => return None,
                (None, ImageSlot::Content) => RowImage::Fallback,
                (None, ImageSlot::Avatar) => RowImage::AccountPlaceholder,
            };
            if *current == next {
                return None;
            }
            state.feed.set_image(index, next);
            Some(FeedChange::RowUpdated(index))
        }

        GuiEvent::ConfigFetched(value) => apply_config(state, value),

        // Teardown for both is done by the controller, which also tells the backend
        GuiEvent::SignedOut => Some(FeedChange::SignedOut),
    }
}

fn apply_config(state: &mut FeedState, value: ConfigValue) -> Option<FeedChange> {
    if value.source != ValueSource::Remote {
        debug!(source = ?value.source, "Ignoring non-remote friendly_msg_length");
        return None;
    }
    let Some(limit) = length_from_config(value.friendly_msg_length) else {
        warn!(value = value.friendly_msg_length, "Invalid friendly_msg_length");
        return None;
    };
    debug!(limit, "Friendly msg length config");
    if limit == state.message_length_limit {
        return None;
    }
    state.message_length_limit = limit;
    Some(FeedChange::LengthLimitChanged(limit))
}

/// Config numbers arrive as floats; only whole, non-negative values are limits.
fn length_from_config(raw: f64) -> Option<usize> {
    if raw.is_finite() && raw >= 0.0 && raw.fract() == 0.0 && raw <= usize::MAX as f64 {
        Some(raw as usize)
    } else {
        None
    }
}
