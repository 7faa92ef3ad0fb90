//! Backend action handlers.
//!
//! Each action is turned into a spawned task so a slow upload or image
//! download never holds up the loop. Completions go back to the UI as
//! [`GuiEvent`]s; failures are logged here and otherwise dropped.

use bytes::Bytes;
use chrono::Utc;
use crossbeam_channel::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::Sessions;
use crate::capabilities::{Capabilities, Subscription};
use crate::error::CapabilityResult;
use crate::message::{LocalImageHandle, Message};
use crate::protocol::{BackendAction, GuiEvent, ImageSlot, SessionId};

/// Dispatch one action from the UI.
pub fn handle_backend_action(
    action: BackendAction,
    caps: &Capabilities,
    sessions: &mut Sessions,
    event_tx: &Sender<GuiEvent>,
) {
    match action {
        BackendAction::Subscribe { session, path } => {
            let Some(token) = sessions.open(session) else {
                warn!(?session, "Session already subscribed");
                return;
            };
            let task = tokio::spawn(forward_stream(
                caps.clone(),
                session,
                path,
                token,
                event_tx.clone(),
            ));
            sessions.attach_forwarder(session, task);
        }

        BackendAction::Unsubscribe { session } => {
            if sessions.close(session) {
                debug!(?session, "Session closed");
            }
        }

        BackendAction::SendText {
            session,
            path,
            text,
        } => {
            let caps = caps.clone();
            tokio::spawn(async move {
                let identity = caps.identity.current_identity();
                let message = Message::text(text).from_sender(identity.as_ref());
                append_message(&caps, &path, message, session).await;
            });
        }

        BackendAction::SendImage {
            session,
            path,
            image,
        } => {
            let Some(token) = sessions.token(session) else {
                debug!(?session, "Image send for a closed session dropped");
                return;
            };
            tokio::spawn(upload_and_send(caps.clone(), session, path, image, token));
        }

        BackendAction::ResolveImage {
            session,
            index,
            slot,
            reference,
        } => {
            let caps = caps.clone();
            let event_tx = event_tx.clone();
            tokio::spawn(async move {
                let image = match resolve_image(&caps, slot, &reference).await {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        warn!(index, %reference, error = %e, "Error downloading image");
                        None
                    }
                };
                let _ = event_tx.send(GuiEvent::ImageResolved {
                    session,
                    index,
                    slot,
                    image,
                });
            });
        }

        BackendAction::FetchConfig { expiration } => {
            let caps = caps.clone();
            let event_tx = event_tx.clone();
            tokio::spawn(async move {
                match caps.remote_config.fetch(expiration).await {
                    Ok(value) => {
                        debug!(?value, "Config fetched");
                        let _ = event_tx.send(GuiEvent::ConfigFetched(value));
                    }
                    Err(e) => warn!(error = %e, "Config not fetched"),
                }
            });
        }

        BackendAction::SignOut => {
            let caps = caps.clone();
            let event_tx = event_tx.clone();
            tokio::spawn(async move {
                match caps.identity.sign_out().await {
                    Ok(()) => {
                        info!("Signed out");
                        let _ = event_tx.send(GuiEvent::SignedOut);
                    }
                    Err(e) => warn!(error = %e, "Error signing out"),
                }
            });
        }
    }
}

/// Forward stream records to the UI until the session is cancelled.
async fn forward_stream(
    caps: Capabilities,
    session: SessionId,
    path: String,
    token: CancellationToken,
    event_tx: Sender<GuiEvent>,
) {
    let Subscription { id, mut records } = match caps.stream.subscribe(&path).await {
        Ok(sub) => sub,
        Err(e) => {
            warn!(?session, %path, error = %e, "Subscribe failed");
            let _ = event_tx.send(GuiEvent::SubscriptionFailed {
                session,
                reason: e.to_string(),
            });
            return;
        }
    };
    debug!(?session, %path, "Listening for new messages");

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            record = records.recv() => match record {
                Some(record) => {
                    let event = GuiEvent::MessageAdded {
                        session,
                        key: record.key,
                        message: record.message,
                    };
                    if event_tx.send(event).is_err() {
                        // UI side is gone
                        break;
                    }
                }
                None => {
                    debug!(?session, "Stream closed the subscription");
                    break;
                }
            },
        }
    }

    caps.stream.unsubscribe(id).await;
    debug!(?session, "Unsubscribed");
}

async fn append_message(caps: &Capabilities, path: &str, message: Message, session: SessionId) {
    match caps.stream.append(path, message).await {
        Ok(key) => debug!(?session, %key, "Message pushed"),
        Err(e) => warn!(?session, error = %e, "Error sending message"),
    }
}

/// Upload an image and, only on success, append a message referencing it.
async fn upload_and_send(
    caps: Capabilities,
    session: SessionId,
    path: String,
    image: LocalImageHandle,
    token: CancellationToken,
) {
    let Some(identity) = caps.identity.current_identity() else {
        warn!(?session, "No signed-in identity; image not uploaded");
        return;
    };

    let object_path = image.upload_path(&identity.uid, Utc::now().timestamp_millis());
    let reference = match caps
        .store
        .upload(&object_path, image.bytes(), image.content_type())
        .await
    {
        Ok(reference) => reference,
        Err(e) => {
            warn!(?session, %object_path, error = %e, "Error uploading");
            return;
        }
    };

    if token.is_cancelled() {
        debug!(?session, %reference, "Session ended during upload; message not sent");
        return;
    }

    let message = Message::image(reference).from_sender(Some(&identity));
    append_message(&caps, &path, message, session).await;
}

/// Store references go through the blob store; everything else, and every
/// avatar, is fetched as a plain URL.
async fn resolve_image(
    caps: &Capabilities,
    slot: ImageSlot,
    reference: &str,
) -> CapabilityResult<Bytes> {
    match slot {
        ImageSlot::Content if caps.store.owns(reference) => caps.store.resolve(reference).await,
        _ => caps.fetcher.fetch(reference).await,
    }
}
