//! Backend main event loop.

pub mod handlers;
pub mod state;

use state::Sessions;

use crate::capabilities::Capabilities;
use crate::protocol::{BackendAction, GuiEvent};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::time::Duration;
use tokio::runtime::Runtime;

/// How long the loop sleeps when no action is pending
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run the backend event loop on a tokio runtime.
///
/// Returns once the UI drops its action sender, after every session has
/// been cancelled and unsubscribed.
pub fn run_backend(
    caps: Capabilities,
    action_rx: Receiver<BackendAction>,
    event_tx: Sender<GuiEvent>,
) {
    // Create a Tokio runtime for this thread
    let rt = match Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create Tokio runtime");
            return;
        }
    };

    rt.block_on(async move {
        let mut sessions = Sessions::default();

        loop {
            // Check for actions from the UI (non-blocking)
            loop {
                match action_rx.try_recv() {
                    Ok(action) => {
                        handlers::handle_backend_action(action, &caps, &mut sessions, &event_tx);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        tracing::debug!("UI dropped the action channel; shutting down backend");
                        if !sessions.is_empty() {
                            tracing::debug!(open = sessions.len(), "Closing open sessions");
                        }
                        sessions.shutdown().await;
                        return;
                    }
                }
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    });
}
