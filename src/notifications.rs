//! Alerts shown for push notifications received while the app is open.

use serde_json::Value;

const APS_KEY: &str = "aps";
const ALERT_KEY: &str = "alert";
/// Campaign label the messaging service attaches to console-sent messages
const LABEL_KEY: &str = "google.c.a.c_l";

/// A dismissable alert for the view to present
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

/// Build an alert from a notification payload.
///
/// The message is `aps.alert`, either a plain string or an object with a
/// `body`. The title is the campaign label, falling back to the alert
/// object's `title`. Payloads without an alert message yield `None`.
pub fn alert_from_payload(payload: &Value) -> Option<Alert> {
    let alert = payload.get(APS_KEY)?.get(ALERT_KEY)?;
    let (message, alert_title) = match alert {
        Value::String(message) => (message.clone(), None),
        Value::Object(fields) => (
            fields.get("body")?.as_str()?.to_string(),
            fields.get("title").and_then(Value::as_str),
        ),
        _ => return None,
    };
    let title = payload
        .get(LABEL_KEY)
        .and_then(Value::as_str)
        .or(alert_title)
        .unwrap_or("")
        .to_string();
    Some(Alert { title, message })
}
