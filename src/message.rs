//! Chat message records, identities and locally picked images.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field names used for message records in the realtime database.
pub mod fields {
    pub const NAME: &str = "name";
    pub const TEXT: &str = "text";
    pub const IMAGE_URL: &str = "imageUrl";
    pub const PHOTO_URL: &str = "photoUrl";
}

/// A single chat message as stored under the messages path.
///
/// Either `text` or `image_reference` is expected to be set, but nothing
/// enforces that; rendering branches on `image_reference`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Blob store reference (`gs://...`) or a plain image URL
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_reference: Option<String>,
    #[serde(rename = "photoUrl", default, skip_serializing_if = "Option::is_none")]
    pub sender_photo_url: Option<String>,
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn image(reference: impl Into<String>) -> Self {
        Self {
            image_reference: Some(reference.into()),
            ..Self::default()
        }
    }

    /// Stamp the sender fields from the signed-in identity, if any.
    pub fn from_sender(mut self, identity: Option<&Identity>) -> Self {
        if let Some(identity) = identity {
            self.sender_name = identity.display_name.clone();
            self.sender_photo_url = identity.photo_url.clone();
        }
        self
    }

    pub fn is_image(&self) -> bool {
        self.image_reference.is_some()
    }

    /// Decode a raw database record.
    ///
    /// Records are loosely typed: any field that is missing or not a string
    /// is treated as absent rather than rejecting the whole record.
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            sender_name: field(fields::NAME),
            text: field(fields::TEXT),
            image_reference: field(fields::IMAGE_URL),
            sender_photo_url: field(fields::PHOTO_URL),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// The currently signed-in user, as reported by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// An image captured or picked on the device, waiting to be uploaded.
#[derive(Clone, Debug)]
pub enum LocalImageHandle {
    /// Camera capture, already JPEG encoded
    Captured { jpeg: Bytes },
    /// Existing file from the photo library
    Library {
        bytes: Bytes,
        file_name: String,
        content_type: Option<String>,
    },
}

impl LocalImageHandle {
    /// Blob store path for this image: `{uid}/{millis}.jpg` for captures and
    /// `{uid}/{millis}/{file_name}` for library picks.
    pub fn upload_path(&self, uid: &str, millis: i64) -> String {
        match self {
            LocalImageHandle::Captured { .. } => format!("{}/{}.jpg", uid, millis),
            LocalImageHandle::Library { file_name, .. } => {
                format!("{}/{}/{}", uid, millis, last_path_component(file_name))
            }
        }
    }

    pub fn content_type(&self) -> Option<String> {
        match self {
            LocalImageHandle::Captured { .. } => Some("image/jpeg".to_string()),
            LocalImageHandle::Library { content_type, .. } => content_type.clone(),
        }
    }

    pub fn bytes(&self) -> Bytes {
        match self {
            LocalImageHandle::Captured { jpeg } => jpeg.clone(),
            LocalImageHandle::Library { bytes, .. } => bytes.clone(),
        }
    }
}

fn last_path_component(name: &str) -> &str {
    name.rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or("image")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_reads_string_fields() {
        let value = json!({
            "name": "Alice",
            "text": "hi",
            "photoUrl": "https://example.com/a.png"
        });
        let msg = Message::from_value(&value);
        assert_eq!(msg.sender_name.as_deref(), Some("Alice"));
        assert_eq!(msg.text.as_deref(), Some("hi"));
        assert_eq!(msg.image_reference, None);
        assert_eq!(msg.sender_photo_url.as_deref(), Some("https://example.com/a.png"));
    }

    #[test]
    fn test_from_value_ignores_non_string_fields() {
        let value = json!({ "name": 42, "imageUrl": "gs://bucket/a.jpg" });
        let msg = Message::from_value(&value);
        assert_eq!(msg.sender_name, None);
        assert!(msg.is_image());
    }

    #[test]
    fn test_to_value_uses_record_field_names() {
        let msg = Message::image("gs://b/x.jpg").from_sender(Some(&Identity {
            uid: "u1".into(),
            display_name: Some("Bob".into()),
            photo_url: None,
        }));
        let value = msg.to_value();
        assert_eq!(value[fields::NAME], "Bob");
        assert_eq!(value[fields::IMAGE_URL], "gs://b/x.jpg");
        assert!(value.get(fields::PHOTO_URL).is_none());
        assert!(value.get(fields::TEXT).is_none());
    }

    #[test]
    fn test_upload_paths() {
        let captured = LocalImageHandle::Captured {
            jpeg: Bytes::from_static(b"jpeg"),
        };
        assert_eq!(captured.upload_path("uid", 1234), "uid/1234.jpg");
        assert_eq!(captured.content_type().as_deref(), Some("image/jpeg"));

        let picked = LocalImageHandle::Library {
            bytes: Bytes::from_static(b"png"),
            file_name: "/photos/IMG_0001.PNG".into(),
            content_type: None,
        };
        assert_eq!(picked.upload_path("uid", 1234), "uid/1234/IMG_0001.PNG");
        assert_eq!(picked.content_type(), None);
    }
}
