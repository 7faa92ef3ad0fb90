use bytes::Bytes;

use crate::message::Message;

/// One entry of the feed: the stream key and the decoded record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedEntry {
    pub key: String,
    pub message: Message,
}

/// Display image for a row
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowImage {
    /// Generic account icon shown next to text messages
    AccountPlaceholder,
    /// A resolution is in flight and nothing has loaded yet
    Loading,
    Loaded(Bytes),
    /// Resolution failed; shown instead of the image
    Fallback,
}

/// Presentation of a single feed row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedRow {
    pub index: usize,
    pub label: String,
    pub image: RowImage,
}

/// Ordered, append-only view of the remote message stream.
///
/// Entries are never removed or mutated once pushed, so an index names the
/// same message for the lifetime of the feed. Row images are tracked in a
/// parallel vector and are the only per-index state that changes.
#[derive(Default, Clone, Debug)]
pub struct Feed {
    entries: Vec<FeedEntry>,
    images: Vec<RowImage>,
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return its index.
    pub fn push(&mut self, key: String, message: Message) -> usize {
        let image = if message.is_image() {
            RowImage::Loading
        } else {
            RowImage::AccountPlaceholder
        };
        self.entries.push(FeedEntry { key, message });
        self.images.push(image);
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FeedEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }

    pub fn image(&self, index: usize) -> Option<&RowImage> {
        self.images.get(index)
    }

    /// Replace the display image of one row. Returns false for unknown indices.
    pub fn set_image(&mut self, index: usize, image: RowImage) -> bool {
        match self.images.get_mut(index) {
            Some(slot) => {
                *slot = image;
                true
            }
            None => false,
        }
    }

    /// Mark a row as loading unless it already shows a loaded image.
    pub fn begin_loading(&mut self, index: usize) {
        if let Some(slot) = self.images.get_mut(index) {
            if !matches!(slot, RowImage::Loaded(_)) {
                *slot = RowImage::Loading;
            }
        }
    }

    /// Build the row presentation for `index`.
    pub fn row(&self, index: usize) -> Option<RenderedRow> {
        let entry = self.entries.get(index)?;
        let image = self.images.get(index)?.clone();
        Some(RenderedRow {
            index,
            label: row_label(&entry.message),
            image,
        })
    }
}

/// `sent by: name` for image messages, `name: text` otherwise.
pub fn row_label(message: &Message) -> String {
    let name = message.sender_name.as_deref().unwrap_or("");
    if message.is_image() {
        format!("sent by: {}", name)
    } else {
        format!("{}: {}", name, message.text.as_deref().unwrap_or(""))
    }
}
