//! Pending composer input, guarded by the message length limit.

use std::ops::Range;

use crate::validation;

/// The message currently being composed.
#[derive(Default, Debug, Clone)]
pub struct InputState {
    /// Current message being composed
    pub message_input: String,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a keystroke-level edit if the result stays within `limit` chars.
    ///
    /// `range` is in chars of the current input. Returns whether the edit
    /// was accepted; a rejected edit leaves the input untouched.
    pub fn replace_range(&mut self, range: Range<usize>, replacement: &str, limit: usize) -> bool {
        if !validation::edit_fits(&self.message_input, &range, replacement, limit) {
            return false;
        }
        self.message_input = validation::apply_edit(&self.message_input, &range, replacement);
        true
    }

    /// Append typed text at the end of the input.
    pub fn type_text(&mut self, text: &str, limit: usize) -> bool {
        let end = self.message_input.chars().count();
        self.replace_range(end..end, text, limit)
    }

    /// Take the pending input, leaving the composer empty.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.message_input)
    }

    pub fn len_chars(&self) -> usize {
        self.message_input.chars().count()
    }
}
