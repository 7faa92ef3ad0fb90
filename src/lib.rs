//! FriendlyChat client library.
//!
//! This module re-exports the core components for testing and extension.

pub mod backend;
pub mod capabilities;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod feed;
pub mod http;
pub mod input_state;
pub mod logging;
pub mod memory;
pub mod message;
pub mod notifications;
pub mod protocol;
pub mod state;
pub mod validation;

#[cfg(test)]
mod backend_tests;

pub use controller::MessageFeedController;
pub use events::FeedChange;
