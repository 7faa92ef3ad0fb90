//! Capability traits for the hosted backend services the feed depends on.
//!
//! The controller never reaches for global SDK handles. A [`Capabilities`]
//! bundle is built once and moved onto the backend thread, which is the only
//! place these traits are called from.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::CapabilityResult;
use crate::message::{Identity, Message};

/// Identifier of a live stream subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// One appended record, delivered in stream order.
#[derive(Clone, Debug)]
pub struct StreamRecord {
    /// Store-generated unique key
    pub key: String,
    pub message: Message,
}

/// A live subscription: records arrive on `records` until `unsubscribe` is
/// called with `id` or the stream closes the channel.
pub struct Subscription {
    pub id: SubscriptionId,
    pub records: mpsc::UnboundedReceiver<StreamRecord>,
}

/// Append-only, order-preserving push channel of message records.
#[async_trait]
pub trait RealtimeStream: Send + Sync + 'static {
    async fn subscribe(&self, path: &str) -> CapabilityResult<Subscription>;
    /// Push a new record under a store-generated key and return that key.
    async fn append(&self, path: &str, message: Message) -> CapabilityResult<String>;
    async fn unsubscribe(&self, id: SubscriptionId);
}

/// Path-addressable object storage for images.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Reserved prefix of references that must be resolved through this store.
    fn scheme(&self) -> &str;

    /// Upload bytes and return the reference descriptor of the stored object.
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: Option<String>,
    ) -> CapabilityResult<String>;

    async fn resolve(&self, reference: &str) -> CapabilityResult<Bytes>;

    fn owns(&self, reference: &str) -> bool {
        reference.starts_with(self.scheme())
    }
}

/// Authentication service yielding the signed-in user's profile.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    fn current_identity(&self) -> Option<Identity>;
    async fn sign_out(&self) -> CapabilityResult<()>;
}

/// Where a remote config value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueSource {
    /// Compiled-in fallback; no value exists anywhere else
    Static,
    /// In-app default registered with the config client
    Default,
    /// Fetched from the server
    Remote,
}

/// Result of a remote config fetch for the keys the feed cares about.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfigValue {
    pub friendly_msg_length: f64,
    pub source: ValueSource,
}

/// Externally controlled feature flags with client-side caching.
#[async_trait]
pub trait RemoteConfig: Send + Sync + 'static {
    /// Fetch and activate config, reusing cached values younger than `expiration`.
    async fn fetch(&self, expiration: Duration) -> CapabilityResult<ConfigValue>;
}

/// Direct network fetch of a plain image URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &str) -> CapabilityResult<Bytes>;
}

/// The full set of services handed to the backend.
#[derive(Clone)]
pub struct Capabilities {
    pub stream: Arc<dyn RealtimeStream>,
    pub store: Arc<dyn BlobStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub remote_config: Arc<dyn RemoteConfig>,
    pub fetcher: Arc<dyn ImageFetcher>,
}
