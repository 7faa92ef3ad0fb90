//! In-process implementations of every capability.
//!
//! They back the demo binary and the test suites. Each one counts the calls
//! it receives and can be switched into a failing mode, so tests can observe
//! which service a feed operation reached.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::capabilities::{
    BlobStore, Capabilities, ConfigValue, IdentityProvider, ImageFetcher, RealtimeStream, RemoteConfig,
    StreamRecord, Subscription, SubscriptionId, ValueSource,
};
use crate::error::{CapabilityError, CapabilityResult};
use crate::message::{Identity, Message};

pub const STORE_SCHEME: &str = "gs://";

/// `bucket/object/path` after the scheme has been stripped
static OBJECT_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<bucket>[^/]+)/(?P<path>.+)$").expect("valid regex"));

// ============================================================================
// Realtime stream
// ============================================================================

#[derive(Default)]
struct StreamInner {
    /// Stored records per path, in append order
    records: HashMap<String, Vec<(String, Value)>>,
    subscribers: HashMap<u64, (String, mpsc::UnboundedSender<StreamRecord>)>,
    next_subscription: u64,
    next_key: u64,
}

/// Realtime database holding message records in memory.
///
/// A new subscriber first receives every record already stored under its
/// path, then live appends, mirroring child-added semantics.
#[derive(Default)]
pub struct MemoryStream {
    inner: Mutex<StreamInner>,
    appends: AtomicUsize,
    fail_appends: AtomicBool,
    fail_subscribes: AtomicBool,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful appends so far.
    pub fn append_count(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_subscribes(&self, fail: bool) {
        self.fail_subscribes.store(fail, Ordering::SeqCst);
    }

    /// Stored messages under `path`, in append order.
    pub fn messages(&self, path: &str) -> Vec<Message> {
        self.lock()
            .records
            .get(path)
            .map(|records| records.iter().map(|(_, v)| Message::from_value(v)).collect())
            .unwrap_or_default()
    }

    /// Push a raw record to current subscribers without storing it.
    ///
    /// Used to simulate redelivery of an existing key or a malformed record.
    pub fn deliver(&self, path: &str, key: &str, value: Value) {
        let mut inner = self.lock();
        broadcast(&mut inner, path, key, &value);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StreamInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn broadcast(inner: &mut StreamInner, path: &str, key: &str, value: &Value) {
    let message = Message::from_value(value);
    inner.subscribers.retain(|_, (sub_path, tx)| {
        if sub_path.as_str() != path {
            return true;
        }
        tx.send(StreamRecord {
            key: key.to_string(),
            message: message.clone(),
        })
        .is_ok()
    });
}

#[async_trait]
impl RealtimeStream for MemoryStream {
    async fn subscribe(&self, path: &str) -> CapabilityResult<Subscription> {
        if self.fail_subscribes.load(Ordering::SeqCst) {
            return Err(CapabilityError::Rejected(format!("permission denied at {}", path)));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        if let Some(existing) = inner.records.get(path) {
            for (key, value) in existing {
                let _ = tx.send(StreamRecord {
                    key: key.clone(),
                    message: Message::from_value(value),
                });
            }
        }
        inner.next_subscription += 1;
        let id = inner.next_subscription;
        inner.subscribers.insert(id, (path.to_string(), tx));
        Ok(Subscription {
            id: SubscriptionId(id),
            records: rx,
        })
    }

    async fn append(&self, path: &str, message: Message) -> CapabilityResult<String> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(CapabilityError::Network("database unreachable".into()));
        }
        let value = message.to_value();
        let mut inner = self.lock();
        inner.next_key += 1;
        // Time-prefixed keys sort in creation order, like generated push ids
        let key = format!("-{:012x}{:06}", Utc::now().timestamp_millis(), inner.next_key);
        inner
            .records
            .entry(path.to_string())
            .or_default()
            .push((key.clone(), value.clone()));
        broadcast(&mut inner, path, &key, &value);
        self.appends.fetch_add(1, Ordering::SeqCst);
        Ok(key)
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().subscribers.remove(&id.0);
    }
}

// ============================================================================
// Blob store
// ============================================================================

struct StoredObject {
    bytes: Bytes,
    content_type: Option<String>,
}

/// Object storage for uploaded images, addressed as `gs://{bucket}/{path}`.
pub struct MemoryBlobStore {
    bucket: String,
    objects: Mutex<HashMap<String, StoredObject>>,
    uploads: AtomicUsize,
    resolves: AtomicUsize,
    fail_uploads: AtomicBool,
    upload_delay_ms: AtomicU64,
}

impl MemoryBlobStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Mutex::new(HashMap::new()),
            uploads: AtomicUsize::new(0),
            resolves: AtomicUsize::new(0),
            fail_uploads: AtomicBool::new(false),
            upload_delay_ms: AtomicU64::new(0),
        }
    }

    pub fn reference_for(&self, path: &str) -> String {
        format!("{}{}/{}", STORE_SCHEME, self.bucket, path)
    }

    /// Store an object directly and return its reference.
    pub fn insert(&self, path: &str, bytes: Bytes) -> String {
        self.lock().insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: None,
            },
        );
        self.reference_for(path)
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn resolve_count(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Make every upload take `delay` before it completes.
    pub fn set_upload_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.upload_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Content type recorded for the object at `path`.
    pub fn content_type(&self, path: &str) -> Option<String> {
        self.lock().get(path).and_then(|obj| obj.content_type.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn scheme(&self) -> &str {
        STORE_SCHEME
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: Option<String>,
    ) -> CapabilityResult<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let delay = self.upload_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(CapabilityError::Network("upload interrupted".into()));
        }
        if path.is_empty() {
            return Err(CapabilityError::InvalidReference("empty object path".into()));
        }
        self.lock().insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type,
            },
        );
        Ok(self.reference_for(path))
    }

    async fn resolve(&self, reference: &str) -> CapabilityResult<Bytes> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        let rest = reference
            .strip_prefix(STORE_SCHEME)
            .ok_or_else(|| CapabilityError::InvalidReference(reference.to_string()))?;
        let caps = OBJECT_REFERENCE
            .captures(rest)
            .ok_or_else(|| CapabilityError::InvalidReference(reference.to_string()))?;
        if &caps["bucket"] != self.bucket {
            return Err(CapabilityError::NotFound(reference.to_string()));
        }
        self.lock()
            .get(&caps["path"])
            .map(|obj| obj.bytes.clone())
            .ok_or_else(|| CapabilityError::NotFound(reference.to_string()))
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Identity provider with a fixed, replaceable signed-in user.
#[derive(Default)]
pub struct StaticIdentity {
    current: RwLock<Option<Identity>>,
    fail_sign_out: AtomicBool,
}

impl StaticIdentity {
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            current: RwLock::new(Some(identity)),
            fail_sign_out: AtomicBool::new(false),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn set_fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Option<Identity> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn sign_out(&self) -> CapabilityResult<()> {
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(CapabilityError::Rejected("keychain unavailable".into()));
        }
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

// ============================================================================
// Remote config
// ============================================================================

/// Remote config that answers every fetch with a preset response.
pub struct StaticRemoteConfig {
    response: Mutex<Result<ConfigValue, String>>,
    fetches: AtomicUsize,
    /// Expiration of the last fetch, in milliseconds
    last_expiration_ms: AtomicU64,
}

impl StaticRemoteConfig {
    pub fn new(response: Result<ConfigValue, String>) -> Self {
        Self {
            response: Mutex::new(response),
            fetches: AtomicUsize::new(0),
            last_expiration_ms: AtomicU64::new(u64::MAX),
        }
    }

    /// A server-side value for `friendly_msg_length`.
    pub fn remote(length: f64) -> Self {
        Self::new(Ok(ConfigValue {
            friendly_msg_length: length,
            source: ValueSource::Remote,
        }))
    }

    pub fn set_response(&self, response: Result<ConfigValue, String>) {
        *self.response.lock().unwrap_or_else(|e| e.into_inner()) = response;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn last_expiration(&self) -> Option<Duration> {
        match self.last_expiration_ms.load(Ordering::SeqCst) {
            u64::MAX => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

#[async_trait]
impl RemoteConfig for StaticRemoteConfig {
    async fn fetch(&self, expiration: Duration) -> CapabilityResult<ConfigValue> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.last_expiration_ms
            .store(expiration.as_millis() as u64, Ordering::SeqCst);
        self.response
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .map_err(CapabilityError::Network)
    }
}

// ============================================================================
// Direct image fetch
// ============================================================================

/// Image fetcher serving a fixed set of URLs.
#[derive(Default)]
pub struct MemoryImageFetcher {
    images: Mutex<HashMap<String, Bytes>>,
    fetches: AtomicUsize,
}

impl MemoryImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, bytes: Bytes) {
        self.images
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.into(), bytes);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for MemoryImageFetcher {
    async fn fetch(&self, url: &str) -> CapabilityResult<Bytes> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        reqwest::Url::parse(url).map_err(|e| CapabilityError::InvalidReference(e.to_string()))?;
        self.images
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .cloned()
            .ok_or_else(|| CapabilityError::NotFound(url.to_string()))
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// One of each in-memory service, kept typed so callers can inspect them.
#[derive(Clone)]
pub struct MemoryServices {
    pub stream: Arc<MemoryStream>,
    pub store: Arc<MemoryBlobStore>,
    pub identity: Arc<StaticIdentity>,
    pub remote_config: Arc<StaticRemoteConfig>,
    pub fetcher: Arc<MemoryImageFetcher>,
}

impl MemoryServices {
    /// Services with `identity` signed in and remote config answering with
    /// a compiled-in (static) value.
    pub fn new(bucket: &str, identity: Option<Identity>) -> Self {
        let identity = match identity {
            Some(identity) => StaticIdentity::signed_in(identity),
            None => StaticIdentity::signed_out(),
        };
        Self {
            stream: Arc::new(MemoryStream::new()),
            store: Arc::new(MemoryBlobStore::new(bucket)),
            identity: Arc::new(identity),
            remote_config: Arc::new(StaticRemoteConfig::new(Ok(ConfigValue {
                friendly_msg_length: crate::config::DEFAULT_MESSAGE_LENGTH as f64,
                source: ValueSource::Static,
            }))),
            fetcher: Arc::new(MemoryImageFetcher::new()),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            stream: self.stream.clone(),
            store: self.store.clone(),
            identity: self.identity.clone(),
            remote_config: self.remote_config.clone(),
            fetcher: self.fetcher.clone(),
        }
    }
}
