//! Direct image fetches over HTTP(S).

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Url};

use crate::capabilities::ImageFetcher;
use crate::error::{CapabilityError, CapabilityResult};

/// Fetches plain image URLs (profile pictures, externally hosted images).
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> CapabilityResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

/// Parse an image URL, accepting only http and https.
pub fn parse_image_url(url: &str) -> CapabilityResult<Url> {
    let parsed = Url::parse(url).map_err(|e| CapabilityError::InvalidReference(format!("{}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(CapabilityError::InvalidReference(format!(
            "unsupported scheme '{}' in {}",
            other, url
        ))),
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> CapabilityResult<Bytes> {
        let url = parse_image_url(url)?;
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }
}
