use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Vision provider API key is not configured")]
    MissingApiKey,
    #[error("Vision provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Vision provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Vision provider returned an unreadable response: {0}")]
    MalformedResponse(String),
    #[error("Vision provider error: {0}")]
    Provider(String),
}

/// An uploaded tag photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

impl TagImage {
    /// Wrap raw bytes, sniffing the mime type from the magic bytes. Formats
    /// the `image` crate cannot identify are sent as JPEG.
    pub fn new(bytes: Vec<u8>) -> Self {
        let mime = image::guess_format(&bytes)
            .map(|format| format.to_mime_type())
            .unwrap_or("image/jpeg");
        Self { bytes, mime }
    }

    /// `data:<mime>;base64,<payload>` as accepted by vision chat APIs.
    pub fn data_url(&self) -> String {
        let payload = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{payload}", self.mime)
    }
}

/// Abstraction over the vision provider that reads a tag photo.
///
/// The returned JSON is whatever the provider produced; it is only trusted
/// after [`ecotag_core::normalize`].
#[async_trait]
pub trait TagExtractor: Send + Sync {
    async fn extract(&self, image: &TagImage) -> Result<Value, ExtractError>;
}

// ── Mock extractor (always available, used for tests) ─────────────────────────

/// Returns a pre-set response or failure and counts how often it was asked.
pub struct MockExtractor {
    response: Result<Value, String>,
    calls: AtomicUsize,
}

impl MockExtractor {
    pub fn new(response: Value) -> Self {
        Self { response: Ok(response), calls: AtomicUsize::new(0) }
    }

    /// Every call fails with `ExtractError::Provider(message)`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { response: Err(message.into()), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TagExtractor for MockExtractor {
    async fn extract(&self, _image: &TagImage) -> Result<Value, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone().map_err(ExtractError::Provider)
    }
}
