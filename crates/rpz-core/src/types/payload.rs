use chrono::{DateTime, Utc};

/// Bytes of one successful download, handed by value to the normalizer
#[derive(Debug, Clone)]
pub struct RawPayload {
    /// Source the bytes came from
    pub source_id: String,
    /// Response body
    pub bytes: Vec<u8>,
    /// When the final attempt completed
    pub fetched_at: DateTime<Utc>,
    /// HTTP status of the final attempt
    pub http_status: u16,
}

impl RawPayload {
    /// Wrap a response body fetched just now
    #[must_use]
    pub fn new(source_id: impl Into<String>, bytes: Vec<u8>, http_status: u16) -> Self {
        Self {
            source_id: source_id.into(),
            bytes,
            fetched_at: Utc::now(),
            http_status,
        }
    }

    /// Number of bytes received
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the body is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
