use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One extracted review. Immutable once created; corrections require
/// re-extraction, not patching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Stable dedup key derived from content, never from DOM position.
    pub fingerprint: String,
    pub author: Option<String>,
    /// Star rating 1-5 when the rating element parsed cleanly.
    pub rating: Option<u8>,
    /// Free-form relative or absolute date string, kept verbatim.
    pub date_text: Option<String>,
    /// Fully expanded review text, never truncated.
    pub body: String,
    /// Best-effort BCP-47 tag read from the review node.
    pub language: Option<String>,
}

impl ReviewRecord {
    /// Build a record, deriving the fingerprint from its stable fields.
    ///
    /// `author_key` should be the site's own review id when available, since
    /// that survives re-renders; the author display name is the fallback.
    pub fn new(
        author_key: &str,
        author: Option<String>,
        rating: Option<u8>,
        date_text: Option<String>,
        body: String,
        language: Option<String>,
    ) -> Self {
        let fingerprint = Self::fingerprint(author_key, date_text.as_deref().unwrap_or(""), &body);
        Self {
            fingerprint,
            author,
            rating,
            date_text,
            body,
            language,
        }
    }

    /// Deterministic fingerprint over author identity, date text and the
    /// whitespace-normalized body.
    pub fn fingerprint(author_key: &str, date_text: &str, body: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(author_key.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(date_text.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(normalize_body(body).as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Collapse runs of whitespace so that layout-only differences between
/// re-renders of the same review do not change its fingerprint.
pub fn normalize_body(body: &str) -> String {
    body.split_whitespace().collect::<Vec<_>>().join(" ")
}
