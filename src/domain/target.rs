use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::Result;

/// Immutable identity for one scrape subject, as supplied by the discovery
/// collaborator. The core never mutates or re-queries these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetRecord {
    /// Unique place identifier; doubles as the output artifact key.
    #[serde(alias = "place_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    /// Review total reported by the discovery API, if known.
    #[serde(default, alias = "user_ratings_total")]
    pub known_review_count: Option<u64>,
}

impl TargetRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: None,
            rating: None,
            known_review_count: None,
        }
    }

    /// Canonical detail-page URL for this target.
    pub fn detail_url(&self) -> Result<Url> {
        let mut url = Url::parse("https://www.google.com/maps/place/")?;
        url.set_query(Some(&format!("q=place_id:{}", self.id)));
        Ok(url)
    }
}
