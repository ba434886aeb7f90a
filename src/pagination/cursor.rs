use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::error::PaginationError;

/// Position of the last row of a page. Travels over the wire as URL-safe
/// base64 of `{"lastCreatedAt": ..., "lastId": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(rename = "lastCreatedAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "lastId")]
    pub id: Uuid,
}

impl Cursor {
    pub fn new(created_at: DateTime<Utc>, id: Uuid) -> Self {
        Self { created_at, id }
    }

    pub fn encode(&self) -> String {
        let body = json!({ "lastCreatedAt": self.created_at, "lastId": self.id });
        URL_SAFE_NO_PAD.encode(body.to_string())
    }

    pub fn decode(encoded: &str) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim().as_bytes())
            .map_err(|e| PaginationError::InvalidCursor(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| PaginationError::InvalidCursor(e.to_string()))
    }

    /// True when a row sorts strictly after this cursor in newest-first order.
    pub fn precedes(&self, created_at: DateTime<Utc>, id: Uuid) -> bool {
        (created_at, id) < (self.created_at, self.id)
    }
}
