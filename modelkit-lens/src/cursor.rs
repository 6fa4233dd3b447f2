//! Opaque cursor tokens for cursor pagination.
//!
//! A token is URL-safe, unpadded base64 of
//! `{"id": <record id>, "_pointsToNextItems": <bool>}`.

use crate::error::{LensError, LensResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use modelkit_model::RecordId;
use serde::{Deserialize, Serialize};

/// Position in an id-ordered result set plus the direction to read from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub id: RecordId,
    #[serde(rename = "_pointsToNextItems")]
    pub points_to_next: bool,
}

impl Cursor {
    /// Cursor reading rows after `id`.
    pub fn next(id: RecordId) -> Self {
        Self {
            id,
            points_to_next: true,
        }
    }

    /// Cursor reading rows before `id`.
    pub fn prev(id: RecordId) -> Self {
        Self {
            id,
            points_to_next: false,
        }
    }

    pub fn encode(&self) -> String {
        let json = format!(
            r#"{{"id":{},"_pointsToNextItems":{}}}"#,
            self.id.get(),
            self.points_to_next
        );
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> LensResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim().trim_end_matches('='))
            .map_err(|e| LensError::InvalidCursor(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| LensError::InvalidCursor(e.to_string()))
    }
}
