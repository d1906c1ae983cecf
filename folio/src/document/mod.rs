use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A stored document: envelope fields plus typed data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document<T> {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: T,
}

/// A document whose data has not been decoded into a model type
pub type RawDocument = Document<serde_json::Value>;

/// Envelope keys that never live inside document data
pub const ENVELOPE_FIELDS: [&str; 3] = ["id", "createdAt", "updatedAt"];

impl RawDocument {
    /// Decode the data into a model type, keeping the envelope.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Document<T>> {
        let data: T = serde_json::from_value(self.data.clone())?;
        Ok(Document {
            id: self.id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            data,
        })
    }

    /// String value of a top-level data field, if present.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(|v| v.as_str())
    }
}

impl<T: Serialize> Document<T> {
    /// Flatten the document into one JSON object (envelope + data fields).
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
