//! Sidecar (`memory.txt`) encoding and memory recovery.
//!
//! # Responsibility
//! - Snapshot the portable subset of a memory as pretty, key-sorted JSON.
//! - Rebuild a memory from a sidecar during recovery.
//!
//! # Invariants
//! - Encoding is lossy: item geometry, item ids, privacy and text frames are
//!   not written. Recovered items get a zero center and fresh ids.
//! - Empty collections and absent optionals are omitted.
//! - Field declaration order is alphabetical so keys serialize sorted.

use crate::model::memory::{Item, Location, Memory, Point, RecognizedText, Tag};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const CREATED_WRITE_FORMAT: &str = "%b %-d, %Y at %-I:%M:%S %p";
const CREATED_PARSE_FORMAT: &str = "%b %d, %Y at %I:%M:%S %p";

pub type SidecarResult<T> = Result<T, SidecarError>;

/// Sidecar decode/encode failure.
#[derive(Debug)]
pub enum SidecarError {
    Json(serde_json::Error),
    InvalidId(String),
    InvalidCreated(String),
}

impl Display for SidecarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid sidecar json: {err}"),
            Self::InvalidId(value) => write!(f, "invalid sidecar id `{value}`"),
            Self::InvalidCreated(value) => write!(f, "invalid sidecar created date `{value}`"),
        }
    }
}

impl Error for SidecarError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::InvalidId(_) | Self::InvalidCreated(_) => None,
        }
    }
}

impl From<serde_json::Error> for SidecarError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SidecarLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// On-disk sidecar document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sidecar {
    pub created: String,
    #[serde(
        rename = "detectedTextInPhoto",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub detected_text_in_photo: Option<String>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SidecarLocation>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Sidecar {
    pub fn from_memory(memory: &Memory) -> Self {
        let mut items: Vec<String> = memory.items.iter().map(|item| item.name.clone()).collect();
        items.sort();
        Self {
            created: format_created(memory.created_at),
            detected_text_in_photo: memory
                .recognized_text
                .as_ref()
                .map(|recognized| recognized.text.clone()),
            id: memory.id.to_string(),
            items,
            location: memory.location.map(|location| SidecarLocation {
                latitude: location.lat,
                longitude: location.long,
            }),
            notes: memory.notes.clone(),
            tags: memory.tags.iter().map(|tag| tag.label.clone()).collect(),
        }
    }

    pub fn encode(&self) -> SidecarResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn decode(bytes: &[u8]) -> SidecarResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Reconstructs a memory. `modified_at` equals `created_at`.
    pub fn to_memory(&self) -> SidecarResult<Memory> {
        let id = Uuid::parse_str(self.id.trim())
            .map_err(|_| SidecarError::InvalidId(self.id.clone()))?;
        let created_at = parse_created(&self.created)
            .ok_or_else(|| SidecarError::InvalidCreated(self.created.clone()))?;

        let mut memory = Memory::with_id(id, created_at);
        memory.notes = self.notes.clone();
        memory.tags = self.tags.iter().map(Tag::new).collect();
        memory.location = self
            .location
            .map(|location| Location::new(location.latitude, location.longitude));
        memory.recognized_text = self
            .detected_text_in_photo
            .as_ref()
            .map(|text| RecognizedText::from_recognition(text.clone(), Vec::new()));
        memory.items = self
            .items
            .iter()
            .map(|name| {
                let mut item = Item::new(name.clone(), Point::ZERO);
                item.created_at = created_at;
                item.modified_at = created_at;
                item
            })
            .collect();
        memory.sort_items();
        Ok(memory)
    }
}

/// Encodes the sidecar bytes for `memory`.
pub fn encode_memory(memory: &Memory) -> SidecarResult<Vec<u8>> {
    Sidecar::from_memory(memory).encode()
}

/// Decodes sidecar bytes straight into a recovered memory.
pub fn decode_memory(bytes: &[u8]) -> SidecarResult<Memory> {
    Sidecar::decode(bytes)?.to_memory()
}

/// Formats an epoch-millisecond timestamp as a medium local date/time.
pub fn format_created(epoch_ms: i64) -> String {
    let utc = DateTime::<Utc>::from_timestamp_millis(epoch_ms).unwrap_or_default();
    utc.with_timezone(&Local)
        .format(CREATED_WRITE_FORMAT)
        .to_string()
}

/// Parses a medium local date/time or an RFC 3339 timestamp.
pub fn parse_created(value: &str) -> Option<i64> {
    let normalized = value.trim().replace(['\u{202f}', '\u{a0}'], " ");
    if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, CREATED_PARSE_FORMAT) {
        return Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.timestamp_millis());
    }
    DateTime::parse_from_rfc3339(&normalized)
        .ok()
        .map(|parsed| parsed.timestamp_millis())
}
