//! Memory domain model.
//!
//! # Responsibility
//! - Define `Memory` and the values it owns (`Item`, `Location`,
//!   `RecognizedText`) plus the shared `Tag` vocabulary entry.
//! - Provide lifecycle helpers for capture and edit flows.
//!
//! # Invariants
//! - `id` is stable and never reused for another memory.
//! - `items` are kept ordered by name (ties broken by id).
//! - `tags` is a set; label comparison is exact and case-sensitive.
//! - Timestamps are Unix epoch milliseconds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier of a memory.
pub type MemoryId = Uuid;

/// Stable identifier of an item inside a memory.
pub type ItemId = Uuid;

/// 2D point in original-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in original-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A named, positioned label attached to a memory's image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Label anchor in original-image coordinates.
    pub center: Point,
    pub created_at: i64,
    pub modified_at: i64,
}

impl Item {
    /// Creates an item with a generated id, timestamped now.
    pub fn new(name: impl Into<String>, center: Point) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            center,
            created_at: now,
            modified_at: now,
        }
    }

    /// Compares id, name and geometry, ignoring timestamps.
    pub fn same_content(&self, other: &Item) -> bool {
        self.id == other.id && self.name == other.name && self.center == other.center
    }
}

/// Reusable label, many-to-many with memories.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub label: String,
}

impl Tag {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

/// Capture location of a memory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub long: f64,
}

impl Location {
    pub fn new(lat: f64, long: f64) -> Self {
        Self { lat, long }
    }
}

/// One recognized word or line and its bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFrame {
    pub text: String,
    pub frame: Rect,
}

/// Text recognized in a memory's photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedText {
    pub id: Uuid,
    /// Full recognized body, used for search.
    pub text: String,
    /// Frames in reading order.
    pub frames: Vec<TextFrame>,
}

impl RecognizedText {
    /// Builds a value from the text-recognition collaborator output.
    pub fn from_recognition(
        full_text: impl Into<String>,
        words: impl IntoIterator<Item = (String, Rect)>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: full_text.into(),
            frames: words
                .into_iter()
                .map(|(text, frame)| TextFrame { text, frame })
                .collect(),
        }
    }
}

/// Top-level catalogued entity: one remembered item or scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    pub created_at: i64,
    /// Strictly increases on every persisted edit.
    pub modified_at: i64,
    pub notes: String,
    pub is_private: bool,
    pub items: Vec<Item>,
    pub tags: BTreeSet<Tag>,
    pub location: Option<Location>,
    pub recognized_text: Option<RecognizedText>,
}

impl Memory {
    /// Creates an empty memory with a generated id, timestamped now.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4(), now_epoch_ms())
    }

    /// Creates an empty memory with a caller-provided id.
    ///
    /// Used by recovery/import paths where identity already exists.
    pub fn with_id(id: MemoryId, created_at: i64) -> Self {
        Self {
            id,
            created_at,
            modified_at: created_at,
            notes: String::new(),
            is_private: false,
            items: Vec::new(),
            tags: BTreeSet::new(),
            location: None,
            recognized_text: None,
        }
    }

    /// Creates a freshly captured memory with one unnamed placeholder item at
    /// the capture focus point.
    pub fn capture(focus: Point) -> Self {
        let mut memory = Self::new();
        let mut item = Item::new("", focus);
        item.created_at = memory.created_at;
        item.modified_at = memory.created_at;
        memory.items.push(item);
        memory
    }

    /// Returns whether the user has not labelled this memory yet.
    pub fn is_new(&self) -> bool {
        self.tags.is_empty()
            && (self.items.is_empty() || (self.items.len() == 1 && self.items[0].name.is_empty()))
    }

    /// Item names sorted and joined for list display.
    pub fn display_title(&self) -> String {
        let mut names: Vec<&str> = self.items.iter().map(|item| item.name.as_str()).collect();
        names.sort_unstable();
        names.join(", ")
    }

    /// Orders items by name, then by id.
    pub fn sort_items(&mut self) {
        self.items.sort_by(|left, right| {
            left.name
                .cmp(&right.name)
                .then_with(|| left.id.cmp(&right.id))
        });
    }

    /// Returns whether two values describe the same content, ignoring
    /// modification timestamps of the memory and of its items.
    pub fn same_content(&self, other: &Memory) -> bool {
        self.id == other.id
            && self.created_at == other.created_at
            && self.notes == other.notes
            && self.is_private == other.is_private
            && self.tags == other.tags
            && self.location == other.location
            && self.recognized_text == other.recognized_text
            && self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(other.items.iter())
                .all(|(left, right)| left.same_content(right))
    }

    /// Finds an item by id.
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}
