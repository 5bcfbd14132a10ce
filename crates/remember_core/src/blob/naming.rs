//! Deterministic on-disk naming for memory directories and artifacts.
//!
//! # Invariants
//! - `directory_name` is pure: the same memory content always yields the
//!   same name.
//! - Only item names and the id take part in the name.
//! - Names never contain path separators and never equal the reserved
//!   config directory name (they always end with `_<id prefix>` or are the
//!   bare id prefix).

use crate::model::memory::Memory;

/// Reserved sub-directory of the blob root holding configuration and the
/// record-store files.
pub const CONFIG_DIRECTORY_NAME: &str = ".config";
pub const ORIGINAL_FILE_NAME: &str = "original.jpg";
pub const PREVIEW_FILE_NAME: &str = "preview.jpg";
pub const THUMBNAIL_FILE_NAME: &str = "thumbnail.png";
pub const SIDECAR_FILE_NAME: &str = "memory.txt";

/// Every file a complete memory directory must contain.
pub const ARTIFACT_FILE_NAMES: [&str; 4] = [
    ORIGINAL_FILE_NAME,
    PREVIEW_FILE_NAME,
    THUMBNAIL_FILE_NAME,
    SIDECAR_FILE_NAME,
];

const MAX_NAMED_ITEMS: usize = 3;
const MAX_ITEM_NAME_CHARS: usize = 15;
const ID_PREFIX_CHARS: usize = 6;
const ALLOWED_SYMBOLS: &str = "!$&'+,-.;=@_~";

/// Computes the directory name of a memory.
///
/// Format: `<name1>-<name2>-<name3>[+<extra>]_<id prefix>`, item names sorted,
/// sanitized and truncated; just `<id prefix>` when the name part is empty.
pub fn directory_name(memory: &Memory) -> String {
    let suffix: String = memory.id.to_string().chars().take(ID_PREFIX_CHARS).collect();

    let mut names: Vec<&str> = memory.items.iter().map(|item| item.name.as_str()).collect();
    names.sort_unstable();

    let mut prefix = names
        .iter()
        .take(MAX_NAMED_ITEMS)
        .map(|name| sanitize_component(name))
        .collect::<Vec<_>>()
        .join("-");
    if names.len() > MAX_NAMED_ITEMS {
        prefix.push_str(&format!("+{}", names.len() - MAX_NAMED_ITEMS));
    }

    if prefix.is_empty() {
        suffix
    } else {
        format!("{prefix}_{suffix}")
    }
}

/// Maps characters outside the filesystem-safe set to `_` and keeps at most
/// 15 characters.
pub fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|ch| if is_folder_safe(ch) { ch } else { '_' })
        .take(MAX_ITEM_NAME_CHARS)
        .collect()
}

fn is_folder_safe(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ALLOWED_SYMBOLS.contains(ch)
}

#[cfg(test)]
mod tests {
    use super::{directory_name, sanitize_component};
    use crate::model::memory::{Item, Memory, Point};
    use uuid::Uuid;

    fn memory_with_items(names: &[&str]) -> Memory {
        let id = Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000000").unwrap();
        let mut memory = Memory::with_id(id, 0);
        for name in names {
            memory.items.push(Item::new(*name, Point::ZERO));
        }
        memory
    }

    #[test]
    fn sanitize_replaces_unsafe_characters_and_truncates() {
        assert_eq!(sanitize_component("a/b:c d"), "a_b_c_d");
        assert_eq!(sanitize_component("Schlüssel"), "Schl_ssel");
        assert_eq!(sanitize_component("abcdefghijklmnopqrst"), "abcdefghijklmno");
        assert_eq!(sanitize_component("(x)*[y]{z}"), "_x___y__z_");
    }

    #[test]
    fn name_uses_sorted_first_three_items_and_extra_count() {
        let memory = memory_with_items(&["wallet", "keys", "phone", "glasses"]);
        assert_eq!(directory_name(&memory), "glasses-keys-phone+1_a1b2c3");
    }

    #[test]
    fn name_falls_back_to_id_prefix() {
        assert_eq!(directory_name(&memory_with_items(&[])), "a1b2c3");
        assert_eq!(directory_name(&memory_with_items(&[""])), "a1b2c3");
    }

    #[test]
    fn name_is_stable_for_unchanged_memory() {
        let memory = memory_with_items(&["Wallet", "Car keys"]);
        assert_eq!(directory_name(&memory), directory_name(&memory.clone()));
        assert_eq!(directory_name(&memory), "Car_keys-Wallet_a1b2c3");
    }
}
