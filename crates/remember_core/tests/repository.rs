use image::DynamicImage;
use remember_core::blob::naming::{SIDECAR_FILE_NAME, THUMBNAIL_FILE_NAME};
use remember_core::blob::sidecar::encode_memory;
use remember_core::{
    FileSystemError, Item, Memory, MemoryService, OpenFailurePolicy, Point, RecordStore,
    RepositoryError, StoreConfig, Tag,
};
use std::path::Path;
use tempfile::TempDir;

fn service_in(dir: &TempDir) -> MemoryService {
    let config =
        StoreConfig::new(dir.path()).with_open_failure_policy(OpenFailurePolicy::Fail);
    let service = MemoryService::new(RecordStore::open_in_memory().unwrap(), config);
    service.configure().unwrap();
    service
}

fn image() -> DynamicImage {
    DynamicImage::new_rgb8(64, 48)
}

fn captured(name: &str) -> Memory {
    let mut memory = Memory::capture(Point::new(32.0, 24.0));
    memory.items[0].name = name.to_string();
    memory
}

fn assert_complete(directory: &Path) {
    for file in ["original.jpg", "preview.jpg", "thumbnail.png", "memory.txt"] {
        assert!(directory.join(file).is_file(), "missing {file}");
    }
}

#[test]
fn configure_creates_layout_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    service.configure().unwrap();

    assert!(dir.path().join("Memories/.config").is_dir());
    assert!(!service.has_memories().unwrap());
}

#[test]
fn save_writes_artifacts_and_round_trips_record() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    let mut memory = captured("Wallet");
    memory.tags.insert(Tag::new("car"));
    memory.notes = "glovebox".to_string();

    service.save(&memory, &image(), &image()).unwrap();

    let stored = service.fetch_by_id(memory.id).unwrap().unwrap();
    assert_eq!(stored, memory);

    let directory = service.blobs().directory_for(&memory);
    assert!(directory
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("Wallet_"));
    assert_complete(&directory);

    let thumbnail = image::open(directory.join(THUMBNAIL_FILE_NAME)).unwrap();
    assert_eq!((thumbnail.width(), thumbnail.height()), (160, 160));
}

#[test]
fn update_renames_directory_and_refreshes_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    let memory = captured("Wallet");
    service.save(&memory, &image(), &image()).unwrap();
    let old_directory = service.blobs().directory_for(&memory);
    let original_bytes = std::fs::read(old_directory.join("original.jpg")).unwrap();
    let thumbnail_bytes = std::fs::read(old_directory.join(THUMBNAIL_FILE_NAME)).unwrap();

    let mut edited = memory.clone();
    edited.items[0].name = "Keys".to_string();
    let updated = service.update(&edited).unwrap();

    assert!(updated.modified_at > memory.modified_at);
    assert!(updated.items[0].modified_at > memory.items[0].modified_at);

    let new_directory = service.blobs().directory_for(&updated);
    assert_ne!(old_directory, new_directory);
    assert!(!old_directory.exists());
    assert_complete(&new_directory);
    assert_eq!(
        std::fs::read(new_directory.join("original.jpg")).unwrap(),
        original_bytes
    );
    assert_eq!(
        std::fs::read(new_directory.join(THUMBNAIL_FILE_NAME)).unwrap(),
        thumbnail_bytes
    );

    let sidecar = std::fs::read_to_string(new_directory.join(SIDECAR_FILE_NAME)).unwrap();
    assert!(sidecar.contains("Keys"));
    assert!(!sidecar.contains("Wallet"));

    let stored = service.fetch_by_id(memory.id).unwrap().unwrap();
    assert_eq!(stored, updated);
}

#[test]
fn save_stores_items_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    let mut memory = captured("Zipper");
    memory.items.push(Item::new("Apple", Point::ZERO));

    service.save(&memory, &image(), &image()).unwrap();

    let mut expected = memory.clone();
    expected.sort_items();
    assert_eq!(service.fetch_by_id(memory.id).unwrap().unwrap(), expected);
    assert!(service
        .blobs()
        .directory_for(&expected)
        .to_string_lossy()
        .contains("Apple-Zipper_"));
    assert_complete(&service.blobs().directory_for(&expected));
}

#[test]
fn occupied_rename_target_rejects_update_before_any_write() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    let memory = captured("Wallet");
    service.save(&memory, &image(), &image()).unwrap();
    let directory = service.blobs().directory_for(&memory);
    let sidecar_before = std::fs::read(directory.join(SIDECAR_FILE_NAME)).unwrap();

    let mut edited = memory.clone();
    edited.items[0].name = "Keys".to_string();
    let occupied = service.blobs().directory_for(&edited);
    std::fs::create_dir_all(&occupied).unwrap();

    assert!(matches!(
        service.update(&edited),
        Err(RepositoryError::FileSystem(FileSystemError::AlreadyExists(path))) if path == occupied
    ));
    assert_eq!(
        std::fs::read(directory.join(SIDECAR_FILE_NAME)).unwrap(),
        sidecar_before
    );
    let stored = service.fetch_by_id(memory.id).unwrap().unwrap();
    assert_eq!(stored.items[0].name, "Wallet");
}

#[test]
fn update_keeps_created_at_in_record_and_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    let memory = captured("Wallet");
    service.save(&memory, &image(), &image()).unwrap();

    let mut edited = memory.clone();
    edited.created_at += 86_400_000;
    edited.notes = "glovebox".to_string();
    let returned = service.update(&edited).unwrap();

    let stored = service.fetch_by_id(memory.id).unwrap().unwrap();
    assert_eq!(returned, stored);
    assert_eq!(stored.created_at, memory.created_at);
    assert_eq!(stored.notes, "glovebox");
    let directory = service.blobs().directory_for(&stored);
    assert_eq!(
        std::fs::read(directory.join(SIDECAR_FILE_NAME)).unwrap(),
        encode_memory(&stored).unwrap()
    );
}

#[test]
fn created_at_alone_is_not_an_edit() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    let memory = captured("Wallet");
    service.save(&memory, &image(), &image()).unwrap();

    let mut shifted = memory.clone();
    shifted.created_at -= 1_000;
    assert_eq!(service.update(&shifted).unwrap(), memory);
}

#[test]
fn update_without_changes_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    let memory = captured("Wallet");
    service.save(&memory, &image(), &image()).unwrap();

    let mut touched = memory.clone();
    touched.modified_at += 10_000;
    let result = service.update(&touched).unwrap();

    assert_eq!(result.modified_at, memory.modified_at);
    let stored = service.fetch_by_id(memory.id).unwrap().unwrap();
    assert_eq!(stored.modified_at, memory.modified_at);
}

#[test]
fn repeated_edits_strictly_increase_modified() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    let memory = captured("Wallet");
    service.save(&memory, &image(), &image()).unwrap();

    let mut current = memory;
    for round in 0..3 {
        let mut edited = current.clone();
        edited.notes = format!("edit {round}");
        let updated = service.update(&edited).unwrap();
        assert!(updated.modified_at > current.modified_at);
        current = updated;
    }
}

#[test]
fn update_of_unknown_memory_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    let memory = captured("Wallet");

    assert!(matches!(
        service.update(&memory),
        Err(RepositoryError::NotFound(id)) if id == memory.id
    ));
    assert!(matches!(
        service.delete(memory.id),
        Err(RepositoryError::NotFound(_))
    ));
}

#[test]
fn item_edits_route_through_update() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    let mut memory = captured("Wallet");
    memory.items.push(Item::new("Glasses", Point::ZERO));
    memory.sort_items();
    service.save(&memory, &image(), &image()).unwrap();

    let mut wallet = memory.items[1].clone();
    assert_eq!(wallet.name, "Wallet");
    wallet.name = "Purse".to_string();
    let renamed = service.update_item(&wallet).unwrap();
    assert_complete(&service.blobs().directory_for(&renamed));
    assert!(service
        .blobs()
        .directory_for(&renamed)
        .to_string_lossy()
        .contains("Glasses-Purse_"));

    let glasses_id = renamed.items[0].id;
    let trimmed = service.delete_item(glasses_id).unwrap();
    assert_eq!(trimmed.items.len(), 1);
    assert_complete(&service.blobs().directory_for(&trimmed));
    assert!(!service.blobs().directory_for(&renamed).exists());

    let stray = Item::new("stray", Point::ZERO);
    assert!(matches!(
        service.update_item(&stray),
        Err(RepositoryError::ItemNotFound(_))
    ));
}

#[test]
fn delete_removes_record_and_directory_but_keeps_tags() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    let mut memory = captured("Wallet");
    memory.tags.insert(Tag::new("car"));
    service.save(&memory, &image(), &image()).unwrap();
    let directory = service.blobs().directory_for(&memory);

    service.delete(memory.id).unwrap();

    assert!(service.fetch_by_id(memory.id).unwrap().is_none());
    assert!(!directory.exists());
    assert_eq!(service.fetch_tags().unwrap(), vec![Tag::new("car")]);
    assert!(service.sync().unwrap().is_clean());
}

#[test]
fn wipe_all_keeps_config_directory() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    let mut memory = captured("Wallet");
    memory.tags.insert(Tag::new("car"));
    service.save(&memory, &image(), &image()).unwrap();
    std::fs::write(dir.path().join("Memories/stray.txt"), b"x").unwrap();

    service.wipe_all().unwrap();

    let remaining: Vec<_> = std::fs::read_dir(dir.path().join("Memories"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(remaining, vec![std::ffi::OsString::from(".config")]);
    assert!(!service.has_memories().unwrap());
    assert!(service.fetch_tags().unwrap().is_empty());
}

#[test]
fn insert_tag_rejects_blank_labels_and_search_ignores_blank_queries() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    service.save(&captured("Wallet"), &image(), &image()).unwrap();

    assert!(matches!(
        service.insert_tag(&Tag::new("  ")),
        Err(RepositoryError::InvalidTag(_))
    ));
    assert!(service.insert_tag(&Tag::new("car")).unwrap());
    assert!(!service.insert_tag(&Tag::new("car")).unwrap());

    assert!(service.search("   ").unwrap().is_empty());
    assert_eq!(service.search("wallet").unwrap().len(), 1);
}

#[test]
fn query_of_combining_marks_matches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    service.save(&captured("Wallet"), &image(), &image()).unwrap();
    service.save(&captured("Café"), &image(), &image()).unwrap();

    assert!(service.search("\u{0301}").unwrap().is_empty());
    assert!(service.search(" \u{0308} ").unwrap().is_empty());
    assert_eq!(service.search("cafe").unwrap().len(), 1);
}

#[test]
fn open_moves_legacy_database_into_config_directory() {
    let dir = tempfile::tempdir().unwrap();
    let memory = captured("Wallet");
    {
        let legacy = RecordStore::open(
            dir.path().join("database.sqlite"),
            OpenFailurePolicy::Fail,
        )
        .unwrap();
        legacy.upsert_memory(&memory).unwrap();
    }

    let config =
        StoreConfig::new(dir.path()).with_open_failure_policy(OpenFailurePolicy::Fail);
    let service = MemoryService::open(config.clone()).unwrap();

    assert!(!dir.path().join("database.sqlite").exists());
    assert!(config.database_path().exists());
    assert_eq!(service.fetch_by_id(memory.id).unwrap().unwrap(), memory);
}

#[test]
fn configure_migrates_legacy_flat_images() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(&dir);
    let memory = captured("Wallet");
    service.save(&memory, &image(), &image()).unwrap();

    let directory = service.blobs().directory_for(&memory);
    let images = dir.path().join("Images");
    std::fs::create_dir_all(&images).unwrap();
    let id = memory.id.to_string();
    std::fs::rename(directory.join("original.jpg"), images.join(format!("{id}.jpg"))).unwrap();
    std::fs::rename(
        directory.join("preview.jpg"),
        images.join(format!("{id}-preview.jpg")),
    )
    .unwrap();
    std::fs::rename(
        directory.join("thumbnail.png"),
        images.join(format!("{id}-thumbnail.png")),
    )
    .unwrap();
    std::fs::remove_dir_all(&directory).unwrap();

    service.configure().unwrap();

    assert!(!images.exists());
    assert_complete(&directory);
    assert!(service.sync().unwrap().is_clean());
}
