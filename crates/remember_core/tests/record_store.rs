use remember_core::db::open_db_in_memory;
use remember_core::repo::memory_repo::SqliteMemoryRepository;
use remember_core::{
    Item, Location, Memory, MemoryRecords, Point, RecognizedText, RecordStore, Rect, RepoError,
    Tag, UpsertOutcome,
};
use rusqlite::Connection;

fn memory_at(created_at: i64, names: &[&str]) -> Memory {
    let mut memory = Memory::with_id(uuid::Uuid::new_v4(), created_at);
    for name in names {
        memory.items.push(Item::new(*name, Point::new(1.0, 2.0)));
    }
    memory.sort_items();
    memory
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn upsert_reports_inserted_unchanged_and_updated() {
    let store = RecordStore::open_in_memory().unwrap();
    let mut memory = memory_at(100, &["Wallet"]);

    assert_eq!(store.upsert_memory(&memory).unwrap(), UpsertOutcome::Inserted);
    assert_eq!(store.upsert_memory(&memory).unwrap(), UpsertOutcome::Unchanged);

    memory.notes = "glovebox".to_string();
    memory.modified_at = 200;
    memory.location = Some(Location::new(1.5, 2.5));
    memory.tags.insert(Tag::new("car"));
    assert_eq!(store.upsert_memory(&memory).unwrap(), UpsertOutcome::Updated);

    let stored = store.fetch_by_id(memory.id).unwrap().unwrap();
    assert_eq!(stored, memory);
}

#[test]
fn upsert_reconciles_items_by_id() {
    let store = RecordStore::open_in_memory().unwrap();
    let mut memory = memory_at(100, &["keys", "wallet"]);
    store.upsert_memory(&memory).unwrap();

    let kept_id = memory.items[0].id;
    memory.items[0].name = "car keys".to_string();
    memory.items.remove(1);
    memory.items.push(Item::new("glasses", Point::ZERO));
    memory.sort_items();
    store.upsert_memory(&memory).unwrap();

    let stored = store.fetch_by_id(memory.id).unwrap().unwrap();
    let names: Vec<&str> = stored.items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["car keys", "glasses"]);
    assert_eq!(stored.items[0].id, kept_id);
}

#[test]
fn recognized_text_round_trips_with_frames_in_order() {
    let store = RecordStore::open_in_memory().unwrap();
    let mut memory = memory_at(100, &["Receipt"]);
    memory.recognized_text = Some(RecognizedText::from_recognition(
        "TOTAL 12.50",
        vec![
            ("TOTAL".to_string(), Rect::new(1.0, 2.0, 30.0, 8.0)),
            ("12.50".to_string(), Rect::new(40.0, 2.0, 25.0, 8.0)),
        ],
    ));
    store.upsert_memory(&memory).unwrap();

    let stored = store.fetch_by_id(memory.id).unwrap().unwrap();
    assert_eq!(stored.recognized_text, memory.recognized_text);
}

#[test]
fn fetch_all_is_newest_first_and_items_are_sorted() {
    let store = RecordStore::open_in_memory().unwrap();
    let older = memory_at(100, &["b", "a"]);
    let newer = memory_at(300, &["c"]);
    store.upsert_memory(&older).unwrap();
    store.upsert_memory(&newer).unwrap();

    let all = store.fetch_all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, newer.id);
    assert_eq!(all[1].id, older.id);
    assert_eq!(all[1].items[0].name, "a");
    assert!(store.has_memories().unwrap());
}

#[test]
fn tag_identity_is_exact_and_case_sensitive() {
    let store = RecordStore::open_in_memory().unwrap();
    assert!(store.insert_tag(&Tag::new("car")).unwrap());
    assert!(!store.insert_tag(&Tag::new("car")).unwrap());
    assert!(store.insert_tag(&Tag::new("Car")).unwrap());

    let labels: Vec<String> = store
        .fetch_tags()
        .unwrap()
        .into_iter()
        .map(|tag| tag.label)
        .collect();
    assert_eq!(labels, vec!["Car".to_string(), "car".to_string()]);
}

#[test]
fn delete_memory_cascades_children_but_keeps_tags() {
    let mut conn = open_db_in_memory().unwrap();
    let mut memory = memory_at(100, &["Wallet", "Keys"]);
    memory.tags.insert(Tag::new("car"));
    memory.location = Some(Location::new(3.0, 4.0));
    memory.recognized_text = Some(RecognizedText::from_recognition(
        "VISA",
        vec![("VISA".to_string(), Rect::new(0.0, 0.0, 1.0, 1.0))],
    ));

    {
        let mut repo = SqliteMemoryRepository::new(&mut conn);
        repo.upsert_memory(&memory).unwrap();
        assert!(repo.delete_memory(memory.id).unwrap());
        assert!(!repo.delete_memory(memory.id).unwrap());
    }

    assert_eq!(count(&conn, "memories"), 0);
    assert_eq!(count(&conn, "items"), 0);
    assert_eq!(count(&conn, "memory_tags"), 0);
    assert_eq!(count(&conn, "locations"), 0);
    assert_eq!(count(&conn, "recognized_texts"), 0);
    assert_eq!(count(&conn, "text_frames"), 0);
    assert_eq!(count(&conn, "tags"), 1);
}

#[test]
fn item_primitives_report_missing_items() {
    let store = RecordStore::open_in_memory().unwrap();
    let memory = memory_at(100, &["Wallet"]);
    store.upsert_memory(&memory).unwrap();

    let item = memory.items[0].clone();
    assert_eq!(store.memory_id_for_item(item.id).unwrap(), Some(memory.id));

    let stray = Item::new("stray", Point::ZERO);
    assert!(matches!(
        store.update_item(&stray),
        Err(RepoError::ItemNotFound(id)) if id == stray.id
    ));
    assert!(store.delete_item(item.id).unwrap());
    assert!(!store.delete_item(item.id).unwrap());
    assert_eq!(store.memory_id_for_item(item.id).unwrap(), None);
}

#[test]
fn wipe_all_clears_records_and_vocabulary() {
    let store = RecordStore::open_in_memory().unwrap();
    let mut memory = memory_at(100, &["Wallet"]);
    memory.tags.insert(Tag::new("car"));
    store.upsert_memory(&memory).unwrap();

    store.wipe_all().unwrap();
    assert!(!store.has_memories().unwrap());
    assert!(store.fetch_tags().unwrap().is_empty());
}
