use std::fs;

use anyhow::anyhow;
use chrono::{Duration, TimeZone, Utc};
use slate_core::storage::{JsonlStorage, TaskStorage};
use slate_core::store::TaskStore;
use slate_core::task::{Priority, Task};
use slate_core::view::{FilterMode, SortMode, ViewState};
use tempfile::tempdir;

#[test]
fn mutations_survive_a_reload() {
    let temp = tempdir().expect("tempdir");
    let storage = JsonlStorage::open(temp.path()).expect("open storage");
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

    let mut store = TaskStore::with_storage(Box::new(storage)).expect("build store");
    let first = store.add("Buy milk", None, None, now).expect("add");
    store
        .add(
            "Write report",
            Some("quarterly numbers"),
            Some(Priority::High),
            now + Duration::seconds(1),
        )
        .expect("add");
    store.toggle(first, now + Duration::seconds(2)).expect("toggle");

    let reopened = JsonlStorage::open(temp.path()).expect("reopen storage");
    let store = TaskStore::with_storage(Box::new(reopened)).expect("rebuild store");

    let stats = store.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.completed, 1);

    let loaded = store.get(first).expect("task survives reload");
    assert!(loaded.completed);
    assert!(loaded.updated_at > loaded.created_at);
    assert_eq!(loaded.created_at, now);
}

#[test]
fn jsonl_load_skips_blank_lines() {
    let temp = tempdir().expect("tempdir");
    let storage = JsonlStorage::open(temp.path()).expect("open storage");
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

    let tasks = vec![
        Task::new("one".to_string(), None, Priority::Medium, now),
        Task::new("two".to_string(), None, Priority::Low, now),
    ];
    storage.save(&tasks).expect("save");

    let raw = fs::read_to_string(&storage.tasks_path).expect("read back");
    let padded = format!("\n{}\n\n", raw.replace('\n', "\n\n"));
    fs::write(&storage.tasks_path, padded).expect("pad with blank lines");

    let loaded = storage.load().expect("load");
    assert_eq!(loaded, tasks);
}

#[test]
fn view_state_roundtrips_and_defaults_when_absent() {
    let temp = tempdir().expect("tempdir");
    let storage = JsonlStorage::open(temp.path()).expect("open storage");

    assert_eq!(storage.load_view().expect("empty view"), ViewState::default());

    let view = ViewState {
        filter: FilterMode::Active,
        sort: SortMode::Priority,
    };
    storage.save_view(view).expect("save view");
    assert_eq!(storage.load_view().expect("load view"), view);
}

struct FailingStorage;

impl TaskStorage for FailingStorage {
    fn load(&self) -> anyhow::Result<Vec<Task>> {
        Ok(Vec::new())
    }

    fn save(&self, _tasks: &[Task]) -> anyhow::Result<()> {
        Err(anyhow!("disk full"))
    }
}

#[test]
fn failed_save_keeps_the_in_memory_mutation() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let mut store = TaskStore::with_storage(Box::new(FailingStorage)).expect("build store");

    let id = store.add("Buy milk", None, None, now).expect("add succeeds");
    assert!(store.get(id).is_some());
    assert_eq!(store.stats().total, 1);
}
