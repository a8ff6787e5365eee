use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::storage::TaskStorage;
use crate::task::{Priority, Task, TaskId, TaskPatch};
use crate::view::{FilterMode, SortMode, Stats, ViewState};

/// What a completed mutation did. Handed to every subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Added(TaskId),
    Updated(TaskId),
    Toggled(TaskId),
    Removed(TaskId),
    ViewChanged,
}

type Observer = Box<dyn Fn(ChangeEvent)>;

/// Sole owner of the canonical task collection and the current filter/sort
/// selection. Every query recomputes from the canonical collection; no
/// derived view is cached. Failed mutations leave the collection unchanged.
pub struct TaskStore {
    tasks: Vec<Task>,
    view: ViewState,
    storage: Option<Box<dyn TaskStorage>>,
    observers: Vec<Observer>,
}

impl TaskStore {
    /// An empty store with no persistence wired.
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            view: ViewState::default(),
            storage: None,
            observers: Vec::new(),
        }
    }

    /// A store seeded from `storage.load()`; every later collection
    /// mutation is written back through `storage.save()`.
    pub fn with_storage(storage: Box<dyn TaskStorage>) -> anyhow::Result<Self> {
        let tasks = storage.load()?;
        info!(count = tasks.len(), "loaded canonical collection");
        Ok(Self {
            tasks,
            view: ViewState::default(),
            storage: Some(storage),
            observers: Vec::new(),
        })
    }

    /// Register a callback invoked once per completed mutation.
    pub fn subscribe(&mut self, observer: impl Fn(ChangeEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn add(
        &mut self,
        title: &str,
        description: Option<&str>,
        priority: Option<Priority>,
        now: DateTime<Utc>,
    ) -> Result<TaskId, StoreError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::EmptyTitle);
        }

        let description = description
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(ToString::to_string);

        let task = Task::new(title.to_string(), description, priority.unwrap_or_default(), now);
        let id = task.id;
        self.tasks.push(task);

        debug!(%id, total = self.tasks.len(), "task added");
        self.committed(ChangeEvent::Added(id));
        Ok(id)
    }

    /// Applies all supplied fields or none: a title that trims empty
    /// rejects the whole patch before anything is touched.
    pub fn update(
        &mut self,
        id: TaskId,
        patch: TaskPatch,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let title = match patch.title {
            Some(text) => {
                let trimmed = text.trim().to_string();
                if trimmed.is_empty() {
                    return Err(StoreError::EmptyTitle);
                }
                Some(trimmed)
            }
            None => None,
        };

        let task = self.find_mut(id)?;
        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            let trimmed = description.trim();
            task.description = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(completed) = patch.completed {
            task.completed = completed;
        }
        task.updated_at = now.max(task.created_at);

        debug!(%id, "task updated");
        self.committed(ChangeEvent::Updated(id));
        Ok(())
    }

    pub fn toggle(&mut self, id: TaskId, now: DateTime<Utc>) -> Result<(), StoreError> {
        let task = self.find_mut(id)?;
        task.completed = !task.completed;
        task.updated_at = now.max(task.created_at);
        let completed = task.completed;

        debug!(%id, completed, "task toggled");
        self.committed(ChangeEvent::Toggled(id));
        Ok(())
    }

    /// Deletes permanently. A second call for the same id fails with
    /// `NotFound` rather than silently succeeding.
    pub fn remove(&mut self, id: TaskId) -> Result<(), StoreError> {
        let idx = self
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(StoreError::NotFound(id))?;
        self.tasks.remove(idx);

        debug!(%id, total = self.tasks.len(), "task removed");
        self.committed(ChangeEvent::Removed(id));
        Ok(())
    }

    pub fn set_filter(&mut self, mode: FilterMode) {
        if self.view.filter != mode {
            self.view.filter = mode;
            self.notify(ChangeEvent::ViewChanged);
        }
    }

    pub fn set_sort(&mut self, mode: SortMode) {
        if self.view.sort != mode {
            self.view.sort = mode;
            self.notify(ChangeEvent::ViewChanged);
        }
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    /// The visible slice: filtered by the current mode, ordered by the
    /// current sort. Recomputed on every call from the canonical
    /// collection; returned tasks are snapshots.
    pub fn visible_tasks(&self) -> Vec<Task> {
        let mut rows: Vec<Task> = self
            .tasks
            .iter()
            .filter(|task| self.view.filter.matches(task))
            .cloned()
            .collect();
        rows.sort_by(|a, b| self.view.sort.compare(a, b));
        rows
    }

    /// Counts over the whole canonical collection, regardless of filter.
    pub fn stats(&self) -> Stats {
        Stats::collect(&self.tasks)
    }

    /// The canonical collection in insertion order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    fn find_mut(&mut self, id: TaskId) -> Result<&mut Task, StoreError> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    fn committed(&mut self, event: ChangeEvent) {
        if let Some(storage) = &self.storage {
            if let Err(err) = storage.save(&self.tasks) {
                warn!(error = %err, "save failed; keeping in-memory mutation");
            }
        }
        self.notify(event);
    }

    fn notify(&self, event: ChangeEvent) {
        for observer in &self.observers {
            observer(event);
        }
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{ChangeEvent, TaskStore};
    use crate::error::StoreError;
    use crate::task::{Priority, TaskId, TaskPatch};
    use crate::view::{FilterMode, SortMode};

    fn at(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::seconds(offset_secs)
    }

    #[test]
    fn add_trims_title_and_sets_defaults() {
        let mut store = TaskStore::new();
        let id = store.add("  Buy milk  ", None, None, at(0)).expect("add");

        let rows = store.visible_tasks();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].title, "Buy milk");
        assert_eq!(rows[0].description, None);
        assert_eq!(rows[0].priority, Priority::Medium);
        assert!(!rows[0].completed);
        assert_eq!(rows[0].created_at, rows[0].updated_at);
    }

    #[test]
    fn add_drops_blank_description() {
        let mut store = TaskStore::new();
        let id = store.add("Buy milk", Some("   "), None, at(0)).expect("add");
        assert_eq!(store.get(id).expect("get").description, None);

        let id = store
            .add("Write report", Some(" quarterly numbers "), None, at(1))
            .expect("add");
        assert_eq!(
            store.get(id).expect("get").description.as_deref(),
            Some("quarterly numbers")
        );
    }

    #[test]
    fn add_rejects_empty_and_whitespace_titles() {
        let mut store = TaskStore::new();
        assert_eq!(store.add("", None, None, at(0)), Err(StoreError::EmptyTitle));
        assert_eq!(
            store.add("   ", None, None, at(0)),
            Err(StoreError::EmptyTitle)
        );
        assert_eq!(store.stats().total, 0);
    }

    #[test]
    fn toggle_twice_restores_flag_but_advances_updated_at() {
        let mut store = TaskStore::new();
        let id = store.add("Buy milk", None, None, at(0)).expect("add");

        store.toggle(id, at(1)).expect("first toggle");
        let after_first = store.get(id).expect("get").updated_at;
        assert!(store.get(id).expect("get").completed);
        assert!(after_first > store.get(id).expect("get").created_at);

        store.toggle(id, at(2)).expect("second toggle");
        let after_second = store.get(id).expect("get").updated_at;
        assert!(!store.get(id).expect("get").completed);
        assert!(after_second > after_first);
    }

    #[test]
    fn remove_twice_fails_on_second_call() {
        let mut store = TaskStore::new();
        let id = store.add("Buy milk", None, None, at(0)).expect("add");

        store.remove(id).expect("first remove");
        assert_eq!(store.remove(id), Err(StoreError::NotFound(id)));
        assert_eq!(store.stats().total, 0);
    }

    #[test]
    fn mutations_on_unknown_id_fail() {
        let mut store = TaskStore::new();
        let ghost = TaskId::new();

        assert_eq!(
            store.update(ghost, TaskPatch::default(), at(0)),
            Err(StoreError::NotFound(ghost))
        );
        assert_eq!(store.toggle(ghost, at(0)), Err(StoreError::NotFound(ghost)));
        assert_eq!(store.remove(ghost), Err(StoreError::NotFound(ghost)));
    }

    #[test]
    fn update_applies_all_supplied_fields() {
        let mut store = TaskStore::new();
        let id = store
            .add("Buy milk", Some("two liters"), None, at(0))
            .expect("add");

        store
            .update(
                id,
                TaskPatch {
                    title: Some("  Buy oat milk  ".to_string()),
                    description: Some("".to_string()),
                    priority: Some(Priority::High),
                    completed: Some(true),
                },
                at(5),
            )
            .expect("update");

        let task = store.get(id).expect("get");
        assert_eq!(task.title, "Buy oat milk");
        assert_eq!(task.description, None);
        assert_eq!(task.priority, Priority::High);
        assert!(task.completed);
        assert_eq!(task.created_at, at(0));
        assert_eq!(task.updated_at, at(5));
    }

    #[test]
    fn update_with_empty_title_is_atomic() {
        let mut store = TaskStore::new();
        let id = store.add("Buy milk", None, None, at(0)).expect("add");

        let result = store.update(
            id,
            TaskPatch {
                title: Some("   ".to_string()),
                priority: Some(Priority::High),
                completed: Some(true),
                ..TaskPatch::default()
            },
            at(5),
        );
        assert_eq!(result, Err(StoreError::EmptyTitle));

        let task = store.get(id).expect("get");
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.priority, Priority::Medium);
        assert!(!task.completed);
        assert_eq!(task.updated_at, task.created_at);
    }

    #[test]
    fn filter_selects_and_stats_ignore_it() {
        let mut store = TaskStore::new();
        let first = store.add("one", None, None, at(0)).expect("add");
        store.add("two", None, None, at(1)).expect("add");
        store.add("three", None, None, at(2)).expect("add");
        store.toggle(first, at(3)).expect("toggle");

        store.set_filter(FilterMode::Active);
        assert_eq!(store.visible_tasks().len(), 2);

        store.set_filter(FilterMode::Completed);
        assert_eq!(store.visible_tasks().len(), 1);

        let stats = store.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.completed, 1);
    }

    #[test]
    fn priority_sort_orders_visible_tasks() {
        let mut store = TaskStore::new();
        store
            .add("low one", None, Some(Priority::Low), at(0))
            .expect("add");
        store
            .add("high one", None, Some(Priority::High), at(1))
            .expect("add");
        store
            .add("medium one", None, Some(Priority::Medium), at(2))
            .expect("add");

        store.set_sort(SortMode::Priority);
        let titles: Vec<String> = store
            .visible_tasks()
            .into_iter()
            .map(|task| task.title)
            .collect();
        assert_eq!(titles, vec!["high one", "medium one", "low one"]);
    }

    #[test]
    fn canonical_order_survives_mutation() {
        let mut store = TaskStore::new();
        let first = store.add("first", None, None, at(0)).expect("add");
        store.add("second", None, None, at(1)).expect("add");
        store.toggle(first, at(2)).expect("toggle");

        let titles: Vec<&str> = store.tasks().iter().map(|task| task.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[test]
    fn observers_see_one_event_per_mutation() {
        let events: Rc<RefCell<Vec<ChangeEvent>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);

        let mut store = TaskStore::new();
        store.subscribe(move |event| sink.borrow_mut().push(event));

        let id = store.add("Buy milk", None, None, at(0)).expect("add");
        store.toggle(id, at(1)).expect("toggle");
        store.set_filter(FilterMode::Active);
        store.set_filter(FilterMode::Active); // unchanged, no event
        store.remove(id).expect("remove");

        assert_eq!(
            *events.borrow(),
            vec![
                ChangeEvent::Added(id),
                ChangeEvent::Toggled(id),
                ChangeEvent::ViewChanged,
                ChangeEvent::Removed(id),
            ]
        );
    }

    #[test]
    fn end_to_end_stats_and_priority_view() {
        let mut store = TaskStore::new();
        let first = store.add("Buy milk", None, None, at(0)).expect("add");
        store
            .add("Write report", None, Some(Priority::High), at(1))
            .expect("add");
        store.toggle(first, at(2)).expect("toggle");

        let stats = store.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.completed, 1);

        store.set_sort(SortMode::Priority);
        let titles: Vec<String> = store
            .visible_tasks()
            .into_iter()
            .map(|task| task.title)
            .collect();
        assert_eq!(titles, vec!["Write report", "Buy milk"]);
    }
}
