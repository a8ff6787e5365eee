use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::task::Task;

/// Which slice of the canonical collection is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    All,
    Active,
    Completed,
}

impl FilterMode {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Active => !task.completed,
            FilterMode::Completed => task.completed,
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FilterMode::All => "all",
            FilterMode::Active => "active",
            FilterMode::Completed => "completed",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for FilterMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(FilterMode::All),
            "active" => Ok(FilterMode::Active),
            "completed" => Ok(FilterMode::Completed),
            other => Err(anyhow::anyhow!("invalid filter mode: {other}")),
        }
    }
}

/// How the visible slice is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Created,
    Priority,
    Title,
}

impl SortMode {
    /// Total order over tasks for this mode. `Created` is newest-first;
    /// `Priority` ranks high over low; `Title` is case-sensitive codepoint
    /// order. Non-`Created` modes break ties newest-first.
    pub fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            SortMode::Created => b.created_at.cmp(&a.created_at),
            SortMode::Priority => b
                .priority
                .rank()
                .cmp(&a.priority.rank())
                .then_with(|| b.created_at.cmp(&a.created_at)),
            SortMode::Title => a
                .title
                .cmp(&b.title)
                .then_with(|| b.created_at.cmp(&a.created_at)),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SortMode::Created => "created",
            SortMode::Priority => "priority",
            SortMode::Title => "title",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for SortMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(SortMode::Created),
            "priority" => Ok(SortMode::Priority),
            "title" => Ok(SortMode::Title),
            other => Err(anyhow::anyhow!("invalid sort mode: {other}")),
        }
    }
}

/// The filter/sort selection, as one value so it can be persisted between
/// invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewState {
    #[serde(default)]
    pub filter: FilterMode,
    #[serde(default)]
    pub sort: SortMode,
}

/// Aggregate counts over the canonical collection. Ignores the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

impl Stats {
    pub fn collect(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|task| task.completed).count();
        Self {
            total,
            active: total - completed,
            completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{FilterMode, SortMode, Stats};
    use crate::task::{Priority, Task};

    fn task_at(title: &str, priority: Priority, offset_secs: i64) -> Task {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        Task::new(
            title.to_string(),
            None,
            priority,
            base + Duration::seconds(offset_secs),
        )
    }

    #[test]
    fn priority_sort_ranks_high_over_low() {
        let mut tasks = vec![
            task_at("a", Priority::Low, 0),
            task_at("b", Priority::High, 1),
            task_at("c", Priority::Medium, 2),
        ];
        tasks.sort_by(|a, b| SortMode::Priority.compare(a, b));

        let priorities: Vec<Priority> = tasks.iter().map(|task| task.priority).collect();
        assert_eq!(
            priorities,
            vec![Priority::High, Priority::Medium, Priority::Low]
        );
    }

    #[test]
    fn priority_sort_breaks_ties_newest_first() {
        let mut tasks = vec![
            task_at("older", Priority::High, 0),
            task_at("newer", Priority::High, 5),
        ];
        tasks.sort_by(|a, b| SortMode::Priority.compare(a, b));

        assert_eq!(tasks[0].title, "newer");
        assert_eq!(tasks[1].title, "older");
    }

    #[test]
    fn title_sort_is_codepoint_order() {
        let mut tasks = vec![
            task_at("Banana", Priority::Medium, 0),
            task_at("Apple", Priority::Medium, 1),
            task_at("cherry", Priority::Medium, 2),
        ];
        tasks.sort_by(|a, b| SortMode::Title.compare(a, b));

        let titles: Vec<&str> = tasks.iter().map(|task| task.title.as_str()).collect();
        assert_eq!(titles, vec!["Apple", "Banana", "cherry"]);
    }

    #[test]
    fn created_sort_is_newest_first() {
        let mut tasks = vec![
            task_at("first", Priority::Medium, 0),
            task_at("second", Priority::Medium, 1),
            task_at("third", Priority::Medium, 2),
        ];
        tasks.sort_by(|a, b| SortMode::Created.compare(a, b));

        let titles: Vec<&str> = tasks.iter().map(|task| task.title.as_str()).collect();
        assert_eq!(titles, vec!["third", "second", "first"]);
    }

    #[test]
    fn filter_modes_partition_by_completion() {
        let mut done = task_at("done", Priority::Medium, 0);
        done.completed = true;
        let open = task_at("open", Priority::Medium, 1);

        assert!(FilterMode::All.matches(&done));
        assert!(FilterMode::All.matches(&open));
        assert!(FilterMode::Completed.matches(&done));
        assert!(!FilterMode::Completed.matches(&open));
        assert!(FilterMode::Active.matches(&open));
        assert!(!FilterMode::Active.matches(&done));
    }

    #[test]
    fn stats_count_whole_collection() {
        let mut done = task_at("done", Priority::Medium, 0);
        done.completed = true;
        let tasks = vec![
            done,
            task_at("open", Priority::Medium, 1),
            task_at("also open", Priority::Medium, 2),
        ];

        let stats = Stats::collect(&tasks);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.completed, 1);
    }
}
