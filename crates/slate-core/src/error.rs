use thiserror::Error;

use crate::task::TaskId;

/// Errors surfaced by `TaskStore` mutations. Both are recoverable caller
/// errors; the canonical collection is unchanged when one is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The supplied title was empty or whitespace-only.
    #[error("task title cannot be empty")]
    EmptyTitle,

    /// No task with the given id exists.
    #[error("task not found: {0}")]
    NotFound(TaskId),
}
