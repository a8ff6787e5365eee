use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::task::Task;
use crate::view::ViewState;

/// Injected persistence collaborator. `load` runs once when the store is
/// built; `save` runs after every successful collection mutation. The
/// store logs a failing save and keeps the in-memory mutation.
pub trait TaskStorage {
    fn load(&self) -> anyhow::Result<Vec<Task>>;
    fn save(&self, tasks: &[Task]) -> anyhow::Result<()>;
}

/// One task per line as JSON under the data directory, replaced atomically
/// on save. A sibling `view.data` file keeps the filter/sort selection
/// between invocations.
#[derive(Debug, Clone)]
pub struct JsonlStorage {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub view_path: PathBuf,
}

impl JsonlStorage {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.data");
        let view_path = data_dir.join("view.data");

        if !tasks_path.exists() {
            fs::write(&tasks_path, "")?;
        }
        if !view_path.exists() {
            fs::write(&view_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            view = %view_path.display(),
            "opened storage"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            view_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_view(&self) -> anyhow::Result<ViewState> {
        let raw = fs::read_to_string(&self.view_path)
            .with_context(|| format!("failed reading {}", self.view_path.display()))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(ViewState::default());
        }
        serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {}", self.view_path.display()))
    }

    #[tracing::instrument(skip(self))]
    pub fn save_view(&self, view: ViewState) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&view)?;
        fs::write(&self.view_path, payload)
            .with_context(|| format!("failed writing {}", self.view_path.display()))?;
        Ok(())
    }
}

impl TaskStorage for JsonlStorage {
    #[tracing::instrument(skip(self))]
    fn load(&self) -> anyhow::Result<Vec<Task>> {
        load_jsonl(&self.tasks_path).context("failed to load tasks.data")
    }

    #[tracing::instrument(skip(self, tasks))]
    fn save(&self, tasks: &[Task]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, tasks).context("failed to save tasks.data")
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Task>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let task: Task = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(task);
    }

    debug!(count = out.len(), "loaded tasks from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, tasks))]
fn save_jsonl_atomic(path: &Path, tasks: &[Task]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for task in tasks {
        let serialized = serde_json::to_string(task)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
