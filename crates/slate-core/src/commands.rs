use anyhow::anyhow;
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::render::Renderer;
use crate::storage::JsonlStorage;
use crate::store::TaskStore;
use crate::task::{Priority, TaskId, TaskPatch};
use crate::view::{FilterMode, SortMode};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "list",
        "toggle",
        "modify",
        "delete",
        "filter",
        "sort",
        "stats",
        "info",
        "export",
        "_commands",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, storage, renderer, inv))]
pub fn dispatch(
    store: &mut TaskStore,
    storage: &JsonlStorage,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let command = expand_command_abbrev(&inv.command, &known_command_names())
        .ok_or_else(|| anyhow!("unknown command: {}", inv.command))?;

    debug!(command, args = ?inv.args, "dispatching command");

    match command {
        "add" => cmd_add(store, &inv.args, now),
        "list" => cmd_list(store, renderer),
        "toggle" => cmd_toggle(store, &inv.args, now),
        "modify" => cmd_modify(store, &inv.args, now),
        "delete" => cmd_delete(store, &inv.args),
        "filter" => cmd_filter(store, storage, &inv.args),
        "sort" => cmd_sort(store, storage, &inv.args),
        "stats" => cmd_stats(store, renderer),
        "info" => cmd_info(store, renderer, &inv.args),
        "export" => cmd_export(store),
        "_commands" => cmd_commands(),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Field modifiers recognized among command arguments. Everything else is
/// title text; `--` makes all remaining tokens literal title text.
#[derive(Debug, Clone, Default)]
struct Mods {
    priority: Option<Priority>,
    description: Option<String>,
}

fn parse_words_and_mods(args: &[String]) -> anyhow::Result<(Vec<String>, Mods)> {
    let mut words = Vec::new();
    let mut mods = Mods::default();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal {
            if let Some(value) = arg.strip_prefix("priority:") {
                mods.priority = Some(value.parse()?);
                continue;
            }
            if let Some(value) = arg.strip_prefix("description:") {
                mods.description = Some(value.to_string());
                continue;
            }
        }

        words.push(arg.clone());
    }

    Ok((words, mods))
}

/// Resolve a full uuid or unambiguous hex prefix against the canonical
/// collection.
fn resolve_id(store: &TaskStore, token: &str) -> anyhow::Result<TaskId> {
    let needle = token.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Err(anyhow!("empty task id"));
    }

    let mut matches = store
        .tasks()
        .iter()
        .filter(|task| task.id.to_string().starts_with(&needle));

    let Some(first) = matches.next() else {
        return Err(anyhow!("no task matches id: {token}"));
    };
    if matches.next().is_some() {
        return Err(anyhow!("ambiguous task id: {token}"));
    }

    Ok(first.id)
}

fn require_id_arg<'a>(args: &'a [String], command: &str) -> anyhow::Result<&'a str> {
    args.first()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{command} requires a task id"))
}

#[instrument(skip(store, args, now))]
fn cmd_add(store: &mut TaskStore, args: &[String], now: chrono::DateTime<Utc>) -> anyhow::Result<()> {
    info!("command add");

    let (words, mods) = parse_words_and_mods(args)?;
    let title = words.join(" ");
    let id = store.add(&title, mods.description.as_deref(), mods.priority, now)?;

    println!("Created task {}.", id.short());
    Ok(())
}

#[instrument(skip(store, renderer))]
fn cmd_list(store: &TaskStore, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command list");

    let rows = store.visible_tasks();
    if rows.is_empty() {
        println!("No tasks.");
        return Ok(());
    }

    renderer.print_task_table(&rows)?;
    Ok(())
}

#[instrument(skip(store, args, now))]
fn cmd_toggle(
    store: &mut TaskStore,
    args: &[String],
    now: chrono::DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command toggle");

    let id = resolve_id(store, require_id_arg(args, "toggle")?)?;
    store.toggle(id, now)?;

    let completed = store.get(id).map(|task| task.completed).unwrap_or_default();
    if completed {
        println!("Completed task {}.", id.short());
    } else {
        println!("Reopened task {}.", id.short());
    }
    Ok(())
}

#[instrument(skip(store, args, now))]
fn cmd_modify(
    store: &mut TaskStore,
    args: &[String],
    now: chrono::DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command modify");

    let id = resolve_id(store, require_id_arg(args, "modify")?)?;
    let (words, mods) = parse_words_and_mods(&args[1..])?;

    let patch = TaskPatch {
        title: (!words.is_empty()).then(|| words.join(" ")),
        description: mods.description,
        priority: mods.priority,
        completed: None,
    };
    if patch.title.is_none() && patch.description.is_none() && patch.priority.is_none() {
        return Err(anyhow!("modify requires new field values"));
    }

    store.update(id, patch, now)?;
    println!("Modified task {}.", id.short());
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_delete(store: &mut TaskStore, args: &[String]) -> anyhow::Result<()> {
    info!("command delete");

    let id = resolve_id(store, require_id_arg(args, "delete")?)?;
    store.remove(id)?;

    println!("Deleted task {}.", id.short());
    Ok(())
}

#[instrument(skip(store, storage, args))]
fn cmd_filter(
    store: &mut TaskStore,
    storage: &JsonlStorage,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command filter");

    let Some(token) = args.first() else {
        println!("filter={}", store.view().filter);
        return Ok(());
    };

    let mode: FilterMode = token.parse()?;
    store.set_filter(mode);
    storage.save_view(store.view())?;

    println!("Filter set: {mode}.");
    Ok(())
}

#[instrument(skip(store, storage, args))]
fn cmd_sort(store: &mut TaskStore, storage: &JsonlStorage, args: &[String]) -> anyhow::Result<()> {
    info!("command sort");

    let Some(token) = args.first() else {
        println!("sort={}", store.view().sort);
        return Ok(());
    };

    let mode: SortMode = token.parse()?;
    store.set_sort(mode);
    storage.save_view(store.view())?;

    println!("Sort set: {mode}.");
    Ok(())
}

#[instrument(skip(store, renderer))]
fn cmd_stats(store: &TaskStore, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command stats");

    renderer.print_stats(store.stats())?;
    Ok(())
}

#[instrument(skip(store, renderer, args))]
fn cmd_info(store: &TaskStore, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    info!("command info");

    let id = resolve_id(store, require_id_arg(args, "info")?)?;
    let Some(task) = store.get(id) else {
        return Err(anyhow!("no task matches id: {id}"));
    };

    renderer.print_task_info(task)?;
    Ok(())
}

#[instrument(skip(store))]
fn cmd_export(store: &TaskStore) -> anyhow::Result<()> {
    info!("command export");

    let out = serde_json::to_string(store.tasks())?;
    println!("{out}");
    Ok(())
}

fn cmd_commands() -> anyhow::Result<()> {
    for command in known_command_names() {
        println!("{command}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Implemented commands: add, list, toggle, modify, delete, filter, sort, stats, info, \
         export, help, version"
    );
    Ok(())
}
