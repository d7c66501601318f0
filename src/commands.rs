use crate::agenda::Agenda;
use crate::calendar::{column_title, compute_day, compute_week};
use crate::cli::{AssignTarget, ListTarget};
use crate::config::{save_config, Config, StartView};
use crate::model::{normalize_text, DateKey, NewTodo, Todo, TodoId, TodoPatch};
use crate::store::{SqliteStore, TodoStore};
use crate::ui;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

pub fn init(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        return Ok(());
    }
    save_config(config_path, &Config::default())?;
    println!("Wrote default config to {}", config_path.display());
    Ok(())
}

pub fn tui(db_path: &Path, start_view: StartView) -> Result<()> {
    match start_view {
        StartView::Week => week(db_path, 0),
        StartView::Day => day(db_path, None),
    }
}

pub fn week(db_path: &Path, offset: i64) -> Result<()> {
    let store = open_store(db_path)?;
    let agenda = Agenda::week(store, today(), offset).context("loading week")?;
    ui::run(agenda)
}

pub fn day(db_path: &Path, date: Option<String>) -> Result<()> {
    let date = match date {
        Some(raw) => parse_date(&raw)?,
        None => today(),
    };
    let store = open_store(db_path)?;
    let agenda = Agenda::day(store, today(), date).context("loading day")?;
    ui::run(agenda)
}

pub fn list(db_path: &Path, target: ListTarget, yaml: bool) -> Result<()> {
    let store = open_store(db_path)?;
    let groups = collect_list(&store, &target, today())?;
    if yaml {
        print!("{}", serde_yaml::to_string(&groups).context("serializing todos")?);
        return Ok(());
    }
    for group in groups {
        println!("{}", group.label);
        if group.todos.is_empty() {
            println!("  (empty)");
        }
        for todo in &group.todos {
            print_todo(todo);
        }
        println!();
    }
    Ok(())
}

pub fn add(db_path: &Path, text: String, target: AssignTarget) -> Result<()> {
    let mut store = open_store(db_path)?;
    let todo = add_todo(&mut store, &text, &target, today())?;
    let key = todo
        .assigned_date
        .map(|k| k.to_string())
        .unwrap_or_default();
    println!("Added todo {} to {}", todo.id, key);
    Ok(())
}

pub fn done(db_path: &Path, id: TodoId) -> Result<()> {
    let mut store = open_store(db_path)?;
    let todo = toggle_todo(&mut store, id)?;
    if todo.is_completed() {
        println!("Completed {}: {}", todo.id, todo.text);
    } else {
        println!("Reopened {}: {}", todo.id, todo.text);
    }
    Ok(())
}

pub fn edit(
    db_path: &Path,
    id: TodoId,
    text: Option<String>,
    target: AssignTarget,
    unassign: bool,
) -> Result<()> {
    let mut store = open_store(db_path)?;
    let todo = edit_todo(&mut store, id, text, &target, unassign)?;
    println!("Updated todo {}", todo.id);
    Ok(())
}

pub fn delete(db_path: &Path, id: TodoId) -> Result<()> {
    let mut store = open_store(db_path)?;
    delete_todo(&mut store, id)?;
    println!("Deleted todo {}", id);
    Ok(())
}

fn add_todo(
    store: &mut dyn TodoStore,
    text: &str,
    target: &AssignTarget,
    today: NaiveDate,
) -> Result<Todo> {
    let text = normalize_text(text).ok_or_else(|| anyhow!("todo text must not be empty"))?;
    let key = assignment(target)?.unwrap_or(DateKey::Date(today));
    let todo = store
        .create(NewTodo::new(text, Some(key)))
        .with_context(|| format!("adding todo to {}", key))?;
    info!(id = todo.id, "added todo from cli");
    Ok(todo)
}

fn toggle_todo(store: &mut dyn TodoStore, id: TodoId) -> Result<Todo> {
    store
        .toggle_complete(id)
        .with_context(|| format!("toggling todo {}", id))?
        .ok_or_else(|| anyhow!("todo {} not found", id))
}

fn edit_todo(
    store: &mut dyn TodoStore,
    id: TodoId,
    text: Option<String>,
    target: &AssignTarget,
    unassign: bool,
) -> Result<Todo> {
    let text = match text {
        Some(raw) => {
            Some(normalize_text(&raw).ok_or_else(|| anyhow!("todo text must not be empty"))?)
        }
        None => None,
    };
    let assigned_date = if unassign {
        Some(None)
    } else {
        assignment(target)?.map(Some)
    };
    let patch = TodoPatch {
        text,
        completed_at: None,
        assigned_date,
    };
    if patch.is_empty() {
        bail!("nothing to change (use --text, --date, --someday or --unassign)");
    }
    store
        .update(id, &patch)
        .with_context(|| format!("editing todo {}", id))?
        .ok_or_else(|| anyhow!("todo {} not found", id))
}

fn delete_todo(store: &mut dyn TodoStore, id: TodoId) -> Result<()> {
    if !store
        .delete(id)
        .with_context(|| format!("deleting todo {}", id))?
    {
        bail!("todo {} not found", id);
    }
    Ok(())
}

fn open_store(db_path: &Path) -> Result<SqliteStore> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    SqliteStore::open(db_path).with_context(|| format!("opening database {:?}", db_path))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn assignment(target: &AssignTarget) -> Result<Option<DateKey>> {
    if target.someday {
        return Ok(Some(DateKey::Someday));
    }
    target
        .date
        .as_deref()
        .map(|raw| parse_date(raw).map(DateKey::Date))
        .transpose()
}

#[derive(Debug, Serialize)]
struct Group {
    label: String,
    todos: Vec<Todo>,
}

fn collect_list(
    store: &dyn TodoStore,
    target: &ListTarget,
    today: NaiveDate,
) -> Result<Vec<Group>> {
    if target.all {
        let mut groups: BTreeMap<String, Vec<Todo>> = BTreeMap::new();
        for todo in store.list_all()? {
            let label = todo
                .assigned_date
                .map(|k| k.to_string())
                .unwrap_or_else(|| "unassigned".to_string());
            groups.entry(label).or_default().push(todo);
        }
        return Ok(groups
            .into_iter()
            .map(|(label, todos)| Group { label, todos })
            .collect());
    }
    if target.someday {
        return Ok(vec![Group {
            label: DateKey::Someday.to_string(),
            todos: store.list_by_date(&DateKey::Someday)?,
        }]);
    }
    if let Some(raw) = &target.date {
        let key = DateKey::Date(parse_date(raw)?);
        return Ok(vec![Group {
            label: key.to_string(),
            todos: store.list_by_date(&key)?,
        }]);
    }
    let columns = compute_week(today, target.week.unwrap_or(0)).columns();
    let mut by_key = store.list_range(&columns)?;
    Ok(columns
        .iter()
        .enumerate()
        .map(|(idx, key)| {
            let label = match key {
                DateKey::Date(_) => format!("{} {}", column_title(&columns, idx), key),
                DateKey::Someday => column_title(&columns, idx).to_string(),
            };
            Group {
                label,
                todos: by_key.remove(key).unwrap_or_default(),
            }
        })
        .collect())
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    let raw = input.trim();
    match raw.to_ascii_lowercase().as_str() {
        "today" => return Ok(today()),
        "tomorrow" => return Ok(compute_day(today(), 1)),
        "yesterday" => return Ok(compute_day(today(), -1)),
        _ => {}
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| anyhow!("invalid date format (use YYYY-MM-DD): {}", raw))
}

fn print_todo(todo: &Todo) {
    let mark = if todo.is_completed() { "x" } else { " " };
    println!("  - [{}] {}: {}", mark, todo.id, todo.text);
}
