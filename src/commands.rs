use crate::model::{Status, TaskBook};
use crate::query::{self, TaskRef};
use crate::storage::{init_project_store, load_book, locate_store, save_book, StoreLocation};
use crate::ui;
use anyhow::{bail, Result};
use chrono::Utc;
use std::env;

pub fn init() -> Result<()> {
    let location = init_project_store()?;
    println!("Initialized task store at {}", location.path.display());
    Ok(())
}

pub fn add(name: String, url: Option<String>) -> Result<()> {
    let (mut book, location) = load_current()?;
    let (id, name) = {
        let task = book.create_task(&name, url)?;
        (task.id, task.name.clone())
    };
    save_book(&location, &book)?;
    println!("Added task [{}] '{}'", id, name);
    Ok(())
}

pub fn list(all: bool) -> Result<()> {
    let (book, _) = load_current()?;
    let now = Utc::now();
    let mut shown = 0;
    for task in &book.tasks {
        if !all && task.status == Status::Stopped {
            continue;
        }
        let summary = query::summarize(task, now);
        println!(
            "[{}] {} — {} — {} ({} session{})",
            summary.id,
            summary.name,
            summary.status.label(),
            summary.elapsed,
            summary.sessions,
            if summary.sessions == 1 { "" } else { "s" }
        );
        shown += 1;
    }
    if shown == 0 {
        println!("(no tasks)");
    }
    Ok(())
}

pub fn start(target: Option<String>) -> Result<()> {
    let (mut book, location) = load_current()?;
    let id = match &target {
        None => {
            let Some(id) = book.last_active_task_id else {
                bail!("no recent task to resume");
            };
            match book.get(id).map(|t| t.status) {
                None => bail!("task not found: {}", id),
                Some(Status::Stopped) => bail!("task {} is stopped; unstop it first", id),
                Some(_) => id,
            }
        }
        Some(target) => match query::resolve(&book, target) {
            Some(task) => task.id,
            None => match query::parse_ref(target) {
                TaskRef::ById(_) => bail!("task not found: {}", target.trim()),
                TaskRef::ByName(_) => book.create_task(target, None)?.id,
            },
        },
    };
    let name = book.start(id)?.name.clone();
    save_book(&location, &book)?;
    println!("Started [{}] '{}'", id, name);
    Ok(())
}

pub fn stop() -> Result<()> {
    let (mut book, location) = load_current()?;
    match query::running_task(&book).map(|t| t.id) {
        Some(id) => {
            let (name, total) = {
                let task = book.pause(id)?;
                (task.name.clone(), task.total_time)
            };
            save_book(&location, &book)?;
            println!(
                "Paused [{}] '{}' at {}",
                id,
                name,
                query::format_elapsed(total)
            );
        }
        None => println!("No task running"),
    }
    Ok(())
}

pub fn unstop(target: String) -> Result<()> {
    let (mut book, location) = load_current()?;
    let id = resolve_stopped(&book, &target)?;
    let name = book.unstop(id)?.name.clone();
    save_book(&location, &book)?;
    println!("Unstopped [{}] '{}'", id, name);
    Ok(())
}

pub fn rename(target: String, name: String) -> Result<()> {
    let (mut book, location) = load_current()?;
    let id = match query::resolve(&book, &target) {
        Some(task) => task.id,
        None => bail!("task not found: {}", target),
    };
    let name = book.rename(id, &name)?.name.clone();
    save_book(&location, &book)?;
    println!("Renamed [{}] to '{}'", id, name);
    Ok(())
}

pub fn tui() -> Result<()> {
    let cwd = env::current_dir()?;
    let location = locate_store(&cwd)?;
    let loaded = load_book(&location);
    ui::run(loaded.book, location, loaded.recovered)
}

fn load_current() -> Result<(TaskBook, StoreLocation)> {
    let cwd = env::current_dir()?;
    let location = locate_store(&cwd)?;
    let loaded = load_book(&location);
    if loaded.recovered {
        eprintln!(
            "warning: {} was unreadable; starting from an empty store",
            location.path.display()
        );
    }
    Ok((loaded.book, location))
}

// `query::resolve` excludes stopped tasks on purpose; unstop is the one
// command that has to search them.
fn resolve_stopped(book: &TaskBook, target: &str) -> Result<u64> {
    let found = match query::parse_ref(target) {
        TaskRef::ById(id) => book.get(id),
        TaskRef::ByName(name) => {
            let needle = name.to_lowercase();
            if needle.is_empty() {
                None
            } else {
                book.tasks
                    .iter()
                    .filter(|t| t.status == Status::Stopped)
                    .find(|t| t.name.to_lowercase().contains(&needle))
            }
        }
    };
    match found {
        Some(task) => Ok(task.id),
        None => bail!("task not found: {}", target),
    }
}
