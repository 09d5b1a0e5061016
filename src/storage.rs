use crate::model::TaskBook;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    Project,
    Global,
}

#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub path: PathBuf,
    pub scope: StoreScope,
}

/// Result of loading the store. `recovered` is set when a file existed but
/// could not be read or parsed and an empty book was substituted; the bad
/// file is only overwritten by the next successful save.
pub struct LoadedBook {
    pub book: TaskBook,
    pub recovered: bool,
}

pub fn init_project_store() -> Result<StoreLocation> {
    let cwd = env::current_dir()?;
    let dir = cwd.join(".taskclock");
    fs::create_dir_all(&dir).context("failed to create .taskclock directory")?;
    let location = StoreLocation {
        path: dir.join("tasks.yml"),
        scope: StoreScope::Project,
    };
    if !location.path.exists() {
        save_book(&location, &TaskBook::default())?;
    }
    Ok(location)
}

pub fn locate_store(start: &Path) -> Result<StoreLocation> {
    if let Some(project_path) = find_project_store(start) {
        return Ok(StoreLocation {
            path: project_path,
            scope: StoreScope::Project,
        });
    }
    let global_path = global_store_path()?;
    Ok(StoreLocation {
        path: global_path,
        scope: StoreScope::Global,
    })
}

pub fn load_book(location: &StoreLocation) -> LoadedBook {
    if !location.path.exists() {
        return LoadedBook {
            book: TaskBook::default(),
            recovered: false,
        };
    }
    let parsed = fs::read_to_string(&location.path)
        .ok()
        .and_then(|data| serde_yaml::from_str(&data).ok());
    match parsed {
        Some(book) => LoadedBook {
            book,
            recovered: false,
        },
        None => LoadedBook {
            book: TaskBook::default(),
            recovered: true,
        },
    }
}

pub fn save_book(location: &StoreLocation, book: &TaskBook) -> Result<()> {
    if let Some(parent) = location.path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(book).context("serializing task store")?;
    fs::write(&location.path, serialized)
        .with_context(|| format!("writing {:?}", location.path))?;
    Ok(())
}

fn find_project_store(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(".taskclock/tasks.yml");
        if candidate.exists() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

fn global_store_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "taskclock").context("locating data directory")?;
    Ok(dirs.data_dir().join("tasks.yml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static DIR_SEQ: AtomicUsize = AtomicUsize::new(0);

    fn temp_location() -> StoreLocation {
        let seq = DIR_SEQ.fetch_add(1, Ordering::SeqCst);
        let dir = env::temp_dir().join(format!(
            "taskclock-test-{}-{}",
            std::process::id(),
            seq
        ));
        StoreLocation {
            path: dir.join("tasks.yml"),
            scope: StoreScope::Project,
        }
    }

    #[test]
    fn missing_file_loads_empty_book() {
        let location = temp_location();
        let loaded = load_book(&location);
        assert!(!loaded.recovered);
        assert!(loaded.book.tasks.is_empty());
        assert_eq!(loaded.book.next_id, 1);
    }

    #[test]
    fn save_then_load_round_trips() {
        let location = temp_location();
        let mut book = TaskBook::default();
        book.create_task("Write spec", Some("https://example.com".into()))
            .unwrap();
        let id = book.tasks[0].id;
        book.start(id).unwrap();
        save_book(&location, &book).unwrap();

        let loaded = load_book(&location);
        assert!(!loaded.recovered);
        assert_eq!(loaded.book.tasks.len(), 1);
        let task = loaded.book.get(id).unwrap();
        assert_eq!(task.name, "Write spec");
        assert_eq!(task.status, Status::Running);
        assert_eq!(task.sessions.len(), 1);
        assert_eq!(loaded.book.last_active_task_id, Some(id));
        assert_eq!(loaded.book.next_id, book.next_id);
        fs::remove_dir_all(location.path.parent().unwrap()).ok();
    }

    #[test]
    fn corrupt_file_falls_back_to_empty_book() {
        let location = temp_location();
        fs::create_dir_all(location.path.parent().unwrap()).unwrap();
        fs::write(&location.path, "{ not: [ valid").unwrap();
        let loaded = load_book(&location);
        assert!(loaded.recovered);
        assert!(loaded.book.tasks.is_empty());
        fs::remove_dir_all(location.path.parent().unwrap()).ok();
    }
}
