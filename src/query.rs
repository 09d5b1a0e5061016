use crate::model::{Status, Task, TaskBook};
use chrono::{DateTime, Local, NaiveDate, Utc};

/// A user-typed task identifier, classified once at the boundary: all-digit
/// input addresses a task by id, anything else by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRef {
    ById(u64),
    ByName(String),
}

pub fn parse_ref(input: &str) -> TaskRef {
    let trimmed = input.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        // Digits stay an id lookup even past u64::MAX; ids are allocated
        // from 1 upward, so the sentinel can never match a task.
        return TaskRef::ById(trimmed.parse().unwrap_or(u64::MAX));
    }
    TaskRef::ByName(trimmed.to_string())
}

/// Resolve a typed identifier to a task. Stopped tasks are excluded. Name
/// lookup prefers a case-insensitive exact match, then falls back to the
/// first substring match in store order.
pub fn resolve<'a>(book: &'a TaskBook, input: &str) -> Option<&'a Task> {
    match parse_ref(input) {
        TaskRef::ById(id) => book.get(id).filter(|t| t.status != Status::Stopped),
        TaskRef::ByName(name) => {
            let needle = name.to_lowercase();
            if needle.is_empty() {
                return None;
            }
            let mut live = book.tasks.iter().filter(|t| t.status != Status::Stopped);
            live.clone()
                .find(|t| t.name.to_lowercase() == needle)
                .or_else(|| live.find(|t| t.name.to_lowercase().contains(&needle)))
        }
    }
}

pub fn by_status(book: &TaskBook, status: Status) -> Vec<&Task> {
    book.tasks.iter().filter(|t| t.status == status).collect()
}

/// The running task, derived by scan rather than cached. If corruption has
/// left more than one record running, the lowest id wins; callers that want
/// to surface the condition check `TaskBook::running_ids`.
pub fn running_task(book: &TaskBook) -> Option<&Task> {
    book.tasks
        .iter()
        .filter(|t| t.status == Status::Running)
        .min_by_key(|t| t.id)
}

/// Non-stopped tasks with activity on the current local calendar day.
pub fn today(book: &TaskBook) -> Vec<&Task> {
    on_day(book, Local::now().date_naive())
}

pub fn on_day(book: &TaskBook, day: NaiveDate) -> Vec<&Task> {
    book.tasks
        .iter()
        .filter(|t| t.status != Status::Stopped && touched_on(t, day))
        .collect()
}

fn touched_on(task: &Task, day: NaiveDate) -> bool {
    let hit = |ts: Option<DateTime<Utc>>| ts.is_some_and(|t| local_day(t) == day);
    hit(task.last_started)
        || hit(task.last_paused)
        || task
            .sessions
            .iter()
            .any(|s| local_day(s.started_at) == day || hit(s.ended_at))
}

fn local_day(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Local).date_naive()
}

#[derive(Debug, Clone)]
pub struct TaskSummary {
    pub id: u64,
    pub name: String,
    pub status: Status,
    pub elapsed_secs: i64,
    pub elapsed: String,
    pub sessions: usize,
}

pub fn summarize(task: &Task, now: DateTime<Utc>) -> TaskSummary {
    let elapsed_secs = task.elapsed_secs(now);
    TaskSummary {
        id: task.id,
        name: task.name.clone(),
        status: task.status,
        elapsed_secs,
        elapsed: format_elapsed(elapsed_secs),
        sessions: task.sessions.len(),
    }
}

/// "2h 5m 9s" style; zero higher units are dropped, seconds always shown.
pub fn format_elapsed(secs: i64) -> String {
    let secs = secs.max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {}m {}s", h, m, s)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}
