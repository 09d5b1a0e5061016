use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Created,
    Running,
    Paused,
    Stopped,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Created => "created",
            Status::Running => "running",
            Status::Paused => "paused",
            Status::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub name: String,
    pub url: Option<String>,
    pub status: Status,
    pub sessions: Vec<Session>,
    pub total_time: i64,
    pub created_at: DateTime<Utc>,
    pub last_started: Option<DateTime<Utc>>,
    pub last_paused: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn open_session(&self) -> Option<&Session> {
        self.sessions.last().filter(|s| s.ended_at.is_none())
    }

    /// Tracked seconds for display. Only closed sessions are ever written to
    /// `total_time`; the live portion of an open session is computed here on
    /// demand and never written back.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        match (self.status, self.last_started) {
            (Status::Running, Some(started)) => {
                self.total_time + (now - started).num_seconds().max(0)
            }
            _ => self.total_time,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(u64),
    #[error("task name is empty")]
    EmptyName,
    #[error("task {0} is already running")]
    AlreadyRunning(u64),
    #[error("task {0} is not running")]
    NotRunning(u64),
    #[error("task {0} is not stopped")]
    NotStopped(u64),
}

/// The whole persisted state: every task record, the id counter, and the
/// pointer to the most recently started/paused task.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskBook {
    pub tasks: Vec<Task>,
    pub next_id: u64,
    pub last_active_task_id: Option<u64>,
}

impl Default for TaskBook {
    fn default() -> Self {
        TaskBook {
            tasks: Vec::new(),
            next_id: 1,
            last_active_task_id: None,
        }
    }
}

impl TaskBook {
    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn task_ref(&self, id: u64) -> Result<&Task, TaskError> {
        self.get(id).ok_or(TaskError::NotFound(id))
    }

    fn task_mut(&mut self, id: u64) -> Result<&mut Task, TaskError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TaskError::NotFound(id))
    }

    /// Ids of every running task. Normally zero or one entry; more than one
    /// means the store was corrupted outside this process.
    pub fn running_ids(&self) -> Vec<u64> {
        self.tasks
            .iter()
            .filter(|t| t.status == Status::Running)
            .map(|t| t.id)
            .collect()
    }

    pub fn create_task(&mut self, name: &str, url: Option<String>) -> Result<&Task, TaskError> {
        self.create_task_at(name, url, Utc::now())
    }

    pub fn create_task_at(
        &mut self,
        name: &str,
        url: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<&Task, TaskError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TaskError::EmptyName);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.push(Task {
            id,
            name: name.to_string(),
            url,
            status: Status::Created,
            sessions: Vec::new(),
            total_time: 0,
            created_at: now,
            last_started: None,
            last_paused: None,
            stopped_at: None,
        });
        self.task_ref(id)
    }

    pub fn start(&mut self, id: u64) -> Result<&Task, TaskError> {
        self.start_at(id, Utc::now())
    }

    /// Starting a task pauses whatever is running first, so at most one task
    /// is ever running without any global lock.
    pub fn start_at(&mut self, id: u64, now: DateTime<Utc>) -> Result<&Task, TaskError> {
        match self.get(id) {
            None => return Err(TaskError::NotFound(id)),
            Some(t) if t.status == Status::Running => return Err(TaskError::AlreadyRunning(id)),
            Some(_) => {}
        }
        for other in self.running_ids() {
            self.pause_at(other, now)?;
        }
        let task = self.task_mut(id)?;
        task.sessions.push(Session {
            started_at: now,
            ended_at: None,
            duration_secs: 0,
        });
        task.status = Status::Running;
        task.last_started = Some(now);
        self.last_active_task_id = Some(id);
        self.task_ref(id)
    }

    pub fn pause(&mut self, id: u64) -> Result<&Task, TaskError> {
        self.pause_at(id, Utc::now())
    }

    pub fn pause_at(&mut self, id: u64, now: DateTime<Utc>) -> Result<&Task, TaskError> {
        let task = self.task_mut(id)?;
        if task.status != Status::Running {
            return Err(TaskError::NotRunning(id));
        }
        if let Some(open) = task.sessions.last_mut().filter(|s| s.ended_at.is_none()) {
            let secs = (now - open.started_at).num_seconds().max(0);
            open.ended_at = Some(now);
            open.duration_secs = secs;
            task.total_time += secs;
        }
        task.status = Status::Paused;
        task.last_paused = Some(now);
        self.last_active_task_id = Some(id);
        self.task_ref(id)
    }

    pub fn stop(&mut self, id: u64) -> Result<&Task, TaskError> {
        self.stop_at(id, Utc::now())
    }

    pub fn stop_at(&mut self, id: u64, now: DateTime<Utc>) -> Result<&Task, TaskError> {
        match self.get(id) {
            None => return Err(TaskError::NotFound(id)),
            Some(t) if t.status == Status::Running => {
                self.pause_at(id, now)?;
            }
            Some(_) => {}
        }
        let task = self.task_mut(id)?;
        task.status = Status::Stopped;
        task.stopped_at = Some(now);
        self.task_ref(id)
    }

    pub fn unstop(&mut self, id: u64) -> Result<&Task, TaskError> {
        let task = self.task_mut(id)?;
        if task.status != Status::Stopped {
            return Err(TaskError::NotStopped(id));
        }
        task.status = Status::Paused;
        task.stopped_at = None;
        self.task_ref(id)
    }

    pub fn rename(&mut self, id: u64, name: &str) -> Result<&Task, TaskError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TaskError::EmptyName);
        }
        let task = self.task_mut(id)?;
        task.name = name.to_string();
        self.task_ref(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn book_with(names: &[&str]) -> TaskBook {
        let mut book = TaskBook::default();
        for name in names {
            book.create_task_at(name, None, at(0)).unwrap();
        }
        book
    }

    #[test]
    fn create_assigns_monotonic_ids_and_trims() {
        let mut book = TaskBook::default();
        let a = book.create_task_at("  Write spec  ", None, at(0)).unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(a.name, "Write spec");
        assert_eq!(a.status, Status::Created);
        let b = book.create_task_at("Review PR", None, at(1)).unwrap();
        assert_eq!(b.id, 2);
        assert_eq!(book.next_id, 3);
    }

    #[test]
    fn create_rejects_blank_name() {
        let mut book = TaskBook::default();
        assert_eq!(
            book.create_task_at("   ", None, at(0)).unwrap_err(),
            TaskError::EmptyName
        );
        assert!(book.tasks.is_empty());
        assert_eq!(book.next_id, 1);
    }

    #[test]
    fn start_pause_round_trip_accounts_exact_seconds() {
        let mut book = book_with(&["A"]);
        book.start_at(1, at(10)).unwrap();
        let task = book.get(1).unwrap();
        assert_eq!(task.status, Status::Running);
        assert!(task.open_session().is_some());
        assert_eq!(task.total_time, 0);

        let task = book.pause_at(1, at(100)).unwrap();
        assert_eq!(task.status, Status::Paused);
        assert_eq!(task.total_time, 90);
        assert_eq!(task.sessions.len(), 1);
        assert_eq!(task.sessions[0].duration_secs, 90);
        assert_eq!(task.sessions[0].ended_at, Some(at(100)));
        assert!(task.open_session().is_none());
    }

    #[test]
    fn total_time_never_includes_open_session() {
        let mut book = book_with(&["A"]);
        book.start_at(1, at(0)).unwrap();
        assert_eq!(book.get(1).unwrap().total_time, 0);
        assert_eq!(book.get(1).unwrap().elapsed_secs(at(42)), 42);
        book.pause_at(1, at(50)).unwrap();
        book.start_at(1, at(60)).unwrap();
        let task = book.get(1).unwrap();
        assert_eq!(task.total_time, 50);
        assert_eq!(task.elapsed_secs(at(75)), 65);
    }

    #[test]
    fn at_most_one_running_after_any_start_sequence() {
        let mut book = book_with(&["A", "B", "C"]);
        for (id, t) in [(1, 10), (2, 20), (3, 30), (1, 40), (3, 50)] {
            book.start_at(id, at(t)).unwrap();
            assert_eq!(book.running_ids().len(), 1);
        }
        assert_eq!(book.running_ids(), vec![3]);
    }

    #[test]
    fn starting_second_task_pauses_first_with_correct_time() {
        let mut book = book_with(&["Write spec"]);
        book.start_at(1, at(0)).unwrap();
        book.create_task_at("Review PR", None, at(30)).unwrap();
        book.start_at(2, at(30)).unwrap();

        let first = book.get(1).unwrap();
        assert_eq!(first.status, Status::Paused);
        assert_eq!(first.total_time, 30);
        assert_eq!(book.get(2).unwrap().status, Status::Running);
        assert_eq!(book.last_active_task_id, Some(2));
    }

    #[test]
    fn start_on_running_task_is_rejected() {
        let mut book = book_with(&["A"]);
        book.start_at(1, at(0)).unwrap();
        assert_eq!(
            book.start_at(1, at(5)).unwrap_err(),
            TaskError::AlreadyRunning(1)
        );
        assert_eq!(book.get(1).unwrap().sessions.len(), 1);
    }

    #[test]
    fn pause_on_non_running_task_leaves_record_unchanged() {
        let mut book = book_with(&["A"]);
        assert_eq!(
            book.pause_at(1, at(5)).unwrap_err(),
            TaskError::NotRunning(1)
        );
        let task = book.get(1).unwrap();
        assert_eq!(task.status, Status::Created);
        assert!(task.sessions.is_empty());
        assert_eq!(task.total_time, 0);

        book.start_at(1, at(10)).unwrap();
        book.pause_at(1, at(20)).unwrap();
        assert_eq!(
            book.pause_at(1, at(30)).unwrap_err(),
            TaskError::NotRunning(1)
        );
        assert_eq!(book.get(1).unwrap().total_time, 10);
        assert_eq!(book.get(1).unwrap().sessions.len(), 1);
    }

    #[test]
    fn stop_on_running_task_pauses_then_marks_stopped() {
        let mut book = book_with(&["A"]);
        book.start_at(1, at(0)).unwrap();
        let task = book.stop_at(1, at(25)).unwrap();
        assert_eq!(task.status, Status::Stopped);
        assert_eq!(task.total_time, 25);
        assert_eq!(task.stopped_at, Some(at(25)));
        assert!(task.open_session().is_none());
        assert_eq!(task.last_paused, Some(at(25)));
    }

    #[test]
    fn unstop_restores_paused_and_keeps_history() {
        let mut book = book_with(&["A"]);
        book.start_at(1, at(0)).unwrap();
        book.stop_at(1, at(25)).unwrap();
        let task = book.unstop(1).unwrap();
        assert_eq!(task.status, Status::Paused);
        assert_eq!(task.stopped_at, None);
        assert_eq!(task.total_time, 25);
        assert_eq!(task.sessions.len(), 1);
    }

    #[test]
    fn unstop_on_non_stopped_task_is_rejected() {
        let mut book = book_with(&["A"]);
        book.start_at(1, at(0)).unwrap();
        assert_eq!(book.unstop(1).unwrap_err(), TaskError::NotStopped(1));
        assert_eq!(book.get(1).unwrap().status, Status::Running);
    }

    #[test]
    fn lifecycle_errors_on_unknown_id() {
        let mut book = TaskBook::default();
        assert_eq!(book.start_at(7, at(0)).unwrap_err(), TaskError::NotFound(7));
        assert_eq!(book.pause_at(7, at(0)).unwrap_err(), TaskError::NotFound(7));
        assert_eq!(book.stop_at(7, at(0)).unwrap_err(), TaskError::NotFound(7));
        assert_eq!(book.unstop(7).unwrap_err(), TaskError::NotFound(7));
    }

    #[test]
    fn rename_trims_and_validates() {
        let mut book = book_with(&["A"]);
        assert_eq!(book.rename(1, "  B  ").unwrap().name, "B");
        assert_eq!(book.rename(1, " ").unwrap_err(), TaskError::EmptyName);
        assert_eq!(book.get(1).unwrap().name, "B");
    }

    #[test]
    fn pause_updates_last_active_pointer() {
        let mut book = book_with(&["A", "B"]);
        book.start_at(2, at(0)).unwrap();
        book.pause_at(2, at(5)).unwrap();
        assert_eq!(book.last_active_task_id, Some(2));
        book.start_at(1, at(10)).unwrap();
        assert_eq!(book.last_active_task_id, Some(1));
    }
}
