//! Task Store — in-memory dependency graph with snapshot-on-mutation
//! persistence.
//!
//! The backing file is written via a temp-file-then-rename, the same
//! discipline the teacher's `RunStore::rewrite_jsonl` uses to keep a
//! reader from ever observing a half-written file. Here the whole
//! ordered task sequence is the unit of persistence rather than an
//! append-only log, since `Snapshot` must be cheap and the graph is
//! expected to stay in the tens-of-thousands-of-tasks range.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use tl_domain::error::{Error, Result};
use tl_domain::trace::TraceEvent;

use crate::types::{Task, TaskPatch, TaskStatus};

#[derive(Serialize, Deserialize)]
struct SnapshotRecord {
    updated_at_millis: i64,
    tasks: Vec<Task>,
}

struct Inner {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
}

impl Inner {
    fn from_tasks(tasks: Vec<Task>) -> Self {
        let index = tasks.iter().enumerate().map(|(i, t)| (t.id.clone(), i)).collect();
        Self { tasks, index }
    }

    fn rebuild_index(&mut self) {
        self.index = self.tasks.iter().enumerate().map(|(i, t)| (t.id.clone(), i)).collect();
    }

    fn get(&self, id: &str) -> Option<&Task> {
        self.index.get(id).and_then(|&i| self.tasks.get(i))
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        match self.index.get(id) {
            Some(&i) => self.tasks.get_mut(i),
            None => None,
        }
    }

    /// True if `target` is reachable from `start` by following
    /// `blocked_by` edges transitively (iterative DFS, visited set).
    fn reachable_via_blocked_by(&self, start: &str, target: &str) -> bool {
        let mut stack = vec![start.to_string()];
        let mut visited = std::collections::HashSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !visited.insert(id.clone()) {
                continue;
            }
            if let Some(task) = self.get(&id) {
                stack.extend(task.blocked_by.iter().cloned());
            }
        }
        false
    }
}

pub struct TaskStore {
    inner: Mutex<Inner>,
    snapshot_path: PathBuf,
}

impl TaskStore {
    pub fn new(snapshot_path: &Path) -> Result<Self> {
        if let Some(parent) = snapshot_path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        let tasks = if snapshot_path.exists() {
            let raw = std::fs::read_to_string(snapshot_path).map_err(Error::Io)?;
            let record: SnapshotRecord = serde_json::from_str(&raw)?;
            record.tasks
        } else {
            Vec::new()
        };

        tracing::info!(
            tasks = tasks.len(),
            path = %snapshot_path.display(),
            "task store loaded"
        );

        Ok(Self {
            inner: Mutex::new(Inner::from_tasks(tasks)),
            snapshot_path: snapshot_path.to_path_buf(),
        })
    }

    /// Apply `f` to the locked inner state; on success the new state
    /// is persisted before the lock is released, on either a logic
    /// error or a persistence error the pre-mutation state is restored.
    fn mutate<T>(&self, f: impl FnOnce(&mut Inner) -> Result<T>) -> Result<T> {
        let mut inner = self.inner.lock();
        let before = inner.tasks.clone();

        match f(&mut inner) {
            Ok(value) => match self.persist_locked(&inner) {
                Ok(()) => Ok(value),
                Err(e) => {
                    inner.tasks = before;
                    inner.rebuild_index();
                    Err(e)
                }
            },
            Err(e) => {
                inner.tasks = before;
                inner.rebuild_index();
                Err(e)
            }
        }
    }

    fn persist_locked(&self, inner: &Inner) -> Result<()> {
        let record = SnapshotRecord {
            updated_at_millis: Utc::now().timestamp_millis(),
            tasks: inner.tasks.clone(),
        };
        let json = serde_json::to_string_pretty(&record)?;

        let tmp = self.snapshot_path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(Error::Io)?;
        std::fs::rename(&tmp, &self.snapshot_path).map_err(Error::Io)?;
        Ok(())
    }

    pub fn create(&self, subject: &str, description: &str, active_form: Option<&str>) -> Result<Task> {
        if subject.trim().is_empty() {
            return Err(Error::InvalidArgument("subject empty".into()));
        }
        let subject = subject.to_string();
        let description = description.to_string();
        let active_form = active_form.map(|s| s.to_string());

        self.mutate(move |inner| {
            let task = Task::new(subject, description, active_form);
            TraceEvent::TaskCreated {
                task_id: task.id.clone(),
                subject: task.subject.clone(),
            }
            .emit();
            inner.tasks.push(task.clone());
            inner.index.insert(task.id.clone(), inner.tasks.len() - 1);
            Ok(task)
        })
    }

    pub fn get(&self, id: &str) -> Result<Task> {
        self.inner
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    pub fn update(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        let id = id.to_string();
        self.mutate(move |inner| {
            let task = inner.get_mut(&id).ok_or_else(|| Error::NotFound(id.clone()))?;

            if let Some(subject) = patch.subject {
                if subject.trim().is_empty() {
                    return Err(Error::InvalidArgument("subject empty".into()));
                }
                task.subject = subject;
            }
            if let Some(description) = patch.description {
                task.description = description;
            }
            if let Some(active_form) = patch.active_form {
                task.active_form = active_form;
            }
            if let Some(owner) = patch.owner {
                task.owner = owner;
            }
            if let Some(status) = patch.status {
                task.status = status;
                TraceEvent::TaskUpdated {
                    task_id: task.id.clone(),
                    status: status.to_string(),
                }
                .emit();
            }
            let floor = task.updated_at + chrono::Duration::nanoseconds(1);
            task.updated_at = Utc::now().max(floor);
            Ok(task.clone())
        })
    }

    /// Delete a task and remove all incident dependency edges.
    /// Deleting a task that doesn't exist is a documented no-op.
    pub fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.mutate(move |inner| {
            let Some(&idx) = inner.index.get(&id) else {
                return Ok(());
            };

            let removed = inner.tasks.remove(idx);
            for other in inner.tasks.iter_mut() {
                other.blocked_by.retain(|b| b != &id);
                other.blocks.retain(|b| b != &id);
            }
            inner.rebuild_index();
            TraceEvent::TaskDeleted { task_id: removed.id }.emit();
            Ok(())
        })
    }

    pub fn list(&self) -> Vec<Task> {
        self.inner.lock().tasks.clone()
    }

    pub fn add_dependency(&self, task_id: &str, blocker_id: &str) -> Result<()> {
        if task_id == blocker_id {
            return Err(Error::CycleDetected);
        }
        let task_id = task_id.to_string();
        let blocker_id = blocker_id.to_string();

        self.mutate(move |inner| {
            if inner.get(&task_id).is_none() {
                return Err(Error::NotFound(task_id.clone()));
            }
            if inner.get(&blocker_id).is_none() {
                return Err(Error::NotFound(blocker_id.clone()));
            }
            // Adding task_id.blocked_by += blocker_id would close a
            // cycle if task_id is already reachable from blocker_id.
            if inner.reachable_via_blocked_by(&blocker_id, &task_id) {
                return Err(Error::CycleDetected);
            }

            if let Some(task) = inner.get_mut(&task_id) {
                if !task.blocked_by.contains(&blocker_id) {
                    task.blocked_by.push(blocker_id.clone());
                }
            }
            if let Some(blocker) = inner.get_mut(&blocker_id) {
                if !blocker.blocks.contains(&task_id) {
                    blocker.blocks.push(task_id.clone());
                }
            }
            TraceEvent::DependencyAdded {
                task_id: task_id.clone(),
                blocker_id: blocker_id.clone(),
            }
            .emit();
            Ok(())
        })
    }

    pub fn remove_dependency(&self, task_id: &str, blocker_id: &str) -> Result<()> {
        let task_id = task_id.to_string();
        let blocker_id = blocker_id.to_string();

        self.mutate(move |inner| {
            if inner.get(&task_id).is_none() {
                return Err(Error::NotFound(task_id.clone()));
            }

            if let Some(task) = inner.get_mut(&task_id) {
                task.blocked_by.retain(|b| b != &blocker_id);
            }
            if let Some(blocker) = inner.get_mut(&blocker_id) {
                blocker.blocks.retain(|t| t != &task_id);
            }
            TraceEvent::DependencyRemoved {
                task_id: task_id.clone(),
                blocker_id: blocker_id.clone(),
            }
            .emit();
            Ok(())
        })
    }

    /// Tasks that are blocked by `id` — i.e. `id ∈ task.blocked_by`.
    pub fn get_blocked_tasks(&self, id: &str) -> Vec<Task> {
        let inner = self.inner.lock();
        inner
            .tasks
            .iter()
            .filter(|t| t.blocked_by.iter().any(|b| b == id))
            .cloned()
            .collect()
    }

    /// The tasks listed in `id.blocked_by` — i.e. the tasks blocking `id`.
    pub fn get_blocking_tasks(&self, id: &str) -> Vec<Task> {
        let inner = self.inner.lock();
        match inner.get(id) {
            Some(task) => task
                .blocked_by
                .iter()
                .filter_map(|b| inner.get(b).cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.list()
    }
}
