//! Task Tracker — durable run→task map plus an append-only progress
//! log. Holds a non-owning reference to the Task Store for status
//! propagation; it never outlives the store it was built from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use tl_domain::error::{Error, Result};
use tl_domain::trace::TraceEvent;

use crate::store::TaskStore;
use crate::types::{ProgressEntry, RunLink, TaskPatch, TaskStatus};

const DEFAULT_PROGRESS_LIMIT: usize = 20;

#[derive(Serialize, Deserialize, Default)]
struct TrackerRecord {
    #[serde(default)]
    run_links: Vec<RunLink>,
    #[serde(default)]
    progress: Vec<ProgressEntry>,
}

struct Inner {
    run_links: HashMap<String, RunLink>,
    progress: Vec<ProgressEntry>,
}

pub struct TaskTracker {
    store: Arc<TaskStore>,
    inner: RwLock<Inner>,
    tracker_path: PathBuf,
}

impl TaskTracker {
    pub fn new(store: Arc<TaskStore>, tracker_path: &Path) -> Result<Self> {
        if let Some(parent) = tracker_path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        let record = if tracker_path.exists() {
            let raw = std::fs::read_to_string(tracker_path).map_err(Error::Io)?;
            serde_json::from_str(&raw)?
        } else {
            TrackerRecord::default()
        };

        let run_links = record.run_links.into_iter().map(|l| (l.run_id.clone(), l)).collect();

        Ok(Self {
            store,
            inner: RwLock::new(Inner {
                run_links,
                progress: record.progress,
            }),
            tracker_path: tracker_path.to_path_buf(),
        })
    }

    fn persist_locked(&self, inner: &Inner) -> Result<()> {
        let record = TrackerRecord {
            run_links: inner.run_links.values().cloned().collect(),
            progress: inner.progress.clone(),
        };
        let json = serde_json::to_string_pretty(&record)?;
        let tmp = self.tracker_path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(Error::Io)?;
        std::fs::rename(&tmp, &self.tracker_path).map_err(Error::Io)?;
        Ok(())
    }

    /// Upsert a run→task link; both ids are required and non-empty.
    pub fn link_run(&self, run_id: &str, task_id: &str) -> Result<()> {
        if run_id.is_empty() || task_id.is_empty() {
            return Err(Error::InvalidArgument("run_id and task_id are required".into()));
        }

        let mut inner = self.inner.write();
        inner.run_links.insert(
            run_id.to_string(),
            RunLink {
                run_id: run_id.to_string(),
                task_id: task_id.to_string(),
                created_at: Utc::now(),
            },
        );
        self.persist_locked(&inner)?;

        TraceEvent::RunLinked {
            run_id: run_id.to_string(),
            task_id: task_id.to_string(),
        }
        .emit();
        Ok(())
    }

    /// Returns the linked task id, or an empty string if unknown —
    /// this is not an error case.
    pub fn resolve_task_by_run(&self, run_id: &str) -> String {
        self.inner
            .read()
            .run_links
            .get(run_id)
            .map(|l| l.task_id.clone())
            .unwrap_or_default()
    }

    /// Normalize the status alias and forward to the Task Store. A
    /// link pointing at a task the store no longer has is a tombstone
    /// — this surfaces as `NotFound` from the store, not a tracker bug.
    pub fn update_task_status(&self, task_id: &str, raw_status: &str) -> Result<()> {
        let status = TaskStatus::parse(raw_status)
            .ok_or_else(|| Error::InvalidArgument(format!("invalid status: {raw_status}")))?;
        self.store.update(
            task_id,
            TaskPatch {
                status: Some(status),
                ..Default::default()
            },
        )?;
        Ok(())
    }

    pub fn append_progress(
        &self,
        task_id: &str,
        run_id: Option<&str>,
        status: Option<&str>,
        message: &str,
    ) -> Result<ProgressEntry> {
        if task_id.is_empty() {
            return Err(Error::InvalidArgument("task_id is required".into()));
        }
        if message.is_empty() {
            return Err(Error::InvalidArgument("message is required".into()));
        }

        let status = match status {
            Some(raw) => Some(
                TaskStatus::parse(raw)
                    .ok_or_else(|| Error::InvalidArgument(format!("invalid status: {raw}")))?,
            ),
            None => None,
        };

        let entry = ProgressEntry {
            entry_id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            run_id: run_id.map(str::to_string),
            status,
            message: message.to_string(),
            created_at: Utc::now(),
        };

        let mut inner = self.inner.write();
        inner.progress.push(entry.clone());
        self.persist_locked(&inner)?;

        TraceEvent::ProgressAppended {
            task_id: task_id.to_string(),
            run_id: run_id.map(str::to_string),
            status: status.map(|s| s.to_string()),
        }
        .emit();

        Ok(entry)
    }

    /// Newest-first. `limit == 0` defaults to 20.
    pub fn list_progress(&self, task_id: &str, limit: usize) -> Vec<ProgressEntry> {
        let limit = if limit == 0 { DEFAULT_PROGRESS_LIMIT } else { limit };
        let inner = self.inner.read();
        inner
            .progress
            .iter()
            .rev()
            .filter(|e| e.task_id == task_id)
            .take(limit)
            .cloned()
            .collect()
    }
}
