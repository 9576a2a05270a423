//! Client-side board state with optimistic moves.
//!
//! A move is shown immediately; the task's last known-good copy is kept until the
//! server answers. Success adopts the server's copy, failure restores the
//! snapshot. Push events are advisory and never touch a card with a move in
//! flight. A reload that was started before later changes settled does not
//! undo them.

use std::collections::HashMap;

use uuid::Uuid;

use crate::events::TaskEvent;
use crate::fields::Status;
use crate::service::task_order;
use crate::task::Task;

/// An optimistic status change awaiting confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub id: Uuid,
    pub from: Status,
    pub to: Status,
}

#[derive(Debug, Default)]
pub struct Board {
    tasks: Vec<Task>,
    pending: HashMap<Uuid, Task>,
    revision: u64,
    loaded_at: u64,
    /// Changes settled since the last applied reload; `None` marks a removal.
    settled: HashMap<Uuid, (u64, Option<Task>)>,
}

impl Board {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            ..Self::default()
        }
    }

    /// Counter bumped by every settled change. Pass it to `replace_all` for a
    /// reload started now.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Tasks under `status`, in listing order.
    pub fn column(&self, status: Status) -> Vec<&Task> {
        let mut col: Vec<&Task> = self.tasks.iter().filter(|t| t.status == status).collect();
        col.sort_by(|a, b| task_order(a, b));
        col
    }

    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn is_pending(&self, id: Uuid) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Show `id` under `to` right away. `None` when the task is unknown, already
    /// there, or still waiting on a previous move.
    pub fn begin_move(&mut self, id: Uuid, to: Status) -> Option<Move> {
        if self.pending.contains_key(&id) {
            return None;
        }
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        if task.status == to {
            return None;
        }
        let from = task.status;
        self.pending.insert(id, task.clone());
        task.status = to;
        Some(Move { id, from, to })
    }

    /// The server accepted the change; its copy becomes the truth. Ignored
    /// (returns `false`) when no move is waiting for this task.
    pub fn confirm(&mut self, server: Task) -> bool {
        if self.pending.remove(&server.id).is_none() {
            return false;
        }
        self.settle(server);
        true
    }

    /// Record a server copy that arrived outside a move.
    pub fn settle(&mut self, task: Task) {
        self.revision += 1;
        self.settled.insert(task.id, (self.revision, Some(task.clone())));
        self.upsert(task);
    }

    /// The server refused or could not be reached: restore the snapshot.
    /// Returns the status the card went back to.
    pub fn revert(&mut self, id: Uuid) -> Option<Status> {
        let snapshot = self.pending.remove(&id)?;
        let status = snapshot.status;
        self.upsert(snapshot);
        Some(status)
    }

    /// Apply a push event. Returns whether anything changed.
    pub fn apply_event(&mut self, event: &TaskEvent) -> bool {
        match event {
            TaskEvent::Created(task) | TaskEvent::Updated(task) => {
                if self.is_pending(task.id) {
                    return false;
                }
                if self.task(task.id) == Some(task) {
                    return false;
                }
                self.settle(task.clone());
                true
            }
            TaskEvent::Deleted { id, .. } => {
                if self.is_pending(*id) {
                    return false;
                }
                self.remove(*id)
            }
        }
    }

    pub fn upsert(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => *slot = task,
            None => self.tasks.push(task),
        }
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.pending.remove(&id);
        self.revision += 1;
        self.settled.insert(id, (self.revision, None));
        self.tasks.len() != before
    }

    /// Replace everything with a reload that started at revision `since`.
    ///
    /// Changes settled after `since` and in-flight optimistic cards win over the
    /// reloaded copies. A reload older than one already applied is dropped;
    /// returns whether this one was used.
    pub fn replace_all(&mut self, tasks: Vec<Task>, since: u64) -> bool {
        if since < self.loaded_at {
            return false;
        }
        let in_flight: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| self.pending.contains_key(&t.id))
            .cloned()
            .collect();
        self.tasks = tasks;
        self.loaded_at = since;
        self.settled.retain(|_, (rev, _)| *rev > since);
        let newer: Vec<(Uuid, Option<Task>)> = self
            .settled
            .iter()
            .map(|(id, (_, task))| (*id, task.clone()))
            .collect();
        for (id, task) in newer {
            match task {
                Some(task) => self.upsert(task),
                None => self.tasks.retain(|t| t.id != id),
            }
        }
        for task in in_flight {
            self.upsert(task);
        }
        true
    }
}
