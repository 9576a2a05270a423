//! Document store for users, tasks and projects.
//!
//! This module provides the `Database` struct holding the three collections, its
//! JSON persistence (atomic temp file + rename), and `Store`, the shared handle the
//! services use. Every write runs under one lock against a copy of the database,
//! is persisted, and only then replaces the live copy, so a failed operation
//! leaves nothing half-applied.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::project::Project;
use crate::task::Task;
use crate::user::User;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read store {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write store {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("store {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to serialise store: {0}")]
    Serialise(#[from] serde_json::Error),
}

/// All persisted documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl Database {
    /// Load the database from a JSON file; a missing file is an empty database.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Database::default());
        }
        let mut buf = String::new();
        File::open(path)
            .and_then(|mut f| f.read_to_string(&mut buf))
            .map_err(|source| StoreError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&buf).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save database to JSON file using atomic write (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut f = File::create(&tmp)?;
            f.write_all(data.as_bytes())?;
            f.flush()?;
            fs::rename(&tmp, path)
        };
        write().map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    /// Look up a user by already-normalised email.
    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email == email)
    }

    /// Get a task by ID.
    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Get a mutable reference to a task by ID.
    pub fn task_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn project(&self, id: Uuid) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn project_mut(&mut self, id: Uuid) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.id == id)
    }

    /// Remove a user together with every task and project they own.
    pub fn remove_user(&mut self, id: Uuid) {
        self.users.retain(|u| u.id != id);
        self.tasks.retain(|t| t.owner != id);
        self.projects.retain(|p| p.owner != id);
    }
}

/// Shared, lock-guarded handle to the database, optionally backed by a file.
#[derive(Debug)]
pub struct Store {
    path: Option<PathBuf>,
    inner: RwLock<Database>,
}

impl Store {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: RwLock::new(Database::default()),
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let db = Database::load(&path)?;
        tracing::info!(
            path = %path.display(),
            users = db.users.len(),
            tasks = db.tasks.len(),
            "Store loaded"
        );
        Ok(Self {
            path: Some(path),
            inner: RwLock::new(db),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn read<R>(&self, f: impl FnOnce(&Database) -> R) -> R {
        let db = self.inner.read().await;
        f(&db)
    }

    /// Run `f` against a copy of the database. The copy is persisted and swapped
    /// in only when `f` succeeds and the save succeeds.
    pub async fn write<R, E>(&self, f: impl FnOnce(&mut Database) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.inner.write().await;
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        if let Some(path) = &self.path {
            draft.save(path)?;
        }
        *guard = draft;
        Ok(out)
    }
}
