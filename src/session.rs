//! Client session: which server to talk to and who we are logged in as.
//!
//! Persisted as `~/.taskboard/session.json`, hydrated at start-up, cleared on
//! logout or when the server reports the token as no longer valid.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::user::PublicUser;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("session file {path} is corrupt: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<PublicUser>,
}

impl Session {
    pub fn anonymous(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            token: None,
            user: None,
        }
    }

    /// `~/.taskboard/session.json`, falling back to the working directory when
    /// `HOME` is unset.
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".taskboard").join("session.json")
    }

    /// Load the saved session. A missing file yields an anonymous session for
    /// `server`; an explicit `server` always wins over the saved one.
    pub fn hydrate(path: &Path, server: Option<&str>) -> Result<Self, SessionError> {
        let mut session = if path.exists() {
            let buf = fs::read_to_string(path).map_err(|source| SessionError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str(&buf).map_err(|source| SessionError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Session::anonymous(DEFAULT_SERVER)
        };
        if let Some(server) = server {
            if server != session.server {
                // Tokens are per server.
                session = Session::anonymous(server);
            }
        }
        Ok(session)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn login(&mut self, token: String, user: PublicUser) {
        self.token = Some(token);
        self.user = Some(user);
    }

    /// Forget the credentials but keep the server.
    pub fn clear(&mut self) {
        self.token = None;
        self.user = None;
    }

    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        let io = |source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        };
        let data = serde_json::to_string_pretty(self).map_err(|source| SessionError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        let tmp = path.with_extension("json.tmp");
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // The file holds a bearer token: owner read/write only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut f = options.open(&tmp).map_err(io)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            f.set_permissions(fs::Permissions::from_mode(0o600)).map_err(io)?;
        }
        f.write_all(data.as_bytes()).map_err(io)?;
        f.flush().map_err(io)?;
        fs::rename(&tmp, path).map_err(io)
    }
}
