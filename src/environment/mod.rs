//! Deployment environment selection shared across cooperating processes.
//!
//! The supervising process picks an [`Environment`] once at startup and writes
//! it through an [`EnvironmentHandle`]. Worker processes spawned afterwards
//! locate the same selector through the `REGISTRY_ENV_FILE` variable they
//! inherit and read it back, without the value being passed as an argument.
//!
//! # Ordering
//! A single writer stores the value before any reader is started. Concurrent
//! writers are not supported.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

/// Variable through which child processes find the selector file.
pub const ENV_FILE_VAR: &str = "REGISTRY_ENV_FILE";

/// Deployment environment of the running instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    #[default]
    Dev,
    Test,
    /// Staging.
    Pre,
    Prod,
}

impl Environment {
    pub const ALL: [Environment; 4] = [Self::Dev, Self::Test, Self::Pre, Self::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Test => "test",
            Self::Pre => "pre",
            Self::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = EnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|env| env.as_str() == s)
            .ok_or_else(|| EnvironmentError::Unknown(s.to_string()))
    }
}

/// Errors raised by the environment selector.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("unknown environment '{0}' (expected dev, test, pre or prod)")]
    Unknown(String),

    #[error("environment selector {} has not been written", .0.display())]
    Empty(PathBuf),

    #[error("REGISTRY_ENV_FILE is not set")]
    NotExported,

    #[error("environment selector IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// File-backed handle to the shared environment selector.
#[derive(Debug)]
pub struct EnvironmentHandle {
    path: PathBuf,
    owner: bool,
    closed: bool,
}

impl EnvironmentHandle {
    /// Default selector location for an app, inside the system temp directory.
    ///
    /// The writer's pid is part of the name, so agents of the same app on one
    /// host each own a separate file. Workers find it through [`ENV_FILE_VAR`].
    pub fn default_path(app_name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{}.{}.environment", app_name, std::process::id()))
    }

    /// Create the selector as its writer. The file is removed on [`close`](Self::close).
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, EnvironmentError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::File::create(&path)?;
        Ok(Self {
            path,
            owner: true,
            closed: false,
        })
    }

    /// Attach to an existing selector as a reader.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owner: false,
            closed: false,
        }
    }

    /// Attach to the selector exported by the parent process.
    pub fn from_env() -> Result<Self, EnvironmentError> {
        let path = std::env::var_os(ENV_FILE_VAR).ok_or(EnvironmentError::NotExported)?;
        Ok(Self::open(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store the selected environment.
    ///
    /// Precondition: this handle is the only writer and no reader has been
    /// started yet. The value is staged in a sibling file and renamed into
    /// place so a reader never sees a partial write.
    pub fn write(&self, env: Environment) -> Result<(), EnvironmentError> {
        let staging = self.path.with_extension("staging");
        {
            let mut file = fs::File::create(&staging)?;
            file.write_all(env.as_str().as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&staging, &self.path)?;
        tracing::debug!(path = %self.path.display(), env = %env, "Environment selector written");
        Ok(())
    }

    /// Read the selected environment.
    pub fn read(&self) -> Result<Environment, EnvironmentError> {
        let raw = fs::read_to_string(&self.path)?;
        let value = raw.trim();
        if value.is_empty() {
            return Err(EnvironmentError::Empty(self.path.clone()));
        }
        value.parse()
    }

    /// Release the selector. The writer removes the backing file.
    pub fn close(mut self) -> Result<(), EnvironmentError> {
        self.closed = true;
        if self.owner {
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl Drop for EnvironmentHandle {
    fn drop(&mut self) {
        if self.owner && !self.closed {
            let _ = fs::remove_file(&self.path);
        }
    }
}
