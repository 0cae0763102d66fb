//! Failures of the tool layer.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{tool} is not installed or not on PATH")]
    ToolNotFound { tool: String },

    /// The process could not be spawned for a reason other than a missing binary.
    #[error("cannot launch {tool}: {source}")]
    Launch {
        tool: String,
        source: std::io::Error,
    },

    /// Identification ended with an exit code outside the tolerated set.
    #[error("{tool} exited with {status} on {}", path.display())]
    Exit {
        tool: String,
        status: String,
        path: PathBuf,
    },

    #[error("cannot decode {tool} output: {source}")]
    Decode {
        tool: String,
        source: serde_json::Error,
    },

    #[error("unrecognized container: {}", .0.display())]
    Unrecognized(PathBuf),

    #[error("no such file: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("cannot prepare workspace in {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The run was cancelled before or while the tool ran.
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    pub fn launch(tool: impl Into<String>, source: std::io::Error) -> Self {
        Self::Launch {
            tool: tool.into(),
            source,
        }
    }

    pub fn workspace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Workspace {
            path: path.into(),
            source,
        }
    }
}
