//! Error taxonomy for remux runs.
//!
//! Errors attach to the smallest failing unit: an input, a playlist, a file
//! or a single track plan.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Input errors, fatal for one input only.
    #[error("input does not exist: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("directory given in file mode: {}", .0.display())]
    DirectoryInFileMode(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("output already exists: {}", .0.display())]
    OutputExists(PathBuf),

    // Parse errors, attributed to the offending file.
    #[error("no playlists found under {}", .0.display())]
    NoPlaylists(PathBuf),

    #[error("cannot decode playlist {}: {reason}", path.display())]
    Playlist { path: PathBuf, reason: String },

    #[error("cannot identify {}: {source}", path.display())]
    Identification {
        path: PathBuf,
        source: discmux_av::Error,
    },

    #[error("invalid track layout: {0}")]
    Plan(#[from] PlanError),

    // Execution errors.
    #[error("{tool} failed on {} ({status})", path.display())]
    Execution {
        tool: String,
        status: String,
        path: PathBuf,
    },

    #[error("no output produced for {}", .0.display())]
    NoOutputFile(PathBuf),

    #[error("cannot hash {}: {source}", path.display())]
    Hash {
        path: PathBuf,
        source: discmux_av::Error,
    },

    #[error("terminated")]
    Terminated,

    #[error("tool error: {0}")]
    Tool(discmux_av::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn playlist(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Playlist {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn identification(path: impl Into<PathBuf>, source: discmux_av::Error) -> Self {
        match source {
            discmux_av::Error::Cancelled => Self::Terminated,
            source => Self::Identification {
                path: path.into(),
                source,
            },
        }
    }

    pub fn execution(tool: impl ToString, status: impl ToString, path: impl Into<PathBuf>) -> Self {
        Self::Execution {
            tool: tool.to_string(),
            status: status.to_string(),
            path: path.into(),
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// A cancelled tool always surfaces as [`Error::Terminated`].
impl From<discmux_av::Error> for Error {
    fn from(err: discmux_av::Error) -> Self {
        match err {
            discmux_av::Error::Cancelled => Self::Terminated,
            other => Self::Tool(other),
        }
    }
}

/// Precondition failures of the disposition planner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("audio track {index} has no channel count")]
    MissingChannelCount { index: usize },
}
