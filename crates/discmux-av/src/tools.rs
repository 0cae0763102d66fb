//! External tool detection and management.

use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// The external programs discmux drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Mkvmerge,
    Ffmpeg,
    Flac,
    Opusenc,
}

impl Tool {
    pub const ALL: [Tool; 4] = [Tool::Mkvmerge, Tool::Ffmpeg, Tool::Flac, Tool::Opusenc];

    /// Executable name looked up on `PATH`.
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Mkvmerge => "mkvmerge",
            Tool::Ffmpeg => "ffmpeg",
            Tool::Flac => "flac",
            Tool::Opusenc => "opusenc",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            Tool::Ffmpeg => "-version",
            _ => "--version",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Explicitly configured tool locations; unset entries fall back to `PATH`.
#[derive(Debug, Clone, Default)]
pub struct ToolPaths {
    pub mkvmerge: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub flac: Option<PathBuf>,
    pub opusenc: Option<PathBuf>,
}

impl ToolPaths {
    pub fn configured(&self, tool: Tool) -> Option<&Path> {
        match tool {
            Tool::Mkvmerge => self.mkvmerge.as_deref(),
            Tool::Ffmpeg => self.ffmpeg.as_deref(),
            Tool::Flac => self.flac.as_deref(),
            Tool::Opusenc => self.opusenc.as_deref(),
        }
    }

    /// Resolve the executable for a tool.
    pub fn resolve(&self, tool: Tool) -> Result<PathBuf> {
        get_tool_path(tool.name(), self.configured(tool))
    }
}

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Check if a tool is available and get its information.
///
/// # Example
///
/// ```no_run
/// use discmux_av::tools::{check_tool, Tool, ToolPaths};
///
/// let info = check_tool(Tool::Mkvmerge, &ToolPaths::default());
/// if info.available {
///     println!("mkvmerge version: {:?}", info.version);
/// }
/// ```
pub fn check_tool(tool: Tool, paths: &ToolPaths) -> ToolInfo {
    let unavailable = ToolInfo {
        name: tool.name().to_string(),
        available: false,
        version: None,
        path: None,
    };

    let Ok(path) = paths.resolve(tool) else {
        return unavailable;
    };

    match Command::new(&path).arg(tool.version_arg()).output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string());

            ToolInfo {
                name: tool.name().to_string(),
                available: true,
                version,
                path: Some(path),
            }
        }
        _ => unavailable,
    }
}

/// Check every tool discmux can drive.
pub fn check_tools(paths: &ToolPaths) -> Vec<ToolInfo> {
    Tool::ALL.iter().map(|t| check_tool(*t, paths)).collect()
}

/// Require that a tool is available, returning its path.
///
/// # Errors
///
/// Returns an error if the tool is not found.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| Error::tool_not_found(name))
}

/// Get the path to a tool, preferring a configured path over PATH lookup.
pub fn get_tool_path(name: &str, config_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = config_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
    }

    require_tool(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_tool_not_found() {
        let err = require_tool("nonexistent_tool_12345").unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { tool } if tool == "nonexistent_tool_12345"));
    }

    #[test]
    fn test_configured_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("mkvmerge-custom");
        std::fs::write(&fake, b"").unwrap();

        let paths = ToolPaths {
            mkvmerge: Some(fake.clone()),
            ..Default::default()
        };
        assert_eq!(paths.resolve(Tool::Mkvmerge).unwrap(), fake);
    }

    #[test]
    fn test_tool_names() {
        assert_eq!(Tool::Opusenc.to_string(), "opusenc");
        assert_eq!(Tool::ALL.len(), 4);
    }
}
