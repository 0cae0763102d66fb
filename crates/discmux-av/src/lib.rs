//! # discmux-av
//!
//! External media tool plumbing for discmux.
//!
//! This crate provides:
//! - Tool discovery for mkvmerge, ffmpeg, flac and opusenc
//! - A process boundary ([`ToolRunner`]) that captures output and can stop
//!   an in-flight tool when a [`CancellationToken`] fires
//! - Track identification through `mkvmerge -J`
//! - Argument builders for mkvmerge muxing, ffmpeg demuxing and audio encoding
//! - Scoped temporary workspaces and content hashing for dedup
//!
//! ## Example
//!
//! ```no_run
//! use discmux_av::{MediaIdentifier, MkvmergeIdentifier, SystemRunner, ToolPaths};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let runner = Arc::new(SystemRunner::new(ToolPaths::default()));
//! let identifier = MkvmergeIdentifier::new(runner, CancellationToken::new());
//! let ident = identifier.identify("/path/to/video.mkv".as_ref())?;
//! for track in ident.descriptors() {
//!     println!("{} {} {}", track.index, track.codec, track.language);
//! }
//! # Ok::<(), discmux_av::Error>(())
//! ```
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod command;
pub mod encode;
mod error;
pub mod ffmpeg;
pub mod hash;
pub mod identify;
pub mod mkvmerge;
pub mod tools;
pub mod workspace;

// Re-exports
pub use command::{ExitOutcome, Invocation, SystemRunner, ToolOutput, ToolRunner};
pub use encode::{AudioCodec, EncoderBackend, EncoderSettings};
pub use error::{Error, Result};
pub use identify::{Identification, MediaIdentifier, MkvmergeIdentifier, TrackDescriptor};
pub use tools::{check_tool, check_tools, Tool, ToolInfo, ToolPaths};
pub use workspace::Workspace;
