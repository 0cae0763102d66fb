//! discmux-common: shared vocabulary for the discmux crates.
//!
//! - **Track types**: the three elementary stream kinds discmux deals with
//! - **Timestamps**: 45 kHz Blu-ray clock conversion and chapter-style rendering
//! - **Duration buckets**: the organize-mode folder for a title length
//! - **Path utilities**: container detection and file name sanitizing
//!
//! # Examples
//!
//! ```
//! use discmux_common::{DurationBucket, Timestamp, TrackType};
//! use discmux_common::paths::is_container_file;
//! use std::path::Path;
//!
//! let ts = Timestamp::from_ticks(45_000);
//! assert_eq!(ts.to_string(), "00:00:01.000");
//!
//! assert_eq!(TrackType::from_mkvmerge("subtitles"), Some(TrackType::Subtitle));
//! assert_eq!(DurationBucket::for_seconds(90).folder(), "small");
//! assert!(is_container_file(Path::new("00001.m2ts")));
//! ```

pub mod paths;
pub mod types;

pub use types::*;
