//! Core types shared across discmux crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Kind of elementary stream inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Video,
    Audio,
    Subtitle,
}

impl TrackType {
    /// Map the `type` string reported by `mkvmerge -J`.
    pub fn from_mkvmerge(s: &str) -> Option<Self> {
        match s {
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "subtitles" => Some(Self::Subtitle),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Subtitle => "subtitle",
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticks per second of the Blu-ray presentation clock.
pub const TICKS_PER_SECOND: u64 = 45_000;

/// A point in (or length of) presentation time, stored in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_nanos(ns: u64) -> Self {
        Self(ns)
    }

    /// Convert 45 kHz clock ticks: `ns = ticks * 1_000_000 / 45`.
    pub fn from_ticks(ticks: u64) -> Self {
        Self(ticks * 1_000_000 / 45)
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_nanos(self.0)
    }

    pub fn saturating_sub(self, rhs: Timestamp) -> Timestamp {
        Timestamp(self.0.saturating_sub(rhs.0))
    }
}

impl std::ops::Add for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Timestamp) -> Timestamp {
        Timestamp(self.0 + rhs.0)
    }
}

impl From<Duration> for Timestamp {
    fn from(d: Duration) -> Self {
        Self(d.as_nanos() as u64)
    }
}

/// Renders as `HH:MM:SS.mmm`, the form chapter files use.
impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_ms = self.0 / 1_000_000;
        let ms = total_ms % 1000;
        let total_secs = total_ms / 1000;
        write!(
            f,
            "{:02}:{:02}:{:02}.{:03}",
            total_secs / 3600,
            (total_secs / 60) % 60,
            total_secs % 60,
            ms
        )
    }
}

/// Organize-mode folder chosen by title length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationBucket {
    /// Longer than one hour; stays in the output root.
    Feature,
    /// Longer than ten minutes.
    Medium,
    /// Longer than one minute.
    Small,
    Garbage,
}

impl DurationBucket {
    pub fn for_seconds(secs: u64) -> Self {
        match secs {
            s if s > 3600 => Self::Feature,
            s if s > 600 => Self::Medium,
            s if s > 60 => Self::Small,
            _ => Self::Garbage,
        }
    }

    pub fn for_duration(d: Duration) -> Self {
        // Sub-second remainders count toward the longer bucket.
        let secs = if d.subsec_nanos() > 0 {
            d.as_secs() + 1
        } else {
            d.as_secs()
        };
        Self::for_seconds(secs)
    }

    /// Sub-folder name; empty for the output root.
    pub fn folder(&self) -> &'static str {
        match self {
            Self::Feature => "",
            Self::Medium => "medium",
            Self::Small => "small",
            Self::Garbage => "garbage",
        }
    }
}
