//! Track identification via `mkvmerge -J`.

use crate::command::{Invocation, ToolRunner};
use crate::tools::Tool;
use crate::{Error, Result};
use discmux_common::TrackType;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Root of the `mkvmerge -J` JSON document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Identification {
    #[serde(default)]
    pub file_name: Option<PathBuf>,
    #[serde(default)]
    pub container: Container,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub chapters: Vec<ChapterEdition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub recognized: bool,
    #[serde(default, rename = "type")]
    pub format: Option<String>,
    #[serde(default)]
    pub properties: ContainerProperties,
}

/// Container properties; the `playlist_*` keys appear for `.mpls` input.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerProperties {
    /// Nanoseconds.
    pub duration: Option<u64>,
    #[serde(default)]
    pub playlist_file: Vec<PathBuf>,
    /// Nanoseconds.
    pub playlist_duration: Option<u64>,
    pub playlist_size: Option<u64>,
    pub playlist_chapters: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub codec: String,
    #[serde(default)]
    pub properties: TrackProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackProperties {
    pub language: Option<String>,
    pub audio_channels: Option<u32>,
    pub track_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChapterEdition {
    pub num_entries: u32,
}

impl Identification {
    /// Parse `mkvmerge -J` output.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| Error::Decode {
            tool: Tool::Mkvmerge.name().to_string(),
            source,
        })
    }

    /// Track descriptors for the video, audio and subtitle tracks.
    pub fn descriptors(&self) -> Vec<TrackDescriptor> {
        self.tracks
            .iter()
            .filter_map(|t| {
                Some(TrackDescriptor {
                    index: t.id,
                    kind: TrackType::from_mkvmerge(&t.kind)?,
                    codec: t.codec.clone(),
                    language: t
                        .properties
                        .language
                        .clone()
                        .unwrap_or_else(|| "und".to_string()),
                    channels: t.properties.audio_channels,
                    name: t.properties.track_name.clone(),
                })
            })
            .collect()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.container.properties.duration.map(Duration::from_nanos)
    }

    /// Entry count of the first chapter edition.
    pub fn chapter_count(&self) -> u32 {
        self.chapters.first().map(|c| c.num_entries).unwrap_or(0)
    }

    /// Language of the first audio track, unless undetermined.
    pub fn primary_language(&self) -> Option<String> {
        self.descriptors()
            .into_iter()
            .find(|t| t.kind == TrackType::Audio)
            .map(|t| t.language)
            .filter(|l| l != "und")
    }
}

/// One identified track, as the disposition planner sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDescriptor {
    /// Track id within its container.
    pub index: usize,
    pub kind: TrackType,
    /// Codec name as mkvmerge reports it.
    pub codec: String,
    /// ISO 639-2 code, `und` when unset.
    pub language: String,
    pub channels: Option<u32>,
    pub name: Option<String>,
}

impl TrackDescriptor {
    fn is_audio_codec(&self, names: &[&str]) -> bool {
        self.kind == TrackType::Audio && names.contains(&self.codec.as_str())
    }

    pub fn is_true_hd(&self) -> bool {
        self.is_audio_codec(&["TrueHD", "TrueHD Atmos"])
    }

    pub fn is_dts_hd_ma(&self) -> bool {
        self.is_audio_codec(&["DTS-HD Master Audio"])
    }

    pub fn is_flac(&self) -> bool {
        self.is_audio_codec(&["FLAC"])
    }

    pub fn is_ac3(&self) -> bool {
        self.is_audio_codec(&["AC-3", "E-AC-3"])
    }

    pub fn is_lossless_audio(&self) -> bool {
        self.is_audio_codec(&[
            "FLAC",
            "ALAC",
            "DTS-HD Master Audio",
            "PCM",
            "TrueHD",
            "TrueHD Atmos",
        ])
    }

    /// Plain DTS core reported without its HD extension.
    pub fn is_garbage_dts(&self) -> bool {
        self.is_audio_codec(&["DTS"])
    }
}

/// Source of per-file track identification.
pub trait MediaIdentifier: Send + Sync {
    fn identify(&self, path: &Path) -> Result<Identification>;
}

/// Identifies files by running `mkvmerge -J`.
pub struct MkvmergeIdentifier {
    runner: Arc<dyn ToolRunner>,
    cancel: CancellationToken,
}

impl MkvmergeIdentifier {
    pub fn new(runner: Arc<dyn ToolRunner>, cancel: CancellationToken) -> Self {
        Self { runner, cancel }
    }
}

impl MediaIdentifier for MkvmergeIdentifier {
    fn identify(&self, path: &Path) -> Result<Identification> {
        if !path.exists() {
            return Err(Error::MissingInput(path.to_path_buf()));
        }

        let mut inv = Invocation::new(Tool::Mkvmerge);
        inv.arg("-J").path(path);
        let output = self.runner.run(&inv, &self.cancel)?;
        if !output.exit.is_allowed(&[0, 1]) {
            return Err(Error::Exit {
                tool: Tool::Mkvmerge.name().to_string(),
                status: output.exit.to_string(),
                path: path.to_path_buf(),
            });
        }

        let ident = Identification::from_json(&output.stdout)?;
        if !ident.container.recognized {
            return Err(Error::Unrecognized(path.to_path_buf()));
        }
        Ok(ident)
    }
}
