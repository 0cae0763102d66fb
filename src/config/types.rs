use discmux_av::{AudioCodec, EncoderBackend, EncoderSettings, ToolPaths};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Language code every preference set implicitly contains.
pub const UNDETERMINED: &str = "und";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Root directory for finished output
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Parent for per-run temporary directories (system temp dir if unset)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    #[serde(default)]
    pub mode: Mode,

    /// Chapter counts per output when splitting a title by chapters
    #[serde(default)]
    pub splits: Option<Vec<u32>>,

    /// Only remux the disc's main title
    #[serde(default)]
    pub main_title_only: bool,

    #[serde(default)]
    pub language: LanguageConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            temp_dir: None,
            mode: Mode::default(),
            splits: None,
            main_title_only: false,
            language: LanguageConfig::default(),
            audio: AudioConfig::default(),
            output: OutputConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// How an input is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Disc: one output per playlist, clips joined
    #[default]
    Movie,
    /// Disc: one output per clip
    Episodes,
    /// A single container file
    File,
    /// A tree of container files
    Directory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LanguageConfig {
    #[serde(default = "default_preferred_languages")]
    pub preferred: Vec<String>,

    #[serde(default)]
    pub excluded: Vec<String>,
}

fn default_preferred_languages() -> Vec<String> {
    vec!["und".to_string(), "chi".to_string(), "jpn".to_string()]
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            preferred: default_preferred_languages(),
            excluded: Vec::new(),
        }
    }
}

impl LanguageConfig {
    /// Preferred languages plus the source's own primary language, minus
    /// exclusions. `und` is always kept.
    pub fn effective(&self, primary: Option<&str>) -> BTreeSet<String> {
        let mut set: BTreeSet<String> = self.preferred.iter().cloned().collect();
        if let Some(lang) = primary {
            set.insert(lang.to_string());
        }
        for excluded in &self.excluded {
            set.remove(excluded);
        }
        set.insert(UNDETERMINED.to_string());
        set
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// Transcode lossless tracks; when false every kept track is copied
    #[serde(default = "default_true")]
    pub encode: bool,

    #[serde(default)]
    pub codec: AudioCodec,

    #[serde(default)]
    pub encoder: EncoderBackend,

    /// kbps per channel for lossy codecs
    #[serde(default = "default_bitrate_per_channel")]
    pub bitrate_per_channel: u32,

    #[serde(default)]
    pub reduce_bitrate: bool,

    /// Add a stereo track next to each transcoded multichannel track
    #[serde(default)]
    pub downmix: bool,

    #[serde(default)]
    pub keep_true_hd: bool,

    #[serde(default)]
    pub keep_flac: bool,

    /// Re-encode core-only DTS tracks
    #[serde(default)]
    pub fix_dts: bool,

    /// Drop DTS-HD MA tracks that duplicate an adjacent TrueHD track
    #[serde(default)]
    pub remove_extra_dts: bool,
}

fn default_true() -> bool {
    true
}

fn default_bitrate_per_channel() -> u32 {
    128
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            encode: true,
            codec: AudioCodec::default(),
            encoder: EncoderBackend::default(),
            bitrate_per_channel: default_bitrate_per_channel(),
            reduce_bitrate: false,
            downmix: false,
            keep_true_hd: false,
            keep_flac: false,
            fix_dts: false,
            remove_extra_dts: false,
        }
    }
}

impl AudioConfig {
    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            codec: self.codec,
            backend: self.encoder,
            bitrate_per_channel: self.bitrate_per_channel,
            reduce_bitrate: self.reduce_bitrate,
        }
    }
}

/// Where playlist summaries come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistBackend {
    /// Decode the binary playlist directly
    #[default]
    Native,
    /// Ask `mkvmerge -J`
    Mkvmerge,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Sort disc outputs into duration folders
    #[serde(default)]
    pub organize: bool,

    /// Accept mkvmerge warnings (exit code 1) as success
    #[serde(default)]
    pub ignore_warning: bool,

    #[serde(default)]
    pub keep_track_name: bool,

    #[serde(default)]
    pub keep_video_language: bool,

    /// Delete each source once it has been remuxed
    #[serde(default)]
    pub delete_after_remux: bool,

    /// In directory mode, copy files that are not containers
    #[serde(default)]
    pub copy_directory_files: bool,

    #[serde(default)]
    pub playlist_backend: PlaylistBackend,
}

impl OutputConfig {
    pub fn allowed_exit_codes(&self) -> &'static [i32] {
        if self.ignore_warning {
            &[0, 1]
        } else {
            &[0]
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub mkvmerge_path: Option<PathBuf>,

    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub flac_path: Option<PathBuf>,

    #[serde(default)]
    pub opusenc_path: Option<PathBuf>,
}

impl ToolsConfig {
    pub fn paths(&self) -> ToolPaths {
        ToolPaths {
            mkvmerge: self.mkvmerge_path.clone(),
            ffmpeg: self.ffmpeg_path.clone(),
            flac: self.flac_path.clone(),
            opusenc: self.opusenc_path.clone(),
        }
    }
}
