//! Shared test harness for integration tests.
//!
//! Provides [`Harness`], which wires an [`Orchestrator`] to fake external
//! tools. [`FakeTools`] plays mkvmerge, ffmpeg and the audio encoders: it
//! writes the files a real run would produce and answers with scripted exit
//! codes. [`FakeIdentifier`] and [`FakeDecoder`] stand in for `mkvmerge -J`
//! and playlist decoding.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use discmux::catalog::{MainTitleOracle, PlaylistDecoder, PlaylistDescriptor, PLAYLIST_DIR, STREAM_DIR};
use discmux::config::{Config, Mode};
use discmux::Orchestrator;
use discmux_av::{ExitOutcome, Identification, Invocation, MediaIdentifier, Tool, ToolOutput, ToolRunner};
use discmux_common::Timestamp;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Bytes every fake mkvmerge output holds.
pub const MUX_OUTPUT: &[u8] = b"matroska";

/// Scripted stand-in for every external tool.
#[derive(Default)]
pub struct FakeTools {
    /// mkvmerge exit code keyed by output file name (default 0).
    pub mkvmerge_exits: Mutex<HashMap<String, i32>>,
    /// Demuxed audio content keyed by source track id.
    pub demux_content: Mutex<HashMap<usize, String>>,
    /// Cancel this token when mkvmerge is asked to write this file name.
    pub cancel_on: Mutex<Option<(String, CancellationToken)>>,
    pub calls: Mutex<Vec<Invocation>>,
}

impl FakeTools {
    pub fn exit(&self, output_name: &str, code: i32) {
        self.mkvmerge_exits.lock().insert(output_name.to_string(), code);
    }

    pub fn calls_to(&self, tool: Tool) -> Vec<Invocation> {
        self.calls
            .lock()
            .iter()
            .filter(|inv| inv.tool() == tool)
            .cloned()
            .collect()
    }

    /// File names mkvmerge was asked to write, in call order.
    pub fn mkvmerge_outputs(&self) -> Vec<String> {
        self.calls_to(Tool::Mkvmerge)
            .iter()
            .filter_map(|inv| output_of(inv))
            .map(|p| file_name(&p))
            .collect()
    }

    fn mkvmerge(&self, inv: &Invocation) -> discmux_av::Result<ToolOutput> {
        let args = inv.arguments();
        let out = output_of(inv).expect("mkvmerge without -o");
        let name = file_name(&out);

        if let Some((target, token)) = self.cancel_on.lock().as_ref() {
            if *target == name {
                token.cancel();
                return Err(discmux_av::Error::Cancelled);
            }
        }

        let code = self.mkvmerge_exits.lock().get(&name).copied().unwrap_or(0);
        if code <= 1 {
            if args.iter().any(|a| a == "--split") {
                let stem = out.file_stem().unwrap().to_string_lossy().into_owned();
                for n in 1..=2 {
                    std::fs::write(out.with_file_name(format!("{}-{:03}.mkv", stem, n)), MUX_OUTPUT).unwrap();
                }
            } else {
                std::fs::write(&out, MUX_OUTPUT).unwrap();
            }
        }
        Ok(exited(code))
    }

    fn ffmpeg(&self, inv: &Invocation) -> discmux_av::Result<ToolOutput> {
        let args = inv.arguments();
        let mut i = 0;
        while i < args.len() {
            if args[i] != "-map" {
                i += 1;
                continue;
            }
            match args[i + 1][2..].parse::<usize>() {
                Ok(track) => {
                    let mut out = i + 2;
                    let mut content = self
                        .demux_content
                        .lock()
                        .get(&track)
                        .cloned()
                        .unwrap_or_else(|| format!("track {}", track));
                    if args[out] == "-ac" {
                        out += 2;
                        content.push_str(" downmix");
                    }
                    std::fs::write(&args[out], content).unwrap();
                    i = out + 1;
                }
                Err(_) => {
                    // stream copy: output comes last
                    std::fs::write(args.last().unwrap(), MUX_OUTPUT).unwrap();
                    break;
                }
            }
        }
        Ok(exited(0))
    }
}

impl ToolRunner for FakeTools {
    fn run(&self, inv: &Invocation, cancel: &CancellationToken) -> discmux_av::Result<ToolOutput> {
        if cancel.is_cancelled() {
            return Err(discmux_av::Error::Cancelled);
        }
        self.calls.lock().push(inv.clone());
        match inv.tool() {
            Tool::Mkvmerge => self.mkvmerge(inv),
            Tool::Ffmpeg => self.ffmpeg(inv),
            Tool::Flac | Tool::Opusenc => {
                let out = output_of(inv).unwrap_or_else(|| PathBuf::from(inv.arguments().last().unwrap()));
                std::fs::write(out, b"encoded").unwrap();
                Ok(exited(0))
            }
        }
    }
}

fn exited(code: i32) -> ToolOutput {
    ToolOutput {
        exit: ExitOutcome::Code(code),
        stdout: String::new(),
        stderr: String::new(),
    }
}

fn output_of(inv: &Invocation) -> Option<PathBuf> {
    let args = inv.arguments();
    let pos = args.iter().position(|a| a == "-o")?;
    args.get(pos + 1).map(PathBuf::from)
}

pub fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

/// Answers identification requests from a table keyed by file name, with
/// [`FakeIdentifier::default_ident`] for everything else.
#[derive(Default)]
pub struct FakeIdentifier {
    pub by_name: Mutex<HashMap<String, Identification>>,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl FakeIdentifier {
    pub fn set(&self, name: &str, ident: Identification) {
        self.by_name.lock().insert(name.to_string(), ident);
    }

    /// Video, a lossless Japanese stereo track and an English subtitle.
    pub fn default_ident() -> Identification {
        ident(
            7200,
            0,
            &[
                ("video", "AVC/H.264/MPEG-4p10", "eng", None),
                ("audio", "FLAC", "jpn", Some(2)),
                ("subtitles", "HDMV PGS", "eng", None),
            ],
        )
    }
}

impl MediaIdentifier for FakeIdentifier {
    fn identify(&self, path: &Path) -> discmux_av::Result<Identification> {
        self.calls.lock().push(path.to_path_buf());
        Ok(self
            .by_name
            .lock()
            .get(&file_name(path))
            .cloned()
            .unwrap_or_else(Self::default_ident))
    }
}

/// Build an identification: `(type, codec, language, channels)` per track.
pub fn ident(seconds: u64, chapters: u32, tracks: &[(&str, &str, &str, Option<u32>)]) -> Identification {
    let tracks: Vec<serde_json::Value> = tracks
        .iter()
        .enumerate()
        .map(|(id, (kind, codec, lang, channels))| {
            serde_json::json!({
                "id": id,
                "type": kind,
                "codec": codec,
                "properties": { "language": lang, "audio_channels": channels },
            })
        })
        .collect();
    let chapters: Vec<serde_json::Value> = if chapters > 0 {
        vec![serde_json::json!({ "num_entries": chapters })]
    } else {
        Vec::new()
    };
    let json = serde_json::json!({
        "container": { "recognized": true, "properties": { "duration": seconds * 1_000_000_000 } },
        "tracks": tracks,
        "chapters": chapters,
    });
    Identification::from_json(&json.to_string()).unwrap()
}

/// Playlist table keyed by `.mpls` file name.
#[derive(Default)]
pub struct FakeDecoder {
    pub playlists: Mutex<HashMap<String, PlaylistDescriptor>>,
}

impl PlaylistDecoder for FakeDecoder {
    fn decode(&self, path: &Path) -> discmux::Result<PlaylistDescriptor> {
        self.playlists
            .lock()
            .get(&file_name(path))
            .cloned()
            .ok_or_else(|| discmux::Error::playlist(path, "unknown playlist"))
    }
}

pub struct FixedOracle(pub u32);

impl MainTitleOracle for FixedOracle {
    fn main_playlist(&self, _disc_root: &Path) -> discmux::Result<u32> {
        Ok(self.0)
    }
}

/// A scratch tree with input, output and temp folders plus the fakes.
pub struct Harness {
    pub dir: TempDir,
    pub config: Config,
    pub tools: Arc<FakeTools>,
    pub identifier: Arc<FakeIdentifier>,
    pub decoder: Arc<FakeDecoder>,
    pub main_title: u32,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new(mode: Mode) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("in")).unwrap();
        std::fs::create_dir_all(dir.path().join("out")).unwrap();
        std::fs::create_dir_all(dir.path().join("tmp")).unwrap();

        let mut config = Config::default();
        config.mode = mode;
        config.output_dir = dir.path().join("out");
        config.temp_dir = Some(dir.path().join("tmp"));

        Self {
            dir,
            config,
            tools: Arc::new(FakeTools::default()),
            identifier: Arc::new(FakeIdentifier::default()),
            decoder: Arc::new(FakeDecoder::default()),
            main_title: 0,
            cancel: CancellationToken::new(),
        }
    }

    pub fn input(&self, rel: &str) -> PathBuf {
        self.dir.path().join("in").join(rel)
    }

    pub fn output(&self, rel: &str) -> PathBuf {
        self.dir.path().join("out").join(rel)
    }

    pub fn temp_root(&self) -> PathBuf {
        self.dir.path().join("tmp")
    }

    /// Create a file under the input folder.
    pub fn write_input(&self, rel: &str, content: &[u8]) -> PathBuf {
        let path = self.input(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Create a disc under `in/{name}` with one playlist file and clip per
    /// entry, and register the playlists with the decoder.
    ///
    /// Each playlist is `(number, clips, languages, chapter count)`.
    pub fn disc(&self, name: &str, playlists: &[(u32, &[&str], &[&str], usize)]) -> PathBuf {
        let root = self.input(name);
        std::fs::create_dir_all(root.join(PLAYLIST_DIR)).unwrap();
        std::fs::create_dir_all(root.join(STREAM_DIR)).unwrap();

        for (number, clips, languages, chapters) in playlists {
            let mpls = root.join(PLAYLIST_DIR).join(format!("{:05}.mpls", number));
            std::fs::write(&mpls, b"MPLS0200").unwrap();
            let clips: Vec<PathBuf> = clips
                .iter()
                .map(|c| {
                    let clip = root.join(STREAM_DIR).join(format!("{}.m2ts", c));
                    std::fs::write(&clip, b"m2ts").unwrap();
                    clip
                })
                .collect();

            let count = clips.len();
            let mut descriptor = PlaylistDescriptor::new(
                &mpls,
                clips,
                4 * count as u64,
                Duration::from_secs(1800 * count as u64),
            );
            descriptor.languages = languages.iter().map(|l| l.to_string()).collect();
            descriptor.chapter_count = *chapters;
            descriptor.chapters = (0..*chapters as u64)
                .map(|n| Timestamp::from_ticks(n * 45_000 * 300))
                .collect();
            self.decoder
                .playlists
                .lock()
                .insert(file_name(&mpls), descriptor);
        }
        root
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            Arc::new(self.config.clone()),
            self.tools.clone(),
            self.identifier.clone(),
            self.decoder.clone(),
            Arc::new(FixedOracle(self.main_title)),
            self.cancel.clone(),
        )
    }

    /// Files left under the temp root (workspaces must be cleaned up).
    pub fn temp_leftovers(&self) -> Vec<PathBuf> {
        walkdir::WalkDir::new(self.temp_root())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()
    }
}
