//! Disc playlist scanning and duplicate removal.

use crate::error::{Error, Result};
use discmux_av::MediaIdentifier;
use discmux_common::paths::file_stem;
use discmux_common::{Timestamp, TrackType};
use discmux_mpls::Playlist;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Folder of a disc root holding the binary playlists.
pub const PLAYLIST_DIR: &str = "BDMV/PLAYLIST";
/// Folder of a disc root holding the clip streams.
pub const STREAM_DIR: &str = "BDMV/STREAM";

/// Summary of one decoded playlist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistDescriptor {
    pub path: PathBuf,
    /// Clip streams in play order.
    pub clips: Vec<PathBuf>,
    /// Audio and subtitle languages; TrueHD streams appear twice.
    pub languages: Vec<String>,
    pub chapter_count: usize,
    pub duration: Duration,
    /// The raw clip list repeated entries (multi-angle titles).
    pub compressed: bool,
    pub size: u64,
    /// Chapter starts on the playlist timeline.
    #[serde(skip)]
    pub chapters: Vec<Timestamp>,
    /// Chapter starts per clip, relative to the clip's in time.
    #[serde(skip)]
    pub clip_chapters: Vec<Vec<Timestamp>>,
}

impl PlaylistDescriptor {
    /// Build from the raw clip list of a playlist.
    ///
    /// A list with repeated clips is collapsed to its sorted unique clips,
    /// the size is divided by the raw count and the duration is dropped.
    pub fn new(path: impl Into<PathBuf>, raw_clips: Vec<PathBuf>, size: u64, duration: Duration) -> Self {
        let unique: BTreeSet<PathBuf> = raw_clips.iter().cloned().collect();
        let compressed = unique.len() < raw_clips.len();
        let (clips, size, duration) = if compressed {
            let count = raw_clips.len() as u64;
            (unique.into_iter().collect(), size / count, Duration::ZERO)
        } else {
            (raw_clips, size, duration)
        };
        Self {
            path: path.into(),
            clips,
            languages: Vec::new(),
            chapter_count: 0,
            duration,
            compressed,
            size,
            chapters: Vec::new(),
            clip_chapters: Vec::new(),
        }
    }

    /// File stem of the playlist, e.g. `00800`.
    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }

    pub fn is_single_clip(&self) -> bool {
        self.clips.len() == 1
    }

    /// First language that is not `und`.
    pub fn primary_language(&self) -> Option<&str> {
        self.languages
            .iter()
            .map(String::as_str)
            .find(|l| *l != "und")
    }

    /// Equal duration, size, clip list and language list.
    pub fn same_content(&self, other: &Self) -> bool {
        self.duration == other.duration
            && self.size == other.size
            && self.clips == other.clips
            && self.languages == other.languages
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Decodes one playlist file into a [`PlaylistDescriptor`].
pub trait PlaylistDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<PlaylistDescriptor>;
}

/// Decodes the binary playlist directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePlaylistDecoder;

impl PlaylistDecoder for NativePlaylistDecoder {
    fn decode(&self, path: &Path) -> Result<PlaylistDescriptor> {
        let playlist = Playlist::open(path).map_err(|e| Error::playlist(path, e))?;
        if playlist.items.is_empty() {
            return Err(Error::playlist(path, "playlist has no play items"));
        }

        let stream_dir = disc_root_of(path)
            .ok_or_else(|| Error::playlist(path, "not inside a BDMV/PLAYLIST folder"))?
            .join(STREAM_DIR);
        let mut clips = Vec::with_capacity(playlist.items.len());
        let mut size = 0;
        for id in playlist.clip_ids() {
            let clip = stream_dir.join(format!("{}.m2ts", id));
            let meta = std::fs::metadata(&clip)
                .map_err(|e| Error::playlist(path, format!("clip {}: {}", clip.display(), e)))?;
            size += meta.len();
            clips.push(clip);
        }

        let mut descriptor =
            PlaylistDescriptor::new(path, clips, size, playlist.duration().as_duration());
        descriptor.languages = playlist.languages();
        descriptor.chapters = playlist.chapters();
        descriptor.chapter_count = descriptor.chapters.len();
        if !descriptor.compressed {
            descriptor.clip_chapters = playlist.chapters_by_item();
        }
        Ok(descriptor)
    }
}

/// Reads playlist summaries from `mkvmerge -J`.
///
/// Chapter timestamps still come from the binary playlist; when it cannot
/// be decoded the descriptor carries only the chapter count.
pub struct MkvmergePlaylistDecoder {
    identifier: Arc<dyn MediaIdentifier>,
}

impl MkvmergePlaylistDecoder {
    pub fn new(identifier: Arc<dyn MediaIdentifier>) -> Self {
        Self { identifier }
    }
}

impl PlaylistDecoder for MkvmergePlaylistDecoder {
    fn decode(&self, path: &Path) -> Result<PlaylistDescriptor> {
        let ident = self
            .identifier
            .identify(path)
            .map_err(|e| Error::identification(path, e))?;
        let props = &ident.container.properties;
        let (Some(size), Some(duration)) = (props.playlist_size, props.playlist_duration) else {
            return Err(Error::playlist(path, "missing playlist properties"));
        };
        if props.playlist_file.is_empty() {
            return Err(Error::playlist(path, "playlist references no clips"));
        }

        let mut descriptor = PlaylistDescriptor::new(
            path,
            props.playlist_file.clone(),
            size,
            Duration::from_nanos(duration),
        );
        descriptor.languages = ident
            .descriptors()
            .into_iter()
            .filter(|t| t.kind != TrackType::Video)
            .map(|t| t.language)
            .collect();
        descriptor.chapter_count = props.playlist_chapters.unwrap_or(0) as usize;

        match Playlist::open(path) {
            Ok(playlist) => {
                descriptor.chapters = playlist.chapters();
                if !descriptor.compressed {
                    descriptor.clip_chapters = playlist.chapters_by_item();
                }
            }
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "no chapter data"),
        }
        Ok(descriptor)
    }
}

/// Picks the main title of a disc.
pub trait MainTitleOracle: Send + Sync {
    /// Number of the main playlist, e.g. `800` for `00800.mpls`.
    fn main_playlist(&self, disc_root: &Path) -> Result<u32>;
}

/// The longest decodable playlist is the main title; ties go to the larger.
pub struct LongestPlaylistOracle {
    decoder: Arc<dyn PlaylistDecoder>,
}

impl LongestPlaylistOracle {
    pub fn new(decoder: Arc<dyn PlaylistDecoder>) -> Self {
        Self { decoder }
    }
}

impl MainTitleOracle for LongestPlaylistOracle {
    fn main_playlist(&self, disc_root: &Path) -> Result<u32> {
        let mut best: Option<(u32, PlaylistDescriptor)> = None;
        for path in playlist_files(disc_root)? {
            let Ok(number) = file_stem(&path).parse::<u32>() else {
                continue;
            };
            let candidate = match self.decoder.decode(&path) {
                Ok(p) => p,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "skipping playlist");
                    continue;
                }
            };
            let better = match &best {
                None => true,
                Some((_, current)) => {
                    (candidate.duration, candidate.size) > (current.duration, current.size)
                }
            };
            if better {
                best = Some((number, candidate));
            }
        }
        best.map(|(n, _)| n)
            .ok_or_else(|| Error::NoPlaylists(disc_root.join(PLAYLIST_DIR)))
    }
}

/// Scans a disc root's playlists.
pub struct PlaylistCatalog<'a> {
    decoder: &'a dyn PlaylistDecoder,
    oracle: &'a dyn MainTitleOracle,
}

impl<'a> PlaylistCatalog<'a> {
    pub fn new(decoder: &'a dyn PlaylistDecoder, oracle: &'a dyn MainTitleOracle) -> Self {
        Self { decoder, oracle }
    }

    /// Decode the disc's playlists and drop duplicate or subsumed ones.
    ///
    /// With `main_only`, only the oracle's main title is decoded.
    pub fn scan(&self, disc_root: &Path, main_only: bool) -> Result<Vec<PlaylistDescriptor>> {
        tracing::info!(disc = %disc_root.display(), "scanning playlists");

        if main_only {
            let number = self.oracle.main_playlist(disc_root)?;
            let path = disc_root
                .join(PLAYLIST_DIR)
                .join(format!("{:05}.mpls", number));
            tracing::info!(playlist = %path.display(), "main title");
            return Ok(vec![self.decoder.decode(&path)?]);
        }

        let paths = playlist_files(disc_root)?;
        let decoded: Vec<PlaylistDescriptor> = paths
            .iter()
            .filter_map(|path| match self.decoder.decode(path) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "invalid playlist");
                    None
                }
            })
            .collect();

        let catalog = remove_duplicates(decoded);
        tracing::info!(count = catalog.len(), "playlists selected");
        Ok(catalog)
    }
}

/// Sorted `.mpls` files of a disc; an empty or missing folder is an error.
pub fn playlist_files(disc_root: &Path) -> Result<Vec<PathBuf>> {
    let dir = disc_root.join(PLAYLIST_DIR);
    if !dir.is_dir() {
        return Err(Error::NoPlaylists(dir));
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .map(|e| e.eq_ignore_ascii_case("mpls"))
                .unwrap_or(false)
        })
        .collect();
    if paths.is_empty() {
        return Err(Error::NoPlaylists(dir));
    }
    paths.sort();
    Ok(paths)
}

/// Disc root of a playlist path (`<root>/BDMV/PLAYLIST/x.mpls`).
fn disc_root_of(playlist: &Path) -> Option<&Path> {
    playlist.parent()?.parent()?.parent()
}

/// Keep one entry per content; a richer chapter list replaces a kept
/// entry with at most one chapter.
fn collapse_equal(list: Vec<PlaylistDescriptor>) -> Vec<PlaylistDescriptor> {
    let mut result: Vec<PlaylistDescriptor> = Vec::new();
    for current in list {
        match result.iter().position(|kept| kept.same_content(&current)) {
            Some(i) => {
                let kept = &result[i];
                if kept.chapter_count <= 1 && current.chapter_count > kept.chapter_count {
                    tracing::debug!(replaced = %kept.path.display(), by = %current.path.display(), "duplicate playlist");
                    result[i] = current;
                } else {
                    tracing::debug!(path = %current.path.display(), "duplicate playlist");
                }
            }
            None => result.push(current),
        }
    }
    result
}

/// Remove equal playlists, and single-clip playlists fully covered by a
/// multi-clip one. The result is sorted by file name.
pub fn remove_duplicates(all: Vec<PlaylistDescriptor>) -> Vec<PlaylistDescriptor> {
    let (single, multi): (Vec<_>, Vec<_>) = all.into_iter().partition(|p| p.is_single_clip());
    let multi = collapse_equal(multi);
    let mut single = collapse_equal(single);

    for playlist in &multi {
        let covered = playlist
            .clips
            .iter()
            .all(|clip| single.iter().any(|s| &s.clips[0] == clip));
        if covered {
            single.retain(|s| !playlist.clips.contains(&s.clips[0]));
        }
    }

    let mut result = multi;
    result.extend(single);
    result.sort_by_key(|p| p.file_name());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn descriptor(name: &str, clips: &[&str], secs: u64) -> PlaylistDescriptor {
        let clips: Vec<PathBuf> = clips
            .iter()
            .map(|c| PathBuf::from(format!("/d/BDMV/STREAM/{}.m2ts", c)))
            .collect();
        let size = clips.len() as u64 * 1000;
        let mut p = PlaylistDescriptor::new(
            format!("/d/BDMV/PLAYLIST/{}.mpls", name),
            clips,
            size,
            Duration::from_secs(secs),
        );
        p.languages = vec!["jpn".into()];
        p
    }

    fn names(list: &[PlaylistDescriptor]) -> Vec<String> {
        list.iter().map(|p| p.stem()).collect()
    }

    #[test]
    fn test_repeated_clips_are_compressed() {
        let p = PlaylistDescriptor::new(
            "/d/BDMV/PLAYLIST/00010.mpls",
            vec!["/s/2.m2ts".into(), "/s/1.m2ts".into(), "/s/2.m2ts".into()],
            900,
            Duration::from_secs(60),
        );
        assert!(p.compressed);
        assert_eq!(p.clips, vec![PathBuf::from("/s/1.m2ts"), PathBuf::from("/s/2.m2ts")]);
        assert_eq!(p.size, 300);
        assert_eq!(p.duration, Duration::ZERO);
    }

    #[test]
    fn test_primary_language_skips_und() {
        let mut p = descriptor("00001", &["1"], 10);
        p.languages = vec!["und".into(), "eng".into(), "jpn".into()];
        assert_eq!(p.primary_language(), Some("eng"));
        p.languages = vec!["und".into()];
        assert_eq!(p.primary_language(), None);
    }

    #[test]
    fn test_equal_playlists_collapse_to_richer_chapters() {
        let mut a = descriptor("00001", &["1", "2"], 3600);
        a.chapter_count = 1;
        let mut b = descriptor("00002", &["1", "2"], 3600);
        b.chapter_count = 12;
        let mut c = descriptor("00003", &["1", "2"], 3600);
        c.chapter_count = 4;

        let result = remove_duplicates(vec![a, b, c]);
        assert_eq!(names(&result), vec!["00002"]);
    }

    #[test]
    fn test_kept_entry_with_chapters_wins() {
        let mut a = descriptor("00001", &["1", "2"], 3600);
        a.chapter_count = 8;
        let mut b = descriptor("00002", &["1", "2"], 3600);
        b.chapter_count = 12;
        let result = remove_duplicates(vec![a, b]);
        assert_eq!(names(&result), vec!["00001"]);
    }

    #[test]
    fn test_singles_covered_by_multi_clip_playlist_are_dropped() {
        let all = vec![
            descriptor("00005", &["1"], 1300),
            descriptor("00001", &["1", "2", "3"], 4000),
            descriptor("00003", &["2"], 1300),
            descriptor("00004", &["3"], 1400),
            descriptor("00009", &["9"], 90),
        ];
        let result = remove_duplicates(all);
        assert_eq!(names(&result), vec!["00001", "00009"]);
    }

    #[test]
    fn test_partially_covered_singles_are_kept() {
        let all = vec![
            descriptor("00001", &["1", "2"], 2600),
            descriptor("00002", &["1"], 1300),
        ];
        let result = remove_duplicates(all);
        assert_eq!(names(&result), vec!["00001", "00002"]);
    }

    #[test]
    fn test_language_difference_keeps_both() {
        let a = descriptor("00001", &["1"], 1300);
        let mut b = descriptor("00002", &["1"], 1300);
        b.languages = vec!["eng".into()];
        assert_eq!(remove_duplicates(vec![a, b]).len(), 2);
    }

    struct MapDecoder(HashMap<String, PlaylistDescriptor>);

    impl PlaylistDecoder for MapDecoder {
        fn decode(&self, path: &Path) -> Result<PlaylistDescriptor> {
            self.0
                .get(&file_stem(path))
                .cloned()
                .ok_or_else(|| Error::playlist(path, "unreadable"))
        }
    }

    fn disc_with(names: &[&str]) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(PLAYLIST_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        for name in names {
            std::fs::write(dir.join(name), b"").unwrap();
        }
        root
    }

    #[test]
    fn test_scan_skips_undecodable_playlists() {
        let root = disc_with(&["00001.mpls", "00002.mpls", "00003.MPLS", "notes.txt"]);
        let decoder = MapDecoder(HashMap::from([
            ("00001".to_string(), descriptor("00001", &["1", "2"], 4000)),
            ("00003".to_string(), descriptor("00003", &["7"], 300)),
        ]));
        let oracle = LongestPlaylistOracle::new(Arc::new(MapDecoder(HashMap::new())));

        let result = PlaylistCatalog::new(&decoder, &oracle)
            .scan(root.path(), false)
            .unwrap();
        assert_eq!(names(&result), vec!["00001", "00003"]);
    }

    #[test]
    fn test_scan_without_playlists_fails() {
        let root = disc_with(&["index.bdmv"]);
        let decoder = MapDecoder(HashMap::new());
        let oracle = LongestPlaylistOracle::new(Arc::new(MapDecoder(HashMap::new())));
        let err = PlaylistCatalog::new(&decoder, &oracle)
            .scan(root.path(), false)
            .unwrap_err();
        assert!(matches!(err, Error::NoPlaylists(_)));

        let empty = tempfile::tempdir().unwrap();
        let err = PlaylistCatalog::new(&decoder, &oracle)
            .scan(empty.path(), false)
            .unwrap_err();
        assert!(matches!(err, Error::NoPlaylists(_)));
    }

    #[test]
    fn test_main_only_uses_longest_playlist() {
        let root = disc_with(&["00001.mpls", "00800.mpls", "00801.mpls"]);
        let mut big = descriptor("00801", &["5", "6"], 7000);
        big.size = 9000;
        let map = HashMap::from([
            ("00001".to_string(), descriptor("00001", &["1"], 120)),
            ("00800".to_string(), descriptor("00800", &["5", "6"], 7000)),
            ("00801".to_string(), big),
        ]);
        let decoder = Arc::new(MapDecoder(map.clone()));
        let oracle = LongestPlaylistOracle::new(decoder.clone());
        assert_eq!(oracle.main_playlist(root.path()).unwrap(), 801);

        let result = PlaylistCatalog::new(decoder.as_ref(), &oracle)
            .scan(root.path(), true)
            .unwrap();
        assert_eq!(names(&result), vec!["00801"]);
    }
}
