//! Playlist decoding: header, play items and the mark table.

use crate::reader::ByteReader;
use crate::stream::{StreamCodec, StreamTable};
use crate::{Error, Result};
use discmux_common::Timestamp;
use std::path::Path;

const MAGIC: &[u8; 4] = b"MPLS";
const VERSIONS: &[&str] = &["0100", "0200", "0300"];

/// Mark type of a chapter entry point.
const ENTRY_MARK: u8 = 1;

/// A decoded `.mpls` playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Playlist {
    pub version: String,
    pub items: Vec<PlayItem>,
    pub marks: Vec<Mark>,
}

/// One segment of the playlist referencing a clip.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct PlayItem {
    /// Five-digit clip name, e.g. `00055`.
    pub clip_id: String,
    pub connection_condition: u8,
    pub stc_id: u8,
    /// In time on the 45 kHz clock.
    pub in_time: u32,
    pub out_time: u32,
    /// Start of this item on the playlist timeline, in ticks.
    pub relative_in: u64,
    /// Clip ids of angles beyond the first.
    pub extra_angles: Vec<String>,
    pub streams: StreamTable,
}

impl PlayItem {
    pub fn duration_ticks(&self) -> u64 {
        u64::from(self.out_time.saturating_sub(self.in_time))
    }

    pub fn duration(&self) -> Timestamp {
        Timestamp::from_ticks(self.duration_ticks())
    }
}

/// A playlist mark; entry marks are chapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Mark {
    pub mark_type: u8,
    pub play_item: u16,
    /// Absolute time on the referenced item's clip, in ticks.
    pub timestamp: u32,
    pub entry_pid: u16,
    pub duration: u32,
}

impl Playlist {
    /// Read and decode a playlist file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::parse(&data)
    }

    /// Decode playlist bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(data);

        let magic = r.bytes(4)?;
        if magic != MAGIC {
            let mut found = [0u8; 4];
            found.copy_from_slice(magic);
            return Err(Error::InvalidMagic(found));
        }
        let version = r.string(4)?;
        if !VERSIONS.contains(&version.as_str()) {
            return Err(Error::UnsupportedVersion(version));
        }

        let playlist_start = r.u32()? as usize;
        let mark_start = r.u32()? as usize;
        r.skip(4)?; // extension data start

        r.seek(playlist_start)?;
        r.skip(4)?; // length
        r.skip(2)?;
        let item_count = r.u16()?;
        r.skip(2)?; // sub path count; sub paths are not needed

        let mut items = Vec::with_capacity(item_count as usize);
        let mut relative_in = 0u64;
        for _ in 0..item_count {
            let item = parse_play_item(&mut r, relative_in)?;
            relative_in += item.duration_ticks();
            items.push(item);
        }

        r.seek(mark_start)?;
        r.skip(4)?; // length
        let mark_count = r.u16()?;
        let mut marks = Vec::with_capacity(mark_count as usize);
        for _ in 0..mark_count {
            r.skip(1)?;
            let mark = Mark {
                mark_type: r.u8()?,
                play_item: r.u16()?,
                timestamp: r.u32()?,
                entry_pid: r.u16()?,
                duration: r.u32()?,
            };
            if mark.play_item as usize >= items.len() {
                return Err(Error::invalid(format!(
                    "mark references play item {} of {}",
                    mark.play_item,
                    items.len()
                )));
            }
            marks.push(mark);
        }

        Ok(Self {
            version,
            items,
            marks,
        })
    }

    /// Clip ids in play order, duplicates included.
    pub fn clip_ids(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.clip_id.as_str()).collect()
    }

    /// Total presentation length.
    pub fn duration(&self) -> Timestamp {
        Timestamp::from_ticks(self.items.iter().map(PlayItem::duration_ticks).sum())
    }

    /// Chapter starts on the playlist timeline.
    pub fn chapters(&self) -> Vec<Timestamp> {
        self.entry_marks()
            .map(|m| {
                let item = &self.items[m.play_item as usize];
                let offset = u64::from(m.timestamp.saturating_sub(item.in_time));
                Timestamp::from_ticks(item.relative_in + offset)
            })
            .collect()
    }

    /// Chapter starts of each play item, relative to the item's in time.
    ///
    /// Items without entry marks get an empty list.
    pub fn chapters_by_item(&self) -> Vec<Vec<Timestamp>> {
        let mut by_item = vec![Vec::new(); self.items.len()];
        for mark in self.entry_marks() {
            let item = &self.items[mark.play_item as usize];
            by_item[mark.play_item as usize].push(Timestamp::from_ticks(u64::from(
                mark.timestamp.saturating_sub(item.in_time),
            )));
        }
        by_item
    }

    /// Stream languages of the first play item.
    ///
    /// Audio languages come first. A TrueHD stream is listed twice, once
    /// for itself and once for its embedded AC-3 core, matching how
    /// demuxers expose it. Subtitle languages follow.
    pub fn languages(&self) -> Vec<String> {
        let Some(first) = self.items.first() else {
            return Vec::new();
        };
        let mut langs = Vec::new();
        for stream in &first.streams.audio {
            if let Some(lang) = &stream.language {
                langs.push(lang.clone());
                if stream.codec == StreamCodec::TrueHd {
                    langs.push(lang.clone());
                }
            }
        }
        langs.extend(
            first
                .streams
                .subtitles
                .iter()
                .filter_map(|s| s.language.clone()),
        );
        langs
    }

    fn entry_marks(&self) -> impl Iterator<Item = &Mark> {
        self.marks.iter().filter(|m| m.mark_type == ENTRY_MARK)
    }
}

fn parse_play_item(r: &mut ByteReader<'_>, relative_in: u64) -> Result<PlayItem> {
    let length = r.u16()? as usize;
    let start = r.position();

    let clip_id = r.string(5)?;
    let codec_id = r.bytes(4)?;
    if codec_id != b"M2TS" {
        return Err(Error::invalid(format!(
            "play item {} has codec id {:?}",
            clip_id,
            String::from_utf8_lossy(codec_id)
        )));
    }
    let flags = r.u16()?;
    let is_multi_angle = flags & 0x0010 != 0;
    let connection_condition = (flags & 0x000f) as u8;
    let stc_id = r.u8()?;
    let in_time = r.u32()?;
    let out_time = r.u32()?;
    r.skip(8)?; // user operation mask
    r.skip(1)?; // random access flag
    r.skip(1)?; // still mode
    r.skip(2)?; // still time

    let mut extra_angles = Vec::new();
    if is_multi_angle {
        let angle_count = r.u8()?;
        r.skip(1)?;
        for _ in 1..angle_count {
            extra_angles.push(r.string(5)?);
            r.skip(4)?; // codec id
            r.skip(1)?; // stc id
        }
    }

    let streams = StreamTable::parse(r)?;
    r.seek(start + length)?;

    Ok(PlayItem {
        clip_id,
        connection_condition,
        stc_id,
        in_time,
        out_time,
        relative_in,
        extra_angles,
        streams,
    })
}

#[cfg(test)]
pub(crate) mod testdata {
    //! Synthetic playlist writer for parser tests.

    pub struct ItemSpec {
        pub clip: &'static str,
        pub in_time: u32,
        pub out_time: u32,
        /// (coding type, language) per audio stream.
        pub audio: Vec<(u8, &'static str)>,
        pub subtitles: Vec<&'static str>,
    }

    pub fn item(clip: &'static str, in_time: u32, out_time: u32) -> ItemSpec {
        ItemSpec {
            clip,
            in_time,
            out_time,
            audio: Vec::new(),
            subtitles: Vec::new(),
        }
    }

    /// Build playlist bytes; marks are (play item, absolute ticks).
    pub fn build(items: &[ItemSpec], marks: &[(u16, u32)]) -> Vec<u8> {
        let mut playlist = Vec::new();
        playlist.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        playlist.extend_from_slice(&(items.len() as u16).to_be_bytes());
        playlist.extend_from_slice(&0u16.to_be_bytes());
        for spec in items {
            let body = item_body(spec);
            playlist.extend_from_slice(&(body.len() as u16).to_be_bytes());
            playlist.extend_from_slice(&body);
        }

        let mut mark_section = vec![0, 0, 0, 0];
        mark_section.extend_from_slice(&(marks.len() as u16).to_be_bytes());
        for &(item, ts) in marks {
            mark_section.push(0);
            mark_section.push(1);
            mark_section.extend_from_slice(&item.to_be_bytes());
            mark_section.extend_from_slice(&ts.to_be_bytes());
            mark_section.extend_from_slice(&0xffffu16.to_be_bytes());
            mark_section.extend_from_slice(&0u32.to_be_bytes());
        }

        let playlist_start = 20u32;
        let mark_start = playlist_start + playlist.len() as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"MPLS0200");
        out.extend_from_slice(&playlist_start.to_be_bytes());
        out.extend_from_slice(&mark_start.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&playlist);
        out.extend_from_slice(&mark_section);
        out
    }

    fn item_body(spec: &ItemSpec) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(spec.clip.as_bytes());
        b.extend_from_slice(b"M2TS");
        b.extend_from_slice(&0x0001u16.to_be_bytes());
        b.push(0);
        b.extend_from_slice(&spec.in_time.to_be_bytes());
        b.extend_from_slice(&spec.out_time.to_be_bytes());
        b.extend_from_slice(&[0; 8]);
        b.extend_from_slice(&[0, 0, 0, 0]);

        b.extend_from_slice(&[0, 0, 0, 0]);
        b.push(1);
        b.push(spec.audio.len() as u8);
        b.push(spec.subtitles.len() as u8);
        b.extend_from_slice(&[0; 4]);
        b.extend_from_slice(&[0; 5]);
        // video: HEVC
        b.extend_from_slice(&[9, 1, 0x10, 0x11, 0, 0, 0, 0, 0, 0]);
        b.extend_from_slice(&[5, 0x24, 0x61, 0, 0, 0]);
        for (codec, lang) in &spec.audio {
            b.extend_from_slice(&[9, 1, 0x11, 0x00, 0, 0, 0, 0, 0, 0]);
            b.extend_from_slice(&[5, *codec, 0x61]);
            b.extend_from_slice(lang.as_bytes());
        }
        for lang in &spec.subtitles {
            b.extend_from_slice(&[9, 1, 0x12, 0x00, 0, 0, 0, 0, 0, 0]);
            b.extend_from_slice(&[5, 0x90]);
            b.extend_from_slice(lang.as_bytes());
            b.push(0);
        }
        b
    }
}

#[cfg(test)]
mod tests {
    use super::testdata::{build, item};
    use super::*;

    const SECOND: u32 = 45_000;

    #[test]
    fn test_rejects_bad_magic() {
        let err = Playlist::parse(b"HDMV0200\0\0\0\0").unwrap_err();
        assert!(matches!(err, Error::InvalidMagic(m) if &m == b"HDMV"));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = Playlist::parse(b"MPLS0400\0\0\0\0").unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(v) if v == "0400"));
    }

    #[test]
    fn test_truncated_data_is_an_error() {
        let data = build(&[item("00001", 0, SECOND)], &[]);
        let err = Playlist::parse(&data[..30]).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof { .. }));
    }

    #[test]
    fn test_parses_items_and_duration() {
        let data = build(
            &[
                item("00001", SECOND, 11 * SECOND),
                item("00002", 0, 5 * SECOND),
            ],
            &[],
        );
        let playlist = Playlist::parse(&data).unwrap();
        assert_eq!(playlist.version, "0200");
        assert_eq!(playlist.clip_ids(), vec!["00001", "00002"]);
        assert_eq!(playlist.items[0].connection_condition, 1);
        assert_eq!(playlist.items[1].relative_in, 10 * SECOND as u64);
        assert_eq!(playlist.duration().as_duration().as_secs(), 15);
    }

    #[test]
    fn test_chapters_rebased_to_playlist_timeline() {
        let data = build(
            &[
                item("00001", SECOND, 11 * SECOND),
                item("00002", 100 * SECOND, 200 * SECOND),
            ],
            &[(0, SECOND), (0, 6 * SECOND), (1, 100 * SECOND), (1, 130 * SECOND)],
        );
        let playlist = Playlist::parse(&data).unwrap();

        let secs: Vec<u64> = playlist
            .chapters()
            .iter()
            .map(|t| t.as_duration().as_secs())
            .collect();
        assert_eq!(secs, vec![0, 5, 10, 40]);

        let by_item: Vec<Vec<u64>> = playlist
            .chapters_by_item()
            .iter()
            .map(|c| c.iter().map(|t| t.as_duration().as_secs()).collect())
            .collect();
        assert_eq!(by_item, vec![vec![0, 5], vec![0, 30]]);
    }

    #[test]
    fn test_mark_with_bad_item_index() {
        let data = build(&[item("00001", 0, SECOND)], &[(3, 0)]);
        assert!(matches!(Playlist::parse(&data), Err(Error::Invalid(_))));
    }

    #[test]
    fn test_languages_double_truehd() {
        let mut spec = item("00001", 0, SECOND);
        spec.audio = vec![(0x83, "jpn"), (0x81, "eng")];
        spec.subtitles = vec!["zho"];
        let playlist = Playlist::parse(&build(&[spec], &[])).unwrap();
        assert_eq!(playlist.languages(), vec!["jpn", "jpn", "eng", "chi"]);
        assert_eq!(playlist.items[0].streams.video.len(), 1);
    }
}
