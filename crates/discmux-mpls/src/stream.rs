//! Elementary stream entries from a play item's stream number table.

use crate::reader::ByteReader;
use crate::{Error, Result};

/// Coding type byte of a Blu-ray elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum StreamCodec {
    Mpeg1Video,
    Mpeg2Video,
    Avc,
    Mvc,
    Hevc,
    Vc1,
    Mpeg1Audio,
    Mpeg2Audio,
    Lpcm,
    Ac3,
    Dts,
    TrueHd,
    Eac3,
    DtsHdHighRes,
    DtsHdMaster,
    Eac3Secondary,
    DtsHdSecondary,
    PresentationGraphics,
    InteractiveGraphics,
    TextSubtitle,
}

impl StreamCodec {
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0x01 => Self::Mpeg1Video,
            0x02 => Self::Mpeg2Video,
            0x1b => Self::Avc,
            0x20 => Self::Mvc,
            0x24 => Self::Hevc,
            0xea => Self::Vc1,
            0x03 => Self::Mpeg1Audio,
            0x04 => Self::Mpeg2Audio,
            0x80 => Self::Lpcm,
            0x81 => Self::Ac3,
            0x82 => Self::Dts,
            0x83 => Self::TrueHd,
            0x84 => Self::Eac3,
            0x85 => Self::DtsHdHighRes,
            0x86 => Self::DtsHdMaster,
            0xa1 => Self::Eac3Secondary,
            0xa2 => Self::DtsHdSecondary,
            0x90 => Self::PresentationGraphics,
            0x91 => Self::InteractiveGraphics,
            0x92 => Self::TextSubtitle,
            other => return Err(Error::UnknownCodec(other)),
        })
    }

    pub fn is_video(&self) -> bool {
        matches!(
            self,
            Self::Mpeg1Video | Self::Mpeg2Video | Self::Avc | Self::Mvc | Self::Hevc | Self::Vc1
        )
    }

    pub fn is_audio(&self) -> bool {
        matches!(
            self,
            Self::Mpeg1Audio
                | Self::Mpeg2Audio
                | Self::Lpcm
                | Self::Ac3
                | Self::Dts
                | Self::TrueHd
                | Self::Eac3
                | Self::DtsHdHighRes
                | Self::DtsHdMaster
                | Self::Eac3Secondary
                | Self::DtsHdSecondary
        )
    }

    pub fn is_graphics(&self) -> bool {
        matches!(self, Self::PresentationGraphics | Self::InteractiveGraphics)
    }
}

/// One stream entry with its decoded attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Stream {
    pub codec: StreamCodec,
    pub pid: u16,
    /// Normalized ISO 639-2/B code; `None` for video.
    pub language: Option<String>,
}

/// Streams of one play item, grouped the way the STN table lists them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct StreamTable {
    pub video: Vec<Stream>,
    pub audio: Vec<Stream>,
    pub subtitles: Vec<Stream>,
}

impl StreamTable {
    pub(crate) fn parse(r: &mut ByteReader<'_>) -> Result<Self> {
        r.skip(2)?; // length
        r.skip(2)?;
        let video_count = r.u8()?;
        let audio_count = r.u8()?;
        let pg_count = r.u8()?;
        r.skip(4)?; // ig, secondary audio, secondary video, pip pg
        r.skip(5)?;

        let mut table = StreamTable::default();
        for _ in 0..video_count {
            table.video.push(parse_stream(r)?);
        }
        for _ in 0..audio_count {
            table.audio.push(parse_stream(r)?);
        }
        for _ in 0..pg_count {
            table.subtitles.push(parse_stream(r)?);
        }
        Ok(table)
    }
}

fn parse_stream(r: &mut ByteReader<'_>) -> Result<Stream> {
    let entry_len = r.u8()? as usize;
    let entry_start = r.position();
    let pid = match r.u8()? {
        1 => r.u16()?,
        2 | 4 => {
            r.skip(2)?; // sub path id, sub clip id
            r.u16()?
        }
        3 => {
            r.skip(1)?; // sub path id
            r.u16()?
        }
        other => return Err(Error::invalid(format!("stream entry type {}", other))),
    };
    r.seek(entry_start + entry_len)?;

    let attr_len = r.u8()? as usize;
    let attr_start = r.position();
    let codec = StreamCodec::from_u8(r.u8()?)?;
    let language = if codec.is_video() {
        r.skip(1)?; // format / rate
        None
    } else if codec.is_audio() {
        r.skip(1)?; // format / rate
        Some(normalize_language(&r.string(3)?))
    } else if codec.is_graphics() {
        Some(normalize_language(&r.string(3)?))
    } else {
        r.skip(1)?; // character code
        Some(normalize_language(&r.string(3)?))
    };
    r.seek(attr_start + attr_len)?;

    Ok(Stream {
        codec,
        pid,
        language,
    })
}

/// Map terminology codes to the bibliographic form mkvmerge uses.
pub fn normalize_language(code: &str) -> String {
    match code {
        "deu" => "ger".to_string(),
        "zho" => "chi".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_classes() {
        assert!(StreamCodec::from_u8(0x24).unwrap().is_video());
        assert!(StreamCodec::from_u8(0x83).unwrap().is_audio());
        assert!(StreamCodec::from_u8(0x90).unwrap().is_graphics());
        assert!(matches!(StreamCodec::from_u8(0x55), Err(Error::UnknownCodec(0x55))));
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("deu"), "ger");
        assert_eq!(normalize_language("zho"), "chi");
        assert_eq!(normalize_language("jpn"), "jpn");
    }

    #[test]
    fn test_parse_audio_entry_with_padding() {
        // entry: len 9, type 1, pid 0x1100, 6 pad; attrs: len 5, TrueHD, fmt, "jpn"
        let data = [
            9, 1, 0x11, 0x00, 0, 0, 0, 0, 0, 0, 5, 0x83, 0x61, b'j', b'p', b'n',
        ];
        let mut r = ByteReader::new(&data);
        let stream = parse_stream(&mut r).unwrap();
        assert_eq!(stream.codec, StreamCodec::TrueHd);
        assert_eq!(stream.pid, 0x1100);
        assert_eq!(stream.language.as_deref(), Some("jpn"));
        assert_eq!(r.position(), data.len());
    }
}
