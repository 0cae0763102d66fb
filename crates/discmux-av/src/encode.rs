//! Audio encoder selection and bitrate policy.

use crate::command::Invocation;
use crate::tools::Tool;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Target codec for transcoded audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    #[default]
    Flac,
    Opus,
    Aac,
    Alac,
}

impl AudioCodec {
    /// Extension of the encoded file.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioCodec::Flac => "flac",
            AudioCodec::Opus => "opus",
            AudioCodec::Aac | AudioCodec::Alac => "m4a",
        }
    }

    pub fn is_lossless(&self) -> bool {
        matches!(self, AudioCodec::Flac | AudioCodec::Alac)
    }
}

/// Which program encodes when a reference tool exists for the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderBackend {
    /// `flac` for FLAC, `opusenc` for Opus, ffmpeg otherwise.
    #[default]
    Native,
    Ffmpeg,
}

/// Encoder settings shared by every job of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub codec: AudioCodec,
    pub backend: EncoderBackend,
    /// kbps per channel for lossy codecs.
    pub bitrate_per_channel: u32,
    pub reduce_bitrate: bool,
}

/// Total bitrate in kbps for a channel count.
///
/// With `reduce`, multichannel layouts get less than a linear share.
///
/// # Examples
///
/// ```
/// use discmux_av::encode::audio_bitrate;
///
/// assert_eq!(audio_bitrate(128, 2, true), 256);
/// assert_eq!(audio_bitrate(128, 6, false), 768);
/// assert_eq!(audio_bitrate(128, 6, true), 591);
/// ```
pub fn audio_bitrate(per_channel: u32, channels: u32, reduce: bool) -> u32 {
    let standard = channels * per_channel;
    if !reduce {
        return standard;
    }
    match channels {
        3..=4 => standard * 85 / 100,
        5..=6 => standard * 77 / 100,
        7.. => standard * 70 / 100,
        _ => standard,
    }
}

/// Build the encode command for one intermediate FLAC file.
pub fn encode_audio(
    settings: &EncoderSettings,
    input: &Path,
    output: &Path,
    channels: u32,
) -> Invocation {
    let bitrate = audio_bitrate(settings.bitrate_per_channel, channels, settings.reduce_bitrate);
    match (settings.backend, settings.codec) {
        (EncoderBackend::Native, AudioCodec::Flac) => {
            let mut inv = Invocation::new(Tool::Flac);
            inv.args(["-8", "--silent", "-f", "-o"]).path(output).path(input);
            inv
        }
        (EncoderBackend::Native, AudioCodec::Opus) => {
            let mut inv = Invocation::new(Tool::Opusenc);
            inv.arg("--bitrate")
                .arg(bitrate.to_string())
                .arg("--discard-comments")
                .path(input)
                .path(output);
            inv
        }
        (_, codec) => {
            let mut inv = Invocation::new(Tool::Ffmpeg);
            inv.args(["-v", "quiet", "-nostdin", "-y", "-i"]).path(input);
            let encoder = match codec {
                AudioCodec::Flac => "flac",
                AudioCodec::Opus => "libopus",
                AudioCodec::Aac => "aac",
                AudioCodec::Alac => "alac",
            };
            inv.args(["-c:a", encoder]);
            if !codec.is_lossless() {
                inv.arg("-b:a").arg(format!("{}k", bitrate));
            }
            inv.path(output);
            inv
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(codec: AudioCodec, backend: EncoderBackend) -> EncoderSettings {
        EncoderSettings {
            codec,
            backend,
            bitrate_per_channel: 96,
            reduce_bitrate: false,
        }
    }

    #[test]
    fn test_bitrate_reduction_tiers() {
        assert_eq!(audio_bitrate(100, 4, true), 340);
        assert_eq!(audio_bitrate(100, 5, true), 385);
        assert_eq!(audio_bitrate(100, 8, true), 560);
        assert_eq!(audio_bitrate(100, 1, true), 100);
    }

    #[test]
    fn test_native_flac() {
        let inv = encode_audio(
            &settings(AudioCodec::Flac, EncoderBackend::Native),
            Path::new("/t/a-ffmpeg.flac"),
            Path::new("/t/a.flac"),
            6,
        );
        assert_eq!(inv.tool(), Tool::Flac);
        assert_eq!(inv.to_string(), "flac -8 --silent -f -o /t/a.flac /t/a-ffmpeg.flac");
    }

    #[test]
    fn test_native_opus_bitrate() {
        let inv = encode_audio(
            &settings(AudioCodec::Opus, EncoderBackend::Native),
            Path::new("/t/a-ffmpeg.flac"),
            Path::new("/t/a.opus"),
            2,
        );
        assert_eq!(
            inv.to_string(),
            "opusenc --bitrate 192 --discard-comments /t/a-ffmpeg.flac /t/a.opus"
        );
    }

    #[test]
    fn test_aac_goes_through_ffmpeg() {
        let inv = encode_audio(
            &settings(AudioCodec::Aac, EncoderBackend::Native),
            Path::new("/t/a-ffmpeg.flac"),
            Path::new("/t/a.m4a"),
            2,
        );
        assert_eq!(inv.tool(), Tool::Ffmpeg);
        assert!(inv.to_string().ends_with("-c:a aac -b:a 192k /t/a.m4a"));
    }

    #[test]
    fn test_extensions() {
        assert_eq!(AudioCodec::Alac.extension(), "m4a");
        assert_eq!(AudioCodec::Opus.extension(), "opus");
    }
}
