//! ffmpeg invocations: single-pass audio demux and stream-copy remux.

use crate::command::Invocation;
use crate::tools::Tool;
use std::path::{Path, PathBuf};

/// One audio stream to extract to an intermediate FLAC file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxTarget {
    pub track_index: usize,
    /// Fold to two channels while extracting.
    pub downmix: bool,
    pub output: PathBuf,
}

fn base_invocation(input: &Path) -> Invocation {
    let mut inv = Invocation::new(Tool::Ffmpeg);
    inv.args(["-v", "quiet", "-nostdin", "-y", "-i"]).path(input);
    inv
}

/// Extract every target from `input` in a single decode pass.
pub fn demux_audio(input: &Path, targets: &[DemuxTarget]) -> Invocation {
    let mut inv = base_invocation(input);
    for target in targets {
        inv.arg("-map").arg(format!("0:{}", target.track_index));
        if target.downmix {
            inv.args(["-ac", "2"]);
        }
        inv.path(&target.output);
    }
    inv
}

/// Which streams a stream-copy run keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStreams {
    Video,
    Audio,
}

/// Copy the video or audio streams of `input` into a new container.
///
/// Used for clips mkvmerge cannot parse track languages from.
pub fn stream_copy(input: &Path, output: &Path, streams: CopyStreams) -> Invocation {
    let mut inv = base_invocation(input);
    let map = match streams {
        CopyStreams::Video => "0:v",
        CopyStreams::Audio => "0:a",
    };
    inv.args(["-map", map, "-c", "copy"]).path(output);
    inv
}
