//! The final mkvmerge pass that applies a file's track modifications.

use crate::config::OutputConfig;
use crate::disposition::Modification;
use discmux_av::mkvmerge::{MkvmergeCommand, MkvmergeInput, TrackSelection};
use discmux_av::TrackDescriptor;
use discmux_common::TrackType;
use std::path::Path;

/// Build the command writing `output` from `source` and its plan.
///
/// Copied tracks keep their place in the track order; every replacement
/// file becomes its own input and takes the place of the track it
/// replaces.
pub fn final_mux(
    source: &Path,
    output: &Path,
    tracks: &[TrackDescriptor],
    modifications: &[Modification],
    options: &OutputConfig,
    split: Option<String>,
) -> MkvmergeCommand {
    let mut main = MkvmergeInput::file(source);
    main.no_attachments = true;

    let mut order = Vec::with_capacity(tracks.len());
    let mut removed_audio = Vec::new();
    let mut removed_subtitles = Vec::new();
    let mut extra = Vec::new();

    for (track, modification) in tracks.iter().zip(modifications) {
        if modification.drops_source() {
            match track.kind {
                TrackType::Audio => removed_audio.push(track.index),
                TrackType::Subtitle => removed_subtitles.push(track.index),
                TrackType::Video => {}
            }
        }

        match modification {
            Modification::Copy(kind) => {
                order.push((0, track.index));
                if !options.keep_track_name {
                    main.track_names.push((track.index, String::new()));
                }
                if *kind == TrackType::Video && !options.keep_video_language {
                    main.languages.push((track.index, "und".to_string()));
                }
            }
            Modification::Remove(_) => {}
            Modification::Replace {
                files,
                language,
                track_name,
                ..
            } => {
                let name = if options.keep_track_name {
                    track_name.clone().unwrap_or_default()
                } else {
                    String::new()
                };
                for file in files {
                    let mut input = MkvmergeInput::file(file);
                    input.languages = vec![(0, language.clone())];
                    input.track_names = vec![(0, name.clone())];
                    input.no_global_tags = true;
                    input.no_chapters = true;
                    input.no_track_tags = true;
                    extra.push(input);
                    order.push((extra.len(), 0));
                }
            }
        }
    }

    main.audio = selection(tracks, TrackType::Audio, removed_audio);
    main.subtitles = selection(tracks, TrackType::Subtitle, removed_subtitles);

    let mut cmd = MkvmergeCommand::new(output);
    cmd.split = split;
    cmd.track_order = order;
    cmd.inputs.push(main);
    cmd.inputs.extend(extra);
    cmd
}

fn selection(tracks: &[TrackDescriptor], kind: TrackType, removed: Vec<usize>) -> TrackSelection {
    let total = tracks.iter().filter(|t| t.kind == kind).count();
    if removed.is_empty() {
        TrackSelection::All
    } else if removed.len() == total {
        TrackSelection::Nothing
    } else {
        TrackSelection::Except(removed)
    }
}
