//! Per-track disposition: copy, drop or replace every elementary stream.
//!
//! [`DispositionPlanner::plan`] walks the identified tracks once, left to
//! right. A rule may consume the neighbor after the current track (an
//! embedded AC-3 core), in which case the walk skips past it.

use crate::config::AudioConfig;
use crate::error::PlanError;
use discmux_av::{AudioCodec, TrackDescriptor};
use discmux_common::TrackType;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// What the final mux does with one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
    Copy(TrackType),
    Remove(TrackType),
    /// Drop the track and add these external files in its place.
    Replace {
        kind: TrackType,
        /// Never empty; a downmix, if any, comes first.
        files: Vec<PathBuf>,
        language: String,
        track_name: Option<String>,
    },
}

impl Modification {
    pub fn kind(&self) -> TrackType {
        match self {
            Modification::Copy(kind) | Modification::Remove(kind) => *kind,
            Modification::Replace { kind, .. } => *kind,
        }
    }

    /// Whether the source track itself is left out of the output.
    pub fn drops_source(&self) -> bool {
        !matches!(self, Modification::Copy(_))
    }

    pub fn is_replace(&self) -> bool {
        matches!(self, Modification::Replace { .. })
    }
}

/// One audio encode, from intermediate FLAC to the final file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    /// Position of the owning track in the plan.
    pub position: usize,
    /// Stream index in the source container.
    pub track_id: usize,
    pub intermediate: PathBuf,
    pub output: PathBuf,
    pub channels: u32,
    pub downmix: bool,
    pub codec: AudioCodec,
}

/// Modifications for every track of one file, plus the encodes they need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackPlan {
    modifications: Vec<Modification>,
    jobs: Vec<TranscodeJob>,
}

impl TrackPlan {
    pub fn modifications(&self) -> &[Modification] {
        &self.modifications
    }

    pub fn jobs(&self) -> &[TranscodeJob] {
        &self.jobs
    }

    /// Hand the scheduled jobs to the transcode pipeline.
    pub fn take_jobs(&mut self) -> Vec<TranscodeJob> {
        std::mem::take(&mut self.jobs)
    }

    /// Whether the track at `position` is still a live replacement.
    pub fn is_replace(&self, position: usize) -> bool {
        self.modifications
            .get(position)
            .map(Modification::is_replace)
            .unwrap_or(false)
    }

    /// Turn a track's modification into `Remove`.
    ///
    /// This is the only mutation a plan allows. Returns the files the
    /// modification referenced, which are no longer owned by anything.
    pub fn demote_to_remove(&mut self, position: usize) -> Vec<PathBuf> {
        let Some(slot) = self.modifications.get_mut(position) else {
            return Vec::new();
        };
        let kind = slot.kind();
        match std::mem::replace(slot, Modification::Remove(kind)) {
            Modification::Replace { files, .. } => files,
            _ => Vec::new(),
        }
    }
}

/// Decides the [`Modification`] of each track of one file.
pub struct DispositionPlanner<'a> {
    audio: &'a AudioConfig,
    languages: BTreeSet<String>,
    temp_dir: &'a Path,
    base_name: String,
}

impl<'a> DispositionPlanner<'a> {
    /// `languages` is the effective preferred set for this file; replacement
    /// files are named after `base_name` inside `temp_dir`.
    pub fn new(
        audio: &'a AudioConfig,
        languages: BTreeSet<String>,
        temp_dir: &'a Path,
        base_name: impl Into<String>,
    ) -> Self {
        Self {
            audio,
            languages,
            temp_dir,
            base_name: base_name.into(),
        }
    }

    pub fn plan(&self, tracks: &[TrackDescriptor]) -> Result<TrackPlan, PlanError> {
        let mut modifications: Vec<Modification> =
            tracks.iter().map(|t| Modification::Copy(t.kind)).collect();
        let mut jobs = Vec::new();

        let mut i = 0;
        while i < tracks.len() {
            let track = &tracks[i];
            let mut next = i + 1;

            if track.kind == TrackType::Video {
                i = next;
                continue;
            }

            let decision = if !self.languages.contains(&track.language) {
                tracing::debug!(track = track.index, language = %track.language, "language not preferred");
                Modification::Remove(track.kind)
            } else if track.is_true_hd() && self.audio.keep_true_hd {
                Modification::Copy(track.kind)
            } else if track.kind == TrackType::Audio && !self.audio.encode {
                Modification::Copy(track.kind)
            } else if let Some(twin) = self.true_hd_twin(tracks, i) {
                tracing::debug!(track = track.index, truehd = tracks[twin].index, "dropping DTS-HD MA duplicate of TrueHD");
                if twin + 1 == i {
                    if let Some(core) = tracks.get(i + 1) {
                        if core.is_ac3() && core.language == track.language {
                            modifications[i + 1] = Modification::Remove(core.kind);
                            next = i + 2;
                        }
                    }
                }
                Modification::Remove(track.kind)
            } else if track.is_flac() && self.audio.keep_flac {
                Modification::Copy(track.kind)
            } else if track.is_lossless_audio() || (self.audio.fix_dts && track.is_garbage_dts()) {
                self.replace(i, track, &mut jobs)?
            } else {
                Modification::Copy(track.kind)
            };
            modifications[i] = decision;

            // The embedded AC-3 core of a TrueHD track is never kept on its own.
            if next == i + 1 && track.is_true_hd() {
                if let Some(core) = tracks.get(i + 1) {
                    if core.is_ac3() && core.language == track.language {
                        modifications[i + 1] = Modification::Remove(core.kind);
                        next = i + 2;
                    }
                }
            }

            i = next;
        }

        Ok(TrackPlan {
            modifications,
            jobs,
        })
    }

    /// Adjacent TrueHD track with the same language and channel count that
    /// makes a DTS-HD MA track redundant. Looks back first.
    fn true_hd_twin(&self, tracks: &[TrackDescriptor], i: usize) -> Option<usize> {
        let track = &tracks[i];
        if !(self.audio.remove_extra_dts && track.is_dts_hd_ma()) {
            return None;
        }
        let is_twin = |j: usize| {
            tracks
                .get(j)
                .map(|t| {
                    t.is_true_hd() && t.language == track.language && t.channels == track.channels
                })
                .unwrap_or(false)
        };
        if i > 0 && is_twin(i - 1) {
            Some(i - 1)
        } else if is_twin(i + 1) {
            Some(i + 1)
        } else {
            None
        }
    }

    fn replace(
        &self,
        position: usize,
        track: &TrackDescriptor,
        jobs: &mut Vec<TranscodeJob>,
    ) -> Result<Modification, PlanError> {
        let channels = track
            .channels
            .ok_or(PlanError::MissingChannelCount { index: track.index })?;
        let codec = self.audio.codec;
        let stem = format!("{}-{}-{}", self.base_name, track.index, track.language);

        let output = self.temp_dir.join(format!("{}.{}", stem, codec.extension()));
        jobs.push(TranscodeJob {
            position,
            track_id: track.index,
            intermediate: self.temp_dir.join(format!("{}-ffmpeg.flac", stem)),
            output: output.clone(),
            channels,
            downmix: false,
            codec,
        });

        let mut files = Vec::with_capacity(2);
        if self.audio.downmix && channels > 2 {
            let downmix = self
                .temp_dir
                .join(format!("{}-downmix.{}", stem, codec.extension()));
            jobs.push(TranscodeJob {
                position,
                track_id: track.index,
                intermediate: self.temp_dir.join(format!("{}-ffmpeg-downmix.flac", stem)),
                output: downmix.clone(),
                channels: 2,
                downmix: true,
                codec,
            });
            files.push(downmix);
        }
        files.push(output);

        Ok(Modification::Replace {
            kind: track.kind,
            files,
            language: track.language.clone(),
            track_name: track.name.clone(),
        })
    }
}
