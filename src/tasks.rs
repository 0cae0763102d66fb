//! Turns decoded playlists into schedulable mux tasks.

use crate::catalog::PlaylistDescriptor;
use crate::config::{Config, LanguageConfig, Mode};
use discmux_av::ffmpeg::{stream_copy, CopyStreams};
use discmux_av::mkvmerge::{MkvmergeCommand, MkvmergeInput};
use discmux_av::Invocation;
use discmux_common::paths::file_stem;
use discmux_common::Timestamp;
use discmux_mpls::chapters::to_ogm;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Longest clip-list part of a direct output name.
const MAX_CLIP_NAME_LEN: usize = 200;

/// A tool call and the file it is expected to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCommand {
    pub invocation: Invocation,
    pub output: PathBuf,
}

impl From<&MkvmergeCommand> for PlannedCommand {
    fn from(cmd: &MkvmergeCommand) -> Self {
        Self {
            invocation: cmd.invocation(),
            output: cmd.output().to_path_buf(),
        }
    }
}

/// Per-clip commands and the join that concatenates their outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    pub split_workers: Vec<PlannedCommand>,
    pub join: PlannedCommand,
}

/// One schedulable unit of disc work.
///
/// Split workers and the join are stored together, so one is never
/// present without the other. A task with a fallback cannot be ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkTask {
    input: PathBuf,
    primary: PlannedCommand,
    chapter_split: bool,
    can_be_ignored: bool,
    fallback: Option<Fallback>,
}

impl WorkTask {
    pub fn new(input: impl Into<PathBuf>, primary: PlannedCommand) -> Self {
        Self {
            input: input.into(),
            primary,
            chapter_split: false,
            can_be_ignored: false,
            fallback: None,
        }
    }

    /// The primary command writes numbered outputs at chapter boundaries.
    pub fn chapter_split(mut self) -> Self {
        self.chapter_split = true;
        self
    }

    /// A failure of this task is logged and skipped.
    pub fn ignorable(mut self) -> Self {
        self.can_be_ignored = true;
        self.fallback = None;
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.can_be_ignored = false;
        self.fallback = Some(fallback);
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn primary(&self) -> &PlannedCommand {
        &self.primary
    }

    pub fn is_chapter_split(&self) -> bool {
        self.chapter_split
    }

    pub fn can_be_ignored(&self) -> bool {
        self.can_be_ignored
    }

    pub fn fallback(&self) -> Option<&Fallback> {
        self.fallback.as_ref()
    }
}

/// Tasks for one playlist plus the chapter files they read.
#[derive(Debug, Default)]
pub struct PlannedTasks {
    pub tasks: Vec<WorkTask>,
    /// `(path, OGM text)` to write before the tasks run.
    pub chapter_files: Vec<(PathBuf, String)>,
}

/// mkvmerge `--split` value for explicit per-part chapter counts.
///
/// Only produced when the counts add up to exactly `chapter_count` and
/// describe at least two parts. The value lists the first chapter of every
/// part after the first.
///
/// ```
/// use discmux::tasks::generate_split;
///
/// assert_eq!(generate_split(&[2, 3], 5).as_deref(), Some("chapters:3"));
/// assert_eq!(generate_split(&[2, 2], 5), None);
/// ```
pub fn generate_split(splits: &[u32], chapter_count: usize) -> Option<String> {
    if splits.is_empty() {
        return None;
    }
    let total: usize = splits.iter().map(|&n| n as usize).sum();
    if total != chapter_count {
        return None;
    }
    let mut seen = 0;
    let mut starts = Vec::with_capacity(splits.len());
    for &count in splits {
        starts.push((count as usize + 1 + seen).to_string());
        seen += count as usize;
    }
    starts.pop();
    if starts.is_empty() {
        return None;
    }
    Some(format!("chapters:{}", starts.join(",")))
}

/// Builds the [`WorkTask`]s of a disc, playlist by playlist.
///
/// Clips are consumed in catalog order: once a playlist has been planned,
/// later playlists no longer emit per-clip tasks for its clips.
pub struct MuxTaskPlanner<'a> {
    mode: Mode,
    splits: Option<&'a [u32]>,
    languages: &'a LanguageConfig,
    temp_dir: &'a Path,
    remaining: BTreeSet<PathBuf>,
}

impl<'a> MuxTaskPlanner<'a> {
    pub fn new(config: &'a Config, temp_dir: &'a Path, catalog: &[PlaylistDescriptor]) -> Self {
        Self {
            mode: config.mode,
            splits: config.splits.as_deref(),
            languages: &config.language,
            temp_dir,
            remaining: catalog.iter().flat_map(|p| p.clips.iter().cloned()).collect(),
        }
    }

    pub fn plan(&mut self, playlist: &PlaylistDescriptor) -> PlannedTasks {
        let languages: Vec<String> = self
            .languages
            .effective(playlist.primary_language())
            .into_iter()
            .collect();
        let mut planned = PlannedTasks::default();

        let per_clip =
            self.mode == Mode::Episodes || playlist.languages.is_empty() || playlist.compressed;
        if per_clip {
            tracing::debug!(playlist = %playlist.path.display(), "muxing clips separately");
            for (task, chapters) in self.clip_tasks(playlist, &languages, true) {
                planned.tasks.push(task);
                planned.chapter_files.extend(chapters);
            }
        } else {
            self.direct_task(playlist, &languages, &mut planned);
        }

        for clip in &playlist.clips {
            self.remaining.remove(clip);
        }
        planned
    }

    fn direct_task(&self, playlist: &PlaylistDescriptor, languages: &[String], planned: &mut PlannedTasks) {
        let stem = playlist.stem();
        let chapters = self.chapter_file(
            format!("{}.txt", stem),
            &playlist.chapters,
            &mut planned.chapter_files,
        );
        let output = self.temp_dir.join(format!("{}.mkv", direct_name(playlist)));

        if let Some(splits) = self.splits {
            if let Some(split) = generate_split(splits, playlist.chapter_count) {
                let mut cmd = MkvmergeCommand::new(&output);
                cmd.split = Some(split);
                cmd.chapters = chapters;
                cmd.inputs
                    .push(MkvmergeInput::file(&playlist.path).with_languages(languages));
                planned
                    .tasks
                    .push(WorkTask::new(&playlist.path, (&cmd).into()).chapter_split());
                return;
            }
            tracing::warn!(
                playlist = %playlist.path.display(),
                chapters = playlist.chapter_count,
                "split counts do not add up to the chapter count, muxing whole title"
            );
        }

        let mut primary = MkvmergeCommand::new(&output);
        primary.chapters = chapters.clone();
        primary.inputs = appended_inputs(&playlist.clips, languages, false);

        let mut split_workers = Vec::new();
        for (task, clip_chapters) in self.clip_tasks(playlist, languages, false) {
            split_workers.push(task.primary);
            planned.chapter_files.extend(clip_chapters);
        }
        let parts: Vec<PathBuf> = split_workers.iter().map(|w| w.output.clone()).collect();

        let mut join = MkvmergeCommand::new(&output);
        join.chapters = chapters;
        join.inputs = appended_inputs(&parts, languages, true);

        planned.tasks.push(
            WorkTask::new(&playlist.path, (&primary).into()).with_fallback(Fallback {
                split_workers,
                join: (&join).into(),
            }),
        );
    }

    /// One task per clip. With `only_remaining`, clips an earlier playlist
    /// already covered are skipped.
    fn clip_tasks(
        &self,
        playlist: &PlaylistDescriptor,
        languages: &[String],
        only_remaining: bool,
    ) -> Vec<(WorkTask, Option<(PathBuf, String)>)> {
        let stem = playlist.stem();
        let mut tasks = Vec::new();

        for (idx, clip) in playlist.clips.iter().enumerate() {
            if only_remaining && !self.remaining.contains(clip) {
                tracing::debug!(clip = %clip.display(), "clip already covered");
                continue;
            }
            let clip_stem = file_stem(clip);
            let base = if playlist.is_single_clip() {
                format!("{}-{}", stem, clip_stem)
            } else {
                format!("{}-{}-{}", stem, idx, clip_stem)
            };

            if playlist.languages.is_empty() {
                for (suffix, streams) in [("video", CopyStreams::Video), ("audio", CopyStreams::Audio)] {
                    let output = self.temp_dir.join(format!("{}-ffmpeg-{}.mkv", base, suffix));
                    let primary = PlannedCommand {
                        invocation: stream_copy(clip, &output, streams),
                        output,
                    };
                    tasks.push((WorkTask::new(clip, primary).ignorable(), None));
                }
                continue;
            }

            let mut chapter_file = Vec::new();
            let chapters = playlist
                .clip_chapters
                .get(idx)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let chapters = self.chapter_file(
                format!("{}_{}_chapter.txt", stem, clip_stem),
                chapters,
                &mut chapter_file,
            );

            let mut cmd = MkvmergeCommand::new(self.temp_dir.join(format!("{}.mkv", base)));
            cmd.chapters = chapters;
            cmd.inputs.push(MkvmergeInput::file(clip).with_languages(languages));
            tasks.push((
                WorkTask::new(clip, (&cmd).into()),
                chapter_file.pop(),
            ));
        }
        tasks
    }

    /// Queue an OGM chapter file; `None` when there are no chapters.
    fn chapter_file(
        &self,
        name: String,
        chapters: &[Timestamp],
        files: &mut Vec<(PathBuf, String)>,
    ) -> Option<PathBuf> {
        if chapters.is_empty() {
            return None;
        }
        let path = self.temp_dir.join(name);
        files.push((path.clone(), to_ogm(chapters)));
        Some(path)
    }
}

/// `{playlist}-{clip+clip+...}` with the clip part capped.
fn direct_name(playlist: &PlaylistDescriptor) -> String {
    let clips: Vec<String> = playlist.clips.iter().map(|c| file_stem(c)).collect();
    let joined: String = clips.join("+").chars().take(MAX_CLIP_NAME_LEN).collect();
    format!("{}-{}", playlist.stem(), joined)
}

fn appended_inputs(files: &[PathBuf], languages: &[String], no_chapters: bool) -> Vec<MkvmergeInput> {
    files
        .iter()
        .enumerate()
        .map(|(i, file)| {
            let mut input = if i == 0 {
                MkvmergeInput::file(file)
            } else {
                MkvmergeInput::appended(file)
            }
            .with_languages(languages);
            input.no_chapters = no_chapters;
            input
        })
        .collect()
}
