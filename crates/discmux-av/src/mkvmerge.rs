//! Command builder for mkvmerge muxing runs.

use crate::command::Invocation;
use crate::tools::Tool;
use std::path::{Path, PathBuf};

/// Which tracks of one type an input contributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrackSelection {
    #[default]
    All,
    /// Only tracks in these languages.
    Languages(Vec<String>),
    /// Every track except these ids.
    Except(Vec<usize>),
    Nothing,
}

/// One source file with its options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MkvmergeInput {
    pub file: PathBuf,
    /// Append to the previous input instead of adding a new one (`+file`).
    pub append: bool,
    pub audio: TrackSelection,
    pub subtitles: TrackSelection,
    pub no_chapters: bool,
    pub no_attachments: bool,
    pub no_global_tags: bool,
    pub no_track_tags: bool,
    /// `(track id, language)`
    pub languages: Vec<(usize, String)>,
    /// `(track id, name)`; an empty name clears it.
    pub track_names: Vec<(usize, String)>,
}

impl MkvmergeInput {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: path.into(),
            ..Default::default()
        }
    }

    /// An input appended to the one before it.
    pub fn appended(path: impl Into<PathBuf>) -> Self {
        Self {
            file: path.into(),
            append: true,
            ..Default::default()
        }
    }

    /// Restrict audio and subtitle tracks to the given languages.
    pub fn with_languages(mut self, languages: &[String]) -> Self {
        self.audio = TrackSelection::Languages(languages.to_vec());
        self.subtitles = TrackSelection::Languages(languages.to_vec());
        self
    }

    fn push_args(&self, inv: &mut Invocation) {
        push_selection(inv, "--audio-tracks", "--no-audio", &self.audio);
        push_selection(inv, "--subtitle-tracks", "--no-subtitles", &self.subtitles);
        if self.no_chapters {
            inv.arg("--no-chapters");
        }
        if self.no_attachments {
            inv.arg("--no-attachments");
        }
        if self.no_global_tags {
            inv.arg("--no-global-tags");
        }
        if self.no_track_tags {
            inv.arg("--no-track-tags");
        }
        for (id, lang) in &self.languages {
            inv.arg("--language").arg(format!("{}:{}", id, lang));
        }
        for (id, name) in &self.track_names {
            inv.arg("--track-name").arg(format!("{}:{}", id, name));
        }
        if self.append {
            inv.arg(format!("+{}", self.file.display()));
        } else {
            inv.path(&self.file);
        }
    }
}

fn push_selection(inv: &mut Invocation, flag: &str, none_flag: &str, sel: &TrackSelection) {
    match sel {
        TrackSelection::All => {}
        TrackSelection::Languages(langs) => {
            inv.arg(flag).arg(langs.join(","));
        }
        TrackSelection::Except(ids) => {
            let ids: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
            inv.arg(flag).arg(format!("!{}", ids.join(",")));
        }
        TrackSelection::Nothing => {
            inv.arg(none_flag);
        }
    }
}

/// A complete mkvmerge run producing one output (or numbered split outputs).
///
/// # Example
///
/// ```
/// use discmux_av::mkvmerge::{MkvmergeCommand, MkvmergeInput};
///
/// let mut cmd = MkvmergeCommand::new("/tmp/out.mkv");
/// cmd.inputs.push(MkvmergeInput::file("a.m2ts"));
/// cmd.inputs.push(MkvmergeInput::appended("b.m2ts"));
/// assert_eq!(
///     cmd.invocation().to_string(),
///     "mkvmerge --quiet -o /tmp/out.mkv a.m2ts +b.m2ts"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MkvmergeCommand {
    pub output: PathBuf,
    /// Value for `--split`, e.g. `chapters:3,6`.
    pub split: Option<String>,
    pub chapters: Option<PathBuf>,
    /// `(input index, track id)` pairs.
    pub track_order: Vec<(usize, usize)>,
    pub inputs: Vec<MkvmergeInput>,
}

impl MkvmergeCommand {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            split: None,
            chapters: None,
            track_order: Vec::new(),
            inputs: Vec::new(),
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn invocation(&self) -> Invocation {
        let mut inv = Invocation::new(Tool::Mkvmerge);
        inv.arg("--quiet").arg("-o").path(&self.output);
        if let Some(split) = &self.split {
            inv.arg("--split").arg(split.clone());
        }
        if let Some(chapters) = &self.chapters {
            inv.arg("--chapters").path(chapters);
        }
        if !self.track_order.is_empty() {
            let order: Vec<String> = self
                .track_order
                .iter()
                .map(|(fid, tid)| format!("{}:{}", fid, tid))
                .collect();
            inv.arg("--track-order").arg(order.join(","));
        }
        for input in &self.inputs {
            input.push_args(&mut inv);
        }
        inv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_filtered_input() {
        let mut cmd = MkvmergeCommand::new("/t/00800-00001.mkv");
        cmd.chapters = Some("/t/00800.txt".into());
        cmd.inputs.push(
            MkvmergeInput::file("/d/00001.m2ts").with_languages(&["jpn".into(), "und".into()]),
        );
        assert_eq!(
            cmd.invocation().arguments(),
            &[
                "--quiet",
                "-o",
                "/t/00800-00001.mkv",
                "--chapters",
                "/t/00800.txt",
                "--audio-tracks",
                "jpn,und",
                "--subtitle-tracks",
                "jpn,und",
                "/d/00001.m2ts",
            ]
        );
    }

    #[test]
    fn test_final_mux_arguments() {
        let mut cmd = MkvmergeCommand::new("/o/movie.mkv");
        cmd.split = Some("chapters:3".into());
        cmd.track_order = vec![(0, 0), (1, 0)];
        let mut source = MkvmergeInput::file("/i/movie.mkv");
        source.audio = TrackSelection::Nothing;
        source.subtitles = TrackSelection::Except(vec![3, 4]);
        source.no_attachments = true;
        source.track_names = vec![(0, String::new())];
        let mut flac = MkvmergeInput::file("/t/movie-1-jpn.flac");
        flac.no_chapters = true;
        flac.languages = vec![(0, "jpn".into())];
        cmd.inputs = vec![source, flac];

        let line = cmd.invocation().to_string();
        assert_eq!(
            line,
            "mkvmerge --quiet -o /o/movie.mkv --split chapters:3 --track-order 0:0,1:0 \
             --no-audio --subtitle-tracks !3,4 --no-attachments --track-name 0: /i/movie.mkv \
             --no-chapters --language 0:jpn /t/movie-1-jpn.flac"
        );
    }

    #[test]
    fn test_appended_inputs_keep_their_options() {
        let langs = vec!["jpn".to_string()];
        let mut cmd = MkvmergeCommand::new("/t/joined.mkv");
        cmd.inputs.push(MkvmergeInput::file("/t/a.mkv").with_languages(&langs));
        let mut second = MkvmergeInput::appended("/t/b.mkv").with_languages(&langs);
        second.no_chapters = true;
        cmd.inputs.push(second);

        assert_eq!(
            cmd.invocation().to_string(),
            "mkvmerge --quiet -o /t/joined.mkv --audio-tracks jpn --subtitle-tracks jpn /t/a.mkv \
             --audio-tracks jpn --subtitle-tracks jpn --no-chapters +/t/b.mkv"
        );
    }
}
