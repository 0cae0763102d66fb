//! Top-level runs. Each input yields one [`Summary`] or one error.

use crate::catalog::{
    LongestPlaylistOracle, MainTitleOracle, MkvmergePlaylistDecoder, NativePlaylistDecoder,
    PlaylistCatalog, PlaylistDecoder, PlaylistDescriptor,
};
use crate::config::{Config, Mode, PlaylistBackend};
use crate::disposition::{DispositionPlanner, Modification};
use crate::error::{Error, Result};
use crate::executor::{split_outputs, TaskExecutor, TaskState};
use crate::remux::final_mux;
use crate::tasks::{generate_split, MuxTaskPlanner};
use crate::transcode::AudioTranscodePipeline;
use chrono::{DateTime, Utc};
use discmux_av::{
    Identification, MediaIdentifier, MkvmergeIdentifier, SystemRunner, ToolRunner,
    TrackDescriptor, Workspace,
};
use discmux_common::paths::{file_stem, is_container_file, safe_filename};
use discmux_common::DurationBucket;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Size and time accounting for one top-level input.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub input: PathBuf,
    pub outputs: Vec<PathBuf>,
    pub size_before: u64,
    pub size_after: u64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Summary {
    fn started(input: &Path) -> Self {
        let now = Utc::now();
        Self {
            input: input.to_path_buf(),
            outputs: Vec::new(),
            size_before: 0,
            size_after: 0,
            start: now,
            end: now,
        }
    }

    fn absorb(&mut self, part: Summary) {
        self.size_before += part.size_before;
        self.size_after += part.size_after;
        self.outputs.extend(part.outputs);
    }

    fn finish(mut self) -> Self {
        self.end = Utc::now();
        self
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.end - self.start
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} bytes, {} output(s) in {}s",
            self.input.display(),
            self.size_before,
            self.size_after,
            self.outputs.len(),
            self.elapsed().num_seconds()
        )
    }
}

/// Runs inputs according to the configured mode.
///
/// Every external collaborator is injected, so the whole engine can run
/// against fakes.
pub struct Orchestrator {
    config: Arc<Config>,
    runner: Arc<dyn ToolRunner>,
    identifier: Arc<dyn MediaIdentifier>,
    decoder: Arc<dyn PlaylistDecoder>,
    oracle: Arc<dyn MainTitleOracle>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        config: Arc<Config>,
        runner: Arc<dyn ToolRunner>,
        identifier: Arc<dyn MediaIdentifier>,
        decoder: Arc<dyn PlaylistDecoder>,
        oracle: Arc<dyn MainTitleOracle>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            runner,
            identifier,
            decoder,
            oracle,
            cancel,
        }
    }

    /// Wire the engine to the real external tools.
    pub fn with_system_tools(config: Arc<Config>, cancel: CancellationToken) -> Self {
        let runner: Arc<dyn ToolRunner> = Arc::new(SystemRunner::new(config.tools.paths()));
        let identifier: Arc<dyn MediaIdentifier> =
            Arc::new(MkvmergeIdentifier::new(runner.clone(), cancel.clone()));
        let decoder: Arc<dyn PlaylistDecoder> = match config.output.playlist_backend {
            PlaylistBackend::Native => Arc::new(NativePlaylistDecoder),
            PlaylistBackend::Mkvmerge => Arc::new(MkvmergePlaylistDecoder::new(identifier.clone())),
        };
        let oracle = Arc::new(LongestPlaylistOracle::new(decoder.clone()));
        Self::new(config, runner, identifier, decoder, oracle, cancel)
    }

    /// Process one top-level input.
    pub fn run(&self, input: &Path) -> Result<Summary> {
        self.checkpoint()?;
        if !input.exists() {
            return Err(Error::InputNotFound(input.to_path_buf()));
        }
        tracing::info!(input = %input.display(), mode = ?self.config.mode, "starting");

        let summary = match self.config.mode {
            Mode::Movie | Mode::Episodes => self.with_workspace(|temp| self.remux_disc(input, temp)),
            Mode::File => self.with_workspace(|temp| self.remux_single(input, temp)),
            Mode::Directory => self.remux_directory(input),
        }?;

        tracing::info!(
            input = %input.display(),
            before = summary.size_before,
            after = summary.size_after,
            "finished"
        );
        Ok(summary)
    }

    /// The deduplicated playlists of a disc, without planning or muxing.
    pub fn playlists(&self, disc_root: &Path, main_only: bool) -> Result<Vec<PlaylistDescriptor>> {
        PlaylistCatalog::new(self.decoder.as_ref(), self.oracle.as_ref()).scan(disc_root, main_only)
    }

    /// Identify `file` and plan its tracks without running anything.
    pub fn inspect(&self, file: &Path) -> Result<(Vec<TrackDescriptor>, Vec<Modification>)> {
        let ident = self.identify(file)?;
        let tracks = ident.descriptors();
        let languages = self
            .config
            .language
            .effective(ident.primary_language().as_deref());
        let temp = self
            .config
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let plan = DispositionPlanner::new(&self.config.audio, languages, &temp, file_stem(file))
            .plan(&tracks)?;
        Ok((tracks, plan.modifications().to_vec()))
    }

    fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Terminated)
        } else {
            Ok(())
        }
    }

    /// Run `body` with a fresh temporary directory that is removed on
    /// every exit path.
    fn with_workspace<T>(&self, body: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
        let workspace = Workspace::new(self.config.temp_dir.as_deref())?;
        body(workspace.path())
    }

    fn remux_disc(&self, root: &Path, temp: &Path) -> Result<Summary> {
        if !root.is_dir() {
            return Err(Error::NotADirectory(root.to_path_buf()));
        }
        let final_root = self.config.output_dir.join(disc_title(root));
        if final_root.exists() {
            return Err(Error::OutputExists(final_root));
        }

        let catalog = PlaylistCatalog::new(self.decoder.as_ref(), self.oracle.as_ref())
            .scan(root, self.config.main_title_only)?;
        let mut planner = MuxTaskPlanner::new(&self.config, temp, &catalog);
        let mut tasks = Vec::new();
        for playlist in &catalog {
            let planned = planner.plan(playlist);
            for (path, text) in &planned.chapter_files {
                std::fs::write(path, text)?;
            }
            tasks.extend(planned.tasks);
        }
        tracing::info!(playlists = catalog.len(), tasks = tasks.len(), "planned");

        let executor = TaskExecutor::new(
            self.runner.as_ref(),
            self.config.output.allowed_exit_codes(),
            &self.cancel,
        );
        let mut produced = Vec::new();
        for task in &tasks {
            let outcome = executor.execute(task)?;
            if outcome.state == TaskState::Degraded {
                tracing::warn!(
                    input = %task.input().display(),
                    parts = outcome.outputs.len(),
                    "title kept as separate parts"
                );
            }
            produced.extend(outcome.outputs);
        }

        let mut summary = Summary::started(root);
        for file in produced {
            if !file.is_file() {
                tracing::warn!(file = %file.display(), "part was not produced, skipping");
                continue;
            }
            let ident = self.identify(&file)?;
            let out_dir = if self.config.output.organize {
                let bucket = DurationBucket::for_duration(ident.duration().unwrap_or_default());
                match bucket.folder() {
                    "" => final_root.clone(),
                    folder => final_root.join(folder),
                }
            } else {
                final_root.clone()
            };
            summary.absorb(self.remux_file(&file, &out_dir, temp, true, Some(ident))?);
        }

        if self.config.output.delete_after_remux {
            if let Err(e) = std::fs::remove_dir_all(root) {
                tracing::warn!(disc = %root.display(), error = %e, "cannot delete source disc");
            }
        }
        Ok(summary.finish())
    }

    fn remux_single(&self, file: &Path, temp: &Path) -> Result<Summary> {
        if file.is_dir() {
            return Err(Error::DirectoryInFileMode(file.to_path_buf()));
        }
        self.remux_file(
            file,
            &self.config.output_dir,
            temp,
            self.config.output.delete_after_remux,
            None,
        )
    }

    fn remux_directory(&self, root: &Path) -> Result<Summary> {
        if !root.is_dir() {
            return Err(Error::NotADirectory(root.to_path_buf()));
        }
        let out_root = self
            .config
            .output_dir
            .join(root.file_name().unwrap_or(root.as_os_str()));
        let mut summary = Summary::started(root);

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot read directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            self.checkpoint()?;

            let file = entry.path();
            let relative = file
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .unwrap_or_else(|| Path::new(""));
            let out_dir = out_root.join(relative);

            if is_container_file(file) {
                let delete = self.config.output.delete_after_remux;
                match self.with_workspace(|temp| self.remux_file(file, &out_dir, temp, delete, None)) {
                    Ok(part) => summary.absorb(part),
                    Err(Error::Terminated) => return Err(Error::Terminated),
                    Err(e) => tracing::error!(file = %file.display(), error = %e, "cannot remux file"),
                }
            } else if self.config.output.copy_directory_files {
                if let Err(e) = copy_into(file, &out_dir) {
                    tracing::error!(file = %file.display(), error = %e, "cannot copy file");
                }
            }
        }
        Ok(summary.finish())
    }

    /// Identify, plan, transcode and mux one container file into
    /// `{out_dir}/{stem}.mkv`.
    fn remux_file(
        &self,
        file: &Path,
        out_dir: &Path,
        temp: &Path,
        delete_source: bool,
        ident: Option<Identification>,
    ) -> Result<Summary> {
        let mut summary = Summary::started(file);
        let output = out_dir.join(format!("{}.mkv", file_stem(file)));
        if output.exists() {
            return Err(Error::OutputExists(output));
        }
        summary.size_before = std::fs::metadata(file).map(|m| m.len()).unwrap_or(0);

        let ident = match ident {
            Some(ident) => ident,
            None => self.identify(file)?,
        };
        let tracks = ident.descriptors();
        let languages = self
            .config
            .language
            .effective(ident.primary_language().as_deref());
        let mut plan = DispositionPlanner::new(&self.config.audio, languages, temp, file_stem(file))
            .plan(&tracks)?;
        for (track, modification) in tracks.iter().zip(plan.modifications()) {
            tracing::debug!(track = track.index, codec = %track.codec, language = %track.language, "{:?}", modification);
        }

        AudioTranscodePipeline::new(
            self.runner.as_ref(),
            self.config.audio.encoder_settings(),
            &self.cancel,
        )
        .run(file, &mut plan)?;

        let split = self
            .config
            .splits
            .as_deref()
            .and_then(|s| generate_split(s, ident.chapter_count() as usize));
        let cmd = final_mux(
            file,
            &output,
            &tracks,
            plan.modifications(),
            &self.config.output,
            split,
        );
        std::fs::create_dir_all(out_dir)?;

        let inv = cmd.invocation();
        tracing::info!(input = %file.display(), output = %output.display(), "muxing");
        tracing::debug!(command = %inv, "final mux");
        let result = self.runner.run(&inv, &self.cancel)?;
        if !result.exit.is_allowed(self.config.output.allowed_exit_codes()) {
            return Err(Error::execution(inv.tool(), result.exit, &output));
        }

        for modification in plan.modifications() {
            if let Modification::Replace { files, .. } = modification {
                for replacement in files {
                    if let Err(e) = std::fs::remove_file(replacement) {
                        tracing::warn!(file = %replacement.display(), error = %e, "cannot delete temp file");
                    }
                }
            }
        }
        if delete_source {
            if let Err(e) = std::fs::remove_file(file) {
                tracing::warn!(file = %file.display(), error = %e, "cannot delete source file");
            }
        }

        summary.outputs = if output.is_file() {
            vec![output]
        } else {
            split_outputs(&output)?
        };
        summary.size_after = summary
            .outputs
            .iter()
            .filter_map(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .sum();
        Ok(summary.finish())
    }

    fn identify(&self, file: &Path) -> Result<Identification> {
        self.identifier
            .identify(file)
            .map_err(|e| Error::identification(file, e))
    }
}

/// Output folder name for a disc root.
fn disc_title(root: &Path) -> String {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title = safe_filename(&name).trim().to_string();
    if title.is_empty() {
        "disc".to_string()
    } else {
        title
    }
}

fn copy_into(file: &Path, dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let name = file.file_name().unwrap_or(file.as_os_str());
    std::fs::copy(file, dir.join(name))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disc_title_is_sanitized() {
        assert_eq!(disc_title(Path::new("/rips/MOVIE: THE DISC ")), "MOVIE_ THE DISC");
        assert_eq!(disc_title(Path::new("/")), "disc");
    }

    #[test]
    fn test_summary_absorbs_parts() {
        let mut total = Summary::started(Path::new("/disc"));
        let mut part = Summary::started(Path::new("/t/a.mkv"));
        part.size_before = 10;
        part.size_after = 7;
        part.outputs = vec!["/o/a.mkv".into()];
        total.absorb(part.clone());
        total.absorb(part);
        assert_eq!(total.size_before, 20);
        assert_eq!(total.size_after, 14);
        assert_eq!(total.outputs.len(), 2);
        let total = total.finish();
        assert!(total.end >= total.start);
        assert!(total.to_string().starts_with("/disc: 20 -> 14 bytes, 2 output(s)"));
    }

    #[test]
    fn test_copy_into_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("cover.jpg");
        std::fs::write(&src, b"jpg").unwrap();
        let dest = dir.path().join("out/nested");
        copy_into(&src, &dest).unwrap();
        assert_eq!(std::fs::read(dest.join("cover.jpg")).unwrap(), b"jpg");
    }
}
