//! Lossless audio transcode: demux, dedup by content hash, bounded encode.
//!
//! The three phases are strict barriers. Every intermediate file exists
//! before any hash is taken, and every duplicate is demoted before any
//! encode starts, so no job ever encodes content that later turns out to
//! be a duplicate.

use crate::disposition::{TrackPlan, TranscodeJob};
use crate::error::{Error, Result};
use discmux_av::encode::encode_audio;
use discmux_av::ffmpeg::{demux_audio, DemuxTarget};
use discmux_av::hash::content_hash;
use discmux_av::{EncoderSettings, ToolRunner};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use tokio_util::sync::CancellationToken;

/// Maximum number of encodes running at once.
pub const ENCODE_WORKERS: usize = 4;

pub struct AudioTranscodePipeline<'a> {
    runner: &'a dyn ToolRunner,
    settings: EncoderSettings,
    cancel: &'a CancellationToken,
    workers: usize,
}

impl<'a> AudioTranscodePipeline<'a> {
    pub fn new(
        runner: &'a dyn ToolRunner,
        settings: EncoderSettings,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            runner,
            settings,
            cancel,
            workers: ENCODE_WORKERS,
        }
    }

    /// Produce every replacement file `plan` refers to.
    ///
    /// Duplicates are demoted to `Remove` in `plan`. Returns
    /// [`Error::Terminated`] when cancellation fired before the encode
    /// barrier was passed.
    pub fn run(&self, source: &Path, plan: &mut TrackPlan) -> Result<()> {
        let jobs = plan.take_jobs();
        if jobs.is_empty() {
            return Ok(());
        }

        self.demux(source, &jobs)?;
        let jobs = dedup(plan, jobs)?;
        self.encode(jobs)?;

        if self.cancel.is_cancelled() {
            return Err(Error::Terminated);
        }
        Ok(())
    }

    fn demux(&self, source: &Path, jobs: &[TranscodeJob]) -> Result<()> {
        let targets: Vec<DemuxTarget> = jobs
            .iter()
            .map(|job| DemuxTarget {
                track_index: job.track_id,
                downmix: job.downmix,
                output: job.intermediate.clone(),
            })
            .collect();
        let inv = demux_audio(source, &targets);
        tracing::info!(command = %inv, "extracting audio");

        let output = self.runner.run(&inv, self.cancel)?;
        if !output.exit.is_allowed(&[0]) {
            return Err(Error::execution(inv.tool(), output.exit, source));
        }
        Ok(())
    }

    fn encode(&self, jobs: Vec<TranscodeJob>) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }
        let workers = self.workers.min(jobs.len());

        let (tx, rx) = mpsc::channel();
        for job in jobs {
            if tx.send(job).is_err() {
                break;
            }
        }
        drop(tx);

        let queue = Mutex::new(rx);
        let failures = Mutex::new(Vec::new());
        thread::scope(|s| {
            for worker in 0..workers {
                let queue = &queue;
                let failures = &failures;
                s.spawn(move || self.work(worker, queue, failures));
            }
        });

        match failures.into_inner().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn work(
        &self,
        worker: usize,
        queue: &Mutex<mpsc::Receiver<TranscodeJob>>,
        failures: &Mutex<Vec<Error>>,
    ) {
        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!(worker, "cancelled, dropping queued encodes");
                return;
            }
            let Ok(job) = queue.lock().recv() else {
                return;
            };

            let inv = encode_audio(&self.settings, &job.intermediate, &job.output, job.channels);
            tracing::info!(worker, command = %inv, "encoding");
            match self.runner.run(&inv, self.cancel) {
                Ok(output) if output.exit.is_allowed(&[0]) => {
                    remove_file_if_exists(&job.intermediate);
                }
                Ok(output) => {
                    tracing::error!(worker, output = %job.output.display(), "encode failed: {}", output.stderr.trim());
                    failures
                        .lock()
                        .push(Error::execution(inv.tool(), output.exit, &job.output));
                }
                Err(discmux_av::Error::Cancelled) => return,
                Err(e) => failures.lock().push(e.into()),
            }
        }
    }
}

/// Collapse jobs whose intermediates hash equal.
///
/// Within each group the earliest job whose track is still a live
/// replacement survives; the tracks of the others are demoted and their
/// files deleted. Returns the jobs still owned by a live replacement.
fn dedup(plan: &mut TrackPlan, jobs: Vec<TranscodeJob>) -> Result<Vec<TranscodeJob>> {
    let mut first_seen: HashMap<String, usize> = HashMap::new();

    for (idx, job) in jobs.iter().enumerate() {
        if !plan.is_replace(job.position) {
            continue;
        }
        let hash = content_hash(&job.intermediate).map_err(|source| Error::Hash {
            path: job.intermediate.clone(),
            source,
        })?;

        match first_seen.get(&hash).map(|&kept| &jobs[kept]) {
            Some(kept) if plan.is_replace(kept.position) && kept.position != job.position => {
                tracing::info!(
                    track = job.track_id,
                    duplicate_of = kept.track_id,
                    "removing duplicate audio track"
                );
                for file in plan.demote_to_remove(job.position) {
                    remove_file_if_exists(&file);
                }
            }
            Some(kept) if kept.position == job.position => {}
            _ => {
                first_seen.insert(hash, idx);
            }
        }
    }

    let (live, dropped): (Vec<_>, Vec<_>) = jobs
        .into_iter()
        .partition(|job| plan.is_replace(job.position));
    for job in dropped {
        remove_file_if_exists(&job.intermediate);
        remove_file_if_exists(&job.output);
    }
    Ok(live)
}

fn remove_file_if_exists(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot remove file"),
    }
}
