//! discmux - remux engine for ripped Blu-ray discs and media containers
//!
//! A run turns each input into Matroska files that keep only the wanted
//! languages, with lossless audio transcoded and duplicate tracks dropped.
//!
//! - [`catalog`] lists and deduplicates a disc's playlists
//! - [`tasks`] turns a playlist into mkvmerge work with fallbacks
//! - [`executor`] runs that work through its fallback state machine
//! - [`disposition`] decides what happens to every track of a file
//! - [`transcode`] demuxes, deduplicates and encodes audio in parallel
//! - [`remux`] builds the final mux command
//! - [`orchestrator`] ties the above together per input mode
//!
//! This library crate exposes the engine for the CLI and for integration
//! testing with fake tools.

pub mod catalog;
pub mod config;
pub mod disposition;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod remux;
pub mod tasks;
pub mod transcode;

pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, Summary};
