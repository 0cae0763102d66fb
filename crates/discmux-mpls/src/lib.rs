//! discmux-mpls: Blu-ray movie playlist (`.mpls`) parsing.
//!
//! A disc's `BDMV/PLAYLIST` folder holds one binary playlist per title. Each
//! playlist lists play items (a clip id plus an in/out range on the 45 kHz
//! presentation clock), the elementary streams each item carries, and a mark
//! table whose entry marks are the title's chapters.
//!
//! # Modules
//!
//! - `playlist` - header, play item, stream and mark decoding
//! - `stream` - stream coding types and their attributes
//! - `chapters` - chapter timestamps and OGM chapter text export
//!
//! # Example
//!
//! ```no_run
//! use discmux_mpls::Playlist;
//!
//! let playlist = Playlist::open("/disc/BDMV/PLAYLIST/00800.mpls")?;
//! for item in &playlist.items {
//!     println!("{} {}", item.clip_id, item.duration());
//! }
//! println!("{}", discmux_mpls::chapters::to_ogm(&playlist.chapters()));
//! # Ok::<(), discmux_mpls::Error>(())
//! ```

pub mod chapters;
pub mod error;
pub mod playlist;
mod reader;
pub mod stream;

pub use error::{Error, Result};
pub use playlist::{Mark, PlayItem, Playlist};
pub use stream::{Stream, StreamCodec, StreamTable};
