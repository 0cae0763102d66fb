use clap::{Parser, Subcommand};
use discmux::config::Mode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "discmux")]
#[command(author, version, about = "Batch remuxer for ripped discs and media containers")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remux discs, files or directories
    Mux {
        /// Inputs to process, one after another
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// How inputs are interpreted (overrides config)
        #[arg(short, long, value_enum)]
        mode: Option<Mode>,

        /// Output directory (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Parent directory for temporary files
        #[arg(long)]
        temp: Option<PathBuf>,

        /// Chapter counts per output, e.g. 2,3
        #[arg(long, value_delimiter = ',')]
        split: Option<Vec<u32>>,

        /// Only remux the main title of a disc
        #[arg(long)]
        main_only: bool,

        /// Sort disc outputs into folders by duration
        #[arg(long)]
        organize: bool,

        /// Treat mkvmerge warnings as success
        #[arg(long)]
        ignore_warning: bool,

        /// Print summaries as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the playlists of a disc after dedup
    Playlists {
        /// Disc root (the directory containing BDMV)
        #[arg(required = true)]
        disc: PathBuf,

        /// Only the main title
        #[arg(long)]
        main_only: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode a single .mpls playlist
    Mpls {
        #[arg(required = true)]
        file: PathBuf,

        /// Print OGM chapter text instead
        #[arg(long)]
        chapters: bool,
    },

    /// Identify a file and show what would happen to each track
    Tracks {
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
