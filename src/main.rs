mod cli;

use discmux::config::{self, Config};
use discmux::{Orchestrator, Summary};
use discmux_mpls::Playlist;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Overrides `mux` applies on top of the loaded config.
struct MuxOverrides {
    mode: Option<config::Mode>,
    output: Option<PathBuf>,
    temp: Option<PathBuf>,
    split: Option<Vec<u32>>,
    main_only: bool,
    organize: bool,
    ignore_warning: bool,
}

impl MuxOverrides {
    fn apply(self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(output) = self.output {
            config.output_dir = output;
        }
        if let Some(temp) = self.temp {
            config.temp_dir = Some(temp);
        }
        if let Some(split) = self.split {
            config.splits = Some(split);
        }
        config.main_title_only |= self.main_only;
        config.output.organize |= self.organize;
        config.output.ignore_warning |= self.ignore_warning;
    }
}

async fn run_mux(config: Config, inputs: Vec<PathBuf>, json: bool) -> Result<bool> {
    let cancel = CancellationToken::new();

    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the running tool exits");
            signal_token.cancel();
        }
    });

    let config = Arc::new(config);
    let results = tokio::task::spawn_blocking(move || {
        let orchestrator = Orchestrator::with_system_tools(config, cancel);
        inputs
            .into_iter()
            .map(|input| {
                let result = orchestrator.run(&input);
                (input, result)
            })
            .collect::<Vec<_>>()
    })
    .await
    .context("Remux worker panicked")?;

    let mut all_ok = true;
    let mut summaries: Vec<Summary> = Vec::new();
    for (input, result) in results {
        match result {
            Ok(summary) => {
                if !json {
                    println!("✓ {}", summary);
                }
                summaries.push(summary);
            }
            Err(e) => {
                all_ok = false;
                tracing::error!(input = %input.display(), error = %e, "remux failed");
                eprintln!("✗ {}: {}", input.display(), e);
            }
        }
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    }
    Ok(all_ok)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "discmux=debug,discmux_av=debug,discmux_mpls=debug".to_string()
        } else {
            "discmux=info,discmux_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Mux {
            inputs,
            mode,
            output,
            temp,
            split,
            main_only,
            organize,
            ignore_warning,
            json,
        } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;
            MuxOverrides {
                mode,
                output,
                temp,
                split,
                main_only,
                organize,
                ignore_warning,
            }
            .apply(&mut config);
            config::validate_config(&config)?;

            let rt = tokio::runtime::Runtime::new()?;
            if rt.block_on(run_mux(config, inputs, json))? {
                Ok(())
            } else {
                std::process::exit(1);
            }
        }
        Commands::Playlists {
            disc,
            main_only,
            json,
        } => list_playlists(&disc, cli.config.as_deref(), main_only, json),
        Commands::Mpls { file, chapters } => show_mpls(&file, chapters),
        Commands::Tracks { file } => show_tracks(&file, cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("discmux {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn list_playlists(disc: &Path, config_path: Option<&Path>, main_only: bool, json: bool) -> Result<()> {
    let config = Arc::new(config::load_config_or_default(config_path)?);
    let orchestrator = Orchestrator::with_system_tools(config, CancellationToken::new());
    let playlists = orchestrator
        .playlists(disc, main_only)
        .with_context(|| format!("Failed to scan disc: {:?}", disc))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&playlists)?);
        return Ok(());
    }

    println!("Playlists: {}", playlists.len());
    for playlist in &playlists {
        print!(
            "  {} {:>10} bytes, {} clip(s), {} chapter(s)",
            playlist.stem(),
            playlist.size,
            playlist.clips.len(),
            playlist.chapter_count
        );
        if playlist.compressed {
            print!(" [compressed]");
        } else {
            print!(", {}s", playlist.duration.as_secs());
        }
        if !playlist.languages.is_empty() {
            print!(" ({})", playlist.languages.join(","));
        }
        println!();
    }
    Ok(())
}

fn show_mpls(file: &Path, chapters: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }
    let playlist =
        Playlist::open(file).with_context(|| format!("Failed to decode playlist: {:?}", file))?;

    if chapters {
        print!("{}", discmux_mpls::chapters::to_ogm(&playlist.chapters()));
    } else {
        println!("{}", serde_json::to_string_pretty(&playlist)?);
    }
    Ok(())
}

fn show_tracks(file: &Path, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }
    let config = Arc::new(config::load_config_or_default(config_path)?);
    let orchestrator = Orchestrator::with_system_tools(config, CancellationToken::new());
    let (tracks, modifications) = orchestrator.inspect(file)?;

    println!("File: {}", file.display());
    println!("\nTracks: {}", tracks.len());
    for (track, modification) in tracks.iter().zip(&modifications) {
        print!("  [{}] {} {} ({})", track.index, track.kind, track.codec, track.language);
        if let Some(channels) = track.channels {
            print!(" {}ch", channels);
        }
        println!(" -> {:?}", modification);
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = discmux_av::check_tools(&config.tools.paths());
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable all features.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_config(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            println!("Default config:");
            print_config(&Config::default());
        }
    }

    Ok(())
}

fn print_config(config: &Config) {
    println!("  Mode: {:?}", config.mode);
    println!("  Output: {}", config.output_dir.display());
    println!("  Languages: {}", config.language.preferred.join(","));
    println!(
        "  Audio: {} ({:?})",
        if config.audio.encode { "transcode lossless" } else { "copy" },
        config.audio.codec
    );
    if let Some(ref splits) = config.splits {
        println!("  Splits: {:?}", splits);
    }
}
