mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./discmux.toml",
        "~/.config/discmux/config.toml",
        "/etc/discmux/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.audio.bitrate_per_channel == 0 {
        anyhow::bail!("audio.bitrate_per_channel cannot be 0");
    }

    if let Some(splits) = &config.splits {
        if splits.is_empty() {
            anyhow::bail!("splits cannot be an empty list");
        }
        if splits.contains(&0) {
            anyhow::bail!("splits cannot contain a zero chapter count");
        }
    }

    for lang in config
        .language
        .preferred
        .iter()
        .chain(config.language.excluded.iter())
    {
        if lang.len() != 3 || !lang.chars().all(|c| c.is_ascii_lowercase()) {
            anyhow::bail!("'{}' is not a 3-letter language code", lang);
        }
    }

    if let Some(temp) = &config.temp_dir {
        if !temp.exists() {
            tracing::warn!("Temp directory does not exist yet: {:?}", temp);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.mode, Mode::Movie);
        assert_eq!(config.language.preferred, vec!["und", "chi", "jpn"]);
        assert!(config.audio.encode);
        assert_eq!(config.audio.bitrate_per_channel, 128);
        assert_eq!(config.output.allowed_exit_codes(), &[0]);
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_full_file() {
        let config: Config = toml::from_str(
            r#"
            output_dir = "/out"
            mode = "episodes"
            splits = [2, 3]

            [language]
            preferred = ["eng"]
            excluded = ["chi"]

            [audio]
            codec = "opus"
            encoder = "ffmpeg"
            remove_extra_dts = true

            [output]
            ignore_warning = true
            playlist_backend = "mkvmerge"

            [tools]
            mkvmerge_path = "/opt/mkvtoolnix/mkvmerge"
            "#,
        )
        .unwrap();
        assert_eq!(config.mode, Mode::Episodes);
        assert_eq!(config.splits, Some(vec![2, 3]));
        assert_eq!(config.audio.codec, discmux_av::AudioCodec::Opus);
        assert!(config.audio.remove_extra_dts);
        assert_eq!(config.output.allowed_exit_codes(), &[0, 1]);
        assert_eq!(config.output.playlist_backend, PlaylistBackend::Mkvmerge);
        assert!(config.tools.paths().mkvmerge.is_some());
    }

    #[test]
    fn test_effective_languages() {
        let lang = LanguageConfig {
            preferred: vec!["eng".into(), "chi".into()],
            excluded: vec!["chi".into(), "und".into()],
        };
        let set = lang.effective(Some("fra"));
        let expected: Vec<&str> = vec!["eng", "fra", "und"];
        assert_eq!(set.iter().map(String::as_str).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.splits = Some(vec![2, 0]);
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.language.preferred = vec!["english".into()];
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.audio.bitrate_per_channel = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("discmux.toml");
        std::fs::write(&path, "main_title_only = true\n").unwrap();
        let config = load_config(&path).unwrap();
        assert!(config.main_title_only);

        std::fs::write(&path, "splits = []\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
