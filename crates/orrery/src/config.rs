use std::path::{Path, PathBuf};

use anyhow::Result;
use renderer::CaptureFormat;
use serde::Deserialize;

use crate::cli::{parse_capture_format, Args};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Optional `orrery.toml` file contents. Every field has a CLI counterpart
/// that takes precedence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub size: Option<String>,
    pub seed: Option<u64>,
    #[serde(default)]
    pub continuous: bool,
    #[serde(default)]
    pub preview: bool,
    pub shaders: Option<PathBuf>,
    pub capture_dir: Option<PathBuf>,
    pub capture_format: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}

/// Fully resolved launch settings (CLI over file over defaults).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub size: (u32, u32),
    pub seed: u64,
    pub continuous: bool,
    pub preview: bool,
    pub shaders: Option<PathBuf>,
    pub capture_dir: PathBuf,
    pub capture_format: CaptureFormat,
}

impl Settings {
    pub fn resolve(args: &Args, file: &FileConfig, fallback_seed: u64) -> Result<Self> {
        let size = match args.size.as_deref().or(file.size.as_deref()) {
            Some(spec) => parse_surface_size(spec)?,
            None => (1280, 720),
        };
        let capture_format = match (args.capture_format, file.capture_format.as_deref()) {
            (Some(format), _) => format,
            (None, Some(name)) => parse_capture_format(name).map_err(anyhow::Error::msg)?,
            (None, None) => CaptureFormat::Png,
        };
        Ok(Self {
            size,
            seed: args.seed.or(file.seed).unwrap_or(fallback_seed),
            continuous: args.continuous || file.continuous,
            preview: args.preview || file.preview,
            shaders: args.shaders.clone().or_else(|| file.shaders.clone()),
            capture_dir: args
                .capture_dir
                .clone()
                .or_else(|| file.capture_dir.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            capture_format,
        })
    }
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32)> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow::anyhow!("expected WxH format, e.g. 1920x1080"))?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid width in size specification"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid height in size specification"))?;

    if width == 0 || height == 0 {
        anyhow::bail!("surface dimensions must be greater than zero");
    }

    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(argv: &[&str]) -> Args {
        let mut full = vec!["orrery"];
        full.extend_from_slice(argv);
        Args::parse_from(full)
    }

    #[test]
    fn surface_size_parses_and_rejects() {
        assert_eq!(parse_surface_size("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_surface_size(" 640 X 480 ").unwrap(), (640, 480));
        assert!(parse_surface_size("1920").is_err());
        assert!(parse_surface_size("0x100").is_err());
        assert!(parse_surface_size("axb").is_err());
    }

    #[test]
    fn file_config_parses_with_defaults() {
        let config = FileConfig::from_toml_str(
            r#"
size = "800x600"
seed = 42
continuous = true
"#,
        )
        .unwrap();
        assert_eq!(config.size.as_deref(), Some("800x600"));
        assert_eq!(config.seed, Some(42));
        assert!(config.continuous);
        assert!(!config.preview);
        assert!(config.capture_dir.is_none());
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(FileConfig::from_toml_str("frames = 10").is_err());
    }

    #[test]
    fn cli_overrides_file() {
        let file = FileConfig::from_toml_str(
            r#"
size = "800x600"
seed = 42
capture_format = "jpeg"
"#,
        )
        .unwrap();
        let settings = Settings::resolve(&args(&["--size", "1024x768", "--seed", "7"]), &file, 99)
            .unwrap();
        assert_eq!(settings.size, (1024, 768));
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.capture_format, CaptureFormat::Jpeg);
    }

    #[test]
    fn fallback_seed_fills_the_gap() {
        let settings = Settings::resolve(&args(&[]), &FileConfig::default(), 1234).unwrap();
        assert_eq!(settings.seed, 1234);
        assert_eq!(settings.size, (1280, 720));
        assert_eq!(settings.capture_format, CaptureFormat::Png);
        assert_eq!(settings.capture_dir, PathBuf::from("."));
        assert!(!settings.continuous);
    }

    #[test]
    fn load_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orrery.toml");
        std::fs::write(&path, "seed = 5\npreview = true\n").unwrap();
        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.seed, Some(5));
        assert!(config.preview);
        assert!(FileConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
