use std::path::PathBuf;

use clap::Parser;
use renderer::CaptureFormat;

#[derive(Parser, Debug)]
#[command(
    name = "orrery",
    author,
    version,
    about = "Progressive sphere-system feedback renderer",
    arg_required_else_help = false
)]
pub struct Args {
    /// Override the window resolution (e.g. `1920x1080`).
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    pub size: Option<String>,

    /// Seed for the scene RNG; a random seed is drawn when omitted.
    #[arg(long, value_name = "SEED", env = "ORRERY_SEED")]
    pub seed: Option<u64>,

    /// Start in continuous mode (reseed automatically at every cycle end).
    #[arg(long)]
    pub continuous: bool,

    /// Capture a preview frame shortly after the first cycle completes.
    #[arg(long)]
    pub preview: bool,

    /// Directory with `pass_*.frag` and `composite.frag` overriding the
    /// built-in shader set.
    #[arg(long, value_name = "DIR")]
    pub shaders: Option<PathBuf>,

    /// Path to an `orrery.toml` configuration file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory captured frames are written into.
    #[arg(long, value_name = "DIR")]
    pub capture_dir: Option<PathBuf>,

    /// Capture file format: `png` or `jpeg`.
    #[arg(long, value_name = "FORMAT", value_parser = parse_capture_format)]
    pub capture_format: Option<CaptureFormat>,
}

pub(crate) fn parse_capture_format(value: &str) -> Result<CaptureFormat, String> {
    match value.to_ascii_lowercase().as_str() {
        "png" => Ok(CaptureFormat::Png),
        "jpg" | "jpeg" => Ok(CaptureFormat::Jpeg),
        other => Err(format!(
            "unsupported capture format '{other}' (expected png or jpeg)"
        )),
    }
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_format_accepts_common_spellings() {
        assert_eq!(parse_capture_format("png"), Ok(CaptureFormat::Png));
        assert_eq!(parse_capture_format("PNG"), Ok(CaptureFormat::Png));
        assert_eq!(parse_capture_format("jpg"), Ok(CaptureFormat::Jpeg));
        assert_eq!(parse_capture_format("jpeg"), Ok(CaptureFormat::Jpeg));
        assert!(parse_capture_format("webp").is_err());
    }

    #[test]
    fn flags_parse() {
        let args = Args::parse_from([
            "orrery",
            "--size",
            "1920x1080",
            "--seed",
            "7",
            "--continuous",
            "--preview",
        ]);
        assert_eq!(args.size.as_deref(), Some("1920x1080"));
        assert_eq!(args.seed, Some(7));
        assert!(args.continuous);
        assert!(args.preview);
    }
}
