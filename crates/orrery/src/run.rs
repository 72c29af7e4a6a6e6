use std::path::Path;

use anyhow::{Context, Result};
use renderer::{Renderer, RendererConfig, ShaderSet};
use scene::palette;
use tracing_subscriber::EnvFilter;

use crate::cli::Args;
use crate::config::{FileConfig, Settings};

pub fn run(args: Args) -> Result<()> {
    initialise_tracing();

    let file = load_file_config(&args)?;
    let settings = Settings::resolve(&args, &file, rand::random())?;
    tracing::info!(
        seed = settings.seed,
        width = settings.size.0,
        height = settings.size.1,
        continuous = settings.continuous,
        "starting orrery"
    );

    let shader_set = match settings.shaders.as_deref() {
        Some(dir) => ShaderSet::from_dir(dir)
            .with_context(|| format!("failed to load shader set from {}", dir.display()))?,
        None => ShaderSet::builtin(),
    };

    let config = RendererConfig {
        surface_size: settings.size,
        title: "orrery".to_string(),
        shader_set,
        seed: settings.seed,
        continuous: settings.continuous,
        preview: settings.preview,
        capture_dir: settings.capture_dir,
        capture_format: settings.capture_format,
        clear_color: background_color(settings.seed),
    };

    Renderer::new(config).run()
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_file_config(args: &Args) -> Result<FileConfig> {
    if let Some(path) = args.config.as_ref() {
        return FileConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()));
    }
    let default_path = Path::new("orrery.toml");
    if default_path.exists() {
        return FileConfig::load(default_path).context("failed to load ./orrery.toml");
    }
    Ok(FileConfig::default())
}

/// Surface clear color: the darkest slot of the seed's palette.
fn background_color(seed: u64) -> [f32; 3] {
    let palette_seed = (seed % 360) as f32 + (seed % 997) as f32 / 997.0;
    palette::palette_color(palette_seed, 0).to_rgb()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_color_is_a_unit_rgb_triple() {
        for seed in [0u64, 1, 42, 360, 99_999, u64::MAX] {
            let color = background_color(seed);
            for component in color {
                assert!((0.0..=1.0).contains(&component), "seed {seed}: {color:?}");
            }
        }
    }

    #[test]
    fn background_color_is_deterministic_per_seed() {
        assert_eq!(background_color(17), background_color(17));
    }
}
