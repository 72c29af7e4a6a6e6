use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Texture channels visible to every pass: one seed-noise slot plus up to
/// four feedback slots.
pub const CHANNEL_COUNT: usize = 5;

/// Maximum number of simulation passes a shader set may contain.
pub const MAX_SIMULATION_PASSES: usize = CHANNEL_COUNT - 1;

/// Logical role of a texture channel slot.
///
/// The table replaces positional unit arithmetic: slot 0 is always the static
/// seed-noise texture, slot `k + 1` is pass `k`'s feedback texture, and any
/// remaining slots are placeholders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelRole {
    SeedNoise,
    Feedback(usize),
    Unused,
}

/// Builds the channel binding table for a pass count.
pub fn channel_table(pass_count: usize) -> [ChannelRole; CHANNEL_COUNT] {
    std::array::from_fn(|slot| {
        if slot == 0 {
            ChannelRole::SeedNoise
        } else if slot <= pass_count {
            ChannelRole::Feedback(slot - 1)
        } else {
            ChannelRole::Unused
        }
    })
}

/// Channel slot the composite pass reads: the last pass's feedback texture.
pub fn composite_channel(pass_count: usize) -> usize {
    pass_count
}

/// Numeric format of a texture payload.
///
/// The two formats carry different sampling contracts: `Uint8` sources are
/// linear-filtered with a mip chain, `Float32` feedback surfaces are
/// nearest-filtered and mip-less. The bind-group layout keeps them apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Float32,
    Uint8,
}

/// CPU-side description of a texture's payload.
#[derive(Clone, Debug)]
pub struct PixelBuffer {
    /// Initial payload; `None` for GPU-resident feedback surfaces.
    pub data: Option<Vec<u8>>,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

impl PixelBuffer {
    /// Descriptor for a pass's feedback texture (no CPU payload, never read
    /// back during steady state).
    pub fn feedback(width: u32, height: u32) -> Self {
        Self {
            data: None,
            format: PixelFormat::Float32,
            width,
            height,
        }
    }

    /// Descriptor for the uploaded seed-noise texture.
    pub fn seed_noise(data: Vec<u8>, size: u32) -> Self {
        Self {
            data: Some(data),
            format: PixelFormat::Uint8,
            width: size,
            height: size,
        }
    }
}

/// Raw GLSL sources for the simulation passes and the composite pass.
#[derive(Clone, Debug)]
pub struct ShaderSet {
    pub passes: Vec<String>,
    pub composite: String,
}

impl ShaderSet {
    /// The embedded default shader set: three accumulation passes plus a
    /// tone-mapping composite.
    pub fn builtin() -> Self {
        Self {
            passes: vec![
                include_str!("../shaders/pass_0.frag").to_string(),
                include_str!("../shaders/pass_1.frag").to_string(),
                include_str!("../shaders/pass_2.frag").to_string(),
            ],
            composite: include_str!("../shaders/composite.frag").to_string(),
        }
    }

    /// Loads `pass_*.frag` (sorted by name) and `composite.frag` from a
    /// directory.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut pass_paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read shader directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.starts_with("pass_") && name.ends_with(".frag"))
                    .unwrap_or(false)
            })
            .collect();
        pass_paths.sort();

        let mut passes = Vec::with_capacity(pass_paths.len());
        for path in &pass_paths {
            passes.push(
                std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read pass shader {}", path.display()))?,
            );
        }
        let composite_path = dir.join("composite.frag");
        let composite = std::fs::read_to_string(&composite_path).with_context(|| {
            format!("failed to read composite shader {}", composite_path.display())
        })?;

        let set = Self { passes, composite };
        set.validate()?;
        Ok(set)
    }

    pub fn validate(&self) -> Result<()> {
        if self.passes.is_empty() {
            anyhow::bail!("shader set contains no simulation passes");
        }
        if self.passes.len() > MAX_SIMULATION_PASSES {
            anyhow::bail!(
                "shader set has {} passes; at most {} are supported",
                self.passes.len(),
                MAX_SIMULATION_PASSES
            );
        }
        Ok(())
    }
}

/// Output format for captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    Png,
    Jpeg,
}

impl CaptureFormat {
    pub fn extension(self) -> &'static str {
        match self {
            CaptureFormat::Png => "png",
            CaptureFormat::Jpeg => "jpg",
        }
    }
}

/// Immutable configuration passed to the renderer at start-up.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Window title, also used as the capture file prefix.
    pub title: String,
    /// GLSL sources for the simulation and composite passes.
    pub shader_set: ShaderSet,
    /// Seed for the scene RNG; equal seeds replay the same sequence of
    /// cycles.
    pub seed: u64,
    /// Start with continuous mode enabled (reseed at every cycle end).
    pub continuous: bool,
    /// Schedule a one-shot capture shortly after the first cycle completes.
    pub preview: bool,
    /// Directory captured frames are written into.
    pub capture_dir: PathBuf,
    pub capture_format: CaptureFormat,
    /// Clear color of the visible surface, typically palette-derived.
    pub clear_color: [f32; 3],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            title: "orrery".to_string(),
            shader_set: ShaderSet::builtin(),
            seed: 0,
            continuous: false,
            preview: false,
            capture_dir: PathBuf::from("."),
            capture_format: CaptureFormat::Png,
            clear_color: [0.0, 0.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_table_reserves_slot_zero_for_noise() {
        let table = channel_table(3);
        assert_eq!(table[0], ChannelRole::SeedNoise);
        assert_eq!(table[1], ChannelRole::Feedback(0));
        assert_eq!(table[2], ChannelRole::Feedback(1));
        assert_eq!(table[3], ChannelRole::Feedback(2));
        assert_eq!(table[4], ChannelRole::Unused);
    }

    #[test]
    fn composite_reads_the_last_feedback_slot() {
        let table = channel_table(3);
        assert_eq!(table[composite_channel(3)], ChannelRole::Feedback(2));
        let table = channel_table(4);
        assert_eq!(table[composite_channel(4)], ChannelRole::Feedback(3));
    }

    #[test]
    fn builtin_shader_set_is_valid() {
        let set = ShaderSet::builtin();
        assert_eq!(set.passes.len(), 3);
        set.validate().unwrap();
    }

    #[test]
    fn oversized_shader_set_is_rejected() {
        let set = ShaderSet {
            passes: vec![String::new(); MAX_SIMULATION_PASSES + 1],
            composite: String::new(),
        };
        assert!(set.validate().is_err());
    }

    #[test]
    fn feedback_descriptor_has_no_payload() {
        let buffer = PixelBuffer::feedback(640, 480);
        assert!(buffer.data.is_none());
        assert_eq!(buffer.format, PixelFormat::Float32);
        assert_eq!((buffer.width, buffer.height), (640, 480));
    }
}
