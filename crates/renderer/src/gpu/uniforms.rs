use bytemuck::{Pod, Zeroable};
use scene::{SceneParams, PARAM_TRIPLETS};

use crate::runtime::FrameTimes;

/// Per-frame uniform block, written once per tick and shared by every pass.
///
/// Layout must match the `FrameBlock` declaration in `compile.rs` (std140).
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub(crate) struct FrameUniforms {
    /// xy: surface size in pixels, z: 1.0, w: unused.
    pub i_resolution: [f32; 4],
    /// Fixed-step simulation time in milliseconds.
    pub i_time: f32,
    /// Wall-clock seconds since the Unix epoch.
    pub i_global_time: f32,
    /// Current frame index within the cycle.
    pub i_frame: i32,
    pub _pad: f32,
}

unsafe impl Zeroable for FrameUniforms {}
unsafe impl Pod for FrameUniforms {}

impl FrameUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            i_resolution: [width as f32, height as f32, 1.0, 0.0],
            i_time: 0.0,
            i_global_time: 0.0,
            i_frame: 0,
            _pad: 0.0,
        }
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.i_resolution[0] = width as f32;
        self.i_resolution[1] = height as f32;
    }

    pub fn resolution(&self) -> (f32, f32) {
        (self.i_resolution[0], self.i_resolution[1])
    }

    pub fn set_tick(&mut self, times: FrameTimes, frame: u32) {
        self.i_time = times.sim_time;
        self.i_global_time = times.global_seconds;
        self.i_frame = frame as i32;
    }
}

/// Cycle-constant uniform block, written once at frame 0 of each cycle.
///
/// The parameter triplets are padded to vec4 stride because std140 gives
/// `vec3[]` a 16-byte element stride. Layout must match `CycleBlock` in
/// `compile.rs`.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub(crate) struct CycleUniforms {
    pub params: [[f32; 4]; PARAM_TRIPLETS],
    pub frame_count: i32,
    pub _pad: [f32; 3],
}

unsafe impl Zeroable for CycleUniforms {}
unsafe impl Pod for CycleUniforms {}

impl CycleUniforms {
    pub fn new(params: &SceneParams, frame_count: u32) -> Self {
        let floats = params.as_floats();
        let mut packed = [[0.0f32; 4]; PARAM_TRIPLETS];
        for (slot, triplet) in packed.iter_mut().enumerate() {
            let base = slot * 3;
            triplet[0] = floats[base];
            triplet[1] = floats[base + 1];
            triplet[2] = floats[base + 2];
        }
        Self {
            params: packed,
            frame_count: frame_count as i32,
            _pad: [0.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn block_sizes_match_std140() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 32);
        // 14 vec4-strided triplets plus the frame count and tail padding.
        assert_eq!(std::mem::size_of::<CycleUniforms>(), 240);
    }

    #[test]
    fn resolution_updates_in_place() {
        let mut uniforms = FrameUniforms::new(800, 600);
        assert_eq!(uniforms.resolution(), (800.0, 600.0));
        assert_eq!(uniforms.i_resolution[2], 1.0);
        uniforms.set_resolution(1920, 1080);
        assert_eq!(uniforms.resolution(), (1920.0, 1080.0));
    }

    #[test]
    fn tick_values_land_in_the_block() {
        let mut uniforms = FrameUniforms::new(64, 64);
        uniforms.set_tick(
            FrameTimes {
                global_seconds: 123.5,
                sim_time: 160.0,
            },
            10,
        );
        assert_eq!(uniforms.i_time, 160.0);
        assert_eq!(uniforms.i_global_time, 123.5);
        assert_eq!(uniforms.i_frame, 10);
    }

    #[test]
    fn cycle_block_packs_triplets_at_vec4_stride() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut params = SceneParams::zeroed();
        params.reseed(&mut rng);
        let block = CycleUniforms::new(&params, 142);
        assert_eq!(block.frame_count, 142);
        let floats = params.as_floats();
        for slot in 0..PARAM_TRIPLETS {
            assert_eq!(block.params[slot][0], floats[slot * 3]);
            assert_eq!(block.params[slot][1], floats[slot * 3 + 1]);
            assert_eq!(block.params[slot][2], floats[slot * 3 + 2]);
            assert_eq!(block.params[slot][3], 0.0);
        }
    }
}
