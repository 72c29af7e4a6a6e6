use glam::Vec3;
use rand::Rng;

pub mod math;
pub mod noise;
pub mod palette;

/// Number of parameter triplets in a scene description.
pub const PARAM_TRIPLETS: usize = 14;
/// Flat float count of [`SceneParams`] (14 triplets).
pub const PARAM_FLOATS: usize = PARAM_TRIPLETS * 3;

/// Inclusive lower bound for a cycle's frame count.
pub const FRAME_COUNT_MIN: u32 = 100;
/// Exclusive upper bound for a cycle's frame count.
pub const FRAME_COUNT_MAX: u32 = 200;

/// Uniform random source in `[0, 1)`.
///
/// Every draw the scene makes goes through this trait so tests can substitute
/// a deterministic source for the process RNG.
pub trait Entropy {
    fn next_unit(&mut self) -> f32;
}

impl<R: Rng> Entropy for R {
    fn next_unit(&mut self) -> f32 {
        self.gen::<f32>()
    }
}

/// The 42-float parameter vector shared by every simulation pass.
///
/// Slot 0 carries the global radius/scale scalars, slots 1..8 the sphere
/// chain. Regenerated wholesale by [`SceneParams::reseed`]; read-only for the
/// rest of a cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneParams {
    values: [f32; PARAM_FLOATS],
}

impl SceneParams {
    pub fn zeroed() -> Self {
        Self {
            values: [0.0; PARAM_FLOATS],
        }
    }

    /// Repopulates every slot from fresh entropy and derives the sphere chain.
    ///
    /// Slot 2 is pinned at the origin. Slots 3..7 are placed by
    /// spherical-to-Cartesian conversion at hand-chosen angles, with a radius
    /// of `global + satellite + jitter * global` where the jitter is the
    /// slot's own raw y draw read before the overwrite. The order of reads and
    /// writes here is load-bearing for reproducibility.
    pub fn reseed<E: Entropy + ?Sized>(&mut self, entropy: &mut E) {
        for value in self.values.iter_mut() {
            *value = entropy.next_unit();
        }

        // Sphere radii: global scalar plus five satellite scalars.
        self.values[0] = self.values[0] * 2.0 + 2.0;
        for index in 1..=5 {
            self.values[index] *= 2.0;
        }

        // Sphere positions: a chain anchored at the origin.
        self.set_triplet(2, Vec3::ZERO);
        const CHAIN: [(usize, usize, f32, f32); 5] = [
            // (slot, satellite radius index, phi, theta)
            (3, 1, 1.0, 2.0),
            (4, 2, 4.0, 3.0),
            (5, 3, 5.0, 4.0),
            (6, 4, 6.0, 5.0),
            (7, 5, 7.0, 6.0),
        ];
        for (slot, satellite, phi, theta) in CHAIN {
            let jitter = self.values[slot * 3 + 1];
            let radius = self.values[0] + self.values[satellite] + jitter * self.values[0];
            self.set_triplet(slot, math::spherical_to_xyz(radius, phi, theta));
        }
    }

    pub fn as_floats(&self) -> &[f32; PARAM_FLOATS] {
        &self.values
    }

    pub fn triplet(&self, slot: usize) -> Vec3 {
        let base = slot * 3;
        Vec3::new(self.values[base], self.values[base + 1], self.values[base + 2])
    }

    fn set_triplet(&mut self, slot: usize, value: Vec3) {
        let base = slot * 3;
        self.values[base] = value.x;
        self.values[base + 1] = value.y;
        self.values[base + 2] = value.z;
    }

    /// Sphere centers and radii as `[x, y, z, r]` rows for CPU-side picking.
    ///
    /// The central sphere (slot 2) uses the global radius scalar; satellites
    /// at slots 3..7 use their per-sphere scalars.
    pub fn sphere_table(&self) -> Vec<[f32; 4]> {
        (2..=7)
            .map(|slot| {
                let center = self.triplet(slot);
                let radius = if slot == 2 {
                    self.values[0]
                } else {
                    self.values[slot - 2]
                };
                [center.x, center.y, center.z, radius]
            })
            .collect()
    }
}

/// Result of advancing the cycle by one rendered frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleEvent {
    /// Still accumulating inside the current cycle.
    Accumulating,
    /// The cycle wrapped and the scene halted, waiting for an external reseed.
    Completed,
    /// The cycle wrapped and continuous mode immediately reseeded.
    Reseeded,
}

/// Progressive-cycle state machine plus the scene parameters it governs.
///
/// The frame index strictly increases 0..frame_count-1 and wraps; a wrap
/// either halts (single-cycle mode) or reseeds in place (continuous mode).
/// `frame_count` is fixed at reseed time and never changes mid-cycle.
#[derive(Clone, Debug)]
pub struct Scene {
    params: SceneParams,
    frame: u32,
    frame_count: u32,
    continuous: bool,
    halted: bool,
}

impl Scene {
    pub fn new<E: Entropy + ?Sized>(entropy: &mut E) -> Self {
        let mut scene = Self {
            params: SceneParams::zeroed(),
            frame: 0,
            frame_count: FRAME_COUNT_MIN,
            continuous: false,
            halted: false,
        };
        scene.reseed(entropy);
        scene
    }

    /// Regenerates the parameter vector, picks a fresh frame count in
    /// [100, 200) and restarts accumulation at frame 0.
    pub fn reseed<E: Entropy + ?Sized>(&mut self, entropy: &mut E) {
        self.frame = 0;
        self.halted = false;
        self.params.reseed(entropy);
        self.frame_count = FRAME_COUNT_MIN + (entropy.next_unit() * 100.0).floor() as u32;
    }

    /// Advances past the frame that was just drawn.
    pub fn advance<E: Entropy + ?Sized>(&mut self, entropy: &mut E) -> CycleEvent {
        self.frame = (self.frame + 1) % self.frame_count;
        if self.frame != 0 {
            return CycleEvent::Accumulating;
        }
        if self.continuous {
            self.reseed(entropy);
            CycleEvent::Reseeded
        } else {
            self.halted = true;
            CycleEvent::Completed
        }
    }

    /// Restarts accumulation without regenerating parameters (resize path).
    pub fn reset_frame(&mut self) {
        self.frame = 0;
        self.halted = false;
    }

    /// Flips continuous mode. Takes effect at the next wrap; the current
    /// cycle's frame count is untouched.
    pub fn toggle_continuous(&mut self) {
        self.continuous = !self.continuous;
    }

    pub fn params(&self) -> &SceneParams {
        &self.params
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn continuous(&self) -> bool {
        self.continuous
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Entropy source that returns the same value for every draw.
    struct ConstEntropy(f32);

    impl Entropy for ConstEntropy {
        fn next_unit(&mut self) -> f32 {
            self.0
        }
    }

    #[test]
    fn frame_index_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut scene = Scene::new(&mut rng);
        scene.toggle_continuous();
        for _ in 0..1000 {
            assert!(scene.frame() < scene.frame_count());
            let before = scene.frame();
            let event = scene.advance(&mut rng);
            match event {
                CycleEvent::Accumulating => assert_eq!(scene.frame(), before + 1),
                CycleEvent::Reseeded => assert_eq!(scene.frame(), 0),
                CycleEvent::Completed => unreachable!("continuous mode never halts"),
            }
        }
    }

    #[test]
    fn wrap_halts_outside_continuous_mode() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut scene = Scene::new(&mut rng);
        let count = scene.frame_count();
        for frame in 1..count {
            assert_eq!(scene.advance(&mut rng), CycleEvent::Accumulating);
            assert_eq!(scene.frame(), frame);
        }
        assert_eq!(scene.advance(&mut rng), CycleEvent::Completed);
        assert!(scene.is_halted());
        assert_eq!(scene.frame(), 0);

        scene.reseed(&mut rng);
        assert!(!scene.is_halted());
    }

    #[test]
    fn frame_count_always_in_cycle_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut scene = Scene::new(&mut rng);
        for _ in 0..500 {
            scene.reseed(&mut rng);
            assert!(scene.frame_count() >= FRAME_COUNT_MIN);
            assert!(scene.frame_count() < FRAME_COUNT_MAX);
        }
    }

    #[test]
    fn reseed_overwrites_every_slot() {
        let mut params = SceneParams::zeroed();
        params.reseed(&mut ConstEntropy(0.25));
        let first = *params.as_floats();

        // A different entropy stream must leave no slot at its old value
        // untouched by the structured overwrites.
        params.reseed(&mut ConstEntropy(0.75));
        let second = *params.as_floats();
        for (slot, (a, b)) in first.iter().zip(second.iter()).enumerate() {
            // Slot 2 is pinned at the origin in both runs.
            if (6..9).contains(&slot) {
                assert_eq!(*a, 0.0);
                assert_eq!(*b, 0.0);
            } else {
                assert_ne!(a, b, "slot {slot} survived a reseed");
            }
        }
    }

    #[test]
    fn half_entropy_reproduces_reference_chain() {
        let mut params = SceneParams::zeroed();
        params.reseed(&mut ConstEntropy(0.5));
        let values = params.as_floats();

        // Global radius scalar: 0.5 * 2 + 2.
        assert_eq!(values[0], 3.0);
        // Satellite radii: 0.5 * 2.
        for index in 1..=5 {
            assert_eq!(values[index], 1.0);
        }
        // Central sphere sits at the origin.
        assert_eq!(params.triplet(2), Vec3::ZERO);

        // First chained center: r = 3 + 1 + 0.5 * 3, phi = 1, theta = 2.
        let expected = math::spherical_to_xyz(5.5, 1.0, 2.0);
        let center = params.triplet(3);
        assert!((center - expected).length() < 1.0e-6);

        // Remaining satellites share the same radius under constant entropy.
        for (slot, (phi, theta)) in [(4, (4.0, 3.0)), (5, (5.0, 4.0)), (6, (6.0, 5.0)), (7, (7.0, 6.0))] {
            let expected = math::spherical_to_xyz(5.5, phi, theta);
            assert!((params.triplet(slot) - expected).length() < 1.0e-6);
        }
    }

    #[test]
    fn half_entropy_frame_count() {
        let mut scene = Scene::new(&mut ConstEntropy(0.5));
        assert_eq!(scene.frame_count(), 150);
        scene.reseed(&mut ConstEntropy(0.999_999));
        assert_eq!(scene.frame_count(), 199);
    }

    #[test]
    fn toggle_mid_cycle_keeps_current_frame_count() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut scene = Scene::new(&mut rng);
        let count = scene.frame_count();
        for _ in 0..10 {
            let _ = scene.advance(&mut rng);
        }
        scene.toggle_continuous();
        assert_eq!(scene.frame_count(), count);
        assert_eq!(scene.frame(), 10);

        // The flag only matters at the wrap: the cycle now reseeds instead of
        // halting.
        for _ in 10..count - 1 {
            assert_eq!(scene.advance(&mut rng), CycleEvent::Accumulating);
        }
        assert_eq!(scene.advance(&mut rng), CycleEvent::Reseeded);
        assert!(!scene.is_halted());
    }

    #[test]
    fn reset_frame_keeps_params() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut scene = Scene::new(&mut rng);
        let params = scene.params().clone();
        let count = scene.frame_count();
        for _ in 0..17 {
            let _ = scene.advance(&mut rng);
        }
        scene.reset_frame();
        assert_eq!(scene.frame(), 0);
        assert_eq!(scene.frame_count(), count);
        assert_eq!(scene.params(), &params);
    }

    #[test]
    fn sphere_table_rows_pair_centers_with_radii() {
        let mut params = SceneParams::zeroed();
        params.reseed(&mut ConstEntropy(0.5));
        let table = params.sphere_table();
        assert_eq!(table.len(), 6);
        assert_eq!(table[0], [0.0, 0.0, 0.0, 3.0]);
        for row in &table[1..] {
            assert_eq!(row[3], 1.0);
        }
    }
}
