//! Static seed-noise texture content sampled by every simulation pass at
//! channel 0.

use crate::Entropy;

/// Edge length of the square RGBA8 seed-noise texture.
pub const SEED_NOISE_SIZE: u32 = 256;

/// Generates the RGBA8 payload for the seed-noise texture.
///
/// The red and green channels share one draw scattered to two correlated
/// positions (a diagonal offset of 37, 17 pixels), which gives the shaders a
/// cheap way to sample decorrelated-but-related values from one texture. Blue
/// and alpha are independent draws.
pub fn seed_noise<E: Entropy + ?Sized>(entropy: &mut E) -> Vec<u8> {
    let n = SEED_NOISE_SIZE as usize;
    let mut data = vec![0u8; n * n * 4];
    for y in 0..n {
        for x in 0..n {
            let off = (y * n + x) * 4;
            let off2 = (((y + 17) % n) * n + (x + 37) % n) * 4;
            let value = (256.0 * entropy.next_unit()) as u8;
            data[off] = value;
            data[off2 + 1] = value;
            data[off + 2] = (256.0 * entropy.next_unit()) as u8;
            data[off + 3] = (256.0 * entropy.next_unit()) as u8;
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn payload_has_texture_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let data = seed_noise(&mut rng);
        assert_eq!(data.len(), (SEED_NOISE_SIZE * SEED_NOISE_SIZE * 4) as usize);
    }

    #[test]
    fn deterministic_for_a_fixed_seed() {
        let a = seed_noise(&mut StdRng::seed_from_u64(99));
        let b = seed_noise(&mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
        let c = seed_noise(&mut StdRng::seed_from_u64(100));
        assert_ne!(a, c);
    }

    #[test]
    fn green_channel_mirrors_red_at_the_scatter_offset() {
        let data = seed_noise(&mut StdRng::seed_from_u64(4));
        let n = SEED_NOISE_SIZE as usize;
        for (x, y) in [(0usize, 0usize), (12, 200), (255, 255)] {
            let off = (y * n + x) * 4;
            let off2 = (((y + 17) % n) * n + (x + 37) % n) * 4;
            assert_eq!(data[off], data[off2 + 1]);
        }
    }
}
