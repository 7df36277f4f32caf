/// Small seeded generator so a session replays identically for a given seed.
#[derive(Clone, Debug)]
pub struct Rng {
    seed: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        self.seed = self.seed.wrapping_add(0x6d2b79f5);
        let mut t = self.seed;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        let out = t ^ (t >> 14);
        // 24 bits keep the quotient exact in f32, so it never rounds up to 1.0.
        (out >> 8) as f32 / 16_777_216.0
    }

    /// Uniform in `[-half_extent, half_extent)`.
    pub fn jitter(&mut self, half_extent: f32) -> f32 {
        (self.next_f32() - 0.5) * 2.0 * half_extent
    }
}
