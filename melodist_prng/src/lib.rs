// Seeded, portable random stream for note generation.
//
// xoshiro256++ (Blackman & Vigna, 2019) expanded from a `u64` seed with
// SplitMix64. The generator implements `rand_core::RngCore` and
// `SeedableRng`, so the sampler and sequence generator in `melodist` can be
// written against `rand::Rng` while every request still gets a stream that
// is reproducible from its seed on every platform.
//
// One `NoteRng` belongs to exactly one generation request. Nothing in this
// crate is shared between requests; the composer builds a fresh instance per
// call (see `melodist::compose`).
//
// **Critical constraint: determinism.** Output depends only on the seed and
// the number of prior draws. No floating point in the core step.

use rand_core::{RngCore, SeedableRng, impls};
use serde::{Deserialize, Serialize};

/// Xoshiro256++ state owned by a single generation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRng {
    s: [u64; 4],
}

impl NoteRng {
    /// Create a generator from a `u64` seed.
    ///
    /// Two generators built from the same seed yield identical streams.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    fn step(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }
}

impl RngCore for NoteRng {
    fn next_u32(&mut self) -> u32 {
        (self.step() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.step()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        impls::fill_bytes_via_next(self, dst);
    }
}

impl SeedableRng for NoteRng {
    type Seed = [u8; 32];

    /// Use the raw 256-bit seed as state. The all-zero state is a fixed point
    /// of xoshiro, so it is remapped through SplitMix64 instead.
    fn from_seed(seed: Self::Seed) -> Self {
        let mut s = [0u64; 4];
        for (word, chunk) in s.iter_mut().zip(seed.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *word = u64::from_le_bytes(bytes);
        }
        if s.iter().all(|&w| w == 0) {
            return Self::new(0);
        }
        Self { s }
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}

/// SplitMix64 step, used only to expand a `u64` seed into xoshiro state.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
