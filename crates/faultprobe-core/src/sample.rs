//! Percent sampling for the probability gate.
//!
//! Unseeded samplers draw from the thread-local RNG. A seeded sampler is
//! reproducible: draw `n` comes from ChaCha stream `n` keyed by the seed, so
//! the sequence of verdicts depends only on the seed and the order of draws,
//! and concurrent callers never contend on shared RNG state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

#[derive(Debug, Default)]
pub struct Sampler {
    seeded: AtomicBool,
    seed: AtomicU64,
    draws: AtomicU64,
}

impl Sampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: u64) -> Self {
        let s = Self::new();
        s.set_seed(Some(seed));
        s
    }

    pub fn seed(&self) -> Option<u64> {
        self.seeded
            .load(Ordering::Acquire)
            .then(|| self.seed.load(Ordering::Relaxed))
    }

    /// Switch between seeded and thread-RNG sampling. Reseeding restarts the
    /// draw sequence.
    pub fn set_seed(&self, seed: Option<u64>) {
        match seed {
            Some(seed) => {
                self.seed.store(seed, Ordering::Relaxed);
                self.draws.store(0, Ordering::Relaxed);
                self.seeded.store(true, Ordering::Release);
            }
            None => self.seeded.store(false, Ordering::Release),
        }
    }

    /// Uniform draw in `[0, 100)`.
    pub fn percent(&self) -> u32 {
        if self.seeded.load(Ordering::Acquire) {
            let n = self.draws.fetch_add(1, Ordering::Relaxed);
            let mut rng = ChaCha20Rng::seed_from_u64(self.seed.load(Ordering::Relaxed));
            rng.set_stream(n);
            rng.gen_range(0..100)
        } else {
            rand::thread_rng().gen_range(0..100)
        }
    }
}
