use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Source of independent standard-normal draws.
pub trait NormalSource {
    fn standard_normal(&mut self) -> f64;

    fn fill(&mut self, out: &mut [f64]) {
        for z in out {
            *z = self.standard_normal();
        }
    }
}

/// Box–Muller over any uniform generator. Exact-zero uniforms are redrawn so
/// `ln(0)` never happens.
pub struct BoxMuller<R: RngCore> {
    rng: R,
    cached_normal: Option<f64>,
}

impl<R: RngCore> BoxMuller<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            cached_normal: None,
        }
    }

    fn nonzero_uniform(&mut self) -> f64 {
        loop {
            let u: f64 = self.rng.random();
            if u != 0.0 {
                return u;
            }
        }
    }
}

impl BoxMuller<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: RngCore> NormalSource for BoxMuller<R> {
    fn standard_normal(&mut self) -> f64 {
        if let Some(z) = self.cached_normal.take() {
            return z;
        }

        let u1 = self.nonzero_uniform();
        let u2 = self.nonzero_uniform();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * PI * u2;

        self.cached_normal = Some(r * theta.sin());
        r * theta.cos()
    }
}

/// Base seed for a run: the configured one, or fresh OS entropy.
pub fn base_seed(configured: Option<u64>) -> u64 {
    configured.unwrap_or_else(rand::random)
}

/// Independent per-trial seed so trials can be replayed in any order.
pub fn derive_seed(base_seed: u64, trial_id: u32) -> u64 {
    splitmix64(base_seed ^ ((trial_id as u64) << 32))
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
