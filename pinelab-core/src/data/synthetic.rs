//! Seeded synthetic 1-minute bars for tests, sweeps and the CLI demo path.
//!
//! Deliberately simple: a Gaussian random walk on the close with uniform
//! high/low spreads, matching the shape real 1m crypto/equity data takes
//! after ingestion. Deterministic per seed.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::OhlcvFrame;

/// Generate `n` synthetic 1-minute bars starting at `start`.
///
/// Close follows `100 + cumulative N(0, 0.5)`; high/low pad the close by
/// `U(0.1, 1.5)`; open jitters around the close by `N(0, 0.3)`; volume is
/// `U(1e4, 1e6)`.
pub fn synthetic_1m(n: usize, seed: u64, start: DateTime<Utc>) -> OhlcvFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut frame = OhlcvFrame::with_capacity(n);
    let mut level = 100.0;

    for i in 0..n {
        level += 0.5 * normal(&mut rng);
        let close = level;
        let high = close + rng.gen_range(0.1..1.5);
        let low = close - rng.gen_range(0.1..1.5);
        let open = (close + 0.3 * normal(&mut rng)).clamp(low, high);
        let volume = rng.gen_range(1.0e4..1.0e6);
        frame.push(start + Duration::minutes(i as i64), open, high, low, close, volume);
    }
    frame
}

/// Standard normal via Box-Muller.
fn normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
