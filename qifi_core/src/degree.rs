use rand::seq::index;
use rand::Rng;

/// Ideal Soliton distribution over degrees `1..=k`.
///
/// `P(1) = 1/k` and `P(d) = 1/(d·(d-1))` for `2 ≤ d ≤ k`. The cumulative table
/// is built once, so an encoder can draw millions of degrees without
/// recomputing it.
#[derive(Debug, Clone)]
pub struct IdealSoliton {
    cumulative: Vec<f64>,
}

impl IdealSoliton {
    /// Build the distribution for `k` original blocks (`k` is clamped to 1).
    pub fn new(k: u32) -> Self {
        let k = k.max(1);
        let mut cumulative = Vec::with_capacity(k as usize);
        let mut acc = 1.0 / f64::from(k);
        cumulative.push(acc);
        for d in 2..=k {
            let d = f64::from(d);
            acc += 1.0 / (d * (d - 1.0));
            cumulative.push(acc);
        }
        Self { cumulative }
    }

    /// Number of original blocks the distribution was built for.
    #[inline]
    pub fn k(&self) -> u32 {
        self.cumulative.len() as u32
    }

    /// Probability mass of degree `d` (zero outside `1..=k`).
    pub fn probability(&self, d: u32) -> f64 {
        match d as usize {
            0 => 0.0,
            1 => self.cumulative[0],
            i if i <= self.cumulative.len() => self.cumulative[i - 1] - self.cumulative[i - 2],
            _ => 0.0,
        }
    }

    /// Draw one degree: the smallest `d` whose cumulative probability exceeds
    /// a uniform draw in `[0, 1)`. Rounding that exhausts the table yields `k`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let draw: f64 = rng.gen();
        self.cumulative
            .iter()
            .position(|&c| draw < c)
            .map_or(self.k(), |i| i as u32 + 1)
    }
}

/// Draw a degree in `[1, k]` from the Ideal Soliton distribution.
pub fn sample_degree<R: Rng + ?Sized>(k: u32, rng: &mut R) -> u32 {
    IdealSoliton::new(k).sample(rng)
}

/// Draw `degree` distinct indices uniformly from `[0, k)`.
///
/// `degree` is clamped to `k`.
pub fn sample_indices<R: Rng + ?Sized>(k: u32, degree: u32, rng: &mut R) -> Vec<u32> {
    let amount = degree.min(k) as usize;
    index::sample(rng, k as usize, amount)
        .into_iter()
        .map(|i| i as u32)
        .collect()
}
