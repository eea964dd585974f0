use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Session random source. Seedable so extractions can be replayed.
#[derive(Debug, Clone)]
pub struct CardRng {
    seed: Option<u64>,
    rng: StdRng,
}

impl CardRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            seed: None,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Uniform in-place Fisher–Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    /// Draw `count` elements uniformly without replacement. The drawn
    /// elements come back in random order; `items` keeps the rest.
    pub fn draw<T>(&mut self, items: &mut Vec<T>, count: usize) -> Vec<T> {
        let count = count.min(items.len());
        items.shuffle(&mut self.rng);
        items.drain(..count).collect()
    }
}

impl Default for CardRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}
