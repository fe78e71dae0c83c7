use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const PREDICTABLE_LIMIT: u16 = 1000;

/// Generator behind the `random` opcode.
///
/// Seed 0 is the baseline: unpredictable numbers from an entropy-seeded
/// `SmallRng`. Small seeds (< 1000) give the cycle 1, 2, .., seed; larger
/// seeds a reproducible `SmallRng` stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RandomState {
    seed: u16,
    counter: u16,
    rng: Option<SmallRng>,
}

impl RandomState {
    pub fn reset(&mut self) {
        *self = RandomState::default();
    }

    #[inline]
    pub fn is_baseline(&self) -> bool {
        self.seed == 0
    }

    pub fn seed(&mut self, seed: u16) {
        self.seed = seed;
        self.counter = 0;
        self.rng = (seed >= PREDICTABLE_LIMIT).then(|| SmallRng::seed_from_u64(seed as u64));
    }

    /// Draw a number in `1..=range`; `range` must be positive.
    pub fn next(&mut self, range: u16) -> u16 {
        debug_assert!(range > 0);
        if self.seed != 0 && self.seed < PREDICTABLE_LIMIT {
            self.counter = self.counter % self.seed + 1;
            return (self.counter - 1) % range + 1;
        }
        self.rng
            .get_or_insert_with(SmallRng::from_entropy)
            .gen_range(1..=range.max(1))
    }
}
