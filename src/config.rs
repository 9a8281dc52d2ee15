/// How `KeyPool::release` finds the slot for a freed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeStrategy {
    /// Random starting index, halving toward the slot for at most
    /// `floor(ln(len)) + 1` steps, then binary search if that misses.
    #[default]
    Randomized,
    /// Binary search over range ends.
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolConfig {
    /// Lowest key the pool hands out. Smaller keys are never managed.
    pub start: usize,
    pub strategy: ProbeStrategy,
    /// Seed for the probe RNG. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl PoolConfig {
    pub fn new() -> Self {
        Default::default()
    }

    #[must_use]
    pub fn with_start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: ProbeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
