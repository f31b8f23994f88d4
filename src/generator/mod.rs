//! Counter-based random number generator for dropout masks
//!
//! A [`Generator`] hands out disjoint ranges of Philox counters. Each fused
//! launch reserves the counters its threads will consume and receives a
//! [`PhiloxState`] token; the kernel derives the dropout mask from that token
//! alone, so a launch can be replayed bit-for-bit from the same token.

mod philox;

pub use philox::{philox4x32_10, uniform4};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Seed used by default generators until `manual_seed` is called
pub const DEFAULT_SEED: u64 = 67_280_421_310_721;

/// Replayable snapshot of a generator's stream position
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PhiloxState {
    /// Philox key
    pub seed: u64,
    /// First counter reserved for the launch
    pub offset: u64,
}

impl PhiloxState {
    /// Four uniform draws in (0, 1] for the given subsequence
    #[inline]
    pub fn uniform4(&self, subsequence: u64) -> [f32; 4] {
        uniform4(self.seed, self.offset, subsequence)
    }
}

#[derive(Debug)]
struct GeneratorState {
    seed: u64,
    offset: u64,
}

/// Thread-safe Philox generator
///
/// All mutation goes through one `parking_lot::Mutex`, so concurrent callers
/// always receive non-overlapping counter ranges.
#[derive(Debug)]
pub struct Generator {
    state: Mutex<GeneratorState>,
}

impl Generator {
    /// Create a generator with the given seed and a zero offset
    pub fn new(seed: u64) -> Self {
        Self {
            state: Mutex::new(GeneratorState { seed, offset: 0 }),
        }
    }

    /// Create a generator seeded from the operating system's entropy source
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    /// Reset the seed and rewind the offset to zero
    pub fn manual_seed(&self, seed: u64) {
        let mut state = self.state.lock();
        state.seed = seed;
        state.offset = 0;
    }

    /// Current seed
    pub fn seed(&self) -> u64 {
        self.state.lock().seed
    }

    /// Current offset
    pub fn offset(&self) -> u64 {
        self.state.lock().offset
    }

    /// Reserve `increment` counters per thread and return the state to replay them
    ///
    /// The offset advances by `increment` rounded up to a multiple of 4, since
    /// every Philox call produces four values.
    pub fn philox_state(&self, increment: u64) -> PhiloxState {
        let advance = increment.div_ceil(4) * 4;
        let mut state = self.state.lock();
        let snapshot = PhiloxState {
            seed: state.seed,
            offset: state.offset,
        };
        state.offset = state.offset.wrapping_add(advance);
        snapshot
    }

    /// Process-wide default generator for a device id
    ///
    /// Created on first use with [`DEFAULT_SEED`].
    pub fn default_for(device_id: usize) -> Arc<Generator> {
        static DEFAULTS: OnceLock<Mutex<HashMap<usize, Arc<Generator>>>> = OnceLock::new();

        let defaults = DEFAULTS.get_or_init(|| Mutex::new(HashMap::new()));
        defaults
            .lock()
            .entry(device_id)
            .or_insert_with(|| Arc::new(Generator::new(DEFAULT_SEED)))
            .clone()
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}
