//! Injectable randomness shared by the simulator and the predictors.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A seedable generator that can be shared between concurrent callers.
///
/// Components hold one of these instead of reaching for a thread-local
/// generator, so fixed seeds give reproducible runs.
#[derive(Debug)]
pub struct SharedRng {
    inner: Mutex<StdRng>,
}

impl SharedRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            inner: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Seeded when `seed` is set, OS entropy otherwise.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::from_seed(seed),
            None => Self::from_entropy(),
        }
    }

    /// Run `f` with exclusive access to the generator.
    pub fn with<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.inner.lock();
        f(&mut rng)
    }

    /// Derive an independent generator, e.g. for another component.
    pub fn fork(&self) -> Self {
        let seed = self.with(|rng| rng.random::<u64>());
        Self::from_seed(seed)
    }
}

impl Default for SharedRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}
