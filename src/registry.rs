//! # Registry — External Prime Registry Collaborator
//!
//! The prime registry is treated as an external collaborator: `getPrime(i)
//! -> P`, `getIndex(P) -> i`, `factor(n) -> [(P, e)]`, total over the
//! registry's *observed* index/prime set. [`PrimeRegistry`] is the trait
//! every other module programs against; [`SievePrimeRegistry`] is a
//! concrete, in-process implementation so the crate is usable standalone,
//! built on an incremental trial-division sieve rather than a fixed bound
//! (registries here grow to however many primes callers have actually asked
//! about).
//!
//! Read-mostly, externally synchronized: [`SievePrimeRegistry`] wraps its
//! growing table in a `Mutex` so it can be shared as `Arc<dyn PrimeRegistry>`
//! across stream-core tasks without the core itself ever mutating it through
//! any other path.

use crate::bigint;
use crate::error::{CoreError, CoreResult};
use rug::Integer;
use std::collections::HashMap;
use std::sync::Mutex;

pub trait PrimeRegistry: Send + Sync {
    /// `getPrime(index)` — index 0 -> 2, 1 -> 3, 2 -> 5, ...
    fn get_prime(&self, index: u64) -> CoreResult<Integer>;
    /// `getIndex(prime)`, the inverse of `get_prime`.
    fn get_index(&self, prime: &Integer) -> CoreResult<u64>;
    /// `factor(n)` — unique factorization, primes ascending, exponents >= 1.
    fn factor(&self, n: &Integer) -> CoreResult<Vec<(Integer, u32)>>;
}

struct SieveState {
    /// `primes[i]` is the `(i+1)`-th prime; `primes[0] == 2`.
    primes: Vec<Integer>,
    index_of: HashMap<Integer, u64>,
}

impl SieveState {
    fn new() -> Self {
        SieveState {
            primes: Vec::new(),
            index_of: HashMap::new(),
        }
    }

    fn next_prime_after(last: Option<&Integer>) -> Integer {
        let mut candidate = match last {
            None => return Integer::from(2),
            Some(p) if *p == 2 => Integer::from(3),
            Some(p) => Integer::from(p + 2),
        };
        loop {
            if bigint::is_probable_prime(&candidate, 25) {
                return candidate;
            }
            candidate += 2;
        }
    }

    fn ensure_count(&mut self, count: usize) {
        while self.primes.len() < count {
            let next = Self::next_prime_after(self.primes.last());
            let idx = self.primes.len() as u64;
            self.index_of.insert(next.clone(), idx);
            self.primes.push(next);
        }
    }

    fn ensure_up_to(&mut self, value: &Integer) {
        while self.primes.last().map_or(true, |p| p < value) {
            let more = self.primes.len() + 1;
            self.ensure_count(more);
        }
    }
}

/// In-process prime registry backed by an incrementally-extended
/// trial-division sieve. Not the only legal implementation of
/// [`PrimeRegistry`] — callers with their own fast prime table can
/// substitute it.
pub struct SievePrimeRegistry {
    state: Mutex<SieveState>,
}

impl SievePrimeRegistry {
    pub fn new() -> Self {
        SievePrimeRegistry {
            state: Mutex::new(SieveState::new()),
        }
    }
}

impl Default for SievePrimeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PrimeRegistry for SievePrimeRegistry {
    fn get_prime(&self, index: u64) -> CoreResult<Integer> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CoreError::RegistryError("poisoned lock".into()))?;
        let idx = usize::try_from(index).map_err(|_| CoreError::RegistryError("index overflow".into()))?;
        state.ensure_count(idx + 1);
        Ok(state.primes[idx].clone())
    }

    fn get_index(&self, prime: &Integer) -> CoreResult<u64> {
        if *prime < 2 {
            return Err(CoreError::RegistryError(format!("{prime} is not prime")));
        }
        let mut state = self
            .state
            .lock()
            .map_err(|_| CoreError::RegistryError("poisoned lock".into()))?;
        state.ensure_up_to(prime);
        state
            .index_of
            .get(prime)
            .copied()
            .ok_or_else(|| CoreError::RegistryError(format!("{prime} is not prime")))
    }

    fn factor(&self, n: &Integer) -> CoreResult<Vec<(Integer, u32)>> {
        if *n < 1 {
            return Err(CoreError::RegistryError(format!(
                "cannot factor non-positive value {n}"
            )));
        }
        if *n == 1 {
            return Ok(Vec::new());
        }
        let mut state = self
            .state
            .lock()
            .map_err(|_| CoreError::RegistryError("poisoned lock".into()))?;

        let mut remaining = n.clone();
        let mut factors = Vec::new();
        let mut i = 0usize;
        loop {
            if remaining == 1 {
                break;
            }
            state.ensure_count(i + 1);
            let p = state.primes[i].clone();
            if Integer::from(&p * &p) > remaining {
                state.ensure_up_to(&remaining);
                factors.push((remaining.clone(), 1));
                break;
            }
            let mut exp = 0u32;
            while remaining.clone() % &p == 0 {
                remaining /= &p;
                exp += 1;
            }
            if exp > 0 {
                factors.push((p, exp));
            }
            i += 1;
        }
        Ok(factors)
    }
}
