//! # Checksum — Self-Verifying Factor Checksum Engine
//!
//! A chunk's value carries its own integrity check as an extra prime factor:
//! `calculate_checksum` folds a chunk's `(index, exponent)` pairs down to a
//! single prime via XOR, and `attach_checksum` multiplies that prime (raised
//! to `CHECKSUM_POWER`) into the value. [`crate::verify`] is the reader side;
//! this module is the writer side, folding integrity data onto a payload
//! before it leaves the process the same way a digest-then-attach scheme
//! would.

use crate::error::{CoreError, CoreResult};
use crate::registry::PrimeRegistry;
use rug::Integer;

/// `calculateXorSum(factors)` — XOR-fold of `index(p) * e` over every
/// `(p, e)` pair, where `index(p)` is the prime's ordinal in the registry.
pub fn calculate_xor_sum(factors: &[(Integer, u32)], registry: &dyn PrimeRegistry) -> CoreResult<u64> {
    let mut acc: u64 = 0;
    for (p, e) in factors {
        let idx = registry.get_index(p)?;
        let term = idx.wrapping_mul(u64::from(*e));
        acc ^= term;
    }
    Ok(acc)
}

/// `calculateChecksum(factors)` — the prime at ordinal `calculateXorSum(factors)`,
/// advanced to the next ordinal whenever that prime already appears among
/// `factors`' own primes. Without this, a checksum prime that collides with
/// a core factor's prime would merge into that factor's exponent on
/// `attachChecksum` (`2^3 * 3^1 * 3^6` becomes `2^3 * 3^7`, losing the
/// checksum as a separately-recoverable factor) rather than staying a
/// distinct `checksum_power`-exponent factor `extractFactorsAndChecksum` can
/// find.
pub fn calculate_checksum(factors: &[(Integer, u32)], registry: &dyn PrimeRegistry) -> CoreResult<Integer> {
    let mut ordinal = calculate_xor_sum(factors, registry)?;
    loop {
        let candidate = registry.get_prime(ordinal)?;
        if !factors.iter().any(|(p, _)| *p == candidate) {
            return Ok(candidate);
        }
        ordinal += 1;
    }
}

/// `attachChecksum(raw, factors)` — `raw * checksumPrime^checksumPower`.
pub fn attach_checksum(
    raw: &Integer,
    factors: &[(Integer, u32)],
    registry: &dyn PrimeRegistry,
    checksum_power: u32,
) -> CoreResult<Integer> {
    let checksum_prime = calculate_checksum(factors, registry)?;
    let attached = checksum_prime.clone().pow(checksum_power);
    Ok(Integer::from(raw * attached))
}

/// `extractFactorsAndChecksum(value)` — factors `value` via the registry,
/// pulls out the single factor whose exponent equals `checksum_power` as the
/// carried checksum prime, and returns the remaining core factors alongside
/// it. Fails `MalformedChunk` if zero or more than one factor carries that
/// exponent.
pub fn extract_factors_and_checksum(
    value: &Integer,
    registry: &dyn PrimeRegistry,
    checksum_power: u32,
) -> CoreResult<(Vec<(Integer, u32)>, Integer)> {
    let factors = registry.factor(value)?;
    let mut core = Vec::with_capacity(factors.len());
    let mut checksum_prime = None;
    for (p, e) in factors {
        if e == checksum_power {
            if checksum_prime.is_some() {
                return Err(CoreError::MalformedChunk {
                    chunk: value.clone(),
                    reason: format!("more than one factor carries the checksum exponent {checksum_power}"),
                });
            }
            checksum_prime = Some(p);
        } else {
            core.push((p, e));
        }
    }
    let checksum_prime = checksum_prime.ok_or_else(|| CoreError::MalformedChunk {
        chunk: value.clone(),
        reason: format!("no factor carries the checksum exponent {checksum_power}"),
    })?;
    Ok((core, checksum_prime))
}

/// `calculateBatchChecksum(values)` — the core factors of every value in
/// `values`, concatenated in order, folded through the same XOR-then-lookup
/// scheme as a single checksum over the whole batch.
pub fn calculate_batch_checksum(
    values: &[Integer],
    registry: &dyn PrimeRegistry,
    checksum_power: u32,
) -> CoreResult<Integer> {
    let mut all_core = Vec::new();
    for value in values {
        let (core, _) = extract_factors_and_checksum(value, registry, checksum_power)?;
        all_core.extend(core);
    }
    calculate_checksum(&all_core, registry)
}
