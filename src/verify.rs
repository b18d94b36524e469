//! # Verify — Checksum Verification
//!
//! Recomputes a chunk's checksum from its core factors and compares it
//! against the prime carried at [`crate::config::ChecksumConfig::checksum_power`].
//! The outcome is a `Valid`/`Invalid` enum carrying the expected and actual
//! checksum on mismatch. A retry wrapper re-runs only the failures
//! [`crate::error::CoreError::is_transient`] marks eligible, backing off
//! exponentially between attempts.

use crate::checksum;
use crate::error::CoreResult;
use crate::registry::PrimeRegistry;
use rug::Integer;
use std::thread;
use std::time::Duration;

/// Outcome of [`verify_value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Checksum recomputed from the core factors matches the carried one.
    Valid {
        core_factors: Vec<(Integer, u32)>,
        checksum_prime: Integer,
    },
    /// Extraction succeeded but the recomputed checksum prime differs from
    /// the one carried in the value — a tampering or corruption signal, not
    /// a structural failure.
    Invalid {
        core_factors: Vec<(Integer, u32)>,
        expected: Integer,
        actual: Integer,
    },
}

/// `verifyValue(value)` — extracts core factors and the carried checksum
/// prime, recomputes the checksum from those factors, and compares.
/// Structural problems (`extractFactorsAndChecksum` failing, or the
/// registry itself failing) surface as `Err`; a clean extraction whose
/// checksum simply doesn't match returns `Ok(VerifyOutcome::Invalid)`.
pub fn verify_value(
    value: &Integer,
    registry: &dyn PrimeRegistry,
    checksum_power: u32,
) -> CoreResult<VerifyOutcome> {
    let (core_factors, carried_checksum) =
        checksum::extract_factors_and_checksum(value, registry, checksum_power)?;
    let recomputed = checksum::calculate_checksum(&core_factors, registry)?;
    if recomputed == carried_checksum {
        Ok(VerifyOutcome::Valid {
            core_factors,
            checksum_prime: carried_checksum,
        })
    } else {
        Ok(VerifyOutcome::Invalid {
            core_factors,
            expected: recomputed,
            actual: carried_checksum,
        })
    }
}

/// `verifyValue` with an exponential-backoff retry wrapper around
/// transient registry failures; any other error, or a clean
/// `Ok(VerifyOutcome::Invalid)`, returns immediately without retrying — a
/// checksum that genuinely doesn't match will never start matching on a
/// second attempt.
pub fn verify_with_retry(
    value: &Integer,
    registry: &dyn PrimeRegistry,
    checksum_power: u32,
    retry_attempts: u32,
    retry_delay_ms: u64,
) -> CoreResult<VerifyOutcome> {
    let mut attempt = 0;
    loop {
        match verify_value(value, registry, checksum_power) {
            Ok(outcome) => return Ok(outcome),
            Err(err) if err.is_transient() && attempt < retry_attempts => {
                let backoff = retry_delay_ms.saturating_mul(1u64 << attempt);
                thread::sleep(Duration::from_millis(backoff));
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Convenience check used by [`crate::stream`] stages that only care about
/// pass/fail, collapsing structural errors into `false` rather than
/// propagating them — useful when a stream consumer wants a uniform
/// boolean verdict instead of distinguishing malformed input from tampered
/// input.
pub fn is_valid(value: &Integer, registry: &dyn PrimeRegistry, checksum_power: u32) -> bool {
    matches!(
        verify_value(value, registry, checksum_power),
        Ok(VerifyOutcome::Valid { .. })
    )
}
