//! # Error — Crate-Wide Failure Taxonomy
//!
//! One enum for every failure kind the core can produce, hand-written with a
//! `Display` impl with one arm per variant and a blanket `impl
//! std::error::Error`. No `thiserror`.
//!
//! `CoreError::is_transient()` implements this crate's propagation policy:
//! `ChecksumMismatch` and `MalformedChunk` are never transient, everything
//! tagged `TransientError` is retry-eligible, and a pipeline `retry` stage
//! consults this before re-running a failed stage.

use std::fmt;
use rug::Integer;

/// Result alias used by every fallible function in the arithmetic, checksum,
/// codec, and NTT modules.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A division, modular reduction, or inverse was attempted with a zero modulus.
    DivisionByZero,
    /// `gcd(a, m) != 1`; no modular inverse exists.
    NoInverse { a: Integer, m: Integer, gcd: Integer },
    /// Strict-mode bit-size guard tripped.
    BitSizeExceeded { op: &'static str, limit: u32, actual: u32 },
    /// A bit position argument was negative.
    InvalidPosition,
    /// `countLeadingZeros`/`countTrailingZeros` called on a negative integer.
    InvalidSign,
    /// A structural field (position, value, operand) was out of its valid range.
    InvalidField { field: &'static str },
    /// `getRandomBigInt` was asked for a non-positive bit width.
    InvalidSize,
    /// NTT context parameters failed validation (q, g, N).
    InvalidContext { reason: String },
    /// A chunk's factorization does not match any known schema.
    MalformedChunk { chunk: Integer, reason: String },
    /// Checksum recomputed from a chunk's core factors does not match the carried one.
    ChecksumMismatch { expected: Integer, actual: Integer },
    /// The external prime registry returned an inconsistent or failed result.
    RegistryError(String),
    /// A pipeline was cancelled via its cancellation signal.
    Cancelled,
    /// A `timeout(ms)` stage's timer elapsed before downstream acknowledged completion.
    TimedOut,
    /// A stage's buffered + in-flight memory exceeded `memoryLimit` for longer than one metrics interval.
    MemoryLimitExceeded { used: usize, limit: usize },
    /// Backpressure could not clear `drain()` within a bounded number of polls.
    BackpressureStalled,
    /// A failure eligible for a `retry` stage to re-run.
    TransientError(String),
    /// Failure rate over `errorTolerance` of processed items; pipeline terminated.
    Aborted { error_rate: f64 },
}

impl CoreError {
    /// `ChecksumMismatch` and `MalformedChunk` are never transient;
    /// everything explicitly tagged `TransientError` is retry-eligible.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::TransientError(_))
    }

    pub fn invalid_field(field: &'static str) -> Self {
        CoreError::InvalidField { field }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::DivisionByZero => write!(f, "division by zero"),
            CoreError::NoInverse { a, m, gcd } => {
                write!(f, "no modular inverse of {a} mod {m} (gcd = {gcd})")
            }
            CoreError::BitSizeExceeded { op, limit, actual } => write!(
                f,
                "{op}: operand bit length {actual} exceeds limit {limit}"
            ),
            CoreError::InvalidPosition => write!(f, "bit position must be non-negative"),
            CoreError::InvalidSign => write!(f, "operand must be non-negative"),
            CoreError::InvalidField { field } => write!(f, "invalid field: {field}"),
            CoreError::InvalidSize => write!(f, "size must be positive"),
            CoreError::InvalidContext { reason } => write!(f, "invalid NTT context: {reason}"),
            CoreError::MalformedChunk { chunk, reason } => {
                write!(f, "malformed chunk {chunk}: {reason}")
            }
            CoreError::ChecksumMismatch { expected, actual } => write!(
                f,
                "checksum mismatch: expected {expected}, got {actual}"
            ),
            CoreError::RegistryError(msg) => write!(f, "prime registry error: {msg}"),
            CoreError::Cancelled => write!(f, "cancelled"),
            CoreError::TimedOut => write!(f, "timed out"),
            CoreError::MemoryLimitExceeded { used, limit } => {
                write!(f, "memory limit exceeded: {used} bytes used, limit {limit}")
            }
            CoreError::BackpressureStalled => write!(f, "backpressure failed to clear"),
            CoreError::TransientError(msg) => write!(f, "transient error: {msg}"),
            CoreError::Aborted { error_rate } => {
                write!(f, "pipeline aborted: error rate {error_rate:.3} exceeded tolerance")
            }
        }
    }
}

impl std::error::Error for CoreError {}
