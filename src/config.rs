//! # Config — Enumerated Configuration Surface
//!
//! `CoreConfig` covers every configuration knob this crate's layers read:
//! arithmetic mode, checksum power, NTT context parameters, and stream
//! tuning. Plain `Serialize`/`Deserialize` structs — this crate does not
//! itself parse config from a file, env var, or CLI flag (that wiring is an
//! embedding application's concern), it only defines the shape and sane
//! defaults.

use serde::{Deserialize, Serialize};

/// Every arithmetic function in [`crate::modarith`] that takes a config
/// reads these knobs; none of them are global state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArithmeticConfig {
    /// `mod`/`modInverse` return a canonical residue in `[0, |m|)` when true;
    /// sign-preserving remainder otherwise.
    pub python_compatible: bool,
    /// Enforce `MAX_SUPPORTED_BITS` on operand bit length.
    pub strict: bool,
    /// Use `slidingWindowModPow` instead of plain square-and-multiply.
    pub use_optimized: bool,
    /// Combined bit length below which `modMul` multiplies directly instead
    /// of Russian-peasant doubling.
    pub native_threshold: u32,
    /// Bit-length ceiling enforced when `strict` is set.
    pub max_supported_bits: u32,
    /// Memoize `modInverse`/`gcd`/`extendedGcd`/`modPow` results.
    pub use_cache: bool,
}

impl Default for ArithmeticConfig {
    fn default() -> Self {
        ArithmeticConfig {
            python_compatible: true,
            strict: false,
            use_optimized: false,
            native_threshold: 50,
            max_supported_bits: 4096,
            use_cache: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksumConfig {
    pub checksum_power: u32,
}

impl Default for ChecksumConfig {
    fn default() -> Self {
        ChecksumConfig { checksum_power: 6 }
    }
}

/// Parameters for constructing an [`crate::ntt::NttContext`]. Not `Default`
/// on purpose — a correct `(modulus, primitive_root, max_size)` triple is
/// problem-specific; there is no safe universal default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NttConfig {
    pub modulus: String,
    pub primitive_root: String,
    pub max_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStrategy {
    Throughput,
    Latency,
    Memory,
    Balanced,
}

impl Default for OptimizationStrategy {
    fn default() -> Self {
        OptimizationStrategy::Balanced
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub default_chunk_size: usize,
    pub max_concurrency: usize,
    pub memory_limit: usize,
    pub backpressure_threshold: f64,
    pub backpressure_hysteresis: f64,
    pub buffer_size: usize,
    pub metrics_interval_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub error_tolerance: f64,
    pub timeout_ms: u64,
    pub optimization_strategy: OptimizationStrategy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            default_chunk_size: 256,
            max_concurrency: 4,
            memory_limit: 256 * 1024 * 1024,
            backpressure_threshold: 0.8,
            backpressure_hysteresis: 0.1,
            buffer_size: 1024,
            metrics_interval_ms: 5000,
            retry_attempts: 3,
            retry_delay_ms: 100,
            error_tolerance: 0.05,
            timeout_ms: 30_000,
            optimization_strategy: OptimizationStrategy::Balanced,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub arithmetic: ArithmeticConfig,
    pub checksum: ChecksumConfig,
    pub ntt: Option<NttConfig>,
    pub stream: StreamConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.checksum.checksum_power, 6);
        assert_eq!(cfg.arithmetic.native_threshold, 50);
        assert_eq!(cfg.arithmetic.max_supported_bits, 4096);
        assert!(cfg.arithmetic.python_compatible);
        assert_eq!(cfg.stream.max_concurrency, 4);
        assert!((cfg.stream.backpressure_threshold - 0.8).abs() < 1e-12);
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = CoreConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: CoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.checksum.checksum_power, back.checksum.checksum_power);
    }
}
