//! # Primekernel — Prime-Factorization Data Representation Kernel
//!
//! A representation kernel that encodes data as products of primes raised to
//! exponents, so that arithmetic on the encoded values is arithmetic on the
//! data itself. Built around five layers:
//!
//! - [`bigint`] — arbitrary-precision signed integer encode/decode on top of
//!   [`rug::Integer`], the wire format every other layer moves bytes through.
//! - [`modarith`] / [`registry`] — modular arithmetic and the prime registry
//!   (`PrimeRegistry`/`SievePrimeRegistry`) that maps positions to primes and
//!   primes to positions, including factorization and primitive-root checks.
//! - [`checksum`] / [`verify`] / [`codec`] — checksum-attached chunk encoding:
//!   data, operation, and block-header chunks are products of prime powers
//!   with a checksum folded in as one more prime factor.
//! - [`ntt`] — the Number-Theoretic Transform and fixed-point window functions
//!   used to move between positional and frequency-domain representations.
//! - [`stream`] — a `tokio`/`futures`-based chunked streaming layer: per-chunk
//!   verify+decode, a composable processing pipeline (map/filter/batch/retry/
//!   timeout/catch), and a backpressure monitor gating admission on memory
//!   pressure.
//!
//! ## Ambient Stack
//!
//! - [`config`] — `serde`-backed configuration surface (`CoreConfig`,
//!   `StreamConfig`) with the same field-level documentation style as the
//!   rest of this crate's config structs.
//! - [`error`] — a hand-rolled `CoreError` enum (no `thiserror`, matching how
//!   this crate's error types have always been written) with a
//!   `is_transient()` policy the stream pipeline's `retry` stage consults.
//! - [`cache`] — bounded in-memory caching for expensive recomputation (prime
//!   sieve extension, factorization results).
//! - `tracing` is used throughout for structured logging rather than bare
//!   `println!`/`eprintln!`, matching how the rest of this crate instruments
//!   long-running work.

pub mod bigint;
pub mod cache;
pub mod checksum;
pub mod codec;
pub mod config;
pub mod error;
pub mod modarith;
pub mod ntt;
pub mod registry;
pub mod stream;
pub mod verify;
