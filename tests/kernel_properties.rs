//! Property-based tests for the representation kernel's quantified
//! invariants, organized by module: one `proptest! {}` block per module, a
//! doc comment stating the mathematical property above each test.
//!
//! ```bash
//! cargo test --test kernel_properties
//! PROPTEST_CASES=10000 cargo test --test kernel_properties
//! ```

use factorkernel::bigint;
use factorkernel::checksum;
use factorkernel::codec;
use factorkernel::config::ArithmeticConfig;
use factorkernel::modarith;
use factorkernel::ntt::NttContext;
use factorkernel::registry::{PrimeRegistry, SievePrimeRegistry};
use proptest::prelude::*;
use rug::Integer;

// == BigInt Utilities =========================================================

proptest! {
    /// Byte round-trip: `fromByteArray(toByteArray(n)) == n`.
    #[test]
    fn prop_byte_round_trip(n in -1_000_000_000_000i64..1_000_000_000_000i64) {
        let value = Integer::from(n);
        let bytes = bigint::to_byte_array(&value);
        let back = bigint::from_byte_array(&bytes);
        prop_assert_eq!(back, value);
    }

    /// Boundary behavior: `integerSqrt(n)^2 <= n < (integerSqrt(n)+1)^2`.
    #[test]
    fn prop_integer_sqrt_bounds(n in 0u64..u64::MAX) {
        let value = Integer::from(n);
        let root = bigint::integer_sqrt(&value);
        let root_sq = Integer::from(&root * &root);
        let next_sq = Integer::from(&(root.clone() + 1) * &(root.clone() + 1));
        prop_assert!(root_sq <= value);
        prop_assert!(value < next_sq);
    }
}

/// Literal byte round-trip test set spanning the named boundary values.
#[test]
fn byte_round_trip_named_boundaries() {
    let values: &[i128] = &[
        0, 1, -1, 255, 256, -256, 65535, 65536, (1i128 << 53) - 1, 1i128 << 100,
    ];
    for &v in values {
        let value = Integer::from(v);
        let bytes = bigint::to_byte_array(&value);
        assert_eq!(bigint::from_byte_array(&bytes), value, "round-trip failed for {v}");
    }
}

// == Modular Arithmetic =======================================================

proptest! {
    /// `modMul(a,b,m) == ((a mod m)*(b mod m)) mod m` (canonical residue).
    #[test]
    fn prop_mod_mul_matches_definition(a in 0i64..1_000_000, b in 0i64..1_000_000, m in 1i64..1_000_000) {
        let cfg = ArithmeticConfig::default();
        let (a, b, m) = (Integer::from(a), Integer::from(b), Integer::from(m));
        let got = modarith::mod_mul(&a, &b, &m, &cfg).unwrap();
        let want = Integer::from(&(Integer::from(&a % &m) * Integer::from(&b % &m)) % &m);
        prop_assert_eq!(got, want);
    }

    /// Idempotence: `mod(mod(a,m),m) == mod(a,m)`.
    #[test]
    fn prop_modulo_idempotent(a in -1_000_000i64..1_000_000, m in 1i64..1_000_000) {
        let cfg = ArithmeticConfig::default();
        let (a, m) = (Integer::from(a), Integer::from(m));
        let once = modarith::modulo(&a, &m, &cfg).unwrap();
        let twice = modarith::modulo(&once, &m, &cfg).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// For a,m with gcd(a,m)=1: `modMul(a, modInverse(a,m), m) == 1`.
    #[test]
    fn prop_mod_inverse_round_trips(a in 1i64..100_000, m in 2i64..100_000) {
        let cfg = ArithmeticConfig::default();
        let (a_int, m_int) = (Integer::from(a), Integer::from(m));
        if modarith::gcd(&a_int, &m_int) == 1 {
            let inv = modarith::mod_inverse(&a_int, &m_int, &cfg, None).unwrap();
            let product = modarith::mod_mul(&a_int, &inv, &m_int, &cfg).unwrap();
            prop_assert_eq!(product, Integer::from(1));
        }
    }

    /// `slidingWindowModPow` agrees with plain square-and-multiply `modPow`.
    #[test]
    fn prop_sliding_window_matches_square_and_multiply(base in 2i64..10_000, exp in 0i64..1000, m in 2i64..100_000) {
        let cfg = ArithmeticConfig::default();
        let (base, exp, m) = (Integer::from(base), Integer::from(exp), Integer::from(m));
        let plain = modarith::mod_pow(&base, &exp, &m, &cfg, None).unwrap();
        let windowed = modarith::sliding_window_mod_pow(&base, &exp, &m, &cfg, 4).unwrap();
        prop_assert_eq!(plain, windowed);
    }
}

/// Boundary: `modPow(base, 0, m) == 1` for m > 1; `modPow(_, _, 1) == 0`.
#[test]
fn mod_pow_boundary_behaviors() {
    let cfg = ArithmeticConfig::default();
    assert_eq!(
        modarith::mod_pow(&Integer::from(7), &Integer::from(0), &Integer::from(13), &cfg, None).unwrap(),
        Integer::from(1)
    );
    assert_eq!(
        modarith::mod_pow(&Integer::from(7), &Integer::from(5), &Integer::from(1), &cfg, None).unwrap(),
        Integer::from(0)
    );
}

/// Boundary: `lcm(0, _) == 0`; `gcd(0, 5) == 5`.
#[test]
fn lcm_and_gcd_zero_boundaries() {
    assert_eq!(modarith::lcm(&Integer::from(0), &Integer::from(17)), Integer::from(0));
    assert_eq!(modarith::gcd(&Integer::from(0), &Integer::from(5)), Integer::from(5));
}

/// Python-mode sign convention: `mod(-5, 13) == 8`; `mod(-1, 5) == 4`.
#[test]
fn modulo_python_mode_sign() {
    let cfg = ArithmeticConfig::default();
    assert_eq!(modarith::modulo(&Integer::from(-5), &Integer::from(13), &cfg).unwrap(), Integer::from(8));
    assert_eq!(modarith::modulo(&Integer::from(-1), &Integer::from(5), &cfg).unwrap(), Integer::from(4));
}

/// Literal end-to-end scenarios given as worked examples.
#[test]
fn literal_mod_inverse_scenarios() {
    let cfg = ArithmeticConfig::default();
    assert_eq!(modarith::mod_inverse(&Integer::from(3), &Integer::from(11), &cfg, None).unwrap(), Integer::from(4));
    assert_eq!(modarith::mod_inverse(&Integer::from(7), &Integer::from(20), &cfg, None).unwrap(), Integer::from(3));
    assert!(modarith::mod_inverse(&Integer::from(2), &Integer::from(4), &cfg, None).is_err());
}

#[test]
fn literal_mod_pow_scenarios() {
    let cfg = ArithmeticConfig::default();
    assert_eq!(modarith::mod_pow(&Integer::from(2), &Integer::from(10), &Integer::from(1000), &cfg, None).unwrap(), Integer::from(24));
    assert_eq!(modarith::mod_pow(&Integer::from(9), &Integer::from(13), &Integer::from(100), &cfg, None).unwrap(), Integer::from(29));
    assert_eq!(modarith::mod_pow(&Integer::from(3), &Integer::from(200), &Integer::from(1_000_000), &cfg, None).unwrap(), Integer::from(44001));
}

#[test]
fn literal_extended_gcd_scenarios() {
    let (g, x, y) = modarith::extended_gcd(&Integer::from(35), &Integer::from(15));
    assert_eq!(g, Integer::from(5));
    assert_eq!(Integer::from(35) * &x + Integer::from(15) * &y, Integer::from(5));

    let (g, x, y) = modarith::extended_gcd(&Integer::from(101), &Integer::from(13));
    assert_eq!(g, Integer::from(1));
    assert_eq!(Integer::from(101) * &x + Integer::from(13) * &y, Integer::from(1));
}

// == Prime Registry / Checksum / Codec ========================================

proptest! {
    /// For all factor lists F with distinct primes and positive exponents:
    /// `factor(reconstruct(F)) == F` (primes ascending, exponents >= 1).
    #[test]
    fn prop_factor_reconstruct_round_trip(
        exponents in proptest::collection::vec(1u32..5, 1..5),
    ) {
        let registry = SievePrimeRegistry::new();
        let mut product = Integer::from(1);
        let mut expected = Vec::new();
        for (i, &exp) in exponents.iter().enumerate() {
            let prime = registry.get_prime(i as u64).unwrap();
            product *= prime.clone().pow(exp);
            expected.push((prime, exp));
        }
        let factored = registry.factor(&product).unwrap();
        prop_assert_eq!(factored, expected);
    }
}

/// For all valid chunks c: `verify(c).valid == true`.
#[test]
fn valid_chunk_verifies() {
    let registry = SievePrimeRegistry::new();
    let chunk = codec::encode_data(3, 65, &registry, codec::CHECKSUM_POWER).unwrap();
    assert!(codec::decode_chunk(&chunk, &registry, codec::CHECKSUM_POWER).is_ok());
}

proptest! {
    /// For all valid chunks c and any k>0: `verify(c*k).valid == false`
    /// (tampering by a nontrivial multiplier breaks the checksum).
    #[test]
    fn prop_tampered_chunk_fails_verification(position in 0u64..16, value in 1u64..127, k in 2u64..20) {
        let registry = SievePrimeRegistry::new();
        let chunk = codec::encode_data(position, value, &registry, codec::CHECKSUM_POWER).unwrap();
        let tampered = Integer::from(&chunk * Integer::from(k));
        prop_assert!(codec::decode_chunk(&tampered, &registry, codec::CHECKSUM_POWER).is_err());
    }
}

/// Literal checksum-tampering scenario given as worked examples.
#[test]
fn literal_checksum_tampering_scenario() {
    let registry = SievePrimeRegistry::new();
    let chunk = codec::encode_data(3, 65, &registry, codec::CHECKSUM_POWER).unwrap();
    let tampered = Integer::from(&chunk * Integer::from(2));
    let err = codec::decode_chunk(&tampered, &registry, codec::CHECKSUM_POWER).unwrap_err();
    assert!(matches!(err, factorkernel::error::CoreError::ChecksumMismatch { .. }));
}

/// Literal encode/decode text scenario: `encodeText("AB")` then
/// `decodeText(...)` returns `"AB"`.
#[test]
fn literal_encode_decode_text_scenario() {
    let registry = SievePrimeRegistry::new();
    let chunks = codec::encode_text("AB", &registry, codec::CHECKSUM_POWER).unwrap();
    let decoded = codec::decode_text(&chunks, &registry, codec::CHECKSUM_POWER).unwrap();
    assert_eq!(decoded, "AB");
}

/// `calculate_checksum` is deterministic: identical factor lists checksum
/// identically regardless of call count.
#[test]
fn checksum_is_deterministic() {
    let registry = SievePrimeRegistry::new();
    let factors = vec![(Integer::from(2), 3u32), (Integer::from(5), 1u32)];
    let first = checksum::calculate_checksum(&factors, &registry).unwrap();
    let second = checksum::calculate_checksum(&factors, &registry).unwrap();
    assert_eq!(first, second);
}

// == NTT Engine ===============================================================

fn small_ntt_context() -> NttContext {
    let registry = SievePrimeRegistry::new();
    // mod=17, root=3 has multiplicative order 16 mod 17; size=16 | (17-1).
    NttContext::new(Integer::from(17), Integer::from(3), 16, &registry, ArithmeticConfig::default()).unwrap()
}

/// Lengths exercised by `prop_ntt_round_trip`: every power of two up to and
/// including the context size (16), not just the context size itself.
fn ntt_round_trip_lengths() -> impl Strategy<Value = Vec<u64>> {
    prop_oneof![Just(1usize), Just(2usize), Just(4usize), Just(8usize), Just(16usize)]
        .prop_flat_map(|n| proptest::collection::vec(0u64..17, n))
}

proptest! {
    /// For all integer vectors v of length n (n a power of two, 0<n<=N) with
    /// entries in [0,q): `ntt.inverse(ntt.forward(v)) == v`.
    #[test]
    fn prop_ntt_round_trip(values in ntt_round_trip_lengths()) {
        let ctx = small_ntt_context();
        let signal: Vec<Integer> = values.into_iter().map(Integer::from).collect();
        let transformed = ctx.forward(&signal).unwrap();
        prop_assert_eq!(transformed.len(), signal.len());
        let round_trip = ctx.inverse(&transformed).unwrap();
        prop_assert_eq!(round_trip, signal);
    }
}

/// Worked NTT round-trip example using a production-sized modulus/root/size
/// triple (q=998244353, g=3, N=8).
#[test]
fn literal_ntt_round_trip_scenario() {
    let registry = SievePrimeRegistry::new();
    // 998244353 is the canonical NTT-friendly prime; 3 is a primitive root.
    // (998244353 - 1) / 8 = 124780544, so 3^124780544 is a primitive 8th
    // root of unity; `is_primitive_root` verifies this at construction time
    // rather than trusting the claim.
    let ctx = NttContext::new(
        Integer::from(998244353u64),
        modarith::mod_pow(&Integer::from(3), &Integer::from(124_780_544u64), &Integer::from(998244353u64), &ArithmeticConfig::default(), None).unwrap(),
        8,
        &registry,
        ArithmeticConfig::default(),
    )
    .unwrap();
    let signal: Vec<Integer> = (1..=8).map(Integer::from).collect();
    let transformed = ctx.forward(&signal).unwrap();
    let round_trip = ctx.inverse(&transformed).unwrap();
    assert_eq!(round_trip, signal);
}
