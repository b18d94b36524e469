//! # BigInt — Arbitrary-Precision Integer Utilities
//!
//! Bit-level and byte-level operations on signed `rug::Integer` values, plus
//! a from-scratch Miller–Rabin primality test built on [`crate::modarith`]
//! rather than GMP's own `is_probably_prime`. Random sampling bridges
//! `rand`'s `RngCore` into `rug::rand` via a small adapter so the entropy
//! source stays swappable, drawing from the OS CSPRNG by default for
//! `get_random_big_int`.

use crate::config::ArithmeticConfig;
use crate::error::{CoreError, CoreResult};
use crate::modarith;
use bytemuck::TransparentWrapper;
use rand::RngCore;
use rug::integer::Order;
use rug::Integer;

/// `bitLength(n)`; by convention `bitLength(0) == 1`.
pub fn bit_length(n: &Integer) -> u32 {
    if *n == 0 {
        1
    } else {
        n.clone().abs().significant_bits()
    }
}

/// `integerSqrt(n)`, satisfying `integerSqrt(n)^2 <= n < (integerSqrt(n)+1)^2`.
pub fn integer_sqrt(n: &Integer) -> Integer {
    n.clone().abs().sqrt()
}

/// `toByteArray(n)` — little-endian magnitude bytes. Negative `n` gets a
/// trailing `0xFF` marker byte; positive `n` whose top magnitude byte has
/// its high bit set gets a trailing `0x00` guard byte, so the two never
/// collide (without the guard, a positive value like `255` — magnitude byte
/// `0xFF` — would be indistinguishable from the negative marker).
pub fn to_byte_array(n: &Integer) -> Vec<u8> {
    if *n == 0 {
        return vec![0u8];
    }
    let neg = *n < 0;
    let mag = n.clone().abs();
    let mut bytes: Vec<u8> = mag.to_digits::<u8>(Order::Lsf);
    if neg {
        bytes.push(0xFF);
    } else if bytes.last().is_some_and(|&b| b & 0x80 != 0) {
        bytes.push(0x00);
    }
    bytes
}

/// Exact inverse of [`to_byte_array`].
pub fn from_byte_array(bytes: &[u8]) -> Integer {
    if bytes.is_empty() {
        return Integer::from(0);
    }
    let last = bytes[bytes.len() - 1];
    if last == 0xFF {
        let magnitude = Integer::from_digits(&bytes[..bytes.len() - 1], Order::Lsf);
        -magnitude
    } else if last == 0x00 && bytes.len() > 1 {
        Integer::from_digits(&bytes[..bytes.len() - 1], Order::Lsf)
    } else {
        Integer::from_digits(bytes, Order::Lsf)
    }
}

/// `getBit(n, k)` — `k` must be non-negative.
pub fn get_bit(n: &Integer, k: i64) -> CoreResult<bool> {
    if k < 0 {
        return Err(CoreError::InvalidPosition);
    }
    let k = u32::try_from(k).map_err(|_| CoreError::InvalidPosition)?;
    Ok(n.get_bit(k))
}

/// `setBit(n, k, b)` — `k` must be non-negative.
pub fn set_bit(n: &Integer, k: i64, b: bool) -> CoreResult<Integer> {
    if k < 0 {
        return Err(CoreError::InvalidPosition);
    }
    let k = u32::try_from(k).map_err(|_| CoreError::InvalidPosition)?;
    let mut out = n.clone();
    out.set_bit(k, b);
    Ok(out)
}

/// `countLeadingZeros(n)` relative to the smallest 64-bit-aligned word that
/// holds `n`'s bit length (documented for use as a word-sized primitive, not
/// as an arbitrary-precision quantity). Fails `InvalidSign` for negative `n`;
/// returns the fixed value `64` for `n == 0`.
pub fn count_leading_zeros(n: &Integer) -> CoreResult<u32> {
    if *n < 0 {
        return Err(CoreError::InvalidSign);
    }
    if *n == 0 {
        return Ok(64);
    }
    let bits = bit_length(n);
    let word_bits = bits.div_ceil(64) * 64;
    Ok(word_bits - bits)
}

/// `countTrailingZeros(n)`. Fails `InvalidSign` for negative `n`; returns
/// the fixed value `64` for `n == 0`.
pub fn count_trailing_zeros(n: &Integer) -> CoreResult<u32> {
    if *n < 0 {
        return Err(CoreError::InvalidSign);
    }
    if *n == 0 {
        return Ok(64);
    }
    Ok(n.find_one(0).expect("n != 0 has a lowest set bit"))
}

/// Deterministic Miller–Rabin witnesses, sufficient for every `n < 2^64`
/// (Pomerance, Selfridge & Wagstaff / Jaeschke's bases).
const DETERMINISTIC_WITNESSES: [u32; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Bridges a `rand::RngCore` into `rug::rand`, the same adapter this
/// lineage's Paillier crate uses to keep GMP's sampling routines hooked up
/// to an arbitrary entropy source.
fn external_rand(rng: &mut impl RngCore) -> rug::rand::ThreadRandState<'_> {
    #[derive(TransparentWrapper)]
    #[repr(transparent)]
    struct ExternalRand<R>(R);

    impl<R: RngCore> rug::rand::ThreadRandGen for ExternalRand<R> {
        fn gen(&mut self) -> u32 {
            self.0.next_u32()
        }
    }

    rug::rand::ThreadRandState::new_custom(ExternalRand::wrap_mut(rng))
}

/// `isProbablePrime(n, rounds=5)`. Small-case short circuits, then
/// deterministic witnesses below `2^64`, else `rounds` random witnesses in
/// `[2, n-2]` drawn from the OS CSPRNG.
pub fn is_probable_prime(n: &Integer, rounds: u32) -> bool {
    if *n < 2 {
        return false;
    }
    if *n == 2 || *n == 3 {
        return true;
    }
    if n.is_even() {
        return false;
    }

    let cfg = ArithmeticConfig::default();
    if bit_length(n) <= 64 {
        for &w in &DETERMINISTIC_WITNESSES {
            let witness = Integer::from(w);
            if witness >= *n {
                continue;
            }
            if !miller_rabin_round(n, &witness, &cfg) {
                return false;
            }
        }
        return true;
    }

    let mut rng = rand::rngs::OsRng;
    let upper = Integer::from(n - 3); // upper bound for range [2, n-2], exclusive at n-3+2=n-1
    for _ in 0..rounds.max(1) {
        let mut ext = external_rand(&mut rng);
        let witness = Integer::from(upper.random_below_ref(&mut ext)) + 2;
        if !miller_rabin_round(n, &witness, &cfg) {
            return false;
        }
    }
    true
}

fn miller_rabin_round(n: &Integer, witness: &Integer, cfg: &ArithmeticConfig) -> bool {
    let n_minus_1 = Integer::from(n - 1);
    let mut d = n_minus_1.clone();
    let mut r = 0u32;
    while d.is_even() {
        d >>= 1;
        r += 1;
    }

    let mut x = match modarith::mod_pow(witness, &d, n, cfg, None) {
        Ok(v) => v,
        Err(_) => return false,
    };
    if x == 1 || x == n_minus_1 {
        return true;
    }
    for _ in 1..r {
        x = match modarith::mod_mul(&x, &x, n, cfg) {
            Ok(v) => v,
            Err(_) => return false,
        };
        if x == n_minus_1 {
            return true;
        }
    }
    false
}

/// `getRandomBigInt(bits)` — uniform in `[0, 2^bits)`, drawn from the OS
/// CSPRNG. Fails `InvalidSize` if `bits <= 0`.
pub fn get_random_big_int(bits: i64) -> CoreResult<Integer> {
    if bits <= 0 {
        return Err(CoreError::InvalidSize);
    }
    let bits = u32::try_from(bits).map_err(|_| CoreError::InvalidSize)?;
    let mut rng = rand::rngs::OsRng;
    let mut ext = external_rand(&mut rng);
    Ok(Integer::from(Integer::random_bits(bits, &mut ext)))
}
