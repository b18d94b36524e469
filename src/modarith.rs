//! # ModArith — Arbitrary-Precision Modular Arithmetic
//!
//! The load-bearing module: every other component (checksum folding, chunk
//! encode/decode, the NTT engine, Miller–Rabin in [`crate::bigint`]) reduces
//! to a call down here. Built on `rug::Integer` (GMP), but the algorithms
//! themselves — Russian-peasant modular multiplication, square-and-multiply
//! and sliding-window exponentiation, iterative extended GCD, Stein's binary
//! GCD — are written out by hand rather than delegated to GMP's own
//! higher-level routines.
//!
//! All functions are pure and reentrant; nothing here holds or needs a lock.

use crate::cache::Memo;
use crate::config::ArithmeticConfig;
use crate::error::{CoreError, CoreResult};
use rug::Integer;

/// `bitLength(n)`, duplicated here (rather than imported from
/// [`crate::bigint`]) to avoid a dependency cycle — `bigint::is_probable_prime`
/// calls into this module, so this module cannot call back into `bigint`.
fn bit_length(n: &Integer) -> u32 {
    if *n == 0 {
        1
    } else {
        n.clone().abs().significant_bits()
    }
}

fn check_strict(op: &'static str, cfg: &ArithmeticConfig, values: &[&Integer]) -> CoreResult<()> {
    if !cfg.strict {
        return Ok(());
    }
    let actual = values.iter().map(|v| bit_length(v)).max().unwrap_or(1);
    if actual > cfg.max_supported_bits {
        return Err(CoreError::BitSizeExceeded {
            op,
            limit: cfg.max_supported_bits,
            actual,
        });
    }
    Ok(())
}

/// `mod(a, m)`. Python-compatible mode (the default) returns a canonical
/// residue in `[0, |m|)`; otherwise returns the sign-preserving (truncated)
/// remainder.
pub fn modulo(a: &Integer, m: &Integer, cfg: &ArithmeticConfig) -> CoreResult<Integer> {
    if *m == 0 {
        return Err(CoreError::DivisionByZero);
    }
    check_strict("mod", cfg, &[a, m])?;
    let m_abs = m.clone().abs();
    let r = a.clone() % &m_abs;
    if cfg.python_compatible {
        let r = (r + &m_abs) % &m_abs;
        Ok(r)
    } else {
        Ok(r)
    }
}

/// `modMul(a, b, m)`. Below `NATIVE_THRESHOLD` combined bit length, reduces
/// directly; above it, uses Russian-peasant doubling (repeatedly doubling an
/// accumulator and reducing modulo `m` at each step) instead of a single wide
/// multiply, mirroring the overflow-safe technique a fixed-width
/// implementation would need even though `rug::Integer` itself never
/// overflows.
pub fn mod_mul(a: &Integer, b: &Integer, m: &Integer, cfg: &ArithmeticConfig) -> CoreResult<Integer> {
    if *m == 0 {
        return Err(CoreError::DivisionByZero);
    }
    check_strict("modMul", cfg, &[a, b, m])?;
    let m_abs = m.clone().abs();
    if m_abs == 1 {
        return Ok(Integer::from(0));
    }
    if bit_length(a) + bit_length(b) <= cfg.native_threshold {
        let product = Integer::from(a * b);
        return modulo(&product, &m_abs, cfg);
    }

    let mut x = modulo(a, &m_abs, cfg)?;
    let mut y = modulo(b, &m_abs, cfg)?;
    let mut acc = Integer::from(0);
    while y > 0 {
        if y.is_odd() {
            acc = (acc + &x) % &m_abs;
        }
        x = (Integer::from(&x * 2)) % &m_abs;
        y >>= 1;
    }
    Ok(acc)
}

/// `extendedGcd(a, b) -> (g, x, y)` with `a*x + b*y == g`. Iterative (no
/// recursion, so it is safe for arbitrarily large inputs).
pub fn extended_gcd(a: &Integer, b: &Integer) -> (Integer, Integer, Integer) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_s, mut s) = (Integer::from(1), Integer::from(0));
    let (mut old_t, mut t) = (Integer::from(0), Integer::from(1));

    while r != 0 {
        let q = Integer::from(&old_r / &r);
        let new_r = Integer::from(&old_r - &q * &r);
        old_r = std::mem::replace(&mut r, new_r);
        let new_s = Integer::from(&old_s - &q * &s);
        old_s = std::mem::replace(&mut s, new_s);
        let new_t = Integer::from(&old_t - &q * &t);
        old_t = std::mem::replace(&mut t, new_t);
    }
    (old_r, old_s, old_t)
}

/// `modInverse(a, m)` via extended GCD. Fails with `NoInverse` if
/// `gcd(a, m) != 1`, `DivisionByZero` if `a == 0` or `m == 0`.
pub fn mod_inverse(
    a: &Integer,
    m: &Integer,
    cfg: &ArithmeticConfig,
    cache: Option<&mut Memo<Integer>>,
) -> CoreResult<Integer> {
    if *a == 0 || *m == 0 {
        return Err(CoreError::DivisionByZero);
    }
    check_strict("modInverse", cfg, &[a, m])?;

    if let Some(cache) = cache {
        let key = format!("inv:{a}:{m}");
        if let Some(hit) = cache.get(&key) {
            return Ok(hit.clone());
        }
        let result = mod_inverse_uncached(a, m)?;
        cache.insert(key, result.clone());
        return Ok(result);
    }
    mod_inverse_uncached(a, m)
}

fn mod_inverse_uncached(a: &Integer, m: &Integer) -> CoreResult<Integer> {
    let m_abs = m.clone().abs();
    let (g, x, _) = extended_gcd(a, &m_abs);
    if g.clone().abs() != 1 {
        return Err(CoreError::NoInverse {
            a: a.clone(),
            m: m.clone(),
            gcd: g,
        });
    }
    let inv = ((x % &m_abs) + &m_abs) % &m_abs;
    Ok(inv)
}

/// `gcd(a, b)`, operating on `|a|, |b|`.
pub fn gcd(a: &Integer, b: &Integer) -> Integer {
    Integer::from(a.clone().abs().gcd(&b.clone().abs()))
}

/// `binaryGcd(a, b)` — Stein's algorithm: factor out common powers of two,
/// then repeatedly subtract-and-halve instead of using division.
pub fn binary_gcd(a: &Integer, b: &Integer) -> Integer {
    let mut u = a.clone().abs();
    let mut v = b.clone().abs();
    if u == 0 {
        return v;
    }
    if v == 0 {
        return u;
    }
    let mut shift = 0u32;
    while u.is_even() && v.is_even() {
        u >>= 1;
        v >>= 1;
        shift += 1;
    }
    while u.is_even() {
        u >>= 1;
    }
    while v != 0 {
        while v.is_even() {
            v >>= 1;
        }
        if u > v {
            std::mem::swap(&mut u, &mut v);
        }
        v -= &u;
    }
    u << shift
}

/// `lcm(a, b)`. Zero if either input is zero. Divides out the GCD before
/// multiplying to avoid an unnecessarily large intermediate value.
pub fn lcm(a: &Integer, b: &Integer) -> Integer {
    if *a == 0 || *b == 0 {
        return Integer::from(0);
    }
    let g = gcd(a, b);
    let a_abs = a.clone().abs();
    let b_abs = b.clone().abs();
    Integer::from(&a_abs / &g) * b_abs
}

/// `modPow(base, exp, m)` via square-and-multiply. `m == 1` always yields
/// `0`; `exp == 0` always yields `1` (even for `base == 0`); negative `exp`
/// is handled by inverting the base and negating the exponent.
pub fn mod_pow(
    base: &Integer,
    exp: &Integer,
    m: &Integer,
    cfg: &ArithmeticConfig,
    mut cache: Option<&mut Memo<Integer>>,
) -> CoreResult<Integer> {
    if *m == 0 {
        return Err(CoreError::DivisionByZero);
    }
    check_strict("modPow", cfg, &[base, exp, m])?;
    let m_abs = m.clone().abs();
    if m_abs == 1 {
        return Ok(Integer::from(0));
    }
    if *exp == 0 {
        return Ok(Integer::from(1));
    }

    let cache_key = format!("pow:{base}:{exp}:{m}");
    if let Some(cache) = cache.as_deref_mut() {
        if let Some(hit) = cache.get(&cache_key) {
            return Ok(hit.clone());
        }
    }

    let (base, exp) = if *exp < 0 {
        let inv = mod_inverse(base, &m_abs, cfg, None)?;
        (inv, Integer::from(-exp))
    } else {
        (modulo(base, &m_abs, cfg)?, exp.clone())
    };

    if base == 0 {
        return Ok(Integer::from(0));
    }

    let result = if cfg.use_optimized {
        sliding_window_mod_pow_inner(&base, &exp, &m_abs, cfg, 4)?
    } else {
        let mut result = Integer::from(1);
        let mut b = base;
        let mut e = exp;
        while e > 0 {
            if e.is_odd() {
                result = mod_mul(&result, &b, &m_abs, cfg)?;
            }
            e >>= 1;
            if e > 0 {
                b = mod_mul(&b, &b, &m_abs, cfg)?;
            }
        }
        result
    };

    if let Some(cache) = cache {
        cache.insert(cache_key, result.clone());
    }
    Ok(result)
}

/// `slidingWindowModPow(base, exp, m, w=4)`. Precomputes odd powers of
/// `base` up to `2^(w-1)` and scans the exponent MSB-to-LSB, squaring once
/// per zero bit and squaring-then-multiplying once per maximal run of `1`
/// bits (up to length `w`).
pub fn sliding_window_mod_pow(
    base: &Integer,
    exp: &Integer,
    m: &Integer,
    cfg: &ArithmeticConfig,
    window: u32,
) -> CoreResult<Integer> {
    if *m == 0 {
        return Err(CoreError::DivisionByZero);
    }
    let m_abs = m.clone().abs();
    if m_abs == 1 {
        return Ok(Integer::from(0));
    }
    if *exp == 0 {
        return Ok(Integer::from(1));
    }
    let (base, exp) = if *exp < 0 {
        let inv = mod_inverse(base, &m_abs, cfg, None)?;
        (inv, Integer::from(-exp))
    } else {
        (modulo(base, &m_abs, cfg)?, exp.clone())
    };
    if base == 0 {
        return Ok(Integer::from(0));
    }
    sliding_window_mod_pow_inner(&base, &exp, &m_abs, cfg, window)
}

fn sliding_window_mod_pow_inner(
    base: &Integer,
    exp: &Integer,
    m: &Integer,
    cfg: &ArithmeticConfig,
    window: u32,
) -> CoreResult<Integer> {
    let window = window.max(1);
    let table_size = 1usize << (window - 1);
    // odd_powers[k] = base^(2k+1) mod m
    let mut odd_powers = Vec::with_capacity(table_size);
    odd_powers.push(base.clone());
    if table_size > 1 {
        let base_sq = mod_mul(base, base, m, cfg)?;
        for k in 1..table_size {
            let next = mod_mul(&odd_powers[k - 1], &base_sq, m, cfg)?;
            odd_powers.push(next);
        }
    }

    let bits = bit_length(exp);
    let mut result = Integer::from(1);
    let mut i = bits as i64 - 1;
    while i >= 0 {
        if !exp.get_bit(i as u32) {
            result = mod_mul(&result, &result, m, cfg)?;
            i -= 1;
        } else {
            // Find the longest run of 1s of length <= window starting here.
            let mut len = 1u32;
            while len < window && i - len as i64 >= 0 && exp.get_bit((i - len as i64) as u32) {
                len += 1;
            }
            // Square `len` times, then multiply by the odd power for this window value.
            let mut window_val: u64 = 0;
            for b in 0..len {
                let bit = exp.get_bit((i - b as i64) as u32);
                window_val = (window_val << 1) | (bit as u64);
                result = mod_mul(&result, &result, m, cfg)?;
            }
            let table_index = ((window_val - 1) / 2) as usize;
            result = mod_mul(&result, &odd_powers[table_index], m, cfg)?;
            i -= len as i64;
        }
    }
    Ok(result)
}

/// `isPrimitiveRoot(g, order, m)` — `true` iff `g` has exactly `order` as its
/// multiplicative order modulo `m`: `g^order == 1` and, for every distinct
/// prime factor `l` of `order`, `g^(order/l) != 1`. `order`'s factors come
/// from the same [`crate::registry::PrimeRegistry`] the checksum and codec
/// layers already depend on, rather than a separate factorization routine.
pub fn is_primitive_root(
    g: &Integer,
    order: &Integer,
    m: &Integer,
    registry: &dyn crate::registry::PrimeRegistry,
    cfg: &ArithmeticConfig,
) -> CoreResult<bool> {
    if *order <= 0 {
        return Err(CoreError::invalid_field("order"));
    }
    if mod_pow(g, order, m, cfg, None)? != 1 {
        return Ok(false);
    }
    for (prime, _) in registry.factor(order)? {
        let reduced_order = Integer::from(order / &prime);
        if mod_pow(g, &reduced_order, m, cfg, None)? == 1 {
            return Ok(false);
        }
    }
    Ok(true)
}
