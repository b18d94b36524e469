//! # NTT — Number-Theoretic Transform Engine
//!
//! An iterative, bit-reversal-permuted Cooley–Tukey transform over
//! `rug::Integer` residues modulo a prime `q`, grounded in the twiddle-factor
//! precomputation and bit-reversal scheme of a dedicated NTT crate in this
//! retrieval pack (`rust_ntt::context::NttContext`), generalized from that
//! crate's const-generic, fixed-word `u64` degree to a runtime-sized
//! `rug::Integer` transform so it can share [`crate::modarith`]'s
//! arbitrary-precision primitives instead of a separate Barrett-reduction
//! context.
//!
//! `(modulus, root, size)` must satisfy: `modulus` prime, `size` a power of
//! two, `size | (modulus - 1)`, and `root` a primitive `size`-th root of
//! unity modulo `modulus` — checked with [`crate::modarith::is_primitive_root`],
//! which verifies order exactly `size` rather than the weaker (and wrong for
//! composite `modulus - 1`) check of `g^((modulus-1)/2) != 1` alone.
//!
//! Inputs shorter than `size` are zero-padded up to the next power of two
//! `n <= size` rather than rejected outright — `forward`/`inverse` butterfly
//! only the first `n` slots, indexing the context's size-`size` root table at
//! stride `size/len`, and truncate the result back to the caller's original
//! length. `convolve` pads both operands to the next power of two covering
//! the full linear-convolution length `len(a) + len(b) - 1` and truncates the
//! result to that length rather than performing a cyclic convolution fixed at
//! `size`.

use crate::bigint;
use crate::config::ArithmeticConfig;
use crate::error::{CoreError, CoreResult};
use crate::modarith;
use crate::registry::PrimeRegistry;
use rug::Integer;

/// Precomputed transform context for a fixed `(modulus, root, size)` triple.
/// Construction is the expensive part (primality + primitive-root checks);
/// `forward`/`inverse`/`convolve` are cheap to call repeatedly afterward.
#[derive(Debug, Clone)]
pub struct NttContext {
    modulus: Integer,
    root: Integer,
    inv_root: Integer,
    size: usize,
    cfg: ArithmeticConfig,
}

impl NttContext {
    pub fn new(
        modulus: Integer,
        root: Integer,
        size: usize,
        registry: &dyn PrimeRegistry,
        cfg: ArithmeticConfig,
    ) -> CoreResult<Self> {
        if size == 0 || !size.is_power_of_two() {
            return Err(CoreError::InvalidContext {
                reason: format!("size {size} is not a positive power of two"),
            });
        }
        if !bigint::is_probable_prime(&modulus, 25) {
            return Err(CoreError::InvalidContext {
                reason: format!("modulus {modulus} is not prime"),
            });
        }
        let size_int = Integer::from(size as u64);
        let modulus_minus_one = Integer::from(&modulus - 1);
        if Integer::from(&modulus_minus_one % &size_int) != 0 {
            return Err(CoreError::InvalidContext {
                reason: format!("size {size} does not divide modulus - 1"),
            });
        }
        if !modarith::is_primitive_root(&root, &size_int, &modulus, registry, &cfg)? {
            return Err(CoreError::InvalidContext {
                reason: format!("{root} is not a primitive {size}-th root of unity mod {modulus}"),
            });
        }
        let inv_root = modarith::mod_inverse(&root, &modulus, &cfg, None)?;
        Ok(NttContext {
            modulus,
            root,
            inv_root,
            size,
            cfg,
        })
    }

    pub fn modulus(&self) -> &Integer {
        &self.modulus
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Next power of two covering `len`, or `InvalidContext` if it would
    /// exceed `self.size` — the context's root only has order `size`, so no
    /// larger transform can be built from it.
    fn padded_len(&self, len: usize) -> CoreResult<usize> {
        let n = len.next_power_of_two();
        if n > self.size {
            return Err(CoreError::InvalidContext {
                reason: format!("padded length {n} exceeds context size {}", self.size),
            });
        }
        Ok(n)
    }

    fn pad(values: &[Integer], n: usize) -> Vec<Integer> {
        let mut padded = values.to_vec();
        padded.resize_with(n, || Integer::from(0));
        padded
    }

    /// Iterative decimation-in-time Cooley–Tukey transform over the first
    /// `n` slots of `values` (`values.len() == n`, a power of two `<=
    /// self.size`), bit-reversal permutation first, then `log2(n)` butterfly
    /// passes. Twiddles are drawn from the context's full `size`-th root at
    /// stride `size/len`, so the result is correct even when `n < self.size`.
    fn transform(&self, values: &[Integer], root: &Integer, n: usize) -> CoreResult<Vec<Integer>> {
        let mut a = values.to_vec();
        bit_reverse_permute(&mut a);

        let mut len = 2usize;
        while len <= n {
            let half = len / 2;
            let exponent = Integer::from((self.size / len) as u64);
            let w_len = modarith::mod_pow(root, &exponent, &self.modulus, &self.cfg, None)?;
            let mut i = 0;
            while i < n {
                let mut w = Integer::from(1);
                for j in 0..half {
                    let u = a[i + j].clone();
                    let v = modarith::mod_mul(&a[i + j + half], &w, &self.modulus, &self.cfg)?;
                    a[i + j] = modarith::modulo(&(Integer::from(&u + &v)), &self.modulus, &self.cfg)?;
                    a[i + j + half] = modarith::modulo(&(Integer::from(&u - &v)), &self.modulus, &self.cfg)?;
                    w = modarith::mod_mul(&w, &w_len, &self.modulus, &self.cfg)?;
                }
                i += len;
            }
            len <<= 1;
        }
        Ok(a)
    }

    /// `forward(v)` — zero-pads `v` to the next power of two `n <= size`,
    /// transforms, and returns only the first `len(v)` entries of the
    /// result.
    pub fn forward(&self, values: &[Integer]) -> CoreResult<Vec<Integer>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let n = self.padded_len(values.len())?;
        let padded = Self::pad(values, n);
        let transformed = self.transform(&padded, &self.root, n)?;
        Ok(transformed.into_iter().take(values.len()).collect())
    }

    /// `inverse(v)` — transform with `root^-1` over the same padded length
    /// `n` as `forward` would use for `v`, then scale by `n^-1` (not the
    /// context's fixed `size^-1`) before truncating back to `len(v)`.
    pub fn inverse(&self, values: &[Integer]) -> CoreResult<Vec<Integer>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let n = self.padded_len(values.len())?;
        let padded = Self::pad(values, n);
        let mut out = self.transform(&padded, &self.inv_root, n)?;
        let inv_n = modarith::mod_inverse(&Integer::from(n as u64), &self.modulus, &self.cfg, None)?;
        for v in out.iter_mut() {
            *v = modarith::mod_mul(v, &inv_n, &self.modulus, &self.cfg)?;
        }
        Ok(out.into_iter().take(values.len()).collect())
    }

    /// `verify(values)` — `true` iff `inverse(forward(values)) == values`.
    /// Guaranteed to hold when `values.len()` is already a power of two (no
    /// padding actually occurs); for other lengths `forward` discards the
    /// spectral entries past `len(values)`, so the round trip is not exact.
    pub fn verify(&self, values: &[Integer]) -> CoreResult<bool> {
        let forward = self.forward(values)?;
        let round_trip = self.inverse(&forward)?;
        Ok(round_trip == values)
    }

    /// `convolve(a, b)` — linear convolution: pads both operands to the next
    /// power of two covering `len(a) + len(b) - 1`, transforms, multiplies
    /// pointwise, inverse-transforms, and truncates to that combined length.
    pub fn convolve(&self, a: &[Integer], b: &[Integer]) -> CoreResult<Vec<Integer>> {
        if a.is_empty() || b.is_empty() {
            return Ok(Vec::new());
        }
        let target_len = a.len() + b.len() - 1;
        let n = self.padded_len(target_len)?;
        let padded_a = Self::pad(a, n);
        let padded_b = Self::pad(b, n);
        let fa = self.transform(&padded_a, &self.root, n)?;
        let fb = self.transform(&padded_b, &self.root, n)?;
        let mut product = Vec::with_capacity(n);
        for (x, y) in fa.iter().zip(fb.iter()) {
            product.push(modarith::mod_mul(x, y, &self.modulus, &self.cfg)?);
        }
        let inv_n = modarith::mod_inverse(&Integer::from(n as u64), &self.modulus, &self.cfg, None)?;
        let mut result = self.transform(&product, &self.inv_root, n)?;
        for v in result.iter_mut() {
            *v = modarith::mod_mul(v, &inv_n, &self.modulus, &self.cfg)?;
        }
        Ok(result.into_iter().take(target_len).collect())
    }

    /// `applyWindow(signal, kind)` — elementwise multiplication by a
    /// fixed-point window coefficient (numerator over `FIXED_POINT_SCALE`),
    /// reduced modulo the context's modulus, coefficient shape parameterized
    /// by `signal.len()` rather than the context's `size` so a shorter
    /// signal gets its own well-formed window rather than one stretched
    /// across `size` samples. A preprocessing step applied before `forward`,
    /// not part of the transform itself. `Rectangular`'s coefficient is
    /// exactly `1.0` everywhere, so it round-trips back to `signal`
    /// unchanged.
    pub fn apply_window(&self, signal: &[Integer], kind: WindowKind) -> CoreResult<Vec<Integer>> {
        if signal.len() > self.size {
            return Err(CoreError::InvalidContext {
                reason: format!("signal length {} exceeds context size {}", signal.len(), self.size),
            });
        }
        const FIXED_POINT_SCALE: i64 = 1 << 20;
        let scale_inv = modarith::mod_inverse(&Integer::from(FIXED_POINT_SCALE), &self.modulus, &self.cfg, None)?;
        signal
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let coefficient = kind.coefficient(i, signal.len());
                let numerator = (coefficient * FIXED_POINT_SCALE as f64).round() as i64;
                let scaled = modarith::mod_mul(v, &Integer::from(numerator), &self.modulus, &self.cfg)?;
                modarith::mod_mul(&scaled, &scale_inv, &self.modulus, &self.cfg)
            })
            .collect()
    }
}

fn bit_reverse_permute(a: &mut [Integer]) {
    let n = a.len();
    let bits = n.trailing_zeros();
    for i in 0..n {
        let j = bit_reverse(i, bits);
        if j > i {
            a.swap(i, j);
        }
    }
}

fn bit_reverse(mut x: usize, bits: u32) -> usize {
    let mut r = 0usize;
    for _ in 0..bits {
        r = (r << 1) | (x & 1);
        x >>= 1;
    }
    r
}

/// Window functions available to [`NttContext::apply_window`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowKind {
    Rectangular,
    Hamming,
    Blackman,
    /// Kaiser window with shape parameter beta.
    Kaiser(f64),
}

impl WindowKind {
    fn coefficient(&self, i: usize, n: usize) -> f64 {
        if n <= 1 {
            return 1.0;
        }
        let x = i as f64 / (n - 1) as f64;
        match self {
            WindowKind::Rectangular => 1.0,
            WindowKind::Hamming => 0.54 - 0.46 * (2.0 * std::f64::consts::PI * x).cos(),
            WindowKind::Blackman => {
                0.42 - 0.5 * (2.0 * std::f64::consts::PI * x).cos()
                    + 0.08 * (4.0 * std::f64::consts::PI * x).cos()
            }
            WindowKind::Kaiser(beta) => {
                let arg = 2.0 * x - 1.0;
                bessel_i0(*beta * (1.0 - arg * arg).max(0.0).sqrt()) / bessel_i0(*beta)
            }
        }
    }
}

/// Modified Bessel function of the first kind, order zero, via its power
/// series — accurate enough for window-coefficient generation at the
/// `beta` magnitudes this module uses.
fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    for k in 1..=32 {
        term *= (x / (2.0 * k as f64)).powi(2);
        sum += term;
        if term < 1e-18 {
            break;
        }
    }
    sum
}
