//! # Codec — Checksum-Attached Chunk Codec
//!
//! Every chunk is a single `rug::Integer` whose prime factorization *is* its
//! schema: which primes carry which exponent offsets tells a decoder what
//! kind of chunk it is looking at, without a separate tag byte. The four
//! schemas share the registry's low ordinals as reserved structural primes
//! (2, 3, 5, 7, 11, 13) and a checksum factor at `CHECKSUM_POWER`; an
//! `OPERATION` chunk's own opcode prime is required to fall outside that
//! reserved set so the determination order below never has to guess.
//!
//! Determination order on decode, applied in this sequence (first match
//! wins):
//! 1. **Operation** — some core factor `(p, e)` has `e == OPERATION` and `p`
//!    is not one of the reserved structural primes.
//! 2. **Block header** — a core factor on prime 7 has exponent `>= BLOCK_HEADER`
//!    (plain block) or a core factor on prime 11 has exponent `>= BLOCK_HEADER`
//!    (NTT block).
//! 3. **Data** — core factors on primes 2 and 3 fall in the `DATA_POSITION`/
//!    `DATA_VALUE` ranges.
//!
//! The schema tag is folded into the factorization itself rather than
//! carried as a literal byte header, so a chunk's shape and its integrity
//! check travel together in the same integer.

use crate::error::{CoreError, CoreResult};
use crate::registry::PrimeRegistry;
use rug::Integer;
use std::collections::HashSet;

/// Exponent a checksum factor always carries by default; configurable
/// per call site via [`crate::config::ChecksumConfig`].
pub const CHECKSUM_POWER: u32 = 6;

/// Offset added to `position mod 8` on prime 2 in a Data chunk.
pub const DATA_POSITION: u32 = 10;
/// Offset added to `value mod 128` on prime 3 in a Data chunk.
pub const DATA_VALUE: u32 = 30;
/// Exact exponent an Operation chunk's opcode prime carries.
pub const OPERATION: u32 = 500;
/// Offset added to an operand on prime 5 in an Operation chunk.
pub const OPERAND: u32 = 50;
/// Exact exponent a Block/NTT header's tag prime carries.
pub const BLOCK_HEADER: u32 = 1000;

/// Primes the Data and Block/NTT-header schemas reserve for structural use;
/// an Operation chunk's opcode prime must fall outside this set.
fn reserved_primes() -> HashSet<u32> {
    [2u32, 3, 5, 7, 11, 13].into_iter().collect()
}

/// The decoded shape of a chunk, tagged by which schema its factorization matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedChunk {
    Data { position: u64, value: u64 },
    Operation { opcode: Integer, operand: Option<u64> },
    BlockHeader { length: u64, ntt: bool },
}

/// `encodeData(position, value)` — builds the raw (pre-checksum) factor list
/// for one character/byte at `position` with code point `value`.
fn data_factors(position: u64, value: u64) -> Vec<(Integer, u32)> {
    vec![
        (Integer::from(2), DATA_POSITION + (position % 8) as u32),
        (Integer::from(3), DATA_VALUE + (value % 128) as u32),
        (Integer::from(5), (position / 8) as u32 + 1),
        (Integer::from(7), (value / 128) as u32 + 1),
    ]
}

/// `encodeData(position, value)` — attaches a checksum and returns the
/// chunk value.
pub fn encode_data(
    position: u64,
    value: u64,
    registry: &dyn PrimeRegistry,
    checksum_power: u32,
) -> CoreResult<Integer> {
    let factors = data_factors(position, value);
    let raw = reconstruct(&factors);
    crate::checksum::attach_checksum(&raw, &factors, registry, checksum_power)
}

/// `encodeText(text)` — `encodeData(i, codepoint)` for every character.
pub fn encode_text(
    text: &str,
    registry: &dyn PrimeRegistry,
    checksum_power: u32,
) -> CoreResult<Vec<Integer>> {
    text.chars()
        .enumerate()
        .map(|(i, c)| encode_data(i as u64, c as u64, registry, checksum_power))
        .collect()
}

/// `encodeOperation(opcode, operand)` — `opcode` must be a prime outside the
/// reserved structural set.
pub fn encode_operation(
    opcode: &Integer,
    operand: Option<u64>,
    registry: &dyn PrimeRegistry,
    checksum_power: u32,
) -> CoreResult<Integer> {
    let reserved = reserved_primes();
    if let Some(small) = opcode.to_u32() {
        if reserved.contains(&small) {
            return Err(CoreError::invalid_field("opcode"));
        }
    }
    let mut factors = vec![(opcode.clone(), OPERATION)];
    if let Some(operand) = operand {
        factors.push((Integer::from(5), OPERAND + operand as u32));
    }
    let raw = reconstruct(&factors);
    crate::checksum::attach_checksum(&raw, &factors, registry, checksum_power)
}

/// `encodeBlock(chunks)` — prepends `reconstruct([(7, BLOCK_HEADER), (11, len)])`
/// to the given chunk values.
pub fn encode_block(
    chunks: &[Integer],
    registry: &dyn PrimeRegistry,
    checksum_power: u32,
) -> CoreResult<Vec<Integer>> {
    let header_factors = vec![(Integer::from(7), BLOCK_HEADER), (Integer::from(11), chunks.len() as u32)];
    let raw = reconstruct(&header_factors);
    let header = crate::checksum::attach_checksum(&raw, &header_factors, registry, checksum_power)?;
    let mut out = Vec::with_capacity(chunks.len() + 1);
    out.push(header);
    out.extend_from_slice(chunks);
    Ok(out)
}

/// `encodeNttBlock(chunks)` — prepends `reconstruct([(11, BLOCK_HEADER), (13, len)])`.
pub fn encode_ntt_block(
    chunks: &[Integer],
    registry: &dyn PrimeRegistry,
    checksum_power: u32,
) -> CoreResult<Vec<Integer>> {
    let header_factors = vec![(Integer::from(11), BLOCK_HEADER), (Integer::from(13), chunks.len() as u32)];
    let raw = reconstruct(&header_factors);
    let header = crate::checksum::attach_checksum(&raw, &header_factors, registry, checksum_power)?;
    let mut out = Vec::with_capacity(chunks.len() + 1);
    out.push(header);
    out.extend_from_slice(chunks);
    Ok(out)
}

fn reconstruct(factors: &[(Integer, u32)]) -> Integer {
    let mut product = Integer::from(1);
    for (p, e) in factors {
        product *= p.clone().pow(*e);
    }
    product
}

/// `validateChunkStructure(value)` — `true` iff `value` factors into exactly
/// one of the known schemas with a valid checksum.
pub fn validate_chunk_structure(value: &Integer, registry: &dyn PrimeRegistry, checksum_power: u32) -> bool {
    decode_chunk(value, registry, checksum_power).is_ok()
}

/// `decodeChunk(value)` — classifies and fully reconstructs a chunk's
/// logical fields, rejecting the value via `ChecksumMismatch` if its
/// checksum doesn't recompute, or `MalformedChunk` if it fails all three
/// schema checks.
pub fn decode_chunk(
    value: &Integer,
    registry: &dyn PrimeRegistry,
    checksum_power: u32,
) -> CoreResult<DecodedChunk> {
    use crate::verify::VerifyOutcome;

    let outcome = crate::verify::verify_value(value, registry, checksum_power)?;
    let core_factors = match outcome {
        VerifyOutcome::Valid { core_factors, .. } => core_factors,
        VerifyOutcome::Invalid { expected, actual, .. } => {
            return Err(CoreError::ChecksumMismatch { expected, actual })
        }
    };

    let reserved = reserved_primes();
    let find = |prime: u32| -> Option<u32> {
        core_factors.iter().find_map(|(p, e)| {
            if p.to_u32() == Some(prime) {
                Some(*e)
            } else {
                None
            }
        })
    };

    // 1. Operation: some factor on a non-reserved prime with exponent == OPERATION.
    if let Some((opcode, _)) = core_factors
        .iter()
        .find(|(p, e)| *e == OPERATION && p.to_u32().map_or(true, |v| !reserved.contains(&v)))
    {
        match find(5) {
            None => {
                return Ok(DecodedChunk::Operation {
                    opcode: opcode.clone(),
                    operand: None,
                });
            }
            Some(e) if e >= OPERAND => {
                return Ok(DecodedChunk::Operation {
                    opcode: opcode.clone(),
                    operand: Some(u64::from(e - OPERAND)),
                });
            }
            Some(_) => {
                // Exponent on prime 5 too small to be a valid operand offset;
                // not a well-formed Operation chunk, fall through.
            }
        }
    }

    // 2. Block header: prime 7 or prime 11 carries the tag exponent.
    if let Some(tag) = find(7) {
        if tag >= BLOCK_HEADER {
            let length = find(11).ok_or_else(|| CoreError::MalformedChunk {
                chunk: value.clone(),
                reason: "block header missing length factor on prime 11".into(),
            })?;
            return Ok(DecodedChunk::BlockHeader {
                length: u64::from(length),
                ntt: false,
            });
        }
    }
    if let Some(tag) = find(11) {
        if tag >= BLOCK_HEADER {
            let length = find(13).ok_or_else(|| CoreError::MalformedChunk {
                chunk: value.clone(),
                reason: "NTT block header missing length factor on prime 13".into(),
            })?;
            return Ok(DecodedChunk::BlockHeader {
                length: u64::from(length),
                ntt: true,
            });
        }
    }

    // 3. Data: primes 2 and 3 in their respective offset ranges.
    if let (Some(e2), Some(e3)) = (find(2), find(3)) {
        if e2 >= DATA_POSITION && e3 >= DATA_VALUE {
            let position_low = e2 - DATA_POSITION;
            let value_low = e3 - DATA_VALUE;
            let position_high = find(5).unwrap_or(1).saturating_sub(1);
            let value_high = find(7).unwrap_or(1).saturating_sub(1);
            let position = u64::from(position_high) * 8 + u64::from(position_low);
            let value = u64::from(value_high) * 128 + u64::from(value_low);
            return Ok(DecodedChunk::Data { position, value });
        }
    }

    Err(CoreError::MalformedChunk {
        chunk: value.clone(),
        reason: "factorization matches no known chunk schema".into(),
    })
}

/// `decodeText(chunks)` — decodes a sequence of Data chunks back into a
/// `String`, placing each character at its recorded position. Chunks are
/// expected in position order; gaps are a `MalformedChunk` error, not a
/// silently-padded string.
pub fn decode_text(chunks: &[Integer], registry: &dyn PrimeRegistry, checksum_power: u32) -> CoreResult<String> {
    let mut chars = Vec::with_capacity(chunks.len());
    for (expected_position, chunk) in chunks.iter().enumerate() {
        match decode_chunk(chunk, registry, checksum_power)? {
            DecodedChunk::Data { position, value } => {
                if position != expected_position as u64 {
                    return Err(CoreError::MalformedChunk {
                        chunk: chunk.clone(),
                        reason: format!("expected position {expected_position}, found {position}"),
                    });
                }
                let c = char::from_u32(value as u32).ok_or_else(|| CoreError::MalformedChunk {
                    chunk: chunk.clone(),
                    reason: format!("{value} is not a valid Unicode scalar value"),
                })?;
                chars.push(c);
            }
            other => {
                return Err(CoreError::MalformedChunk {
                    chunk: chunk.clone(),
                    reason: format!("expected a Data chunk, decoded {other:?}"),
                })
            }
        }
    }
    Ok(chars.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SievePrimeRegistry;

    #[test]
    fn data_round_trips() {
        let registry = SievePrimeRegistry::new();
        let chunk = encode_data(3, b'A' as u64, &registry, CHECKSUM_POWER).unwrap();
        match decode_chunk(&chunk, &registry, CHECKSUM_POWER).unwrap() {
            DecodedChunk::Data { position, value } => {
                assert_eq!(position, 3);
                assert_eq!(value, b'A' as u64);
            }
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[test]
    fn text_round_trips() {
        let registry = SievePrimeRegistry::new();
        let chunks = encode_text("AB", &registry, CHECKSUM_POWER).unwrap();
        let decoded = decode_text(&chunks, &registry, CHECKSUM_POWER).unwrap();
        assert_eq!(decoded, "AB");
    }

    #[test]
    fn operation_round_trips_with_operand() {
        let registry = SievePrimeRegistry::new();
        let opcode = Integer::from(17); // prime, outside the reserved set
        let chunk = encode_operation(&opcode, Some(4), &registry, CHECKSUM_POWER).unwrap();
        match decode_chunk(&chunk, &registry, CHECKSUM_POWER).unwrap() {
            DecodedChunk::Operation { opcode: op, operand } => {
                assert_eq!(op, opcode);
                assert_eq!(operand, Some(4));
            }
            other => panic!("expected Operation, got {other:?}"),
        }
    }

    #[test]
    fn operation_rejects_reserved_opcode() {
        let registry = SievePrimeRegistry::new();
        assert!(encode_operation(&Integer::from(7), None, &registry, CHECKSUM_POWER).is_err());
    }

    #[test]
    fn block_header_round_trips() {
        let registry = SievePrimeRegistry::new();
        let data = encode_text("AB", &registry, CHECKSUM_POWER).unwrap();
        let block = encode_block(&data, &registry, CHECKSUM_POWER).unwrap();
        match decode_chunk(&block[0], &registry, CHECKSUM_POWER).unwrap() {
            DecodedChunk::BlockHeader { length, ntt } => {
                assert_eq!(length, 2);
                assert!(!ntt);
            }
            other => panic!("expected BlockHeader, got {other:?}"),
        }
    }

    #[test]
    fn ntt_block_header_round_trips() {
        let registry = SievePrimeRegistry::new();
        let data = encode_text("A", &registry, CHECKSUM_POWER).unwrap();
        let block = encode_ntt_block(&data, &registry, CHECKSUM_POWER).unwrap();
        match decode_chunk(&block[0], &registry, CHECKSUM_POWER).unwrap() {
            DecodedChunk::BlockHeader { length, ntt } => {
                assert_eq!(length, 1);
                assert!(ntt);
            }
            other => panic!("expected BlockHeader, got {other:?}"),
        }
    }

    #[test]
    fn tampered_chunk_fails_checksum() {
        let registry = SievePrimeRegistry::new();
        let chunk = encode_data(0, b'Z' as u64, &registry, CHECKSUM_POWER).unwrap();
        let tampered = Integer::from(&chunk * Integer::from(2));
        match decode_chunk(&tampered, &registry, CHECKSUM_POWER) {
            Err(CoreError::ChecksumMismatch { .. }) | Err(CoreError::MalformedChunk { .. }) => {}
            other => panic!("expected a verification failure, got {other:?}"),
        }
    }

    #[test]
    fn validate_chunk_structure_reflects_validity() {
        let registry = SievePrimeRegistry::new();
        let chunk = encode_data(0, b'Z' as u64, &registry, CHECKSUM_POWER).unwrap();
        assert!(validate_chunk_structure(&chunk, &registry, CHECKSUM_POWER));
        assert!(!validate_chunk_structure(&Integer::from(12), &registry, CHECKSUM_POWER));
    }

    #[test]
    fn decode_text_rejects_out_of_order_position() {
        let registry = SievePrimeRegistry::new();
        let mut chunks = encode_text("AB", &registry, CHECKSUM_POWER).unwrap();
        chunks.swap(0, 1);
        assert!(decode_text(&chunks, &registry, CHECKSUM_POWER).is_err());
    }

    #[test]
    fn operation_chunk_with_undersized_operand_exponent_is_malformed() {
        // Hand-built (not via encode_operation, which never emits this
        // shape): an Operation-classified opcode factor plus a prime-5
        // factor whose exponent sits below OPERAND. Decoding must not
        // underflow `e - OPERAND`; it must reject the chunk outright.
        let registry = SievePrimeRegistry::new();
        let factors = vec![(Integer::from(17), OPERATION), (Integer::from(5), 2)];
        let raw = reconstruct(&factors);
        let chunk = crate::checksum::attach_checksum(&raw, &factors, &registry, CHECKSUM_POWER).unwrap();
        assert!(matches!(
            decode_chunk(&chunk, &registry, CHECKSUM_POWER),
            Err(CoreError::MalformedChunk { .. })
        ));
    }
}
