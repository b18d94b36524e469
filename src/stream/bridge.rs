//! # Bridge — Encoding/Stream Boundary
//!
//! Wraps [`crate::codec`] to expose stream-shaped entry points:
//! `encodeTextStream` / `decodeTextStream` / `decodeChunkStream` /
//! `executeStreamingProgram`. Decoding buffers chunks until a complete
//! decode succeeds; on source end, flushes whatever is left rather than
//! discarding a trailing partial run.

use crate::codec::{self, DecodedChunk};
use crate::error::{CoreError, CoreResult};
use crate::stream::chunked::{process_chunked_stream, ChunkContext};
use futures::{Stream, StreamExt};
use rug::Integer;

/// `encodeTextStream(text, ctx)` — encodes `text` eagerly (the codec itself
/// is synchronous and cheap relative to I/O) and streams the resulting
/// chunks out one at a time.
pub fn encode_text_stream(
    text: &str,
    ctx: &ChunkContext,
) -> CoreResult<impl Stream<Item = CoreResult<Integer>>> {
    let chunks = codec::encode_text(text, ctx.registry.as_ref(), ctx.checksum_power)?;
    Ok(futures::stream::iter(chunks.into_iter().map(Ok)))
}

/// `decodeChunkStream(input, ctx)` — thin re-export of
/// [`process_chunked_stream`] under the bridge's naming, for callers that
/// think in terms of "the encoding bridge" rather than "the chunked
/// processor".
pub fn decode_chunk_stream<S>(
    input: S,
    ctx: ChunkContext,
) -> impl Stream<Item = CoreResult<DecodedChunk>>
where
    S: Stream<Item = Integer> + Send + 'static,
{
    process_chunked_stream(input, ctx)
}

/// `decodeTextStream(input, ctx)` — decodes a stream of Data chunks back
/// into a `String`, buffering out-of-order or not-yet-decodable chunks is
/// unnecessary here because [`codec::decode_chunk`] fully decodes each
/// chunk independently; what this does buffer is the *position* ordering,
/// accumulating decoded characters and flushing the assembled string once
/// the source ends.
pub async fn decode_text_stream<S>(input: S, ctx: ChunkContext) -> CoreResult<String>
where
    S: Stream<Item = Integer> + Send + 'static,
{
    let mut chars: Vec<(u64, char)> = Vec::new();
    let mut stream = Box::pin(process_chunked_stream(input, ctx));
    while let Some(decoded) = stream.next().await {
        match decoded? {
            DecodedChunk::Data { position, value } => {
                let c = char::from_u32(value as u32).ok_or_else(|| CoreError::MalformedChunk {
                    chunk: Integer::from(value),
                    reason: format!("{value} is not a valid Unicode scalar value"),
                })?;
                chars.push((position, c));
            }
            other => {
                return Err(CoreError::MalformedChunk {
                    chunk: Integer::from(0),
                    reason: format!("expected a Data chunk in a text stream, decoded {other:?}"),
                })
            }
        }
    }
    chars.sort_by_key(|(position, _)| *position);
    Ok(chars.into_iter().map(|(_, c)| c).collect())
}

/// `executeStreamingProgram(input, ctx, initial)` — decodes a stream of
/// `Operation` chunks and folds them into a running accumulator, yielding
/// the accumulator's value after each step. A `BlockHeader` or `Data` chunk
/// appearing in a program stream is a `MalformedChunk` error — a streaming
/// program is Operation chunks only. `registry.get_index(opcode) mod 3`
/// selects Add/Sub/Mul against the running accumulator: the Operation chunk
/// schema names `opcode`/`operand` but not a concrete instruction set, so
/// this is a minimal demonstrative interpreter rather than a fixed VM.
pub fn execute_streaming_program<S>(
    input: S,
    ctx: ChunkContext,
    initial: Integer,
) -> impl Stream<Item = CoreResult<Integer>>
where
    S: Stream<Item = Integer> + Send + 'static,
{
    let registry = ctx.registry.clone();
    let decoded = process_chunked_stream(input, ctx);
    futures::stream::unfold(
        (Box::pin(decoded), initial),
        move |(mut stream, accumulator)| {
            let registry = registry.clone();
            async move {
                let next = stream.next().await?;
                let result = (|| {
                    let chunk = next?;
                    match chunk {
                        DecodedChunk::Operation { opcode, operand } => {
                            apply_operation(&accumulator, &opcode, operand, registry.as_ref())
                        }
                        other => Err(CoreError::MalformedChunk {
                            chunk: Integer::from(0),
                            reason: format!(
                                "expected an Operation chunk in a program stream, decoded {other:?}"
                            ),
                        }),
                    }
                })();
                match result {
                    Ok(new_accumulator) => {
                        Some((Ok(new_accumulator.clone()), (stream, new_accumulator)))
                    }
                    Err(e) => Some((Err(e), (stream, accumulator))),
                }
            }
        },
    )
}

fn apply_operation(
    accumulator: &Integer,
    opcode: &Integer,
    operand: Option<u64>,
    registry: &dyn crate::registry::PrimeRegistry,
) -> CoreResult<Integer> {
    let operand = Integer::from(operand.unwrap_or(0));
    let selector = registry.get_index(opcode)? % 3;
    Ok(match selector {
        0 => Integer::from(accumulator + &operand),
        1 => Integer::from(accumulator - &operand),
        _ => Integer::from(accumulator * &operand),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SievePrimeRegistry;
    use std::sync::Arc;

    fn ctx() -> ChunkContext {
        ChunkContext::new(Arc::new(SievePrimeRegistry::new()), codec::CHECKSUM_POWER)
    }

    #[tokio::test]
    async fn text_round_trips_through_the_stream_bridge() {
        let ctx = ctx();
        let chunks = encode_text_stream("hi", &ctx).unwrap();
        let encoded: Vec<Integer> = chunks.map(|r| r.unwrap()).collect().await;
        let stream = futures::stream::iter(encoded);
        let decoded = decode_text_stream(stream, ctx).await.unwrap();
        assert_eq!(decoded, "hi");
    }

    #[tokio::test]
    async fn decode_chunk_stream_classifies_each_item() {
        let ctx = ctx();
        let chunk = codec::encode_data(0, 'x' as u64, ctx.registry.as_ref(), ctx.checksum_power).unwrap();
        let stream = futures::stream::iter(vec![chunk]);
        let decoded: Vec<_> = decode_chunk_stream(stream, ctx).collect().await;
        assert_eq!(decoded.len(), 1);
        assert!(decoded[0].is_ok());
    }

    #[tokio::test]
    async fn program_stream_accumulates_operations() {
        let ctx = ctx();
        let opcode = Integer::from(17); // prime, outside the reserved structural set
        let chunk = codec::encode_operation(&opcode, Some(5), ctx.registry.as_ref(), ctx.checksum_power).unwrap();
        let stream = futures::stream::iter(vec![chunk]);
        let results: Vec<CoreResult<Integer>> =
            execute_streaming_program(stream, ctx, Integer::from(10)).collect().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[tokio::test]
    async fn program_stream_rejects_non_operation_chunks() {
        let ctx = ctx();
        let chunk = codec::encode_data(0, 1, ctx.registry.as_ref(), ctx.checksum_power).unwrap();
        let stream = futures::stream::iter(vec![chunk]);
        let results: Vec<CoreResult<Integer>> =
            execute_streaming_program(stream, ctx, Integer::from(0)).collect().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
