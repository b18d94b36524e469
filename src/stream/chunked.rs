//! # Chunked — Per-Item Verify + Decode
//!
//! The innermost stage of the stream core: given a stream of raw
//! [`rug::Integer`] chunk values, verify each one's checksum and decode its
//! schema, optionally gated by a [`BackpressureMonitor`] so a slow
//! downstream consumer throttles how fast upstream items are admitted.

use crate::codec::{self, DecodedChunk};
use crate::error::CoreResult;
use crate::registry::PrimeRegistry;
use crate::stream::backpressure::BackpressureMonitor;
use futures::{Stream, StreamExt};
use rug::Integer;
use std::sync::Arc;
use std::time::Duration;

/// Shared state threaded through a chunked stream run. Cheap to clone — the
/// registry and monitor are held behind `Arc`.
#[derive(Clone)]
pub struct ChunkContext {
    pub registry: Arc<dyn PrimeRegistry>,
    pub checksum_power: u32,
    pub backpressure: Option<Arc<BackpressureMonitor>>,
}

impl ChunkContext {
    pub fn new(registry: Arc<dyn PrimeRegistry>, checksum_power: u32) -> Self {
        ChunkContext {
            registry,
            checksum_power,
            backpressure: None,
        }
    }

    pub fn with_backpressure(mut self, monitor: Arc<BackpressureMonitor>) -> Self {
        self.backpressure = Some(monitor);
        self
    }

    fn decode_one(&self, value: &Integer) -> CoreResult<DecodedChunk> {
        codec::decode_chunk(value, self.registry.as_ref(), self.checksum_power)
    }
}

/// `processChunkedStream(input, ctx)` — verifies and decodes each chunk in
/// order, yielding `Err` for any item whose checksum doesn't match or whose
/// factorization is malformed without ending the stream (callers decide
/// whether a single bad chunk is fatal via a `catch`/`retry` stage built on
/// top of this one in [`super::pipeline`]).
pub fn process_chunked_stream<S>(
    input: S,
    ctx: ChunkContext,
) -> impl Stream<Item = CoreResult<DecodedChunk>>
where
    S: Stream<Item = Integer> + Send + 'static,
{
    input.then(move |value| {
        let ctx = ctx.clone();
        async move {
            if let Some(monitor) = ctx.backpressure.clone() {
                monitor.drain(Duration::from_millis(10), 200).await?;
            }
            ctx.decode_one(&value)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self as codec_mod};
    use crate::registry::SievePrimeRegistry;

    fn make_context() -> ChunkContext {
        ChunkContext::new(Arc::new(SievePrimeRegistry::new()), codec_mod::CHECKSUM_POWER)
    }

    #[tokio::test]
    async fn decodes_a_well_formed_chunk_stream() {
        let ctx = make_context();
        let chunk = codec_mod::encode_data(0, 'h' as u64, ctx.registry.as_ref(), ctx.checksum_power).unwrap();
        let stream = tokio_stream::iter(vec![chunk]);
        let decoded: Vec<_> = process_chunked_stream(stream, ctx).collect().await;
        assert_eq!(decoded.len(), 1);
        match decoded[0].as_ref().unwrap() {
            DecodedChunk::Data { position, value } => {
                assert_eq!(*position, 0);
                assert_eq!(*value, 'h' as u64);
            }
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn surfaces_checksum_failure_without_ending_the_stream() {
        let ctx = make_context();
        let good = codec_mod::encode_data(1, 42, ctx.registry.as_ref(), ctx.checksum_power).unwrap();
        let bad = codec_mod::encode_data(0, 99, ctx.registry.as_ref(), ctx.checksum_power).unwrap();
        let tampered = Integer::from(&bad * Integer::from(5));
        let stream = tokio_stream::iter(vec![tampered, good]);
        let decoded: Vec<_> = process_chunked_stream(stream, ctx).collect().await;
        assert_eq!(decoded.len(), 2);
        assert!(decoded[0].is_err());
        assert!(decoded[1].is_ok());
    }
}
