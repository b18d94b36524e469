//! # Stream — Chunked Async Stream Core
//!
//! Wraps the codec/checksum/NTT layers in a `tokio`-based pipeline: chunk
//! streams flow through a composable sequence of stages (map, filter,
//! async map, batch, bounded parallelism, retry, timeout, error-tolerance
//! catch) with a backpressure monitor sitting on top watching process
//! memory via `sysinfo`. The consumer loop shape — a `while let Some(...) =
//! stream.next().await` driving decode/verify work — follows this crate's
//! existing conventions for long-running async consumers built around a
//! channel.

mod backpressure;
mod bridge;
mod chunked;
mod pipeline;

pub use backpressure::BackpressureMonitor;
pub use bridge::{decode_chunk_stream, decode_text_stream, encode_text_stream, execute_streaming_program};
pub use chunked::{process_chunked_stream, ChunkContext};
pub use pipeline::{optimize_performance, Pipeline, PipelineBuilder, StageMetrics, SuggestedConfig};
