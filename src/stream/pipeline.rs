//! # Pipeline — Stage Composition
//!
//! `source → (map | filter | asyncMap | batch(n) | parallel(k) | retry |
//! timeout | catch)* → collect | reduce | sink`, executed lazily once per
//! `execute`. Stages compose by wrapping an `Arc<dyn Fn>` closure chain
//! around shared `Mutex`-guarded state — here the shared state is a
//! per-stage metrics table.
//!
//! `map`/`filter`/`retry`/`timeout`/`catch` preserve the item type and
//! compose into a single closure chain; `asyncMap`/`batch`/`parallel`
//! change the item type, so they flatten the chain built so far into a
//! concrete stream and start a fresh one for the new type. Errors from the
//! original source, or from any stage, ride along as `Err` items through
//! every later stage untouched (stages only ever run their closures on
//! `Ok` values) until `execute_collect` tallies them against
//! `errorTolerance`.

use crate::config::StreamConfig;
use crate::error::{CoreError, CoreResult};
use futures::future::BoxFuture;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Per-stage counters recorded as each named stage runs.
#[derive(Debug, Clone, Default)]
pub struct StageMetrics {
    pub name: String,
    pub items: u64,
    pub errors: u64,
    pub total_time: Duration,
}

impl StageMetrics {
    pub fn avg_time(&self) -> Duration {
        if self.items == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.items as u32
        }
    }
}

type ItemOp<T> = Arc<dyn Fn(T) -> BoxFuture<'static, CoreResult<Option<T>>> + Send + Sync>;
type BoxedStream<T> = Pin<Box<dyn Stream<Item = CoreResult<T>> + Send>>;

fn identity_op<T: Send + 'static>() -> ItemOp<T> {
    Arc::new(|t| Box::pin(async move { Ok(Some(t)) }))
}

/// A pipeline under construction. `T` is the type flowing through the
/// stages built so far. `source` already carries prior failures as `Err`
/// items; `op` is the composed map/filter/retry/timeout/catch chain applied
/// to each `Ok` item in [`PipelineBuilder::into_stream`].
pub struct PipelineBuilder<T> {
    source: BoxedStream<T>,
    op: ItemOp<T>,
    metrics: Arc<Mutex<Vec<StageMetrics>>>,
    cancel: Arc<AtomicBool>,
    cfg: StreamConfig,
}

fn record(metrics: &Mutex<Vec<StageMetrics>>, name: &str, elapsed: Duration, is_err: bool) {
    let mut guard = metrics.lock().unwrap();
    match guard.iter_mut().find(|m| m.name == name) {
        Some(m) => {
            m.items += 1;
            m.total_time += elapsed;
            if is_err {
                m.errors += 1;
            }
        }
        None => guard.push(StageMetrics {
            name: name.to_string(),
            items: 1,
            errors: if is_err { 1 } else { 0 },
            total_time: elapsed,
        }),
    }
}

impl<T: Send + 'static> PipelineBuilder<T> {
    /// `source(stream)` — begins a pipeline from an already-fallible stream.
    pub fn new<S>(source: S, cfg: StreamConfig) -> Self
    where
        S: Stream<Item = CoreResult<T>> + Send + 'static,
    {
        PipelineBuilder {
            source: Box::pin(source),
            op: identity_op(),
            metrics: Arc::new(Mutex::new(Vec::new())),
            cancel: Arc::new(AtomicBool::new(false)),
            cfg,
        }
    }

    /// A handle a caller can flip from another task to cancel the pipeline;
    /// every suspension point checks it before proceeding.
    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn metrics(&self) -> Arc<Mutex<Vec<StageMetrics>>> {
        self.metrics.clone()
    }

    fn with_op<F>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(T) -> BoxFuture<'static, CoreResult<Option<T>>> + Send + Sync + 'static,
    {
        let prev = self.op.clone();
        let metrics = self.metrics.clone();
        let cancel = self.cancel.clone();
        let f = Arc::new(f);
        let op: ItemOp<T> = Arc::new(move |t| {
            let prev = prev.clone();
            let f = f.clone();
            let metrics = metrics.clone();
            let cancel = cancel.clone();
            Box::pin(async move {
                if cancel.load(Ordering::Relaxed) {
                    return Err(CoreError::Cancelled);
                }
                match prev(t).await? {
                    None => Ok(None),
                    Some(v) => {
                        let start = Instant::now();
                        let result = f(v).await;
                        record(&metrics, name, start.elapsed(), result.is_err());
                        result
                    }
                }
            })
        });
        PipelineBuilder { op, ..self }
    }

    /// `map(f)` — a pure, infallible-arity transform; errors from `f` abort
    /// only that item.
    pub fn map<F>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(T) -> CoreResult<T> + Send + Sync + 'static,
    {
        self.with_op(name, move |t| {
            let r = f(t);
            Box::pin(async move { r.map(Some) })
        })
    }

    /// `filter(pred)` — items failing `pred` are dropped, not errored.
    pub fn filter<F>(self, name: &'static str, pred: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.with_op(name, move |t| {
            let keep = pred(&t);
            Box::pin(async move { Ok(if keep { Some(t) } else { None }) })
        })
    }

    /// `retry(attempts, delayMs)` — re-invokes the chain built *so far* up
    /// to `attempts` additional times on [`CoreError::is_transient`]
    /// failures, backing off exponentially, starting from a clone of the
    /// original input each time.
    pub fn retry(self, name: &'static str, attempts: u32, delay_ms: u64) -> Self
    where
        T: Clone,
    {
        let prev = self.op.clone();
        let metrics = self.metrics.clone();
        let op: ItemOp<T> = Arc::new(move |t: T| {
            let prev = prev.clone();
            let metrics = metrics.clone();
            Box::pin(async move {
                let mut attempt = 0;
                loop {
                    let start = Instant::now();
                    let result = prev(t.clone()).await;
                    record(&metrics, name, start.elapsed(), result.is_err());
                    match result {
                        Ok(v) => return Ok(v),
                        Err(e) if e.is_transient() && attempt < attempts => {
                            tracing::warn!(stage = name, attempt, error = %e, "stage failed, retrying");
                            tokio::time::sleep(Duration::from_millis(delay_ms.saturating_mul(1 << attempt))).await;
                            attempt += 1;
                        }
                        Err(e) => return Err(e),
                    }
                }
            })
        });
        PipelineBuilder { op, ..self }
    }

    /// `timeout(ms)` — bounds how long the chain built *so far* may take per
    /// item; an elapsed timer surfaces [`CoreError::TimedOut`].
    pub fn timeout(self, name: &'static str, ms: u64) -> Self {
        let prev = self.op.clone();
        let metrics = self.metrics.clone();
        let op: ItemOp<T> = Arc::new(move |t: T| {
            let prev = prev.clone();
            let metrics = metrics.clone();
            Box::pin(async move {
                let start = Instant::now();
                let result = tokio::time::timeout(Duration::from_millis(ms), prev(t)).await;
                match result {
                    Ok(inner) => {
                        record(&metrics, name, start.elapsed(), inner.is_err());
                        inner
                    }
                    Err(_) => {
                        record(&metrics, name, start.elapsed(), true);
                        Err(CoreError::TimedOut)
                    }
                }
            })
        });
        PipelineBuilder { op, ..self }
    }

    /// `catch(handler)` — on error, `handler(error, original)` may substitute
    /// a replacement item (`Some`) or drop it (`None`) instead of the
    /// failure propagating.
    pub fn catch<F>(self, name: &'static str, handler: F) -> Self
    where
        T: Clone,
        F: Fn(CoreError, T) -> Option<T> + Send + Sync + 'static,
    {
        let prev = self.op.clone();
        let metrics = self.metrics.clone();
        let handler = Arc::new(handler);
        let op: ItemOp<T> = Arc::new(move |t: T| {
            let prev = prev.clone();
            let metrics = metrics.clone();
            let handler = handler.clone();
            let handler_input = t.clone();
            Box::pin(async move {
                let start = Instant::now();
                let result = prev(t).await;
                match result {
                    Ok(v) => {
                        record(&metrics, name, start.elapsed(), false);
                        Ok(v)
                    }
                    Err(e) => {
                        record(&metrics, name, start.elapsed(), true);
                        Ok(handler(e, handler_input))
                    }
                }
            })
        });
        PipelineBuilder { op, ..self }
    }

    /// Flattens the chain built so far into a concrete `Stream<Item =
    /// CoreResult<T>>` — `Err` items (from the source or an earlier stage)
    /// pass through untouched; dropped (`filter`-ed) items simply vanish.
    fn into_stream(self) -> BoxedStream<T> {
        let op = self.op;
        Box::pin(
            self.source
                .then(move |r| {
                    let op = op.clone();
                    async move {
                        match r {
                            Ok(t) => op(t).await,
                            Err(e) => Err(e),
                        }
                    }
                })
                .filter_map(|r| async move {
                    match r {
                        Ok(Some(v)) => Some(Ok(v)),
                        Ok(None) => None,
                        Err(e) => Some(Err(e)),
                    }
                }),
        )
    }

    /// `asyncMap(f)` — like `map`, but `f` itself is asynchronous and may
    /// change the item type.
    pub fn async_map<U, F, Fut>(self, name: &'static str, f: F) -> PipelineBuilder<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = CoreResult<U>> + Send + 'static,
    {
        let cfg = self.cfg.clone();
        let metrics = Arc::new(Mutex::new(Vec::new()));
        let inner_metrics = metrics.clone();
        let stream = self.into_stream();
        let f = Arc::new(f);
        let mapped = stream.then(move |r| {
            let f = f.clone();
            let metrics = inner_metrics.clone();
            async move {
                match r {
                    Ok(t) => {
                        let start = Instant::now();
                        let out = f(t).await;
                        record(&metrics, name, start.elapsed(), out.is_err());
                        out
                    }
                    Err(e) => Err(e),
                }
            }
        });
        PipelineBuilder {
            source: Box::pin(mapped),
            op: identity_op(),
            metrics,
            cancel: Arc::new(AtomicBool::new(false)),
            cfg,
        }
    }

    /// `batch(n)` — groups items into fixed-size (final group possibly
    /// smaller) vectors; a single error anywhere in a group fails the whole
    /// group rather than silently dropping the rest.
    pub fn batch(self, n: usize) -> PipelineBuilder<Vec<T>> {
        let cfg = self.cfg.clone();
        let metrics = Arc::new(Mutex::new(Vec::new()));
        let stream = self.into_stream();
        let grouped = stream.chunks(n.max(1)).map(|chunk| {
            let mut out = Vec::with_capacity(chunk.len());
            for item in chunk {
                out.push(item?);
            }
            Ok(out)
        });
        PipelineBuilder {
            source: Box::pin(grouped),
            op: identity_op(),
            metrics,
            cancel: Arc::new(AtomicBool::new(false)),
            cfg,
        }
    }

    /// `parallel(k, f)` — fans out to at most `maxConcurrency` (here, `k`)
    /// concurrent tasks; output order is not preserved.
    pub fn parallel<U, F, Fut>(self, name: &'static str, k: usize, f: F) -> PipelineBuilder<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = CoreResult<U>> + Send + 'static,
    {
        let cfg = self.cfg.clone();
        let metrics = Arc::new(Mutex::new(Vec::new()));
        let inner_metrics = metrics.clone();
        let stream = self.into_stream();
        let f = Arc::new(f);
        let fanned = stream
            .map(move |r| {
                let f = f.clone();
                let metrics = inner_metrics.clone();
                async move {
                    match r {
                        Ok(t) => {
                            let start = Instant::now();
                            let out = f(t).await;
                            record(&metrics, name, start.elapsed(), out.is_err());
                            out
                        }
                        Err(e) => Err(e),
                    }
                }
            })
            .buffer_unordered(k.max(1));
        PipelineBuilder {
            source: Box::pin(fanned),
            op: identity_op(),
            metrics,
            cancel: Arc::new(AtomicBool::new(false)),
            cfg,
        }
    }

    /// `execute().collect()` — drains the pipeline into a `Vec<T>`,
    /// terminating early with `Aborted{errorRate}` once the fraction of
    /// failed items over processed items exceeds `errorTolerance`.
    pub async fn execute_collect(self) -> CoreResult<Vec<T>> {
        let tolerance = self.cfg.error_tolerance;
        let mut stream = self.into_stream();
        let mut out = Vec::new();
        let mut processed: u64 = 0;
        let mut failed: u64 = 0;
        while let Some(item) = stream.next().await {
            processed += 1;
            match item {
                Ok(v) => out.push(v),
                Err(e) if e == CoreError::Cancelled => return Err(e),
                Err(_) => {
                    failed += 1;
                    if (failed as f64) / (processed as f64) > tolerance {
                        return Err(CoreError::Aborted {
                            error_rate: failed as f64 / processed as f64,
                        });
                    }
                }
            }
        }
        Ok(out)
    }

    /// `execute().reduce(init, f)`.
    pub async fn execute_reduce<A, F>(self, init: A, mut f: F) -> CoreResult<A>
    where
        F: FnMut(A, T) -> A,
    {
        let items = self.execute_collect().await?;
        Ok(items.into_iter().fold(init, |acc, item| f(acc, item)))
    }

    /// `execute().sink(consumer)` — runs `consumer` for side effects only.
    pub async fn execute_sink<F>(self, mut consumer: F) -> CoreResult<()>
    where
        F: FnMut(T),
    {
        let items = self.execute_collect().await?;
        for item in items {
            consumer(item);
        }
        Ok(())
    }
}

/// A fully-built, not-yet-executed pipeline. Constructing one from a
/// [`PipelineBuilder`] is just a naming convenience — `execute_*` methods
/// live on the builder itself since every stage method already consumes
/// and returns `Self`/`PipelineBuilder<U>`.
pub type Pipeline<T> = PipelineBuilder<T>;

/// A config adjustment `optimize_performance` suggests — advisory only, the
/// caller decides whether to build a new [`StreamConfig`] from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestedConfig {
    pub chunk_size: Option<usize>,
    pub max_concurrency: Option<usize>,
    pub buffer_size: Option<usize>,
}

/// Reads current metrics and memory pressure and returns a suggested
/// configuration adjustment. Never mutates `cfg` — applying the suggestion
/// is the caller's choice, matching how `stream::backpressure` never forces
/// an upstream pause either, only reports it.
///
/// - `memory_ratio > 0.85` suggests halving `default_chunk_size`.
/// - aggregate throughput (items/sec across every recorded stage) below
///   1000 suggests doubling `max_concurrency`.
/// - average per-item latency above 80% of `timeout_ms` suggests halving
///   `buffer_size`.
pub fn optimize_performance(metrics: &[StageMetrics], memory_ratio: f64, cfg: &StreamConfig) -> SuggestedConfig {
    let mut suggestion = SuggestedConfig::default();

    if memory_ratio > 0.85 {
        suggestion.chunk_size = Some((cfg.default_chunk_size / 2).max(1));
    }

    let total_items: u64 = metrics.iter().map(|m| m.items).sum();
    let total_secs: f64 = metrics.iter().map(|m| m.total_time.as_secs_f64()).sum();
    if total_secs > 0.0 {
        let throughput = total_items as f64 / total_secs;
        if throughput < 1000.0 {
            suggestion.max_concurrency = Some(cfg.max_concurrency.saturating_mul(2).max(1));
        }
    }

    let acceptable_latency_ms = cfg.timeout_ms as f64 * 0.8;
    if let Some(worst) = metrics.iter().map(|m| m.avg_time().as_millis() as f64).fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |a| a.max(v)))
    }) {
        if worst > acceptable_latency_ms {
            suggestion.buffer_size = Some((cfg.buffer_size / 2).max(1));
        }
    }

    suggestion
}
