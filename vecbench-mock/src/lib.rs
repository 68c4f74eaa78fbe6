//! In-process stand-in for a vector database.
//!
//! [`MockProvider`] hands out [`MockExecutor`]s that sleep for a sampled latency, fail a given
//! fraction of queries and optionally reject queries beyond a fixed rate.
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, NormalError};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use vecbench::prelude::*;

#[derive(Debug, Clone, Copy)]
pub enum Latency {
    Fixed(Duration),
    /// Normally distributed seconds, clamped at zero.
    Normal(Normal<f64>),
}

impl Latency {
    pub fn fixed(delay: Duration) -> Self {
        Latency::Fixed(delay)
    }

    pub fn normal(mean: Duration, std_dev: Duration) -> Result<Self, NormalError> {
        Ok(Latency::Normal(Normal::new(
            mean.as_secs_f64(),
            std_dev.as_secs_f64(),
        )?))
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        match self {
            Latency::Fixed(delay) => *delay,
            Latency::Normal(normal) => Duration::from_secs_f64(normal.sample(rng).max(0.)),
        }
    }
}

/// Counters shared by a provider and every executor it handed out.
#[derive(Debug, Default)]
pub struct MockStats {
    pub executors: AtomicUsize,
    pub calls: AtomicUsize,
    pub failures: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl MockStats {
    pub fn executors(&self) -> usize {
        self.executors.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct MockProvider {
    latency: Latency,
    failure_rate: f64,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    unavailable: bool,
    stats: Arc<MockStats>,
}

impl MockProvider {
    pub fn new(latency: Latency) -> Self {
        Self {
            latency,
            failure_rate: 0.,
            limiter: None,
            unavailable: false,
            stats: Arc::new(MockStats::default()),
        }
    }

    /// Fraction of queries, in `[0, 1]`, that fail at random.
    pub fn failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate.clamp(0., 1.);
        self
    }

    /// Queries beyond `qps` per second fail as if the database were overloaded.
    pub fn max_qps(mut self, qps: NonZeroU32) -> Self {
        self.limiter = Some(Arc::new(RateLimiter::direct(Quota::per_second(qps))));
        self
    }

    /// Refuse to hand out executors at all.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn stats(&self) -> Arc<MockStats> {
        self.stats.clone()
    }
}

impl ExecutorProvider for MockProvider {
    type Executor = MockExecutor;

    async fn worker_executor(&self) -> Result<MockExecutor, ExecutorError> {
        if self.unavailable {
            return Err(ExecutorError::Connection(
                "mock database is unavailable".into(),
            ));
        }
        self.stats.executors.fetch_add(1, Ordering::SeqCst);
        Ok(MockExecutor {
            latency: self.latency,
            failure_rate: self.failure_rate,
            limiter: self.limiter.clone(),
            stats: self.stats.clone(),
            rng: SmallRng::from_entropy(),
        })
    }
}

pub struct MockExecutor {
    latency: Latency,
    failure_rate: f64,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    stats: Arc<MockStats>,
    rng: SmallRng,
}

impl QueryExecutor for MockExecutor {
    async fn similarity_search(
        &mut self,
        table: &str,
        vector: &QueryVector,
        k: usize,
    ) -> Result<Vec<Neighbor>, ExecutorError> {
        self.stats.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.latency.sample(&mut self.rng);
        let fail = self.rng.gen_bool(self.failure_rate);
        tokio::time::sleep(delay).await;
        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                debug!("Rate limit exceeded on {table}");
                self.stats.failures.fetch_add(1, Ordering::SeqCst);
                return Err(ExecutorError::Query("too many queries".into()));
            }
        }

        if fail {
            self.stats.failures.fetch_add(1, Ordering::SeqCst);
            return Err(ExecutorError::Query(format!("injected failure on {table}")));
        }

        if vector.is_empty() {
            return Err(ExecutorError::Malformed("empty query vector".into()));
        }

        let mut distances: Vec<f64> = (0..k).map(|_| self.rng.gen_range(0.0..1.0)).collect();
        distances.sort_by(f64::total_cmp);
        Ok(distances
            .into_iter()
            .enumerate()
            .map(|(id, distance)| Neighbor {
                id: id as i64,
                distance,
            })
            .collect())
    }
}
