//! Application state shared across all route handlers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sema_core::config::SemaConfig;
use sema_index::Retriever;
use sema_rag::{RagPipeline, TextCompleter};

/// Counters for answered queries.
#[derive(Debug, Default)]
pub struct QueryMetrics {
    served: AtomicU64,
    total_latency_us: AtomicU64,
}

impl QueryMetrics {
    pub fn record(&self, elapsed: Duration) {
        self.served.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }

    /// Mean latency in milliseconds, or 0 before the first query.
    pub fn mean_latency_ms(&self) -> f64 {
        let served = self.served();
        if served == 0 {
            return 0.0;
        }
        self.total_latency_us.load(Ordering::Relaxed) as f64 / served as f64 / 1000.0
    }
}

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SemaConfig>,
    pub retriever: Arc<Retriever>,
    pub pipeline: Arc<RagPipeline>,
    /// Base path the index is saved to.
    pub index_path: PathBuf,
    pub metrics: Arc<QueryMetrics>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: SemaConfig,
        retriever: Arc<Retriever>,
        completer: Arc<dyn TextCompleter>,
    ) -> Self {
        let index_path = config.index.resolved_path(&config.general);
        let pipeline = RagPipeline::new(Arc::clone(&retriever), completer);
        Self {
            config: Arc::new(config),
            retriever,
            pipeline: Arc::new(pipeline),
            index_path,
            metrics: Arc::new(QueryMetrics::default()),
            start_time: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_metrics() {
        let metrics = QueryMetrics::default();
        assert_eq!(metrics.served(), 0);
        assert_eq!(metrics.mean_latency_ms(), 0.0);

        metrics.record(Duration::from_millis(10));
        metrics.record(Duration::from_millis(30));
        assert_eq!(metrics.served(), 2);
        assert!((metrics.mean_latency_ms() - 20.0).abs() < 1e-9);
    }
}
