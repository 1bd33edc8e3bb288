/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use crate::domain::collectors::Collector;
use crate::domain::{labels, Metric};
use crate::ports::MetricsService;
use async_trait::async_trait;
use log::{debug, error};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, Sender, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;

/// Capacity of the channel between collector tasks and the drain task
const METRICS_CHANNEL_CAPACITY: usize = 64;

/// Default lifetime of a cached scrape
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(20);

/// Scrape result caching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub duration: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            duration: DEFAULT_CACHE_DURATION,
        }
    }
}

#[derive(Default)]
struct CacheState {
    metrics: Vec<Metric>,
    last_collect: Option<Instant>,
}

impl CacheState {
    fn is_fresh(&self, now: Instant, duration: Duration) -> bool {
        self.last_collect
            .is_some_and(|last| now < last + duration)
    }

    /// Keep the result of a refill; a failed drain leaves the cache expired
    fn store(&mut self, drained: Result<Vec<Metric>, JoinError>, now: Instant) {
        match drained {
            Ok(fresh) => {
                debug!("Cached {} metrics", fresh.len());
                self.metrics = fresh;
                self.last_collect = Some(now);
            }
            Err(e) => {
                error!("Metrics drain task failed: {e}");
                self.last_collect = None;
            }
        }
    }
}

/// Domain service that runs every enabled collector per scrape
///
/// Collectors run concurrently, each in its own task. A failing collector
/// only loses its own metrics and shows up as
/// `dell_hw_scrape_collector_success == 0`.
pub struct CollectionService {
    collectors: BTreeMap<String, Arc<dyn Collector>>,
    cache: CacheSettings,
    state: Mutex<CacheState>,
}

impl CollectionService {
    /// Create a new collection service
    ///
    /// # Arguments
    /// * `collectors` - Enabled collectors keyed by name
    /// * `cache` - Scrape result caching
    pub fn new(collectors: BTreeMap<String, Arc<dyn Collector>>, cache: CacheSettings) -> Self {
        Self {
            collectors,
            cache,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Names of the enabled collectors, sorted
    pub fn collector_names(&self) -> Vec<&str> {
        self.collectors.keys().map(String::as_str).collect()
    }

    pub fn cache_settings(&self) -> CacheSettings {
        self.cache
    }

    /// Spawn every collector and wait for all of them
    async fn run_collectors(&self, tx: Sender<Metric>) {
        let mut tasks = JoinSet::new();
        for (name, collector) in &self.collectors {
            let name = name.clone();
            let collector = Arc::clone(collector);
            let tx = tx.clone();
            tasks.spawn(async move { execute(&name, collector.as_ref(), &tx).await });
        }
        drop(tx);

        debug!("Waiting for collectors");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Collector task failed: {e}");
            }
        }
        debug!("Finished waiting for collectors");
    }

    /// Scrape without caching: metrics go straight to the sink
    async fn collect_uncached(&self, sink: UnboundedSender<Metric>) {
        let (tx, mut rx) = mpsc::channel(METRICS_CHANNEL_CAPACITY);
        let drain = tokio::spawn(async move {
            while let Some(metric) = rx.recv().await {
                if sink.send(metric).is_err() {
                    break;
                }
            }
        });

        self.run_collectors(tx).await;
        if let Err(e) = drain.await {
            error!("Metrics drain task failed: {e}");
        }
    }
}

#[async_trait]
impl MetricsService for CollectionService {
    async fn collect(&self, sink: UnboundedSender<Metric>) {
        if !self.cache.enabled {
            self.collect_uncached(sink).await;
            return;
        }

        // Held for the whole scrape so concurrent requests share one refill
        let mut state = self.state.lock().await;

        let now = Instant::now();
        if state.is_fresh(now, self.cache.duration) {
            debug!(
                "Serving {} cached metrics, collected {:?} ago",
                state.metrics.len(),
                state.last_collect.map(|last| now - last).unwrap_or_default()
            );
            for metric in &state.metrics {
                if sink.send(metric.clone()).is_err() {
                    break;
                }
            }
            return;
        }

        debug!("Cache expired, collecting");
        let mut fresh = std::mem::take(&mut state.metrics);
        fresh.clear();

        let (tx, mut rx) = mpsc::channel::<Metric>(METRICS_CHANNEL_CAPACITY);
        let drain = tokio::spawn(async move {
            while let Some(metric) = rx.recv().await {
                // A gone receiver still leaves the cache to be filled
                let _ = sink.send(metric.clone());
                fresh.push(metric);
            }
            fresh
        });

        self.run_collectors(tx).await;
        state.store(drain.await, Instant::now());
    }
}

/// Run one collector and report its duration and outcome
async fn execute(name: &str, collector: &dyn Collector, tx: &Sender<Metric>) {
    let begin = Instant::now();
    let result = collector.update().await;
    let duration = begin.elapsed();

    let success = match result {
        Ok(metrics) => {
            debug!("OK: {name} collector succeeded after {duration:?}");
            for metric in metrics {
                if tx.send(metric).await.is_err() {
                    break;
                }
            }
            1.0
        }
        Err(e) => {
            error!("ERROR: {name} collector failed after {duration:?}: {e}");
            0.0
        }
    };

    let scrape = [
        Metric::gauge(
            "scrape_collector_duration_seconds",
            "dellhw_exporter: Duration of a collector scrape.",
            duration.as_secs_f64(),
            labels([("collector", name)]),
        ),
        Metric::gauge(
            "scrape_collector_success",
            "dellhw_exporter: Whether a collector succeeded.",
            success,
            labels([("collector", name)]),
        ),
    ];
    for metric in scrape {
        if tx.send(metric).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CollectorError;
    use crate::domain::CommandError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCollector {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Collector for CountingCollector {
        async fn update(&self) -> Result<Vec<Metric>, CollectorError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(vec![Metric::gauge("test_calls", "Calls.", call as f64, labels([]))])
        }
    }

    struct FailingCollector;

    #[async_trait]
    impl Collector for FailingCollector {
        async fn update(&self) -> Result<Vec<Metric>, CollectorError> {
            Err(CommandError::NotFound("omreport".to_string()).into())
        }
    }

    fn service(cache: CacheSettings) -> (CollectionService, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut collectors: BTreeMap<String, Arc<dyn Collector>> = BTreeMap::new();
        collectors.insert(
            "counting".to_string(),
            Arc::new(CountingCollector {
                calls: Arc::clone(&calls),
            }),
        );
        collectors.insert("failing".to_string(), Arc::new(FailingCollector));
        (CollectionService::new(collectors, cache), calls)
    }

    fn find<'a>(metrics: &'a [Metric], name: &str, collector: &str) -> Option<&'a Metric> {
        metrics.iter().find(|m| {
            m.name == name && m.labels.get("collector").map(String::as_str) == Some(collector)
        })
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let (service, _) = service(CacheSettings::default());
        let metrics = service.collect_all().await;

        assert_eq!(metrics.len(), 5);
        assert!(metrics.iter().any(|m| m.name == "dell_hw_test_calls"));
        assert_eq!(
            find(&metrics, "dell_hw_scrape_collector_success", "counting").map(|m| m.value),
            Some(1.0)
        );
        assert_eq!(
            find(&metrics, "dell_hw_scrape_collector_success", "failing").map(|m| m.value),
            Some(0.0)
        );
        assert!(find(&metrics, "dell_hw_scrape_collector_duration_seconds", "failing").is_some());
    }

    #[tokio::test]
    async fn test_uncached_runs_every_time() {
        let (service, calls) = service(CacheSettings::default());
        service.collect_all().await;
        service.collect_all().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_serves_until_expiry() {
        let (service, calls) = service(CacheSettings {
            enabled: true,
            duration: Duration::from_secs(20),
        });

        let first = service.collect_all().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        let second = service.collect_all().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);

        tokio::time::advance(Duration::from_secs(20)).await;
        let third = service.collect_all().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(third.len(), first.len());
    }

    #[tokio::test]
    async fn test_failed_refill_leaves_cache_expired() {
        let duration = Duration::from_secs(20);
        let mut state = CacheState::default();

        let now = Instant::now();
        state.store(Ok(vec![Metric::gauge("test_calls", "Calls.", 1.0, labels([]))]), now);
        assert!(state.is_fresh(now, duration));
        assert_eq!(state.metrics.len(), 1);

        let drained: Result<Vec<Metric>, JoinError> =
            tokio::spawn(async { panic!("drain failed") }).await;
        state.store(drained, now);
        assert!(!state.is_fresh(now, duration));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_scrapes_share_one_refill() {
        let (service, calls) = service(CacheSettings {
            enabled: true,
            duration: Duration::from_secs(20),
        });
        let service = Arc::new(service);

        let (a, b) = tokio::join!(service.collect_all(), service.collect_all());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.len(), b.len());
    }
}
