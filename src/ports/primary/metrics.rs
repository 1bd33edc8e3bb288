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

use crate::domain::Metric;
use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedSender};

/// Primary port - Metrics collection service
///
/// This is the main interface the exposition layer uses to gather metrics.
#[async_trait]
pub trait MetricsService: Send + Sync {
    /// Run one collection pass, sending every metric to `sink`
    ///
    /// Returns once every metric of the pass has been sent. Collector
    /// failures are reported through the scrape success metric, never as an
    /// error.
    async fn collect(&self, sink: UnboundedSender<Metric>);

    /// Run one collection pass and gather the metrics
    async fn collect_all(&self) -> Vec<Metric> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.collect(tx).await;

        let mut metrics = Vec::new();
        while let Some(metric) = rx.recv().await {
            metrics.push(metric);
        }
        metrics
    }
}
