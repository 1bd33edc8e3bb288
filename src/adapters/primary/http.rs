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

//! HTTP exposition adapter
//!
//! Serves the Prometheus text format on the telemetry path and a small
//! landing page on `/`.

use crate::domain::Metric;
use crate::ports::MetricsService;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::{debug, error};
use prometheus::proto::{Gauge, LabelPair, Metric as ProtoMetric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder, TEXT_FORMAT};
use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct MetricsState {
    service: Arc<dyn MetricsService>,
    telemetry_path: Arc<str>,
}

/// Build the exporter router
///
/// # Arguments
/// * `service` - Collection service answering every scrape
/// * `telemetry_path` - Path of the metrics endpoint, e.g. `/metrics`
pub fn router(service: Arc<dyn MetricsService>, telemetry_path: &str) -> Router {
    let state = MetricsState {
        service,
        telemetry_path: Arc::from(telemetry_path),
    };

    Router::new()
        .route("/", get(landing_page))
        .route(telemetry_path, get(scrape))
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn landing_page(State(state): State<MetricsState>) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
	<head><title>DellHW Exporter</title></head>
	<body>
		<h1>DellHW Exporter</h1>
		<p><a href="{}">Metrics</a></p>
	</body>
</html>"#,
        state.telemetry_path
    ))
}

async fn scrape(State(state): State<MetricsState>) -> Response {
    let metrics = state.service.collect_all().await;
    debug!("Scrape produced {} metrics", metrics.len());

    match encode_metrics(&metrics) {
        Ok(body) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Group metrics into gauge families, ordered by name
///
/// The help text of a family is taken from its first metric.
pub fn metric_families(metrics: &[Metric]) -> Vec<MetricFamily> {
    let mut families: BTreeMap<&str, MetricFamily> = BTreeMap::new();

    for metric in metrics {
        let family = families.entry(metric.name.as_str()).or_insert_with(|| {
            let mut family = MetricFamily::default();
            family.set_name(metric.name.clone());
            family.set_help(metric.help.clone());
            family.set_field_type(MetricType::GAUGE);
            family
        });
        family.mut_metric().push(gauge_sample(metric));
    }

    families.into_values().collect()
}

fn gauge_sample(metric: &Metric) -> ProtoMetric {
    let mut sample = ProtoMetric::default();
    for (name, value) in &metric.labels {
        let mut pair = LabelPair::default();
        pair.set_name(name.clone());
        pair.set_value(value.clone());
        sample.mut_label().push(pair);
    }

    let mut gauge = Gauge::default();
    gauge.set_value(metric.value);
    sample.set_gauge(gauge);
    sample
}

/// Render metrics in the Prometheus text exposition format
pub fn encode_metrics(metrics: &[Metric]) -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families(metrics), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::labels;
    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::mpsc::UnboundedSender;

    struct FixedMetrics(Vec<Metric>);

    #[async_trait]
    impl MetricsService for FixedMetrics {
        async fn collect(&self, sink: UnboundedSender<Metric>) {
            for metric in &self.0 {
                let _ = sink.send(metric.clone());
            }
        }
    }

    fn sample_metrics() -> Vec<Metric> {
        vec![
            Metric::gauge(
                "chassis_status",
                "Overall status of chassis components.",
                0.0,
                labels([("component", "Fans")]),
            ),
            Metric::gauge(
                "chassis_fan_reading",
                "Overall status of system fans.",
                5040.0,
                labels([("fan", "System_Board_Fan1A")]),
            ),
            Metric::gauge(
                "chassis_status",
                "Overall status of chassis components.",
                1.0,
                labels([("component", "Intrusion")]),
            ),
        ]
    }

    async fn get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_metric_families_grouped_by_name() {
        let families = metric_families(&sample_metrics());

        assert_eq!(families.len(), 2);
        assert_eq!(families[0].get_name(), "dell_hw_chassis_fan_reading");
        assert_eq!(families[1].get_name(), "dell_hw_chassis_status");
        assert_eq!(families[1].get_metric().len(), 2);
        assert_eq!(families[1].get_field_type(), MetricType::GAUGE);
        assert_eq!(families[1].get_help(), "Overall status of chassis components.");

        let labels = families[1].get_metric()[1].get_label();
        assert_eq!(labels[0].get_name(), "component");
        assert_eq!(labels[0].get_value(), "Intrusion");
        assert_eq!(families[1].get_metric()[1].get_gauge().get_value(), 1.0);
    }

    #[test]
    fn test_encode_metrics_text_format() {
        let text = encode_metrics(&sample_metrics()).unwrap();

        assert!(text.contains("# HELP dell_hw_chassis_status Overall status of chassis components."));
        assert!(text.contains("# TYPE dell_hw_chassis_status gauge"));
        assert!(text.contains("dell_hw_chassis_status{component=\"Fans\"} "));
        assert!(text.contains("dell_hw_chassis_fan_reading{fan=\"System_Board_Fan1A\"} 5040"));
        assert_eq!(text.matches("# TYPE dell_hw_chassis_status").count(), 1);

        assert_eq!(encode_metrics(&[]).unwrap(), "");
    }

    #[tokio::test]
    async fn test_router_serves_metrics_and_landing_page() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::new(FixedMetrics(sample_metrics())), "/metrics");
        tokio::spawn(serve(listener, app, std::future::pending()));

        let response = get(addr, "/metrics").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("text/plain; version=0.0.4"));
        assert!(response.contains("dell_hw_chassis_status{component=\"Intrusion\"} 1"));

        let response = get(addr, "/").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("<a href=\"/metrics\">Metrics</a>"));

        let response = get(addr, "/nope").await;
        assert!(response.starts_with("HTTP/1.1 404"));
    }
}
