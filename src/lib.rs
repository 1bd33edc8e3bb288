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

//! Dell Hardware Exporter Library
//!
//! Collects hardware health from Dell OpenManage Server Administrator by
//! running `omreport`, and exposes it as Prometheus gauges. Built with a
//! Ports and Adapters (Hexagonal) architecture.
//!
//! # Architecture
//!
//! - **Domain**: report parsing, per-subsystem mappers, collectors and the
//!   collection service
//! - **Ports**: command execution and metrics collection interfaces
//! - **Adapters**: process execution on Unix and the HTTP endpoint
//!
//! # Usage
//!
//! ```rust,no_run
//! use dellhw_exporter::{ExporterConfig, MetricsService, ServiceContainer};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let container = ServiceContainer::new(ExporterConfig::default());
//!     let service = container.create_collection_service()?;
//!
//!     for metric in service.collect_all().await {
//!         println!("{} {:?} {}", metric.name, metric.labels, metric.value);
//!     }
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod config;
pub mod container;
pub mod domain;
pub mod ports;

pub use adapters::{router, serve, CommandTimeout, MetricsState, UnixCommandExecutor};
pub use config::{ConfigOverrides, ExporterConfig};
pub use container::ServiceContainer;
pub use domain::{
    CacheSettings, CollectionService, Collector, CollectorContext, CollectorError,
    CollectorRegistry, CommandError, ConfigError, Metric, OmReport, ParseMode,
};
pub use ports::{CommandExecutor, CommandOutput, MetricsService, SystemCommand};
