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

//! Dependency injection container for the exporter services

use crate::adapters::{CommandTimeout, UnixCommandExecutor};
use crate::config::ExporterConfig;
use crate::domain::{CollectionService, CollectorContext, CollectorRegistry, ConfigError, OmReport};
use crate::ports::CommandExecutor;
use log::warn;
use std::sync::Arc;

/// Dependency injection container
pub struct ServiceContainer {
    config: ExporterConfig,
    timeout: CommandTimeout,
    executor: Arc<dyn CommandExecutor>,
}

impl ServiceContainer {
    /// Create a container backed by the Unix command executor
    pub fn new(config: ExporterConfig) -> Self {
        let timeout = CommandTimeout::new(config.command_timeout());
        let executor = Arc::new(UnixCommandExecutor::new(timeout.clone()));
        Self {
            config,
            timeout,
            executor,
        }
    }

    /// Create a container around an existing executor
    ///
    /// The executor enforces its own deadline; `command_timeout` then only
    /// reflects the configured value.
    pub fn with_executor(config: ExporterConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        let timeout = CommandTimeout::new(config.command_timeout());
        Self {
            config,
            timeout,
            executor,
        }
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    /// Handle to the process-wide command deadline
    pub fn command_timeout(&self) -> CommandTimeout {
        self.timeout.clone()
    }

    /// Create the omreport reader
    pub fn create_omreport(&self) -> Arc<OmReport> {
        Arc::new(OmReport::new(
            Arc::clone(&self.executor),
            &self.config.omreport_executable,
        ))
    }

    /// Create the context handed to every collector
    pub fn create_collector_context(&self) -> CollectorContext {
        CollectorContext {
            omreport: self.create_omreport(),
            monitored_nics: self.config.monitored_nics.clone(),
        }
    }

    /// Create the collection service with every configured collector
    ///
    /// # Returns
    /// * `Ok(Arc<CollectionService>)` - Ready to serve scrapes
    /// * `Err(ConfigError::UnknownCollector)` - A configured name is not registered
    pub fn create_collection_service(&self) -> Result<Arc<CollectionService>, ConfigError> {
        let ctx = self.create_collector_context();
        let collectors = CollectorRegistry::build(&self.config.collector_names(), &ctx)?;
        Ok(Arc::new(CollectionService::new(
            collectors,
            self.config.cache_settings(),
        )))
    }

    /// Check that the omreport executable can be found
    ///
    /// A missing executable is only a warning; collectors report failure on
    /// every scrape until it appears.
    pub async fn validate_dependencies(&self) -> bool {
        let omreport = self.create_omreport();
        let available = omreport.is_available().await;
        if !available {
            warn!(
                "omreport executable '{}' not found, collectors will fail",
                omreport.executable()
            );
        }
        available
    }
}
