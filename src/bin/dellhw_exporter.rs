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

use clap::Parser;
use dellhw_exporter::{
    router, serve, CollectorRegistry, ConfigOverrides, ExporterConfig, ServiceContainer,
};
use log::{error, info};
use std::error::Error;
use std::path::PathBuf;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "dellhw_exporter")]
#[command(about = "Prometheus exporter for Dell hardware components using OMSA", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file; flags and environment override its values
    #[arg(long, env = "DELLHW_EXPORTER_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    /// Print the available collectors and exit
    #[arg(long, alias = "collectors.print", env = "DELLHW_EXPORTER_COLLECTORS_PRINT")]
    collectors_print: bool,

    /// Comma separated list of collectors to use
    #[arg(
        long,
        alias = "collectors.enabled",
        env = "DELLHW_EXPORTER_COLLECTORS_ENABLED",
        value_delimiter = ','
    )]
    collectors_enabled: Option<Vec<String>>,

    /// Comma separated list of collectors to use on top of the enabled ones
    #[arg(
        long,
        env = "DELLHW_EXPORTER_COLLECTORS_ADDITIONAL",
        value_delimiter = ','
    )]
    collectors_additional: Option<Vec<String>>,

    /// Comma separated list of NIC names to report, all when unset
    #[arg(long, env = "DELLHW_EXPORTER_MONITORED_NICS", value_delimiter = ',')]
    monitored_nics: Option<Vec<String>>,

    /// Path to the omreport executable
    #[arg(
        long,
        alias = "collectors.omr-report",
        env = "DELLHW_EXPORTER_COLLECTORS_OMREPORT"
    )]
    collectors_omreport: Option<String>,

    /// Deadline of one omreport invocation, in seconds
    #[arg(
        long,
        alias = "collectors.cmd-timeout",
        env = "DELLHW_EXPORTER_COLLECTORS_CMD_TIMEOUT"
    )]
    collectors_cmd_timeout: Option<u64>,

    /// Address on which to expose metrics and the web interface
    #[arg(
        long,
        alias = "web.listen-address",
        env = "DELLHW_EXPORTER_WEB_LISTEN_ADDRESS"
    )]
    web_listen_address: Option<String>,

    /// Path under which to expose metrics
    #[arg(
        long,
        alias = "web.telemetry-path",
        env = "DELLHW_EXPORTER_WEB_TELEMETRY_PATH"
    )]
    web_telemetry_path: Option<String>,

    /// Serve cached metrics between collections
    #[arg(
        long,
        env = "DELLHW_EXPORTER_CACHE_ENABLED",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    cache_enabled: Option<bool>,

    /// Cache lifetime, in seconds
    #[arg(long, env = "DELLHW_EXPORTER_CACHE_DURATION")]
    cache_duration: Option<u64>,

    /// Log level (debug, info, warning, error); RUST_LOG takes precedence
    #[arg(long, env = "DELLHW_EXPORTER_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            collectors_enabled: self.collectors_enabled.clone(),
            collectors_additional: self.collectors_additional.clone(),
            monitored_nics: self.monitored_nics.clone(),
            omreport_executable: self.collectors_omreport.clone(),
            cmd_timeout: self.collectors_cmd_timeout,
            listen_address: self.web_listen_address.clone(),
            telemetry_path: self.web_telemetry_path.clone(),
            cache_enabled: self.cache_enabled,
            cache_duration: self.cache_duration,
            log_level: self.log_level.clone(),
        }
    }
}

fn load_config(cli: &Cli) -> Result<ExporterConfig, Box<dyn Error>> {
    let base = match &cli.config_file {
        Some(path) => ExporterConfig::from_file(path)?,
        None => ExporterConfig::default(),
    };
    let config = base.merge(cli.overrides());
    config.validate()?;
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if cli.collectors_print {
        println!("Available collectors:");
        for name in CollectorRegistry::names() {
            println!(" - {name}");
        }
        return Ok(());
    }

    let config = load_config(&cli)?;

    env_logger::Builder::new()
        .filter_level(config.log_filter()?)
        .parse_env("RUST_LOG")
        .init();

    info!("Starting dellhw_exporter {}", env!("CARGO_PKG_VERSION"));

    let container = ServiceContainer::new(config);
    let config = container.config();
    container.validate_dependencies().await;

    let service = container.create_collection_service()?;
    info!("Enabled collectors: {}", service.collector_names().join(", "));

    let cache = service.cache_settings();
    if cache.enabled {
        info!("Caching enabled, cache duration {}s", cache.duration.as_secs());
    } else {
        info!("Caching disabled");
    }

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(
        "Listening on {addr}, metrics at {}",
        config.telemetry_path
    );

    let app = router(service, &config.telemetry_path);
    serve(listener, app, shutdown_signal()).await?;
    Ok(())
}
