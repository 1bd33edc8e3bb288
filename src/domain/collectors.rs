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

//! Collectors: one fetch, parse and map cycle per hardware subsystem

use crate::domain::mappers::{self, storage_controller_ids};
use crate::domain::services::OmReport;
use crate::domain::{
    labels, CollectorError, ConfigError, Metric, MetricRecord, Output, ParseMode,
};
use async_trait::async_trait;
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Collectors enabled when none are configured
pub const DEFAULT_COLLECTORS: [&str; 18] = [
    "chassis",
    "chassis_batteries",
    "fans",
    "firmwares",
    "memory",
    "nics",
    "processors",
    "ps",
    "ps_amps_sysboard_pwr",
    "storage_battery",
    "storage_controller",
    "storage_enclosure",
    "storage_pdisk",
    "storage_vdisk",
    "system",
    "temps",
    "version",
    "volts",
];

/// A named strategy producing one subsystem's metrics
#[async_trait]
pub trait Collector: Send + Sync {
    /// Run one full fetch, parse and map cycle
    async fn update(&self) -> Result<Vec<Metric>, CollectorError>;
}

/// Shared dependencies handed to collector constructors
#[derive(Clone)]
pub struct CollectorContext {
    pub omreport: Arc<OmReport>,
    /// Interfaces reported by the `nics` collector; empty means all
    pub monitored_nics: Vec<String>,
}

/// Convert mapper output into gauges, parsing every value strictly
pub fn into_metrics(records: Vec<MetricRecord>, help: &str) -> Result<Vec<Metric>, CollectorError> {
    records
        .into_iter()
        .map(|record| {
            let value = record
                .value
                .parse::<f64>()
                .map_err(|_| CollectorError::InvalidValue {
                    metric: record.name.clone(),
                    value: record.value.clone(),
                })?;
            Ok(Metric::gauge(&record.name, help, value, record.labels))
        })
        .collect()
}

type Mapper = fn(&Output) -> Vec<MetricRecord>;

/// Static description of a single-report collector
struct ReportSpec {
    name: &'static str,
    args: &'static [&'static str],
    mode: ParseMode,
    help: &'static str,
    mapper: Mapper,
}

const REPORT_SPECS: &[ReportSpec] = &[
    ReportSpec {
        name: "chassis",
        args: &["chassis"],
        mode: ParseMode::Dynamic,
        help: "Overall status of chassis components.",
        mapper: mappers::map_chassis,
    },
    ReportSpec {
        name: "chassis_batteries",
        args: &["chassis", "batteries"],
        mode: ParseMode::Dynamic,
        help: "Overall status of chassis batteries",
        mapper: mappers::map_chassis_batteries,
    },
    ReportSpec {
        name: "chassis_info",
        args: &["chassis", "info"],
        mode: ParseMode::KeyValue,
        help: "Chassis info details in labels.",
        mapper: mappers::map_chassis_info,
    },
    ReportSpec {
        name: "fans",
        args: &["chassis", "fans"],
        mode: ParseMode::Dynamic,
        help: "Overall status of system fans.",
        mapper: mappers::map_fans,
    },
    ReportSpec {
        name: "memory",
        args: &["chassis", "memory"],
        mode: ParseMode::Dynamic,
        help: "System RAM DIMM status.",
        mapper: mappers::map_memory,
    },
    ReportSpec {
        name: "processors",
        args: &["chassis", "processors"],
        mode: ParseMode::Dynamic,
        help: "Overall status of CPUs.",
        mapper: mappers::map_processors,
    },
    ReportSpec {
        name: "ps",
        args: &["chassis", "pwrsupplies"],
        mode: ParseMode::Dynamic,
        help: "Overall status of power supplies.",
        mapper: mappers::map_ps,
    },
    ReportSpec {
        name: "ps_amps_sysboard_pwr",
        args: &["chassis", "pwrmonitoring"],
        mode: ParseMode::Dynamic,
        help: "System board power usage.",
        mapper: mappers::map_ps_amps_sysboard_pwr,
    },
    ReportSpec {
        name: "storage_battery",
        args: &["storage", "battery"],
        mode: ParseMode::Dynamic,
        help: "Status of storage controller backup batteries.",
        mapper: mappers::map_storage_battery,
    },
    ReportSpec {
        name: "storage_controller",
        args: &["storage", "controller"],
        mode: ParseMode::Dynamic,
        help: "Overall status of storage controllers.",
        mapper: mappers::map_storage_controller,
    },
    ReportSpec {
        name: "storage_enclosure",
        args: &["storage", "enclosure"],
        mode: ParseMode::Dynamic,
        help: "Overall status of storage enclosures.",
        mapper: mappers::map_storage_enclosure,
    },
    ReportSpec {
        name: "storage_vdisk",
        args: &["storage", "vdisk"],
        mode: ParseMode::Dynamic,
        help: "Overall status of virtual disks + RAID level (if available).",
        mapper: mappers::map_storage_vdisk,
    },
    ReportSpec {
        name: "system",
        args: &["system"],
        mode: ParseMode::Dynamic,
        help: "Overall status of system components.",
        mapper: mappers::map_system,
    },
    ReportSpec {
        name: "temps",
        args: &["chassis", "temps"],
        mode: ParseMode::Dynamic,
        help: "Overall temperatures and status of system temperature readings.",
        mapper: mappers::map_temps,
    },
    ReportSpec {
        name: "volts",
        args: &["chassis", "volts"],
        mode: ParseMode::Dynamic,
        help: "Overall volts and status of power supply volt readings.",
        mapper: mappers::map_volts,
    },
];

/// Collectors that need more than one report or none at all
const COMPOSITE_COLLECTORS: [&str; 4] = ["firmwares", "nics", "storage_pdisk", "version"];

/// Reads one report and maps it
struct ReportCollector {
    omreport: Arc<OmReport>,
    spec: &'static ReportSpec,
}

#[async_trait]
impl Collector for ReportCollector {
    async fn update(&self) -> Result<Vec<Metric>, CollectorError> {
        let output = self.omreport.read(self.spec.args, self.spec.mode).await?;
        into_metrics((self.spec.mapper)(&output), self.spec.help)
    }
}

/// BIOS and firmware versions
pub struct FirmwaresCollector {
    omreport: Arc<OmReport>,
}

impl FirmwaresCollector {
    const HELP: &'static str = "Version info of firmwares/bios.";
}

#[async_trait]
impl Collector for FirmwaresCollector {
    async fn update(&self) -> Result<Vec<Metric>, CollectorError> {
        let bios = self
            .omreport
            .read(&["chassis", "bios"], ParseMode::Dynamic)
            .await?;
        let firmware = self
            .omreport
            .read(&["chassis", "firmware"], ParseMode::Dynamic)
            .await?;

        let mut records = mappers::map_bios(&bios);
        records.extend(mappers::map_firmware(&firmware));
        into_metrics(records, Self::HELP)
    }
}

/// NIC connection state, optionally restricted to an allow-list
pub struct NicsCollector {
    omreport: Arc<OmReport>,
    monitored: Vec<String>,
}

#[async_trait]
impl Collector for NicsCollector {
    async fn update(&self) -> Result<Vec<Metric>, CollectorError> {
        let output = self
            .omreport
            .read(&["chassis", "nics"], ParseMode::Dynamic)
            .await?;
        into_metrics(
            mappers::map_nics(&output, &self.monitored),
            "Connection status of network cards.",
        )
    }
}

/// Physical disks, read per controller
///
/// Stage one lists the controllers, stage two reads the disks of each one.
/// Any failing read fails the whole pass.
pub struct StoragePdiskCollector {
    omreport: Arc<OmReport>,
}

#[async_trait]
impl Collector for StoragePdiskCollector {
    async fn update(&self) -> Result<Vec<Metric>, CollectorError> {
        let controllers = self
            .omreport
            .read(&["storage", "controller"], ParseMode::Dynamic)
            .await?;

        let mut records = Vec::new();
        for cid in storage_controller_ids(&controllers) {
            debug!("Collecting pdisks from controller {cid}");
            let selector = format!("controller={cid}");
            let output = self
                .omreport
                .read(&["storage", "pdisk", selector.as_str()], ParseMode::Dynamic)
                .await?;
            records.extend(mappers::map_storage_pdisk(&output, &cid));
        }

        into_metrics(
            records,
            "Overall status of physical disks + failure prediction (if available).",
        )
    }
}

/// Build information of this exporter
pub struct VersionCollector;

#[async_trait]
impl Collector for VersionCollector {
    async fn update(&self) -> Result<Vec<Metric>, CollectorError> {
        let build = labels([
            ("version", env!("CARGO_PKG_VERSION")),
            ("revision", option_env!("DELLHW_EXPORTER_REVISION").unwrap_or("unknown")),
            ("branch", option_env!("DELLHW_EXPORTER_BRANCH").unwrap_or("unknown")),
        ]);
        Ok(vec![Metric::gauge(
            "exporter_version",
            "Constant '1' value with version, revision, and branch labels from the dellhw_exporter version info.",
            1.0,
            build,
        )])
    }
}

/// The fixed set of collectors known to this exporter
pub struct CollectorRegistry;

impl CollectorRegistry {
    /// Every registered collector name, sorted
    pub fn names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = REPORT_SPECS
            .iter()
            .map(|spec| spec.name)
            .chain(COMPOSITE_COLLECTORS)
            .collect();
        names.sort_unstable();
        names
    }

    pub fn contains(name: &str) -> bool {
        COMPOSITE_COLLECTORS.contains(&name) || REPORT_SPECS.iter().any(|spec| spec.name == name)
    }

    /// Instantiate one collector by name
    pub fn create(name: &str, ctx: &CollectorContext) -> Option<Arc<dyn Collector>> {
        let omreport = Arc::clone(&ctx.omreport);
        let collector: Arc<dyn Collector> = match name {
            "firmwares" => Arc::new(FirmwaresCollector { omreport }),
            "nics" => Arc::new(NicsCollector {
                omreport,
                monitored: ctx.monitored_nics.clone(),
            }),
            "storage_pdisk" => Arc::new(StoragePdiskCollector { omreport }),
            "version" => Arc::new(VersionCollector),
            _ => {
                let spec = REPORT_SPECS.iter().find(|spec| spec.name == name)?;
                Arc::new(ReportCollector { omreport, spec })
            }
        };
        Some(collector)
    }

    /// Instantiate the named collectors
    ///
    /// Every name is checked before anything is built; duplicates collapse
    /// to one entry.
    ///
    /// # Returns
    /// * `Ok(BTreeMap)` - Collectors keyed by name
    /// * `Err(ConfigError::UnknownCollector)` - A name is not registered
    pub fn build<S: AsRef<str>>(
        names: &[S],
        ctx: &CollectorContext,
    ) -> Result<BTreeMap<String, Arc<dyn Collector>>, ConfigError> {
        if let Some(unknown) = names.iter().find(|name| !Self::contains(name.as_ref())) {
            return Err(ConfigError::UnknownCollector(unknown.as_ref().to_string()));
        }

        let mut collectors = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            if collectors.contains_key(name) {
                continue;
            }
            if let Some(collector) = Self::create(name, ctx) {
                collectors.insert(name.to_string(), collector);
            }
        }
        Ok(collectors)
    }
}
