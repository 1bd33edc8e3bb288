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

//! Storage subsystem: controllers, batteries, enclosures, physical and
//! virtual disks
//!
//! omreport groups controller-scoped rows under a banner naming the
//! controller. The banner may be a Report's title or its description, and it
//! applies to every following Report until the next banner.

use super::{lines, status};
use crate::domain::parsers::{
    component_id, number_from_string, pdisk_state, severity, vdisk_cache_policy,
    vdisk_read_policy, vdisk_state, vdisk_write_policy, yes_no,
};
use crate::domain::{labels, Line, MetricRecord, Output, Report};

/// Banner prefix of battery, pdisk and vdisk reports
pub const CONTROLLER_PREFIX: &str = "Controller ";
/// Banner prefix of enclosure reports
pub const ENCLOSURE_PREFIX: &str = "Enclosure(s) on Controller ";
/// Controller name used before the first banner
const UNKNOWN_CONTROLLER: &str = "N/A";

/// Running controller name across the Reports of one Output
#[derive(Debug, Clone)]
pub struct ControllerTracker {
    prefix: &'static str,
    name: String,
}

impl ControllerTracker {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            name: UNKNOWN_CONTROLLER.to_string(),
        }
    }

    /// Pick up a banner from the Report's title, else its description
    pub fn observe(&mut self, report: &Report) {
        let banner = [report.title.as_deref(), report.description.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|text| text.strip_prefix(self.prefix));
        if let Some(name) = banner {
            self.name = name.trim().to_string();
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Walk every (controller name, row) pair of an Output
fn controller_rows<'a>(
    output: &'a Output,
    prefix: &'static str,
) -> impl Iterator<Item = (String, &'a Line)> + 'a {
    let mut tracker = ControllerTracker::new(prefix);
    output.iter().flat_map(move |report| {
        tracker.observe(report);
        let name = tracker.name().to_string();
        report.lines.iter().map(move |line| (name.clone(), line))
    })
}

/// `omreport storage battery`
pub fn map_storage_battery(output: &Output) -> Vec<MetricRecord> {
    controller_rows(output, CONTROLLER_PREFIX)
        .filter_map(|(controller_name, line)| {
            let id = line.non_empty("id")?;
            let health = status(line)?;
            Some(MetricRecord::new(
                "storage_battery_status",
                severity(health),
                labels([
                    ("controller", component_id(id).as_str()),
                    ("controller_name", controller_name.as_str()),
                ]),
            ))
        })
        .collect()
}

/// `omreport storage controller`
pub fn map_storage_controller(output: &Output) -> Vec<MetricRecord> {
    lines(output)
        .filter_map(|line| {
            let (id, health, name) = controller_row(line)?;
            let slot = line.non_empty("slot_id").unwrap_or(UNKNOWN_CONTROLLER);
            let controller_name = format!("{name} (Slot {slot})");
            Some(MetricRecord::new(
                "storage_controller_status",
                severity(health),
                labels([
                    ("id", component_id(id).as_str()),
                    ("controller_name", controller_name.as_str()),
                ]),
            ))
        })
        .collect()
}

/// Controller ids listed by `omreport storage controller`, as omreport
/// expects them in `controller=<id>`
pub fn storage_controller_ids(output: &Output) -> Vec<String> {
    lines(output)
        .filter_map(controller_row)
        .map(|(id, _, _)| id.to_string())
        .collect()
}

fn controller_row(line: &Line) -> Option<(&str, &str, &str)> {
    Some((line.non_empty("id")?, status(line)?, line.non_empty("name")?))
}

/// `omreport storage enclosure`
pub fn map_storage_enclosure(output: &Output) -> Vec<MetricRecord> {
    controller_rows(output, ENCLOSURE_PREFIX)
        .filter_map(|(controller_name, line)| {
            let id = line.non_empty("id")?;
            let health = status(line)?;
            Some(MetricRecord::new(
                "storage_enclosure_status",
                severity(health),
                labels([
                    ("enclosure", component_id(id).as_str()),
                    ("controller_name", controller_name.as_str()),
                ]),
            ))
        })
        .collect()
}

/// `omreport storage pdisk controller=<controller>`
pub fn map_storage_pdisk(output: &Output, controller: &str) -> Vec<MetricRecord> {
    let mut records = Vec::new();
    for (controller_name, line) in controller_rows(output, CONTROLLER_PREFIX) {
        let (Some(id), Some(health)) = (line.non_empty("id"), status(line)) else {
            continue;
        };
        let disk = component_id(id);
        let tags = labels([
            ("controller", controller),
            ("disk", disk.as_str()),
            ("controller_name", controller_name.as_str()),
        ]);

        records.push(MetricRecord::new("storage_pdisk_status", severity(health), tags.clone()));
        if let Some(state) = line.get("state").and_then(pdisk_state) {
            records.push(MetricRecord::new("storage_pdisk_state", state, tags.clone()));
        }
        if let Some(predicted) = line.get("failure_predicted") {
            records.push(MetricRecord::new(
                "storage_pdisk_failure_predicted",
                yes_no(predicted),
                tags.clone(),
            ));
        }
        if let Some(endurance) = line.get("remaining_rated_write_endurance") {
            records.push(MetricRecord::new(
                "storage_pdisk_remaining_rated_write_endurance",
                number_from_string(endurance),
                tags.clone(),
            ));
        }
        if line.get("encryption_capable") == Some("Yes") {
            if let Some(encrypted) = line.get("encrypted") {
                records.push(MetricRecord::new(
                    "storage_pdisk_storage_encrypted",
                    yes_no(encrypted),
                    tags,
                ));
            }
        }
    }
    records
}

/// `omreport storage vdisk`
pub fn map_storage_vdisk(output: &Output) -> Vec<MetricRecord> {
    let mut records = Vec::new();
    for (controller_name, line) in controller_rows(output, CONTROLLER_PREFIX) {
        let (Some(id), Some(health), Some(name)) =
            (line.non_empty("id"), status(line), line.get("name"))
        else {
            continue;
        };
        let vdisk = component_id(id);
        let tags = labels([
            ("vdisk", vdisk.as_str()),
            ("vdisk_name", name),
            ("controller_name", controller_name.as_str()),
        ]);

        records.push(MetricRecord::new("storage_vdisk_status", severity(health), tags.clone()));
        if let Some(state) = line.get("state").and_then(vdisk_state) {
            records.push(MetricRecord::new("storage_vdisk_state", state, tags.clone()));
        }
        if let Some(layout) = line.get("layout") {
            records.push(MetricRecord::new(
                "storage_vdisk_raidlevel",
                number_from_string(layout),
                tags.clone(),
            ));
        }
        let policies = [
            ("storage_vdisk_read_policy", line.get("read_policy").and_then(vdisk_read_policy)),
            ("storage_vdisk_write_policy", line.get("write_policy").and_then(vdisk_write_policy)),
            ("storage_vdisk_cache_policy", line.get("cache_policy").and_then(vdisk_cache_policy)),
        ];
        for (metric, code) in policies {
            if let Some(code) = code {
                records.push(MetricRecord::new(metric, code, tags.clone()));
            }
        }
    }
    records
}
