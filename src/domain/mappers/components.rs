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

//! Memory modules, processors and network interfaces

use super::{integer_index, lines, status};
use crate::domain::parsers::{component_id, label_identifier, severity};
use crate::domain::{labels, MetricRecord, Output};

/// Processor brand reported for an empty socket
const EMPTY_SOCKET: &str = "[Not Occupied]";

/// NIC states that count as healthy
const NIC_UP_STATES: [&str; 3] = ["Connected", "Full", "Not Applicable"];

/// `omreport chassis memory`
pub fn map_memory(output: &Output) -> Vec<MetricRecord> {
    lines(output)
        .filter_map(|line| {
            integer_index(line)?;
            let health = status(line)?;
            let connector = line.non_empty("connector_name")?;
            Some(MetricRecord::new(
                "chassis_memory_status",
                severity(health),
                labels([("memory", label_identifier(connector).as_str())]),
            ))
        })
        .collect()
}

/// `omreport chassis processors`; empty sockets are skipped
pub fn map_processors(output: &Output) -> Vec<MetricRecord> {
    lines(output)
        .filter(|line| line.get("processor_brand") != Some(EMPTY_SOCKET))
        .filter_map(|line| {
            integer_index(line)?;
            let health = status(line)?;
            let connector = line.non_empty("connector_name")?;
            Some(MetricRecord::new(
                "chassis_processor_status",
                severity(health),
                labels([("processor", label_identifier(connector).as_str())]),
            ))
        })
        .collect()
}

/// `omreport chassis nics`
///
/// Physical interfaces report `Connection Status`, team interfaces
/// `Redundancy Status`. An empty `monitored` list keeps every interface.
pub fn map_nics(output: &Output, monitored: &[String]) -> Vec<MetricRecord> {
    lines(output)
        .filter_map(|line| {
            let index = line.non_empty("index")?;
            let device = line.non_empty("interface_name")?;
            if !monitored.is_empty() && !monitored.iter().any(|nic| nic == device) {
                return None;
            }
            let state = line
                .get("connection_status")
                .or_else(|| line.get("redundancy_status"))?;
            let value = if NIC_UP_STATES.contains(&state) { "0" } else { "1" };
            Some(MetricRecord::new(
                "nic_status",
                value,
                labels([("id", component_id(index).as_str()), ("device", device)]),
            ))
        })
        .collect()
}
