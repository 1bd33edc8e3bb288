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

//! Power supplies and power monitoring

use super::{lines, status};
use crate::domain::parsers::{component_id, extract_magnitude, is_numeric, leading_number, severity};
use crate::domain::{labels, Labels, Line, MetricRecord, Output};

/// Probes that report whole-system power draw
const SYSTEM_POWER_PROBES: [&str; 2] = ["System Board Pwr Consumption", "System Board System Level"];

fn wattage(line: &Line, key: &str) -> Option<String> {
    line.non_empty(key)
        .and_then(|w| extract_magnitude(w, "W").ok())
        .filter(|w| is_numeric(w))
}

/// `omreport chassis pwrsupplies`
pub fn map_ps(output: &Output) -> Vec<MetricRecord> {
    let mut records = Vec::new();
    for line in lines(output) {
        let (Some(index), Some(health)) = (line.non_empty("index"), status(line)) else {
            continue;
        };
        let tags = labels([("id", component_id(index).as_str())]);
        records.push(MetricRecord::new("ps_status", severity(health), tags.clone()));

        if let Some(input) = wattage(line, "rated_input_wattage") {
            records.push(MetricRecord::new("ps_rated_input_wattage", input, tags.clone()));
        }
        let output_wattage = wattage(line, "maximum_output_wattage")
            .or_else(|| wattage(line, "rated_output_wattage"));
        if let Some(output_wattage) = output_wattage {
            records.push(MetricRecord::new("ps_rated_output_wattage", output_wattage, tags));
        }
    }
    records
}

/// `omreport chassis pwrmonitoring`: per-PSU current and system board power
pub fn map_ps_amps_sysboard_pwr(output: &Output) -> Vec<MetricRecord> {
    let mut records = Vec::new();
    for line in lines(output) {
        if let (Some(psu), Some(amperage)) = (line.get("psu"), line.get("amperage")) {
            let Some((name, _)) = psu.split_once("Current") else {
                continue;
            };
            if let Some(amps) = leading_number(amperage) {
                let id = name.replace(' ', "");
                records.push(MetricRecord::new(
                    "chassis_current_reading",
                    amps,
                    labels([("pwrsupply", id.as_str())]),
                ));
            }
            continue;
        }

        let is_system_probe = line
            .get("probe_name")
            .is_some_and(|probe| SYSTEM_POWER_PROBES.contains(&probe));
        if !is_system_probe {
            continue;
        }
        let readings = (
            line.get("reading").and_then(leading_number),
            line.get("warning_threshold").and_then(leading_number),
            line.get("failure_threshold").and_then(leading_number),
        );
        if let (Some(reading), Some(warn), Some(fail)) = readings {
            records.push(MetricRecord::new("chassis_power_reading", reading, Labels::new()));
            records.push(MetricRecord::new("chassis_power_warn_level", warn, Labels::new()));
            records.push(MetricRecord::new("chassis_power_fail_level", fail, Labels::new()));
        }
    }
    records
}
