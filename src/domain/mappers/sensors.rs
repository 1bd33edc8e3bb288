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

//! Probe tables: fans, temperatures and voltages

use super::{integer_index, lines, status};
use crate::domain::parsers::{
    extract_magnitude, is_numeric, label_identifier, reading_with_unit, severity,
};
use crate::domain::{labels, Line, MetricRecord, Output};

/// Temperature columns and the metric each one feeds
const TEMPERATURE_COLUMNS: [(&str, &str); 5] = [
    ("reading", "chassis_temps_reading"),
    ("minimum_warning_threshold", "chassis_temps_min_warning"),
    ("maximum_warning_threshold", "chassis_temps_max_warning"),
    ("minimum_failure_threshold", "chassis_temps_min_failure"),
    ("maximum_failure_threshold", "chassis_temps_max_failure"),
];

/// Probe rows: integer index, a status and a probe name
fn probes(output: &Output) -> impl Iterator<Item = (&Line, &str, String)> {
    lines(output).filter_map(|line| {
        integer_index(line)?;
        let health = status(line)?;
        let probe = line.non_empty("probe_name")?;
        Some((line, health, label_identifier(probe)))
    })
}

/// `omreport chassis fans`
pub fn map_fans(output: &Output) -> Vec<MetricRecord> {
    let mut records = Vec::new();
    for (line, health, fan) in probes(output) {
        let tags = labels([("fan", fan.as_str())]);
        records.push(MetricRecord::new("chassis_fan_status", severity(health), tags.clone()));
        if let Some(rpm) = line.get("reading").and_then(|r| reading_with_unit(r, "RPM")) {
            records.push(MetricRecord::new("chassis_fan_reading", rpm, tags));
        }
    }
    records
}

/// `omreport chassis temps`
pub fn map_temps(output: &Output) -> Vec<MetricRecord> {
    let mut records = Vec::new();
    for (line, health, component) in probes(output) {
        let tags = labels([("component", component.as_str())]);
        records.push(MetricRecord::new("chassis_temps", severity(health), tags.clone()));
        for (column, name) in TEMPERATURE_COLUMNS {
            if let Some(celsius) = line.get(column).and_then(|r| reading_with_unit(r, "C")) {
                records.push(MetricRecord::new(name, celsius, tags.clone()));
            }
        }
    }
    records
}

/// `omreport chassis volts`
pub fn map_volts(output: &Output) -> Vec<MetricRecord> {
    let mut records = Vec::new();
    for (line, health, component) in probes(output) {
        let tags = labels([("component", component.as_str())]);
        records.push(MetricRecord::new("chassis_volts_status", severity(health), tags.clone()));
        let volts = line
            .get("reading")
            .and_then(|r| extract_magnitude(r, "V").ok())
            .filter(|v| is_numeric(v));
        if let Some(volts) = volts {
            records.push(MetricRecord::new("chassis_volts_reading", volts, tags));
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parsers::parse;
    use crate::domain::ParseMode;

    #[test]
    fn test_fans() {
        let output = parse(
            "Fan Probes Information

Fan Redundancy
Redundancy Status;Full

Probe List

Index;Status;Probe Name;Reading;Minimum Warning Threshold;Maximum Warning Threshold;Minimum Failure Threshold;Maximum Failure Threshold
0;Ok;System Board Fan1A;5040 RPM;840 RPM;[N/A];600 RPM;[N/A]
1;Ok;System Board Fan2A;5160 RPM;840 RPM;[N/A];600 RPM;[N/A]
2;Critical;System Board Fan3A;[N/A];840 RPM;[N/A];600 RPM;[N/A]
",
            ParseMode::Dynamic,
        );
        let fan1 = labels([("fan", "System_Board_Fan1A")]);
        let fan2 = labels([("fan", "System_Board_Fan2A")]);
        let fan3 = labels([("fan", "System_Board_Fan3A")]);
        assert_eq!(
            map_fans(&output),
            vec![
                MetricRecord::new("chassis_fan_status", "0", fan1.clone()),
                MetricRecord::new("chassis_fan_reading", "5040", fan1),
                MetricRecord::new("chassis_fan_status", "0", fan2.clone()),
                MetricRecord::new("chassis_fan_reading", "5160", fan2),
                MetricRecord::new("chassis_fan_status", "1", fan3),
            ]
        );
    }

    #[test]
    fn test_temps() {
        let output = parse(
            "Temperature Probes Information

Main System Chassis Temperatures : Ok

Index;Status;Probe Name;Reading;Minimum Warning Threshold;Maximum Warning Threshold;Minimum Failure Threshold;Maximum Failure Threshold
0;Ok;System Board Inlet Temp;17.0 C;3.0 C;42.0 C;-7.0 C;47.0 C
2;Ok;CPU1 Temp;34.0 C;[N/A];[N/A];3.0 C;87.0 C
",
            ParseMode::Dynamic,
        );
        let inlet = labels([("component", "System_Board_Inlet_Temp")]);
        let cpu = labels([("component", "CPU1_Temp")]);
        assert_eq!(
            map_temps(&output),
            vec![
                MetricRecord::new("chassis_temps", "0", inlet.clone()),
                MetricRecord::new("chassis_temps_reading", "17.0", inlet.clone()),
                MetricRecord::new("chassis_temps_min_warning", "3.0", inlet.clone()),
                MetricRecord::new("chassis_temps_max_warning", "42.0", inlet.clone()),
                MetricRecord::new("chassis_temps_min_failure", "-7.0", inlet.clone()),
                MetricRecord::new("chassis_temps_max_failure", "47.0", inlet),
                MetricRecord::new("chassis_temps", "0", cpu.clone()),
                MetricRecord::new("chassis_temps_reading", "34.0", cpu.clone()),
                MetricRecord::new("chassis_temps_min_failure", "3.0", cpu.clone()),
                MetricRecord::new("chassis_temps_max_failure", "87.0", cpu),
            ]
        );
    }

    #[test]
    fn test_volts() {
        let output = parse(
            "Voltage Probes Information

\t\tHealth : Ok


\t\tIndex;Status;Probe Name;Reading;Minimum Warning Threshold;Maximum Warning Threshold;Minimum Failure Threshold;Maximum Failure Threshold
\t\t0;Ok;CPU1 VCORE PG;Good;[N/A];[N/A];[N/A];[N/A]
\t\t2;Ok;System Board 3.3V PG;Good;[N/A];[N/A];[N/A];[N/A]
\t\t31;Non-Critical;PS1 Voltage 1;230 V;[N/A];[N/A];[N/A];[N/A]",
            ParseMode::Dynamic,
        );
        let ps1 = labels([("component", "PS1_Voltage_1")]);
        assert_eq!(
            map_volts(&output),
            vec![
                MetricRecord::new(
                    "chassis_volts_status",
                    "0",
                    labels([("component", "CPU1_VCORE_PG")])
                ),
                MetricRecord::new(
                    "chassis_volts_status",
                    "0",
                    labels([("component", "System_Board_3.3V_PG")])
                ),
                MetricRecord::new("chassis_volts_status", "2", ps1.clone()),
                MetricRecord::new("chassis_volts_reading", "230", ps1),
            ]
        );
    }
}
