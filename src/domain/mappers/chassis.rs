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

//! Chassis-level health, identity and firmware reports

use super::{lines, status};
use crate::domain::parsers::{component_id, label_name, normalize_key, severity};
use crate::domain::{labels, Labels, MetricRecord, Output};

/// `omreport chassis` component health
pub fn map_chassis(output: &Output) -> Vec<MetricRecord> {
    component_status(output, "chassis_status")
}

/// `omreport system` component health
pub fn map_system(output: &Output) -> Vec<MetricRecord> {
    component_status(output, "system_status")
}

fn component_status(output: &Output, name: &str) -> Vec<MetricRecord> {
    lines(output)
        .filter_map(|line| {
            let level = line.non_empty("severity")?;
            let component = line.non_empty("component")?;
            Some(MetricRecord::new(
                name,
                severity(level),
                labels([("component", component.replace(' ', "_").as_str())]),
            ))
        })
        .collect()
}

/// `omreport chassis batteries` CMOS battery health
pub fn map_chassis_batteries(output: &Output) -> Vec<MetricRecord> {
    lines(output)
        .filter_map(|line| {
            let index = line.non_empty("index")?;
            let health = status(line)?;
            Some(MetricRecord::new(
                "cmos_batteries_status",
                severity(health),
                labels([("id", component_id(index).as_str())]),
            ))
        })
        .collect()
}

/// `omreport chassis info`: every key/value pair as a label on one record
pub fn map_chassis_info(output: &Output) -> Vec<MetricRecord> {
    let info: Labels = lines(output)
        .flat_map(|line| line.iter())
        .map(|(key, value)| (label_name(key), value.to_string()))
        .collect();

    if info.is_empty() {
        return Vec::new();
    }
    vec![MetricRecord::new("chassis_info", "0", info)]
}

/// `omreport chassis bios`: lower-cased BIOS details as labels
pub fn map_bios(output: &Output) -> Vec<MetricRecord> {
    vec![MetricRecord::new("bios", "0", version_labels(output))]
}

/// `omreport chassis firmware`: lower-cased firmware versions as labels
pub fn map_firmware(output: &Output) -> Vec<MetricRecord> {
    vec![MetricRecord::new("firmware", "0", version_labels(output))]
}

fn version_labels(output: &Output) -> Labels {
    let mut found = Labels::new();
    for line in lines(output) {
        if let (Some(component), Some(version)) = (line.get("component"), line.get("version")) {
            found.insert(label_name(&normalize_key(component)), version.to_lowercase());
        } else if line.len() == 1 {
            for (key, value) in line.iter() {
                found.insert(label_name(key), value.to_lowercase());
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parsers::parse;
    use crate::domain::ParseMode;

    #[test]
    fn test_chassis_status() {
        let output = parse(
            "Health

Main System Chassis

SEVERITY;COMPONENT
Ok;Fans
Critical;Intrusion
Non-Critical;Power Supplies

For further help, type the command followed by -?
",
            ParseMode::Dynamic,
        );
        let records = map_chassis(&output);
        assert_eq!(
            records,
            vec![
                MetricRecord::new("chassis_status", "0", labels([("component", "Fans")])),
                MetricRecord::new("chassis_status", "1", labels([("component", "Intrusion")])),
                MetricRecord::new(
                    "chassis_status",
                    "2",
                    labels([("component", "Power_Supplies")])
                ),
            ]
        );
    }

    #[test]
    fn test_system_status() {
        let output = parse(
            "Health

SEVERITY;COMPONENT
Ok;Main System Chassis

For further help, type the command followed by -?
",
            ParseMode::Dynamic,
        );
        assert_eq!(
            map_system(&output),
            vec![MetricRecord::new(
                "system_status",
                "0",
                labels([("component", "Main_System_Chassis")])
            )]
        );
    }

    #[test]
    fn test_chassis_batteries() {
        let output = parse(
            "Batteries

Index;Status;Probe Name;Reading
0;Ok;System Board CMOS Battery;Good
",
            ParseMode::Dynamic,
        );
        assert_eq!(
            map_chassis_batteries(&output),
            vec![MetricRecord::new("cmos_batteries_status", "0", labels([("id", "0")]))]
        );
    }

    #[test]
    fn test_chassis_info() {
        let output = parse(
            "Chassis Information

Index;0
Chassis Name;Main System Chassis
Chassis Service Tag;ABC1234
",
            ParseMode::KeyValue,
        );
        let records = map_chassis_info(&output);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, "0");
        assert_eq!(
            records[0].labels.get("chassis_service_tag").map(String::as_str),
            Some("ABC1234")
        );
        assert_eq!(records[0].labels.len(), 3);

        assert!(map_chassis_info(&Vec::new()).is_empty());
    }

    #[test]
    fn test_bios() {
        let output = parse(
            "BIOS Information

\t\tManufacturer;Dell Inc.
\t\tVersion;2.10.5
\t\tRelease Date;07/25/2019
\t\t",
            ParseMode::Dynamic,
        );
        assert_eq!(
            map_bios(&output),
            vec![MetricRecord::new(
                "bios",
                "0",
                labels([
                    ("manufacturer", "dell inc."),
                    ("version", "2.10.5"),
                    ("release_date", "07/25/2019"),
                ])
            )]
        );
    }

    #[test]
    fn test_firmware() {
        let output = parse(
            "Firmware Information

\t\tVersion Information
\t\tiDRAC8;2.70.70.70 (Build 45)
\t\tLifecycle Controller;2.70.70.70
\t\t",
            ParseMode::Dynamic,
        );
        assert_eq!(
            map_firmware(&output),
            vec![MetricRecord::new(
                "firmware",
                "0",
                labels([
                    ("idrac8", "2.70.70.70 (build 45)"),
                    ("lifecycle_controller", "2.70.70.70"),
                ])
            )]
        );
    }
}
