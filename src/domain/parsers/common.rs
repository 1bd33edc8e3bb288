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

//! Common value helpers shared by the report parser and the mappers

use crate::domain::ValueError;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NUMBER_RE: Regex = Regex::new(r"[0-9]+").unwrap();
}

/// Clean and normalize a string value
///
/// Collapses every whitespace run to a single space and trims both ends.
pub fn clean_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a field name: lower-case, spaces replaced by underscores
pub fn normalize_key(key: &str) -> String {
    key.to_lowercase().replace(' ', "_")
}

/// Map a health word to the 0/1/2 severity code
///
/// `Ok` is healthy (0), `Non-Critical` is a warning (2), anything else is
/// treated as critical or unknown (1).
pub fn severity(status: &str) -> &'static str {
    match status {
        "Ok" => "0",
        "Non-Critical" => "2",
        _ => "1",
    }
}

/// Strip a unit suffix from a reading, tolerating whitespace in between
///
/// # Arguments
/// * `reading` - Reading such as `900 W`
/// * `suffix` - Unit suffix such as `W`
///
/// # Returns
/// * `Ok(String)` - The magnitude (`900`)
/// * `Err(ValueError::SuffixNotFound)` - The reading does not end in `suffix`
pub fn extract_magnitude(reading: &str, suffix: &str) -> Result<String, ValueError> {
    reading
        .strip_suffix(suffix)
        .map(|magnitude| magnitude.trim().to_string())
        .ok_or(ValueError::SuffixNotFound)
}

/// Replace characters that are not allowed in identifiers with `_`
///
/// Letters, digits, `-`, `_`, `.` and `/` are kept. A run of disallowed
/// characters becomes a single `_`.
pub fn normalize_identifier(raw: &str) -> Result<String, ValueError> {
    let mut cleaned = String::with_capacity(raw.len());
    let mut replaced = false;

    for c in raw.chars() {
        if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/') {
            cleaned.push(c);
            replaced = false;
        } else if !replaced {
            cleaned.push('_');
            replaced = true;
        }
    }

    if cleaned.is_empty() {
        return Err(ValueError::EmptyIdentifier);
    }
    Ok(cleaned)
}

/// Identifier used as a label value; empty when nothing usable remains
pub fn label_identifier(raw: &str) -> String {
    normalize_identifier(raw).unwrap_or_default()
}

/// Turn a normalized field name into a valid label name
///
/// Characters outside `[A-Za-z0-9_]` become `_`; a leading digit gets a `_`
/// prefix.
pub fn label_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Replace `:` separators in omreport ids (`0:1:2` -> `0_1_2`)
pub fn component_id(raw: &str) -> String {
    raw.replace(':', "_")
}

/// First run of digits in `s`, or `-1` when there is none
pub fn number_from_string(s: &str) -> String {
    NUMBER_RE
        .find(s)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "-1".to_string())
}

/// `Yes` -> `1`, anything else -> `0`
pub fn yes_no(value: &str) -> &'static str {
    if value == "Yes" {
        "1"
    } else {
        "0"
    }
}

/// Whether a string parses as a float
pub fn is_numeric(value: &str) -> bool {
    value.parse::<f64>().is_ok()
}

/// Magnitude of a `<number> <unit>` reading, e.g. `5040 RPM`
///
/// Requires exactly two whitespace-separated tokens, the second being `unit`,
/// and a numeric first token.
pub fn reading_with_unit<'a>(reading: &'a str, unit: &str) -> Option<&'a str> {
    let mut tokens = reading.split_whitespace();
    match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(value), Some(u), None) if u == unit && is_numeric(value) => Some(value),
        _ => None,
    }
}

/// Leading numeric token of a reading, e.g. `84 W` -> `84`
pub fn leading_number(reading: &str) -> Option<&str> {
    let mut tokens = reading.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(value), Some(_)) if is_numeric(value) => Some(value),
        _ => None,
    }
}

/// Physical disk state code
pub fn pdisk_state(state: &str) -> Option<&'static str> {
    let code = match state {
        "Unknown" => "0",
        "Ready" => "1",
        "Online" => "2",
        "Degraded" => "3",
        "Failed" => "4",
        "Offline" => "5",
        "Rebuilding" => "6",
        "Incompatible" => "7",
        "Removed" => "8",
        "Clear" => "9",
        "SMART Alert Detected" => "10",
        "Foreign" => "11",
        "Unsupported" => "12",
        "Replacing" => "13",
        "Non-RAID" => "14",
        _ => return None,
    };
    Some(code)
}

/// Virtual disk state code
pub fn vdisk_state(state: &str) -> Option<&'static str> {
    let code = match state {
        "Ready" => "1",
        "Degraded" => "2",
        "Resynching" => "3",
        "Resynching Paused" => "4",
        "Regenerating" => "5",
        "Reconstructing" => "6",
        "Failed" => "7",
        "Failed Redundancy" => "8",
        "Background Initialization" => "9",
        "Formatting" => "10",
        "Initializing" => "11",
        "Degraded Redundancy" => "12",
        _ => return None,
    };
    Some(code)
}

/// Virtual disk read policy code
pub fn vdisk_read_policy(policy: &str) -> Option<&'static str> {
    let code = match policy {
        "Not Applicable" => "0",
        "Read Ahead" => "1",
        "No Read Ahead" => "2",
        "Read Cache Enabled" => "3",
        "Read Cache Disabled" => "4",
        "Adaptive Read Ahead" => "5",
        _ => return None,
    };
    Some(code)
}

/// Virtual disk write policy code
pub fn vdisk_write_policy(policy: &str) -> Option<&'static str> {
    let code = match policy {
        "Not Applicable" => "0",
        "Write Ahead" => "1",
        "Force Write Back" => "2",
        "Write Back Enabled" => "3",
        "Write Through" => "4",
        "Write Cache Enabled Protected" => "5",
        "Write Cache Disabled" => "6",
        "Write Back" => "7",
        _ => return None,
    };
    Some(code)
}

/// Virtual disk cache policy code
pub fn vdisk_cache_policy(policy: &str) -> Option<&'static str> {
    let code = match policy {
        "Not Applicable" => "0",
        "Cache I/O" => "1",
        "Direct I/O" => "2",
        _ => return None,
    };
    Some(code)
}
