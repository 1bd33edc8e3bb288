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

//! Per-subsystem mapping from parsed Reports to metric records
//!
//! Mappers are pure: a missing field or an unparseable derived value skips
//! that metric for the row. Rows are selected by normalized field name, so
//! column order and extra columns do not matter.

pub mod chassis;
pub mod components;
pub mod power;
pub mod sensors;
pub mod storage;

pub use chassis::*;
pub use components::*;
pub use power::*;
pub use sensors::*;
pub use storage::*;

use crate::domain::{Line, Output};

/// Every Line of every Report, in output order
pub(crate) fn lines(output: &Output) -> impl Iterator<Item = &Line> {
    output.iter().flat_map(|report| report.lines.iter())
}

/// `index` of a table row, if it is an integer
pub(crate) fn integer_index(line: &Line) -> Option<&str> {
    line.get("index").filter(|index| index.parse::<i64>().is_ok())
}

/// Status health word of a row
pub(crate) fn status(line: &Line) -> Option<&str> {
    line.non_empty("status")
}
