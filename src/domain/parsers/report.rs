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

//! Parser for omreport `-fmt ssv` output
//!
//! omreport prints one or more blocks per invocation. A block starts with up
//! to two banner lines (title and description) followed by `;`-separated
//! lines that are either key/value pairs or a table with a header row. The
//! parser never fails: unrecognised input degrades to missing Reports or
//! missing fields.

use super::common::{clean_value, normalize_key};
use crate::domain::entities::{Line, Output, ParseMode, Report};

/// Field delimiter of the ssv format
const DELIMITER: char = ';';

/// Footer printed after some reports
const HELP_FOOTER: &str = "For further help";

/// Where in the current Report the parser is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingTitle,
    AwaitingDescription,
    AwaitingHeader,
    ReadingRows,
}

/// Banner line a trigger is matched against
#[derive(Debug, Clone, Copy)]
enum Banner {
    Title,
    Description,
}

/// Line shape forced by a trigger
#[derive(Debug, Clone, Copy)]
enum Forced {
    KeyValue,
    Schema(&'static [&'static str]),
}

struct Trigger {
    banner: Banner,
    text: &'static str,
    forced: Forced,
}

/// Banners whose blocks do not carry their own header line
const TRIGGERS: &[Trigger] = &[
    Trigger {
        banner: Banner::Description,
        text: "Version Information",
        forced: Forced::Schema(&["component", "version"]),
    },
    Trigger {
        banner: Banner::Title,
        text: "Amperage",
        forced: Forced::Schema(&["psu", "amperage"]),
    },
    Trigger {
        banner: Banner::Title,
        text: "BIOS Information",
        forced: Forced::KeyValue,
    },
];

/// Parse raw omreport output into Reports
///
/// # Arguments
/// * `raw` - Complete stdout of one omreport invocation
/// * `mode` - How delimited lines without a forced shape are read
///
/// # Returns
/// The non-empty Reports in output order
pub fn parse(raw: &str, mode: ParseMode) -> Output {
    let lines: Vec<&str> = raw.lines().map(str::trim).collect();
    let mut parser = ReportParser::new(mode);

    for (i, line) in lines.iter().enumerate() {
        let prev = if i > 0 { lines[i - 1] } else { "" };
        let next = lines.get(i + 1).copied().unwrap_or("");
        parser.feed(line, prev, next);
    }

    parser.finish()
}

fn is_delimited(line: &str) -> bool {
    line.contains(DELIMITER)
}

fn split_fields(line: &str) -> Vec<String> {
    line.split(DELIMITER).map(clean_value).collect()
}

/// Split at the first delimiter into a one-entry Line
fn key_value_line(line: &str) -> Line {
    let mut kv = Line::new();
    if let Some((key, value)) = line.split_once(DELIMITER) {
        kv.insert(normalize_key(&clean_value(key)), clean_value(value));
    }
    kv
}

/// Zip fields against keys positionally; extra fields are dropped
fn zip_line<K: AsRef<str>>(keys: &[K], fields: Vec<String>) -> Line {
    let mut line = Line::new();
    for (key, value) in keys.iter().zip(fields) {
        let key = key.as_ref();
        if !key.is_empty() {
            line.insert(key.to_string(), value);
        }
    }
    line
}

struct Header {
    fields: Vec<String>,
    keys: Vec<String>,
}

struct ReportParser {
    mode: ParseMode,
    state: State,
    report: Report,
    header: Option<Header>,
    output: Output,
}

impl ReportParser {
    fn new(mode: ParseMode) -> Self {
        Self {
            mode,
            state: State::AwaitingTitle,
            report: Report::default(),
            header: None,
            output: Vec::new(),
        }
    }

    fn feed(&mut self, line: &str, prev: &str, next: &str) {
        if line.is_empty() {
            // Blank lines between banner lines are decorative
            if is_delimited(prev) {
                self.close_report();
            }
            return;
        }

        if line.starts_with(HELP_FOOTER) {
            return;
        }

        if is_delimited(line) {
            self.on_delimited(line, prev, next);
        } else {
            self.on_text(line);
        }
    }

    fn on_text(&mut self, text: &str) {
        let text = clean_value(text);

        if !self.report.lines.is_empty() {
            self.close_report();
            self.report.title = Some(text);
            self.state = State::AwaitingDescription;
            return;
        }

        match self.state {
            State::AwaitingTitle => {
                self.report.title = Some(text);
                self.state = State::AwaitingDescription;
            }
            State::AwaitingDescription => {
                self.report.description = Some(text);
                self.state = State::AwaitingHeader;
            }
            State::AwaitingHeader | State::ReadingRows => {
                if self.report.title.is_none() {
                    self.report.title = Some(text);
                } else if self.report.description.is_none() {
                    self.report.description = Some(text);
                }
            }
        }
    }

    fn on_delimited(&mut self, line: &str, prev: &str, next: &str) {
        if matches!(self.state, State::AwaitingTitle | State::AwaitingDescription) {
            self.state = State::AwaitingHeader;
        }

        if let Some(forced) = self.forced_shape() {
            let parsed = match forced {
                Forced::KeyValue => key_value_line(line),
                Forced::Schema(keys) => zip_line(keys, split_fields(line)),
            };
            self.push_line(parsed);
            self.state = State::ReadingRows;
            return;
        }

        match self.mode {
            ParseMode::KeyValue => {
                self.push_line(key_value_line(line));
                self.state = State::ReadingRows;
            }
            ParseMode::Table | ParseMode::Dynamic => self.on_table_line(line, prev, next),
        }
    }

    fn on_table_line(&mut self, line: &str, prev: &str, next: &str) {
        let fields = split_fields(line);

        if self.header.is_none() {
            if self.mode == ParseMode::Dynamic && fields.len() == 2 && !is_delimited(next) {
                self.push_line(key_value_line(line));
                return;
            }
            let keys = fields.iter().map(|f| normalize_key(f)).collect();
            self.header = Some(Header { fields, keys });
            self.state = State::ReadingRows;
            return;
        }
        let Some(header) = &self.header else {
            return;
        };

        if fields == header.fields {
            return;
        }

        // Decorative separator between banner and table
        if prev.is_empty() && is_delimited(next) {
            return;
        }

        let parsed = zip_line(&header.keys, fields);
        self.push_line(parsed);
    }

    fn forced_shape(&self) -> Option<Forced> {
        TRIGGERS.iter().find_map(|trigger| {
            let banner = match trigger.banner {
                Banner::Title => self.report.title.as_deref(),
                Banner::Description => self.report.description.as_deref(),
            };
            (banner == Some(trigger.text)).then_some(trigger.forced)
        })
    }

    fn push_line(&mut self, line: Line) {
        if !line.is_empty() {
            self.report.lines.push(line);
        }
    }

    fn close_report(&mut self) {
        let report = std::mem::take(&mut self.report);
        if !report.lines.is_empty() {
            self.output.push(report);
        }
        self.header = None;
        self.state = State::AwaitingTitle;
    }

    fn finish(mut self) -> Output {
        self.close_report();
        self.output
    }
}
