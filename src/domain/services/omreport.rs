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

use crate::domain::parsers::parse;
use crate::domain::{CommandError, Output, ParseMode};
use crate::ports::{CommandExecutor, SystemCommand};
use std::sync::Arc;

/// Default omreport location of an OMSA install
#[cfg(not(windows))]
pub const DEFAULT_OMREPORT_EXECUTABLE: &str = "/opt/dell/srvadmin/bin/omreport";
#[cfg(windows)]
pub const DEFAULT_OMREPORT_EXECUTABLE: &str = r"C:\Program Files\Dell\SysMgt\oma\bin\omreport.exe";

/// Output format flags appended to every invocation
const SSV_FORMAT: [&str; 2] = ["-fmt", "ssv"];

/// Runs omreport and parses what it prints
pub struct OmReport {
    executor: Arc<dyn CommandExecutor>,
    executable: String,
}

impl OmReport {
    /// Create a reader for the given omreport executable
    ///
    /// # Arguments
    /// * `executor` - Process runner
    /// * `executable` - Path to omreport; empty selects the default location
    pub fn new(executor: Arc<dyn CommandExecutor>, executable: &str) -> Self {
        let executable = if executable.is_empty() {
            DEFAULT_OMREPORT_EXECUTABLE
        } else {
            executable
        };
        Self {
            executor,
            executable: executable.to_string(),
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Whether the configured executable can be found
    pub async fn is_available(&self) -> bool {
        self.executor
            .is_command_available(&self.executable)
            .await
            .unwrap_or(false)
    }

    /// Run `omreport <args> -fmt ssv` and parse its output
    ///
    /// # Arguments
    /// * `args` - Subcommand arguments, e.g. `["chassis", "fans"]`
    /// * `mode` - Parse mode for delimited lines
    pub async fn read<S: AsRef<str>>(
        &self,
        args: &[S],
        mode: ParseMode,
    ) -> Result<Output, CommandError> {
        let mut full_args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        full_args.extend(SSV_FORMAT);

        let command = SystemCommand::new(&self.executable).args(&full_args);
        let output = self.executor.execute(&command).await?;
        Ok(parse(&output.stdout, mode))
    }
}
