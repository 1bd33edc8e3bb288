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

use std::time::Duration;
use thiserror::Error;

/// Command execution errors
#[derive(Debug, Error)]
pub enum CommandError {
    /// Program could not be resolved on the search path
    #[error("Command not found: {0}")]
    NotFound(String),
    /// Program was interrupted/killed after running past its deadline
    #[error("Command '{program}' timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
    /// Program exited with a status other than success or the idle code
    #[error("Command '{program}' failed with exit code {code:?}: {stderr}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    /// Spawning the program or reading its output failed
    #[error("I/O error running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// Invalid command arguments
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

impl CommandError {
    /// Whether the error came from the deadline firing
    pub fn is_timeout(&self) -> bool {
        matches!(self, CommandError::TimedOut { .. })
    }
}

/// Errors produced by a single collector pass
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The underlying omreport invocation failed
    #[error(transparent)]
    Command(#[from] CommandError),
    /// A record carried a value that is not a number
    #[error("Invalid value '{value}' for metric {metric}")]
    InvalidValue { metric: String, value: String },
}

/// Configuration errors, fatal at start-up
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A requested collector is not in the registry
    #[error("collector \"{0}\" not available")]
    UnknownCollector(String),
    /// A configuration field holds an unusable value
    #[error("Invalid configuration for {field}: {value}")]
    InvalidValue { field: String, value: String },
    /// Reading the configuration file failed
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file is not valid TOML
    #[error("Failed to parse configuration file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors from the shared value primitives
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("extract: suffix not found")]
    SuffixNotFound,
    #[error("clean result is empty")]
    EmptyIdentifier,
}
