// Copyright (c) The testsum Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use owo_colors::{OwoColorize, Stream};
use std::error::Error;
use std::io;
use testsum_scan::{ConfigError, EmitError, ScanErrorKind};
use thiserror::Error;

/// Exit codes used by testsum.
///
/// When the test command itself fails, its own exit code is propagated
/// instead.
pub enum ExitCode {}

impl ExitCode {
    /// Everything ran and every test passed.
    pub const SUCCESS: i32 = 0;
    /// Invalid command-line configuration.
    pub const USAGE_ERROR: i32 = 2;
    /// An internal error while scanning or reporting.
    pub const INTERNAL_ERROR: i32 = 3;
}

/// An error that ends the run, mapped to a process exit code.
#[derive(Debug, Error)]
pub enum ExpectedError {
    /// Invalid configuration on the command line.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The test command could not be determined.
    #[error("no test command to run; pass one after `--` or drop --raw-command")]
    MissingCommand,

    /// The test command could not be started.
    #[error("failed to start test command `{command}`")]
    Start {
        /// The command line that failed to launch.
        command: String,
        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// A file argument could not be created.
    #[error("failed to create {path}")]
    FileCreate {
        /// The path that could not be created.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The scan stopped on an internal error.
    #[error("error scanning test output")]
    Scan {
        /// The underlying scan failure.
        #[source]
        kind: ScanErrorKind,
    },

    /// The JUnit report could not be written.
    #[error("failed to write JUnit report to {path}")]
    Junit {
        /// The report destination.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        err: EmitError,
    },

    /// The summary could not be written to stdout.
    #[error("failed to write summary")]
    Summary {
        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The JSON event file could not be written.
    #[error("failed to write JSON event file")]
    JsonFile {
        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// Waiting for the test command failed.
    #[error("failed to wait for the test command")]
    Wait {
        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The async runtime could not be built.
    #[error("failed to build the async runtime")]
    Runtime {
        /// The underlying error.
        #[source]
        err: io::Error,
    },
}

impl ExpectedError {
    /// The process exit code for this error.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            ExpectedError::Config(_) | ExpectedError::MissingCommand => ExitCode::USAGE_ERROR,
            _ => ExitCode::INTERNAL_ERROR,
        }
    }

    /// Prints the error and its causes to stderr.
    pub fn display_to_stderr(&self) {
        eprintln!(
            "{}: {}",
            "error".if_supports_color(Stream::Stderr, |t| t.red()),
            self,
        );
        let mut source = self.source();
        while let Some(err) = source {
            eprintln!(
                "  {}: {}",
                "caused by".if_supports_color(Stream::Stderr, |t| t.red()),
                err,
            );
            source = err.source();
        }
    }
}
