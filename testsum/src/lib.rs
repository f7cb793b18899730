// Copyright (c) The testsum Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! testsum is a friendlier front-end for test tools that emit JSON event
//! streams, such as `go test -json`. It renders readable progress while the
//! tests run, prints a grouped summary at the end, and can write a JUnit
//! XML report for CI ingestion.
//!
//! This crate is the thin CLI layer; the scanning and reporting machinery
//! lives in [`testsum-scan`](testsum_scan).

mod dispatch;
mod errors;
mod handler;

pub use dispatch::TestsumApp;
pub use errors::{ExitCode, ExpectedError};

use clap::Parser;

/// Parses the command line and runs testsum, returning the process exit
/// code.
pub fn main_impl() -> color_eyre::Result<i32> {
    let app = TestsumApp::parse();
    match app.exec() {
        Ok(code) => Ok(code),
        Err(error) => {
            error.display_to_stderr();
            Ok(error.process_exit_code())
        }
    }
}
