// Copyright (c) The testsum Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [testsum](https://crates.io/crates/testsum): turn
//! the line-delimited JSON event stream of a test tool into an in-memory
//! execution model, render progress and an end-of-run summary, and emit
//! JUnit XML reports for CI.
//!
//! # Overview
//!
//! The entry point is [`scan`]: feed it the child process's stdout and
//! stderr along with an [`EventHandler`], and it returns an [`Execution`],
//! the aggregate of packages, tests, outputs and timings for the run.
//! [`print_summary`] and [`write_report`] are pure functions over the
//! returned execution, so they work equally well on a partial execution
//! recovered from a failed or canceled scan.
//!
//! ```no_run
//! use testsum_scan::{
//!     scan, CancelSignal, Format, FormatHandler, JunitConfig, SummarySections,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // In the real tool these are the child process's piped stdout/stderr.
//! let stdout: &[u8] = br#"{"action":"pass","package":"p","elapsed":0.01}"#;
//! let stderr: &[u8] = b"";
//! let mut handler = FormatHandler::new(Format::PkgName, std::io::stdout());
//! let execution = scan(stdout, stderr, &mut handler, CancelSignal::noop()).await?;
//! testsum_scan::print_summary(
//!     &mut std::io::stdout(),
//!     &execution,
//!     SummarySections::all(),
//! )?;
//! testsum_scan::write_report(&execution, &JunitConfig::default(), std::io::stdout())?;
//! # Ok(())
//! # }
//! ```

mod errors;
mod events;
mod execution;
mod format;
mod junit;
mod scanner;
mod summary;

pub use errors::*;
pub use events::*;
pub use execution::*;
pub use format::*;
pub use junit::*;
pub use scanner::*;
pub use summary::*;
