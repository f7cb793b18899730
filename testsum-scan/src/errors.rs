// Copyright (c) The testsum Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by testsum-scan.

use crate::execution::Execution;
use std::io;
use thiserror::Error;

/// An error that stopped a scan.
///
/// The scan never discards work: `execution` holds everything folded up to
/// the point of failure, so a summary and a JUnit report can still be
/// produced from it.
#[derive(Debug, Error)]
#[error("error scanning test output")]
pub struct ScanError {
    /// The state of the execution when the scan stopped.
    pub execution: Box<Execution>,

    /// What went wrong.
    #[source]
    pub kind: ScanErrorKind,
}

impl ScanError {
    pub(crate) fn new(execution: Execution, kind: ScanErrorKind) -> Self {
        Self {
            execution: Box::new(execution),
            kind,
        }
    }

    /// Returns true if the scan was stopped by a cancellation signal rather
    /// than a failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self.kind, ScanErrorKind::Canceled)
    }
}

/// The ways a scan can stop early.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScanErrorKind {
    /// A line was a syntactically valid JSON object but did not match the
    /// event schema.
    #[error("malformed test event on stdout line {line}")]
    MalformedStream {
        /// 1-based stdout line number of the offending line.
        line: u64,
        /// The underlying decode error.
        #[source]
        error: serde_json::Error,
    },

    /// Reading one of the two streams failed.
    #[error("failed to read test output")]
    Io(#[from] io::Error),

    /// The event handler reported an error.
    #[error("event handler failed")]
    Handler(#[source] io::Error),

    /// The cancellation signal fired.
    #[error("scan canceled")]
    Canceled,
}

/// An error in user-supplied configuration, reported at construction time.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    /// An unrecognized progress format.
    #[error("unrecognized format: {input}\n(known formats: {known})")]
    UnknownFormat {
        /// The value that failed to parse.
        input: String,
        /// The accepted values, comma separated.
        known: String,
    },

    /// An unrecognized summary section name.
    #[error("unrecognized summary section: {input}\n(known sections: {known})")]
    UnknownSummarySection {
        /// The value that failed to parse.
        input: String,
        /// The accepted values, comma separated.
        known: String,
    },

    /// An unrecognized JUnit name style.
    #[error("unrecognized name style: {input}\n(known styles: {known})")]
    UnknownNameStyle {
        /// The value that failed to parse.
        input: String,
        /// The accepted values, comma separated.
        known: String,
    },
}

/// An error that occurs while writing a JUnit report.
#[derive(Debug, Error)]
#[error("error writing JUnit report")]
pub struct EmitError {
    #[from]
    inner: quick_xml::Error,
}
