// Copyright (c) The testsum Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scanning of test process output.
//!
//! [`scan`] drives the line decoder over the child process's stdout while
//! multiplexing its stderr, folding everything into a single [`Execution`].
//! One task owns the model and is the only writer; handlers are invoked
//! serially from that task and never observe mid-fold state.

use crate::errors::{ScanError, ScanErrorKind};
use crate::events::{parse_line, ParsedLine, TestEvent};
use crate::execution::{Execution, RunErrorKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::oneshot;
use tracing::debug;

/// Handler invoked for every decoded event.
///
/// Formatters plug in here. Handlers are called serially, in stdout arrival
/// order, after the event has been folded; they do not need to be
/// reentrant. A handler error is fatal to the scan.
pub trait EventHandler {
    /// Called once per decoded event, after `event` has been folded into
    /// `execution`.
    fn event(&mut self, event: &TestEvent, execution: &Execution) -> io::Result<()>;

    /// Called for each line received on the child's stderr, before it is
    /// recorded as a run error. The default does nothing.
    fn stderr_line(&mut self, _line: &str) -> io::Result<()> {
        Ok(())
    }
}

/// The sending half of a scan cancellation request.
#[derive(Debug)]
pub struct CancelHandle {
    tx: oneshot::Sender<()>,
}

impl CancelHandle {
    /// Requests that the scan stop. The scanner returns the partial
    /// execution with a canceled error.
    pub fn cancel(self) {
        let _ = self.tx.send(());
    }
}

/// The receiving half of a scan cancellation request.
#[derive(Debug)]
pub struct CancelSignal {
    rx: Option<oneshot::Receiver<()>>,
}

impl CancelSignal {
    /// Creates a connected handle/signal pair.
    pub fn new() -> (CancelHandle, Self) {
        let (tx, rx) = oneshot::channel();
        (CancelHandle { tx }, Self { rx: Some(rx) })
    }

    /// A signal that never fires.
    pub fn noop() -> Self {
        Self { rx: None }
    }

    async fn fired(&mut self) {
        match self.rx.take() {
            Some(rx) => {
                // A dropped handle is not a cancellation.
                if rx.await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending().await,
        }
    }
}

static COMPILE_DIAGNOSTIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\S+:\d+(?::\d+)?: ").expect("diagnostic regex is valid"));

/// Returns true if a stderr line looks like a compiler diagnostic
/// (`path:line:col: message`).
pub fn is_compile_diagnostic(line: &str) -> bool {
    COMPILE_DIAGNOSTIC.is_match(line)
}

/// Reads `stdout` and `stderr` until both reach end of stream, folding
/// decoded events into an [`Execution`] and notifying `handler` for each.
///
/// Stdout events are folded in arrival order. Stderr lines are recorded as
/// run errors, ordered with respect to each other but not against stdout.
/// Stray stdout lines that are not JSON objects are recorded as run errors
/// as well.
///
/// On failure the partial execution travels inside the returned
/// [`ScanError`], so a summary and JUnit report can still be produced. The
/// child process's exit status is the caller's concern, not the scanner's.
pub async fn scan<O, E, H>(
    stdout: O,
    stderr: E,
    handler: &mut H,
    mut cancel: CancelSignal,
) -> Result<Execution, ScanError>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
    H: EventHandler,
{
    let mut execution = Execution::new();
    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();
    let mut out_done = false;
    let mut err_done = false;
    let mut out_line_number: u64 = 0;
    let mut canceled = std::pin::pin!(cancel.fired());

    while !(out_done && err_done) {
        tokio::select! {
            // Check cancellation before reading further so a handler that
            // fires the handle mid-run stops the scan at a precise event
            // boundary.
            biased;

            _ = &mut canceled => {
                debug!("cancellation received, stopping scan");
                return Err(ScanError::new(execution, ScanErrorKind::Canceled));
            }

            line = out_lines.next_line(), if !out_done => match line {
                Ok(Some(line)) => {
                    out_line_number += 1;
                    match parse_line(&line) {
                        Ok(ParsedLine::Event(event)) => {
                            execution.add(&event);
                            if let Err(error) = handler.event(&event, &execution) {
                                return Err(ScanError::new(
                                    execution,
                                    ScanErrorKind::Handler(error),
                                ));
                            }
                        }
                        Ok(ParsedLine::Raw(raw)) => {
                            debug!(line = raw.as_str(), "unstructured line on stdout");
                            execution.add_run_error(raw, RunErrorKind::Stray);
                        }
                        Err(error) => {
                            return Err(ScanError::new(
                                execution,
                                ScanErrorKind::MalformedStream {
                                    line: out_line_number,
                                    error,
                                },
                            ));
                        }
                    }
                }
                Ok(None) => out_done = true,
                Err(error) => {
                    return Err(ScanError::new(execution, ScanErrorKind::Io(error)));
                }
            },

            line = err_lines.next_line(), if !err_done => match line {
                Ok(Some(line)) => {
                    if let Err(error) = handler.stderr_line(&line) {
                        return Err(ScanError::new(execution, ScanErrorKind::Handler(error)));
                    }
                    let kind = if is_compile_diagnostic(&line) {
                        RunErrorKind::Compile
                    } else {
                        RunErrorKind::Stray
                    };
                    execution.add_run_error(line, kind);
                }
                Ok(None) => err_done = true,
                Err(error) => {
                    return Err(ScanError::new(execution, ScanErrorKind::Io(error)));
                }
            },
        }
    }

    Ok(execution)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_diagnostics_are_recognized() {
        assert!(is_compile_diagnostic("./foo.go:3:1: syntax error"));
        assert!(is_compile_diagnostic("pkg/bar.go:12: undefined: Frob"));
        assert!(!is_compile_diagnostic("go: downloading example.com v1.0.0"));
        assert!(!is_compile_diagnostic("FAIL\texample.com/pkg [build failed]"));
    }
}
