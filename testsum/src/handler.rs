// Copyright (c) The testsum Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The event handler wired into the scanner by the CLI.

use std::fs::File;
use std::io::{self, BufWriter, Stderr, Stdout, Write};
use testsum_scan::{EventHandler, Execution, Format, FormatHandler, TestEvent};

/// Renders progress in the selected format, mirrors decoded events to the
/// JSON file when one was requested, and echoes the child's stderr so
/// build failures are visible as they happen.
pub(crate) struct RunHandler {
    format: FormatHandler<Stdout>,
    json_file: Option<BufWriter<File>>,
    stderr: Stderr,
}

impl RunHandler {
    pub(crate) fn new(format: Format, json_file: Option<File>) -> Self {
        Self {
            format: FormatHandler::new(format, io::stdout()),
            json_file: json_file.map(BufWriter::new),
            stderr: io::stderr(),
        }
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = &mut self.json_file {
            file.flush()?;
        }
        Ok(())
    }
}

impl EventHandler for RunHandler {
    fn event(&mut self, event: &TestEvent, execution: &Execution) -> io::Result<()> {
        if let Some(file) = &mut self.json_file {
            serde_json::to_writer(&mut *file, event)?;
            file.write_all(b"\n")?;
        }
        self.format.event(event, execution)
    }

    fn stderr_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.stderr, "{line}")
    }
}
