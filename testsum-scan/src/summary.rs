// Copyright (c) The testsum Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-of-run summary rendering.

use crate::errors::ConfigError;
use crate::execution::{Execution, Package, TestCase};
use owo_colors::{OwoColorize, Stream};
use std::io::{self, Write};
use std::str::FromStr;

/// A section of the end-of-run summary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SummarySection {
    /// The list of skipped tests.
    Skipped,
    /// The list of failed tests.
    Failed,
    /// The list of run errors.
    Errors,
    /// Captured output underneath each failed test.
    Output,
}

impl SummarySection {
    /// The accepted string forms, as used on the command line.
    pub fn variants() -> &'static [&'static str] {
        &["skipped", "failed", "errors", "output"]
    }
}

impl FromStr for SummarySection {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, ConfigError> {
        match input {
            "skipped" => Ok(SummarySection::Skipped),
            "failed" => Ok(SummarySection::Failed),
            "errors" => Ok(SummarySection::Errors),
            "output" => Ok(SummarySection::Output),
            _ => Err(ConfigError::UnknownSummarySection {
                input: input.to_owned(),
                known: SummarySection::variants().join(", "),
            }),
        }
    }
}

/// The set of summary sections to render. Defaults to all of them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SummarySections {
    skipped: bool,
    failed: bool,
    errors: bool,
    output: bool,
}

impl Default for SummarySections {
    fn default() -> Self {
        Self::all()
    }
}

impl SummarySections {
    /// Every section enabled.
    pub fn all() -> Self {
        Self {
            skipped: true,
            failed: true,
            errors: true,
            output: true,
        }
    }

    /// Disables a section.
    pub fn omit(&mut self, section: SummarySection) -> &mut Self {
        match section {
            SummarySection::Skipped => self.skipped = false,
            SummarySection::Failed => self.failed = false,
            SummarySection::Errors => self.errors = false,
            SummarySection::Output => self.output = false,
        }
        self
    }

    /// Returns true if a section is enabled.
    pub fn includes(&self, section: SummarySection) -> bool {
        match section {
            SummarySection::Skipped => self.skipped,
            SummarySection::Failed => self.failed,
            SummarySection::Errors => self.errors,
            SummarySection::Output => self.output,
        }
    }

    /// Parses a comma-separated list of sections to omit, e.g.
    /// `skipped,output`. Unknown names fail here, never at render time.
    pub fn parse_omit_list(input: &str) -> Result<Self, ConfigError> {
        let mut sections = Self::all();
        for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            sections.omit(part.parse()?);
        }
        Ok(sections)
    }
}

impl FromStr for SummarySections {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, ConfigError> {
        Self::parse_omit_list(input)
    }
}

/// Prints the end-of-run summary.
///
/// Sections appear in a fixed order: the `DONE` counts line, failed tests
/// (sorted by package then test name, with output indented underneath),
/// skipped tests, then run errors verbatim. The ordering is deterministic
/// so callers can make exact string assertions.
pub fn print_summary(
    writer: &mut impl Write,
    execution: &Execution,
    sections: SummarySections,
) -> io::Result<()> {
    let failed = execution.failed();
    let skipped = execution.skipped();
    let errors: Vec<_> = execution.errors().collect();

    write!(writer, "DONE {} tests", execution.total())?;
    if !skipped.is_empty() {
        write!(writer, ", {} skipped", skipped.len())?;
    }
    if !failed.is_empty() {
        write!(writer, ", {} failures", failed.len())?;
    }
    if !errors.is_empty() {
        write!(writer, ", {} errors", errors.len())?;
    }
    writeln!(writer, " in {:.2}s", execution.elapsed().as_secs_f64())?;

    if sections.includes(SummarySection::Failed) && !failed.is_empty() {
        let mut failed = failed;
        failed.sort_by(|a, b| {
            (a.0.name(), a.1.name()).cmp(&(b.0.name(), b.1.name()))
        });
        writeln!(writer)?;
        for (package, case) in failed {
            write_failed_test(writer, package, case, sections)?;
        }
    }

    if sections.includes(SummarySection::Skipped) && !skipped.is_empty() {
        writeln!(writer)?;
        for (package, case) in skipped {
            writeln!(
                writer,
                "{} {} {}",
                "=== SKIP:".if_supports_color(Stream::Stdout, |t| t.yellow()),
                package.name(),
                case.name(),
            )?;
        }
    }

    if sections.includes(SummarySection::Errors) && !errors.is_empty() {
        writeln!(writer)?;
        for error in errors {
            writeln!(writer, "{}", error.message)?;
        }
    }

    Ok(())
}

fn write_failed_test(
    writer: &mut impl Write,
    package: &Package,
    case: &TestCase,
    sections: SummarySections,
) -> io::Result<()> {
    let elapsed = case.elapsed().unwrap_or_default().as_secs_f64();
    writeln!(
        writer,
        "{} {} {} ({elapsed:.2}s)",
        "=== FAIL:".if_supports_color(Stream::Stdout, |t| t.red()),
        package.name(),
        case.name(),
    )?;
    if sections.includes(SummarySection::Output) {
        for line in case.combined_output().lines() {
            writeln!(writer, "    {line}")?;
        }
    }
    Ok(())
}
