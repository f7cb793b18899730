// Copyright (c) The testsum Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Progress output formats.
//!
//! Each format is a tagged variant of [`Format`]; [`FormatHandler`] holds
//! the selected variant and dispatches on it per event. There is no format
//! trait hierarchy on purpose.

use crate::errors::ConfigError;
use crate::events::{Action, TestEvent};
use crate::execution::Execution;
use crate::scanner::EventHandler;
use owo_colors::{OwoColorize, Stream};
use std::io::{self, Write};
use std::str::FromStr;

/// Selects how per-event progress is rendered.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Format {
    /// One character per test.
    Dots,
    /// One line per package.
    #[default]
    PkgName,
    /// One line per test and package.
    TestName,
    /// The underlying tool's own non-verbose output.
    StandardQuiet,
    /// The underlying tool's own verbose output.
    StandardVerbose,
}

impl Format {
    /// The accepted string forms, as used on the command line.
    pub fn variants() -> &'static [&'static str] {
        &[
            "dots",
            "pkgname",
            "testname",
            "standard-quiet",
            "standard-verbose",
        ]
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, ConfigError> {
        match input {
            "dots" => Ok(Format::Dots),
            "pkgname" => Ok(Format::PkgName),
            "testname" => Ok(Format::TestName),
            "standard-quiet" => Ok(Format::StandardQuiet),
            "standard-verbose" => Ok(Format::StandardVerbose),
            _ => Err(ConfigError::UnknownFormat {
                input: input.to_owned(),
                known: Format::variants().join(", "),
            }),
        }
    }
}

/// Renders progress for each event in the selected [`Format`].
pub struct FormatHandler<W> {
    format: Format,
    writer: W,
}

impl<W: Write> FormatHandler<W> {
    /// Creates a handler writing to `writer`.
    pub fn new(format: Format, writer: W) -> Self {
        Self { format, writer }
    }

    fn dots(&mut self, event: &TestEvent) -> io::Result<()> {
        if event.is_package_level() {
            if event.action.is_terminal() {
                writeln!(self.writer)?;
            }
            return Ok(());
        }
        match event.action {
            Action::Pass => write!(self.writer, "·"),
            Action::Fail => write!(
                self.writer,
                "{}",
                "✖".if_supports_color(Stream::Stdout, |t| t.red())
            ),
            Action::Skip => write!(
                self.writer,
                "{}",
                "↷".if_supports_color(Stream::Stdout, |t| t.yellow())
            ),
            _ => Ok(()),
        }
    }

    fn pkg_name(&mut self, event: &TestEvent) -> io::Result<()> {
        if !event.is_package_level() || !event.action.is_terminal() {
            return Ok(());
        }
        let elapsed = event.elapsed.unwrap_or_default();
        match event.action {
            Action::Pass => writeln!(
                self.writer,
                "{} {} ({elapsed:.2}s)",
                "✓".if_supports_color(Stream::Stdout, |t| t.green()),
                event.package,
            ),
            Action::Fail => writeln!(
                self.writer,
                "{} {} ({elapsed:.2}s)",
                "✖".if_supports_color(Stream::Stdout, |t| t.red()),
                event.package,
            ),
            Action::Skip => writeln!(
                self.writer,
                "{} {} [no tests]",
                "∅".if_supports_color(Stream::Stdout, |t| t.yellow()),
                event.package,
            ),
            _ => Ok(()),
        }
    }

    fn test_name(&mut self, event: &TestEvent) -> io::Result<()> {
        if !event.action.is_terminal() {
            return Ok(());
        }
        let elapsed = event.elapsed.unwrap_or_default();
        let label = match event.action {
            Action::Pass => "PASS"
                .if_supports_color(Stream::Stdout, |t| t.green())
                .to_string(),
            Action::Fail => "FAIL"
                .if_supports_color(Stream::Stdout, |t| t.red())
                .to_string(),
            Action::Skip => "SKIP"
                .if_supports_color(Stream::Stdout, |t| t.yellow())
                .to_string(),
            _ => return Ok(()),
        };
        if event.is_package_level() {
            writeln!(self.writer, "{label} {} ({elapsed:.2}s)", event.package)
        } else {
            writeln!(
                self.writer,
                "{label} {} {} ({elapsed:.2}s)",
                event.package, event.test,
            )
        }
    }

    fn standard(&mut self, event: &TestEvent, verbose: bool) -> io::Result<()> {
        if event.action != Action::Output {
            return Ok(());
        }
        let Some(output) = &event.output else {
            return Ok(());
        };
        if verbose || event.is_package_level() {
            write!(self.writer, "{output}")?;
        }
        Ok(())
    }
}

impl<W: Write> EventHandler for FormatHandler<W> {
    fn event(&mut self, event: &TestEvent, _execution: &Execution) -> io::Result<()> {
        match self.format {
            Format::Dots => self.dots(event)?,
            Format::PkgName => self.pkg_name(event)?,
            Format::TestName => self.test_name(event)?,
            Format::StandardQuiet => self.standard(event, false)?,
            Format::StandardVerbose => self.standard(event, true)?,
        }
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::Execution;
    use pretty_assertions::assert_eq;

    fn render(format: Format, events: &[TestEvent]) -> String {
        owo_colors::set_override(false);
        let mut handler = FormatHandler::new(format, Vec::new());
        let mut execution = Execution::new();
        for event in events {
            execution.add(event);
            handler.event(event, &execution).expect("write succeeds");
        }
        String::from_utf8(handler.writer).expect("output is utf-8")
    }

    fn stream() -> Vec<TestEvent> {
        let json = [
            r#"{"action":"run","package":"p","test":"TestA"}"#,
            r#"{"action":"output","package":"p","test":"TestA","output":"=== RUN TestA\n"}"#,
            r#"{"action":"pass","package":"p","test":"TestA","elapsed":0.01}"#,
            r#"{"action":"run","package":"p","test":"TestB"}"#,
            r#"{"action":"fail","package":"p","test":"TestB","elapsed":0.02}"#,
            r#"{"action":"output","package":"p","output":"FAIL\n"}"#,
            r#"{"action":"fail","package":"p","elapsed":0.05}"#,
        ];
        json.iter()
            .map(|line| serde_json::from_str(line).expect("event decodes"))
            .collect()
    }

    #[test]
    fn unknown_format_is_a_config_error() {
        let err = "sparkles".parse::<Format>().expect_err("unknown format");
        assert!(matches!(err, ConfigError::UnknownFormat { .. }));
    }

    #[test]
    fn dots_prints_one_character_per_test() {
        assert_eq!(render(Format::Dots, &stream()), "·✖\n");
    }

    #[test]
    fn pkgname_prints_one_line_per_package() {
        assert_eq!(render(Format::PkgName, &stream()), "✖ p (0.05s)\n");
    }

    #[test]
    fn testname_prints_tests_and_packages() {
        assert_eq!(
            render(Format::TestName, &stream()),
            "PASS p TestA (0.01s)\nFAIL p TestB (0.02s)\nFAIL p (0.05s)\n"
        );
    }

    #[test]
    fn standard_verbose_passes_output_through() {
        assert_eq!(
            render(Format::StandardVerbose, &stream()),
            "=== RUN TestA\nFAIL\n"
        );
    }

    #[test]
    fn standard_quiet_prints_package_output_only() {
        assert_eq!(render(Format::StandardQuiet, &stream()), "FAIL\n");
    }
}
