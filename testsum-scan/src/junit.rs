// Copyright (c) The testsum Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JUnit XML report generation.
//!
//! Serializes an [`Execution`] into a single `testsuites` document of the
//! dialect understood by common CI ingestion tools. Reports are a pure
//! function of the execution: scanning the same captured stream twice
//! produces byte-identical documents.

use crate::errors::{ConfigError, EmitError};
use crate::execution::{Execution, Outcome, Package, TestCase};
use chrono::{DateTime, FixedOffset};
use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};
use std::{io, str::FromStr, time::Duration};

static TESTSUITES_TAG: &str = "testsuites";
static TESTSUITE_TAG: &str = "testsuite";
static TESTCASE_TAG: &str = "testcase";
static FAILURE_TAG: &str = "failure";
static ERROR_TAG: &str = "error";
static SKIPPED_TAG: &str = "skipped";

/// The testsuite used for run errors that no package claimed.
static UNATTRIBUTED_SUITE: &str = "(no package)";

/// How package names are rendered in the report.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum NameStyle {
    /// The last path segment of the package name.
    #[default]
    Short,
    /// The package name with the run's common prefix removed.
    Relative,
    /// The fully-qualified package name.
    Full,
}

impl NameStyle {
    /// The accepted string forms, as used on the command line.
    pub fn variants() -> &'static [&'static str] {
        &["short", "relative", "full"]
    }
}

impl FromStr for NameStyle {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, ConfigError> {
        match input {
            "short" => Ok(NameStyle::Short),
            "relative" => Ok(NameStyle::Relative),
            "full" => Ok(NameStyle::Full),
            _ => Err(ConfigError::UnknownNameStyle {
                input: input.to_owned(),
                known: NameStyle::variants().join(", "),
            }),
        }
    }
}

/// Naming policy for the generated report.
#[derive(Clone, Copy, Debug, Default)]
pub struct JunitConfig {
    /// Style of each `testsuite` name attribute.
    pub testsuite_name: NameStyle,
    /// Style of each `testcase` classname attribute.
    pub testcase_classname: NameStyle,
}

impl JunitConfig {
    /// Parses the two naming-policy values. Unknown values fail here, never
    /// during emission.
    pub fn new(testsuite_name: &str, testcase_classname: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            testsuite_name: testsuite_name.parse()?,
            testcase_classname: testcase_classname.parse()?,
        })
    }
}

/// Writes the JUnit document for `execution` to `writer`.
pub fn write_report(
    execution: &Execution,
    config: &JunitConfig,
    writer: impl io::Write,
) -> Result<(), EmitError> {
    let suites = build_suites(execution, config);
    let mut writer = Writer::new_with_indent(writer, b' ', 4);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    serialize_suites(&suites, &mut writer)?;
    // Trailing newline.
    writer.write_indent()?;
    Ok(())
}

struct Suite {
    name: String,
    timestamp: Option<DateTime<FixedOffset>>,
    time: Option<Duration>,
    cases: Vec<Case>,
    error_texts: Vec<String>,
}

impl Suite {
    fn failures(&self) -> usize {
        self.cases
            .iter()
            .filter(|case| matches!(case.status, CaseStatus::Failed { .. }))
            .count()
    }

    fn skipped(&self) -> usize {
        self.cases
            .iter()
            .filter(|case| matches!(case.status, CaseStatus::Skipped))
            .count()
    }
}

struct Case {
    name: String,
    classname: String,
    time: Option<Duration>,
    status: CaseStatus,
}

enum CaseStatus {
    Passed,
    Failed { output: String },
    Skipped,
}

fn build_suites(execution: &Execution, config: &JunitConfig) -> Vec<Suite> {
    let prefix = common_package_prefix(execution);
    let mut suites = Vec::new();

    // Stray run errors come first so they are visible even when no package
    // produced events at all.
    if !execution.unattributed_errors().is_empty() {
        suites.push(Suite {
            name: UNATTRIBUTED_SUITE.to_owned(),
            timestamp: None,
            time: None,
            cases: Vec::new(),
            error_texts: execution
                .unattributed_errors()
                .iter()
                .map(|error| error.message.clone())
                .collect(),
        });
    }

    for package in execution.packages() {
        let classname = styled_name(package.name(), config.testcase_classname, &prefix);
        let cases: Vec<_> = package
            .tests()
            .filter(|case| should_emit_case(package, case))
            .map(|case| Case {
                name: case.name().to_owned(),
                classname: classname.to_owned(),
                time: case.elapsed(),
                status: case_status(case),
            })
            .collect();
        let error_texts: Vec<_> = package
            .run_errors()
            .iter()
            .map(|error| error.message.clone())
            .collect();
        if cases.is_empty() && error_texts.is_empty() {
            // Nothing executed and nothing went wrong; not part of the
            // report.
            continue;
        }
        suites.push(Suite {
            name: styled_name(package.name(), config.testsuite_name, &prefix).to_owned(),
            timestamp: package.started_at(),
            time: package.elapsed(),
            cases,
            error_texts,
        });
    }

    suites
}

/// Leaf tests always get a testcase. A parent test is emitted only when
/// its own terminal action is `fail`; a parent that merely groups subtests
/// would double-count them.
fn should_emit_case(package: &Package, case: &TestCase) -> bool {
    package.is_leaf(case) || case.outcome() == Some(Outcome::Fail)
}

fn case_status(case: &TestCase) -> CaseStatus {
    match case.outcome() {
        Some(Outcome::Pass) => CaseStatus::Passed,
        Some(Outcome::Skip) => CaseStatus::Skipped,
        // Unterminated tests count as failures.
        Some(Outcome::Fail) | None => CaseStatus::Failed {
            output: case.combined_output(),
        },
    }
}

/// The longest common `/`-segment prefix across all package names. With a
/// single package this is everything up to its last segment, so `relative`
/// naming still shortens it.
fn common_package_prefix(execution: &Execution) -> String {
    let mut names = execution.packages().map(Package::name);
    let Some(first) = names.next() else {
        return String::new();
    };
    let mut prefix: Vec<&str> = first.split('/').collect();
    let mut multiple = false;
    for name in names {
        multiple = true;
        let common = prefix
            .iter()
            .zip(name.split('/'))
            .take_while(|(a, b)| **a == *b)
            .count();
        prefix.truncate(common);
    }
    if !multiple {
        prefix.pop();
    }
    prefix.join("/")
}

fn short_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn styled_name<'a>(name: &'a str, style: NameStyle, prefix: &str) -> &'a str {
    match style {
        NameStyle::Full => name,
        NameStyle::Short => short_name(name),
        NameStyle::Relative => {
            match name
                .strip_prefix(prefix)
                .map(|rest| rest.trim_start_matches('/'))
            {
                Some(rest) if !rest.is_empty() => rest,
                _ => short_name(name),
            }
        }
    }
}

fn serialize_suites(
    suites: &[Suite],
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let tests: usize = suites.iter().map(|s| s.cases.len()).sum();
    let failures: usize = suites.iter().map(Suite::failures).sum();
    let errors: usize = suites.iter().map(|s| s.error_texts.len()).sum();
    let skipped: usize = suites.iter().map(Suite::skipped).sum();
    let time: Duration = suites.iter().filter_map(|s| s.time).sum();

    let mut tag = BytesStart::new(TESTSUITES_TAG);
    tag.extend_attributes([
        ("tests", tests.to_string().as_str()),
        ("failures", failures.to_string().as_str()),
        ("errors", errors.to_string().as_str()),
        ("skipped", skipped.to_string().as_str()),
    ]);
    serialize_time(&mut tag, time);
    writer.write_event(Event::Start(tag))?;

    for suite in suites {
        serialize_suite(suite, writer)?;
    }

    writer.write_event(Event::End(BytesEnd::new(TESTSUITES_TAG)))?;
    writer.write_event(Event::Eof)?;
    Ok(())
}

fn serialize_suite(suite: &Suite, writer: &mut Writer<impl io::Write>) -> quick_xml::Result<()> {
    let mut tag = BytesStart::new(TESTSUITE_TAG);
    tag.extend_attributes([
        ("name", suite.name.as_str()),
        ("tests", suite.cases.len().to_string().as_str()),
        ("failures", suite.failures().to_string().as_str()),
        ("errors", suite.error_texts.len().to_string().as_str()),
        ("skipped", suite.skipped().to_string().as_str()),
    ]);
    if let Some(timestamp) = &suite.timestamp {
        serialize_timestamp(&mut tag, timestamp);
    }
    if let Some(time) = suite.time {
        serialize_time(&mut tag, time);
    }
    writer.write_event(Event::Start(tag))?;

    for text in &suite.error_texts {
        serialize_text_element(ERROR_TAG, text, writer)?;
    }
    for case in &suite.cases {
        serialize_case(case, writer)?;
    }

    writer.write_event(Event::End(BytesEnd::new(TESTSUITE_TAG)))?;
    Ok(())
}

fn serialize_case(case: &Case, writer: &mut Writer<impl io::Write>) -> quick_xml::Result<()> {
    let mut tag = BytesStart::new(TESTCASE_TAG);
    tag.extend_attributes([
        ("name", case.name.as_str()),
        ("classname", case.classname.as_str()),
    ]);
    if let Some(time) = case.time {
        serialize_time(&mut tag, time);
    }
    writer.write_event(Event::Start(tag))?;

    match &case.status {
        CaseStatus::Passed => {}
        CaseStatus::Failed { output } => {
            let mut failure = BytesStart::new(FAILURE_TAG);
            failure.push_attribute(("message", "Failed"));
            let text = sanitize(output);
            if text.is_empty() {
                writer.write_event(Event::Empty(failure))?;
            } else {
                writer.write_event(Event::Start(failure))?;
                writer.write_event(Event::Text(BytesText::new(&text)))?;
                writer.write_event(Event::End(BytesEnd::new(FAILURE_TAG)))?;
            }
        }
        CaseStatus::Skipped => {
            writer.write_event(Event::Empty(BytesStart::new(SKIPPED_TAG)))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new(TESTCASE_TAG)))?;
    Ok(())
}

fn serialize_text_element(
    tag_name: &'static str,
    text: &str,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let sanitized = sanitize(text);
    if sanitized.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new(tag_name)))?;
    } else {
        writer.write_event(Event::Start(BytesStart::new(tag_name)))?;
        writer.write_event(Event::Text(BytesText::new(&sanitized)))?;
        writer.write_event(Event::End(BytesEnd::new(tag_name)))?;
    }
    Ok(())
}

/// Strips characters outside XML 1.0's legal range.
fn sanitize(text: &str) -> String {
    text.replace(
        |c| matches!(c, '\x00'..='\x08' | '\x0b' | '\x0c' | '\x0e'..='\x1f'),
        "",
    )
}

fn serialize_timestamp(tag: &mut BytesStart<'_>, timestamp: &DateTime<FixedOffset>) {
    // RFC 3339 limited to millisecond precision, to match times.
    static RFC_3339_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";
    tag.push_attribute((
        "timestamp",
        format!("{}", timestamp.format(RFC_3339_FORMAT)).as_str(),
    ));
}

fn serialize_time(tag: &mut BytesStart<'_>, time: Duration) {
    tag.push_attribute(("time", format!("{:.3}", time.as_secs_f64()).as_str()));
}
