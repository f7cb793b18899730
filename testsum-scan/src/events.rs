// Copyright (c) The testsum Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed test events and the incremental line decoder.
//!
//! The test tool emits one JSON object per line on its stdout. Each object
//! decodes to a [`TestEvent`]. Lines that are not JSON objects at all (build
//! banners, linker noise) are not an error; they are surfaced as
//! [`ParsedLine::Raw`] so the scanner can record them as run errors.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The action described by a [`TestEvent`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// A test or package has started running.
    Run,
    /// A test has been paused.
    Pause,
    /// A paused test has continued.
    Cont,
    /// A test or package passed.
    Pass,
    /// Benchmark output.
    Bench,
    /// A test or package failed.
    Fail,
    /// A fragment of test output.
    Output,
    /// A test or package was skipped.
    Skip,
}

impl Action {
    /// Returns true if this action ends a test or package.
    pub fn is_terminal(self) -> bool {
        matches!(self, Action::Pass | Action::Fail | Action::Skip)
    }
}

/// A single event from the JSON stream: one line of the test tool's stdout.
///
/// Unknown fields are ignored for forward compatibility. Known fields with
/// mismatched types are a decode error, surfaced by [`parse_line`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TestEvent {
    /// The time at which the event was emitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<FixedOffset>>,

    /// What happened.
    pub action: Action,

    /// The fully-qualified package the event refers to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub package: String,

    /// The test the event refers to. Empty for package-level events. A `/`
    /// separator indicates a subtest.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub test: String,

    /// Seconds elapsed, present on terminal actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,

    /// The raw text fragment carried by [`Action::Output`] events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl TestEvent {
    /// Returns true if this event refers to a package rather than a test.
    pub fn is_package_level(&self) -> bool {
        self.test.is_empty()
    }

    /// The elapsed time as a [`Duration`], if present and representable.
    pub fn elapsed_duration(&self) -> Option<Duration> {
        self.elapsed
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
    }
}

/// The result of decoding one line of test tool output.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedLine {
    /// A structured test event.
    Event(TestEvent),
    /// A line that is not a JSON object.
    Raw(String),
}

/// Decodes a single line.
///
/// Returns an error only when the line is a syntactically valid JSON object
/// that does not match the event schema. Anything else that fails to parse
/// is passed through as [`ParsedLine::Raw`].
pub fn parse_line(line: &str) -> Result<ParsedLine, serde_json::Error> {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('{') {
        return Ok(ParsedLine::Raw(line.to_owned()));
    }
    let value: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(_) => return Ok(ParsedLine::Raw(line.to_owned())),
    };
    serde_json::from_value(value).map(ParsedLine::Event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_a_full_event() {
        let line = r#"{"time":"2022-02-22T10:00:00Z","action":"pass","package":"example.com/pkg","test":"TestFoo","elapsed":0.25}"#;
        let event = match parse_line(line).expect("line decodes") {
            ParsedLine::Event(event) => event,
            other => panic!("expected an event, got {other:?}"),
        };
        assert_eq!(event.action, Action::Pass);
        assert_eq!(event.package, "example.com/pkg");
        assert_eq!(event.test, "TestFoo");
        assert_eq!(event.elapsed, Some(0.25));
        assert_eq!(event.elapsed_duration(), Some(Duration::from_millis(250)));
        assert!(event.time.is_some());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let line = r#"{"action":"run","package":"p","test":"T","FutureField":42}"#;
        assert!(matches!(
            parse_line(line).expect("line decodes"),
            ParsedLine::Event(_)
        ));
    }

    #[test]
    fn non_json_lines_are_raw() {
        let parsed = parse_line("FAIL\texample.com/pkg [build failed]").expect("raw is not an error");
        assert_eq!(
            parsed,
            ParsedLine::Raw("FAIL\texample.com/pkg [build failed]".to_owned())
        );
    }

    #[test]
    fn truncated_json_is_raw() {
        let parsed = parse_line(r#"{"action":"run","package""#).expect("raw is not an error");
        assert!(matches!(parsed, ParsedLine::Raw(_)));
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let err = parse_line(r#"{"action":"pass","package":"p","elapsed":"fast"}"#)
            .expect_err("elapsed must be a number");
        assert!(err.to_string().contains("invalid type"));
    }

    #[test]
    fn unknown_action_is_an_error() {
        parse_line(r#"{"action":"explode","package":"p"}"#).expect_err("unknown action");
    }

    #[test]
    fn events_round_trip_through_serde() {
        let original = TestEvent {
            time: None,
            action: Action::Output,
            package: "example.com/pkg".to_owned(),
            test: "TestFoo/sub".to_owned(),
            elapsed: None,
            output: Some("  hello\n".to_owned()),
        };
        let encoded = serde_json::to_string(&original).expect("event encodes");
        let decoded = match parse_line(&encoded).expect("event decodes") {
            ParsedLine::Event(event) => event,
            other => panic!("expected an event, got {other:?}"),
        };
        assert_eq!(decoded, original);
    }

    #[test]
    fn actions_use_lowercase_names() {
        let encoded = serde_json::to_string(&Action::Cont).expect("action encodes");
        assert_eq!(encoded, r#""cont""#);
    }
}
