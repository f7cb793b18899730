// Copyright (c) The testsum Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The in-memory model of a test run.
//!
//! [`Execution`] is an append-only aggregate: every decoded event is folded
//! in through [`Execution::add`], and everything else (failure derivation,
//! summaries, JUnit reports) is a pure function of the folded state.
//! Packages and tests are created lazily on the first event that references
//! them, which makes the fold tolerant of event reordering.

use crate::events::{Action, TestEvent};
use chrono::{DateTime, FixedOffset};
use indexmap::{IndexMap, IndexSet};
use std::time::Duration;

/// The terminal state of a test or package.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Outcome {
    /// The test or package passed.
    Pass,
    /// The test or package failed.
    Fail,
    /// The test or package was skipped.
    Skip,
}

impl Outcome {
    fn from_action(action: Action) -> Option<Self> {
        match action {
            Action::Pass => Some(Outcome::Pass),
            Action::Fail => Some(Outcome::Fail),
            Action::Skip => Some(Outcome::Skip),
            _ => None,
        }
    }
}

/// A single named test within a package.
#[derive(Clone, Debug)]
pub struct TestCase {
    name: String,
    elapsed: Option<Duration>,
    outcome: Option<Outcome>,
    output: Vec<String>,
}

impl TestCase {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elapsed: None,
            outcome: None,
            output: Vec::new(),
        }
    }

    /// The test's name, unique within its package.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The elapsed time reported by the test's terminal event.
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    /// The terminal action, or `None` if the test never terminated.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// A test that never reported a terminal action. Counts as a failure.
    pub fn is_unterminated(&self) -> bool {
        self.outcome.is_none()
    }

    /// Returns true if the test is a subtest of another test.
    pub fn is_subtest(&self) -> bool {
        self.name.contains('/')
    }

    /// The name of the immediate parent test, if any.
    pub fn parent_name(&self) -> Option<&str> {
        self.name.rsplit_once('/').map(|(parent, _)| parent)
    }

    /// The output fragments attributed to this test, in arrival order.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// All output fragments concatenated, byte for byte.
    pub fn combined_output(&self) -> String {
        self.output.concat()
    }
}

/// Why a run error was recorded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunErrorKind {
    /// A line that could not be interpreted as a test event.
    Stray,
    /// A stray line that looks like a compiler diagnostic.
    Compile,
    /// A package that failed without running any tests.
    Build,
}

/// A line of content received outside the structured event stream.
///
/// Run errors are data, not errors: they participate in the summary and the
/// JUnit report, and never abort a scan.
#[derive(Clone, Debug)]
pub struct RunError {
    /// The captured text.
    pub message: String,
    /// How the text was classified.
    pub kind: RunErrorKind,
}

/// A unit of test organization containing zero or more tests.
#[derive(Clone, Debug)]
pub struct Package {
    name: String,
    tests: IndexMap<String, TestCase>,
    elapsed: Option<Duration>,
    outcome: Option<Outcome>,
    output: Vec<String>,
    run_errors: Vec<RunError>,
    started_at: Option<DateTime<FixedOffset>>,
}

fn is_child_name(parent: &str, child: &str) -> bool {
    child.len() > parent.len() + 1
        && child.starts_with(parent)
        && child.as_bytes()[parent.len()] == b'/'
}

impl Package {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests: IndexMap::new(),
            elapsed: None,
            outcome: None,
            output: Vec::new(),
            run_errors: Vec::new(),
            started_at: None,
        }
    }

    fn test_entry(&mut self, name: &str) -> &mut TestCase {
        self.tests
            .entry(name.to_owned())
            .or_insert_with(|| TestCase::new(name))
    }

    /// The fully-qualified package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The package's tests, in the order they were first seen.
    pub fn tests(&self) -> impl Iterator<Item = &TestCase> {
        self.tests.values()
    }

    /// Looks up a test by name.
    pub fn test(&self, name: &str) -> Option<&TestCase> {
        self.tests.get(name)
    }

    /// The package's terminal action, if it has reported one.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// The elapsed time reported by the package's terminal event.
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    /// The time of the first `run` event seen for this package.
    pub fn started_at(&self) -> Option<DateTime<FixedOffset>> {
        self.started_at
    }

    /// Package-level output fragments (events with an empty test name).
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Run errors attributed to this package.
    pub fn run_errors(&self) -> &[RunError] {
        &self.run_errors
    }

    /// Returns true if the package failed: its own terminal action is
    /// `fail`, or any of its tests is failed.
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Some(Outcome::Fail))
            || self.tests.values().any(|case| self.test_failed(case))
    }

    /// Returns true if `case` is failed: its own terminal action is `fail`,
    /// it never terminated, or any of its subtests is failed. Computed at
    /// query time; parent links are never materialized.
    pub fn test_failed(&self, case: &TestCase) -> bool {
        if matches!(case.outcome, Some(Outcome::Fail)) || case.is_unterminated() {
            return true;
        }
        self.subtests_of(case)
            .any(|sub| matches!(sub.outcome, Some(Outcome::Fail)) || sub.is_unterminated())
    }

    /// All tests nested underneath `case`, at any depth.
    pub fn subtests_of<'a>(&'a self, case: &'a TestCase) -> impl Iterator<Item = &'a TestCase> {
        self.tests
            .values()
            .filter(move |sub| is_child_name(&case.name, &sub.name))
    }

    /// Returns true if no other test is nested underneath `case`.
    pub fn is_leaf(&self, case: &TestCase) -> bool {
        !self.tests.keys().any(|name| is_child_name(&case.name, name))
    }

    /// The tests that have no subtests of their own.
    pub fn leaf_tests(&self) -> impl Iterator<Item = &TestCase> {
        self.tests.values().filter(move |case| self.is_leaf(case))
    }
}

/// The aggregate in-memory model of a single test run.
///
/// Mutated only through [`Execution::add`] and
/// [`Execution::add_run_error`]; once a scan has returned, readers operate
/// on a frozen snapshot.
#[derive(Clone, Debug, Default)]
pub struct Execution {
    packages: IndexMap<String, Package>,
    events_seen: usize,
    run_errors: Vec<RunError>,
    build_failed: IndexSet<String>,
}

impl Execution {
    /// Creates an empty execution.
    pub fn new() -> Self {
        Self::default()
    }

    fn package_entry(&mut self, name: &str) -> &mut Package {
        self.packages
            .entry(name.to_owned())
            .or_insert_with(|| Package::new(name))
    }

    /// Folds a single event into the model.
    pub fn add(&mut self, event: &TestEvent) {
        self.events_seen += 1;
        if event.package.is_empty() {
            return;
        }
        match event.action {
            Action::Run => {
                let package = self.package_entry(&event.package);
                if package.started_at.is_none() {
                    package.started_at = event.time;
                }
                if !event.test.is_empty() {
                    package.test_entry(&event.test);
                }
            }
            Action::Output => {
                let fragment = event.output.clone().unwrap_or_default();
                let package = self.package_entry(&event.package);
                if event.test.is_empty() {
                    package.output.push(fragment);
                } else {
                    package.test_entry(&event.test).output.push(fragment);
                }
            }
            Action::Pass | Action::Fail | Action::Skip => {
                if let Some(outcome) = Outcome::from_action(event.action) {
                    self.record_outcome(event, outcome);
                }
            }
            // Contribute to the event count only.
            Action::Pause | Action::Cont | Action::Bench => {}
        }
    }

    fn record_outcome(&mut self, event: &TestEvent, outcome: Outcome) {
        let elapsed = event.elapsed_duration();
        let package = self.package_entry(&event.package);
        if event.test.is_empty() {
            package.outcome = Some(outcome);
            package.elapsed = elapsed.or(package.elapsed);
            // A package that fails without ever running a test is a build
            // failure; its accumulated output is the diagnostic.
            if outcome == Outcome::Fail && package.tests.is_empty() {
                let message = package.output.concat();
                package.run_errors.push(RunError {
                    message,
                    kind: RunErrorKind::Build,
                });
                self.build_failed.insert(event.package.clone());
            }
        } else {
            let case = package.test_entry(&event.test);
            // The stream is authoritative: a later terminal action wins.
            case.outcome = Some(outcome);
            case.elapsed = elapsed.or(case.elapsed);
        }
    }

    /// Records a line received outside the structured event stream, in the
    /// distinguished no-package bucket.
    pub fn add_run_error(&mut self, message: impl Into<String>, kind: RunErrorKind) {
        self.run_errors.push(RunError {
            message: message.into(),
            kind,
        });
    }

    /// Looks up a package by name.
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    /// All packages, in the order they were first seen.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// The number of events folded so far.
    pub fn events_seen(&self) -> usize {
        self.events_seen
    }

    /// The packages that reported a build failure.
    pub fn build_failures(&self) -> impl Iterator<Item = &str> {
        self.build_failed.iter().map(String::as_str)
    }

    /// The total elapsed time, summed over package terminal events. Derived
    /// from the stream rather than the wall clock so that re-scanning a
    /// captured stream produces identical reports.
    pub fn elapsed(&self) -> Duration {
        self.packages
            .values()
            .filter_map(Package::elapsed)
            .sum()
    }

    /// The number of executed leaf tests across all packages.
    pub fn total(&self) -> usize {
        self.packages
            .values()
            .map(|package| package.leaf_tests().count())
            .sum()
    }

    /// Every failed test with its package, in insertion order. A test is
    /// failed if its own terminal action is `fail`, it never terminated, or
    /// any of its subtests is failed.
    pub fn failed(&self) -> Vec<(&Package, &TestCase)> {
        self.packages
            .values()
            .flat_map(|package| {
                package
                    .tests
                    .values()
                    .filter(move |case| package.test_failed(case))
                    .map(move |case| (package, case))
            })
            .collect()
    }

    /// Every skipped test with its package, in insertion order.
    pub fn skipped(&self) -> Vec<(&Package, &TestCase)> {
        self.packages
            .values()
            .flat_map(|package| {
                package
                    .tests
                    .values()
                    .filter(|case| case.outcome == Some(Outcome::Skip))
                    .map(move |case| (package, case))
            })
            .collect()
    }

    /// Run errors not attributed to any package.
    pub fn unattributed_errors(&self) -> &[RunError] {
        &self.run_errors
    }

    /// All run errors: the no-package bucket first, then per-package errors
    /// in package insertion order.
    pub fn errors(&self) -> impl Iterator<Item = &RunError> {
        self.run_errors
            .iter()
            .chain(self.packages.values().flat_map(|p| p.run_errors.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Action;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn event(action: Action, package: &str, test: &str) -> TestEvent {
        TestEvent {
            time: None,
            action,
            package: package.to_owned(),
            test: test.to_owned(),
            elapsed: None,
            output: None,
        }
    }

    fn terminal(action: Action, package: &str, test: &str, elapsed: f64) -> TestEvent {
        TestEvent {
            elapsed: Some(elapsed),
            ..event(action, package, test)
        }
    }

    fn output(package: &str, test: &str, text: &str) -> TestEvent {
        TestEvent {
            output: Some(text.to_owned()),
            ..event(Action::Output, package, test)
        }
    }

    #[test]
    fn packages_and_tests_are_created_lazily() {
        let mut execution = Execution::new();
        // An output event arriving before the run event still creates the
        // test.
        execution.add(&output("p", "TestEarly", "early bird\n"));
        execution.add(&event(Action::Run, "p", "TestEarly"));

        let package = execution.package("p").expect("package exists");
        let case = package.test("TestEarly").expect("test exists");
        assert_eq!(case.output(), ["early bird\n"]);
    }

    #[test]
    fn tests_keep_first_seen_order() {
        let mut execution = Execution::new();
        for name in ["TestC", "TestA", "TestB"] {
            execution.add(&event(Action::Run, "p", name));
        }
        let names: Vec<_> = execution
            .package("p")
            .expect("package exists")
            .tests()
            .map(TestCase::name)
            .collect();
        assert_eq!(names, ["TestC", "TestA", "TestB"]);
    }

    #[test]
    fn terminal_actions_record_outcome_and_elapsed() {
        let mut execution = Execution::new();
        execution.add(&event(Action::Run, "p", "TestFoo"));
        execution.add(&terminal(Action::Pass, "p", "TestFoo", 0.25));
        execution.add(&terminal(Action::Pass, "p", "", 0.5));

        let package = execution.package("p").expect("package exists");
        assert_eq!(package.outcome(), Some(Outcome::Pass));
        assert_eq!(package.elapsed(), Some(Duration::from_millis(500)));
        let case = package.test("TestFoo").expect("test exists");
        assert_eq!(case.outcome(), Some(Outcome::Pass));
        assert_eq!(case.elapsed(), Some(Duration::from_millis(250)));
        assert!(!package.is_failed());
    }

    #[test]
    fn later_terminal_action_wins() {
        let mut execution = Execution::new();
        execution.add(&event(Action::Run, "p", "TestFlip"));
        execution.add(&terminal(Action::Pass, "p", "TestFlip", 0.1));
        execution.add(&terminal(Action::Fail, "p", "TestFlip", 0.2));

        let package = execution.package("p").expect("package exists");
        let case = package.test("TestFlip").expect("test exists");
        assert_eq!(case.outcome(), Some(Outcome::Fail));
        assert!(package.test_failed(case));
    }

    #[test]
    fn pause_cont_bench_only_count() {
        let mut execution = Execution::new();
        execution.add(&event(Action::Run, "p", "TestFoo"));
        execution.add(&event(Action::Pause, "p", "TestFoo"));
        execution.add(&event(Action::Cont, "p", "TestFoo"));
        execution.add(&event(Action::Bench, "p", "BenchmarkBar"));
        assert_eq!(execution.events_seen(), 4);
        // Bench did not create a test case.
        let package = execution.package("p").expect("package exists");
        assert!(package.test("BenchmarkBar").is_none());
    }

    #[test]
    fn unterminated_test_counts_as_failed() {
        let mut execution = Execution::new();
        execution.add(&event(Action::Run, "p", "TestHung"));
        execution.add(&terminal(Action::Fail, "p", "", 1.0));

        let package = execution.package("p").expect("package exists");
        let case = package.test("TestHung").expect("test exists");
        assert!(case.is_unterminated());
        assert!(package.test_failed(case));
        let failed = execution.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].1.name(), "TestHung");
    }

    #[test]
    fn parent_failure_is_derived_from_subtests() {
        let mut execution = Execution::new();
        for name in ["TestA", "TestA/B", "TestA/B/C"] {
            execution.add(&event(Action::Run, "p", name));
        }
        execution.add(&terminal(Action::Pass, "p", "TestA", 0.1));
        execution.add(&terminal(Action::Pass, "p", "TestA/B", 0.1));
        execution.add(&terminal(Action::Fail, "p", "TestA/B/C", 0.1));

        let package = execution.package("p").expect("package exists");
        let parent = package.test("TestA").expect("test exists");
        let middle = package.test("TestA/B").expect("test exists");
        assert!(package.test_failed(parent));
        assert!(package.test_failed(middle));
        assert!(package.is_failed());

        let failed: Vec<_> = execution
            .failed()
            .into_iter()
            .map(|(_, case)| case.name())
            .collect();
        assert_eq!(failed, ["TestA", "TestA/B", "TestA/B/C"]);
    }

    #[test]
    fn sibling_subtests_do_not_contaminate() {
        let mut execution = Execution::new();
        execution.add(&event(Action::Run, "p", "TestA/long"));
        execution.add(&event(Action::Run, "p", "TestA/longer"));
        execution.add(&terminal(Action::Pass, "p", "TestA/long", 0.1));
        execution.add(&terminal(Action::Fail, "p", "TestA/longer", 0.1));

        let package = execution.package("p").expect("package exists");
        let passing = package.test("TestA/long").expect("test exists");
        // "TestA/longer" shares a name prefix with "TestA/long" but is a
        // sibling, not a subtest.
        assert!(!package.test_failed(passing));
    }

    #[test]
    fn leaf_counting_ignores_parents() {
        let mut execution = Execution::new();
        for name in ["TestA", "TestA/1", "TestA/2", "TestB"] {
            execution.add(&event(Action::Run, "p", name));
        }
        assert_eq!(execution.total(), 3);
    }

    #[test]
    fn package_fail_without_tests_is_a_build_failure() {
        let mut execution = Execution::new();
        execution.add(&output("p", "", "# p\n"));
        execution.add(&output("p", "", "compile error\n"));
        execution.add(&terminal(Action::Fail, "p", "", 0.0));

        let package = execution.package("p").expect("package exists");
        assert_eq!(package.run_errors().len(), 1);
        assert_eq!(package.run_errors()[0].kind, RunErrorKind::Build);
        assert_eq!(package.run_errors()[0].message, "# p\ncompile error\n");
        assert_eq!(execution.build_failures().collect::<Vec<_>>(), ["p"]);
        assert_eq!(execution.errors().count(), 1);
    }

    #[test]
    fn run_error_bucket_precedes_package_errors() {
        let mut execution = Execution::new();
        execution.add(&terminal(Action::Fail, "p", "", 0.0));
        execution.add_run_error("go: finding module", RunErrorKind::Stray);

        let kinds: Vec<_> = execution.errors().map(|e| e.kind).collect();
        assert_eq!(kinds, [RunErrorKind::Stray, RunErrorKind::Build]);
    }

    #[test]
    fn elapsed_sums_package_times() {
        let mut execution = Execution::new();
        execution.add(&terminal(Action::Pass, "a", "", 0.5));
        execution.add(&terminal(Action::Pass, "b", "", 0.25));
        assert_eq!(execution.elapsed(), Duration::from_millis(750));
    }

    proptest! {
        #[test]
        fn output_fragments_are_preserved(fragments in proptest::collection::vec(".*", 0..16)) {
            let mut execution = Execution::new();
            execution.add(&event(Action::Run, "p", "TestOut"));
            for fragment in &fragments {
                execution.add(&output("p", "TestOut", fragment));
            }
            let case = execution
                .package("p")
                .expect("package exists")
                .test("TestOut")
                .expect("test exists");
            prop_assert_eq!(case.combined_output(), fragments.concat());
        }
    }
}
