// Copyright (c) The testsum Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI definition and execution.

use crate::errors::ExpectedError;
use crate::handler::RunHandler;
use camino::Utf8PathBuf;
use clap::Parser;
use std::fs::File;
use std::io::{self, Write};
use std::process::Stdio;
use testsum_scan::{
    print_summary, scan, write_report, CancelSignal, Format, JunitConfig, ScanError,
    SummarySections,
};
use tokio::process::Command;
use tracing::debug;

/// A friendlier front-end for tests that emit JSON event streams.
///
/// Runs the test command (by default `go test -json ./...`), renders its
/// event stream as readable progress, prints an end-of-run summary, and
/// optionally writes a JUnit XML report for CI.
#[derive(Debug, Parser)]
#[command(version, bin_name = "testsum")]
pub struct TestsumApp {
    /// Print format of test output.
    #[arg(
        long,
        short = 'f',
        env = "TESTSUM_FORMAT",
        default_value = "pkgname",
        value_name = "FORMAT"
    )]
    format: String,

    /// Don't prepend the default test command to the arguments.
    #[arg(long)]
    raw_command: bool,

    /// Write all test events to this file as line-delimited JSON.
    #[arg(long, env = "TESTSUM_JSONFILE", value_name = "PATH")]
    jsonfile: Option<Utf8PathBuf>,

    /// Write a JUnit XML report to this file.
    #[arg(long, env = "TESTSUM_JUNITFILE", value_name = "PATH")]
    junitfile: Option<Utf8PathBuf>,

    /// Naming of the testsuite field: short, relative or full.
    #[arg(
        long = "junitfile-testsuite-name",
        default_value = "short",
        value_name = "STYLE"
    )]
    junit_testsuite_name: String,

    /// Naming of the testcase classname field: short, relative or full.
    #[arg(
        long = "junitfile-testcase-classname",
        default_value = "short",
        value_name = "STYLE"
    )]
    junit_testcase_classname: String,

    /// Disable color output.
    #[arg(long)]
    no_color: bool,

    /// Summary sections to omit, from: skipped, failed, errors, output.
    #[arg(long = "no-summary", value_name = "SECTIONS")]
    no_summary: Option<String>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// The test command to run.
    #[arg(value_name = "ARGS", last = true)]
    args: Vec<String>,
}

impl TestsumApp {
    /// Executes the app, returning the process exit code.
    pub fn exec(self) -> Result<i32, ExpectedError> {
        if self.no_color {
            owo_colors::set_override(false);
        }
        init_logging(self.debug);

        let format: Format = self.format.parse()?;
        let sections = match &self.no_summary {
            Some(list) => SummarySections::parse_omit_list(list)?,
            None => SummarySections::all(),
        };
        let junit_config =
            JunitConfig::new(&self.junit_testsuite_name, &self.junit_testcase_classname)?;
        let command = build_command(self.raw_command, &self.args, test_directory().as_deref());
        if command.is_empty() {
            return Err(ExpectedError::MissingCommand);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|err| ExpectedError::Runtime { err })?;
        runtime.block_on(self.run(command, format, sections, junit_config))
    }

    async fn run(
        &self,
        command: Vec<String>,
        format: Format,
        sections: SummarySections,
        junit_config: JunitConfig,
    ) -> Result<i32, ExpectedError> {
        debug!(command = command.join(" ").as_str(), "exec");
        let mut child = Command::new(&command[0])
            .args(&command[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| ExpectedError::Start {
                command: command.join(" "),
                err,
            })?;
        let stdout = child.stdout.take().expect("child stdout was piped");
        let stderr = child.stderr.take().expect("child stderr was piped");

        let (cancel_handle, cancel) = CancelSignal::new();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel_handle.cancel();
            }
        });

        let json_file = match &self.jsonfile {
            Some(path) => Some(File::create(path).map_err(|err| ExpectedError::FileCreate {
                path: path.clone(),
                err,
            })?),
            None => None,
        };
        let mut handler = RunHandler::new(format, json_file);

        let (execution, scan_error) = match scan(stdout, stderr, &mut handler, cancel).await {
            Ok(execution) => (execution, None),
            Err(ScanError { execution, kind }) => (*execution, Some(kind)),
        };
        handler
            .flush()
            .map_err(|err| ExpectedError::JsonFile { err })?;

        // Summary and JUnit report are produced even from a partial
        // execution, so a run with compile failures still reports.
        let mut stdout_io = io::stdout();
        print_summary(&mut stdout_io, &execution, sections)
            .and_then(|()| stdout_io.flush())
            .map_err(|err| ExpectedError::Summary { err })?;

        if let Some(path) = &self.junitfile {
            let file = File::create(path).map_err(|err| ExpectedError::FileCreate {
                path: path.clone(),
                err,
            })?;
            write_report(&execution, &junit_config, file).map_err(|err| ExpectedError::Junit {
                path: path.clone(),
                err,
            })?;
        }

        let status = child
            .wait()
            .await
            .map_err(|err| ExpectedError::Wait { err })?;

        match scan_error {
            // Cancellation is not an internal failure; fall through to the
            // child's status.
            Some(kind) if !matches!(kind, testsum_scan::ScanErrorKind::Canceled) => {
                Err(ExpectedError::Scan { kind })
            }
            _ => Ok(status.code().unwrap_or(1)),
        }
    }
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "testsum=debug,testsum_scan=debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_env("TESTSUM_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();
}

fn test_directory() -> Option<String> {
    std::env::var("TEST_DIRECTORY").ok().filter(|dir| !dir.is_empty())
}

/// Builds the command line to run. Without `--raw-command` the default
/// `go test -json` prefix is prepended, and the test directory (from
/// `TEST_DIRECTORY`, default `./...`) is appended when no arguments were
/// given.
fn build_command(raw_command: bool, args: &[String], test_directory: Option<&str>) -> Vec<String> {
    if raw_command {
        return args.to_vec();
    }
    let mut command = vec!["go".to_owned(), "test".to_owned()];
    if args.is_empty() {
        command.push("-json".to_owned());
        command.push(test_directory.unwrap_or("./...").to_owned());
        return command;
    }
    if !args.iter().any(|arg| arg == "-json" || arg == "--json") {
        command.push("-json".to_owned());
    }
    command.extend(args.iter().cloned());
    if let Some(dir) = test_directory {
        command.push(dir.to_owned());
    }
    command
}
