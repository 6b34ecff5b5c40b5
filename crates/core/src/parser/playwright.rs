//! Decoder for Playwright's `--reporter=json` output.
//!
//! Suites nest arbitrarily (file → describe → describe); case names are the
//! suite titles joined with ` › `, matching Playwright's own list reporter.

use serde::Deserialize;

use super::{decode_json, millis};
use crate::run::{ParsedResults, TestCase, TestSummary};

const TITLE_SEPARATOR: &str = " › ";

#[derive(Debug, Deserialize)]
struct PlaywrightReport {
    suites: Vec<Suite>,
    #[serde(default)]
    stats: Option<Stats>,
}

#[derive(Debug, Deserialize)]
struct Stats {
    #[serde(default)]
    expected: u32,
    #[serde(default)]
    unexpected: u32,
    #[serde(default)]
    skipped: u32,
    #[serde(default)]
    flaky: u32,
}

#[derive(Debug, Deserialize)]
struct Suite {
    #[serde(default)]
    title: String,
    #[serde(default)]
    specs: Vec<Spec>,
    #[serde(default)]
    suites: Vec<Suite>,
}

#[derive(Debug, Deserialize)]
struct Spec {
    title: String,
    #[serde(default)]
    tests: Vec<SpecTest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpecTest {
    /// `expected`, `unexpected`, `flaky` or `skipped`.
    status: String,
    #[serde(default)]
    project_name: Option<String>,
    #[serde(default)]
    results: Vec<AttemptResult>,
}

#[derive(Debug, Deserialize)]
struct AttemptResult {
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    error: Option<AttemptError>,
}

#[derive(Debug, Deserialize)]
struct AttemptError {
    #[serde(default)]
    message: Option<String>,
}

/// Decode Playwright JSON output. Returns `None` when the output does not
/// follow the schema.
pub fn decode(output: &str) -> Option<ParsedResults> {
    let report: PlaywrightReport = decode_json(output)?;

    let mut test_cases = Vec::new();
    let mut path = Vec::new();
    for suite in &report.suites {
        collect(suite, &mut path, &mut test_cases);
    }

    let summary = match (&report.stats, test_cases.is_empty()) {
        (Some(stats), true) => TestSummary::from_counts(
            stats.expected.saturating_add(stats.flaky),
            stats.unexpected,
            stats.skipped,
        ),
        _ => TestSummary::from_cases(&test_cases),
    };

    Some(ParsedResults {
        summary,
        test_cases,
    })
}

fn collect<'a>(suite: &'a Suite, path: &mut Vec<&'a str>, out: &mut Vec<TestCase>) {
    if !suite.title.is_empty() {
        path.push(&suite.title);
    }

    for spec in &suite.specs {
        for test in &spec.tests {
            out.push(to_case(path, spec, test));
        }
    }
    for child in &suite.suites {
        collect(child, path, out);
    }

    if !suite.title.is_empty() {
        path.pop();
    }
}

fn to_case(path: &[&str], spec: &Spec, test: &SpecTest) -> TestCase {
    let mut name = path
        .iter()
        .copied()
        .chain(std::iter::once(spec.title.as_str()))
        .collect::<Vec<_>>()
        .join(TITLE_SEPARATOR);
    if let Some(project) = test.project_name.as_deref().filter(|p| !p.is_empty()) {
        name = format!("[{project}] {name}");
    }

    // The last attempt decides the outcome; retries before it are noise.
    let last = test.results.last();
    let duration = millis(last.and_then(|r| r.duration));

    match test.status.as_str() {
        "expected" | "flaky" => TestCase::passed(name, duration),
        "skipped" => TestCase::skipped(name),
        _ => {
            let error = test
                .results
                .iter()
                .rev()
                .find_map(|r| r.error.as_ref().and_then(|e| e.message.clone()));
            TestCase::failed(name, duration, error)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
