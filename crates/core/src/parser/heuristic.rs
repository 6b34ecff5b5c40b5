//! Best-effort line scanner for unstructured test output.
//!
//! Used whenever a structured decode fails. The classification is
//! approximate by nature: it only guarantees non-negative, self-consistent
//! counters and a plausible case list.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::run::{ParsedResults, TestCase, TestCaseStatus, TestSummary};

/// Symbols and prefixes that mark a passing test line.
const PASS_MARKERS: &[&str] = &["✓", "✔", "√", "PASS ", "ok "];

/// Symbols and prefixes that mark a failing test line.
const FAIL_MARKERS: &[&str] = &["✗", "✕", "✖", "×", "FAIL ", "not ok "];

/// Symbols and prefixes that mark a skipped test line.
const SKIP_MARKERS: &[&str] = &["○", "↓", "- ", "SKIP "];

/// Summary lines for whole test files, not individual tests.
const FILE_SUMMARY_PREFIXES: &[&str] = &["Test Suites:", "Test Files", "Spec Files"];

/// Cap on the error detail attached to a heuristic failure.
const MAX_ERROR_DETAIL_LEN: usize = 2_000;

/// ANSI colour/style escape sequences.
static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid regex"));

/// `<count> <outcome>` pairs in summary lines, e.g. `3 passed`, `1 failing`.
static SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+)\s+(passing|passed|failing|failed|pending|skipped|todo)\b")
        .expect("valid regex")
});

/// Scan `output` line by line and derive a best-effort result.
///
/// Summary lines (`Tests: 1 failed, 2 passed, 3 total`, `2 passing`) win
/// over per-line classification for the counters when present. Otherwise the
/// counters are derived from the classified cases.
pub fn scan(output: &str) -> ParsedResults {
    let mut test_cases: Vec<TestCase> = Vec::new();
    let mut summary_counts: HashMap<TestCaseStatus, u32> = HashMap::new();
    let mut awaiting_detail: Option<usize> = None;

    for raw in output.lines() {
        let cleaned = ANSI_RE.replace_all(raw, "");
        let line = cleaned.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(case) = classify(line) {
            awaiting_detail = (case.status == TestCaseStatus::Failed).then_some(test_cases.len());
            test_cases.push(case);
            continue;
        }

        if FILE_SUMMARY_PREFIXES.iter().any(|p| line.starts_with(p)) {
            continue;
        }

        let mut matched_summary = false;
        for caps in SUMMARY_RE.captures_iter(line) {
            let Ok(count) = caps[1].parse::<u32>() else {
                continue;
            };
            let status = match caps[2].to_ascii_lowercase().as_str() {
                "passing" | "passed" => TestCaseStatus::Passed,
                "failing" | "failed" => TestCaseStatus::Failed,
                _ => TestCaseStatus::Skipped,
            };
            // Later summaries restate earlier ones, so overwrite, except
            // skip buckets (pending + todo) that share one status.
            let slot = summary_counts.entry(status).or_insert(0);
            *slot = if status == TestCaseStatus::Skipped && matched_summary {
                slot.saturating_add(count)
            } else {
                count
            };
            matched_summary = true;
        }
        if matched_summary {
            awaiting_detail = None;
            continue;
        }

        if let Some(index) = awaiting_detail.take() {
            let detail: String = line.chars().take(MAX_ERROR_DETAIL_LEN).collect();
            test_cases[index].error = Some(detail);
        }
    }

    let summary = if summary_counts.is_empty() {
        TestSummary::from_cases(&test_cases)
    } else {
        let get = |status| summary_counts.get(&status).copied().unwrap_or(0);
        TestSummary::from_counts(
            get(TestCaseStatus::Passed),
            get(TestCaseStatus::Failed),
            get(TestCaseStatus::Skipped),
        )
    };

    ParsedResults {
        summary,
        test_cases,
    }
}

/// Classify a single cleaned line. Failure markers are checked first so a
/// line carrying both (`✓ 0 passed, ✕ 1 failed`) errs on the side of failure.
fn classify(line: &str) -> Option<TestCase> {
    if let Some(name) = strip_marker(line, FAIL_MARKERS) {
        return Some(TestCase::failed(name, 0, None));
    }
    if let Some(name) = strip_marker(line, SKIP_MARKERS) {
        return Some(TestCase::skipped(name));
    }
    if let Some(name) = strip_marker(line, PASS_MARKERS) {
        return Some(TestCase::passed(name, 0));
    }
    None
}

fn strip_marker<'a>(line: &'a str, markers: &[&str]) -> Option<&'a str> {
    markers.iter().find_map(|marker| {
        let rest = line.strip_prefix(marker)?.trim();
        (!rest.is_empty()).then_some(rest)
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
