//! Result parsing: raw framework output in, normalized counters and test
//! cases out.
//!
//! Each framework has a strict structured decoder. When it cannot decode the
//! output (the reporter was misconfigured, the process crashed mid-write, the
//! output is plain text) parsing degrades to [`heuristic::scan`]. Parsing
//! never fails: the worst case is an empty, all-zero result.

pub mod cypress;
pub mod heuristic;
pub mod jest;
pub mod playwright;

use serde::de::DeserializeOwned;

use crate::framework::Framework;
use crate::run::ParsedResults;

/// Normalize `output` produced by `framework`.
pub fn parse_output(framework: Framework, output: &str) -> ParsedResults {
    let structured = match framework {
        // Vitest's JSON reporter emits the Jest schema.
        Framework::Jest | Framework::Vitest => jest::decode(output),
        Framework::Playwright => playwright::decode(output),
        Framework::Cypress => cypress::decode(output),
    };

    match structured {
        Some(parsed) => parsed,
        None => {
            tracing::debug!(
                framework = %framework,
                output_len = output.len(),
                "Structured decode failed, falling back to heuristic scan",
            );
            heuristic::scan(output)
        }
    }
}

/// Number of `{` positions tried when looking for a report inside noise.
const MAX_OBJECT_CANDIDATES: usize = 16;

/// Decode `output` as `T`, first as a whole and then as the first JSON
/// object that starts at one of the leading `{` positions. Reporters are
/// often surrounded by log noise (npm banners before, stderr after), so
/// trailing content after a complete object is ignored.
pub(crate) fn decode_json<T: DeserializeOwned>(output: &str) -> Option<T> {
    let trimmed = output.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    trimmed
        .match_indices('{')
        .take(MAX_OBJECT_CANDIDATES)
        .find_map(|(start, _)| {
            serde_json::Deserializer::from_str(&trimmed[start..])
                .into_iter::<T>()
                .next()
                .and_then(Result::ok)
        })
}

/// Convert a reporter duration (milliseconds, possibly fractional) to `u64`.
pub(crate) fn millis(value: Option<f64>) -> u64 {
    match value {
        Some(ms) if ms.is_finite() && ms > 0.0 => ms.round() as u64,
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
