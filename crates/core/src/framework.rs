//! Supported test frameworks.
//!
//! The set is closed: a submission naming anything else is rejected with
//! [`CoreError::UnsupportedFramework`] before a run is created.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A test framework the orchestrator knows how to invoke and parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Cypress,
    Playwright,
    Jest,
    Vitest,
}

impl Framework {
    /// Every supported framework, in display order.
    pub const ALL: [Framework; 4] = [
        Framework::Cypress,
        Framework::Playwright,
        Framework::Jest,
        Framework::Vitest,
    ];

    /// Lower-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cypress => "cypress",
            Self::Playwright => "playwright",
            Self::Jest => "jest",
            Self::Vitest => "vitest",
        }
    }

    /// Static estimate returned to the submitter. Browser suites are slow,
    /// unit runners are quick.
    pub fn estimated_duration(self) -> Duration {
        match self {
            Self::Cypress => Duration::from_secs(300),
            Self::Playwright => Duration::from_secs(240),
            Self::Jest => Duration::from_secs(60),
            Self::Vitest => Duration::from_secs(45),
        }
    }

    /// Prefix applied to user-supplied config keys when they are exported
    /// as environment variables for this framework's process.
    pub fn env_prefix(self) -> &'static str {
        match self {
            Self::Cypress => "CYPRESS_",
            Self::Playwright => "PLAYWRIGHT_",
            Self::Jest => "JEST_",
            Self::Vitest => "VITE_",
        }
    }

    /// Environment variable carrying the base URL under test.
    pub fn base_url_var(self) -> &'static str {
        match self {
            Self::Cypress => "CYPRESS_BASE_URL",
            Self::Playwright => "PLAYWRIGHT_BASE_URL",
            Self::Jest => "API_BASE_URL",
            Self::Vitest => "VITE_API_BASE_URL",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Framework::ALL
            .into_iter()
            .find(|fw| fw.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnsupportedFramework(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
