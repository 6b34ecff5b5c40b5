//! Framework execution strategies.
//!
//! Every supported framework maps to a [`TestExecutor`] in an
//! [`ExecutorSet`], which keeps the orchestrator framework-agnostic: it asks
//! the set for a strategy and never branches on the framework itself.

pub mod executor;
pub mod frameworks;
pub mod shell;
pub mod subprocess;

use std::collections::HashMap;
use std::sync::Arc;

pub use executor::{
    CommandSpec, ExecutionError, ExecutionOutput, ExecutorSettings, TestExecutor,
    BASE_URL_CONFIG_KEY, DEFAULT_PROGRAM,
};

use crate::framework::Framework;
use frameworks::{CypressExecutor, JestExecutor, PlaywrightExecutor, VitestExecutor};

/// Framework → strategy table.
#[derive(Clone)]
pub struct ExecutorSet {
    executors: HashMap<Framework, Arc<dyn TestExecutor>>,
}

impl ExecutorSet {
    /// The production strategies, all sharing `settings`.
    pub fn new(settings: ExecutorSettings) -> Self {
        let settings = Arc::new(settings);
        let mut executors: HashMap<Framework, Arc<dyn TestExecutor>> = HashMap::new();
        executors.insert(
            Framework::Cypress,
            Arc::new(CypressExecutor::new(Arc::clone(&settings))),
        );
        executors.insert(
            Framework::Playwright,
            Arc::new(PlaywrightExecutor::new(Arc::clone(&settings))),
        );
        executors.insert(
            Framework::Jest,
            Arc::new(JestExecutor::new(Arc::clone(&settings))),
        );
        executors.insert(Framework::Vitest, Arc::new(VitestExecutor::new(settings)));
        Self { executors }
    }

    /// Use the same strategy for every framework.
    pub fn uniform(executor: Arc<dyn TestExecutor>) -> Self {
        let executors = Framework::ALL
            .into_iter()
            .map(|fw| (fw, Arc::clone(&executor)))
            .collect();
        Self { executors }
    }

    /// Replace the strategy for one framework.
    pub fn with(mut self, framework: Framework, executor: Arc<dyn TestExecutor>) -> Self {
        self.executors.insert(framework, executor);
        self
    }

    pub fn get(&self, framework: Framework) -> Option<Arc<dyn TestExecutor>> {
        self.executors.get(&framework).cloned()
    }
}

impl Default for ExecutorSet {
    fn default() -> Self {
        Self::new(ExecutorSettings::default())
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
