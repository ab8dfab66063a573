//! Named evaluator factories.

use std::fmt;
use std::sync::Arc;

use super::{DefaultEvaluator, ModelEvaluator};

/// Builds an evaluator instance on demand.
pub type EvaluatorFactory = Arc<dyn Fn() -> Box<dyn ModelEvaluator> + Send + Sync>;

/// Ordered registry of evaluators by name.
///
/// Registration order is the order in which `evaluate` tries evaluators when
/// no explicit selection is given.
#[derive(Clone, Default)]
pub struct EvaluatorRegistry {
    entries: Vec<(String, EvaluatorFactory)>,
}

impl fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluatorRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl EvaluatorRegistry {
    /// Registry without evaluators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `"default"` evaluator.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("default", || Box::new(DefaultEvaluator::new()));
        registry
    }

    /// Register (or replace) an evaluator under `name`. A replaced entry
    /// keeps its position.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ModelEvaluator> + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: EvaluatorFactory = Arc::new(factory);
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((name, factory)),
        }
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Registered names, in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Instantiate the evaluator registered as `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Box<dyn ModelEvaluator>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, factory)| factory())
    }
}
