//! Registry of line-search strategies.

use solver_core::{Registry, SolverError, Vector};

use crate::line_search::{
    BacktrackingLineSearch, BasicLineSearch, BasicNoNormsLineSearch, LineSearch,
};
use crate::options::LineSearchKind;

/// Factory producing a fresh strategy.
pub type LineSearchFactory<V> = fn() -> Box<dyn LineSearch<V>>;

/// Name → factory map for [`LineSearch`] strategies.
#[derive(Debug, Clone)]
pub struct LineSearchRegistry<V: Vector> {
    inner: Registry<LineSearchFactory<V>>,
}

fn basic<V: Vector>() -> Box<dyn LineSearch<V>> {
    Box::new(BasicLineSearch)
}

fn basic_no_norms<V: Vector>() -> Box<dyn LineSearch<V>> {
    Box::new(BasicNoNormsLineSearch)
}

fn quadratic<V: Vector>() -> Box<dyn LineSearch<V>> {
    Box::new(BacktrackingLineSearch::quadratic())
}

fn cubic<V: Vector>() -> Box<dyn LineSearch<V>> {
    Box::new(BacktrackingLineSearch::cubic())
}

impl<V: Vector> LineSearchRegistry<V> {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            inner: Registry::new("line search"),
        }
    }

    /// Registry with the four built-in strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(LineSearchKind::Basic.as_str(), basic::<V>)
            .register(LineSearchKind::BasicNoNorms.as_str(), basic_no_norms::<V>)
            .register(LineSearchKind::Quadratic.as_str(), quadratic::<V>)
            .register(LineSearchKind::Cubic.as_str(), cubic::<V>);
        registry
    }

    /// Add or replace a strategy.
    pub fn register(&mut self, name: &str, factory: LineSearchFactory<V>) -> &mut Self {
        self.inner.register(name, factory);
        self
    }

    /// Instantiate the strategy registered under `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn LineSearch<V>>, SolverError> {
        let factory = self.inner.get(name)?;
        Ok(factory())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.inner.names().collect()
    }
}

impl<V: Vector> Default for LineSearchRegistry<V> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solver_core::DenseVector;

    #[test]
    fn test_defaults_registered() {
        let registry = LineSearchRegistry::<DenseVector>::with_defaults();
        assert_eq!(registry.names(), vec!["basic", "basicnonorms", "cubic", "quadratic"]);
        assert_eq!(registry.create("quadratic").unwrap().kind(), LineSearchKind::Quadratic);
        assert!(registry.create("wolfe").is_err());
    }
}
