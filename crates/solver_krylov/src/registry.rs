//! Registry of Krylov methods.

use solver_core::{Registry, SolverError, Vector};

use crate::qcg::Qcg;
use crate::richardson::Richardson;
use crate::solver::KrylovMethod;
use crate::tfqmr::Tfqmr;

/// Factory producing a fresh method instance.
pub type KrylovFactory<V> = fn() -> Box<dyn KrylovMethod<V>>;

/// Name → factory map for [`KrylovMethod`]s.
///
/// Built once by the application and passed to `KrylovSolver::with_type`
/// and `set_type`.
#[derive(Debug, Clone)]
pub struct KrylovRegistry<V: Vector> {
    inner: Registry<KrylovFactory<V>>,
}

fn richardson<V: Vector>() -> Box<dyn KrylovMethod<V>> {
    Box::new(Richardson::default())
}

fn tfqmr<V: Vector>() -> Box<dyn KrylovMethod<V>> {
    Box::new(Tfqmr::default())
}

fn qcg<V: Vector>() -> Box<dyn KrylovMethod<V>> {
    Box::new(Qcg::default())
}

impl<V: Vector> KrylovRegistry<V> {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            inner: Registry::new("Krylov method"),
        }
    }

    /// Registry with `richardson`, `tfqmr` and `qcg`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(Richardson::NAME, richardson::<V>)
            .register(Tfqmr::NAME, tfqmr::<V>)
            .register(Qcg::NAME, qcg::<V>);
        registry
    }

    /// Add or replace a method.
    pub fn register(&mut self, name: &str, factory: KrylovFactory<V>) -> &mut Self {
        self.inner.register(name, factory);
        self
    }

    /// Instantiate the method registered under `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn KrylovMethod<V>>, SolverError> {
        let factory = self.inner.get(name)?;
        Ok(factory())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.inner.names().collect()
    }
}

impl<V: Vector> Default for KrylovRegistry<V> {
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
        let registry = KrylovRegistry::<DenseVector>::with_defaults();
        assert_eq!(registry.names(), vec!["qcg", "richardson", "tfqmr"]);
        assert_eq!(registry.create("tfqmr").unwrap().name(), "tfqmr");
    }

    #[test]
    fn test_unknown_method() {
        let registry = KrylovRegistry::<DenseVector>::with_defaults();
        match registry.create("gmres") {
            Err(SolverError::UnknownType { name, .. }) => assert_eq!(name, "gmres"),
            Err(other) => panic!("Expected UnknownType, got {:?}", other),
            Ok(_) => panic!("gmres should not be registered"),
        }
    }
}
