//! Application ordering dispatch object.
//!
//! An [`ApplicationOrdering`] maps indices between the solver's native
//! numbering and the application's numbering. Negative entries are sentinels
//! and pass through both directions untouched. Translation validates the
//! whole buffer before writing, so an out-of-range entry leaves it unchanged.

use std::fmt;

use solver_core::{Lifecycle, Viewer};
use tracing::debug;

use crate::basic::BasicOrdering;
use crate::error::OrderingError;
use crate::index_set::IndexSet;

/// A concrete ordering.
pub trait OrderingMap: Send + Sync {
    /// Type name used in views.
    fn name(&self) -> &'static str;

    /// Number of elements; valid indices are `0..size`.
    fn size(&self) -> usize;

    /// Application index of native index `index < size`.
    fn native_to_application(&self, index: usize) -> i64;

    /// Native index of application index `index < size`.
    fn application_to_native(&self, index: usize) -> i64;

    /// Type-specific part of the view.
    fn view(&self, viewer: &mut Viewer<'_>) -> fmt::Result;
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    ToApplication,
    ToNative,
}

/// Polymorphic application ordering.
///
/// ```
/// use solver_ordering::ApplicationOrdering;
///
/// let ao = ApplicationOrdering::basic(&[3, 1, 0, 2], None).unwrap();
/// let mut indices = [0, -1, 3];
/// ao.native_to_application(&mut indices).unwrap();
/// assert_eq!(indices, [3, -1, 2]);
/// ao.application_to_native(&mut indices).unwrap();
/// assert_eq!(indices, [0, -1, 3]);
/// ```
pub struct ApplicationOrdering {
    map: Box<dyn OrderingMap>,
    lifecycle: Lifecycle,
}

impl ApplicationOrdering {
    /// Wrap a concrete ordering.
    pub fn new(map: Box<dyn OrderingMap>) -> Self {
        debug!(kind = map.name(), size = map.size(), "application ordering created");
        Self {
            map,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Basic ordering from parallel application and native tables.
    pub fn basic(application: &[i64], native: Option<&[i64]>) -> Result<Self, OrderingError> {
        Ok(Self::new(Box::new(BasicOrdering::new(application, native)?)))
    }

    /// Type name of the concrete ordering.
    pub fn kind(&self) -> &'static str {
        self.map.name()
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.map.size()
    }

    /// Translate native indices to application indices in place.
    pub fn native_to_application(&self, indices: &mut [i64]) -> Result<(), OrderingError> {
        self.translate(indices, Direction::ToApplication)
    }

    /// Translate application indices to native indices in place.
    pub fn application_to_native(&self, indices: &mut [i64]) -> Result<(), OrderingError> {
        self.translate(indices, Direction::ToNative)
    }

    /// Translate a native index set to application numbering.
    ///
    /// Stride sets are rewritten in general form first; block sets are rejected.
    pub fn native_to_application_is(&self, is: &mut IndexSet) -> Result<(), OrderingError> {
        self.translate_is(is, Direction::ToApplication)
    }

    /// Translate an application index set to native numbering.
    pub fn application_to_native_is(&self, is: &mut IndexSet) -> Result<(), OrderingError> {
        self.translate_is(is, Direction::ToNative)
    }

    fn translate_is(&self, is: &mut IndexSet, direction: Direction) -> Result<(), OrderingError> {
        self.lifecycle.ensure_alive()?;
        if is.is_block() {
            return Err(OrderingError::BlockIndexSet);
        }
        is.to_general();
        match is.as_general_mut() {
            Some(indices) => self.translate(indices, direction),
            None => Err(OrderingError::BlockIndexSet),
        }
    }

    fn translate(&self, indices: &mut [i64], direction: Direction) -> Result<(), OrderingError> {
        self.lifecycle.ensure_alive()?;
        let size = self.map.size();
        if let Some(&index) = indices.iter().find(|&&i| i >= 0 && i as usize >= size) {
            return Err(OrderingError::OutOfRange { index, size });
        }
        for index in indices.iter_mut().filter(|i| **i >= 0) {
            let at = *index as usize;
            *index = match direction {
                Direction::ToApplication => self.map.native_to_application(at),
                Direction::ToNative => self.map.application_to_native(at),
            };
        }
        Ok(())
    }

    /// Write a textual description to `sink`.
    pub fn view(&self, sink: &mut dyn fmt::Write) -> fmt::Result {
        let mut viewer = Viewer::new(sink);
        viewer.line(format_args!("Application Ordering Object: type={}", self.map.name()))?;
        viewer.indented(|v| self.map.view(v))
    }

    /// Add a reference to this handle.
    pub fn reference(&mut self) -> Result<usize, OrderingError> {
        Ok(self.lifecycle.reference()?)
    }

    /// Drop a reference; returns `true` when this call released the ordering.
    pub fn destroy(&mut self) -> bool {
        let released = self.lifecycle.destroy();
        if released {
            debug!(kind = self.map.name(), "application ordering destroyed");
        }
        released
    }

    /// `false` once the last reference has been destroyed.
    pub fn is_alive(&self) -> bool {
        self.lifecycle.is_alive()
    }
}

impl fmt::Debug for ApplicationOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationOrdering")
            .field("kind", &self.map.name())
            .field("size", &self.map.size())
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}
