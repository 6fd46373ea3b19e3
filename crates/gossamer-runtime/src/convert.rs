#![forbid(unsafe_code)]

//! Plug-in points for value conversion and collection generation.
//!
//! Every hook may answer [`Flow::DoNothing`] to skip the write in progress.
//! That is distinct from producing [`Value::Null`], which is written.

use std::rc::Rc;

use gossamer_core::{Locale, Result, Value, ValueKind};

use crate::endpoint::Endpoint;

/// Outcome of a getter or converter.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Write this value to the destination.
    Set(Value),
    /// Leave the destination untouched.
    DoNothing,
}

impl Flow {
    #[must_use]
    pub fn is_do_nothing(&self) -> bool {
        matches!(self, Self::DoNothing)
    }
}

impl From<Value> for Flow {
    fn from(value: Value) -> Self {
        Self::Set(value)
    }
}

/// Converts between source and target representations.
pub trait ValueConverter {
    /// Source to target. `target` is the destination's declared kind.
    fn convert(
        &self,
        value: &Value,
        target: ValueKind,
        parameter: &Value,
        culture: &Locale,
    ) -> Result<Flow>;

    /// Target to source.
    fn convert_back(
        &self,
        value: &Value,
        target: ValueKind,
        parameter: &Value,
        culture: &Locale,
    ) -> Result<Flow>;
}

/// Builds one target item for each source item of a collection binding.
pub trait DataGenerator {
    fn generate(&self, item: &Value, parameter: &Value) -> Result<Value>;
}

impl<F> DataGenerator for F
where
    F: Fn(&Value, &Value) -> Result<Value>,
{
    fn generate(&self, item: &Value, parameter: &Value) -> Result<Value> {
        self(item, parameter)
    }
}

/// Intercepts the mutations a collection binding applies to its target.
///
/// Without a handler the target must be a list.
pub trait CollectionHandler {
    fn insert(&self, target: &Value, index: usize, item: Value) -> Result<()>;
    fn remove_at(&self, target: &Value, index: usize) -> Result<()>;
    fn clear(&self, target: &Value) -> Result<()>;
}

/// Replaces the plain endpoint read for one direction.
pub type PropertyGetter = Rc<dyn Fn(&Endpoint) -> Result<Flow>>;

/// Replaces the converting endpoint write for one direction.
pub type PropertySetter = Rc<dyn Fn(&Endpoint, Value) -> Result<()>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_generators() {
        let double = |item: &Value, _: &Value| -> Result<Value> {
            Ok(Value::Int(item.as_int().unwrap_or(0) * 2))
        };
        assert_eq!(
            double.generate(&Value::Int(4), &Value::Null).unwrap(),
            Value::Int(8)
        );
    }

    #[test]
    fn flow_from_value_sets() {
        assert_eq!(Flow::from(Value::Null), Flow::Set(Value::Null));
        assert!(Flow::DoNothing.is_do_nothing());
    }
}
