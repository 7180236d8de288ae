//! Boxed values.
//!
//! [`box_scalar`] makes any JSON value reactive. Records and sequences are
//! wrapped as a [`Store`]; scalars live in a one-field holder whose `value`
//! field is tracked exactly like a store field.

use serde_json::{Map, Value};

use super::store::{Record, Store};
use crate::error::ReactiveError;

const VALUE_FIELD: &str = "value";

/// Result of [`box_scalar`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ref {
    /// A record or sequence, reactive through its own fields.
    Reactive(Store),
    /// A scalar (or null) held in a tracked `value` field.
    Scalar(ScalarRef),
}

impl Ref {
    pub fn as_store(&self) -> Option<&Store> {
        match self {
            Ref::Reactive(store) => Some(store),
            Ref::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarRef> {
        match self {
            Ref::Reactive(_) => None,
            Ref::Scalar(scalar) => Some(scalar),
        }
    }
}

/// A single tracked value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarRef {
    store: Store,
}

impl ScalarRef {
    fn new(value: Value) -> Self {
        let mut holder = Map::new();
        holder.insert(VALUE_FIELD.to_string(), value);
        Self {
            store: Store::wrap(holder),
        }
    }

    /// Read the value, registering a dependency inside a computation.
    pub fn get(&self) -> Value {
        self.store.get(VALUE_FIELD).unwrap_or(Value::Null)
    }

    pub fn get_untracked(&self) -> Value {
        self.store.get_untracked(VALUE_FIELD).unwrap_or(Value::Null)
    }

    /// Replace the value and re-run dependents.
    pub fn set(&self, value: impl Into<Value>) -> Result<(), ReactiveError> {
        self.store.set(VALUE_FIELD, value)
    }

    pub fn dependent_count(&self) -> usize {
        self.store.dependent_count(VALUE_FIELD)
    }
}

/// Box a value so it can be observed.
pub fn box_scalar(value: impl Into<Value>) -> Ref {
    match Record::try_from(value.into()) {
        Ok(record) => Ref::Reactive(Store::wrap(record)),
        Err(scalar) => Ref::Scalar(ScalarRef::new(scalar)),
    }
}
