//! Store Implementation
//!
//! A Store wraps a plain keyed record and intercepts field access.
//!
//! # How Stores Work
//!
//! 1. Reading a field inside a running computation registers that
//!    computation in the field's dependency set.
//!
//! 2. Writing a field performs the write, then re-runs every computation in
//!    the field's dependency set, in registration order, before returning.
//!
//! 3. Reads outside any computation are plain reads and record nothing.
//!
//! # Dependency Index
//!
//! Each store owns its dependency index (field key to dependency set), so
//! the index lives exactly as long as the store. Dependency sets hold weak
//! references: a store never keeps a computation alive.
//!
//! # Thread Safety
//!
//! The record and the index sit behind `parking_lot` locks. Neither lock is
//! held while a computation runs, so computations are free to read and
//! write the same store.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use smallvec::SmallVec;

use super::computation::{ComputationId, ComputationInner};
use super::context::{ReactiveContext, Source};
use super::runtime;
use crate::error::ReactiveError;

/// Largest gap a single write may open past the end of a sequence store.
/// Writes further out are rejected rather than padded.
pub const MAX_SEQUENCE_PADDING: usize = 1 << 16;

/// Unique identity of a store. Two stores over identical data differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreId(u64);

impl StoreId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A field key: a name for records, a position for sequences.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(String),
    Index(usize),
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
        }
    }
}

/// The raw data a store wraps.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Map(Map<String, Value>),
    Seq(Vec<Value>),
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Record::Map(map)
    }
}

impl From<Vec<Value>> for Record {
    fn from(seq: Vec<Value>) -> Self {
        Record::Seq(seq)
    }
}

impl TryFrom<Value> for Record {
    /// Scalars (including null) are handed back unchanged.
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Record::Map(map)),
            Value::Array(seq) => Ok(Record::Seq(seq)),
            scalar => Err(scalar),
        }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        match record {
            Record::Map(map) => Value::Object(map),
            Record::Seq(seq) => Value::Array(seq),
        }
    }
}

impl Record {
    /// Normalize a key to this record's addressing scheme.
    fn normalize(&self, key: Key) -> Option<Key> {
        match (self, key) {
            (Record::Map(_), Key::Index(index)) => Some(Key::Name(index.to_string())),
            (Record::Map(_), key) => Some(key),
            (Record::Seq(_), Key::Name(name)) => name.parse().ok().map(Key::Index),
            (Record::Seq(_), key) => Some(key),
        }
    }

    fn get(&self, key: &Key) -> Option<&Value> {
        match (self, key) {
            (Record::Map(map), Key::Name(name)) => map.get(name),
            (Record::Seq(seq), Key::Index(index)) => seq.get(*index),
            _ => None,
        }
    }

    fn set(&mut self, key: &Key, value: Value) -> Result<(), ReactiveError> {
        match (self, key) {
            (Record::Map(map), Key::Name(name)) => {
                map.insert(name.clone(), value);
            }
            (Record::Seq(seq), &Key::Index(index)) => {
                if index >= seq.len() {
                    if index - seq.len() > MAX_SEQUENCE_PADDING {
                        return Err(ReactiveError::IndexOutOfRange {
                            index,
                            len: seq.len(),
                        });
                    }
                    seq.resize(index + 1, Value::Null);
                }
                seq[index] = value;
            }
            _ => {}
        }
        Ok(())
    }

    fn len(&self) -> usize {
        match self {
            Record::Map(map) => map.len(),
            Record::Seq(seq) => seq.len(),
        }
    }
}

/// Computations subscribed to one field, in registration order.
#[derive(Default)]
pub(crate) struct DependencySet {
    subscribers: IndexMap<ComputationId, Weak<ComputationInner>>,
}

impl DependencySet {
    /// Register a computation. Re-registering is a no-op.
    fn insert(&mut self, id: ComputationId, computation: Weak<ComputationInner>) -> bool {
        if self.subscribers.contains_key(&id) {
            return false;
        }
        self.subscribers.insert(id, computation);
        true
    }

    fn remove(&mut self, id: ComputationId) {
        self.subscribers.shift_remove(&id);
    }

    fn live(&mut self) -> SmallVec<[Arc<ComputationInner>; 4]> {
        self.subscribers.retain(|_, weak| weak.strong_count() > 0);
        self.subscribers
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    fn len(&self) -> usize {
        self.subscribers.len()
    }

    fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

pub(crate) struct StoreInner {
    id: StoreId,
    record: RwLock<Record>,
    dependencies: Mutex<HashMap<Key, DependencySet>>,
}

impl StoreInner {
    fn subscribe(&self, key: &Key, id: ComputationId, computation: Weak<ComputationInner>) {
        let mut dependencies = self.dependencies.lock();
        if dependencies
            .entry(key.clone())
            .or_default()
            .insert(id, computation)
        {
            tracing::trace!(store = ?self.id, %key, computation = ?id, "subscribed");
        }
    }

    pub(crate) fn unsubscribe(&self, key: &Key, id: ComputationId) {
        let mut dependencies = self.dependencies.lock();
        if let Some(set) = dependencies.get_mut(key) {
            set.remove(id);
            if set.is_empty() {
                dependencies.remove(key);
            }
            tracing::trace!(store = ?self.id, %key, computation = ?id, "unsubscribed");
        }
    }
}

/// A reactive keyed record.
///
/// Cloning a `Store` yields another handle to the same record; both handles
/// share identity and dependencies.
///
/// # Example
///
/// ```rust,ignore
/// let state = Store::wrap(json!({ "count": 0 }).as_object().cloned().unwrap());
///
/// let effect = run_tracked({
///     let state = state.clone();
///     move || {
///         println!("count = {:?}", state.get("count"));
///         Ok(())
///     }
/// })?;
///
/// state.set("count", json!(1))?; // prints "count = Some(Number(1))"
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Wrap a raw record so field access is tracked.
    pub fn wrap(raw: impl Into<Record>) -> Self {
        let inner = Arc::new(StoreInner {
            id: StoreId::new(),
            record: RwLock::new(raw.into()),
            dependencies: Mutex::new(HashMap::new()),
        });
        tracing::trace!(store = ?inner.id, "wrapped record");
        Self { inner }
    }

    /// Wrap a JSON value. Scalars are returned unchanged as the error.
    pub fn from_value(value: Value) -> Result<Self, Value> {
        Record::try_from(value).map(Self::wrap)
    }

    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    /// Read a field.
    ///
    /// Inside a running computation, the computation is registered as a
    /// dependent of this field. Returns `None` for fields that do not exist.
    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        let key = self.inner.record.read().normalize(key.into())?;

        if let Some((id, computation)) = ReactiveContext::current() {
            self.inner.subscribe(&key, id, computation);
            ReactiveContext::track(Source {
                store_id: self.inner.id,
                store: Arc::downgrade(&self.inner),
                key: key.clone(),
            });
        } else {
            tracing::trace!(store = ?self.inner.id, %key, "untracked read");
        }

        self.inner.record.read().get(&key).cloned()
    }

    /// Read a field without registering a dependency.
    pub fn get_untracked(&self, key: impl Into<Key>) -> Option<Value> {
        let record = self.inner.record.read();
        let key = record.normalize(key.into())?;
        record.get(&key).cloned()
    }

    /// Write a field and re-run every computation that depends on it.
    ///
    /// Writing past the end of a sequence pads it with `null`, up to
    /// [`MAX_SEQUENCE_PADDING`] new slots.
    ///
    /// Dependents run synchronously before this returns. The first error
    /// raised by a dependent (or by anything it triggers in turn) is
    /// returned here; remaining dependents of this write are not run.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), ReactiveError> {
        let key = {
            let mut record = self.inner.record.write();
            let Some(key) = record.normalize(key.into()) else {
                tracing::warn!(store = ?self.inner.id, "ignoring named write to a sequence store");
                return Ok(());
            };
            record.set(&key, value.into())?;
            key
        };

        self.notify(&key)
    }

    /// Update a field using its current (untracked) value.
    pub fn update<F>(&self, key: impl Into<Key>, f: F) -> Result<(), ReactiveError>
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let key = key.into();
        let current = self.get_untracked(key.clone());
        self.set(key, f(current.as_ref()))
    }

    fn notify(&self, key: &Key) -> Result<(), ReactiveError> {
        let dependents = {
            let mut dependencies = self.inner.dependencies.lock();
            let Some(set) = dependencies.get_mut(key) else {
                return Ok(());
            };
            let live = set.live();
            if set.is_empty() {
                dependencies.remove(key);
            }
            live
        };

        tracing::trace!(
            store = ?self.inner.id,
            %key,
            dependents = dependents.len(),
            "notifying"
        );
        runtime::notify(&dependents)
    }

    /// Number of computations registered on a field.
    pub fn dependent_count(&self, key: impl Into<Key>) -> usize {
        let Some(key) = self.inner.record.read().normalize(key.into()) else {
            return 0;
        };
        self.inner
            .dependencies
            .lock()
            .get(&key)
            .map_or(0, DependencySet::len)
    }

    /// Number of fields in the record.
    pub fn len(&self) -> usize {
        self.inner.record.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Untracked copy of the whole record.
    pub fn snapshot(&self) -> Value {
        self.inner.record.read().clone().into()
    }
}

impl PartialEq for Store {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Store {}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("record", &*self.inner.record.read())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
