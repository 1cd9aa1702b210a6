//! Backing models for components.
//!
//! A component either owns its value (`ModelRef::Local`, versioned with the
//! page) or is bound to a shared model that outlives the page. Shared models
//! carry a generation counter; a page rendered against an older generation is
//! stale.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use weft_model::Value;

pub type SharedCollection = Arc<Mutex<Vec<Value>>>;

pub trait Model: Send + Sync + fmt::Debug {
    fn get(&self) -> Option<Value>;

    fn set(&self, value: Option<Value>);

    /// The live collection behind a multi-valued model, if it has one.
    ///
    /// Multi-select updates mutate this collection in place, so every call
    /// must hand out the same instance.
    fn collection(&self) -> Option<SharedCollection> {
        None
    }

    /// Incremented on every change.
    fn generation(&self) -> u64;

    /// Record a change made in place through [`Model::collection`].
    fn touch(&self) {}
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct SharedValue {
    value: Mutex<Option<Value>>,
    generation: AtomicU64,
}

impl SharedValue {
    pub fn new(value: Option<Value>) -> Arc<Self> {
        Arc::new(Self {
            value: Mutex::new(value),
            generation: AtomicU64::new(0),
        })
    }
}

impl Model for SharedValue {
    fn get(&self) -> Option<Value> {
        lock(&self.value).clone()
    }

    fn set(&self, value: Option<Value>) {
        *lock(&self.value) = value;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// A shared list whose backing `Vec` is never replaced.
#[derive(Debug, Default)]
pub struct SharedList {
    items: SharedCollection,
    generation: AtomicU64,
}

impl SharedList {
    pub fn new(items: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            items: Arc::new(Mutex::new(items)),
            generation: AtomicU64::new(0),
        })
    }

    pub fn items(&self) -> Vec<Value> {
        lock(&self.items).clone()
    }
}

impl Model for SharedList {
    fn get(&self) -> Option<Value> {
        Some(Value::List(self.items()))
    }

    fn set(&self, value: Option<Value>) {
        let items = match value {
            Some(Value::List(items)) => items,
            Some(other) => vec![other],
            None => Vec::new(),
        };
        *lock(&self.items) = items;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn collection(&self) -> Option<SharedCollection> {
        Some(Arc::clone(&self.items))
    }

    fn touch(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Model binding of a component.
#[derive(Debug, Clone)]
pub enum ModelRef {
    Local(Option<Value>),
    Shared(Arc<dyn Model>),
}

impl Default for ModelRef {
    fn default() -> Self {
        Self::Local(None)
    }
}

impl ModelRef {
    pub fn local(value: Value) -> Self {
        Self::Local(Some(value))
    }

    pub fn shared(model: Arc<dyn Model>) -> Self {
        Self::Shared(model)
    }

    pub fn get(&self) -> Option<Value> {
        match self {
            Self::Local(value) => value.clone(),
            Self::Shared(model) => model.get(),
        }
    }

    pub fn generation(&self) -> Option<u64> {
        match self {
            Self::Local(_) => None,
            Self::Shared(model) => Some(model.generation()),
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared(_))
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => write!(f, "{value}"),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_value_bumps_generation() {
        let model = SharedValue::new(None);
        assert_eq!(model.generation(), 0);
        model.set(Some(Value::text("x")));
        model.set(Some(Value::text("y")));
        assert_eq!(model.generation(), 2);
        assert_eq!(model.get(), Some(Value::text("y")));
    }

    #[test]
    fn shared_list_keeps_collection_instance() {
        let list = SharedList::new(vec![Value::Integer(1)]);
        let first = list.collection().unwrap();
        list.set(Some(Value::List(vec![Value::Integer(2), Value::Integer(3)])));
        let second = list.collection().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(lock(&first).len(), 2);
    }
}
