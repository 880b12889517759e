//! Handle registry and draw log shared by an options scope.

use std::any::{Any, type_name};
use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::errors::{GenerationError, Result};
use crate::strategy::Strategy;

static NEXT_SCOPE: AtomicU64 = AtomicU64::new(1);

/// Opaque reference to a strategy registered in one scope.
pub struct Handle<T> {
    index: usize,
    scope: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.scope == other.scope
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle(#{} in scope {})", self.index, self.scope)
    }
}

struct Entry {
    /// `Rc<dyn Strategy<Value = T>>` for the entry's value type.
    strategy: Box<dyn Any>,
    identity: usize,
    label: &'static str,
    values: Vec<Box<dyn Any>>,
    rendered: Vec<String>,
}

struct State {
    scope: u64,
    entries: Vec<Entry>,
    /// Entry indices created by each factory, in call order.
    factories: Vec<Vec<usize>>,
}

/// Shared registry of handles plus the log of every value drawn through
/// them. Clones share state.
#[derive(Clone)]
pub struct Recorder {
    state: Rc<RefCell<State>>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Recorder")
            .field("scope", &state.scope)
            .field("entries", &state.entries.len())
            .finish()
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                scope: NEXT_SCOPE.fetch_add(1, Ordering::Relaxed),
                entries: Vec::new(),
                factories: Vec::new(),
            })),
        }
    }

    pub fn scope(&self) -> u64 {
        self.state.borrow().scope
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn insert<T: 'static>(&self, strategy: Rc<dyn Strategy<Value = T>>) -> Handle<T> {
        let identity = Rc::as_ptr(&strategy).cast::<()>() as usize;
        let mut state = self.state.borrow_mut();
        let index = state.entries.len();
        state.entries.push(Entry {
            strategy: Box::new(strategy),
            identity,
            label: type_name::<T>(),
            values: Vec::new(),
            rendered: Vec::new(),
        });
        Handle {
            index,
            scope: state.scope,
            _marker: PhantomData,
        }
    }

    /// Register `strategy`, reusing the existing handle when the same
    /// allocation is already registered.
    pub(crate) fn insert_shared<T: 'static>(
        &self,
        strategy: Rc<dyn Strategy<Value = T>>,
    ) -> Handle<T> {
        let identity = Rc::as_ptr(&strategy).cast::<()>() as usize;
        let existing = {
            let state = self.state.borrow();
            state.entries.iter().position(|entry| {
                entry.identity == identity
                    && entry.strategy.is::<Rc<dyn Strategy<Value = T>>>()
            })
        };
        match existing {
            Some(index) => Handle {
                index,
                scope: self.scope(),
                _marker: PhantomData,
            },
            None => self.insert(strategy),
        }
    }

    pub(crate) fn strategy<T: 'static>(
        &self,
        handle: &Handle<T>,
    ) -> Result<Rc<dyn Strategy<Value = T>>> {
        let state = self.state.borrow();
        if handle.scope != state.scope {
            return Err(GenerationError::UnregisteredHandle(format!(
                "handle #{} belongs to scope {}, not {}",
                handle.index, handle.scope, state.scope
            )));
        }
        state
            .entries
            .get(handle.index)
            .and_then(|entry| entry.strategy.downcast_ref::<Rc<dyn Strategy<Value = T>>>())
            .cloned()
            .ok_or_else(|| {
                GenerationError::UnregisteredHandle(format!(
                    "handle #{} is not registered in scope {}",
                    handle.index, state.scope
                ))
            })
    }

    pub(crate) fn log<T: Clone + Debug + 'static>(&self, handle: &Handle<T>, value: &T) {
        let mut state = self.state.borrow_mut();
        if let Some(entry) = state.entries.get_mut(handle.index) {
            entry.values.push(Box::new(value.clone()));
            entry.rendered.push(format!("{value:?}"));
        }
    }

    /// Every value drawn through `handle` since the last reset.
    pub fn drawn<T: Clone + 'static>(&self, handle: &Handle<T>) -> Result<Vec<T>> {
        self.strategy(handle)?;
        let state = self.state.borrow();
        Ok(state
            .entries
            .get(handle.index)
            .map(|entry| {
                entry
                    .values
                    .iter()
                    .filter_map(|value| value.downcast_ref::<T>().cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Clear every log and forget factory calls. Idempotent.
    pub fn reset(&self) {
        let mut state = self.state.borrow_mut();
        for entry in &mut state.entries {
            entry.values.clear();
            entry.rendered.clear();
        }
        for calls in &mut state.factories {
            calls.clear();
        }
    }

    pub fn snapshot(&self) -> DrawRecord {
        let state = self.state.borrow();
        DrawRecord {
            entries: state
                .entries
                .iter()
                .enumerate()
                .map(|(handle, entry)| RecordEntry {
                    handle,
                    label: entry.label.to_string(),
                    draws: entry.rendered.clone(),
                })
                .collect(),
        }
    }

    fn new_factory(&self) -> usize {
        let mut state = self.state.borrow_mut();
        state.factories.push(Vec::new());
        state.factories.len() - 1
    }

    fn attach(&self, factory: usize, entry: usize) {
        if let Some(calls) = self.state.borrow_mut().factories.get_mut(factory) {
            calls.push(entry);
        }
    }

    fn factory_entries(&self, factory: usize) -> Vec<usize> {
        self.state
            .borrow()
            .factories
            .get(factory)
            .cloned()
            .unwrap_or_default()
    }
}

type Factory<A, T> = Rc<dyn Fn(A) -> Rc<dyn Strategy<Value = T>>>;

/// Registered strategy factory. Every call registers a fresh handle; the
/// factory's log is the concatenation of its calls' logs.
pub struct FactoryHandle<A, T> {
    recorder: Recorder,
    group: usize,
    factory: Factory<A, T>,
}

impl<A, T> Clone for FactoryHandle<A, T> {
    fn clone(&self) -> Self {
        Self {
            recorder: self.recorder.clone(),
            group: self.group,
            factory: Rc::clone(&self.factory),
        }
    }
}

impl<A, T: 'static> FactoryHandle<A, T> {
    pub(crate) fn new(recorder: Recorder, factory: Factory<A, T>) -> Self {
        let group = recorder.new_factory();
        Self {
            recorder,
            group,
            factory,
        }
    }

    /// Build a strategy from `arg` and register it under a fresh handle.
    pub fn call(&self, arg: A) -> Handle<T> {
        let handle = self.recorder.insert((self.factory)(arg));
        self.recorder.attach(self.group, handle.index);
        handle
    }

    /// Calls since the last reset.
    pub fn calls(&self) -> usize {
        self.recorder.factory_entries(self.group).len()
    }

    /// Values drawn through every call since the last reset, in call order.
    pub fn drawn(&self) -> Vec<T>
    where
        T: Clone,
    {
        let scope = self.recorder.scope();
        self.recorder
            .factory_entries(self.group)
            .into_iter()
            .flat_map(|index| {
                let handle = Handle::<T> {
                    index,
                    scope,
                    _marker: PhantomData,
                };
                self.recorder.drawn(&handle).unwrap_or_default()
            })
            .collect()
    }
}

/// Snapshot of every handle's draw log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrawRecord {
    pub entries: Vec<RecordEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordEntry {
    pub handle: usize,
    /// Value type drawn through the handle.
    pub label: String,
    /// `Debug` rendering of each draw, in order.
    pub draws: Vec<String>,
}

impl DrawRecord {
    pub fn total_draws(&self) -> usize {
        self.entries.iter().map(|entry| entry.draws.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_draws() == 0
    }

    pub fn draws<T>(&self, handle: &Handle<T>) -> &[String] {
        self.entries
            .get(handle.index)
            .map(|entry| entry.draws.as_slice())
            .unwrap_or_default()
    }
}
