//! Fixed-size task group
//!
//! A bounded set of named, scoped OS threads with an explicit await-all.
//! Tasks borrow from the enclosing [`std::thread::scope`], so shared state
//! (catalog, executor, aggregator) is passed by reference with no `Arc`.
//!
//! Submission never blocks and never drops work silently: a group at
//! capacity, or an OS refusal to start a thread, is a [`SchedulingError`].

use std::any::Any;
use std::thread::{self, Scope, ScopedJoinHandle};

use crate::error::SchedulingError;

/// How a task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Completed(T),
    Panicked(String),
}

/// Extract a readable message from a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub struct TaskGroup<'scope, 'env: 'scope, T> {
    scope: &'scope Scope<'scope, 'env>,
    name: String,
    capacity: usize,
    handles: Vec<ScopedJoinHandle<'scope, T>>,
}

impl<'scope, 'env: 'scope, T: Send + 'scope> TaskGroup<'scope, 'env, T> {
    pub fn new(scope: &'scope Scope<'scope, 'env>, name: impl Into<String>, capacity: usize) -> Self {
        Self {
            scope,
            name: name.into(),
            capacity,
            handles: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Check up front that `requested` more tasks fit
    pub fn reserve(&self, requested: usize) -> Result<(), SchedulingError> {
        let total = self.handles.len() + requested;
        if total > self.capacity {
            return Err(SchedulingError::Saturated {
                capacity: self.capacity,
                requested: total,
            });
        }
        Ok(())
    }

    /// Start a task; returns its index in the group
    pub fn spawn<F>(&mut self, f: F) -> Result<usize, SchedulingError>
    where
        F: FnOnce() -> T + Send + 'scope,
    {
        self.reserve(1)?;
        let index = self.handles.len();
        let task = format!("{}-{}", self.name, index);
        let handle = thread::Builder::new()
            .name(task.clone())
            .spawn_scoped(self.scope, f)
            .map_err(|e| SchedulingError::SpawnFailed {
                task,
                reason: e.to_string(),
            })?;
        self.handles.push(handle);
        Ok(index)
    }

    /// Wait for every task, in spawn order. Never returns early.
    pub fn join_all(self) -> Vec<TaskOutcome<T>> {
        self.handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(value) => TaskOutcome::Completed(value),
                Err(payload) => TaskOutcome::Panicked(panic_message(payload.as_ref())),
            })
            .collect()
    }
}
