//! Deferred definitions waiting on modules that do not exist yet

use indexmap::{IndexMap, IndexSet};

use super::linker::Definition;

/// A definition to retry once its blocker is published
#[derive(Clone)]
pub struct Thunk {
    /// The blocked definition
    pub definition: Definition,
    /// Whether the retry replaces an existing module
    pub overwrite: bool,
}

/// Future module name → blocked dependents, in registration order
///
/// A reverse index from dependent to futures keeps `forget` independent of the
/// number of blocked futures.
#[derive(Default)]
pub struct PendingTable {
    buckets: IndexMap<String, IndexMap<String, Thunk>>,
    waiting: IndexMap<String, IndexSet<String>>,
}

impl PendingTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `thunk` to run when `future` is published
    ///
    /// A dependent appears at most once per future; registering again replaces
    /// the earlier thunk.
    pub fn register(&mut self, future: &str, thunk: Thunk) {
        let dependent = thunk.definition.name.clone();
        self.waiting
            .entry(dependent.clone())
            .or_default()
            .insert(future.to_string());
        self.buckets
            .entry(future.to_string())
            .or_default()
            .insert(dependent, thunk);
    }

    /// Remove and return every thunk blocked on `future`
    pub fn take(&mut self, future: &str) -> Vec<Thunk> {
        let Some(bucket) = self.buckets.swap_remove(future) else {
            return Vec::new();
        };
        for dependent in bucket.keys() {
            self.unlink(dependent, future);
        }
        bucket.into_values().collect()
    }

    /// Drop `dependent` from every bucket, removing buckets left empty
    pub fn forget(&mut self, dependent: &str) {
        let Some(futures) = self.waiting.swap_remove(dependent) else {
            return;
        };
        for future in &futures {
            if let Some(bucket) = self.buckets.get_mut(future) {
                bucket.shift_remove(dependent);
                if bucket.is_empty() {
                    self.buckets.swap_remove(future);
                }
            }
        }
    }

    fn unlink(&mut self, dependent: &str, future: &str) {
        if let Some(futures) = self.waiting.get_mut(dependent) {
            futures.shift_remove(future);
            if futures.is_empty() {
                self.waiting.swap_remove(dependent);
            }
        }
    }

    /// Dependents blocked on `future`
    pub fn dependents(&self, future: &str) -> Vec<&str> {
        self.buckets
            .get(future)
            .map(|bucket| bucket.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Futures `dependent` is waiting on, in registration order
    pub fn waiting_on(&self, dependent: &str) -> Vec<&str> {
        self.waiting
            .get(dependent)
            .map(|futures| futures.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Number of futures with blocked dependents
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether nothing is blocked
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
