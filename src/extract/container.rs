//! Selection containers
//!
//! Decide which of an insertion-ordered stream of items survive a file
//! strategy. All variants keep retained items in arrival order.

use std::collections::VecDeque;

use super::policy::{ExtractPolicy, Strategy};

/// Shared interface of the selection variants
pub trait Container<T>: Send {
    /// Offer an item; returns whether it was accepted
    fn add(&mut self, item: T) -> bool;

    /// Whether the container will reject every further item
    fn full(&self) -> bool;

    /// Number of retained items
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retained items in arrival order
    fn items(&self) -> Vec<T>;

    /// Consume the container, returning retained items in arrival order
    fn into_items(self: Box<Self>) -> Vec<T>;
}

/// Keeps every item
#[derive(Debug)]
pub struct Unbounded<T> {
    items: Vec<T>,
}

impl<T> Unbounded<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Default for Unbounded<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send> Container<T> for Unbounded<T> {
    fn add(&mut self, item: T) -> bool {
        self.items.push(item);
        true
    }

    fn full(&self) -> bool {
        false
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn items(&self) -> Vec<T> {
        self.items.clone()
    }

    fn into_items(self: Box<Self>) -> Vec<T> {
        self.items
    }
}

/// Keeps the first `capacity` items and rejects the rest
#[derive(Debug)]
pub struct Bounded<T> {
    capacity: usize,
    items: Vec<T>,
}

impl<T> Bounded<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity.min(1024)),
        }
    }
}

impl<T: Clone + Send> Container<T> for Bounded<T> {
    fn add(&mut self, item: T) -> bool {
        if self.full() {
            return false;
        }
        self.items.push(item);
        true
    }

    fn full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn items(&self) -> Vec<T> {
        self.items.clone()
    }

    fn into_items(self: Box<Self>) -> Vec<T> {
        self.items
    }
}

/// Keeps the last `capacity` items, evicting the oldest
///
/// Only a zero capacity reports full: otherwise the end of the stream alone
/// tells which items are last.
#[derive(Debug)]
pub struct Fifo<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> Fifo<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity.min(1024)),
        }
    }
}

impl<T: Clone + Send> Container<T> for Fifo<T> {
    fn add(&mut self, item: T) -> bool {
        if self.capacity == 0 {
            return false;
        }
        self.items.push_back(item);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
        true
    }

    fn full(&self) -> bool {
        self.capacity == 0
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn items(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    fn into_items(self: Box<Self>) -> Vec<T> {
        self.items.into()
    }
}

/// Pick the container for a policy's file strategy
///
/// A non-positive limit keeps nothing.
pub fn for_policy<T: Clone + Send + 'static>(policy: &ExtractPolicy) -> Box<dyn Container<T>> {
    let capacity = usize::try_from(policy.files_limit).unwrap_or(0);
    match policy.files_strategy {
        Strategy::Head => Box::new(Bounded::new(capacity)),
        Strategy::Tail => Box::new(Fifo::new(capacity)),
        Strategy::None => Box::new(Unbounded::new()),
    }
}
