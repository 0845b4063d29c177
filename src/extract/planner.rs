//! Extraction planner
//!
//! Combines the selection container and the row budget into a single
//! decision per listed object. The planner is driven by one writer in
//! listing order; head/tail semantics are relative to that order.

use crate::backend::ListedObject;

use super::container::{self, Container};
use super::policy::{ExtractPolicy, PlannedObject};
use super::rows::RowPlanner;

pub struct ExtractionPlanner {
    policy: ExtractPolicy,
    selection: Box<dyn Container<PlannedObject>>,
    rows: RowPlanner,
    offered: usize,
    accepted: usize,
}

impl ExtractionPlanner {
    pub fn new(policy: ExtractPolicy) -> Self {
        Self {
            policy,
            selection: container::for_policy(&policy),
            rows: RowPlanner::for_policy(&policy),
            offered: 0,
            accepted: 0,
        }
    }

    pub fn policy(&self) -> &ExtractPolicy {
        &self.policy
    }

    /// Offer the next listed object
    ///
    /// Returns `false` once the plan is complete; the caller should stop
    /// listing. A `false` from a tail container that is not yet complete
    /// only means the object was dropped.
    pub fn add(&mut self, object: ListedObject) -> bool {
        if self.done() {
            return false;
        }
        self.offered += 1;

        let plan = self.rows.plan_file(&object);
        tracing::trace!(key = %object.key, size = object.size, %plan, "Planning object");

        let accepted = self.selection.add(PlannedObject::new(object, plan));
        if accepted {
            self.accepted += 1;
        }
        accepted
    }

    /// Whether further objects can no longer change the plan
    pub fn done(&self) -> bool {
        self.selection.full() || self.rows.done()
    }

    /// Number of objects offered while the plan was still open
    pub fn offered(&self) -> usize {
        self.offered
    }

    /// Number of objects the container accepted, including later evictions
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// Current plan in arrival order
    ///
    /// Only final once the listing is exhausted or [`done`](Self::done) holds.
    pub fn items(&self) -> Vec<PlannedObject> {
        self.rows.finalize(self.selection.items())
    }

    /// Consume the planner, returning the finalized plan
    pub fn into_items(self) -> Vec<PlannedObject> {
        self.rows.finalize(self.selection.into_items())
    }
}
