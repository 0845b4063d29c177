//! Row budget planning
//!
//! Decides how many bytes to take from each accepted object, and from which
//! end. The budget is either reset for every object or shared by the whole
//! run, depending on whether a file strategy is active.

use crate::backend::ListedObject;

use super::policy::{ExtractPolicy, FetchPlan, PlannedObject, Strategy};

/// Byte budget state for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowPlanner {
    /// Every object is fetched whole
    NoLimit,

    /// `limit` bytes from the chosen end of every object
    PerObject { strategy: Strategy, limit: u64 },

    /// Leading bytes of the concatenated objects, up to `limit` in total
    GlobalHead { limit: u64, consumed: u64 },

    /// Trailing bytes of the concatenated objects, up to `limit` in total
    ///
    /// Which objects contribute is only known once the listing ends, so
    /// objects are planned whole and trimmed in [`RowPlanner::finalize`].
    /// Only a zero budget is done before the listing ends.
    GlobalTail { limit: u64 },
}

impl RowPlanner {
    /// Pick the budget variant for a policy
    ///
    /// A non-positive byte limit selects nothing.
    pub fn for_policy(policy: &ExtractPolicy) -> Self {
        let limit = u64::try_from(policy.rows_limit_bytes).unwrap_or(0);
        match (policy.rows_strategy, policy.has_global_row_limit()) {
            (Strategy::None, _) => RowPlanner::NoLimit,
            (strategy, false) => RowPlanner::PerObject { strategy, limit },
            (Strategy::Head, true) => RowPlanner::GlobalHead { limit, consumed: 0 },
            (Strategy::Tail, true) => RowPlanner::GlobalTail { limit },
        }
    }

    /// Plan the bytes to fetch from `object`
    pub fn plan_file(&mut self, object: &ListedObject) -> FetchPlan {
        let size = object.size;
        match self {
            RowPlanner::NoLimit | RowPlanner::GlobalTail { .. } => FetchPlan::Full,
            RowPlanner::PerObject {
                strategy: Strategy::Tail,
                limit,
            } => FetchPlan::tail(size, *limit),
            RowPlanner::PerObject { limit, .. } => FetchPlan::head(size, *limit),
            RowPlanner::GlobalHead { limit, consumed } => {
                let remaining = limit.saturating_sub(*consumed);
                let plan = FetchPlan::head(size, remaining);
                *consumed += plan.length(size);
                plan
            }
        }
    }

    /// Whether the budget is spent and no further object can contribute
    ///
    /// A zero budget is done from the start, whichever end and scope it has.
    pub fn done(&self) -> bool {
        match self {
            RowPlanner::NoLimit => false,
            RowPlanner::GlobalHead { limit, consumed } => consumed >= limit,
            RowPlanner::PerObject { limit, .. } | RowPlanner::GlobalTail { limit } => *limit == 0,
        }
    }

    /// Bytes handed out so far; only the global head budget tracks this
    pub fn consumed(&self) -> u64 {
        match self {
            RowPlanner::GlobalHead { consumed, .. } => *consumed,
            _ => 0,
        }
    }

    /// Adjust the selected objects once the listing has ended
    ///
    /// For a global tail budget this keeps the shortest suffix of `items`
    /// covering `limit` bytes and trims its first object to the bytes that
    /// fall inside the budget. Other variants return `items` untouched.
    pub fn finalize(&self, items: Vec<PlannedObject>) -> Vec<PlannedObject> {
        let limit = match self {
            RowPlanner::GlobalTail { limit } => *limit,
            _ => return items,
        };

        let mut remaining = limit;
        let mut kept = Vec::new();
        for item in items.into_iter().rev() {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(item.object.size);
            remaining -= take;
            let plan = FetchPlan::tail(item.object.size, take);
            kept.push(PlannedObject::new(item.object, plan));
        }
        kept.reverse();
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ByteRange;

    fn obj(key: &str, size: u64) -> ListedObject {
        ListedObject::new(key, size)
    }

    fn planned(planner: &mut RowPlanner, objects: &[ListedObject]) -> Vec<PlannedObject> {
        objects
            .iter()
            .map(|o| PlannedObject::new(o.clone(), planner.plan_file(o)))
            .collect()
    }

    #[test]
    fn test_no_limit() {
        let mut rows = RowPlanner::for_policy(&ExtractPolicy::unlimited());
        assert_eq!(rows.plan_file(&obj("a", 500)), FetchPlan::Full);
        assert!(!rows.done());
    }

    #[test]
    fn test_per_object_head_and_tail() {
        let head = ExtractPolicy::unlimited().head_files(10).head_bytes(64);
        let mut rows = RowPlanner::for_policy(&head);
        assert_eq!(
            rows.plan_file(&obj("a", 100)),
            FetchPlan::Range(ByteRange::new(0, 64))
        );
        assert_eq!(rows.plan_file(&obj("b", 10)), FetchPlan::Full);
        assert!(!rows.done());

        let tail = ExtractPolicy::unlimited().tail_files(10).tail_bytes(64);
        let mut rows = RowPlanner::for_policy(&tail);
        let plan = rows.plan_file(&obj("a", 100));
        assert_eq!(plan, FetchPlan::Range(ByteRange::new(36, 64)));
        assert_eq!(plan.offset() + plan.length(100), 100);
    }

    #[test]
    fn test_per_object_bounds_hold() {
        let policy = ExtractPolicy::unlimited().head_files(10).tail_bytes(70);
        let mut rows = RowPlanner::for_policy(&policy);
        for size in [0, 1, 69, 70, 71, 1000] {
            let plan = rows.plan_file(&obj("x", size));
            let length = plan.length(size);
            assert!(length <= size.min(70));
            assert_eq!(plan.offset(), size - length);
        }
    }

    #[test]
    fn test_global_head_consumes_budget() {
        let policy = ExtractPolicy::unlimited().head_bytes(150);
        let mut rows = RowPlanner::for_policy(&policy);

        assert_eq!(rows.plan_file(&obj("a", 100)), FetchPlan::Full);
        assert_eq!(rows.consumed(), 100);
        assert!(!rows.done());

        assert_eq!(
            rows.plan_file(&obj("b", 100)),
            FetchPlan::Range(ByteRange::new(0, 50))
        );
        assert_eq!(rows.consumed(), 150);
        assert!(rows.done());

        // Spent budget yields an empty plan
        assert_eq!(
            rows.plan_file(&obj("c", 100)),
            FetchPlan::Range(ByteRange::new(0, 0))
        );
        assert_eq!(rows.consumed(), 150);
    }

    #[test]
    fn test_global_tail_keeps_trailing_bytes() {
        let policy = ExtractPolicy::unlimited().tail_bytes(150);
        let mut rows = RowPlanner::for_policy(&policy);
        let objects = [obj("a", 100), obj("b", 100), obj("c", 100)];
        let items = planned(&mut rows, &objects);
        assert!(items.iter().all(|i| i.plan == FetchPlan::Full));
        assert!(!rows.done());

        let finalized = rows.finalize(items);
        let keys: Vec<&str> = finalized.iter().map(|i| i.key()).collect();
        assert_eq!(keys, vec!["b", "c"]);
        assert_eq!(finalized[0].plan, FetchPlan::Range(ByteRange::new(50, 50)));
        assert_eq!(finalized[1].plan, FetchPlan::Full);
        let total: u64 = finalized.iter().map(|i| i.planned_length()).sum();
        assert_eq!(total, 150);
    }

    #[test]
    fn test_global_tail_budget_larger_than_data() {
        let mut rows = RowPlanner::for_policy(&ExtractPolicy::unlimited().tail_bytes(1000));
        let items = planned(&mut rows, &[obj("a", 10), obj("b", 20)]);
        let finalized = rows.finalize(items);
        assert_eq!(finalized.len(), 2);
        assert!(finalized.iter().all(|i| i.plan == FetchPlan::Full));
    }

    #[test]
    fn test_non_positive_limits_select_nothing() {
        let mut head = RowPlanner::for_policy(&ExtractPolicy::unlimited().head_bytes(0));
        assert!(head.done());
        assert_eq!(head.plan_file(&obj("a", 10)).length(10), 0);

        let tail = RowPlanner::for_policy(&ExtractPolicy::unlimited().tail_bytes(-5));
        assert!(tail.done());
        let items = vec![PlannedObject::new(obj("a", 10), FetchPlan::Full)];
        assert!(tail.finalize(items).is_empty());

        for policy in [
            ExtractPolicy::unlimited().head_files(1).head_bytes(-1),
            ExtractPolicy::unlimited().tail_files(1).tail_bytes(0),
        ] {
            let rows = RowPlanner::for_policy(&policy);
            assert!(rows.done(), "{}", policy);
        }
    }

    #[test]
    fn test_positive_budgets_are_open() {
        for policy in [
            ExtractPolicy::unlimited(),
            ExtractPolicy::unlimited().head_bytes(1),
            ExtractPolicy::unlimited().tail_bytes(1),
            ExtractPolicy::unlimited().head_files(2).tail_bytes(1),
        ] {
            assert!(!RowPlanner::for_policy(&policy).done(), "{}", policy);
        }
    }
}
