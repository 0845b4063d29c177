//! Extraction policy and per-object fetch plans

use crate::backend::{ByteRange, ListedObject};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which end of a sequence a limit keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// No limit
    #[default]
    None,
    /// Keep the earliest items / leading bytes
    Head,
    /// Keep the latest items / trailing bytes
    Tail,
}

impl Strategy {
    pub fn is_none(&self) -> bool {
        matches!(self, Strategy::None)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::None => write!(f, "none"),
            Strategy::Head => write!(f, "head"),
            Strategy::Tail => write!(f, "tail"),
        }
    }
}

/// How many objects, and how many bytes of each, a run keeps
///
/// `rows_limit_bytes` applies to every object separately when a file
/// strategy is set, and to the whole run otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractPolicy {
    pub files_strategy: Strategy,
    pub files_limit: i64,
    pub rows_strategy: Strategy,
    pub rows_limit_bytes: i64,
}

impl ExtractPolicy {
    /// Policy that keeps everything
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Builder pattern: keep the first `limit` objects
    pub fn head_files(mut self, limit: i64) -> Self {
        self.files_strategy = Strategy::Head;
        self.files_limit = limit;
        self
    }

    /// Builder pattern: keep the last `limit` objects
    pub fn tail_files(mut self, limit: i64) -> Self {
        self.files_strategy = Strategy::Tail;
        self.files_limit = limit;
        self
    }

    /// Builder pattern: keep the leading `limit` bytes
    pub fn head_bytes(mut self, limit: i64) -> Self {
        self.rows_strategy = Strategy::Head;
        self.rows_limit_bytes = limit;
        self
    }

    /// Builder pattern: keep the trailing `limit` bytes
    pub fn tail_bytes(mut self, limit: i64) -> Self {
        self.rows_strategy = Strategy::Tail;
        self.rows_limit_bytes = limit;
        self
    }

    /// Whether the byte budget is shared across the whole run
    pub fn has_global_row_limit(&self) -> bool {
        !self.rows_strategy.is_none() && self.files_strategy.is_none()
    }
}

impl fmt::Display for ExtractPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "files={}", self.files_strategy)?;
        if !self.files_strategy.is_none() {
            write!(f, "({})", self.files_limit)?;
        }
        write!(f, " rows={}", self.rows_strategy)?;
        if !self.rows_strategy.is_none() {
            let scope = if self.files_strategy.is_none() {
                "global"
            } else {
                "per-object"
            };
            write!(f, "({} bytes, {})", self.rows_limit_bytes, scope)?;
        }
        Ok(())
    }
}

/// Which bytes of an object to retrieve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FetchPlan {
    /// The whole object
    Full,
    /// A byte window within the object
    Range(ByteRange),
}

impl FetchPlan {
    /// Plan for `length` bytes at `offset`; a window covering the whole object is `Full`
    pub fn window(size: u64, offset: u64, length: u64) -> Self {
        debug_assert!(offset + length <= size);
        if offset == 0 && length == size {
            FetchPlan::Full
        } else {
            FetchPlan::Range(ByteRange::new(offset, length))
        }
    }

    /// Leading `length` bytes, clamped to the object
    pub fn head(size: u64, length: u64) -> Self {
        Self::window(size, 0, length.min(size))
    }

    /// Trailing `length` bytes, clamped to the object
    pub fn tail(size: u64, length: u64) -> Self {
        let length = length.min(size);
        Self::window(size, size - length, length)
    }

    /// Number of bytes this plan retrieves from an object of `size` bytes
    pub fn length(&self, size: u64) -> u64 {
        match self {
            FetchPlan::Full => size,
            FetchPlan::Range(r) => r.length,
        }
    }

    /// Starting offset of the retrieved bytes
    pub fn offset(&self) -> u64 {
        match self {
            FetchPlan::Full => 0,
            FetchPlan::Range(r) => r.offset,
        }
    }

    /// Range to request from the store; `None` fetches the whole object
    pub fn range(&self) -> Option<ByteRange> {
        match self {
            FetchPlan::Full => None,
            FetchPlan::Range(r) => Some(*r),
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, FetchPlan::Range(_))
    }
}

impl fmt::Display for FetchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPlan::Full => write!(f, "full"),
            FetchPlan::Range(r) => write!(f, "range({}, {})", r.offset, r.length),
        }
    }
}

/// An accepted object together with the bytes to fetch from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedObject {
    pub object: ListedObject,
    pub plan: FetchPlan,
}

impl PlannedObject {
    pub fn new(object: ListedObject, plan: FetchPlan) -> Self {
        Self { object, plan }
    }

    pub fn key(&self) -> &str {
        &self.object.key
    }

    /// Number of bytes the plan retrieves
    pub fn planned_length(&self) -> u64 {
        self.plan.length(self.object.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_covering_object_is_full() {
        assert_eq!(FetchPlan::window(100, 0, 100), FetchPlan::Full);
        assert_eq!(
            FetchPlan::window(100, 0, 50),
            FetchPlan::Range(ByteRange::new(0, 50))
        );
    }

    #[test]
    fn test_head_and_tail_clamp() {
        assert_eq!(FetchPlan::head(30, 100), FetchPlan::Full);
        assert_eq!(
            FetchPlan::tail(100, 40),
            FetchPlan::Range(ByteRange::new(60, 40))
        );
        assert_eq!(FetchPlan::tail(100, 40).length(100), 40);
        assert_eq!(FetchPlan::tail(100, 40).offset(), 60);
    }

    #[test]
    fn test_policy_scope() {
        assert!(ExtractPolicy::unlimited().head_bytes(10).has_global_row_limit());
        assert!(!ExtractPolicy::unlimited()
            .tail_files(2)
            .head_bytes(10)
            .has_global_row_limit());
        assert!(!ExtractPolicy::unlimited().has_global_row_limit());
    }

    #[test]
    fn test_policy_display() {
        let policy = ExtractPolicy::unlimited().tail_files(2).head_bytes(64);
        assert_eq!(policy.to_string(), "files=tail(2) rows=head(64 bytes, per-object)");
    }

    #[test]
    fn test_policy_deserialize() {
        let policy: ExtractPolicy = toml::from_str(
            r#"
            files_strategy = "tail"
            files_limit = 5
            "#,
        )
        .unwrap();
        assert_eq!(policy.files_strategy, Strategy::Tail);
        assert_eq!(policy.files_limit, 5);
        assert_eq!(policy.rows_strategy, Strategy::None);
    }
}
