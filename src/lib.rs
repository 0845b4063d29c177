/*!
 * Orbit Extract - bounded extraction from object stores
 *
 * Extracts a policy-limited subset of the objects matching a glob into
 * local files:
 * - Lazy, paginated listing with safety caps
 * - Keep-first-N / keep-last-N object selection
 * - Per-object or run-wide byte budgets, from either end
 * - Concurrent ranged downloads delivered in plan order
 * - Cancellation and guaranteed cleanup of scratch files
 *
 * Stores: local directories, in-memory buckets, S3, Azure Blob and GCS.
 */

pub mod backend;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod stats;

// Re-export commonly used types
pub use backend::{open_store, BucketUrl, RemoteStore, StoreOptions};
pub use config::{ExtractConfig, GlobLimits};
pub use error::{ExtractError, Result};
pub use extract::{ExtractPolicy, ExtractionPlan, Extractor, FileSequence, Strategy};
pub use stats::ExtractStats;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
