//! Notification cache and range-merge reader.
//!
//! The cache keeps a contiguous, tick-ordered slice of one scope's
//! notification partition. [`RangeMergeReader`] serves "since tick T" reads
//! from it, querying the range store only for ticks outside the cached span.
//!
//! # Example
//!
//! ```ignore
//! let reader = RangeMergeReader::new("acme", store, clock, ReaderConfig::from(&config));
//! let batch = reader.read_latest(since).await?;
//! if let Some(resume) = batch.resume_tick() {
//!     // The result ceiling was hit; read again from `resume`.
//! }
//! ```

pub mod reader;
pub mod tick_cache;

pub use reader::{RangeMergeReader, ReadBatch, ReadState, ReaderConfig, ReaderStats};
pub use tick_cache::{estimated_size, CacheStats, TickCache, ENTRY_OVERHEAD_BYTES};
