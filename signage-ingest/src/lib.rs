//! signage-ingest: normalize server schedule snapshots into canonical blocks.

pub mod snapshot;
pub mod types;

pub use snapshot::{normalize_slot, normalize_snapshot, parse_snapshot_text};
pub use types::{IngestReport, SkippedSlot};
