use serde::{Deserialize, Serialize};
use signage_core::ScheduledBlock;

/// A slot dropped during normalization, with why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSlot {
    /// Index of the rule in the snapshot.
    pub rule: usize,
    /// Index of the slot within the rule; `None` when the whole rule was unreadable.
    pub slot: Option<usize>,
    pub reason: String,
}

/// Normalized output of a snapshot: every readable slot plus what was skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub blocks: Vec<ScheduledBlock>,
    pub skipped: Vec<SkippedSlot>,
    /// Schedule id carried by the (first) rule, if any.
    pub schedule_id: Option<String>,
}
