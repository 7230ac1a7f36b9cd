//! SlotStore: per-screen scheduled blocks for both schedule modes.
//!
//! Two maps, `screen_id -> ordered blocks`: one for fixed (weekday) schedules and
//! one for calendar (specific-date) schedules. Every entry carries a stable
//! [`BlockId`] and a [`SyncState`] so local edits can be tracked until the server
//! acknowledges them.
//!
//! The store does not check conflicts. Callers go through the validator first.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::block::{DayFilter, ScheduleMode, ScheduledBlock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u64);

/// Local commit state of a stored block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Added locally, not yet sent.
    Pending,
    /// Sent in a push that has not been acknowledged.
    InFlight,
    /// Acknowledged by the server or loaded from a server snapshot.
    Committed,
    /// Part of a chunk the server rejected; waiting for a retry.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlock {
    pub id: BlockId,
    pub state: SyncState,
    pub block: ScheduledBlock,
}

/// Outcome of merging a server snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: usize,
    /// Already present locally but not yet committed; now committed.
    pub confirmed: usize,
    /// Already present and committed.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub pending: usize,
    pub in_flight: usize,
    pub committed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotStore {
    fixed: BTreeMap<String, Vec<StoredBlock>>,
    calendar: BTreeMap<String, Vec<StoredBlock>>,
    next_id: u64,
}

impl SlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks of one screen in one mode, in insertion order. Empty when unknown.
    pub fn blocks(&self, screen_id: &str, mode: ScheduleMode) -> Vec<&ScheduledBlock> {
        self.entries(screen_id, mode).iter().map(|e| &e.block).collect()
    }

    pub fn entries(&self, screen_id: &str, mode: ScheduleMode) -> &[StoredBlock] {
        self.map(mode)
            .get(screen_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Blocks of one screen falling on `day`.
    pub fn blocks_on(&self, screen_id: &str, day: &DayFilter) -> Vec<&ScheduledBlock> {
        self.entries(screen_id, day.mode())
            .iter()
            .map(|e| &e.block)
            .filter(|b| b.day.matches(day))
            .collect()
    }

    /// All entries: fixed first, then calendar, each ordered by screen id.
    pub fn iter(&self) -> impl Iterator<Item = &StoredBlock> {
        self.fixed
            .values()
            .chain(self.calendar.values())
            .flat_map(|v| v.iter())
    }

    pub fn get(&self, id: BlockId) -> Option<&StoredBlock> {
        self.iter().find(|e| e.id == id)
    }

    pub fn screen_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .fixed
            .keys()
            .chain(self.calendar.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append blocks to a screen as pending. No deduplication.
    pub fn add_blocks(&mut self, screen_id: &str, blocks: Vec<ScheduledBlock>) -> Vec<BlockId> {
        let mut ids = Vec::with_capacity(blocks.len());
        for mut block in blocks {
            block.screen_id = screen_id.to_string();
            ids.push(self.insert(block, SyncState::Pending));
        }
        tracing::debug!(screen_id, added = ids.len(), "added blocks");
        ids
    }

    /// Remove the first block matching `block` by slot identity.
    pub fn remove_block(&mut self, screen_id: &str, block: &ScheduledBlock) -> Option<ScheduledBlock> {
        let list = self.map_mut(block.mode()).get_mut(screen_id)?;
        let pos = list.iter().position(|e| e.block.same_slot(block))?;
        let removed = list.remove(pos);
        if list.is_empty() {
            self.map_mut(block.mode()).remove(screen_id);
        }
        tracing::debug!(screen_id, day = %removed.block.day.label(), "removed block");
        Some(removed.block)
    }

    /// Merge server-sourced blocks. Entries equal to an existing block are not
    /// duplicated, so replaying the same snapshot is a no-op.
    pub fn merge_snapshot(&mut self, blocks: Vec<ScheduledBlock>) -> MergeReport {
        let mut report = MergeReport::default();

        for block in blocks {
            let existing = self
                .map_mut(block.mode())
                .get_mut(&block.screen_id)
                .and_then(|list| list.iter_mut().find(|e| e.block == block));

            match existing {
                Some(entry) if entry.state == SyncState::Committed => report.skipped += 1,
                Some(entry) => {
                    entry.state = SyncState::Committed;
                    report.confirmed += 1;
                }
                None => {
                    self.insert(block, SyncState::Committed);
                    report.added += 1;
                }
            }
        }

        tracing::debug!(
            added = report.added,
            confirmed = report.confirmed,
            skipped = report.skipped,
            "merged snapshot"
        );
        report
    }

    /// Remove every block on `day` for the given screens (all screens when `None`).
    pub fn clear_day(&mut self, day: &DayFilter, screen_ids: Option<&[String]>) -> usize {
        let map = self.map_mut(day.mode());
        let mut removed = 0;

        for (screen_id, list) in map.iter_mut() {
            if screen_ids.is_some_and(|ids| !ids.iter().any(|s| s == screen_id)) {
                continue;
            }
            let before = list.len();
            list.retain(|e| !e.block.day.matches(day));
            removed += before - list.len();
        }
        map.retain(|_, list| !list.is_empty());

        tracing::debug!(%day, removed, "cleared day");
        removed
    }

    pub fn ids_in_state(&self, state: SyncState) -> Vec<BlockId> {
        self.iter().filter(|e| e.state == state).map(|e| e.id).collect()
    }

    /// Move the given entries to `state`. Unknown ids are ignored.
    pub fn set_state(&mut self, ids: &[BlockId], state: SyncState) {
        for entry in self
            .fixed
            .values_mut()
            .chain(self.calendar.values_mut())
            .flat_map(|v| v.iter_mut())
            .filter(|e| ids.contains(&e.id))
        {
            entry.state = state;
        }
    }

    pub fn state_counts(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for e in self.iter() {
            match e.state {
                SyncState::Pending => counts.pending += 1,
                SyncState::InFlight => counts.in_flight += 1,
                SyncState::Committed => counts.committed += 1,
                SyncState::Failed => counts.failed += 1,
            }
        }
        counts
    }

    fn insert(&mut self, block: ScheduledBlock, state: SyncState) -> BlockId {
        self.next_id += 1;
        let id = BlockId(self.next_id);
        self.map_mut(block.mode())
            .entry(block.screen_id.clone())
            .or_default()
            .push(StoredBlock { id, state, block });
        id
    }

    fn map(&self, mode: ScheduleMode) -> &BTreeMap<String, Vec<StoredBlock>> {
        match mode {
            ScheduleMode::Fixed => &self.fixed,
            ScheduleMode::Calendar => &self.calendar,
        }
    }

    fn map_mut(&mut self, mode: ScheduleMode) -> &mut BTreeMap<String, Vec<StoredBlock>> {
        match mode {
            ScheduleMode::Fixed => &mut self.fixed,
            ScheduleMode::Calendar => &mut self.calendar,
        }
    }
}
