//! Chunked push, pull and incoming dispatch.
//!
//! A push sends the whole local schedule in chunks of `chunk_size` slots. Entries
//! that were not yet committed go `InFlight` and stay there until the server acks;
//! a rejected chunk turns its entries `Failed` and is kept so `retry_failed` can
//! resend exactly that frame. Nothing is rolled back: chunks the server already
//! took stay taken.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use signage_core::{BlockId, MergeReport, SlotStore, SyncState, ZoneModel};
use signage_ingest::normalize_snapshot;

use crate::error::SyncError;
use crate::message::{BranchQuery, IncomingMessage, OutgoingMessage, PushAction, PushPayload};
use crate::wire::WireSlot;

pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Whatever carries frames to the server.
pub trait Transport {
    fn is_open(&self) -> bool;
    fn send(&mut self, frame: String) -> Result<(), SyncError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Sent,
    Acked,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushChunk {
    pub index: usize,
    pub block_ids: Vec<BlockId>,
    pub frame: String,
    pub status: ChunkStatus,
}

/// The most recent push, chunk by chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSession {
    pub action: PushAction,
    pub chunks: Vec<PushChunk>,
}

impl PushSession {
    pub fn failed_chunks(&self) -> Vec<usize> {
        self.chunks
            .iter()
            .filter(|c| c.status == ChunkStatus::Failed)
            .map(|c| c.index)
            .collect()
    }

    pub fn is_settled(&self) -> bool {
        self.chunks.iter().all(|c| c.status == ChunkStatus::Acked)
    }

    /// Whether the store no longer holds exactly the blocks this push carried.
    /// Stored frames of a stale session would overwrite newer edits.
    pub fn is_stale(&self, store: &SlotStore) -> bool {
        let pushed: BTreeSet<BlockId> = self
            .chunks
            .iter()
            .flat_map(|c| c.block_ids.iter().copied())
            .collect();
        let current: BTreeSet<BlockId> = store.iter().map(|e| e.id).collect();
        pushed != current
    }
}

/// What an incoming frame did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Acked {
        schedule_id: Option<String>,
        committed: usize,
    },
    Rejected {
        message: String,
        chunks: Vec<usize>,
    },
    Merged {
        report: MergeReport,
        skipped: usize,
    },
    PullFailed {
        message: String,
    },
    Ignored {
        action: String,
    },
}

/// Every stored block as a wire slot, paired with its id.
///
/// Blocks without a playlist of their own take the screen's current zone draft.
pub fn serialize(store: &SlotStore, zones: &ZoneModel) -> Vec<(BlockId, WireSlot)> {
    store
        .iter()
        .map(|entry| {
            let slot = WireSlot::from_block(&entry.block, || {
                zones.zone_assignments(&entry.block.screen_id)
            });
            (entry.id, slot)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncClient {
    schedule_id: Option<String>,
    branch_ids: Vec<String>,
    chunk_size: usize,
    session: Option<PushSession>,
    last_error: Option<String>,
}

impl Default for SyncClient {
    fn default() -> Self {
        Self {
            schedule_id: None,
            branch_ids: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            session: None,
            last_error: None,
        }
    }
}

impl SyncClient {
    pub fn new(branch_ids: Vec<String>) -> Self {
        Self {
            branch_ids,
            ..Self::default()
        }
    }

    pub fn with_schedule_id(mut self, id: impl Into<String>) -> Self {
        self.schedule_id = Some(id.into());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn set_branch_ids(&mut self, branch_ids: Vec<String>) {
        self.branch_ids = branch_ids;
    }

    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size.max(1);
    }

    pub fn schedule_id(&self) -> Option<&str> {
        self.schedule_id.as_deref()
    }

    pub fn branch_ids(&self) -> &[String] {
        &self.branch_ids
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn session(&self) -> Option<&PushSession> {
        self.session.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Send the whole store. Returns how many frames went out; zero when the
    /// transport is closed.
    ///
    /// An empty store still sends one empty chunk so the server-side schedule is
    /// cleared too.
    pub fn push<T: Transport>(
        &mut self,
        transport: &mut T,
        store: &mut SlotStore,
        zones: &ZoneModel,
    ) -> Result<usize, SyncError> {
        if !transport.is_open() {
            tracing::warn!("push skipped: schedule channel is not open");
            return Ok(0);
        }

        let action = if self.schedule_id.is_some() {
            PushAction::Update
        } else {
            PushAction::Create
        };

        let slots = serialize(store, zones);
        let start_date = slots.iter().filter_map(|(_, s)| s.start_date).min();
        let end_date = slots.iter().filter_map(|(_, s)| s.end_date).max();
        let is_recurring = slots.iter().any(|(_, s)| s.is_recurring);

        let groups: Vec<&[(BlockId, WireSlot)]> = if slots.is_empty() {
            vec![slots.as_slice()]
        } else {
            slots.chunks(self.chunk_size.max(1)).collect()
        };
        let total_chunks = groups.len();

        let mut chunks = Vec::with_capacity(total_chunks);
        for (index, group) in groups.into_iter().enumerate() {
            let payload = PushPayload {
                start_date,
                end_date,
                is_recurring,
                id: self.schedule_id.clone(),
                schedule_id: self.schedule_id.clone(),
                time_slots: group.iter().map(|(_, s)| s.clone()).collect(),
                chunk_index: index,
                total_chunks,
                branch_ids: self.branch_ids.clone(),
            };
            chunks.push(PushChunk {
                index,
                block_ids: group.iter().map(|(id, _)| *id).collect(),
                frame: OutgoingMessage::push(action, payload).to_frame()?,
                status: ChunkStatus::Sent,
            });
        }

        tracing::debug!(
            action = action.as_str(),
            slots = slots.len(),
            chunks = total_chunks,
            "pushing schedule"
        );

        self.session = Some(PushSession { action, chunks });
        let all: Vec<usize> = (0..total_chunks).collect();
        self.send_chunks(transport, store, &all)
    }

    /// Resend the chunks of the last push that the server rejected.
    pub fn retry_failed<T: Transport>(
        &mut self,
        transport: &mut T,
        store: &mut SlotStore,
    ) -> Result<usize, SyncError> {
        if !transport.is_open() {
            tracing::warn!("retry skipped: schedule channel is not open");
            return Ok(0);
        }
        let failed = self.session.as_ref().map(PushSession::failed_chunks).unwrap_or_default();
        if failed.is_empty() {
            tracing::debug!("nothing to retry");
            return Ok(0);
        }
        if self.session.as_ref().is_some_and(|s| s.is_stale(store)) {
            let e = SyncError::StaleSession;
            tracing::warn!(chunks = ?failed, error = %e, "retry refused");
            self.last_error = Some(e.to_string());
            return Err(e);
        }
        tracing::info!(chunks = ?failed, "retrying failed chunks");
        self.send_chunks(transport, store, &failed)
    }

    /// Ask for the schedule of the configured branches. `false` when the transport is closed.
    pub fn pull<T: Transport>(&mut self, transport: &mut T) -> Result<bool, SyncError> {
        if !transport.is_open() {
            tracing::warn!("pull skipped: schedule channel is not open");
            return Ok(false);
        }
        let frame = OutgoingMessage::GetByBranchIds(BranchQuery {
            branch_ids: self.branch_ids.clone(),
        })
        .to_frame()?;
        transport.send(frame).inspect_err(|e| self.last_error = Some(e.to_string()))?;
        Ok(true)
    }

    /// Apply one frame from the server.
    pub fn handle_incoming(&mut self, text: &str, store: &mut SlotStore) -> Result<SyncEvent, SyncError> {
        let message = IncomingMessage::parse(text).inspect_err(|e| {
            tracing::warn!(error = %e, "dropping frame");
            self.last_error = Some(e.to_string());
        })?;

        Ok(match message {
            IncomingMessage::PushAck {
                schedule_id,
                chunk_index,
                ..
            } => {
                if let Some(id) = &schedule_id {
                    self.schedule_id = Some(id.clone());
                }
                let committed = self.settle(store, chunk_index, ChunkStatus::Acked);
                self.last_error = None;
                tracing::info!(schedule_id = ?self.schedule_id, committed, "push acknowledged");
                SyncEvent::Acked {
                    schedule_id: self.schedule_id.clone(),
                    committed,
                }
            }
            IncomingMessage::PushError {
                action,
                message,
                chunk_index,
            } => {
                let chunks = self.in_flight_chunks(chunk_index);
                self.settle(store, chunk_index, ChunkStatus::Failed);
                tracing::warn!(action = action.as_str(), chunks = ?chunks, %message, "push rejected");
                self.last_error = Some(message.clone());
                SyncEvent::Rejected { message, chunks }
            }
            IncomingMessage::Snapshot(body) => {
                let ingest = normalize_snapshot(&body);
                if self.schedule_id.is_none() {
                    self.schedule_id = ingest.schedule_id.clone();
                }
                let skipped = ingest.skipped.len();
                let report = store.merge_snapshot(ingest.blocks);
                if skipped > 0 {
                    self.last_error = Some(format!("{skipped} slot(s) in the server snapshot could not be read"));
                }
                SyncEvent::Merged { report, skipped }
            }
            IncomingMessage::PullError { message } => {
                tracing::warn!(%message, "pull rejected");
                self.last_error = Some(message.clone());
                SyncEvent::PullFailed { message }
            }
            IncomingMessage::Other { action } => {
                tracing::debug!(%action, "ignoring frame");
                SyncEvent::Ignored { action }
            }
        })
    }

    fn send_chunks<T: Transport>(
        &mut self,
        transport: &mut T,
        store: &mut SlotStore,
        indices: &[usize],
    ) -> Result<usize, SyncError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(0);
        };

        let mut sent = 0;
        for (pos, &index) in indices.iter().enumerate() {
            let Some(chunk) = session.chunks.iter_mut().find(|c| c.index == index) else {
                continue;
            };
            match transport.send(chunk.frame.clone()) {
                Ok(()) => {
                    chunk.status = ChunkStatus::Sent;
                    let unsettled = not_committed(store, &chunk.block_ids);
                    store.set_state(&unsettled, SyncState::InFlight);
                    sent += 1;
                }
                Err(e) => {
                    // This chunk and everything after it never left.
                    for &rest in &indices[pos..] {
                        if let Some(c) = session.chunks.iter_mut().find(|c| c.index == rest) {
                            c.status = ChunkStatus::Failed;
                            let unsettled = not_committed(store, &c.block_ids);
                            store.set_state(&unsettled, SyncState::Failed);
                        }
                    }
                    tracing::warn!(chunk = index, error = %e, "send failed");
                    self.last_error = Some(e.to_string());
                    return Err(e);
                }
            }
        }
        Ok(sent)
    }

    /// Chunk indices an ack or error applies to: the named one, or every chunk
    /// still waiting.
    fn in_flight_chunks(&self, chunk_index: Option<usize>) -> Vec<usize> {
        let Some(session) = &self.session else {
            return Vec::new();
        };
        session
            .chunks
            .iter()
            .filter(|c| match chunk_index {
                Some(i) => c.index == i,
                None => c.status == ChunkStatus::Sent,
            })
            .map(|c| c.index)
            .collect()
    }

    fn settle(&mut self, store: &mut SlotStore, chunk_index: Option<usize>, status: ChunkStatus) -> usize {
        let targets = self.in_flight_chunks(chunk_index);
        let Some(session) = self.session.as_mut() else {
            return 0;
        };
        let state = match status {
            ChunkStatus::Acked => SyncState::Committed,
            ChunkStatus::Failed => SyncState::Failed,
            ChunkStatus::Sent => SyncState::InFlight,
        };

        let mut moved = 0;
        for chunk in session.chunks.iter_mut().filter(|c| targets.contains(&c.index)) {
            chunk.status = status;
            let ids: Vec<BlockId> = chunk
                .block_ids
                .iter()
                .copied()
                .filter(|id| store.get(*id).is_some_and(|e| e.state == SyncState::InFlight))
                .collect();
            store.set_state(&ids, state);
            moved += ids.len();
        }
        moved
    }
}

fn not_committed(store: &SlotStore, ids: &[BlockId]) -> Vec<BlockId> {
    ids.iter()
        .copied()
        .filter(|id| store.get(*id).is_some_and(|e| e.state != SyncState::Committed))
        .collect()
}
