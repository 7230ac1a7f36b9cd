//! signage-core: scheduling core for the signage console.
//!
//! Slot store, zone draft model, conflict validator and layout packer.

pub mod block;
pub mod directory;
pub mod error;
pub mod layout;
pub mod scheduler;
pub mod slot_store;
pub mod time;
pub mod validator;
pub mod zones;

pub use block::{
    DayFilter, DaySpec, ScheduleMode, ScheduledBlock, SlotType, SplitCount, ZoneAssignments,
    ADVERTISEMENT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY,
};
pub use directory::{Directory, PlaylistDirectory, PlaylistInfo, ScreenDirectory, ScreenInfo};
pub use error::{TimeError, ValidationError, ZoneError};
pub use layout::{layout_day, layout_days, pack, LaidOutBlock, Placement};
pub use scheduler::Scheduler;
pub use slot_store::{BlockId, MergeReport, SlotStore, StateCounts, StoredBlock, SyncState};
pub use time::{local_today, parse_date, DayOfWeek, MinuteSpan, TimeOfDay};
pub use validator::{
    expand_advertisement, validate, AdRepeat, Candidate, CandidateKind, DaySelection, Plan,
    PlaylistMode, ScreenSelection,
};
pub use zones::{BulkSelection, ZoneModel};
