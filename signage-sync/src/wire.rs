//! Flat slot record sent in `timeSlots`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use signage_core::{DayOfWeek, DaySpec, ScheduledBlock, SlotType, ZoneAssignments};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSlot {
    pub screen_id: String,
    pub branch_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<DayOfWeek>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// `HH:MM`.
    pub start_time: String,
    /// `HH:MM`; end of day goes out as `23:59`.
    pub end_time: String,
    pub priority: u8,
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    pub is_recurring: bool,
    pub zone_assignments: ZoneAssignments,
    pub playlist_ids: Vec<String>,
}

impl WireSlot {
    /// Flatten a block. `draft` stands in when the block has no playlist of its own.
    pub fn from_block(block: &ScheduledBlock, draft: impl FnOnce() -> ZoneAssignments) -> Self {
        let zone_assignments = if block.zone_assignments.has_any_playlist() {
            block.zone_assignments.clone()
        } else {
            draft()
        };
        let playlist_ids = if block.playlist_ids.is_empty() {
            zone_assignments.playlist_ids()
        } else {
            block.playlist_ids.clone()
        };

        let (day_of_week, start_date, end_date) = match block.day {
            DaySpec::Fixed { day_of_week } => (Some(day_of_week), None, None),
            DaySpec::Calendar { start_date, end_date } => (None, Some(start_date), Some(end_date)),
        };

        Self {
            screen_id: block.screen_id.clone(),
            branch_id: block.branch_id.clone(),
            day_of_week,
            start_date,
            end_date,
            start_time: block.start_time.to_wire(),
            end_time: block.end_time.to_wire(),
            priority: block.priority,
            slot_type: block.slot_type,
            is_recurring: block.is_recurring,
            zone_assignments,
            playlist_ids,
        }
    }
}
