//! Scheduled block model: the atomic unit the slot store holds.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ZoneError;
use crate::time::{DayOfWeek, MinuteSpan, TimeOfDay};

/// Reserved priority carried by advertisement blocks on the wire.
pub const ADVERTISEMENT_PRIORITY: u8 = 100;

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SlotType {
    Playlist,
    Advertisement,
}

impl SlotType {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotType::Playlist => "PLAYLIST",
            SlotType::Advertisement => "ADVERTISEMENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    /// Recurring weekly schedule keyed by weekday.
    Fixed,
    /// Specific-date schedule.
    Calendar,
}

/// How many regions a screen's display area is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SplitCount {
    #[default]
    One,
    Two,
    Four,
}

impl SplitCount {
    pub fn get(self) -> u8 {
        match self {
            SplitCount::One => 1,
            SplitCount::Two => 2,
            SplitCount::Four => 4,
        }
    }

    pub fn zones(self) -> std::ops::Range<u8> {
        0..self.get()
    }
}

impl TryFrom<u8> for SplitCount {
    type Error = ZoneError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(SplitCount::One),
            2 => Ok(SplitCount::Two),
            4 => Ok(SplitCount::Four),
            other => Err(ZoneError::InvalidSplitCount(other)),
        }
    }
}

impl From<SplitCount> for u8 {
    fn from(c: SplitCount) -> u8 {
        c.get()
    }
}

/// Partition of a screen plus the playlist feeding each zone.
///
/// Keys at or beyond `count` are ignored but kept so a payload round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneAssignments {
    pub count: SplitCount,
    #[serde(default)]
    pub zone_playlists: BTreeMap<u8, Option<String>>,
}

impl ZoneAssignments {
    pub fn new(count: SplitCount) -> Self {
        Self {
            count,
            zone_playlists: count.zones().map(|z| (z, None)).collect(),
        }
    }

    /// A single full-screen zone playing `playlist_id`.
    pub fn single(playlist_id: impl Into<String>) -> Self {
        let mut z = Self::new(SplitCount::One);
        z.zone_playlists.insert(0, Some(playlist_id.into()));
        z
    }

    pub fn with_zone(mut self, zone: u8, playlist_id: impl Into<String>) -> Self {
        self.zone_playlists.insert(zone, Some(playlist_id.into()));
        self
    }

    /// Playlist of a zone, treating blank ids as unassigned.
    pub fn playlist_for(&self, zone: u8) -> Option<&str> {
        self.zone_playlists
            .get(&zone)
            .and_then(|p| p.as_deref())
            .filter(|p| !p.trim().is_empty())
    }

    /// First zone in `0..count` with no playlist.
    pub fn missing_zone(&self) -> Option<u8> {
        self.count.zones().find(|z| self.playlist_for(*z).is_none())
    }

    pub fn is_complete(&self) -> bool {
        self.missing_zone().is_none()
    }

    pub fn has_any_playlist(&self) -> bool {
        self.count.zones().any(|z| self.playlist_for(z).is_some())
    }

    /// Deduplicated playlist ids of the meaningful zones, in zone order.
    pub fn playlist_ids(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for z in self.count.zones() {
            if let Some(p) = self.playlist_for(z) {
                if !out.iter().any(|seen| seen == p) {
                    out.push(p.to_string());
                }
            }
        }
        out
    }
}

/// Which day(s) a block applies to. Exactly one form per block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum DaySpec {
    #[serde(rename_all = "camelCase")]
    Fixed { day_of_week: DayOfWeek },
    #[serde(rename_all = "camelCase")]
    Calendar { start_date: NaiveDate, end_date: NaiveDate },
}

impl DaySpec {
    pub fn weekday(day: DayOfWeek) -> Self {
        DaySpec::Fixed { day_of_week: day }
    }

    pub fn date(date: NaiveDate) -> Self {
        DaySpec::Calendar {
            start_date: date,
            end_date: date,
        }
    }

    pub fn mode(&self) -> ScheduleMode {
        match self {
            DaySpec::Fixed { .. } => ScheduleMode::Fixed,
            DaySpec::Calendar { .. } => ScheduleMode::Calendar,
        }
    }

    /// Same weekday, or intersecting inclusive date ranges. Modes never overlap.
    pub fn overlaps(&self, other: &DaySpec) -> bool {
        match (self, other) {
            (DaySpec::Fixed { day_of_week: a }, DaySpec::Fixed { day_of_week: b }) => a == b,
            (
                DaySpec::Calendar { start_date: s1, end_date: e1 },
                DaySpec::Calendar { start_date: s2, end_date: e2 },
            ) => s1 <= e2 && s2 <= e1,
            _ => false,
        }
    }

    pub fn matches(&self, filter: &DayFilter) -> bool {
        match (self, filter) {
            (DaySpec::Fixed { day_of_week }, DayFilter::Weekday(d)) => day_of_week == d,
            (DaySpec::Calendar { start_date, end_date }, DayFilter::Date(d)) => {
                start_date <= d && d <= end_date
            }
            _ => false,
        }
    }

    pub fn label(&self) -> String {
        match self {
            DaySpec::Fixed { day_of_week } => day_of_week.to_string(),
            DaySpec::Calendar { start_date, end_date } if start_date == end_date => {
                start_date.to_string()
            }
            DaySpec::Calendar { start_date, end_date } => format!("{start_date}..{end_date}"),
        }
    }
}

/// Selects one day of one schedule mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayFilter {
    Weekday(DayOfWeek),
    Date(NaiveDate),
}

impl DayFilter {
    pub fn mode(&self) -> ScheduleMode {
        match self {
            DayFilter::Weekday(_) => ScheduleMode::Fixed,
            DayFilter::Date(_) => ScheduleMode::Calendar,
        }
    }
}

impl fmt::Display for DayFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayFilter::Weekday(d) => write!(f, "{d}"),
            DayFilter::Date(d) => write!(f, "{d}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledBlock {
    pub screen_id: String,
    pub branch_id: String,
    pub day: DaySpec,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    pub is_recurring: bool,
    pub priority: u8,
    pub zone_assignments: ZoneAssignments,
    pub playlist_ids: Vec<String>,
}

impl ScheduledBlock {
    /// A non-recurring priority-1 playlist block. `00:00 -> 00:00` becomes `00:00 -> 24:00`,
    /// and an end of `23:59` is stored as `24:00` since that is how the server sends it back.
    pub fn new(
        screen_id: impl Into<String>,
        branch_id: impl Into<String>,
        day: DaySpec,
        start_time: TimeOfDay,
        end_time: TimeOfDay,
    ) -> Self {
        let full_day = start_time.is_midnight() && end_time.is_midnight();
        let end_time = if full_day || end_time.is_wire_end_of_day() {
            TimeOfDay::END_OF_DAY
        } else {
            end_time
        };
        Self {
            screen_id: screen_id.into(),
            branch_id: branch_id.into(),
            day,
            start_time,
            end_time,
            slot_type: SlotType::Playlist,
            is_recurring: false,
            priority: MIN_PRIORITY,
            zone_assignments: ZoneAssignments::default(),
            playlist_ids: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Advertisements always carry the reserved priority and never recur.
    pub fn advertisement(mut self) -> Self {
        self.slot_type = SlotType::Advertisement;
        self.priority = ADVERTISEMENT_PRIORITY;
        self.is_recurring = false;
        self
    }

    pub fn recurring(mut self, is_recurring: bool) -> Self {
        self.is_recurring = is_recurring && self.slot_type == SlotType::Playlist;
        self
    }

    pub fn with_zones(mut self, zones: ZoneAssignments) -> Self {
        self.playlist_ids = zones.playlist_ids();
        self.zone_assignments = zones;
        self
    }

    pub fn mode(&self) -> ScheduleMode {
        self.day.mode()
    }

    pub fn span(&self) -> MinuteSpan {
        MinuteSpan::of_times(self.start_time, self.end_time)
    }

    /// Identity used for removal: everything but screen, zones and playlists.
    pub fn same_slot(&self, other: &ScheduledBlock) -> bool {
        self.day == other.day
            && self.start_time == other.start_time
            && self.end_time == other.end_time
            && self.priority == other.priority
            && self.slot_type == other.slot_type
            && self.is_recurring == other.is_recurring
            && self.branch_id == other.branch_id
    }

    /// Whether two blocks sit in the same conflict partition: type, branch and day,
    /// plus priority for playlists.
    pub fn competes_with(&self, other: &ScheduledBlock) -> bool {
        self.slot_type == other.slot_type
            && self.branch_id == other.branch_id
            && self.day.overlaps(&other.day)
            && (self.slot_type == SlotType::Advertisement || self.priority == other.priority)
    }

    pub fn conflicts_with(&self, other: &ScheduledBlock) -> bool {
        self.competes_with(other) && self.span().overlaps(&other.span())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> TimeOfDay {
        TimeOfDay::parse(s).unwrap()
    }

    fn monday(start: &str, end: &str) -> ScheduledBlock {
        ScheduledBlock::new("scr-1", "br-1", DaySpec::weekday(DayOfWeek::Monday), t(start), t(end))
    }

    #[test]
    fn midnight_pair_becomes_full_day() {
        let b = monday("00:00", "00:00").recurring(true);
        assert!(b.end_time.is_end_of_day());
        assert_eq!(b.span().len(), 1440);
    }

    #[test]
    fn end_at_2359_is_stored_as_end_of_day() {
        assert!(monday("22:00", "23:59").end_time.is_end_of_day());
        assert_eq!(monday("22:00", "23:59:30").end_time, t("23:59:30"));
    }

    #[test]
    fn advertisement_forces_reserved_priority() {
        let b = monday("08:00", "08:10").with_priority(3).advertisement().recurring(true);
        assert_eq!(b.priority, ADVERTISEMENT_PRIORITY);
        assert!(!b.is_recurring);
    }

    #[test]
    fn zone_playlist_ids_are_deduplicated_and_bounded_by_count() {
        let zones = ZoneAssignments::new(SplitCount::Two)
            .with_zone(0, "pl-a")
            .with_zone(1, "pl-a")
            .with_zone(3, "pl-z");
        assert_eq!(zones.playlist_ids(), vec!["pl-a".to_string()]);
        assert!(zones.is_complete());
    }

    #[test]
    fn missing_zone_reports_first_gap() {
        let zones = ZoneAssignments::new(SplitCount::Four)
            .with_zone(0, "pl-a")
            .with_zone(1, "pl-b")
            .with_zone(3, "pl-d");
        assert_eq!(zones.missing_zone(), Some(2));

        let blank = ZoneAssignments::new(SplitCount::One).with_zone(0, "  ");
        assert_eq!(blank.missing_zone(), Some(0));
    }

    #[test]
    fn split_count_rejects_three() {
        assert!(SplitCount::try_from(3).is_err());
        assert_eq!(SplitCount::try_from(4).unwrap(), SplitCount::Four);
    }

    #[test]
    fn priorities_partition_playlists_but_not_ads() {
        let a = monday("08:00", "10:00").with_priority(2);
        let b = monday("09:00", "11:00").with_priority(3);
        assert!(!a.conflicts_with(&b));

        let ad1 = monday("08:00", "08:10").advertisement();
        let ad2 = monday("08:05", "08:15").advertisement();
        assert!(ad1.conflicts_with(&ad2));
        assert!(!ad1.conflicts_with(&a));
    }

    #[test]
    fn calendar_ranges_overlap_inclusively() {
        let d = |s: &str| crate::time::parse_date(s).unwrap();
        let a = DaySpec::Calendar { start_date: d("2026-03-01"), end_date: d("2026-03-03") };
        let b = DaySpec::date(d("2026-03-03"));
        let c = DaySpec::date(d("2026-03-04"));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&DaySpec::weekday(DayOfWeek::Tuesday)));
        assert!(a.matches(&DayFilter::Date(d("2026-03-02"))));
    }

    #[test]
    fn json_shape_is_camel_case() {
        let b = monday("08:00", "09:00").with_zones(ZoneAssignments::single("pl-1"));
        let json = serde_json::to_string(&b).unwrap();
        assert!(json.contains("\"screenId\":\"scr-1\""));
        assert!(json.contains("\"mode\":\"fixed\""));
        assert!(json.contains("\"dayOfWeek\":\"MONDAY\""));
        assert!(json.contains("\"type\":\"PLAYLIST\""));
        assert!(json.contains("\"startTime\":\"08:00:00\""));
        let back: ScheduledBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }
}
