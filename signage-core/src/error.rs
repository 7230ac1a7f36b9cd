use thiserror::Error;

use crate::block::ScheduledBlock;

#[derive(Debug, Error)]
pub enum TimeError {
    #[error("invalid time '{0}' (expected HH:MM or HH:MM:SS)")]
    InvalidTime(String),

    #[error("time out of range: {0}")]
    OutOfRange(String),

    #[error("invalid day of week '{0}'")]
    InvalidDay(String),

    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZoneError {
    #[error("invalid split count {0} (expected 1, 2 or 4)")]
    InvalidSplitCount(u8),

    #[error("zone {zone} is outside a {count}-zone split")]
    ZoneOutOfRange { zone: u8, count: u8 },
}

/// User-correctable reasons a candidate cannot be scheduled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("no screens or group selected")]
    NoScreens,

    #[error("unknown screen '{0}'")]
    UnknownScreen(String),

    #[error("screens from different branches cannot be scheduled together ({first} vs {other})")]
    BranchMismatch { first: String, other: String },

    #[error("no days selected")]
    NoDays,

    #[error("no playlist selected for zone {zone}")]
    MissingZonePlaylist { zone: u8 },

    #[error("unknown playlist '{0}'")]
    UnknownPlaylist(String),

    #[error("priority {0} is outside 1..=10")]
    InvalidPriority(u8),

    #[error("selected playlists have zero duration")]
    ZeroDuration,

    #[error("start time must be before end time")]
    InvalidTimeRange,

    #[error("time {0} has seconds; schedules are kept to whole minutes")]
    SubMinuteTime(String),

    #[error("playlist starting at {start} would run past midnight")]
    EndsAfterMidnight { start: String },

    #[error("advertisement interval must be positive")]
    InvalidInterval,

    #[error("advertisement interval ({interval} min) is shorter than the playlist ({duration} min)")]
    IntervalShorterThanDuration { interval: u32, duration: u32 },

    #[error("no advertisement repetition fits in the requested window")]
    NoAdvertisementSlots,

    #[error("overlaps {} {}-{} on screen {screen_id}", .conflicting.day.label(), .conflicting.start_time, .conflicting.end_time)]
    Conflict {
        screen_id: String,
        conflicting: Box<ScheduledBlock>,
    },

    #[error("block {} {}-{} is not on screen {screen_id}", .block.day.label(), .block.start_time, .block.end_time)]
    BlockNotFound {
        screen_id: String,
        block: Box<ScheduledBlock>,
    },
}
