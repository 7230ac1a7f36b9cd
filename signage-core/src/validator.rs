//! Conflict validator: turns a composer candidate into concrete blocks, or a reason
//! it cannot be scheduled.
//!
//! Read-only over the [`SlotStore`], so it can be called speculatively before a
//! commit. Checks run in order:
//! 1) screens resolve and share one branch
//! 2) at least one day/date
//! 3) every required zone has a known playlist
//! 4) whole-minute times, then the time window (single-shot end, recurring window,
//!    advertisement repetitions)
//! 5) no overlap with an existing block in the same type/branch/day partition
//!    (and same priority for playlists)

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::block::{
    DaySpec, ScheduledBlock, SlotType, ZoneAssignments, MAX_PRIORITY, MIN_PRIORITY,
};
use crate::directory::{PlaylistDirectory, ScreenDirectory, ScreenInfo};
use crate::error::ValidationError;
use crate::slot_store::SlotStore;
use crate::time::{DayOfWeek, TimeOfDay};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScreenSelection {
    Screens(Vec<String>),
    Group(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DaySelection {
    Weekdays(Vec<DayOfWeek>),
    Dates(Vec<NaiveDate>),
}

impl DaySelection {
    /// Distinct day specs in first-seen order.
    pub fn specs(&self) -> Vec<DaySpec> {
        let all: Vec<DaySpec> = match self {
            DaySelection::Weekdays(days) => days.iter().copied().map(DaySpec::weekday).collect(),
            DaySelection::Dates(dates) => dates.iter().copied().map(DaySpec::date).collect(),
        };
        let mut out: Vec<DaySpec> = Vec::with_capacity(all.len());
        for d in all {
            if !out.contains(&d) {
                out.push(d);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaylistMode {
    /// Play once: the block lasts as long as the longest zone playlist.
    SingleShot,
    /// Cycle the playlists across the whole requested window.
    Recurring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum AdRepeat {
    EveryMinutes { interval: u32 },
    EveryHours { interval: u32 },
    At { times: Vec<TimeOfDay> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CandidateKind {
    Playlist { mode: PlaylistMode, priority: u8 },
    Advertisement { repeat: AdRepeat },
}

/// What the composer wants to schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub screens: ScreenSelection,
    pub days: DaySelection,
    pub start_time: TimeOfDay,
    /// Window end. `None` runs to the end of the day.
    #[serde(default)]
    pub end_time: Option<TimeOfDay>,
    #[serde(flatten)]
    pub kind: CandidateKind,
    pub zones: ZoneAssignments,
}

/// Blocks a valid candidate expands to, ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub branch_id: String,
    pub blocks: Vec<ScheduledBlock>,
}

impl Plan {
    pub fn by_screen(&self) -> BTreeMap<String, Vec<ScheduledBlock>> {
        let mut out: BTreeMap<String, Vec<ScheduledBlock>> = BTreeMap::new();
        for b in &self.blocks {
            out.entry(b.screen_id.clone()).or_default().push(b.clone());
        }
        out
    }
}

pub fn validate<S, P>(
    store: &SlotStore,
    screens: &S,
    playlists: &P,
    candidate: &Candidate,
) -> Result<Plan, ValidationError>
where
    S: ScreenDirectory + ?Sized,
    P: PlaylistDirectory + ?Sized,
{
    let res = build_plan(store, screens, playlists, candidate);
    if let Err(e) = &res {
        tracing::debug!(reason = %e, "candidate rejected");
    }
    res
}

fn build_plan<S, P>(
    store: &SlotStore,
    screens: &S,
    playlists: &P,
    candidate: &Candidate,
) -> Result<Plan, ValidationError>
where
    S: ScreenDirectory + ?Sized,
    P: PlaylistDirectory + ?Sized,
{
    let targets = resolve_screens(screens, &candidate.screens)?;
    let branch_id = common_branch(&targets)?;

    let days = candidate.days.specs();
    if days.is_empty() {
        return Err(ValidationError::NoDays);
    }

    if let Some(zone) = candidate.zones.missing_zone() {
        return Err(ValidationError::MissingZonePlaylist { zone });
    }
    let duration = longest_playlist_minutes(playlists, &candidate.zones)?;
    whole_minutes(candidate)?;

    let (template, spans) = match &candidate.kind {
        CandidateKind::Playlist { mode, priority } => {
            if !(MIN_PRIORITY..=MAX_PRIORITY).contains(priority) {
                return Err(ValidationError::InvalidPriority(*priority));
            }
            let span = match mode {
                PlaylistMode::SingleShot => {
                    if duration == 0 {
                        return Err(ValidationError::ZeroDuration);
                    }
                    let end = candidate
                        .start_time
                        .checked_add_minutes(duration)
                        .ok_or_else(|| ValidationError::EndsAfterMidnight {
                            start: candidate.start_time.to_string(),
                        })?;
                    (candidate.start_time, end)
                }
                PlaylistMode::Recurring => (
                    candidate.start_time,
                    window_end(candidate.start_time, candidate.end_time)?,
                ),
            };
            let template = Template {
                slot_type: SlotType::Playlist,
                priority: *priority,
                recurring: *mode == PlaylistMode::Recurring,
            };
            (template, vec![span])
        }
        CandidateKind::Advertisement { repeat } => {
            if duration == 0 {
                return Err(ValidationError::ZeroDuration);
            }
            let end = window_end(candidate.start_time, candidate.end_time)?;
            let spans = expand_advertisement(candidate.start_time, end, duration, repeat)?;
            let template = Template {
                slot_type: SlotType::Advertisement,
                priority: 0,
                recurring: false,
            };
            (template, spans)
        }
    };

    let mut blocks: Vec<ScheduledBlock> = Vec::with_capacity(targets.len() * days.len() * spans.len());
    for screen in &targets {
        for day in &days {
            for (start, end) in &spans {
                let block = template.build(screen, &branch_id, *day, *start, *end, &candidate.zones);
                if let Some(existing) = store
                    .blocks(&screen.id, block.mode())
                    .into_iter()
                    .chain(blocks.iter().filter(|b| b.screen_id == screen.id))
                    .find(|existing| existing.conflicts_with(&block))
                {
                    return Err(ValidationError::Conflict {
                        screen_id: screen.id.clone(),
                        conflicting: Box::new(existing.clone()),
                    });
                }
                blocks.push(block);
            }
        }
    }

    Ok(Plan { branch_id, blocks })
}

struct Template {
    slot_type: SlotType,
    priority: u8,
    recurring: bool,
}

impl Template {
    fn build(
        &self,
        screen: &ScreenInfo,
        branch_id: &str,
        day: DaySpec,
        start: TimeOfDay,
        end: TimeOfDay,
        zones: &ZoneAssignments,
    ) -> ScheduledBlock {
        let block = ScheduledBlock::new(screen.id.clone(), branch_id, day, start, end)
            .with_zones(zones.clone());
        match self.slot_type {
            SlotType::Playlist => block.with_priority(self.priority).recurring(self.recurring),
            SlotType::Advertisement => block.advertisement(),
        }
    }
}

fn resolve_screens<'a, S>(
    screens: &'a S,
    selection: &ScreenSelection,
) -> Result<Vec<&'a ScreenInfo>, ValidationError>
where
    S: ScreenDirectory + ?Sized,
{
    let resolved: Vec<&ScreenInfo> = match selection {
        ScreenSelection::Screens(ids) => {
            let mut out: Vec<&ScreenInfo> = Vec::with_capacity(ids.len());
            for id in ids {
                let screen = screens
                    .screen(id)
                    .ok_or_else(|| ValidationError::UnknownScreen(id.clone()))?;
                if !out.iter().any(|s| s.id == screen.id) {
                    out.push(screen);
                }
            }
            out
        }
        ScreenSelection::Group(group_id) => screens.screens_in_group(group_id),
    };

    if resolved.is_empty() {
        return Err(ValidationError::NoScreens);
    }
    Ok(resolved)
}

fn common_branch(targets: &[&ScreenInfo]) -> Result<String, ValidationError> {
    let first = &targets[0].branch_id;
    if let Some(other) = targets.iter().find(|s| &s.branch_id != first) {
        return Err(ValidationError::BranchMismatch {
            first: first.clone(),
            other: other.branch_id.clone(),
        });
    }
    Ok(first.clone())
}

fn longest_playlist_minutes<P>(playlists: &P, zones: &ZoneAssignments) -> Result<u32, ValidationError>
where
    P: PlaylistDirectory + ?Sized,
{
    let mut longest = 0;
    for id in zones.playlist_ids() {
        let playlist = playlists
            .playlist(&id)
            .ok_or_else(|| ValidationError::UnknownPlaylist(id.clone()))?;
        longest = longest.max(playlist.duration_minutes());
    }
    Ok(longest)
}

/// The wire carries `HH:MM`, so anything finer would come back as a different block.
fn whole_minutes(candidate: &Candidate) -> Result<(), ValidationError> {
    let explicit: &[TimeOfDay] = match &candidate.kind {
        CandidateKind::Advertisement {
            repeat: AdRepeat::At { times },
        } => times.as_slice(),
        _ => &[],
    };
    let all = [candidate.start_time]
        .into_iter()
        .chain(candidate.end_time)
        .chain(explicit.iter().copied());
    for t in all {
        if t.has_seconds() {
            return Err(ValidationError::SubMinuteTime(t.to_string()));
        }
    }
    Ok(())
}

/// End of a requested window. No end, or `00:00 -> 00:00`, means the rest of the day.
fn window_end(start: TimeOfDay, end: Option<TimeOfDay>) -> Result<TimeOfDay, ValidationError> {
    match end {
        None => Ok(TimeOfDay::END_OF_DAY),
        Some(e) if start.is_midnight() && e.is_midnight() => Ok(TimeOfDay::END_OF_DAY),
        Some(e) if e <= start => Err(ValidationError::InvalidTimeRange),
        Some(e) => Ok(e),
    }
}

/// Concrete `[start, end)` repetitions of an advertisement within `[start, end)`.
pub fn expand_advertisement(
    start: TimeOfDay,
    end: TimeOfDay,
    duration_minutes: u32,
    repeat: &AdRepeat,
) -> Result<Vec<(TimeOfDay, TimeOfDay)>, ValidationError> {
    let mut out = Vec::new();

    match repeat {
        AdRepeat::EveryMinutes { interval } | AdRepeat::EveryHours { interval } => {
            let step = match repeat {
                AdRepeat::EveryHours { .. } => interval.saturating_mul(60),
                _ => *interval,
            };
            if step == 0 {
                return Err(ValidationError::InvalidInterval);
            }
            if step < duration_minutes {
                return Err(ValidationError::IntervalShorterThanDuration {
                    interval: step,
                    duration: duration_minutes,
                });
            }

            let mut t = start;
            while let Some(slot_end) = t.checked_add_minutes(duration_minutes) {
                if slot_end > end {
                    break;
                }
                out.push((t, slot_end));
                match t.checked_add_minutes(step) {
                    Some(next) => t = next,
                    None => break,
                }
            }
        }
        AdRepeat::At { times } => {
            let mut times = times.clone();
            times.sort();
            times.dedup();

            for t in times.into_iter().filter(|t| *t >= start) {
                let Some(slot_end) = t.checked_add_minutes(duration_minutes) else { continue };
                if slot_end > end {
                    continue;
                }
                if let Some((prev, _)) = out.last() {
                    let gap = t.minutes() - TimeOfDay::minutes(*prev);
                    if gap < duration_minutes {
                        return Err(ValidationError::IntervalShorterThanDuration {
                            interval: gap,
                            duration: duration_minutes,
                        });
                    }
                }
                out.push((t, slot_end));
            }
        }
    }

    if out.is_empty() {
        return Err(ValidationError::NoAdvertisementSlots);
    }
    Ok(out)
}
