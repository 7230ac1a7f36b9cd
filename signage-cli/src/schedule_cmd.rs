use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use serde_json::Value;
use std::path::Path;

use signage_core::{
    layout_days, local_today, Candidate, DayFilter, DayOfWeek, Directory, LaidOutBlock, Plan,
    ScheduledBlock, Scheduler, SplitCount, ZoneModel,
};
use signage_ingest::parse_snapshot_text;

use crate::config::Config;
use crate::state::{self, SessionState};
use crate::DayArgs;

type Session = Scheduler<Directory, Directory>;

fn open() -> Result<(Session, signage_sync::SyncClient)> {
    let directory = state::load_directory()?;
    let SessionState { store, zones, sync } = state::load_state()?;
    Ok((
        Scheduler::with_state(directory.clone(), directory, store, zones),
        sync,
    ))
}

fn close(scheduler: Session, sync: signage_sync::SyncClient) -> Result<()> {
    let (store, zones) = scheduler.into_parts();
    state::save_state(&SessionState { store, zones, sync })
}

/// Read a candidate file. Without `zones`, the draft of the first target screen
/// (or the bulk base) is used.
fn read_candidate(path: &Path, zones: &ZoneModel) -> Result<Candidate> {
    let mut raw: Value = state::read_json_file(path)?;
    let Some(obj) = raw.as_object_mut() else {
        bail!("{} is not a JSON object", path.display());
    };

    if !obj.contains_key("zones") {
        let screen = obj
            .get("screens")
            .and_then(|s| s.get("screens"))
            .and_then(|s| s.get(0))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| zones.bulk_selection().map(|b| b.base.clone()))
            .ok_or_else(|| anyhow!("candidate has no zones and no screen to take a draft from"))?;
        obj.insert(
            "zones".to_string(),
            serde_json::to_value(zones.zone_assignments(&screen))?,
        );
    }

    serde_json::from_value(raw).with_context(|| format!("parse candidate {}", path.display()))
}

fn print_plan(plan: &Plan) {
    println!("Branch {}: {} block(s)", plan.branch_id, plan.blocks.len());
    for b in &plan.blocks {
        println!("  {}", describe(b));
    }
}

fn describe(b: &ScheduledBlock) -> String {
    format!(
        "{} {} {}-{} {} p{}{} [{}]",
        b.screen_id,
        b.day.label(),
        b.start_time,
        b.end_time,
        b.slot_type.as_str(),
        b.priority,
        if b.is_recurring { " recurring" } else { "" },
        b.playlist_ids.join(", ")
    )
}

pub fn validate(candidate: &Path) -> Result<()> {
    let (scheduler, _) = open()?;
    let candidate = read_candidate(candidate, scheduler.zones())?;
    match scheduler.validate(&candidate) {
        Ok(plan) => {
            println!("OK");
            print_plan(&plan);
            Ok(())
        }
        Err(e) => bail!("rejected: {e}"),
    }
}

pub fn add(candidate: &Path) -> Result<()> {
    let (mut scheduler, sync) = open()?;
    let candidate = read_candidate(candidate, scheduler.zones())?;
    let ids = scheduler
        .submit(&candidate)
        .map_err(|e| anyhow!("rejected: {e}"))?;
    println!("Added {} pending block(s)", ids.len());
    close(scheduler, sync)
}

pub fn edit(screen: &str, block: &Path, candidate: &Path) -> Result<()> {
    let (mut scheduler, sync) = open()?;
    let original: ScheduledBlock = state::read_json_file(block)?;
    seed_draft(scheduler.zones_mut(), screen, &original);
    let candidate = read_candidate(candidate, scheduler.zones())?;
    let ids = scheduler
        .edit(screen, &original, &candidate)
        .map_err(|e| anyhow!("rejected, block kept: {e}"))?;
    println!("Replaced block with {} pending block(s)", ids.len());
    close(scheduler, sync)
}

/// An edit starts from the zones of the block being replaced.
fn seed_draft(zones: &mut ZoneModel, screen: &str, original: &ScheduledBlock) {
    if original.zone_assignments.has_any_playlist() {
        zones.load(screen, &original.zone_assignments);
    }
}

pub fn remove(screen: &str, block: &Path) -> Result<()> {
    let (mut scheduler, sync) = open()?;
    let target: ScheduledBlock = state::read_json_file(block)?;
    match scheduler.remove(screen, &target) {
        Some(removed) => println!("Removed {}", describe(&removed)),
        None => bail!("no matching block on screen {screen}"),
    }
    close(scheduler, sync)
}

fn day_filter(day: &DayArgs) -> Result<DayFilter> {
    match (day.date, day.weekday) {
        (Some(d), _) => Ok(DayFilter::Date(d)),
        (None, Some(w)) => Ok(DayFilter::Weekday(w)),
        (None, None) => bail!("pass --date or --weekday"),
    }
}

pub fn clear(day: &DayArgs, screens: Vec<String>) -> Result<()> {
    let filter = day_filter(day)?;
    let (mut scheduler, sync) = open()?;
    let only = (!screens.is_empty()).then_some(screens);
    let removed = scheduler.clear_day(&filter, only.as_deref());
    println!("Cleared {removed} block(s) on {filter}");
    close(scheduler, sync)
}

pub fn layout(cfg: &Config, screen: &str, day: &DayArgs, today: bool) -> Result<()> {
    let (scheduler, _) = open()?;

    let days = if today {
        let date = local_today(&cfg.schedule.timezone, Utc::now())?;
        vec![DayFilter::Weekday(DayOfWeek::of_date(date)), DayFilter::Date(date)]
    } else {
        vec![day_filter(day)?]
    };

    for (filter, blocks) in layout_days(scheduler.store(), screen, &days) {
        println!("{screen} on {filter}:");
        if blocks.is_empty() {
            println!("  (nothing scheduled)");
        }
        for laid in &blocks {
            print_laid_out(laid);
        }
    }
    Ok(())
}

fn print_laid_out(laid: &LaidOutBlock<'_>) {
    let b = laid.block;
    let p = laid.placement;
    println!(
        "  col {}/{} width {:>3.0}% left {:.2} | {}-{} {} p{} [{}]",
        p.column + 1,
        p.columns,
        p.width_fraction() * 100.0,
        p.left_fraction(0.0),
        b.start_time,
        b.end_time,
        b.slot_type.as_str(),
        b.priority,
        b.playlist_ids.join(", ")
    );
}

pub fn zones_show(screen: &str) -> Result<()> {
    let SessionState { zones, .. } = state::load_state()?;
    let draft = zones.zone_assignments(screen);
    println!("{screen}: {} zone(s)", draft.count.get());
    for z in draft.count.zones() {
        let marker = if zones.active_zone(screen) == Some(z) { "*" } else { " " };
        println!(" {marker}{z}: {}", draft.playlist_for(z).unwrap_or("-"));
    }
    if let Some(bulk) = zones.bulk_selection() {
        println!("bulk: {} -> {}", bulk.base, bulk.targets.join(", "));
    }
    Ok(())
}

pub fn zones_split(screen: &str, count: u8) -> Result<()> {
    let count = SplitCount::try_from(count)?;
    let mut session = state::load_state()?;
    session.zones.set_split_count(screen, count);
    state::save_state(&session)?;
    zones_show(screen)
}

pub fn zones_assign(screen: &str, zone: u8, playlist: Option<String>) -> Result<()> {
    let mut session = state::load_state()?;
    if let Some(id) = &playlist {
        let directory = state::load_directory()?;
        if !directory.playlists.iter().any(|p| &p.id == id) {
            tracing::warn!(playlist = %id, "playlist is not in the directory; validation will reject it");
        }
    }
    session.zones.assign_zone_playlist(screen, zone, playlist)?;
    session.zones.set_active_zone(screen, Some(zone))?;
    state::save_state(&session)?;
    zones_show(screen)
}

pub fn zones_bulk(base: &str, targets: Vec<String>) -> Result<()> {
    let mut session = state::load_state()?;
    session.zones.select_bulk(base, targets);
    state::save_state(&session)?;
    zones_show(base)
}

pub fn zones_unbulk() -> Result<()> {
    let mut session = state::load_state()?;
    session.zones.clear_bulk();
    state::save_state(&session)?;
    println!("Bulk selection cleared");
    Ok(())
}

pub fn import(snapshot: &Path) -> Result<()> {
    let text = std::fs::read_to_string(snapshot)
        .with_context(|| format!("read {}", snapshot.display()))?;
    let report = parse_snapshot_text(&text)?;
    let mut session = state::load_state()?;

    for s in &report.skipped {
        println!("skipped rule {} slot {:?}: {}", s.rule, s.slot, s.reason);
    }
    let merged = session.store.merge_snapshot(report.blocks);
    println!(
        "Merged: {} added, {} confirmed, {} already present",
        merged.added, merged.confirmed, merged.skipped
    );
    state::save_state(&session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use signage_core::{CandidateKind, ZoneAssignments};

    fn write_tmp(name: &str, body: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("signage-cmd-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn candidate_without_zones_takes_the_screen_draft() {
        let path = write_tmp(
            "no-zones.json",
            r#"{
                "screens": {"screens": ["s1"]},
                "days": {"weekdays": ["MONDAY"]},
                "startTime": "08:00",
                "endTime": "09:00",
                "kind": "playlist",
                "mode": "recurring",
                "priority": 2
            }"#,
        );
        let mut zones = ZoneModel::new();
        zones.assign_zone_playlist("s1", 0, Some("pl-a".into())).unwrap();

        let c = read_candidate(&path, &zones).unwrap();
        assert_eq!(c.zones, ZoneAssignments::single("pl-a"));
        assert!(matches!(c.kind, CandidateKind::Playlist { priority: 2, .. }));
    }

    #[test]
    fn explicit_zones_win_over_the_draft() {
        let path = write_tmp(
            "zones.json",
            r#"{
                "screens": {"group": "lobby"},
                "days": {"dates": ["2026-03-02"]},
                "startTime": "08:00",
                "kind": "advertisement",
                "repeat": {"mode": "everyMinutes", "interval": 30},
                "zones": {"count": 1, "zonePlaylists": {"0": "ad"}}
            }"#,
        );
        let c = read_candidate(&path, &ZoneModel::new()).unwrap();
        assert_eq!(c.zones, ZoneAssignments::single("ad"));
        assert!(c.end_time.is_none());
    }

    #[test]
    fn edit_candidate_without_zones_takes_the_original_blocks_zones() {
        let path = write_tmp(
            "edit-no-zones.json",
            r#"{"screens": {"screens": ["s1"]}, "days": {"weekdays": ["MONDAY"]},
                "startTime": "10:00", "endTime": "11:00", "kind": "playlist",
                "mode": "recurring", "priority": 1}"#,
        );
        let zones_of_block = ZoneAssignments::new(SplitCount::Two)
            .with_zone(0, "pl-a")
            .with_zone(1, "pl-b");
        let original = ScheduledBlock::new(
            "s1",
            "b1",
            signage_core::DaySpec::weekday(DayOfWeek::Monday),
            "08:00".parse().unwrap(),
            "09:00".parse().unwrap(),
        )
        .with_zones(zones_of_block.clone());

        let mut zones = ZoneModel::new();
        zones.assign_zone_playlist("s1", 0, Some("other".into())).unwrap();
        seed_draft(&mut zones, "s1", &original);

        let c = read_candidate(&path, &zones).unwrap();
        assert_eq!(c.zones, zones_of_block);
    }

    #[test]
    fn group_candidate_without_zones_or_bulk_is_refused() {
        let path = write_tmp(
            "group-no-zones.json",
            r#"{"screens": {"group": "lobby"}, "days": {"weekdays": ["MONDAY"]},
                "startTime": "08:00", "kind": "playlist", "mode": "singleShot", "priority": 1}"#,
        );
        assert!(read_candidate(&path, &ZoneModel::new()).is_err());
    }
}
