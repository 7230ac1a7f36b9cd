//! Schedule snapshot normalizer.
//!
//! The server answers `getByBranchIds` with either one "rule" object or an array of
//! them. Each rule carries `timeSlots`, sometimes as an array and sometimes as a
//! JSON-encoded string. Slots mix camelCase and snake_case keys, send booleans as
//! strings, and send times as `HH:MM` or `HH:MM:SS`.
//!
//! Everything is folded into the canonical [`ScheduledBlock`] here. A bad slot is
//! skipped with a warning; the rest of the snapshot still goes through.

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use serde_json::{Map, Value};

use signage_core::{
    parse_date, DayOfWeek, DaySpec, ScheduledBlock, SlotType, SplitCount, TimeOfDay,
    ZoneAssignments, ADVERTISEMENT_PRIORITY, MIN_PRIORITY,
};

use crate::types::{IngestReport, SkippedSlot};

/// Rule-level values a slot falls back to.
#[derive(Debug, Clone, Default)]
struct RuleDefaults {
    branch_id: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

/// Parse a raw payload string, then normalize it.
pub fn parse_snapshot_text(text: &str) -> Result<IngestReport> {
    let payload: Value = serde_json::from_str(text).context("parse snapshot json")?;
    Ok(normalize_snapshot(&payload))
}

pub fn normalize_snapshot(payload: &Value) -> IngestReport {
    let mut report = IngestReport::default();

    let rules: Vec<&Value> = match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => match field(obj, &["rules", "schedules"]) {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => vec![payload],
        },
        Value::Null => Vec::new(),
        other => {
            tracing::warn!(kind = %kind_of(other), "snapshot payload is not an object or array");
            return report;
        }
    };

    for (rule_idx, rule) in rules.into_iter().enumerate() {
        let Value::Object(rule) = rule else {
            skip(&mut report, rule_idx, None, "rule is not an object".to_string());
            continue;
        };

        if report.schedule_id.is_none() {
            report.schedule_id = field(rule, &["id", "scheduleId", "schedule_id", "_id"]).and_then(as_string);
        }

        let defaults = RuleDefaults {
            branch_id: field(rule, &["branchId", "branch_id"]).and_then(as_string),
            start_date: field(rule, &["startDate", "start_date"])
                .and_then(as_string)
                .and_then(|s| parse_date(&s).ok()),
            end_date: field(rule, &["endDate", "end_date"])
                .and_then(as_string)
                .and_then(|s| parse_date(&s).ok()),
        };

        let slots = match time_slots(rule) {
            Ok(slots) => slots,
            Err(e) => {
                skip(&mut report, rule_idx, None, format!("{e:#}"));
                continue;
            }
        };

        for (slot_idx, slot) in slots.iter().enumerate() {
            match normalize_slot_with(slot, &defaults) {
                Ok(block) => report.blocks.push(block),
                Err(e) => skip(&mut report, rule_idx, Some(slot_idx), format!("{e:#}")),
            }
        }
    }

    report
}

/// Normalize a single slot object with no rule-level fallbacks.
pub fn normalize_slot(slot: &Value) -> Result<ScheduledBlock> {
    normalize_slot_with(slot, &RuleDefaults::default())
}

fn time_slots(rule: &Map<String, Value>) -> Result<Vec<Value>> {
    match field(rule, &["timeSlots", "time_slots", "slots"]) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Vec::new()),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s).context("decode timeSlots string")? {
            Value::Array(items) => Ok(items),
            other => bail!("timeSlots string holds {}, not an array", kind_of(&other)),
        },
        Some(other) => bail!("timeSlots is {}, not an array", kind_of(other)),
    }
}

fn normalize_slot_with(slot: &Value, defaults: &RuleDefaults) -> Result<ScheduledBlock> {
    let obj = slot.as_object().ok_or_else(|| anyhow!("slot is not an object"))?;

    let screen_id = field(obj, &["screenId", "screen_id"])
        .and_then(as_string)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("missing screenId"))?;

    let branch_id = field(obj, &["branchId", "branch_id"])
        .and_then(as_string)
        .or_else(|| defaults.branch_id.clone())
        .ok_or_else(|| anyhow!("missing branchId"))?;

    let priority = match field(obj, &["priority"]) {
        Some(v) => as_u8(v).ok_or_else(|| anyhow!("invalid priority {v}"))?,
        None => MIN_PRIORITY,
    };

    let slot_type = match field(obj, &["type", "slotType", "slot_type"]).and_then(as_string) {
        Some(t) => match t.to_uppercase().as_str() {
            "PLAYLIST" => SlotType::Playlist,
            "ADVERTISEMENT" | "AD" => SlotType::Advertisement,
            _ => bail!("unknown slot type '{t}'"),
        },
        // Old payloads mark advertisements only through the reserved priority.
        None if priority == ADVERTISEMENT_PRIORITY => SlotType::Advertisement,
        None => SlotType::Playlist,
    };

    let day = day_spec(obj, defaults)?;

    let start_time = time_field(obj, &["startTime", "start_time"])?;
    // An end of `23:59` comes back as end of day from `ScheduledBlock::new`.
    let end_time = time_field(obj, &["endTime", "end_time"])?;

    let is_recurring = field(obj, &["isRecurring", "is_recurring", "recurring"])
        .and_then(as_bool)
        .unwrap_or(false);

    let zones = zone_assignments(obj)?;

    let block = ScheduledBlock::new(screen_id, branch_id, day, start_time, end_time).with_zones(zones);
    let block = match slot_type {
        SlotType::Playlist => block.with_priority(priority).recurring(is_recurring),
        SlotType::Advertisement => block.advertisement(),
    };
    Ok(block)
}

fn day_spec(obj: &Map<String, Value>, defaults: &RuleDefaults) -> Result<DaySpec> {
    if let Some(day) = field(obj, &["dayOfWeek", "day_of_week", "day"])
        .and_then(as_string)
        .filter(|s| !s.trim().is_empty())
    {
        return Ok(DaySpec::weekday(DayOfWeek::parse(&day)?));
    }

    let date = |names: &[&str]| -> Result<Option<NaiveDate>> {
        field(obj, names)
            .and_then(as_string)
            .map(|s| parse_date(&s))
            .transpose()
            .map_err(Into::into)
    };

    let start = date(&["startDate", "start_date", "date"])?.or(defaults.start_date);
    let end = date(&["endDate", "end_date"])?.or(defaults.end_date);

    match (start, end) {
        (Some(s), Some(e)) if e >= s => Ok(DaySpec::Calendar { start_date: s, end_date: e }),
        (Some(s), Some(e)) => bail!("endDate {e} before startDate {s}"),
        (Some(s), None) => Ok(DaySpec::date(s)),
        _ => bail!("neither dayOfWeek nor startDate"),
    }
}

fn time_field(obj: &Map<String, Value>, names: &[&str]) -> Result<TimeOfDay> {
    let raw = field(obj, names)
        .and_then(as_string)
        .ok_or_else(|| anyhow!("missing {}", names[0]))?;
    Ok(TimeOfDay::parse(&raw)?)
}

fn zone_assignments(obj: &Map<String, Value>) -> Result<ZoneAssignments> {
    let raw = match field(obj, &["zoneAssignments", "zone_assignments"]) {
        Some(Value::String(s)) if !s.trim().is_empty() => {
            Some(serde_json::from_str::<Value>(s).context("decode zoneAssignments string")?)
        }
        Some(v @ Value::Object(_)) => Some(v.clone()),
        _ => None,
    };

    if let Some(Value::Object(z)) = raw {
        let count = match field(&z, &["count", "splitCount", "split_count"]) {
            Some(v) => {
                let n = as_u8(v).ok_or_else(|| anyhow!("invalid zone count {v}"))?;
                SplitCount::try_from(n)?
            }
            None => SplitCount::One,
        };

        let mut zones = ZoneAssignments::new(count);
        if let Some(Value::Object(map)) = field(&z, &["zonePlaylists", "zone_playlists"]) {
            for (key, value) in map {
                let zone: u8 = key
                    .trim()
                    .parse()
                    .with_context(|| format!("zone key '{key}'"))?;
                zones.zone_playlists.insert(zone, as_string(value));
            }
        }
        return Ok(zones);
    }

    // No zone structure: a single zone fed by the first listed playlist.
    let first = match field(obj, &["playlistIds", "playlist_ids"]) {
        Some(Value::Array(ids)) => ids.iter().find_map(as_string),
        _ => field(obj, &["playlistId", "playlist_id"]).and_then(as_string),
    };
    Ok(match first {
        Some(id) => ZoneAssignments::single(id),
        None => ZoneAssignments::new(SplitCount::One),
    })
}

/// First present, non-null value among `names`.
fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|n| obj.get(*n))
        .find(|v| !v.is_null())
}

fn as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" | "" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

fn as_u8(v: &Value) -> Option<u8> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn skip(report: &mut IngestReport, rule: usize, slot: Option<usize>, reason: String) {
    tracing::warn!(rule, slot = ?slot, %reason, "skipping snapshot slot");
    report.skipped.push(SkippedSlot { rule, slot, reason });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn t(s: &str) -> TimeOfDay {
        TimeOfDay::parse(s).unwrap()
    }

    #[test]
    fn camel_case_slot_with_string_encoded_time_slots() {
        let slots = json!([{
            "screenId": "s1",
            "branchId": "b1",
            "dayOfWeek": "MONDAY",
            "startTime": "08:00",
            "endTime": "10:30:00",
            "priority": 3,
            "type": "PLAYLIST",
            "isRecurring": true,
            "zoneAssignments": {"count": 2, "zonePlaylists": {"0": "p1", "1": "p2"}},
            "playlistIds": ["p1", "p2"]
        }]);
        let payload = json!({"id": "sch-9", "timeSlots": slots.to_string()});

        let report = normalize_snapshot(&payload);
        assert!(report.skipped.is_empty());
        assert_eq!(report.schedule_id.as_deref(), Some("sch-9"));

        let b = &report.blocks[0];
        assert_eq!(b.day, DaySpec::weekday(DayOfWeek::Monday));
        assert_eq!(b.start_time, t("08:00:00"));
        assert_eq!(b.end_time, t("10:30:00"));
        assert_eq!(b.priority, 3);
        assert!(b.is_recurring);
        assert_eq!(b.zone_assignments.count, SplitCount::Two);
        assert_eq!(b.playlist_ids, vec!["p1".to_string(), "p2".to_string()]);
    }

    #[test]
    fn snake_case_slot_with_string_booleans_and_rule_fallbacks() {
        let payload = json!([{
            "branch_id": "b7",
            "start_date": "2026-03-01",
            "end_date": "2026-03-01",
            "time_slots": [{
                "screen_id": "s2",
                "start_time": "09:00",
                "end_time": "09:10",
                "slot_type": "advertisement",
                "recurring": "true",
                "priority": "100",
                "playlist_ids": ["ad-1"]
            }]
        }]);

        let report = normalize_snapshot(&payload);
        assert!(report.skipped.is_empty(), "{:?}", report.skipped);
        let b = &report.blocks[0];
        assert_eq!(b.branch_id, "b7");
        assert_eq!(b.slot_type, SlotType::Advertisement);
        assert_eq!(b.priority, ADVERTISEMENT_PRIORITY);
        assert!(!b.is_recurring);
        assert_eq!(b.day, DaySpec::date(parse_date("2026-03-01").unwrap()));
        assert_eq!(b.zone_assignments, ZoneAssignments::single("ad-1"));
    }

    #[test]
    fn wire_end_of_day_is_restored() {
        let slot = json!({
            "screenId": "s1", "branchId": "b1", "dayOfWeek": "sunday",
            "startTime": "00:00", "endTime": "23:59", "isRecurring": "false"
        });
        let b = normalize_slot(&slot).unwrap();
        assert!(b.end_time.is_end_of_day());

        let with_seconds = json!({
            "screenId": "s1", "branchId": "b1", "dayOfWeek": "sunday",
            "startTime": "00:00", "endTime": "23:59:30"
        });
        assert_eq!(normalize_slot(&with_seconds).unwrap().end_time, t("23:59:30"));
    }

    #[test]
    fn bad_slots_are_skipped_but_the_rest_merges() {
        let payload = json!([
            {"timeSlots": "{not json"},
            {"timeSlots": [
                {"branchId": "b1", "dayOfWeek": "MONDAY", "startTime": "08:00", "endTime": "09:00"},
                {"screenId": "s1", "branchId": "b1", "dayOfWeek": "MONDAY", "startTime": "8am", "endTime": "09:00"},
                {"screenId": "s1", "branchId": "b1", "startTime": "08:00", "endTime": "09:00"},
                {"screenId": "s1", "branchId": "b1", "dayOfWeek": "MONDAY", "startTime": "08:00", "endTime": "09:00"}
            ]},
            "garbage"
        ]);

        let report = normalize_snapshot(&payload);
        assert_eq!(report.blocks.len(), 1);
        assert_eq!(report.skipped.len(), 5);
        assert_eq!(report.skipped[0].slot, None);
        assert!(report.skipped[1].reason.contains("screenId"));
        assert_eq!(report.skipped[4].rule, 2);
    }

    #[test]
    fn zone_assignments_may_arrive_as_string() {
        let slot = json!({
            "screenId": "s1", "branchId": "b1", "dayOfWeek": "FRI",
            "startTime": "08:00", "endTime": "09:00",
            "zoneAssignments": "{\"count\":4,\"zonePlaylists\":{\"0\":\"a\",\"1\":\"b\",\"2\":null,\"3\":\"d\"}}"
        });
        let b = normalize_slot(&slot).unwrap();
        assert_eq!(b.zone_assignments.count, SplitCount::Four);
        assert_eq!(b.zone_assignments.missing_zone(), Some(2));
        assert_eq!(b.playlist_ids, vec!["a".to_string(), "b".to_string(), "d".to_string()]);
    }

    #[test]
    fn bad_zone_count_is_an_error() {
        let slot = json!({
            "screenId": "s1", "branchId": "b1", "dayOfWeek": "FRI",
            "startTime": "08:00", "endTime": "09:00",
            "zoneAssignments": {"count": 3}
        });
        assert!(normalize_slot(&slot).is_err());
    }

    #[test]
    fn empty_and_null_payloads_yield_nothing() {
        assert_eq!(normalize_snapshot(&Value::Null), IngestReport::default());
        assert!(normalize_snapshot(&json!([])).blocks.is_empty());
        assert!(normalize_snapshot(&json!({"timeSlots": ""})).blocks.is_empty());
        assert!(parse_snapshot_text("nope").is_err());
    }
}
