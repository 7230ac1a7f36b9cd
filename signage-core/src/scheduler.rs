//! Scheduler, the session's schedule service object.
//!
//! One instance per session, passed by reference to whoever needs it. It owns the
//! slot store and the zone draft model and reads screens/playlists through the
//! injected directories. Mutations only happen after the validator accepts.

use crate::block::{DayFilter, ScheduledBlock};
use crate::directory::{PlaylistDirectory, ScreenDirectory};
use crate::error::ValidationError;
use crate::layout::{layout_day, LaidOutBlock};
use crate::slot_store::{BlockId, SlotStore};
use crate::validator::{validate, Candidate, Plan};
use crate::zones::ZoneModel;

#[derive(Debug, Clone)]
pub struct Scheduler<S: ScreenDirectory, P: PlaylistDirectory> {
    screens: S,
    playlists: P,
    store: SlotStore,
    zones: ZoneModel,
    /// Last user-facing error, for display.
    last_error: Option<String>,
}

impl<S: ScreenDirectory, P: PlaylistDirectory> Scheduler<S, P> {
    pub fn new(screens: S, playlists: P) -> Self {
        Self::with_state(screens, playlists, SlotStore::new(), ZoneModel::new())
    }

    pub fn with_state(screens: S, playlists: P, store: SlotStore, zones: ZoneModel) -> Self {
        Self {
            screens,
            playlists,
            store,
            zones,
            last_error: None,
        }
    }

    pub fn screens(&self) -> &S {
        &self.screens
    }

    pub fn playlists(&self) -> &P {
        &self.playlists
    }

    pub fn store(&self) -> &SlotStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SlotStore {
        &mut self.store
    }

    pub fn zones(&self) -> &ZoneModel {
        &self.zones
    }

    pub fn zones_mut(&mut self) -> &mut ZoneModel {
        &mut self.zones
    }

    pub fn into_parts(self) -> (SlotStore, ZoneModel) {
        (self.store, self.zones)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Dry run: what `submit` would add, without touching the store.
    pub fn validate(&self, candidate: &Candidate) -> Result<Plan, ValidationError> {
        validate(&self.store, &self.screens, &self.playlists, candidate)
    }

    /// Validate and add the resulting blocks as pending.
    pub fn submit(&mut self, candidate: &Candidate) -> Result<Vec<BlockId>, ValidationError> {
        let plan = self.validate(candidate).inspect_err(|e| self.last_error = Some(e.to_string()))?;
        self.last_error = None;
        Ok(self.commit(plan))
    }

    pub fn remove(&mut self, screen_id: &str, block: &ScheduledBlock) -> Option<ScheduledBlock> {
        self.store.remove_block(screen_id, block)
    }

    /// Replace `original` with what `candidate` expands to. On rejection, or when
    /// `original` is not on the screen, the store is left exactly as it was.
    pub fn edit(
        &mut self,
        screen_id: &str,
        original: &ScheduledBlock,
        candidate: &Candidate,
    ) -> Result<Vec<BlockId>, ValidationError> {
        let mut trial = self.store.clone();
        let plan = match trial.remove_block(screen_id, original) {
            Some(_) => validate(&trial, &self.screens, &self.playlists, candidate),
            None => Err(ValidationError::BlockNotFound {
                screen_id: screen_id.to_string(),
                block: Box::new(original.clone()),
            }),
        }
        .inspect_err(|e| self.last_error = Some(e.to_string()))?;

        self.store = trial;
        self.last_error = None;
        Ok(self.commit(plan))
    }

    pub fn clear_day(&mut self, day: &DayFilter, screen_ids: Option<&[String]>) -> usize {
        self.store.clear_day(day, screen_ids)
    }

    pub fn layout(&self, screen_id: &str, day: &DayFilter) -> Vec<LaidOutBlock<'_>> {
        layout_day(&self.store.blocks_on(screen_id, day))
    }

    fn commit(&mut self, plan: Plan) -> Vec<BlockId> {
        let mut ids = Vec::with_capacity(plan.blocks.len());
        for (screen_id, blocks) in plan.by_screen() {
            ids.extend(self.store.add_blocks(&screen_id, blocks));
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{ScheduleMode, SplitCount};
    use crate::directory::Directory;
    use crate::slot_store::SyncState;
    use crate::time::{DayOfWeek, TimeOfDay};
    use crate::validator::{CandidateKind, DaySelection, PlaylistMode, ScreenSelection};

    fn scheduler() -> Scheduler<Directory, Directory> {
        let dir = Directory::new()
            .with_screen("s1", "b1", Some("lobby"))
            .with_screen("s2", "b1", Some("lobby"))
            .with_playlist("pl-a", 300)
            .with_playlist("pl-b", 600);
        Scheduler::new(dir.clone(), dir)
    }

    fn candidate(s: &Scheduler<Directory, Directory>, start: &str, end: &str) -> Candidate {
        Candidate {
            screens: ScreenSelection::Screens(vec!["s1".into()]),
            days: DaySelection::Weekdays(vec![DayOfWeek::Monday]),
            start_time: TimeOfDay::parse(start).unwrap(),
            end_time: Some(TimeOfDay::parse(end).unwrap()),
            kind: CandidateKind::Playlist {
                mode: PlaylistMode::Recurring,
                priority: 1,
            },
            zones: s.zones().zone_assignments("s1"),
        }
    }

    #[test]
    fn submit_uses_zone_draft_and_records_errors() {
        let mut s = scheduler();

        let err = s.submit(&candidate(&s, "08:00", "09:00")).unwrap_err();
        assert_eq!(err, ValidationError::MissingZonePlaylist { zone: 0 });
        assert!(s.last_error().unwrap().contains("zone 0"));

        s.zones_mut().set_split_count("s1", SplitCount::Two);
        s.zones_mut().assign_zone_playlist("s1", 0, Some("pl-a".into())).unwrap();
        s.zones_mut().assign_zone_playlist("s1", 1, Some("pl-b".into())).unwrap();

        let ids = s.submit(&candidate(&s, "08:00", "09:00")).unwrap();
        assert_eq!(ids.len(), 1);
        assert!(s.last_error().is_none());
        assert_eq!(s.store().get(ids[0]).unwrap().state, SyncState::Pending);
        assert_eq!(
            s.store().blocks("s1", ScheduleMode::Fixed)[0].playlist_ids,
            vec!["pl-a".to_string(), "pl-b".to_string()]
        );

        assert!(s.submit(&candidate(&s, "08:30", "09:30")).is_err());
        assert_eq!(s.store().len(), 1);
    }

    #[test]
    fn edit_moves_block_or_leaves_store_untouched() {
        let mut s = scheduler();
        s.zones_mut().assign_zone_playlist("s1", 0, Some("pl-a".into())).unwrap();
        s.submit(&candidate(&s, "08:00", "09:00")).unwrap();
        s.submit(&candidate(&s, "12:00", "13:00")).unwrap();

        let original = s.store().blocks("s1", ScheduleMode::Fixed)[0].clone();

        // Moving within its own old slot is not a self-conflict.
        s.edit("s1", &original, &candidate(&s, "08:30", "09:30")).unwrap();
        let starts: Vec<String> = s
            .store()
            .blocks("s1", ScheduleMode::Fixed)
            .iter()
            .map(|b| b.start_time.to_wire())
            .collect();
        assert_eq!(starts, vec!["12:00", "08:30"]);

        let moved = s.store().blocks("s1", ScheduleMode::Fixed)[1].clone();
        let before = s.store().len();
        assert!(s.edit("s1", &moved, &candidate(&s, "12:30", "13:30")).is_err());
        assert_eq!(s.store().len(), before);
        assert!(s.store().blocks("s1", ScheduleMode::Fixed).contains(&&moved));
    }

    #[test]
    fn edit_of_a_block_not_in_the_store_changes_nothing() {
        let mut s = scheduler();
        s.zones_mut().assign_zone_playlist("s1", 0, Some("pl-a".into())).unwrap();
        let ghost = ScheduledBlock::new(
            "s1",
            "b1",
            crate::block::DaySpec::weekday(DayOfWeek::Friday),
            TimeOfDay::parse("08:00").unwrap(),
            TimeOfDay::parse("09:00").unwrap(),
        );

        let err = s.edit("s1", &ghost, &candidate(&s, "10:00", "11:00")).unwrap_err();
        assert!(matches!(err, ValidationError::BlockNotFound { ref screen_id, .. } if screen_id == "s1"));
        assert!(s.store().is_empty());
        assert!(s.last_error().unwrap().contains("not on screen s1"));
    }

    #[test]
    fn layout_and_clear_day() {
        let mut s = scheduler();
        s.zones_mut().assign_zone_playlist("s1", 0, Some("pl-a".into())).unwrap();
        s.submit(&candidate(&s, "08:00", "10:00")).unwrap();
        let mut c = candidate(&s, "09:00", "11:00");
        c.kind = CandidateKind::Playlist { mode: PlaylistMode::Recurring, priority: 2 };
        s.submit(&c).unwrap();

        let monday = DayFilter::Weekday(DayOfWeek::Monday);
        let laid = s.layout("s1", &monday);
        assert_eq!(laid.len(), 2);
        assert!(laid.iter().all(|b| b.placement.columns == 2));

        assert_eq!(s.clear_day(&monday, None), 2);
        assert!(s.layout("s1", &monday).is_empty());
    }
}
