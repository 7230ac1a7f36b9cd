//! Zone assignment draft state per screen.
//!
//! This is the composer's working copy: split factor, per-zone playlist and the
//! active zone. It is frozen into a [`ZoneAssignments`] when a block is committed.
//! When several screens are targeted for the same edit, every target mirrors the
//! base screen's state.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::block::{SplitCount, ZoneAssignments};
use crate::error::ZoneError;

/// Screens edited together: `targets` mirror `base`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSelection {
    pub base: String,
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneModel {
    split_count: HashMap<String, SplitCount>,
    zone_playlists: HashMap<String, BTreeMap<u8, Option<String>>>,
    active_zone: HashMap<String, u8>,
    selected_playlist: HashMap<String, String>,
    bulk: Option<BulkSelection>,
}

impl ZoneModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn split_count(&self, screen_id: &str) -> SplitCount {
        self.split_count.get(screen_id).copied().unwrap_or_default()
    }

    pub fn active_zone(&self, screen_id: &str) -> Option<u8> {
        self.active_zone.get(screen_id).copied()
    }

    /// Last non-null playlist assigned on this screen.
    pub fn selected_playlist(&self, screen_id: &str) -> Option<&str> {
        self.selected_playlist.get(screen_id).map(String::as_str)
    }

    pub fn bulk_selection(&self) -> Option<&BulkSelection> {
        self.bulk.as_ref()
    }

    /// Set the split factor, keeping zones `0..n` and dropping the rest.
    pub fn set_split_count(&mut self, screen_id: &str, count: SplitCount) {
        self.apply_split(screen_id, count);
        self.sync_bulk_from(screen_id);
    }

    pub fn assign_zone_playlist(
        &mut self,
        screen_id: &str,
        zone: u8,
        playlist_id: Option<String>,
    ) -> Result<(), ZoneError> {
        let count = self.split_count(screen_id);
        if zone >= count.get() {
            return Err(ZoneError::ZoneOutOfRange { zone, count: count.get() });
        }

        let playlist_id = playlist_id.filter(|p| !p.trim().is_empty());
        if let Some(p) = &playlist_id {
            self.selected_playlist.insert(screen_id.to_string(), p.clone());
        }

        self.zones_mut(screen_id).insert(zone, playlist_id);
        self.sync_bulk_from(screen_id);
        Ok(())
    }

    pub fn set_active_zone(&mut self, screen_id: &str, zone: Option<u8>) -> Result<(), ZoneError> {
        match zone {
            None => {
                self.active_zone.remove(screen_id);
            }
            Some(z) => {
                let count = self.split_count(screen_id);
                if z >= count.get() {
                    return Err(ZoneError::ZoneOutOfRange { zone: z, count: count.get() });
                }
                self.active_zone.insert(screen_id.to_string(), z);
            }
        }
        Ok(())
    }

    /// Frozen `{count, zonePlaylists}` for embedding into a block.
    pub fn zone_assignments(&self, screen_id: &str) -> ZoneAssignments {
        let count = self.split_count(screen_id);
        let mut zone_playlists: BTreeMap<u8, Option<String>> =
            count.zones().map(|z| (z, None)).collect();
        if let Some(existing) = self.zone_playlists.get(screen_id) {
            for (zone, playlist) in existing.iter().filter(|(z, _)| **z < count.get()) {
                zone_playlists.insert(*zone, playlist.clone());
            }
        }
        ZoneAssignments { count, zone_playlists }
    }

    /// Load a committed block's zones back into the draft (editing an existing block).
    pub fn load(&mut self, screen_id: &str, zones: &ZoneAssignments) {
        self.apply_split(screen_id, zones.count);
        for zone in zones.count.zones() {
            let playlist = zones.playlist_for(zone).map(str::to_string);
            if let Some(p) = &playlist {
                self.selected_playlist.insert(screen_id.to_string(), p.clone());
            }
            self.zones_mut(screen_id).insert(zone, playlist);
        }
        self.sync_bulk_from(screen_id);
    }

    /// Target several screens at once; all of them take `base`'s zone state.
    pub fn select_bulk(&mut self, base: &str, targets: Vec<String>) {
        let targets: Vec<String> = targets.into_iter().filter(|t| t != base).collect();
        if targets.is_empty() {
            self.bulk = None;
            return;
        }
        self.bulk = Some(BulkSelection {
            base: base.to_string(),
            targets,
        });
        self.sync_bulk_from(base);
    }

    pub fn clear_bulk(&mut self) {
        self.bulk = None;
    }

    fn apply_split(&mut self, screen_id: &str, count: SplitCount) {
        self.split_count.insert(screen_id.to_string(), count);

        let zones = self.zones_mut(screen_id);
        zones.retain(|z, _| *z < count.get());
        for z in count.zones() {
            zones.entry(z).or_insert(None);
        }

        if self.active_zone(screen_id).is_some_and(|z| z >= count.get()) {
            self.active_zone.remove(screen_id);
        }
    }

    fn zones_mut(&mut self, screen_id: &str) -> &mut BTreeMap<u8, Option<String>> {
        self.zone_playlists.entry(screen_id.to_string()).or_default()
    }

    /// Mirror `screen_id`'s state onto the bulk targets when it is the bulk base.
    fn sync_bulk_from(&mut self, screen_id: &str) {
        let Some(bulk) = self.bulk.clone() else { return };
        if bulk.base != screen_id {
            return;
        }

        let snapshot = self.zone_assignments(screen_id);
        for target in &bulk.targets {
            self.apply_split(target, snapshot.count);
            let zones = self.zones_mut(target);
            zones.clear();
            zones.extend(snapshot.zone_playlists.clone());
            if let Some(p) = snapshot.playlist_ids().into_iter().last() {
                self.selected_playlist.insert(target.clone(), p);
            }
        }
        tracing::debug!(base = %bulk.base, targets = bulk.targets.len(), "synced bulk zone state");
    }
}
