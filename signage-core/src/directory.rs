//! Collaborator directories the scheduler reads from: screens and playlists.
//!
//! Real adapters (REST fetches, caches) live outside the core; [`Directory`] is
//! the in-memory form loaded from a JSON file or built in tests.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenInfo {
    pub id: String,
    pub branch_id: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub total_duration_seconds: u32,
    #[serde(default)]
    pub child_files: Vec<String>,
}

impl PlaylistInfo {
    /// Duration rounded up to whole minutes.
    pub fn duration_minutes(&self) -> u32 {
        self.total_duration_seconds.div_ceil(60)
    }
}

pub trait ScreenDirectory {
    fn screen(&self, id: &str) -> Option<&ScreenInfo>;
    fn screens_in_group(&self, group_id: &str) -> Vec<&ScreenInfo>;
}

pub trait PlaylistDirectory {
    fn playlist(&self, id: &str) -> Option<&PlaylistInfo>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    #[serde(default)]
    pub screens: Vec<ScreenInfo>,
    #[serde(default)]
    pub playlists: Vec<PlaylistInfo>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_screen(
        mut self,
        id: impl Into<String>,
        branch_id: impl Into<String>,
        group_id: Option<&str>,
    ) -> Self {
        let id = id.into();
        self.screens.push(ScreenInfo {
            name: id.clone(),
            id,
            branch_id: branch_id.into(),
            group_id: group_id.map(str::to_string),
        });
        self
    }

    pub fn with_playlist(mut self, id: impl Into<String>, total_duration_seconds: u32) -> Self {
        let id = id.into();
        self.playlists.push(PlaylistInfo {
            name: id.clone(),
            id,
            total_duration_seconds,
            child_files: Vec::new(),
        });
        self
    }
}

impl ScreenDirectory for Directory {
    fn screen(&self, id: &str) -> Option<&ScreenInfo> {
        self.screens.iter().find(|s| s.id == id)
    }

    fn screens_in_group(&self, group_id: &str) -> Vec<&ScreenInfo> {
        self.screens
            .iter()
            .filter(|s| s.group_id.as_deref() == Some(group_id))
            .collect()
    }
}

impl PlaylistDirectory for Directory {
    fn playlist(&self, id: &str) -> Option<&PlaylistInfo> {
        self.playlists.iter().find(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_rounds_up_to_minutes() {
        let d = Directory::new().with_playlist("p", 61);
        assert_eq!(d.playlist("p").unwrap().duration_minutes(), 2);
        let d = Directory::new().with_playlist("p", 0);
        assert_eq!(d.playlist("p").unwrap().duration_minutes(), 0);
    }

    #[test]
    fn groups_resolve_to_member_screens() {
        let d = Directory::new()
            .with_screen("a", "b1", Some("lobby"))
            .with_screen("b", "b1", Some("lobby"))
            .with_screen("c", "b1", None);
        let ids: Vec<&str> = d.screens_in_group("lobby").iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn parses_directory_json() {
        let json = r#"{
            "screens": [{"id": "s1", "branchId": "b1", "groupId": "g", "name": "Lobby"}],
            "playlists": [{"id": "p1", "name": "Promo", "totalDurationSeconds": 90, "childFiles": ["a.mp4"]}]
        }"#;
        let d: Directory = serde_json::from_str(json).unwrap();
        assert_eq!(d.screen("s1").unwrap().branch_id, "b1");
        assert_eq!(d.playlist("p1").unwrap().child_files.len(), 1);
    }
}
