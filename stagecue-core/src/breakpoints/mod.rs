//! L3 breakpoint store: per-audio ordered sets of resume points (§4.3).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use stagecue_types::{AudioId, Breakpoint, BreakpointId};

use crate::error::KernelError;
use crate::persistence;
use crate::time::now_iso8601;

/// The on-disk shape: `{ "<audio_id>": [Breakpoint, ...] }` (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
struct BreakpointMap(HashMap<String, Vec<Breakpoint>>);

#[derive(Debug, Clone, Default)]
pub struct BreakpointStore {
    by_audio: HashMap<AudioId, Vec<Breakpoint>>,
}

impl BreakpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a fresh id and timestamp; duplicate positions are allowed.
    pub fn save(
        &mut self,
        audio_id: AudioId,
        position: f64,
        label: &str,
        auto_saved: bool,
    ) -> BreakpointId {
        let id = BreakpointId::new();
        let bp = Breakpoint {
            id,
            audio_id: audio_id.clone(),
            position,
            label: label.to_string(),
            created_at: now_iso8601(),
            auto_saved,
        };
        self.by_audio.entry(audio_id).or_default().push(bp);
        id
    }

    pub fn get_all(&self, audio_id: &AudioId) -> &[Breakpoint] {
        self.by_audio.get(audio_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, audio_id: &AudioId, bp_id: BreakpointId) -> Option<&Breakpoint> {
        self.by_audio
            .get(audio_id)?
            .iter()
            .find(|bp| bp.id == bp_id)
    }

    pub fn delete(&mut self, audio_id: &AudioId, bp_id: BreakpointId) -> bool {
        let Some(list) = self.by_audio.get_mut(audio_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|bp| bp.id != bp_id);
        list.len() != before
    }

    pub fn clear_audio(&mut self, audio_id: &AudioId) {
        self.by_audio.remove(audio_id);
    }

    /// Removes any of `bp_ids` across all audios, returning the count
    /// actually deleted.
    pub fn clear_selected(&mut self, bp_ids: &[BreakpointId]) -> usize {
        let mut removed = 0;
        for list in self.by_audio.values_mut() {
            let before = list.len();
            list.retain(|bp| !bp_ids.contains(&bp.id));
            removed += before - list.len();
        }
        removed
    }

    pub fn load_from_file(&mut self, path: &Path) -> Result<(), KernelError> {
        let map: BreakpointMap = persistence::load_json(path)?;
        self.by_audio = map
            .0
            .into_iter()
            .map(|(id, bps)| (AudioId::new(id), bps))
            .collect();
        Ok(())
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), KernelError> {
        let map = BreakpointMap(
            self.by_audio
                .iter()
                .map(|(id, bps)| (id.0.clone(), bps.clone()))
                .collect(),
        );
        persistence::save_json_atomic(path, &map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_get_all_contains_returned_id() {
        let mut store = BreakpointStore::new();
        let id = store.save(AudioId::new("a"), 7.5, "manual", false);
        assert!(store.get_all(&AudioId::new("a")).iter().any(|bp| bp.id == id));
    }

    #[test]
    fn mutating_one_audio_leaves_another_untouched() {
        let mut store = BreakpointStore::new();
        store.save(AudioId::new("a"), 1.0, "", false);
        let b_id = store.save(AudioId::new("b"), 2.0, "", false);
        let before = store.get_all(&AudioId::new("b")).to_vec();
        store.clear_audio(&AudioId::new("a"));
        assert_eq!(store.get_all(&AudioId::new("b")).to_vec(), before);
        assert!(store.get(&AudioId::new("b"), b_id).is_some());
    }

    #[test]
    fn clear_audio_then_get_all_is_empty() {
        let mut store = BreakpointStore::new();
        store.save(AudioId::new("a"), 1.0, "", false);
        store.save(AudioId::new("a"), 2.0, "", false);
        store.clear_audio(&AudioId::new("a"));
        assert!(store.get_all(&AudioId::new("a")).is_empty());
    }

    #[test]
    fn clear_selected_returns_actual_count() {
        let mut store = BreakpointStore::new();
        let a1 = store.save(AudioId::new("a"), 1.0, "", false);
        store.save(AudioId::new("a"), 2.0, "", false);
        let b1 = store.save(AudioId::new("b"), 3.0, "", false);
        let removed = store.clear_selected(&[a1, b1]);
        assert_eq!(removed, 2);
        assert_eq!(store.get_all(&AudioId::new("a")).len(), 1);
        assert!(store.get_all(&AudioId::new("b")).is_empty());
    }

    #[test]
    fn duplicate_positions_are_allowed() {
        let mut store = BreakpointStore::new();
        store.save(AudioId::new("a"), 5.0, "", false);
        store.save(AudioId::new("a"), 5.0, "", false);
        assert_eq!(store.get_all(&AudioId::new("a")).len(), 2);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("breakpoints.json");
        let mut store = BreakpointStore::new();
        store.save(AudioId::new("a"), 1.0, "manual", false);
        store.save(AudioId::new("b"), 2.0, "auto", true);
        store.save_to_file(&path).unwrap();

        let mut loaded = BreakpointStore::new();
        loaded.load_from_file(&path).unwrap();
        assert_eq!(loaded.get_all(&AudioId::new("a")).len(), 1);
        assert_eq!(loaded.get_all(&AudioId::new("b")).len(), 1);
    }
}
