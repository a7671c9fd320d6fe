use std::time::Instant;

use crate::backend::{MixerBackend, SlotId};

/// Default SFX pool size (§4.1: "pool of N parallel slots (default N = 8)").
pub const DEFAULT_SFX_SLOTS: usize = 8;

#[derive(Debug, Clone, Copy)]
struct BgmState {
    file_path_idx: usize,
    /// Position at the moment playback last started/resumed/sought.
    base_position: f64,
    /// Wall-clock instant `base_position` was recorded, if currently playing
    /// (unset while paused or stopped). Open Question 2: wall-clock-elapsed
    /// position tracking rather than delegating to the backend.
    started_at: Option<Instant>,
    paused: bool,
}

/// L1 audio mixer façade: owns the BGM slot and the SFX pool, and tracks
/// position/playing-state bookkeeping the backend itself doesn't guarantee.
pub struct AudioEngine<B: MixerBackend> {
    backend: B,
    bgm: Option<BgmState>,
    bgm_paths: Vec<String>,
    bgm_volume: f64,
    sfx_volume: f64,
    sfx_slots: Vec<Option<String>>,
}

impl<B: MixerBackend> AudioEngine<B> {
    pub fn new(backend: B) -> Self {
        Self::with_sfx_slots(backend, DEFAULT_SFX_SLOTS)
    }

    pub fn with_sfx_slots(backend: B, n_slots: usize) -> Self {
        Self {
            backend,
            bgm: None,
            bgm_paths: Vec::new(),
            bgm_volume: 1.0,
            sfx_volume: 1.0,
            sfx_slots: vec![None; n_slots],
        }
    }

    pub fn play_bgm(&mut self, file_path: &str, start_pos: f64) -> bool {
        if let Some(prev) = self.bgm.take() {
            self.backend.stop(SlotId::Bgm);
            let _ = prev;
        }
        if !self.backend.start(SlotId::Bgm, file_path, start_pos) {
            log::warn!(target: "audio", "bgm load failed for {file_path}, leaving silent");
            self.bgm = None;
            return false;
        }
        self.backend.set_volume(SlotId::Bgm, self.bgm_volume.min(1.0));
        let idx = self.bgm_paths.len();
        self.bgm_paths.push(file_path.to_string());
        self.bgm = Some(BgmState {
            file_path_idx: idx,
            base_position: start_pos,
            started_at: Some(Instant::now()),
            paused: false,
        });
        true
    }

    pub fn pause_bgm(&mut self) {
        if let Some(bgm) = self.bgm.as_mut() {
            if !bgm.paused {
                bgm.base_position = current_position(bgm);
                bgm.started_at = None;
                bgm.paused = true;
                self.backend.stop(SlotId::Bgm);
            }
        }
    }

    pub fn resume_bgm(&mut self) {
        // Per the kernel's pause/resume contract, resume re-seeks rather
        // than relying on this; kept for backends that do support it.
        if let Some(bgm) = self.bgm.as_mut() {
            if bgm.paused {
                bgm.started_at = Some(Instant::now());
                bgm.paused = false;
            }
        }
    }

    /// Stops the BGM and returns the position it was halted at.
    pub fn stop_bgm(&mut self) -> f64 {
        let Some(bgm) = self.bgm.take() else {
            return 0.0;
        };
        let pos = current_position(&bgm);
        self.backend.stop(SlotId::Bgm);
        pos
    }

    pub fn get_bgm_position(&self) -> f64 {
        self.bgm.as_ref().map(current_position).unwrap_or(0.0)
    }

    pub fn is_bgm_playing(&self) -> bool {
        self.bgm.as_ref().map(|b| !b.paused).unwrap_or(false)
    }

    pub fn is_bgm_paused(&self) -> bool {
        self.bgm.as_ref().map(|b| b.paused).unwrap_or(false)
    }

    /// Checks (and clears) whether the BGM has reached natural end.
    pub fn check_bgm_end(&mut self) -> bool {
        if self.bgm.is_none() {
            return false;
        }
        if self.backend.has_finished(SlotId::Bgm) {
            self.bgm = None;
            true
        } else {
            false
        }
    }

    /// Starts an SFX in a free slot. Restarts it if `id`'s file is already
    /// playing in some slot (§4.1: "restarts that SFX"). Returns false if no
    /// slot is free.
    pub fn play_sfx(&mut self, id: &str, file_path: &str) -> bool {
        if let Some(slot) = self.find_sfx_slot(id) {
            self.backend.stop(SlotId::Sfx(slot));
            if self.backend.start(SlotId::Sfx(slot), file_path, 0.0) {
                self.backend.set_volume(SlotId::Sfx(slot), self.sfx_volume.min(1.0));
                true
            } else {
                self.sfx_slots[slot] = None;
                false
            }
        } else if let Some(slot) = self.sfx_slots.iter().position(|s| s.is_none()) {
            if self.backend.start(SlotId::Sfx(slot), file_path, 0.0) {
                self.backend.set_volume(SlotId::Sfx(slot), self.sfx_volume.min(1.0));
                self.sfx_slots[slot] = Some(id.to_string());
                true
            } else {
                false
            }
        } else {
            false
        }
    }

    pub fn stop_sfx(&mut self, id: &str) -> bool {
        if let Some(slot) = self.find_sfx_slot(id) {
            self.backend.stop(SlotId::Sfx(slot));
            self.sfx_slots[slot] = None;
            true
        } else {
            false
        }
    }

    pub fn stop_all_sfx(&mut self) {
        for slot in 0..self.sfx_slots.len() {
            if self.sfx_slots[slot].is_some() {
                self.backend.stop(SlotId::Sfx(slot));
                self.sfx_slots[slot] = None;
            }
        }
    }

    pub fn is_sfx_playing(&self, id: &str) -> bool {
        self.find_sfx_slot(id).is_some()
    }

    /// Command-surface clamp is 0..3 (§9 Open Question 1); the value passed
    /// to the backend is separately clamped to 0..1.
    pub fn set_bgm_volume(&mut self, volume: f64) {
        self.bgm_volume = volume.clamp(0.0, 3.0);
        self.backend.set_volume(SlotId::Bgm, self.bgm_volume.min(1.0));
    }

    pub fn set_sfx_volume(&mut self, volume: f64) {
        self.sfx_volume = volume.clamp(0.0, 3.0);
        for (slot, occupied) in self.sfx_slots.iter().enumerate() {
            if occupied.is_some() {
                self.backend.set_volume(SlotId::Sfx(slot), self.sfx_volume.min(1.0));
            }
        }
    }

    pub fn bgm_volume(&self) -> f64 {
        self.bgm_volume
    }

    pub fn sfx_volume(&self) -> f64 {
        self.sfx_volume
    }

    fn find_sfx_slot(&self, id: &str) -> Option<usize> {
        self.sfx_slots
            .iter()
            .position(|slot| slot.as_deref() == Some(id))
    }
}

fn current_position(bgm: &BgmState) -> f64 {
    match bgm.started_at {
        Some(started_at) => bgm.base_position + started_at.elapsed().as_secs_f64(),
        None => bgm.base_position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullMixerBackend;

    #[test]
    fn sfx_pool_rejects_beyond_capacity() {
        let mut engine = AudioEngine::with_sfx_slots(NullMixerBackend::new(), 2);
        assert!(engine.play_sfx("a", "a.wav"));
        assert!(engine.play_sfx("b", "b.wav"));
        assert!(!engine.play_sfx("c", "c.wav"));
    }

    #[test]
    fn replaying_same_sfx_id_restarts_in_place() {
        let mut engine = AudioEngine::with_sfx_slots(NullMixerBackend::new(), 2);
        assert!(engine.play_sfx("a", "a.wav"));
        assert!(engine.play_sfx("a", "a.wav"));
        assert!(engine.play_sfx("b", "b.wav"));
    }

    #[test]
    fn stop_bgm_returns_last_position() {
        let mut engine = AudioEngine::new(NullMixerBackend::new());
        engine.play_bgm("bgm.wav", 5.0);
        let pos = engine.stop_bgm();
        assert!(pos >= 5.0);
        assert!(!engine.is_bgm_playing());
    }

    #[test]
    fn volume_clamps_to_command_surface_range() {
        let mut engine = AudioEngine::new(NullMixerBackend::new());
        engine.set_bgm_volume(5.0);
        assert_eq!(engine.bgm_volume(), 3.0);
        engine.set_bgm_volume(-1.0);
        assert_eq!(engine.bgm_volume(), 0.0);
    }

    #[test]
    fn check_bgm_end_reports_once() {
        let mut engine = AudioEngine::new(NullMixerBackend::new());
        engine.play_bgm("bgm.wav", 0.0);
        assert!(!engine.check_bgm_end());
    }
}
