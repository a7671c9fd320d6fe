use serde::{Deserialize, Serialize};

use crate::model::{AudioId, BreakpointId, Mode, PlaybackState};

/// Typed kernel events (§4.4). `StateChanged` is the meta event fired after
/// every other event and carries a copy of the event that preceded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum KernelEvent {
    ModeChanged { mode: Mode },
    CueChanged { cue_index: usize },
    PlaybackStarted { audio_id: AudioId },
    PlaybackPaused { audio_id: AudioId, position: f64 },
    PlaybackStopped,
    PlaybackCompleted { audio_id: AudioId },
    BreakpointSaved { id: BreakpointId, audio_id: AudioId, auto_saved: bool },
    VolumeChanged { bgm_volume: f64, sfx_volume: f64 },
    SilenceStarted { duration: f64 },
    SilenceEnded,
    SfxStarted { sfx_id: AudioId },
    SfxStopped { sfx_id: AudioId },
    /// Meta event: fires after the type-specific listeners for `original`
    /// have all been invoked (§4.4).
    StateChanged { original: Box<KernelEvent> },
}

/// What every subscriber and every remote client actually receives: the
/// event plus a read-consistent `PlaybackState` snapshot taken at publish
/// time (§4.6 "the snapshot is read-consistent with the event that
/// triggered the broadcast").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: KernelEvent,
    pub state: PlaybackState,
}
