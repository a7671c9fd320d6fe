use serde::{Deserialize, Serialize};

use crate::model::{AudioId, AudioTrack, BreakpointId, Cue, CueId, Mode};

/// Tag carried by every inbound command identifying which side of the
/// priority arbiter it entered from (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandSource {
    Local,
    Remote,
}

/// The transport-agnostic command surface (§6). Every variant corresponds
/// to one row of the command surface table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Play,
    Pause,
    Resume,
    Stop,
    NextCue,
    Replay,
    Seek { position: f64 },
    /// Interrupts whatever is currently loaded with a different track,
    /// applying the BGM-mutex/auto-breakpoint rule rather than requiring a
    /// prior `stop` (§8 end-to-end scenario 3).
    PlayNewBgm { audio_id: AudioId, start_pos: f64 },
    SetBgmVolume { volume: f64 },
    SetSfxVolume { volume: f64 },
    SwitchMode { mode: Mode },
    PlaySfx { sfx_id: AudioId },
    StopSfx { sfx_id: AudioId },
    ToggleSfx { sfx_id: AudioId },
    SaveBreakpoint,
    RestoreBreakpoint { audio_id: AudioId, bp_id: BreakpointId },
    GetState,
    SkipSilence,
    UpdateCues { cues: Vec<Cue> },
    AddCue { cue: Cue },
    DeleteCue { cue_id: CueId },
    AddAudio { track: AudioTrack },
    DeleteAudio { audio_id: AudioId },
}
