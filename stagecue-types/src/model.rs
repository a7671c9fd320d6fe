use serde::{Deserialize, Serialize};

/// Unique identifier for an [`AudioTrack`] or any [`Cue`]/[`Breakpoint`] that
/// refers to one. Backed by a plain string since ids are authored externally
/// (config files, remote clients) rather than generated here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioId(pub String);

impl AudioId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for AudioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CueId(pub String);

impl CueId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for CueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Breakpoint ids are generated by the store itself, not authored, so they
/// use a uuid rather than an operator-supplied string (see Design Notes:
/// "Breakpoint identity").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BreakpointId(pub uuid::Uuid);

impl BreakpointId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for BreakpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BreakpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Bgm,
    Sfx,
}

/// Immutable once added to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub id: AudioId,
    pub file_path: String,
    /// Total duration in seconds, >= 0.
    pub duration: f64,
    pub title: String,
    #[serde(rename = "track_type")]
    pub kind: TrackKind,
}

/// A scripted playback directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub id: CueId,
    pub audio_id: AudioId,
    pub start_time: f64,
    pub end_time: Option<f64>,
    #[serde(default)]
    pub silence_before: f64,
    #[serde(default)]
    pub silence_after: f64,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default)]
    pub label: String,
}

fn default_volume() -> f64 {
    1.0
}

/// A saved resume point for one audio track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub id: BreakpointId,
    pub audio_id: AudioId,
    pub position: f64,
    #[serde(default)]
    pub label: String,
    pub created_at: String,
    #[serde(default)]
    pub auto_saved: bool,
}

/// The persisted cue-list file: ordered cues plus the audio tracks they
/// reference. Serialized atomically (write-temp-then-rename) by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueListConfig {
    pub version: String,
    pub name: String,
    pub created_at: String,
    pub cues: Vec<Cue>,
    pub audio_files: Vec<AudioTrack>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Auto,
    Manual,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Auto
    }
}

/// Derived snapshot of the controller's state. Never persisted; computed on
/// demand from the kernel's mutable fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub mode: Mode,
    pub is_playing: bool,
    pub is_paused: bool,
    pub current_audio_id: Option<AudioId>,
    pub current_position: f64,
    pub current_cue_index: usize,
    pub bgm_volume: f64,
    pub sfx_volume: f64,
    pub in_silence: bool,
    pub silence_remaining: f64,
    #[serde(default)]
    pub duration: f64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            mode: Mode::Auto,
            is_playing: false,
            is_paused: false,
            current_audio_id: None,
            current_position: 0.0,
            current_cue_index: 0,
            bgm_volume: 1.0,
            sfx_volume: 1.0,
            in_silence: false,
            silence_remaining: 0.0,
            duration: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cue_list_config_roundtrips_through_json() {
        let cfg = CueListConfig {
            version: "1.0".into(),
            name: "Act One".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
            cues: vec![Cue {
                id: CueId::new("c0"),
                audio_id: AudioId::new("a0"),
                start_time: 0.0,
                end_time: Some(10.0),
                silence_before: 0.0,
                silence_after: 2.0,
                volume: 1.0,
                label: "Opening".into(),
            }],
            audio_files: vec![AudioTrack {
                id: AudioId::new("a0"),
                file_path: "a0.wav".into(),
                duration: 10.0,
                title: "Track A".into(),
                kind: TrackKind::Bgm,
            }],
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: CueListConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn playback_state_roundtrips_through_json() {
        let state = PlaybackState {
            current_audio_id: Some(AudioId::new("a0")),
            current_position: 12.5,
            ..Default::default()
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: PlaybackState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }

    #[test]
    fn breakpoint_id_is_unique_across_calls() {
        let a = BreakpointId::new();
        let b = BreakpointId::new();
        assert_ne!(a, b);
    }
}
