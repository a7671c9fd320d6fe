//! C — the show controller kernel: the mode/playback state machine, the
//! silence scheduler, the BGM-mutex/auto-breakpoint rule, and the priority
//! arbiter between local and remote command sources (§4.5, §4.6, §5).
//!
//! One `operation_lock` (`Mutex<ControllerState>`) guards every
//! state-changing transition, mirroring the teacher's single-writer
//! `AppState` discipline and its `dispatch_action` single entry point.

mod dispatcher;
mod silence;

pub use dispatcher::{LocalDispatcher, RemoteDispatcher};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Instant;

use stagecue_audio::{AudioFeedback, AudioHandle};
use stagecue_types::{
    AudioId, AudioTrack, BreakpointId, Command, CommandOutcome, CommandSource, Cue, CueId,
    KernelEvent, Mode, PlaybackState,
};

use self::silence::SilenceGeneration;
use crate::breakpoints::BreakpointStore;
use crate::bus::EventBus;
use crate::catalog::CueCatalog;
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Playback {
    Stopped,
    SilentWait,
    Playing,
    Paused,
}

#[derive(Clone)]
enum PendingAfterSilence {
    StartAudio { track: AudioTrack, start_pos: f64 },
    AutoAdvance,
}

struct ControllerState {
    mode: Mode,
    playback: Playback,
    catalog: CueCatalog,
    breakpoints: BreakpointStore,
    current_audio_id: Option<AudioId>,
    paused_position: f64,
    manual_audio: Option<AudioTrack>,
    manual_start_pos: f64,
    manual_silence_before: f64,
    pending_after_silence: Option<PendingAfterSilence>,
    silence_start: Option<Instant>,
    silence_duration: f64,
    local_priority: bool,
    pending_remote_ops: VecDeque<Command>,
}

impl ControllerState {
    fn new(local_priority: bool) -> Self {
        Self {
            mode: Mode::Auto,
            playback: Playback::Stopped,
            catalog: CueCatalog::new(),
            breakpoints: BreakpointStore::new(),
            current_audio_id: None,
            paused_position: 0.0,
            manual_audio: None,
            manual_start_pos: 0.0,
            manual_silence_before: 0.0,
            pending_after_silence: None,
            silence_start: None,
            silence_duration: 0.0,
            local_priority,
            pending_remote_ops: VecDeque::new(),
        }
    }
}

struct Inner {
    state: Mutex<ControllerState>,
    audio: AudioHandle,
    bus: Arc<EventBus>,
    published: RwLock<PlaybackState>,
    silence_generation: Arc<SilenceGeneration>,
    config: Config,
}

/// The kernel singleton, owned by the process entry point (Design Notes:
/// "single long-lived instance ... no hidden global is required"). Cheap to
/// clone — every clone shares the same lock, audio handle, and event bus.
#[derive(Clone)]
pub struct Controller(Arc<Inner>);

impl Controller {
    pub fn new(config: Config, audio: AudioHandle, bus: Arc<EventBus>) -> Self {
        let local_priority = config.local_priority;
        let inner = Arc::new(Inner {
            state: Mutex::new(ControllerState::new(local_priority)),
            audio,
            bus,
            published: RwLock::new(PlaybackState::default()),
            silence_generation: Arc::new(SilenceGeneration::new()),
            config,
        });
        let controller = Controller(inner);
        controller.spawn_feedback_listener();
        controller
    }

    fn spawn_feedback_listener(&self) {
        let controller = self.clone();
        thread::Builder::new()
            .name("stagecue-feedback".into())
            .spawn(move || loop {
                match controller.0.audio.feedback_rx.recv() {
                    Ok(AudioFeedback::BgmEnded) => controller.on_natural_end(),
                    Err(_) => return,
                }
            })
            .expect("failed to spawn feedback listener thread");
    }

    // --- read accessors (§5: lock-free) ---

    pub fn get_state(&self) -> PlaybackState {
        self.0.published.read().unwrap().clone()
    }

    pub fn local_priority(&self) -> bool {
        self.0.state.lock().unwrap().local_priority
    }

    pub fn set_local_priority(&self, enabled: bool) {
        self.0.state.lock().unwrap().local_priority = enabled;
    }

    /// Lets an external collaborator (operator UI) designate what MANUAL
    /// mode plays; not part of the remote command surface (§6 lists no
    /// such command — selecting manual audio is a UI concern the kernel
    /// only needs a setter for).
    pub fn set_manual_source(&self, track: AudioTrack, start_pos: f64, silence_before: f64) {
        let mut state = self.0.state.lock().unwrap();
        state.manual_audio = Some(track);
        state.manual_start_pos = start_pos;
        state.manual_silence_before = silence_before;
    }

    pub fn with_catalog<R>(&self, f: impl FnOnce(&mut CueCatalog) -> R) -> R {
        let mut state = self.0.state.lock().unwrap();
        f(&mut state.catalog)
    }

    pub fn with_breakpoints<R>(&self, f: impl FnOnce(&mut BreakpointStore) -> R) -> R {
        let mut state = self.0.state.lock().unwrap();
        f(&mut state.breakpoints)
    }

    // --- dispatch entry point ---

    /// The single function every entry point (local console, remote port)
    /// traverses (§4.6, Design Notes "Priority arbiter as explicit policy").
    pub fn dispatch_from(&self, source: CommandSource, command: &Command) -> CommandOutcome {
        if matches!(command, Command::GetState) {
            return CommandOutcome::ok_with_events(vec![]);
        }

        if source == CommandSource::Remote {
            let deferred = {
                let mut state = self.0.state.lock().unwrap();
                if state.local_priority {
                    state.pending_remote_ops.push_back(command.clone());
                    true
                } else {
                    false
                }
            };
            if deferred {
                return CommandOutcome::deferred();
            }
        }

        self.execute(command)
    }

    /// Drains one deferred remote operation, if any, and executes it
    /// unconditionally (bypassing the arbiter check — the point of calling
    /// this is to actually run it now).
    pub fn process_pending_ops(&self) -> Option<CommandOutcome> {
        let command = self.0.state.lock().unwrap().pending_remote_ops.pop_front()?;
        Some(self.execute(&command))
    }

    fn execute(&self, command: &Command) -> CommandOutcome {
        let before = self.0.state.lock().unwrap().playback;
        let outcome = self.execute_inner(command);
        let after = self.0.state.lock().unwrap().playback;
        log::debug!(target: "controller", "{command:?}: {before:?} -> {after:?} (success={})", outcome.success);
        if !outcome.success {
            log::warn!(target: "controller", "{command:?} failed: {}", outcome.reason.as_deref().unwrap_or("unknown"));
        }
        outcome
    }

    fn execute_inner(&self, command: &Command) -> CommandOutcome {
        use Command::*;
        match command {
            Play => self.op_play(),
            Pause => self.op_pause(),
            Resume => self.op_resume(),
            Stop => self.op_stop(),
            NextCue => self.op_next_cue(),
            Replay => self.op_replay(),
            Seek { position } => self.op_seek(*position),
            PlayNewBgm { audio_id, start_pos } => self.op_play_new_bgm(audio_id, *start_pos),
            SetBgmVolume { volume } => self.op_set_bgm_volume(*volume),
            SetSfxVolume { volume } => self.op_set_sfx_volume(*volume),
            SwitchMode { mode } => self.op_switch_mode(*mode),
            PlaySfx { sfx_id } => self.op_play_sfx(sfx_id),
            StopSfx { sfx_id } => self.op_stop_sfx(sfx_id),
            ToggleSfx { sfx_id } => self.op_toggle_sfx(sfx_id),
            SaveBreakpoint => self.op_save_breakpoint(),
            RestoreBreakpoint { audio_id, bp_id } => {
                self.op_restore_breakpoint(audio_id.clone(), *bp_id)
            }
            GetState => CommandOutcome::ok(),
            SkipSilence => self.op_skip_silence(),
            UpdateCues { cues } => self.op_update_cues(cues.clone()),
            AddCue { cue } => self.op_add_cue(cue.clone()),
            DeleteCue { cue_id } => self.op_delete_cue(cue_id),
            AddAudio { track } => self.op_add_audio(track.clone()),
            DeleteAudio { audio_id } => self.op_delete_audio(audio_id),
        }
    }

    // --- playback transitions (§4.5) ---

    fn op_play(&self) -> CommandOutcome {
        let mut state = self.0.state.lock().unwrap();
        if state.playback != Playback::Stopped {
            return CommandOutcome::failed("already playing");
        }
        match state.mode {
            Mode::Auto => {
                let Some(cue) = state.catalog.current_cue().cloned() else {
                    return CommandOutcome::failed("no cues in catalog");
                };
                self.begin_cue(&mut state, &cue)
            }
            Mode::Manual => {
                let Some(track) = state.manual_audio.clone() else {
                    return CommandOutcome::failed("no manual audio selected");
                };
                let start_pos = state.manual_start_pos;
                let silence_before = state.manual_silence_before;
                self.begin_audio(&mut state, track, start_pos, silence_before)
            }
        }
    }

    fn op_pause(&self) -> CommandOutcome {
        let mut state = self.0.state.lock().unwrap();
        if state.playback != Playback::Playing {
            return CommandOutcome::failed("not playing");
        }
        let Some(audio_id) = state.current_audio_id.clone() else {
            return CommandOutcome::failed("no audio loaded");
        };
        let position = self.0.audio.get_bgm_position();
        state.paused_position = position;
        let bp_id = state
            .breakpoints
            .save(audio_id.clone(), position, "auto", true);
        log::info!(target: "controller", "auto-saved breakpoint {bp_id} for {audio_id} at {position} on pause");
        self.0.audio.pause_bgm();
        state.playback = Playback::Paused;
        let mut events = vec![self.emit(
            &state,
            KernelEvent::BreakpointSaved {
                id: bp_id,
                audio_id: audio_id.clone(),
                auto_saved: true,
            },
        )];
        events.push(self.emit(&state, KernelEvent::PlaybackPaused { audio_id, position }));
        CommandOutcome::ok_with_events(events)
    }

    fn op_resume(&self) -> CommandOutcome {
        let mut state = self.0.state.lock().unwrap();
        if state.playback != Playback::Paused {
            return CommandOutcome::failed("not paused");
        }
        let Some(audio_id) = state.current_audio_id.clone() else {
            return CommandOutcome::failed("no audio loaded");
        };
        let Some(track) = state.catalog.audio_by_id(&audio_id).cloned() else {
            return CommandOutcome::failed("audio no longer in catalog");
        };
        let position = state.paused_position;
        // Re-seek rather than a mixer `resume_bgm` (§4.5 pause/resume contract).
        self.0.audio.play_bgm(&track.file_path, position);
        state.playback = Playback::Playing;
        let event = self.emit(&state, KernelEvent::PlaybackStarted { audio_id });
        CommandOutcome::ok_with_events(vec![event])
    }

    fn op_stop(&self) -> CommandOutcome {
        let mut state = self.0.state.lock().unwrap();
        match state.playback {
            Playback::Stopped => return CommandOutcome::failed("already stopped"),
            Playback::SilentWait => {
                self.cancel_pending_silence(&mut state);
            }
            Playback::Playing | Playback::Paused => {
                self.0.audio.stop_bgm();
            }
        }
        state.playback = Playback::Stopped;
        let event = self.emit(&state, KernelEvent::PlaybackStopped);
        CommandOutcome::ok_with_events(vec![event])
    }

    fn op_next_cue(&self) -> CommandOutcome {
        let mut state = self.0.state.lock().unwrap();
        if state.mode == Mode::Manual {
            return CommandOutcome::ok(); // no-op in MANUAL (§4.5)
        }
        self.cancel_pending_silence(&mut state);
        if matches!(state.playback, Playback::Playing | Playback::Paused) {
            self.0.audio.stop_bgm();
        }
        state.playback = Playback::Stopped;
        match state.catalog.advance().cloned() {
            Some(cue) => {
                let idx = state.catalog.current_index();
                let mut events = vec![self.emit(&state, KernelEvent::CueChanged { cue_index: idx })];
                let outcome = self.begin_cue(&mut state, &cue);
                let success = outcome.success;
                let reason = outcome.reason;
                events.extend(outcome.events);
                CommandOutcome { success, reason, events }
            }
            None => CommandOutcome::failed("already at last cue"),
        }
    }

    fn op_replay(&self) -> CommandOutcome {
        let mut state = self.0.state.lock().unwrap();
        self.cancel_pending_silence(&mut state);
        if matches!(state.playback, Playback::Playing | Playback::Paused) {
            self.0.audio.stop_bgm();
        }
        state.playback = Playback::Stopped;
        match state.mode {
            Mode::Auto => {
                let Some(cue) = state.catalog.current_cue().cloned() else {
                    return CommandOutcome::failed("no cues in catalog");
                };
                self.begin_cue(&mut state, &cue)
            }
            Mode::Manual => {
                let Some(track) = state.manual_audio.clone() else {
                    return CommandOutcome::failed("no manual audio selected");
                };
                let silence_before = state.manual_silence_before;
                self.begin_audio(&mut state, track, 0.0, silence_before)
            }
        }
    }

    fn op_seek(&self, position: f64) -> CommandOutcome {
        let mut state = self.0.state.lock().unwrap();
        let Some(audio_id) = state.current_audio_id.clone() else {
            return CommandOutcome::failed("no audio loaded");
        };
        let Some(track) = state.catalog.audio_by_id(&audio_id).cloned() else {
            return CommandOutcome::failed("audio no longer in catalog");
        };
        let clamped = position.clamp(0.0, track.duration.max(0.0));
        let prev = state.playback;
        self.0.audio.stop_bgm();
        self.0.audio.play_bgm(&track.file_path, clamped);
        if matches!(prev, Playback::Paused | Playback::Stopped) {
            self.0.audio.pause_bgm();
            state.paused_position = clamped;
            state.playback = Playback::Paused;
        } else {
            state.playback = Playback::Playing;
        }
        CommandOutcome::ok()
    }

    fn op_switch_mode(&self, mode: Mode) -> CommandOutcome {
        let mut state = self.0.state.lock().unwrap();
        if state.mode == mode {
            return CommandOutcome::ok();
        }
        self.cancel_pending_silence(&mut state);
        state.mode = mode;
        let event = self.emit(&state, KernelEvent::ModeChanged { mode });
        CommandOutcome::ok_with_events(vec![event])
    }

    fn op_skip_silence(&self) -> CommandOutcome {
        let mut state = self.0.state.lock().unwrap();
        if state.playback != Playback::SilentWait {
            return CommandOutcome::failed("not waiting in silence");
        }
        self.0.silence_generation.cancel();
        let pending = state.pending_after_silence.take();
        state.silence_start = None;
        let silence_ended = self.emit(&state, KernelEvent::SilenceEnded);
        let mut events = vec![silence_ended];
        match pending {
            Some(PendingAfterSilence::StartAudio { track, start_pos }) => {
                self.0.audio.play_bgm(&track.file_path, start_pos);
                state.current_audio_id = Some(track.id.clone());
                state.playback = Playback::Playing;
                events.push(self.emit(&state, KernelEvent::PlaybackStarted { audio_id: track.id }));
                CommandOutcome::ok_with_events(events)
            }
            Some(PendingAfterSilence::AutoAdvance) => {
                state.playback = Playback::Stopped;
                events.extend(self.auto_advance_locked(&mut state));
                CommandOutcome::ok_with_events(events)
            }
            None => CommandOutcome::failed("no pending silence action"),
        }
    }

    /// `play_new_bgm`: starts `audio_id` immediately, applying the same
    /// interruption rule as any other new-BGM transition (§8 scenario 3).
    fn op_play_new_bgm(&self, audio_id: &AudioId, start_pos: f64) -> CommandOutcome {
        let mut state = self.0.state.lock().unwrap();
        let Some(track) = state.catalog.audio_by_id(audio_id).cloned() else {
            return CommandOutcome::failed("unknown audio");
        };
        self.cancel_pending_silence(&mut state);
        self.begin_audio(&mut state, track, start_pos, 0.0)
    }

    // --- volumes (not guarded by the operation lock — §5 only lists the
    // transition-bearing operations) ---

    fn op_set_bgm_volume(&self, volume: f64) -> CommandOutcome {
        self.0.audio.set_bgm_volume(volume);
        let state = self.0.state.lock().unwrap();
        let event = self.emit(
            &state,
            KernelEvent::VolumeChanged {
                bgm_volume: self.0.audio.get_bgm_volume(),
                sfx_volume: self.0.audio.get_sfx_volume(),
            },
        );
        CommandOutcome::ok_with_events(vec![event])
    }

    fn op_set_sfx_volume(&self, volume: f64) -> CommandOutcome {
        self.0.audio.set_sfx_volume(volume);
        let state = self.0.state.lock().unwrap();
        let event = self.emit(
            &state,
            KernelEvent::VolumeChanged {
                bgm_volume: self.0.audio.get_bgm_volume(),
                sfx_volume: self.0.audio.get_sfx_volume(),
            },
        );
        CommandOutcome::ok_with_events(vec![event])
    }

    // --- sfx (independent pool, not guarded either) ---

    fn op_play_sfx(&self, sfx_id: &AudioId) -> CommandOutcome {
        let path = self.with_catalog(|c| c.audio_by_id(sfx_id).map(|a| a.file_path.clone()));
        let Some(path) = path else {
            return CommandOutcome::failed("unknown sfx audio");
        };
        if self.0.audio.play_sfx(&sfx_id.0, &path) {
            let state = self.0.state.lock().unwrap();
            let event = self.emit(&state, KernelEvent::SfxStarted { sfx_id: sfx_id.clone() });
            CommandOutcome::ok_with_events(vec![event])
        } else {
            CommandOutcome::failed("sfx pool full")
        }
    }

    fn op_stop_sfx(&self, sfx_id: &AudioId) -> CommandOutcome {
        if self.0.audio.stop_sfx(&sfx_id.0) {
            let state = self.0.state.lock().unwrap();
            let event = self.emit(&state, KernelEvent::SfxStopped { sfx_id: sfx_id.clone() });
            CommandOutcome::ok_with_events(vec![event])
        } else {
            CommandOutcome::failed("sfx not playing")
        }
    }

    fn op_toggle_sfx(&self, sfx_id: &AudioId) -> CommandOutcome {
        if self.0.audio.is_sfx_playing(&sfx_id.0) {
            self.op_stop_sfx(sfx_id)
        } else {
            self.op_play_sfx(sfx_id)
        }
    }

    // --- breakpoints ---

    fn op_save_breakpoint(&self) -> CommandOutcome {
        let mut state = self.0.state.lock().unwrap();
        let Some(audio_id) = state.current_audio_id.clone() else {
            return CommandOutcome::failed("no audio loaded");
        };
        let position = self.0.audio.get_bgm_position();
        let id = state.breakpoints.save(audio_id.clone(), position, "manual", false);
        let event = self.emit(
            &state,
            KernelEvent::BreakpointSaved { id, audio_id, auto_saved: false },
        );
        CommandOutcome::ok_with_events(vec![event])
    }

    /// `restore_breakpoint`: interrupts current audio, applying the same
    /// BGM-mutex/auto-breakpoint rule as any other new-BGM transition
    /// (§4.5 "Applies identically to restore_breakpoint").
    fn op_restore_breakpoint(&self, audio_id: AudioId, bp_id: BreakpointId) -> CommandOutcome {
        let mut state = self.0.state.lock().unwrap();
        let Some(bp) = state.breakpoints.get(&audio_id, bp_id).cloned() else {
            return CommandOutcome::failed("unknown breakpoint");
        };
        let Some(track) = state.catalog.audio_by_id(&audio_id).cloned() else {
            return CommandOutcome::failed("audio not in catalog");
        };
        self.cancel_pending_silence(&mut state);
        self.begin_audio(&mut state, track, bp.position, 0.0)
    }

    // --- catalog edits ---

    fn op_update_cues(&self, cues: Vec<Cue>) -> CommandOutcome {
        let mut state = self.0.state.lock().unwrap();
        state.catalog.clear_cues();
        for cue in cues {
            state.catalog.add_cue(cue);
        }
        CommandOutcome::ok()
    }

    fn op_add_cue(&self, cue: Cue) -> CommandOutcome {
        self.0.state.lock().unwrap().catalog.add_cue(cue);
        CommandOutcome::ok()
    }

    fn op_delete_cue(&self, cue_id: &CueId) -> CommandOutcome {
        let mut state = self.0.state.lock().unwrap();
        if state.catalog.remove_cue_by_id(cue_id).is_some() {
            CommandOutcome::ok()
        } else {
            CommandOutcome::failed("unknown cue")
        }
    }

    fn op_add_audio(&self, track: AudioTrack) -> CommandOutcome {
        self.0.state.lock().unwrap().catalog.add_audio_file(track);
        CommandOutcome::ok()
    }

    fn op_delete_audio(&self, audio_id: &AudioId) -> CommandOutcome {
        let mut state = self.0.state.lock().unwrap();
        if state.catalog.remove_audio_file(audio_id) {
            CommandOutcome::ok()
        } else {
            CommandOutcome::failed("audio referenced by a live cue")
        }
    }

    // --- shared transition helpers ---

    fn begin_cue(&self, state: &mut ControllerState, cue: &Cue) -> CommandOutcome {
        let Some(track) = state.catalog.audio_by_id(&cue.audio_id).cloned() else {
            return CommandOutcome::failed("cue references unknown audio");
        };
        self.begin_audio(state, track, cue.start_time, cue.silence_before)
    }

    /// The generic "play this BGM now" operation (§4.5 `play_new_bgm`):
    /// applies the BGM-mutex/auto-breakpoint rule, then either enters
    /// SILENT_WAIT or starts playing immediately.
    fn begin_audio(
        &self,
        state: &mut ControllerState,
        track: AudioTrack,
        start_pos: f64,
        silence_before: f64,
    ) -> CommandOutcome {
        let mut events = self.apply_bgm_mutex(state);
        state.current_audio_id = Some(track.id.clone());
        if silence_before > 0.0 {
            state.playback = Playback::SilentWait;
            self.start_silence_episode(
                state,
                PendingAfterSilence::StartAudio { track, start_pos },
                silence_before,
            );
            events.push(self.emit(state, KernelEvent::SilenceStarted { duration: silence_before }));
        } else {
            self.0.audio.play_bgm(&track.file_path, start_pos);
            state.playback = Playback::Playing;
            events.push(self.emit(state, KernelEvent::PlaybackStarted { audio_id: track.id }));
        }
        CommandOutcome::ok_with_events(events)
    }

    /// Invariant 4: stopping a currently-PLAYING (not paused) BGM for a new
    /// one first records an auto-breakpoint for the outgoing audio.
    fn apply_bgm_mutex(&self, state: &mut ControllerState) -> Vec<KernelEvent> {
        let mut events = Vec::new();
        match state.playback {
            Playback::Playing => {
                if let Some(outgoing) = state.current_audio_id.clone() {
                    let position = self.0.audio.get_bgm_position();
                    let id = state.breakpoints.save(outgoing.clone(), position, "auto", true);
                    log::info!(target: "controller", "auto-saved breakpoint {id} for {outgoing} at {position}");
                    events.push(self.emit(
                        state,
                        KernelEvent::BreakpointSaved { id, audio_id: outgoing, auto_saved: true },
                    ));
                }
                self.0.audio.stop_bgm();
            }
            Playback::Paused => {
                self.0.audio.stop_bgm();
            }
            Playback::Stopped | Playback::SilentWait => {}
        }
        events
    }

    fn auto_advance_locked(&self, state: &mut ControllerState) -> Vec<KernelEvent> {
        match state.catalog.advance().cloned() {
            Some(cue) => {
                let idx = state.catalog.current_index();
                log::info!(target: "controller", "advanced to cue {idx} ({})", cue.id);
                let mut events = vec![self.emit(state, KernelEvent::CueChanged { cue_index: idx })];
                events.extend(self.begin_cue(state, &cue).events);
                events
            }
            None => {
                log::info!(target: "controller", "auto-advance reached the end of the cue list");
                state.playback = Playback::Stopped;
                Vec::new()
            }
        }
    }

    /// Cancels whatever silence episode is pending, clearing both the
    /// generation token and the countdown base so `snapshot` stops
    /// reporting a `silence_remaining` for an episode that no longer runs.
    fn cancel_pending_silence(&self, state: &mut ControllerState) {
        self.0.silence_generation.cancel();
        state.pending_after_silence = None;
        state.silence_start = None;
    }

    fn start_silence_episode(
        &self,
        state: &mut ControllerState,
        pending: PendingAfterSilence,
        duration: f64,
    ) {
        state.pending_after_silence = Some(pending);
        state.silence_start = Some(Instant::now());
        state.silence_duration = duration;
        let generation = self.0.silence_generation.start_episode();
        let controller = self.clone();
        let tick = std::time::Duration::from_millis(self.0.config.silence_tick_ms);
        silence::spawn_episode(self.0.silence_generation.clone(), generation, duration, tick, move || {
            controller.on_silence_expired(generation);
        });
    }

    fn on_silence_expired(&self, generation: u64) {
        let mut state = self.0.state.lock().unwrap();
        if self.0.silence_generation.current() != generation {
            return;
        }
        let pending = state.pending_after_silence.take();
        state.silence_start = None;
        let _ = self.emit(&state, KernelEvent::SilenceEnded);
        match pending {
            Some(PendingAfterSilence::StartAudio { track, start_pos }) => {
                self.0.audio.play_bgm(&track.file_path, start_pos);
                state.current_audio_id = Some(track.id.clone());
                state.playback = Playback::Playing;
                let _ = self.emit(&state, KernelEvent::PlaybackStarted { audio_id: track.id });
            }
            Some(PendingAfterSilence::AutoAdvance) => {
                state.playback = Playback::Stopped;
                self.auto_advance_locked(&mut state);
            }
            None => {}
        }
    }

    /// §4.5 "Natural BGM end (from L1 callback)".
    fn on_natural_end(&self) {
        let mut state = self.0.state.lock().unwrap();
        if state.playback != Playback::Playing {
            return; // stray/late feedback after an explicit stop
        }
        let Some(audio_id) = state.current_audio_id.take() else {
            return;
        };
        state.playback = Playback::Stopped;
        let _ = self.emit(&state, KernelEvent::PlaybackCompleted { audio_id });

        match state.mode {
            Mode::Manual => {}
            Mode::Auto => {
                let silence_after = state
                    .catalog
                    .current_cue()
                    .map(|c| c.silence_after)
                    .unwrap_or(0.0);
                if silence_after > 0.0 {
                    state.playback = Playback::SilentWait;
                    self.start_silence_episode(&mut state, PendingAfterSilence::AutoAdvance, silence_after);
                    let _ = self.emit(&state, KernelEvent::SilenceStarted { duration: silence_after });
                } else {
                    self.auto_advance_locked(&mut state);
                }
            }
        }
    }

    /// Builds the current read-consistent snapshot, publishes `event` on the
    /// bus with it, refreshes the lock-free published copy, and returns the
    /// event so callers can fold it into a `CommandOutcome`.
    fn emit(&self, state: &ControllerState, event: KernelEvent) -> KernelEvent {
        let snapshot = self.snapshot(state);
        *self.0.published.write().unwrap() = snapshot.clone();
        self.0.bus.publish(event.clone(), snapshot);
        event
    }

    fn snapshot(&self, state: &ControllerState) -> PlaybackState {
        let duration = state
            .current_audio_id
            .as_ref()
            .and_then(|id| state.catalog.audio_by_id(id))
            .map(|track| track.duration)
            .unwrap_or(0.0);
        PlaybackState {
            mode: state.mode,
            is_playing: matches!(state.playback, Playback::Playing | Playback::Paused),
            is_paused: state.playback == Playback::Paused,
            current_audio_id: state.current_audio_id.clone(),
            current_position: match state.playback {
                Playback::Paused => state.paused_position,
                Playback::Playing => self.0.audio.get_bgm_position(),
                Playback::Stopped | Playback::SilentWait => 0.0,
            },
            current_cue_index: state.catalog.current_index(),
            bgm_volume: self.0.audio.get_bgm_volume(),
            sfx_volume: self.0.audio.get_sfx_volume(),
            in_silence: state.playback == Playback::SilentWait,
            silence_remaining: match (state.playback, state.silence_start) {
                (Playback::SilentWait, Some(start)) => {
                    (state.silence_duration - start.elapsed().as_secs_f64()).max(0.0)
                }
                _ => 0.0,
            },
            duration,
        }
    }
}
