use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver as CrossbeamReceiver, Sender as CrossbeamSender};

use crate::backend::MixerBackend;
use crate::engine::AudioEngine;

const TICK_INTERVAL: Duration = Duration::from_millis(20);

/// Commands the audio thread understands. Read operations carry a `reply`
/// channel so the caller gets a synchronous-feeling answer without blocking
/// the thread's event loop (teacher's `imbolc-core::audio::commands` pattern).
pub enum AudioCmd {
    PlayBgm { file_path: String, start_pos: f64, reply: Sender<bool> },
    PauseBgm,
    ResumeBgm,
    StopBgm { reply: Sender<f64> },
    GetBgmPosition { reply: Sender<f64> },
    IsBgmPlaying { reply: Sender<bool> },
    IsBgmPaused { reply: Sender<bool> },
    PlaySfx { id: String, file_path: String, reply: Sender<bool> },
    StopSfx { id: String, reply: Sender<bool> },
    StopAllSfx,
    IsSfxPlaying { id: String, reply: Sender<bool> },
    SetBgmVolume { volume: f64 },
    SetSfxVolume { volume: f64 },
    GetBgmVolume { reply: Sender<f64> },
    GetSfxVolume { reply: Sender<f64> },
    Shutdown,
}

/// Unsolicited messages the audio thread pushes back, outside of any
/// command/reply pair. Currently only the natural-end notification that
/// drives the kernel's `auto_advance` path (§4.5 "Natural BGM end").
#[derive(Debug, Clone)]
pub enum AudioFeedback {
    BgmEnded,
}

/// Main-thread interface to the mixer façade. Owns the command channels and
/// spawns a dedicated background thread running the `AudioEngine`; mirrors
/// the teacher's `AudioHandle` (`priority_tx`/`normal_tx` + `feedback_rx` +
/// owned `JoinHandle`).
pub struct AudioHandle {
    priority_tx: CrossbeamSender<AudioCmd>,
    normal_tx: CrossbeamSender<AudioCmd>,
    /// `crossbeam_channel` rather than `std::sync::mpsc` so this handle
    /// stays `Sync` — the kernel shares one `AudioHandle` across the
    /// feedback-listening thread and every command-issuing thread.
    pub feedback_rx: CrossbeamReceiver<AudioFeedback>,
    join_handle: Option<JoinHandle<()>>,
}

impl AudioHandle {
    pub fn new<B: MixerBackend + 'static>(backend: B) -> Self {
        let (priority_tx, priority_rx) = crossbeam_channel::unbounded();
        let (normal_tx, normal_rx) = crossbeam_channel::unbounded();
        let (feedback_tx, feedback_rx) = crossbeam_channel::unbounded();

        let join_handle = thread::Builder::new()
            .name("stagecue-audio".into())
            .spawn(move || {
                run_audio_thread(AudioEngine::new(backend), priority_rx, normal_rx, feedback_tx);
            })
            .expect("failed to spawn audio thread");

        Self {
            priority_tx,
            normal_tx,
            feedback_rx,
            join_handle: Some(join_handle),
        }
    }

    pub fn play_bgm(&self, file_path: &str, start_pos: f64) -> bool {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send_normal(AudioCmd::PlayBgm {
            file_path: file_path.to_string(),
            start_pos,
            reply: reply_tx,
        });
        reply_rx.recv().unwrap_or(false)
    }

    pub fn pause_bgm(&self) {
        self.send_priority(AudioCmd::PauseBgm);
    }

    pub fn resume_bgm(&self) {
        self.send_priority(AudioCmd::ResumeBgm);
    }

    pub fn stop_bgm(&self) -> f64 {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send_priority(AudioCmd::StopBgm { reply: reply_tx });
        reply_rx.recv().unwrap_or(0.0)
    }

    pub fn get_bgm_position(&self) -> f64 {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send_normal(AudioCmd::GetBgmPosition { reply: reply_tx });
        reply_rx.recv().unwrap_or(0.0)
    }

    pub fn is_bgm_playing(&self) -> bool {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send_normal(AudioCmd::IsBgmPlaying { reply: reply_tx });
        reply_rx.recv().unwrap_or(false)
    }

    pub fn is_bgm_paused(&self) -> bool {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send_normal(AudioCmd::IsBgmPaused { reply: reply_tx });
        reply_rx.recv().unwrap_or(false)
    }

    pub fn play_sfx(&self, id: &str, file_path: &str) -> bool {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send_normal(AudioCmd::PlaySfx {
            id: id.to_string(),
            file_path: file_path.to_string(),
            reply: reply_tx,
        });
        reply_rx.recv().unwrap_or(false)
    }

    pub fn stop_sfx(&self, id: &str) -> bool {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send_priority(AudioCmd::StopSfx {
            id: id.to_string(),
            reply: reply_tx,
        });
        reply_rx.recv().unwrap_or(false)
    }

    pub fn stop_all_sfx(&self) {
        self.send_priority(AudioCmd::StopAllSfx);
    }

    pub fn is_sfx_playing(&self, id: &str) -> bool {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send_normal(AudioCmd::IsSfxPlaying {
            id: id.to_string(),
            reply: reply_tx,
        });
        reply_rx.recv().unwrap_or(false)
    }

    pub fn set_bgm_volume(&self, volume: f64) {
        self.send_normal(AudioCmd::SetBgmVolume { volume });
    }

    pub fn set_sfx_volume(&self, volume: f64) {
        self.send_normal(AudioCmd::SetSfxVolume { volume });
    }

    pub fn get_bgm_volume(&self) -> f64 {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send_normal(AudioCmd::GetBgmVolume { reply: reply_tx });
        reply_rx.recv().unwrap_or(1.0)
    }

    pub fn get_sfx_volume(&self) -> f64 {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send_normal(AudioCmd::GetSfxVolume { reply: reply_tx });
        reply_rx.recv().unwrap_or(1.0)
    }

    fn send_priority(&self, cmd: AudioCmd) {
        let _ = self.priority_tx.send(cmd);
    }

    fn send_normal(&self, cmd: AudioCmd) {
        let _ = self.normal_tx.send(cmd);
    }
}

impl Drop for AudioHandle {
    fn drop(&mut self) {
        self.send_priority(AudioCmd::Shutdown);
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_audio_thread<B: MixerBackend>(
    mut engine: AudioEngine<B>,
    priority_rx: CrossbeamReceiver<AudioCmd>,
    normal_rx: CrossbeamReceiver<AudioCmd>,
    feedback_tx: CrossbeamSender<AudioFeedback>,
) {
    log::info!(target: "audio", "audio thread started");
    loop {
        // Priority commands (pause/stop/sfx-stop) always drain first.
        while let Ok(cmd) = priority_rx.try_recv() {
            if matches!(cmd, AudioCmd::Shutdown) {
                log::info!(target: "audio", "audio thread shutting down");
                return;
            }
            apply(&mut engine, cmd);
        }

        match normal_rx.recv_timeout(TICK_INTERVAL) {
            Ok(cmd) => {
                if matches!(cmd, AudioCmd::Shutdown) {
                    log::info!(target: "audio", "audio thread shutting down");
                    return;
                }
                apply(&mut engine, cmd);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
        }

        if engine.check_bgm_end() {
            let _ = feedback_tx.send(AudioFeedback::BgmEnded);
        }
    }
}

fn apply<B: MixerBackend>(engine: &mut AudioEngine<B>, cmd: AudioCmd) {
    match cmd {
        AudioCmd::PlayBgm { file_path, start_pos, reply } => {
            let ok = engine.play_bgm(&file_path, start_pos);
            let _ = reply.send(ok);
        }
        AudioCmd::PauseBgm => engine.pause_bgm(),
        AudioCmd::ResumeBgm => engine.resume_bgm(),
        AudioCmd::StopBgm { reply } => {
            let pos = engine.stop_bgm();
            let _ = reply.send(pos);
        }
        AudioCmd::GetBgmPosition { reply } => {
            let _ = reply.send(engine.get_bgm_position());
        }
        AudioCmd::IsBgmPlaying { reply } => {
            let _ = reply.send(engine.is_bgm_playing());
        }
        AudioCmd::IsBgmPaused { reply } => {
            let _ = reply.send(engine.is_bgm_paused());
        }
        AudioCmd::PlaySfx { id, file_path, reply } => {
            let _ = reply.send(engine.play_sfx(&id, &file_path));
        }
        AudioCmd::StopSfx { id, reply } => {
            let _ = reply.send(engine.stop_sfx(&id));
        }
        AudioCmd::StopAllSfx => engine.stop_all_sfx(),
        AudioCmd::IsSfxPlaying { id, reply } => {
            let _ = reply.send(engine.is_sfx_playing(&id));
        }
        AudioCmd::SetBgmVolume { volume } => engine.set_bgm_volume(volume),
        AudioCmd::SetSfxVolume { volume } => engine.set_sfx_volume(volume),
        AudioCmd::GetBgmVolume { reply } => {
            let _ = reply.send(engine.bgm_volume());
        }
        AudioCmd::GetSfxVolume { reply } => {
            let _ = reply.send(engine.sfx_volume());
        }
        AudioCmd::Shutdown => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullMixerBackend;
    use std::time::Duration;

    #[test]
    fn play_and_stop_bgm_round_trips_through_the_thread() {
        let handle = AudioHandle::new(NullMixerBackend::new());
        assert!(handle.play_bgm("a.wav", 0.0));
        assert!(handle.is_bgm_playing());
        let pos = handle.stop_bgm();
        assert!(pos >= 0.0);
    }

    #[test]
    fn sfx_pool_exhaustion_is_visible_through_the_handle() {
        let handle = AudioHandle::new(NullMixerBackend::new());
        for i in 0..8 {
            assert!(handle.play_sfx(&format!("sfx{i}"), "sfx.wav"));
        }
        assert!(!handle.play_sfx("sfx8", "sfx.wav"));
    }

    #[test]
    fn feedback_channel_reports_no_spurious_end_without_finish() {
        let handle = AudioHandle::new(NullMixerBackend::new());
        handle.play_bgm("a.wav", 0.0);
        assert!(handle.feedback_rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
