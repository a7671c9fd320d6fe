//! Cancellable silence waits (§4.5 "Silence scheduler", §5 "Cancellation &
//! timeouts"). A fresh generation is installed whenever a new silence
//! episode starts; the spawned thread only acts on wake-up if its
//! generation is still current — otherwise it was cancelled by `stop`,
//! `skip_silence`, `next_cue`, or `switch_mode`, and must stay silent
//! (no `silence_ended` event).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Shared cancellation token for the currently pending silence episode.
#[derive(Default)]
pub struct SilenceGeneration(AtomicU64);

impl SilenceGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a new episode, invalidating whatever was pending, and
    /// returns its generation id.
    pub fn start_episode(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Invalidates any pending episode without starting a new one.
    pub fn cancel(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Spawns the timer thread for one silence episode. Sleeps in small ticks
/// (rather than one long sleep) so cancellation is observed promptly; calls
/// `on_expiry` only if `generation` is still current when the wait
/// completes.
pub fn spawn_episode(
    generation_token: Arc<SilenceGeneration>,
    generation: u64,
    duration_secs: f64,
    tick: Duration,
    on_expiry: impl FnOnce() + Send + 'static,
) {
    thread::Builder::new()
        .name("stagecue-silence".into())
        .spawn(move || {
            let deadline = Duration::from_secs_f64(duration_secs.max(0.0));
            let mut elapsed = Duration::ZERO;
            while elapsed < deadline {
                if generation_token.current() != generation {
                    return; // cancelled
                }
                let step = tick.min(deadline - elapsed);
                thread::sleep(step);
                elapsed += step;
            }
            if generation_token.current() == generation {
                on_expiry();
            }
        })
        .expect("failed to spawn silence timer thread");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn natural_expiry_invokes_callback() {
        let token = Arc::new(SilenceGeneration::new());
        let gen = token.start_episode();
        let fired = Arc::new(Mutex::new(false));
        let fired_clone = fired.clone();
        spawn_episode(token, gen, 0.01, Duration::from_millis(2), move || {
            *fired_clone.lock().unwrap() = true;
        });
        thread::sleep(Duration::from_millis(50));
        assert!(*fired.lock().unwrap());
    }

    #[test]
    fn cancellation_suppresses_callback() {
        let token = Arc::new(SilenceGeneration::new());
        let gen = token.start_episode();
        let fired = Arc::new(Mutex::new(false));
        let fired_clone = fired.clone();
        spawn_episode(token.clone(), gen, 0.2, Duration::from_millis(2), move || {
            *fired_clone.lock().unwrap() = true;
        });
        token.cancel();
        thread::sleep(Duration::from_millis(250));
        assert!(!*fired.lock().unwrap());
    }
}
