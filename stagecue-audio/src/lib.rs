//! L1 audio mixer façade: abstracts play/pause/resume/seek/stop of one BGM
//! track and up to N simultaneous SFX tracks, and reports BGM-end back to
//! the kernel. Real audio decoding/output is an external collaborator
//! behind [`backend::MixerBackend`]; this crate owns the slot-pool
//! bookkeeping, volume clamping, and position tracking.

pub mod backend;
pub mod engine;
pub mod handle;

pub use backend::{MixerBackend, NullMixerBackend, SlotId};
pub use engine::{AudioEngine, DEFAULT_SFX_SLOTS};
pub use handle::{AudioCmd, AudioFeedback, AudioHandle};
