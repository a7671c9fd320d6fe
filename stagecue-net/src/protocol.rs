//! Wire protocol for the remote command port (§4.6, §6 "Remote protocol").
//! Trimmed from the teacher's `imbolc-net::protocol`: no ownership,
//! privilege, or session-token reconnection machinery — the Non-goals
//! exclude multi-operator authorization, so every remote client is an
//! equally-trusted operator (just lower priority than the local console).

use serde::{Deserialize, Serialize};

use stagecue_types::{Command, CommandOutcome, EventEnvelope, PlaybackState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl ClientId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// First message on a new connection; the server replies with `Welcome`.
    Hello { client_name: String },
    Command(Command),
    Goodbye,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    Welcome { client_id: ClientId, state: PlaybackState },
    /// Carries the kernel's `EventEnvelope` (event + read-consistent
    /// `PlaybackState`) so a connected client synchronizes immediately on
    /// every kernel transition, not just on reconnect (§4.6, §6).
    Event(EventEnvelope),
    CommandResult(CommandOutcome),
    Shutdown,
}
