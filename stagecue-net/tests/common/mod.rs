#![allow(dead_code)]
//! Test harness for stagecue-net integration tests, trimmed from the
//! teacher's `imbolc-net` harness: no ownership/privilege setup, since a
//! `Welcome` here only ever carries a `PlaybackState` snapshot.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

use stagecue_audio::{AudioHandle, NullMixerBackend};
use stagecue_core::{Config, EventBus};
use stagecue_core::controller::Controller;
use stagecue_net::framing::{read_message, write_message};
use stagecue_net::{ClientMessage, NetServer, ServerMessage};

/// Builds a controller wired to a null audio backend, suitable for
/// exercising the net layer without real playback.
pub fn test_controller() -> (Controller, Arc<EventBus>) {
    let bus = Arc::new(EventBus::new());
    let audio = AudioHandle::new(NullMixerBackend::new());
    let controller = Controller::new(Config::default(), audio, bus.clone());
    (controller, bus)
}

/// Drives accept + poll until `expected` clients have completed the
/// handshake, or panics on timeout.
pub fn drive_until_clients(server: &mut NetServer, expected: usize, timeout: Duration) {
    let start = Instant::now();
    while Instant::now().duration_since(start) < timeout {
        server.accept_connections();
        server.poll_messages();
        if server.client_count() >= expected {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!(
        "timed out waiting for {expected} clients (have {})",
        server.client_count()
    );
}

pub fn drive_for(server: &mut NetServer, duration: Duration) {
    let start = Instant::now();
    while Instant::now().duration_since(start) < duration {
        server.accept_connections();
        server.poll_messages();
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// A raw TCP client for protocol-level tests.
pub struct RawClient {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl RawClient {
    pub fn connect(addr: &str) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    pub fn send(&mut self, msg: &ClientMessage) -> std::io::Result<()> {
        write_message(&mut self.writer, msg)
    }

    pub fn recv(&mut self) -> std::io::Result<ServerMessage> {
        read_message(&mut self.reader)
    }

    pub fn send_hello(&mut self, name: &str) -> std::io::Result<()> {
        self.send(&ClientMessage::Hello { client_name: name.to_string() })
    }

    /// Reads messages until one matches `pred`, skipping any others in
    /// between. A broadcast's own sender also receives its `Event`, and the
    /// writer thread may deliver it before the `CommandResult` reply, so
    /// tests that want a specific message shouldn't assume it's the next one
    /// off the wire.
    pub fn recv_until(
        &mut self,
        mut pred: impl FnMut(&ServerMessage) -> bool,
    ) -> std::io::Result<ServerMessage> {
        for _ in 0..8 {
            let msg = self.recv()?;
            if pred(&msg) {
                return Ok(msg);
            }
        }
        Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "no matching message received",
        ))
    }
}
