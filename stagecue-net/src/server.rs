//! Remote command port (component E): a TCP listener that accepts
//! operator connections, forwards their commands into the kernel through
//! the priority arbiter, and broadcasts `PlaybackState` on every change.
//!
//! Grounded on the teacher's `imbolc-net::server` reader/writer thread
//! split, trimmed to this domain's much smaller surface: no per-client
//! ownership, no privilege escalation, no reconnect tokens, no heartbeat —
//! DESIGN.md records these as intentional drops (Non-goals exclude
//! multi-operator authorization).

use std::collections::{HashMap, VecDeque};
use std::io::{self, BufReader};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::{error, info, warn};

use stagecue_core::controller::{Controller, RemoteDispatcher};
use stagecue_core::bus::EventBus;
use stagecue_types::{CommandOutcome, Dispatcher, EventEnvelope, KernelEvent};

use crate::framing::{read_message, serialize_frame, write_message};
use crate::protocol::{ClientId, ClientMessage, ServerMessage};

/// Outbox depth past which a client is considered stalled and dropped.
const MAX_OUTBOX_DEPTH: usize = 32;

struct ClientWriter {
    stream: TcpStream,
    outbox: VecDeque<Vec<u8>>,
}

impl ClientWriter {
    fn send_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        use std::io::Write;
        match self.stream.write(frame) {
            Ok(n) if n == frame.len() => Ok(()),
            Ok(n) => {
                self.outbox.push_back(frame[n..].to_vec());
                Ok(())
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                self.outbox.push_back(frame.to_vec());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn flush_outbox(&mut self) -> io::Result<()> {
        use std::io::Write;
        while let Some(front) = self.outbox.front_mut() {
            match self.stream.write(front) {
                Ok(0) => return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0")),
                Ok(n) if n == front.len() => {
                    self.outbox.pop_front();
                }
                Ok(n) => {
                    front.drain(..n);
                    return Ok(());
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn is_stalled(&self) -> bool {
        self.outbox.len() > MAX_OUTBOX_DEPTH
    }
}

enum WriterCommand {
    AddClient { client_id: ClientId, stream: TcpStream },
    RemoveClient { client_id: ClientId },
    Broadcast { frame: Vec<u8> },
    SendTo { client_id: ClientId, frame: Vec<u8> },
    Shutdown,
}

fn writer_thread(cmd_rx: Receiver<WriterCommand>) {
    let mut writers: HashMap<ClientId, ClientWriter> = HashMap::new();
    loop {
        match cmd_rx.recv_timeout(std::time::Duration::from_millis(20)) {
            Ok(WriterCommand::AddClient { client_id, stream }) => {
                writers.insert(client_id, ClientWriter { stream, outbox: VecDeque::new() });
            }
            Ok(WriterCommand::RemoveClient { client_id }) => {
                writers.remove(&client_id);
            }
            Ok(WriterCommand::Broadcast { frame }) => {
                let mut stalled = Vec::new();
                for (&id, writer) in writers.iter_mut() {
                    if writer.send_frame(&frame).is_err() || writer.is_stalled() {
                        stalled.push(id);
                    }
                }
                for id in stalled {
                    writers.remove(&id);
                    warn!(target: "net", "client {id:?} stalled, dropping");
                }
            }
            Ok(WriterCommand::SendTo { client_id, frame }) => {
                if let Some(writer) = writers.get_mut(&client_id) {
                    if writer.send_frame(&frame).is_err() {
                        writers.remove(&client_id);
                    }
                }
            }
            Ok(WriterCommand::Shutdown) => return,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let mut stalled = Vec::new();
                for (&id, writer) in writers.iter_mut() {
                    if !writer.outbox.is_empty() && writer.flush_outbox().is_err() {
                        stalled.push(id);
                    }
                }
                for id in stalled {
                    writers.remove(&id);
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn client_reader_thread(client_id: ClientId, stream: TcpStream, tx: Sender<(ClientId, ClientMessage)>) {
    let mut reader = BufReader::new(stream);
    loop {
        match read_message::<_, ClientMessage>(&mut reader) {
            Ok(msg) => {
                let is_goodbye = matches!(msg, ClientMessage::Goodbye);
                if tx.send((client_id, msg)).is_err() {
                    return;
                }
                if is_goodbye {
                    return;
                }
            }
            Err(_) => return,
        }
    }
}

/// Accepts connections and arbitrates between them and the local console
/// through the kernel's priority arbiter (§4.6).
pub struct NetServer {
    listener: TcpListener,
    pending: HashMap<ClientId, TcpStream>,
    client_names: HashMap<ClientId, String>,
    action_rx: Receiver<(ClientId, ClientMessage)>,
    action_tx: Sender<(ClientId, ClientMessage)>,
    next_client_id: u64,
    dispatcher: RemoteDispatcher,
    controller: Controller,
    writer_tx: Sender<WriterCommand>,
    writer_handle: Option<JoinHandle<()>>,
}

impl NetServer {
    /// Binds the listener and subscribes to `bus` so every state change is
    /// broadcast to connected clients.
    pub fn bind(addr: &str, controller: Controller, bus: &EventBus) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;

        let (action_tx, action_rx) = mpsc::channel();
        let (writer_tx, writer_rx) = mpsc::channel();
        let writer_handle = thread::Builder::new()
            .name("stagecue-net-writer".into())
            .spawn(move || writer_thread(writer_rx))
            .expect("failed to spawn writer thread");

        let broadcast_tx = writer_tx.clone();
        bus.subscribe(move |envelope: &EventEnvelope| {
            // The StateChanged meta event nests the event that preceded it
            // (`KernelEvent::StateChanged { original }`), so forwarding only
            // this one still carries the specific transition, not just the
            // snapshot, while broadcasting each transition once.
            if matches!(envelope.event, KernelEvent::StateChanged { .. }) {
                let msg = ServerMessage::Event(envelope.clone());
                if let Ok(frame) = serialize_frame(&msg) {
                    let _ = broadcast_tx.send(WriterCommand::Broadcast { frame });
                }
            }
        });

        info!(target: "net", "listening on {addr}");

        Ok(Self {
            listener,
            pending: HashMap::new(),
            client_names: HashMap::new(),
            action_rx,
            action_tx,
            next_client_id: 0,
            dispatcher: RemoteDispatcher(controller.clone()),
            controller,
            writer_tx,
            writer_handle: Some(writer_handle),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts any pending connections, spawning a reader thread for each.
    pub fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        error!(target: "net", "failed to set stream blocking: {e}");
                        continue;
                    }
                    let client_id = ClientId::new(self.next_client_id);
                    self.next_client_id += 1;

                    let read_stream = match stream.try_clone() {
                        Ok(s) => s,
                        Err(e) => {
                            error!(target: "net", "failed to clone stream: {e}");
                            continue;
                        }
                    };
                    let action_tx = self.action_tx.clone();
                    thread::Builder::new()
                        .name("stagecue-net-reader".into())
                        .spawn(move || client_reader_thread(client_id, read_stream, action_tx))
                        .expect("failed to spawn reader thread");

                    self.pending.insert(client_id, stream);
                    info!(target: "net", "client {client_id:?} connected from {addr}, awaiting Hello");
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!(target: "net", "accept error: {e}");
                    break;
                }
            }
        }
    }

    /// Drains messages from connected/pending clients and dispatches
    /// commands through the priority arbiter. Call once per server loop
    /// iteration (§4.8 "the CLI's event loop also drives the net server").
    pub fn poll_messages(&mut self) {
        while let Ok((client_id, msg)) = self.action_rx.try_recv() {
            match msg {
                ClientMessage::Hello { client_name } => {
                    if let Some(mut stream) = self.pending.remove(&client_id) {
                        let state = self.controller.get_state();
                        let welcome = ServerMessage::Welcome { client_id, state };
                        if write_message(&mut stream, &welcome).is_err() {
                            continue;
                        }
                        let _ = self.writer_tx.send(WriterCommand::AddClient { client_id, stream });
                        self.client_names.insert(client_id, client_name.clone());
                        info!(target: "net", "client {client_id:?} '{client_name}' completed handshake");
                    }
                }
                ClientMessage::Command(command) => {
                    let outcome: CommandOutcome = self.dispatcher.dispatch(&command);
                    let reply = ServerMessage::CommandResult(outcome);
                    if let Ok(frame) = serialize_frame(&reply) {
                        let _ = self.writer_tx.send(WriterCommand::SendTo { client_id, frame });
                    }
                }
                ClientMessage::Goodbye => {
                    self.pending.remove(&client_id);
                    self.client_names.remove(&client_id);
                    let _ = self.writer_tx.send(WriterCommand::RemoveClient { client_id });
                    info!(target: "net", "client {client_id:?} disconnected");
                }
            }
        }
    }

    /// Executes one deferred remote operation from the priority arbiter's
    /// queue, if any (§4.6).
    pub fn drain_one_pending_op(&self) {
        self.controller.process_pending_ops();
    }

    pub fn client_count(&self) -> usize {
        self.client_names.len()
    }
}

impl Drop for NetServer {
    fn drop(&mut self) {
        let _ = self.writer_tx.send(WriterCommand::Shutdown);
        if let Some(handle) = self.writer_handle.take() {
            let _ = handle.join();
        }
    }
}
