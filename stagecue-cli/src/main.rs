//! Show-control console entry point (SPEC_FULL.md §4.8). New relative to
//! the teacher, whose own binaries (`imbolc-gui`, `imbolc-ui`) are a
//! ratatui TUI this domain doesn't need; the shape below — load config,
//! wire the kernel, run a blocking stdin loop tagging every command
//! `CommandSource::Local` — follows the teacher's `imbolc-ui::network::run_server`
//! loop structure (accept/poll/broadcast) but drives it from a background
//! thread instead of the main loop, since the console itself blocks on
//! stdin.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stagecue_audio::{AudioHandle, NullMixerBackend};
use stagecue_core::controller::{Controller, LocalDispatcher};
use stagecue_core::{Config, EventBus};
use stagecue_net::NetServer;
use stagecue_types::{Command, Dispatcher};

fn main() {
    env_logger::init();

    let config = Config::load();
    log::info!(target: "cli", "stagecue starting, binding net server on {}", config.bind_addr);

    let bus = Arc::new(EventBus::new());
    // Real audio decode/output is an external collaborator (out of scope);
    // the null backend exercises the full command surface without one.
    let audio = AudioHandle::new(NullMixerBackend::new());
    let controller = Controller::new(config.clone(), audio, bus.clone());

    let bind_addr = config.bind_addr.clone();
    let net_controller = controller.clone();
    thread::spawn(move || match NetServer::bind(&bind_addr, net_controller, &bus) {
        Ok(mut server) => loop {
            server.accept_connections();
            server.poll_messages();
            server.drain_one_pending_op();
            thread::sleep(Duration::from_millis(10));
        },
        Err(err) => {
            log::error!(target: "cli", "failed to bind net server on {bind_addr}: {err}");
        }
    });

    run_repl(controller);
}

fn run_repl(controller: Controller) {
    let mut dispatcher = LocalDispatcher(controller);
    let stdin = io::stdin();
    print_help();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_command(line) {
            Ok(Some(command)) => {
                let outcome = dispatcher.dispatch(&command);
                print_outcome(&outcome);
            }
            Ok(None) => break,
            Err(msg) => eprintln!("error: {msg}"),
        }
        print!("> ");
        let _ = io::stdout().flush();
    }
}

fn print_help() {
    println!(
        "stagecue console — play pause resume stop next replay \
         seek <s> volume bgm|sfx <v> mode auto|manual save-bp \
         restore-bp <audio-id> <uuid> skip-silence quit"
    );
    print!("> ");
    let _ = io::stdout().flush();
}

/// Parses one REPL line into a `Command`. Returns `Ok(None)` for `quit`.
fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or_default();

    let command = match verb {
        "play" => Command::Play,
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "stop" => Command::Stop,
        "next" => Command::NextCue,
        "replay" => Command::Replay,
        "skip-silence" => Command::SkipSilence,
        "save-bp" => Command::SaveBreakpoint,
        "restore-bp" => {
            let audio_id = parts.next().ok_or("usage: restore-bp <audio-id> <breakpoint-uuid>")?;
            let bp_id = parts
                .next()
                .ok_or("usage: restore-bp <audio-id> <breakpoint-uuid>")?
                .parse::<uuid::Uuid>()
                .map_err(|_| "breakpoint id must be a uuid")?;
            Command::RestoreBreakpoint {
                audio_id: stagecue_types::AudioId::new(audio_id),
                bp_id: stagecue_types::BreakpointId(bp_id),
            }
        }
        "state" => Command::GetState,
        "seek" => {
            let position = parts
                .next()
                .ok_or("usage: seek <seconds>")?
                .parse::<f64>()
                .map_err(|_| "seek position must be a number")?;
            Command::Seek { position }
        }
        "volume" => {
            let target = parts.next().ok_or("usage: volume bgm|sfx <value>")?;
            let value = parts
                .next()
                .ok_or("usage: volume bgm|sfx <value>")?
                .parse::<f64>()
                .map_err(|_| "volume must be a number")?;
            match target {
                "bgm" => Command::SetBgmVolume { volume: value },
                "sfx" => Command::SetSfxVolume { volume: value },
                other => return Err(format!("unknown volume target '{other}'")),
            }
        }
        "mode" => {
            let mode = parts.next().ok_or("usage: mode auto|manual")?;
            match mode {
                "auto" => Command::SwitchMode { mode: stagecue_types::Mode::Auto },
                "manual" => Command::SwitchMode { mode: stagecue_types::Mode::Manual },
                other => return Err(format!("unknown mode '{other}'")),
            }
        }
        "quit" | "exit" => return Ok(None),
        other => return Err(format!("unknown command '{other}'")),
    };

    Ok(Some(command))
}

fn print_outcome(outcome: &stagecue_types::CommandOutcome) {
    if outcome.success {
        println!("ok");
    } else {
        println!("failed: {}", outcome.reason.as_deref().unwrap_or("unknown"));
    }
}
