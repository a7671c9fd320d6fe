mod common;

use std::time::Duration;

use stagecue_net::{ClientMessage, NetServer, ServerMessage};
use stagecue_types::Command;

#[test]
fn remote_command_gets_a_result_and_the_state_update_reaches_other_clients() {
    let (controller, bus) = common::test_controller();
    let mut server = NetServer::bind("127.0.0.1:0", controller, &bus).unwrap();
    let addr = server.local_addr().unwrap().to_string();

    let mut sender = common::RawClient::connect(&addr).unwrap();
    sender.send_hello("sender").unwrap();
    let mut listener = common::RawClient::connect(&addr).unwrap();
    listener.send_hello("listener").unwrap();

    common::drive_until_clients(&mut server, 2, Duration::from_secs(2));
    // drain both Welcomes
    sender.recv().unwrap();
    listener.recv().unwrap();

    sender
        .send(&ClientMessage::Command(Command::SetBgmVolume { volume: 0.5 }))
        .unwrap();
    common::drive_for(&mut server, Duration::from_millis(200));

    let result = sender
        .recv_until(|msg| matches!(msg, ServerMessage::CommandResult(_)))
        .unwrap();
    match result {
        ServerMessage::CommandResult(outcome) => assert!(outcome.success),
        other => panic!("expected CommandResult, got {other:?}"),
    }

    let update = listener
        .recv_until(|msg| matches!(msg, ServerMessage::Event(_)))
        .unwrap();
    match update {
        ServerMessage::Event(envelope) => assert_eq!(envelope.state.bgm_volume, 0.5),
        other => panic!("expected Event, got {other:?}"),
    }
}
