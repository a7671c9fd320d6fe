mod common;

use std::time::Duration;

use stagecue_net::{NetServer, ServerMessage};

#[test]
fn client_connects_and_receives_welcome_with_current_state() {
    let (controller, bus) = common::test_controller();
    let mut server = NetServer::bind("127.0.0.1:0", controller, &bus).unwrap();
    let addr = server.local_addr().unwrap().to_string();

    let mut client = common::RawClient::connect(&addr).unwrap();
    client.send_hello("console-a").unwrap();

    common::drive_until_clients(&mut server, 1, Duration::from_secs(2));

    match client.recv().unwrap() {
        ServerMessage::Welcome { state, .. } => {
            assert!(!state.is_playing);
        }
        other => panic!("expected Welcome, got {other:?}"),
    }
}

#[test]
fn goodbye_drops_the_client() {
    let (controller, bus) = common::test_controller();
    let mut server = NetServer::bind("127.0.0.1:0", controller, &bus).unwrap();
    let addr = server.local_addr().unwrap().to_string();

    let mut client = common::RawClient::connect(&addr).unwrap();
    client.send_hello("console-a").unwrap();
    common::drive_until_clients(&mut server, 1, Duration::from_secs(2));

    client.send(&stagecue_net::ClientMessage::Goodbye).unwrap();
    common::drive_for(&mut server, Duration::from_millis(200));

    assert_eq!(server.client_count(), 0);
}
