/// Integration tests for ServerToClientConnectionData
/// These tests drive one server-side client connection through creation, updates,
/// flow control, live config changes and teardown of the controlled entity

use keystone_server::{ConnectionDataMap, ConnectionState, ServerConfig};
use keystone_shared::{
    ConnectionData, ConnectionDataType, ConnectionId, DisconnectReason, GameInstant,
    GlobalEntity, NetEntityRole, PendingCreationLimit, ReplicationConfig, ReplicationPacket,
    ReplicationState, TerminationEndpoint,
};
use keystone_test::{assert_no_records, deliver, packets_named, TestClient, TestServer};

fn init_logger() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

fn at(millis: u64) -> GameInstant {
    GameInstant::from_millis(millis)
}

fn state_of(server: &TestServer, id: u64) -> Option<ReplicationState> {
    server
        .connection_data
        .replication_manager()
        .record(&GlobalEntity::from_u64(id))
        .map(|record| record.state())
}

/// Creations go out reliably, updates unreliably once acknowledged
#[test]
fn creations_then_updates_after_ack() {
    init_logger();
    let mut server = TestServer::new(&[1, 2]);
    assert_eq!(
        server.connection_data.connection_data_type(),
        ConnectionDataType::ServerToClient
    );

    server.connection_data.update(at(0));
    let sent = server.connection.sent_packets();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|sent| sent.reliable));
    server.connection.take_packets();

    server.ack(&[1, 2], at(10));
    server.connection_data.update(at(16));

    let sent = server.connection.sent_packets();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|sent| !sent.reliable));
    assert_eq!(state_of(&server, 1), Some(ReplicationState::Active));
}

/// Acks produced by a real client side flow back through the server
#[test]
fn client_acks_activate_records() {
    init_logger();
    let mut server = TestServer::new(&[1, 2, 3]);
    let mut client = TestClient::new(2);

    server.connection_data.update(at(0));
    assert_eq!(deliver(&server.connection, &mut client.connection_data, at(5)), 3);
    assert_eq!(deliver(&client.connection, &mut server.connection_data, at(10)), 3);

    for id in 1..=3 {
        assert_eq!(state_of(&server, id), Some(ReplicationState::Active));
    }
    assert_eq!(server.connection_data.replication_manager().pending_creation_count(), 0);
}

/// Entity-stop scenario: disconnected by the server with zero records, within the tick
#[test]
fn controlled_entity_stop_disconnects_in_same_tick() {
    init_logger();
    let mut server = TestServer::new(&[1, 2, 3]);
    server.tick(at(0));
    server.ack(&[1], at(5));
    server.tick(at(16));

    server.entity.trigger_stop();
    assert!(!server.connection_data.can_send_updates());

    let sent = server.tick(at(32));

    assert!(sent.is_empty());
    assert_eq!(
        server.connection.disconnect_reason(),
        Some(DisconnectReason::TerminatedByServer)
    );
    assert_eq!(
        server.connection.termination_endpoint(),
        Some(TerminationEndpoint::Local)
    );
    assert_no_records!(server.connection_data);
    assert!(!server.connection_data.controlled_entity().exists());
    assert_eq!(server.connection_data.state(), ConnectionState::EntityRemoved);
    assert!(server.connection_data.is_finished());

    // nothing more is ever sent
    assert!(server.tick(at(48)).is_empty());
}

/// A stop raised after this tick's update still tears the connection down before the tick ends
#[test]
fn stop_after_update_tears_down_before_next_tick() {
    init_logger();
    let server = TestServer::new(&[1, 2]);
    let (connection, entity) = (server.connection.clone(), server.entity.clone());
    let mut map = ConnectionDataMap::new();
    map.insert(server.connection_data);

    map.update_all(at(0));
    assert_eq!(packets_named(&connection.take_packets(), "EntityCreate"), vec![1, 2]);
    assert_eq!(
        map.get(&ConnectionId::new(1))
            .map(|connection_data| connection_data.replication_manager().len()),
        Some(2)
    );

    entity.trigger_stop();

    assert_eq!(
        connection.disconnect_reason(),
        Some(DisconnectReason::TerminatedByServer)
    );
    let connection_data = map.get(&ConnectionId::new(1)).unwrap();
    assert_no_records!(*connection_data);
    assert!(!connection_data.can_send_updates());

    map.update_all(at(16));
    assert!(connection.take_packets().is_empty());
    assert_eq!(map.retain_live(), vec![ConnectionId::new(1)]);
}

#[test]
fn closed_gate_suppresses_sends() {
    let mut server = TestServer::new(&[1]);

    server.connection_data.set_can_send_updates(false);
    assert!(server.tick(at(0)).is_empty());

    server.connection_data.set_can_send_updates(true);
    assert_eq!(packets_named(&server.tick(at(16)), "EntityCreate"), vec![1]);
}

/// The role query covers a handoff the local event handler has not seen yet
#[test]
fn lost_authority_suppresses_sends() {
    let mut server = TestServer::new(&[1]);

    server.entity.set_role(NetEntityRole::Server);

    assert!(server.connection_data.can_send_updates());
    assert!(server.tick(at(0)).is_empty());
    assert_eq!(server.connection.send_calls(), 0);
}

#[test]
fn live_config_change_applies_on_next_update() {
    let mut server = TestServer::new(&[1, 2, 3]);

    server
        .config
        .replication
        .set_max_pending_creation(PendingCreationLimit::Limited(1));

    assert_eq!(packets_named(&server.tick(at(0)), "EntityCreate"), vec![1]);
    assert_eq!(server.connection_data.replication_manager().deferred_creation_count(), 2);
}

/// Cap-phase scenario: creations queued before gameplay starts survive a lower cap,
/// but no creation beyond the post-init cap is accepted afterwards
#[test]
fn gameplay_start_switches_to_post_init_cap() {
    init_logger();
    let config = ServerConfig::default();
    config.replication.set(ReplicationConfig {
        max_pending_creation: PendingCreationLimit::Unbounded,
        max_pending_creation_post_init: PendingCreationLimit::Limited(2),
        ..ReplicationConfig::default()
    });
    let mut server = TestServer::with_config(&[1, 2, 3, 4, 5], config);

    assert_eq!(
        packets_named(&server.tick(at(0)), "EntityCreate"),
        vec![1, 2, 3, 4, 5]
    );

    server.connection_data.on_gameplay_started();
    server.window.set_relevant(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);

    assert!(packets_named(&server.tick(at(16)), "EntityCreate").is_empty());
    for id in 1..=5 {
        assert_eq!(state_of(&server, id), Some(ReplicationState::PendingCreate));
    }

    server.ack(&[1, 2, 3, 4, 5], at(20));
    let sent = server.tick(at(32));
    assert_eq!(packets_named(&sent, "EntityUpdate"), vec![1, 2, 3, 4, 5]);
    assert_eq!(packets_named(&sent, "EntityCreate"), vec![6, 7]);

    assert!(packets_named(&server.tick(at(48)), "EntityCreate").is_empty());
    assert!(server.connection_data.replication_manager().pending_creation_count() <= 2);
}

#[test]
fn stale_ack_is_ignored() {
    let mut server = TestServer::new(&[]);

    server.ack(&[42], at(0));

    assert_no_records!(server.connection_data);
}

#[test]
fn window_departures_are_removed_after_delay() {
    let config = ServerConfig::default();
    config
        .replication
        .set_pending_removal_delay(std::time::Duration::from_millis(100));
    let mut server = TestServer::with_config(&[1, 2], config);
    server.tick(at(0));
    server.ack(&[1, 2], at(5));

    server.window.set_relevant(&[2]);
    let sent = server.tick(at(16));
    assert!(packets_named(&sent, "EntityRemove").is_empty());
    assert_eq!(state_of(&server, 1), Some(ReplicationState::PendingRemove));

    let sent = server.tick(at(116));
    assert_eq!(packets_named(&sent, "EntityRemove"), vec![1]);
    assert_eq!(state_of(&server, 1), None);
}

#[test]
fn dropping_connection_data_unsubscribes_handlers() {
    let server = TestServer::new(&[1]);
    let entity = server.entity.clone();
    assert_eq!(entity.stop_handler_count(), 1);
    assert_eq!(entity.migration_handler_count(), 1);

    drop(server);

    assert_eq!(entity.stop_handler_count(), 0);
    assert_eq!(entity.migration_handler_count(), 0);
    entity.trigger_stop();
}

#[test]
fn transport_failure_is_not_fatal() {
    let mut server = TestServer::new(&[1]);

    server.connection.set_fail_sends(true);
    assert!(server.tick(at(0)).is_empty());
    assert!(server.connection.disconnect_reason().is_none());

    server.connection.set_fail_sends(false);
    assert_eq!(packets_named(&server.tick(at(16)), "EntityCreate"), vec![1]);
}

#[test]
fn connection_map_drives_connections_in_registration_order() {
    init_logger();
    let first = TestServer::with_connection(&[1], ServerConfig::default(), 7);
    let second = TestServer::with_connection(&[2], ServerConfig::default(), 3);
    let (first_connection, first_entity) = (first.connection.clone(), first.entity.clone());
    let second_connection = second.connection.clone();

    let mut map = ConnectionDataMap::new();
    map.insert(first.connection_data);
    map.insert(second.connection_data);
    assert_eq!(
        map.connection_ids(),
        &[ConnectionId::new(7), ConnectionId::new(3)]
    );

    map.update_all(at(0));
    assert_eq!(packets_named(&first_connection.take_packets(), "EntityCreate"), vec![1]);
    assert_eq!(packets_named(&second_connection.take_packets(), "EntityCreate"), vec![2]);

    first_entity.trigger_stop();
    map.update_all(at(16));

    assert_eq!(map.retain_live(), vec![ConnectionId::new(7)]);
    assert_eq!(map.len(), 1);
    assert!(map.get(&ConnectionId::new(3)).is_some());

    let removed = map.remove(&ConnectionId::new(3));
    assert!(removed.is_some());
    assert!(map.is_empty());
}

#[test]
fn client_update_for_unknown_entity_is_ignored() {
    let mut client = TestClient::new(2);

    let update = ReplicationPacket::EntityUpdate {
        entity: GlobalEntity::from_u64(9),
        sent_at: at(0),
        state: vec![1, 2, 3],
    };
    client.connection_data.handle_packet(update.into(), at(0));

    assert!(!client.connection_data.has_remote_entity(&GlobalEntity::from_u64(9)));
    assert!(client.connection.take_packets().is_empty());
}
