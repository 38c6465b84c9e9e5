/// Integration tests for ClientToServerConnectionData
/// These tests verify the client acknowledges server creations, replicates its own
/// entities upstream, and tears down cleanly when redirected

use keystone_shared::{
    ConnectionData, ConnectionDataType, DisconnectReason, GameInstant, GlobalEntity,
    MigrationPacket, MigrationToken, PendingCreationLimit, ReplicationPacket, ReplicationState,
};
use keystone_test::{
    assert_no_records, deliver, packets_named, TestClient, TestReplicationWindow, TestServer,
};

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

fn create(id: u64) -> ReplicationPacket {
    ReplicationPacket::EntityCreate {
        entity: GlobalEntity::from_u64(id),
        sent_at: at(0),
        state: Vec::new(),
    }
}

#[test]
fn creation_is_acknowledged_reliably() {
    let mut client = TestClient::new(2);
    assert_eq!(
        client.connection_data.connection_data_type(),
        ConnectionDataType::ClientToServer
    );

    client.connection_data.handle_packet(create(4).into(), at(0));

    let sent = client.connection.sent_packets();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].reliable);
    assert_eq!(
        sent[0].packet,
        ReplicationPacket::EntityCreateAck {
            entity: GlobalEntity::from_u64(4)
        }
        .into()
    );
    assert!(client.connection_data.has_remote_entity(&GlobalEntity::from_u64(4)));
}

#[test]
fn retransmitted_creation_is_acknowledged_again() {
    let mut client = TestClient::new(2);

    client.connection_data.handle_packet(create(4).into(), at(0));
    client.connection_data.handle_packet(create(4).into(), at(50));

    assert_eq!(
        packets_named(&client.connection.take_packets(), "EntityCreateAck"),
        vec![4, 4]
    );
    assert_eq!(client.connection_data.remote_entities().count(), 1);
}

#[test]
fn removal_forgets_entity() {
    let mut client = TestClient::new(2);
    client.connection_data.handle_packet(create(4).into(), at(0));

    let remove = ReplicationPacket::EntityRemove {
        entity: GlobalEntity::from_u64(4),
    };
    client.connection_data.handle_packet(remove.into(), at(10));

    assert!(!client.connection_data.has_remote_entity(&GlobalEntity::from_u64(4)));
}

/// Deferred creations reach the client once acks free the server's budget
#[test]
fn deferred_creations_are_eventually_delivered() {
    init_logger();
    let mut server = TestServer::new(&[1, 2, 3, 4, 5]);
    server
        .config
        .replication
        .set_max_pending_creation(PendingCreationLimit::Limited(2));
    let mut client = TestClient::new(2);

    for tick in 0..5 {
        let now = at(tick * 16);
        server.connection_data.update(now);
        deliver(&server.connection, &mut client.connection_data, now);
        deliver(&client.connection, &mut server.connection_data, now);
        assert!(server.connection_data.replication_manager().pending_creation_count() <= 2);
    }

    let known: Vec<u64> = client
        .connection_data
        .remote_entities()
        .map(|entity| entity.to_u64())
        .collect();
    assert_eq!(known, vec![1, 2, 3, 4, 5]);
    assert!(server
        .connection_data
        .replication_manager()
        .records()
        .all(|record| record.state() == ReplicationState::Active));
}

#[test]
fn client_owned_entities_replicate_upstream() {
    let mut client = TestClient::new(2);
    let window = TestReplicationWindow::with_relevant(&[500]);
    client.connection_data.set_replication_window(window.boxed());

    client.connection_data.update(at(0));
    assert_eq!(
        packets_named(&client.connection.take_packets(), "EntityCreate"),
        vec![500]
    );

    let ack = ReplicationPacket::EntityCreateAck {
        entity: GlobalEntity::from_u64(500),
    };
    client.connection_data.handle_packet(ack.into(), at(8));
    client.connection_data.update(at(16));

    assert_eq!(
        packets_named(&client.connection.take_packets(), "EntityUpdate"),
        vec![500]
    );
}

#[test]
fn migration_redirect_tears_down_client_side() {
    init_logger();
    let mut client = TestClient::new(2);
    let window = TestReplicationWindow::with_relevant(&[500]);
    client.connection_data.set_replication_window(window.boxed());
    client.connection_data.update(at(0));
    client.connection_data.handle_packet(create(4).into(), at(0));
    client.connection.take_packets();

    let redirect = MigrationPacket::ClientMigration {
        token: MigrationToken::from_u64(0xfeed),
        destination: "10.0.0.2:14191".parse().unwrap(),
        snapshot: at(90),
    };
    client.connection_data.handle_packet(redirect.into(), at(100));

    assert!(!client.connection_data.can_send_updates());
    assert_no_records!(client.connection_data);
    assert_eq!(client.connection_data.remote_entities().count(), 0);
    assert_eq!(
        client.connection.disconnect_reason(),
        Some(DisconnectReason::ClientMigrated)
    );
    assert!(client.connection_data.is_finished());

    let redirect = client.connection_data.take_migration_redirect().unwrap();
    assert_eq!(redirect.token, MigrationToken::from_u64(0xfeed));
    assert_eq!(redirect.snapshot, at(90));
    assert!(client.connection_data.take_migration_redirect().is_none());

    client.connection_data.update(at(116));
    assert!(client.connection.take_packets().is_empty());
}
