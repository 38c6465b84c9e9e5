use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use keystone_shared::{ConnectionId, HostId, Packet, TransportError};
use keystone_server::HostNetwork;

/// Host-to-host network that records packets instead of delivering them
pub struct TestHostNetwork {
    local_host: HostId,
    addresses: Mutex<HashMap<HostId, SocketAddr>>,
    fail_sends: AtomicBool,
    sent: Mutex<Vec<(ConnectionId, Packet)>>,
}

impl TestHostNetwork {
    pub fn new(local_host: u32) -> Arc<Self> {
        Arc::new(Self {
            local_host: HostId::new(local_host),
            addresses: Mutex::new(HashMap::new()),
            fail_sends: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn as_host_network(self: &Arc<Self>) -> Arc<dyn HostNetwork> {
        self.clone()
    }

    pub fn add_host(&self, host: HostId, address: SocketAddr) {
        self.addresses.lock().unwrap().insert(host, address);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn take_packets(&self) -> Vec<(ConnectionId, Packet)> {
        self.sent.lock().unwrap().drain(..).collect()
    }
}

impl HostNetwork for TestHostNetwork {
    fn local_host_id(&self) -> HostId {
        self.local_host
    }

    fn host_address(&self, host: &HostId) -> Option<SocketAddr> {
        self.addresses.lock().unwrap().get(host).copied()
    }

    fn send_reliable_packet(
        &self,
        connection_id: ConnectionId,
        packet: Packet,
    ) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed {
                connection_id,
                reason: "destination host unreachable".to_string(),
            });
        }
        self.sent.lock().unwrap().push((connection_id, packet));
        Ok(())
    }
}
