// Outbound link to the simulator
//
// SimLink owns the UDP socket; Link pairs it with the backbone so the
// scheduler sees one liveness check and one send call.

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::net::{UdpSocket, lookup_host};
use tracing::{debug, info};

use crate::backbone::Backbone;
use crate::error::{ActuatorError, Result};
use crate::table::WheelCommand;
use crate::wire;

/// What the scheduler needs from its output side
pub trait Transmit: Send + Sync + 'static {
    /// Checked at every tick before draining
    fn is_live(&self) -> bool;

    /// Send one command as one datagram
    fn transmit(&self, command: &WheelCommand) -> impl Future<Output = io::Result<()>> + Send;
}

/// Write-only datagram socket connected to the simulator
#[derive(Default)]
pub struct SimLink {
    socket: RwLock<Option<Arc<UdpSocket>>>,
}

impl SimLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Option<Arc<UdpSocket>> {
        self.socket
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, socket: Option<Arc<UdpSocket>>) -> Option<Arc<UdpSocket>> {
        let mut guard = self.socket.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, socket)
    }

    /// Connect to the simulator endpoint, closing any previous socket first
    pub async fn open(&self, address: &str, port: u16) -> Result<SocketAddr> {
        if port == 0 {
            return Err(ActuatorError::InvalidPort(port));
        }
        self.close();

        let resolved: Vec<SocketAddr> = lookup_host((address, port)).await?.collect();
        let target = resolved
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| resolved.first())
            .copied()
            .ok_or_else(|| ActuatorError::Unresolved(address.to_string()))?;

        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;

        self.replace(Some(Arc::new(socket)));
        info!("Simulator link open to {}", target);
        Ok(target)
    }

    pub fn close(&self) {
        if self.replace(None).is_some() {
            info!("Simulator link closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.current().is_some()
    }

    pub async fn send(&self, command: &WheelCommand) -> io::Result<()> {
        let socket = self
            .current()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "simulator link closed"))?;

        let packet = wire::encode_command(command);
        socket.send(&packet).await?;
        debug!(
            "Sent robot {} ({}): left={}, right={}",
            command.id,
            if command.yellow_team { "yellow" } else { "blue" },
            command.wheel_left,
            command.wheel_right
        );
        Ok(())
    }
}

/// Backbone session plus simulator socket
pub struct Link<B> {
    backbone: B,
    sim: SimLink,
}

impl<B: Backbone> Link<B> {
    pub fn new(backbone: B) -> Self {
        Self {
            backbone,
            sim: SimLink::new(),
        }
    }

    pub fn backbone(&self) -> &B {
        &self.backbone
    }

    pub fn sim(&self) -> &SimLink {
        &self.sim
    }

    /// Backbone first; the socket is only opened once it is up
    pub async fn connect(
        &self,
        backbone_address: &str,
        backbone_port: u16,
        sim_address: &str,
        sim_port: u16,
    ) -> Result<SocketAddr> {
        if sim_port == 0 {
            return Err(ActuatorError::InvalidPort(sim_port));
        }
        self.backbone.connect(backbone_address, backbone_port).await?;
        match self.sim.open(sim_address, sim_port).await {
            Ok(addr) => Ok(addr),
            Err(e) => {
                self.backbone.disconnect().await;
                Err(e)
            }
        }
    }

    pub async fn disconnect(&self) {
        self.sim.close();
        self.backbone.disconnect().await;
    }

    pub fn is_connected(&self) -> bool {
        self.sim.is_open() && self.backbone.is_connected()
    }
}

impl<B: Backbone> Transmit for Link<B> {
    fn is_live(&self) -> bool {
        self.is_connected()
    }

    async fn transmit(&self, command: &WheelCommand) -> io::Result<()> {
        self.sim.send(command).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backbone::BackboneError;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Backbone stand-in that connects unless told to fail
    #[derive(Default)]
    pub(crate) struct FakeBackbone {
        pub connected: AtomicBool,
        pub refuse: AtomicBool,
    }

    impl Backbone for FakeBackbone {
        async fn connect(&self, _address: &str, _port: u16) -> std::result::Result<(), BackboneError> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(BackboneError::Session("refused".to_string()));
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) {
            self.connected.store(false, Ordering::SeqCst);
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_connect_opens_socket() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let link = Link::new(FakeBackbone::default());
        let target = link.connect("127.0.0.1", 0, "127.0.0.1", port).await.unwrap();
        assert_eq!(target.port(), port);
        assert!(link.is_connected());
        assert!(link.is_live());
    }

    #[tokio::test]
    async fn test_backbone_failure_opens_no_socket() {
        let backbone = FakeBackbone::default();
        backbone.refuse.store(true, Ordering::SeqCst);
        let link = Link::new(backbone);

        let result = link.connect("127.0.0.1", 0, "127.0.0.1", 20011).await;
        assert!(matches!(result, Err(ActuatorError::Backbone(_))));
        assert!(!link.sim().is_open());
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_port_zero_rejected() {
        let link = Link::new(FakeBackbone::default());
        let result = link.connect("127.0.0.1", 0, "127.0.0.1", 0).await;
        assert!(matches!(result, Err(ActuatorError::InvalidPort(0))));
        assert!(!link.backbone().is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let link = Link::new(FakeBackbone::default());
        link.connect("127.0.0.1", 0, "127.0.0.1", 20011).await.unwrap();
        link.disconnect().await;
        link.disconnect().await;
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_reconnect_replaces_socket() {
        let link = Link::new(FakeBackbone::default());
        let first = link.connect("127.0.0.1", 0, "127.0.0.1", 20011).await.unwrap();
        let second = link.connect("127.0.0.1", 0, "127.0.0.1", 20012).await.unwrap();
        assert_eq!(first.port(), 20011);
        assert_eq!(second.port(), 20012);
        assert!(link.is_connected());
    }

    // Generic over the backbone, so this only compiles if connect is Send for every B
    fn reconnect_in_background<B: Backbone>(
        link: Arc<Link<B>>,
        port: u16,
    ) -> tokio::task::JoinHandle<Result<SocketAddr>> {
        tokio::spawn(async move { link.connect("127.0.0.1", 0, "127.0.0.1", port).await })
    }

    #[tokio::test]
    async fn test_reconnect_from_spawned_task() {
        let link = Arc::new(Link::new(FakeBackbone::default()));
        link.connect("127.0.0.1", 0, "127.0.0.1", 20011).await.unwrap();

        let target = reconnect_in_background(Arc::clone(&link), 20013)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(target.port(), 20013);
        assert!(link.is_connected());
    }

    #[tokio::test]
    async fn test_send_reaches_receiver() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sim = SimLink::new();
        sim.open("127.0.0.1", receiver.local_addr().unwrap().port())
            .await
            .unwrap();

        let command = WheelCommand {
            id: 2,
            yellow_team: false,
            wheel_left: 1.5,
            wheel_right: -1.5,
        };
        sim.send(&command).await.unwrap();

        let mut buf = [0u8; 128];
        let n = receiver.recv(&mut buf).await.unwrap();
        assert_eq!(wire::decode_packet(&buf[..n]).unwrap(), vec![command]);
    }

    #[tokio::test]
    async fn test_send_without_socket_fails() {
        let sim = SimLink::new();
        let command = WheelCommand {
            id: 0,
            yellow_team: true,
            wheel_left: 0.0,
            wheel_right: 0.0,
        };
        let err = sim.send(&command).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }
}
