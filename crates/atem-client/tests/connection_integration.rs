//! Integration tests for the session task.
//!
//! A scripted device runs on the other end of a [`MemoryTransport`] pair.
//! Tokio time is paused, so resend and timeout timers elapse instantly
//! whenever every task is waiting.

use std::net::SocketAddr;

use async_trait::async_trait;
use atem_client::application::connection::{connect, ConnectionConfig, ConnectionError, ConnectionEvent};
use atem_client::infrastructure::network::memory::MemoryTransport;
use atem_client::infrastructure::network::{Transport, TransportError};
use atem_core::protocol::messages::{Cut, InitiationComplete, ProgramInput, ProtocolVersion};
use atem_core::protocol::packet::{HandshakeOpcode, HandshakePayload};
use atem_core::protocol::{decode_payload, encode_payload, MessageRegistry, Packet, PacketFlags, PacketHeader};
use atem_core::session::Unresponsive;
use atem_core::{AtemMessage, CloseReason, MixEffectBlock, SequenceNumber, SessionConfig, SessionError, VideoSource};
use mockall::mock;
use tokio_test::assert_ok;

const CLIENT_ID: u16 = 0x1234;
const ASSIGNED_ID: u16 = 0x8001;

fn addrs() -> (SocketAddr, SocketAddr) {
    ("10.0.0.1:50000".parse().unwrap(), "10.0.0.2:9910".parse().unwrap())
}

fn config() -> ConnectionConfig {
    ConnectionConfig {
        client_session_id: Some(CLIENT_ID),
        ..ConnectionConfig::default()
    }
}

fn dump() -> Vec<AtemMessage> {
    vec![
        ProtocolVersion { major: 2, minor: 30 }.into(),
        ProgramInput {
            mix_effect: MixEffectBlock::Me1,
            source: VideoSource::Input(3),
        }
        .into(),
        InitiationComplete.into(),
    ]
}

/// The device side of a [`MemoryTransport`] pair.
struct FakeDevice {
    transport: MemoryTransport,
    next_sequence: SequenceNumber,
}

impl FakeDevice {
    fn new(transport: MemoryTransport) -> Self {
        Self {
            transport,
            next_sequence: SequenceNumber(1),
        }
    }

    async fn recv(&self) -> Packet {
        let (bytes, _) = self.transport.recv_from().await.expect("client transport closed");
        Packet::decode(&bytes).expect("client sent a malformed packet")
    }

    async fn send(&self, packet: Packet) {
        let bytes = packet.encode().unwrap();
        self.transport.send_to(&bytes, self.transport.peer_addr()).await.unwrap();
    }

    async fn send_handshake(&self, header_id: u16, opcode: HandshakeOpcode, payload_id: u16) {
        let payload = HandshakePayload {
            opcode,
            session_id: payload_id,
            version_major: 2,
            version_minor: 30,
        };
        self.send(Packet::new(PacketHeader::new(PacketFlags::HANDSHAKE, header_id), payload.encode()))
            .await;
    }

    async fn send_messages(&mut self, messages: &[AtemMessage]) {
        let payload = encode_payload(messages, MessageRegistry::global()).unwrap();
        let mut header = PacketHeader::new(PacketFlags::ACK_REQUEST, ASSIGNED_ID);
        header.local_sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.next();
        self.send(Packet::new(header, payload)).await;
    }

    async fn send_ack(&self, sequence: SequenceNumber) {
        let mut header = PacketHeader::new(PacketFlags::ACK, ASSIGNED_ID);
        header.ack_sequence = sequence;
        self.send(Packet::new(header, Vec::new())).await;
    }

    /// Accepts the hello and sends the initial state dump.
    async fn accept(&mut self) {
        let hello = self.recv().await;
        assert!(hello.header.flags.contains(PacketFlags::HANDSHAKE));
        assert_eq!(hello.header.session_id, CLIENT_ID);
        self.send_handshake(CLIENT_ID, HandshakeOpcode::Accepted, ASSIGNED_ID).await;
        self.send_messages(&dump()).await;
    }

    /// Receives until a packet that asks for an ack arrives.
    async fn recv_reliable(&self) -> Packet {
        loop {
            let packet = self.recv().await;
            if packet.header.flags.contains(PacketFlags::ACK_REQUEST) {
                return packet;
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_connect_resolves_after_initial_dump() {
    // Arrange
    let (client_addr, device_addr) = addrs();
    let (client, device) = MemoryTransport::pair(client_addr, device_addr);
    let mut device = FakeDevice::new(device);
    let device_task = tokio::spawn(async move {
        device.accept().await;
        device
    });

    // Act
    let (handle, mut events) = assert_ok!(connect(client, device_addr, config()).await);
    let _device = device_task.await.unwrap();

    // Assert
    assert_eq!(handle.session_id(), ASSIGNED_ID);
    for expected in dump() {
        assert_eq!(events.recv().await, Some(ConnectionEvent::Message(Ok(expected))));
    }
    assert_eq!(
        events.recv().await,
        Some(ConnectionEvent::Connected {
            session_id: ASSIGNED_ID
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_sent_command_reaches_device() {
    // Arrange
    let (client_addr, device_addr) = addrs();
    let (client, device) = MemoryTransport::pair(client_addr, device_addr);
    let mut device = FakeDevice::new(device);
    let accepting = tokio::spawn(async move {
        device.accept().await;
        device
    });
    let (handle, _events) = connect(client, device_addr, config()).await.unwrap();
    let device = accepting.await.unwrap();

    // Act
    let sequence = handle
        .send(vec![Cut {
            mix_effect: MixEffectBlock::Me1,
        }
        .into()])
        .await
        .unwrap();
    let packet = device.recv_reliable().await;

    // Assert
    assert_eq!(packet.header.local_sequence, sequence);
    assert_eq!(packet.header.session_id, ASSIGNED_ID);
    let decoded = decode_payload(&packet.payload, MessageRegistry::global()).unwrap();
    assert_eq!(
        decoded,
        vec![Ok(Cut {
            mix_effect: MixEffectBlock::Me1
        }
        .into())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unacknowledged_command_is_retransmitted() {
    // Arrange
    let (client_addr, device_addr) = addrs();
    let (client, device) = MemoryTransport::pair(client_addr, device_addr);
    let mut device = FakeDevice::new(device);
    let accepting = tokio::spawn(async move {
        device.accept().await;
        device
    });
    let (handle, _events) = connect(client, device_addr, config()).await.unwrap();
    let device = accepting.await.unwrap();

    // Act – the device sees the command but does not acknowledge it
    let packet = {
        let sequence = handle
            .send(vec![Cut {
                mix_effect: MixEffectBlock::Me2,
            }
            .into()])
            .await
            .unwrap();
        let packet = device.recv_reliable().await;
        assert_eq!(packet.header.local_sequence, sequence);
        packet
    };
    let resent = device.recv_reliable().await;
    device.send_ack(resent.header.local_sequence).await;

    // Assert
    assert!(!packet.header.flags.contains(PacketFlags::IS_RETRANSMIT));
    assert_eq!(resent.header.local_sequence, packet.header.local_sequence);
    assert!(resent.header.flags.contains(PacketFlags::IS_RETRANSMIT));
    assert_eq!(resent.payload, packet.payload);
}

#[tokio::test(start_paused = true)]
async fn test_silent_device_fails_handshake() {
    // Arrange – the device endpoint exists but never answers
    let (client_addr, device_addr) = addrs();
    let (client, _device) = MemoryTransport::pair(client_addr, device_addr);

    // Act
    let result = connect(client, device_addr, config()).await;

    // Assert
    assert!(matches!(
        result,
        Err(ConnectionError::Session(SessionError::HandshakeFailed { attempts: 5 }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_hello_fails_connect() {
    let (client_addr, device_addr) = addrs();
    let (client, device) = MemoryTransport::pair(client_addr, device_addr);
    let device = FakeDevice::new(device);
    let rejecting = tokio::spawn(async move {
        device.recv().await;
        device.send_handshake(CLIENT_ID, HandshakeOpcode::Rejected, 0).await;
        device
    });

    let result = connect(client, device_addr, config()).await;
    let _device = rejecting.await.unwrap();

    assert!(matches!(
        result,
        Err(ConnectionError::Session(SessionError::HandshakeRejected))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_sends_disconnect_and_closes_events() {
    // Arrange
    let (client_addr, device_addr) = addrs();
    let (client, device) = MemoryTransport::pair(client_addr, device_addr);
    let mut device = FakeDevice::new(device);
    let accepting = tokio::spawn(async move {
        device.accept().await;
        device
    });
    let (handle, mut events) = connect(client, device_addr, config()).await.unwrap();
    let device = accepting.await.unwrap();

    // Act
    assert_ok!(handle.disconnect().await);

    // Assert
    let disconnect = loop {
        let packet = device.recv().await;
        if packet.header.flags.contains(PacketFlags::HANDSHAKE) {
            break HandshakePayload::decode(&packet.payload).unwrap();
        }
    };
    assert_eq!(disconnect.opcode, HandshakeOpcode::Disconnect);

    let mut last = None;
    while let Some(event) = events.recv().await {
        last = Some(event);
    }
    assert_eq!(last, Some(ConnectionEvent::Closed(CloseReason::LocalDisconnect)));
    assert!(matches!(
        handle.send(Vec::new()).await,
        Err(ConnectionError::TaskGone)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_device_closes_session() {
    // Arrange
    let (client_addr, device_addr) = addrs();
    let (client, device) = MemoryTransport::pair(client_addr, device_addr);
    let mut device = FakeDevice::new(device);
    let accepting = tokio::spawn(async move {
        device.accept().await;
        device
    });
    let (_handle, mut events) = connect(client, device_addr, config()).await.unwrap();
    let _device = accepting.await.unwrap();

    // Act – the device goes quiet after its dump
    let mut last = None;
    while let Some(event) = events.recv().await {
        last = Some(event);
    }

    // Assert
    assert!(matches!(
        last,
        Some(ConnectionEvent::Closed(CloseReason::Failed(SessionError::SessionUnresponsive(_))))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_command_exhausts_retries_with_default_timing() {
    // Arrange
    let (client_addr, device_addr) = addrs();
    let (client, device) = MemoryTransport::pair(client_addr, device_addr);
    let mut device = FakeDevice::new(device);
    let accepting = tokio::spawn(async move {
        device.accept().await;
        device
    });
    let (handle, mut events) = connect(client, device_addr, config()).await.unwrap();
    let _device = accepting.await.unwrap();

    // Act – the device stays up but never acknowledges the command
    let sent = handle
        .send(vec![Cut { mix_effect: MixEffectBlock::Me1 }.into()])
        .await
        .unwrap();
    let mut last = None;
    while let Some(event) = events.recv().await {
        last = Some(event);
    }

    // Assert – retries run out before the peer counts as silent
    assert_eq!(
        last,
        Some(ConnectionEvent::Closed(CloseReason::Failed(SessionError::SessionUnresponsive(
            Unresponsive::RetriesExhausted {
                sequence: sent,
                sends: SessionConfig::default().max_retransmits + 1,
            }
        ))))
    );
}

// ── Transport failure injection ───────────────────────────────────────────────

mock! {
    pub Socket {}

    #[async_trait]
    impl Transport for Socket {
        async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> Result<(), TransportError>;
        async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr), TransportError>;
    }
}

#[tokio::test]
async fn test_unreachable_switcher_fails_connect() {
    // Arrange
    let (_, device_addr) = addrs();
    let mut socket = MockSocket::new();
    socket.expect_send_to().times(1).returning(|_, _| {
        Err(TransportError::Io(std::io::Error::from(
            std::io::ErrorKind::NetworkUnreachable,
        )))
    });

    // Act
    let result = connect(socket, device_addr, config()).await;

    // Assert
    assert!(matches!(result, Err(ConnectionError::Transport(TransportError::Io(_)))));
}

#[tokio::test(start_paused = true)]
async fn test_datagrams_from_other_hosts_are_ignored() {
    // Arrange – the client dials the real device, but only a stranger answers
    let (client_addr, device_addr) = addrs();
    let stranger: SocketAddr = "10.0.0.99:9910".parse().unwrap();
    let (client, impostor) = MemoryTransport::pair(client_addr, stranger);
    let impostor = FakeDevice::new(impostor);
    impostor
        .send_handshake(CLIENT_ID, HandshakeOpcode::Accepted, ASSIGNED_ID)
        .await;

    // Act
    let result = connect(client, device_addr, config()).await;

    // Assert – the stranger's Accepted was not taken, so the handshake times out
    assert!(matches!(
        result,
        Err(ConnectionError::Session(SessionError::HandshakeFailed { .. }))
    ));
}
