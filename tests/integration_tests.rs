//! Integration tests for the arena server
//!
//! These tests run a real `Server` on an ephemeral UDP port and talk to it
//! with plain sockets, the way a game client would.

use bincode::{deserialize, serialize};
use server::config::ServerConfig;
use server::network::{Server, ServerMessage};
use shared::{distance, Packet, Player, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(3);

fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.port = 0;
    config.initial_food = 50;
    config.seed = Some(2024);
    config
}

async fn start_server(
    config: ServerConfig,
) -> (SocketAddr, UnboundedSender<ServerMessage>, JoinHandle<()>) {
    let mut server = Server::new(&config).await.expect("Failed to start server");
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_handle();

    let handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            panic!("Server failed: {}", e);
        }
    });

    (addr, shutdown, handle)
}

struct TestClient {
    socket: UdpSocket,
    server: SocketAddr,
    buf: Vec<u8>,
}

impl TestClient {
    async fn new(server: SocketAddr) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind client socket");
        Self {
            socket,
            server,
            buf: vec![0u8; MAX_PACKET_SIZE],
        }
    }

    async fn send(&self, packet: &Packet) {
        let data = serialize(packet).unwrap();
        self.socket.send_to(&data, self.server).await.unwrap();
    }

    async fn connect(&self, name: &str) {
        self.send(&Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: Some(name.to_string()),
        })
        .await;
    }

    async fn recv(&mut self) -> Packet {
        let (len, _) = timeout(WAIT, self.socket.recv_from(&mut self.buf))
            .await
            .expect("Timed out waiting for a packet")
            .unwrap();
        deserialize(&self.buf[..len]).unwrap()
    }

    /// Receives until `pick` returns a value, skipping everything else
    async fn recv_until<T>(&mut self, mut pick: impl FnMut(Packet) -> Option<T>) -> T {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            assert!(
                tokio::time::Instant::now() < deadline,
                "Expected packet never arrived"
            );
            if let Some(found) = pick(self.recv().await) {
                return found;
            }
        }
    }

    /// Connects and returns our player plus every food id in the snapshot
    async fn join(&mut self, name: &str) -> (Player, usize) {
        self.connect(name).await;
        let (you, mut received, total) = self
            .recv_until(|packet| match packet {
                Packet::WorldInit {
                    you,
                    foods,
                    total_foods,
                    ..
                } => Some((you, foods.len(), total_foods as usize)),
                _ => None,
            })
            .await;

        while received < total {
            received += self
                .recv_until(|packet| match packet {
                    Packet::FoodBatch { foods } => Some(foods.len()),
                    _ => None,
                })
                .await;
        }
        (you, received)
    }
}

/// SESSION LIFECYCLE TESTS
mod session_tests {
    use super::*;

    /// Tests that a new client gets the whole world, split across datagrams
    #[tokio::test]
    async fn connect_receives_complete_snapshot() {
        let mut config = test_config();
        config.initial_food = 700;
        let (addr, shutdown, _) = start_server(config).await;

        let mut client = TestClient::new(addr).await;
        let (you, foods) = client.join("alice").await;

        assert_eq!(you.name, "alice");
        assert_eq!(you.score, 0);
        assert_eq!(foods, 700);

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests that joins and leaves are announced to other sessions
    #[tokio::test]
    async fn join_and_leave_are_broadcast() {
        let (addr, shutdown, _) = start_server(test_config()).await;

        let mut alice = TestClient::new(addr).await;
        let (alice_player, _) = alice.join("alice").await;

        let mut bob = TestClient::new(addr).await;
        let (bob_player, _) = bob.join("bob").await;
        assert_ne!(alice_player.id, bob_player.id);

        let joined = alice
            .recv_until(|packet| match packet {
                Packet::PlayerJoined { player } => Some(player),
                _ => None,
            })
            .await;
        assert_eq!(joined.id, bob_player.id);
        assert_eq!(joined.name, "bob");

        bob.send(&Packet::Disconnect).await;
        let left = alice
            .recv_until(|packet| match packet {
                Packet::PlayerLeft { player_id } => Some(player_id),
                _ => None,
            })
            .await;
        assert_eq!(left, bob_player.id);

        // Bob is gone from subsequent world updates
        let players = alice
            .recv_until(|packet| match packet {
                Packet::WorldUpdate { players, .. } => Some(players),
                _ => None,
            })
            .await;
        assert!(players.iter().all(|p| p.id != bob_player.id));
        assert!(players.iter().any(|p| p.id == alice_player.id));

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests capacity enforcement
    #[tokio::test]
    async fn server_full_rejects_connection() {
        let mut config = test_config();
        config.max_clients = 1;
        let (addr, shutdown, _) = start_server(config).await;

        let mut first = TestClient::new(addr).await;
        first.join("first").await;

        let mut second = TestClient::new(addr).await;
        second.connect("second").await;
        let reason = second
            .recv_until(|packet| match packet {
                Packet::Disconnected { reason } => Some(reason),
                _ => None,
            })
            .await;
        assert!(reason.contains("full"));

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests protocol version validation
    #[tokio::test]
    async fn version_mismatch_is_rejected() {
        let (addr, shutdown, _) = start_server(test_config()).await;

        let mut client = TestClient::new(addr).await;
        client
            .send(&Packet::Connect {
                client_version: PROTOCOL_VERSION + 7,
                name: None,
            })
            .await;

        match client.recv().await {
            Packet::Disconnected { reason } => assert!(reason.contains("version")),
            other => panic!("Expected Disconnected, got {:?}", other),
        }

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests that datagrams larger than a typical MTU-sized buffer still decode
    #[tokio::test]
    async fn oversized_connect_is_accepted() {
        let (addr, shutdown, _) = start_server(test_config()).await;

        let mut client = TestClient::new(addr).await;
        let long_name = "x".repeat(4000);
        client.connect(&long_name).await;

        let you = client
            .recv_until(|packet| match packet {
                Packet::WorldInit { you, .. } => Some(you),
                _ => None,
            })
            .await;
        // Names over the length limit fall back to the generated one
        assert_eq!(you.name, format!("Player_{:04}", you.id));

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests that silent sessions time out while heartbeats keep others alive
    #[tokio::test]
    async fn silent_client_times_out() {
        let mut config = test_config();
        config.client_timeout_secs = 1;
        let (addr, shutdown, _) = start_server(config).await;

        let mut alive = TestClient::new(addr).await;
        let (alive_player, _) = alive.join("alive").await;

        let mut silent = TestClient::new(addr).await;
        let (silent_player, _) = silent.join("silent").await;

        // Keep heartbeating well past the timeout
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        let mut left = None;
        while left.is_none() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "Silent client never timed out"
            );
            alive.send(&Packet::Heartbeat).await;
            if let Packet::PlayerLeft { player_id } = alive.recv().await {
                left = Some(player_id);
            }
        }
        assert_eq!(left, Some(silent_player.id));

        let players = alive
            .recv_until(|packet| match packet {
                Packet::WorldUpdate { players, .. } => Some(players),
                _ => None,
            })
            .await;
        assert!(players.iter().any(|p| p.id == alive_player.id));
        assert!(players.iter().all(|p| p.id != silent_player.id));

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests that the run loop exits on shutdown
    #[tokio::test]
    async fn shutdown_stops_run_loop() {
        let (_, shutdown, handle) = start_server(test_config()).await;

        shutdown.send(ServerMessage::Shutdown).unwrap();
        timeout(WAIT, handle)
            .await
            .expect("Server did not stop")
            .unwrap();
    }
}

/// SIMULATION OVER THE WIRE TESTS
mod simulation_tests {
    use super::*;

    /// Tests that the server moves a player toward its reported target
    #[tokio::test]
    async fn move_target_is_followed() {
        let (addr, shutdown, _) = start_server(test_config()).await;

        let mut client = TestClient::new(addr).await;
        let (you, _) = client.join("mover").await;

        // Aim at the opposite side of the world from the spawn point
        let target = (5000.0 - you.x, 5000.0 - you.y);
        let start_distance = distance(you.x, you.y, target.0, target.1);
        client
            .send(&Packet::Move {
                x: target.0,
                y: target.1,
            })
            .await;

        let mut closest = start_distance;
        for _ in 0..10 {
            let me = client
                .recv_until(|packet| match packet {
                    Packet::WorldUpdate { players, .. } => {
                        players.into_iter().find(|p| p.id == you.id)
                    }
                    _ => None,
                })
                .await;
            closest = closest.min(distance(me.x, me.y, target.0, target.1));
            assert!(me.x >= me.radius && me.x <= 5000.0 - me.radius);
            assert!(me.y >= me.radius && me.y <= 5000.0 - me.radius);
        }

        assert!(closest < start_distance || start_distance <= 1.0);

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests that malformed moves never take the server down
    #[tokio::test]
    async fn malformed_moves_are_ignored() {
        let (addr, shutdown, _) = start_server(test_config()).await;

        let mut client = TestClient::new(addr).await;
        let (you, _) = client.join("fuzzer").await;

        client
            .send(&Packet::Move {
                x: f32::NAN,
                y: f32::INFINITY,
            })
            .await;
        client.socket.send_to(&[0xff, 0x01, 0x02], addr).await.unwrap();

        let me = client
            .recv_until(|packet| match packet {
                Packet::WorldUpdate { players, .. } => players.into_iter().find(|p| p.id == you.id),
                _ => None,
            })
            .await;
        assert!(me.x.is_finite() && me.y.is_finite());

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Tests that client-reported eating of unknown food is a no-op
    #[tokio::test]
    async fn eat_unknown_food_is_ignored() {
        let (addr, shutdown, _) = start_server(test_config()).await;

        let mut client = TestClient::new(addr).await;
        let (you, _) = client.join("eater").await;

        client.send(&Packet::EatFood { food_id: u64::MAX }).await;

        let mut updates = 0;
        while updates < 5 {
            match client.recv().await {
                Packet::FoodConsumed { food_id, player_id } => {
                    assert_ne!(food_id, u64::MAX);
                    assert_ne!(player_id, you.id, "Food credited without contact");
                }
                Packet::WorldUpdate { players, .. } => {
                    let me = players.into_iter().find(|p| p.id == you.id).unwrap();
                    assert_eq!(me.score, 0);
                    assert_eq!(me.radius, you.radius);
                    updates += 1;
                }
                _ => {}
            }
        }

        let _ = shutdown.send(ServerMessage::Shutdown);
    }
}
