//! Server network layer handling UDP communications and game loop coordination

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::error::GameError;
use crate::game::{GameState, Outgoing};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PlayerId, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: PlayerId },
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    /// Recipients are fixed when the packet leaves the game loop
    BroadcastPacket {
        packet: Packet,
        recipients: Vec<(PlayerId, SocketAddr)>,
    },
}

/// Main server coordinating networking and game simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    tick_duration: Duration,
    client_timeout: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(config: &ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(config.address()).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let game_state = GameState::new(config);
        info!(
            "World {}x{} with {} food, {} Hz",
            config.width,
            config.height,
            game_state.world().food_count(),
            config.tick_rate
        );

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.move_interval(),
            ))),
            game_state,
            tick_duration: config.tick_duration(),
            client_timeout: config.client_timeout(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle for stopping `run` from another task
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, recipients } => {
                        // Serialize once for every recipient
                        let data = match serialize(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to serialize broadcast: {}", e);
                                continue;
                            }
                        };

                        for (client_id, addr) in recipients {
                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let timeout = self.client_timeout;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(timeout)
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), GameError> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn reject(&self, addr: SocketAddr, error: &GameError) {
        warn!("Rejecting client at {}: {}", addr, error);
        self.send_packet(
            Packet::Disconnected {
                reason: error.to_string(),
            },
            addr,
        );
    }

    /// Hands everything the simulation produced to the sender task
    async fn flush_outgoing(&mut self) {
        let outgoing = self.game_state.drain_outgoing();
        if outgoing.is_empty() {
            return;
        }

        // Sessions present now, so a client never gets broadcasts that were
        // produced before its own WorldInit
        let clients = self.clients.read().await;
        let client_addrs = clients.get_client_addrs();
        for message in outgoing {
            let queued = match message {
                Outgoing::To { player_id, packet } => match clients.addr_of(player_id) {
                    Some(addr) => self.game_tx.send(GameMessage::SendPacket { packet, addr }),
                    None => continue,
                },
                Outgoing::Broadcast { packet, exclude } => {
                    let recipients = client_addrs
                        .iter()
                        .filter(|(client_id, _)| Some(*client_id) != exclude)
                        .copied()
                        .collect();
                    self.game_tx.send(GameMessage::BroadcastPacket { packet, recipients })
                }
            };

            if let Err(e) = queued {
                error!("Failed to queue outgoing packet: {}", e);
            }
        }
    }

    async fn client_for(&self, addr: SocketAddr) -> Option<PlayerId> {
        let clients = self.clients.read().await;
        clients.find_client_by_addr(addr)
    }

    /// Removes a session from both the connection table and the world
    async fn drop_session(&mut self, client_id: PlayerId) {
        {
            let mut clients = self.clients.write().await;
            clients.remove_client(&client_id);
        }
        self.game_state.on_disconnect(client_id);
    }

    async fn handle_connect(
        &mut self,
        addr: SocketAddr,
        client_version: u32,
        name: Option<String>,
    ) {
        info!("Client connecting from {} (version: {})", addr, client_version);

        if client_version != PROTOCOL_VERSION {
            self.reject(
                addr,
                &GameError::VersionMismatch {
                    got: client_version,
                    expected: PROTOCOL_VERSION,
                },
            );
            return;
        }

        // Remove existing connection if present
        if let Some(existing_id) = self.client_for(addr).await {
            info!("Removing existing client {} from {}", existing_id, addr);
            self.drop_session(existing_id).await;
            // The old player's departure goes out before the new session exists
            self.flush_outgoing().await;
        }

        let added = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        let client_id = match added {
            Ok(client_id) => client_id,
            Err(e) => {
                self.reject(addr, &e);
                return;
            }
        };

        if let Err(e) = self.game_state.on_connect(client_id, name) {
            let mut clients = self.clients.write().await;
            clients.remove_client(&client_id);
            drop(clients);
            self.reject(addr, &e);
        }
    }

    /// Processes incoming packets and updates game state
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Packet::Connect {
            client_version,
            name,
        } = packet
        {
            self.handle_connect(addr, client_version, name).await;
            return;
        }

        let Some(client_id) = self.client_for(addr).await else {
            debug!("Packet from unknown address {}", addr);
            return;
        };

        {
            let mut clients = self.clients.write().await;
            clients.touch(client_id);
        }

        match packet {
            Packet::Move { x, y } => {
                let allowed = {
                    let mut clients = self.clients.write().await;
                    clients.allow_move(client_id)
                };

                if allowed {
                    self.game_state.on_move(client_id, x, y);
                } else {
                    debug!("Rate limited move from client {}", client_id);
                }
            }

            Packet::EatFood { food_id } => {
                self.game_state.on_eat_food(client_id, food_id);
            }

            Packet::Heartbeat => {}

            Packet::Disconnect => {
                self.drop_session(client_id).await;
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            self.game_state.on_disconnect(client_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    self.game_state.on_tick();
                },
            }

            self.flush_outgoing().await;
        }

        Ok(())
    }
}
