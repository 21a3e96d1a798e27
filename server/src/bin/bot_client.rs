//! Headless bots for exercising a running arena server
//!
//! Each bot connects over UDP, keeps a local copy of the food it has been
//! told about and steers toward the nearest item.

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{debug, error, info, warn};
use rand::Rng;
use shared::{distance, Food, FoodId, Packet, PlayerId, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::interval;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless bots for the arena server")]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Number of bots to spawn
    #[arg(short, long, default_value_t = 1)]
    bots: usize,

    /// Move packets per second per bot
    #[arg(long, default_value_t = 15)]
    move_rate: u32,
}

/// What a bot knows about the world
#[derive(Default)]
struct BotView {
    id: Option<PlayerId>,
    position: (f32, f32),
    size: (f32, f32),
    score: u32,
    foods: HashMap<FoodId, (f32, f32)>,
}

impl BotView {
    fn add_foods(&mut self, foods: Vec<Food>) {
        self.foods
            .extend(foods.into_iter().map(|food| (food.id, (food.x, food.y))));
    }

    fn nearest_food(&self) -> Option<(f32, f32)> {
        let (x, y) = self.position;
        self.foods
            .values()
            .min_by(|a, b| distance(x, y, a.0, a.1).total_cmp(&distance(x, y, b.0, b.1)))
            .copied()
    }

    /// Applies a server packet; returns false once the server has dropped us
    fn apply(&mut self, bot: usize, packet: Packet) -> bool {
        match packet {
            Packet::WorldInit {
                you,
                foods,
                width,
                height,
                total_foods,
                ..
            } => {
                info!(
                    "Bot {} joined as player {} ({} food in world)",
                    bot, you.id, total_foods
                );
                self.id = Some(you.id);
                self.position = (you.x, you.y);
                self.size = (width, height);
                self.add_foods(foods);
            }
            Packet::FoodBatch { foods } => self.add_foods(foods),
            Packet::FoodSpawned { food } => self.add_foods(vec![food]),
            Packet::FoodConsumed { food_id, .. } => {
                self.foods.remove(&food_id);
            }
            Packet::WorldUpdate { players, .. } => {
                let me = self.id.and_then(|id| players.into_iter().find(|p| p.id == id));
                if let Some(me) = me {
                    self.position = (me.x, me.y);
                    if me.score != self.score {
                        debug!("Bot {} score {} radius {:.1}", bot, me.score, me.radius);
                        self.score = me.score;
                    }
                }
            }
            Packet::PlayerJoined { player } => debug!("Bot {} saw {} join", bot, player.name),
            Packet::PlayerLeft { player_id } => debug!("Bot {} saw {} leave", bot, player_id),
            Packet::Disconnected { reason } => {
                warn!("Bot {} disconnected: {}", bot, reason);
                return false;
            }
            other => warn!("Bot {} got unexpected packet {:?}", bot, other),
        }
        true
    }
}

async fn send(
    socket: &UdpSocket,
    packet: &Packet,
    server: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let data = serialize(packet)?;
    socket.send_to(&data, server).await?;
    Ok(())
}

async fn run_bot(
    bot: usize,
    server: SocketAddr,
    move_rate: u32,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    send(
        &socket,
        &Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: Some(format!("bot_{}", bot)),
        },
        server,
    )
    .await?;

    let mut view = BotView::default();
    let mut buf = vec![0u8; MAX_PACKET_SIZE];
    let mut move_timer = interval(Duration::from_secs_f64(1.0 / f64::from(move_rate.max(1))));
    let mut heartbeat = interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let (len, _) = received?;
                match deserialize::<Packet>(&buf[..len]) {
                    Ok(packet) => {
                        if !view.apply(bot, packet) {
                            return Ok(());
                        }
                    }
                    Err(e) => warn!("Bot {} failed to decode packet: {}", bot, e),
                }
            }
            _ = move_timer.tick() => {
                if view.id.is_none() {
                    continue;
                }
                let (x, y) = view.nearest_food().unwrap_or_else(|| {
                    let mut rng = rand::thread_rng();
                    (
                        rng.gen_range(0.0..view.size.0.max(1.0)),
                        rng.gen_range(0.0..view.size.1.max(1.0)),
                    )
                });
                send(&socket, &Packet::Move { x, y }, server).await?;
            }
            _ = heartbeat.tick() => {
                send(&socket, &Packet::Heartbeat, server).await?;
            }
            _ = shutdown.changed() => {
                send(&socket, &Packet::Disconnect, server).await?;
                info!("Bot {} left with score {}", bot, view.score);
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let server: SocketAddr = args.server.parse()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let move_rate = args.move_rate;

    info!("Spawning {} bots against {}", args.bots, server);
    let handles: Vec<_> = (0..args.bots)
        .map(|bot| {
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                if let Err(e) = run_bot(bot, server, move_rate, shutdown).await {
                    error!("Bot {} failed: {}", bot, e);
                }
            })
        })
        .collect();

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, disconnecting bots...");
    // Bots that already stopped have dropped their receivers
    let _ = shutdown_tx.send(true);

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
