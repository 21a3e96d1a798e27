//! Connection bookkeeping for the arena server
//!
//! This module binds network addresses to player ids:
//! - Session lifecycle (connect, reconnect, disconnect, timeout)
//! - Capacity limits for concurrent sessions
//! - Per-session rate limiting of move packets
//!
//! The simulation itself never sees addresses; it only knows player ids.

use crate::error::{GameError, GameResult};
use log::info;
use shared::PlayerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A live session and its liveness / rate-limit state
#[derive(Debug)]
pub struct Client {
    /// Player id assigned by the server
    pub id: PlayerId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// When the last move packet was accepted
    pub last_move: Option<Instant>,
}

impl Client {
    pub fn new(id: PlayerId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            last_move: None,
        }
    }

    /// Returns true if no packets have been received within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Accepts a move at `now` unless one was accepted less than `interval` ago
    pub fn allow_move(&mut self, now: Instant, interval: Duration) -> bool {
        if let Some(last) = self.last_move {
            if now.saturating_duration_since(last) < interval {
                return false;
            }
        }
        self.last_move = Some(now);
        true
    }
}

/// Owns every session, keyed by player id
pub struct ClientManager {
    clients: HashMap<PlayerId, Client>,
    next_client_id: PlayerId,
    max_clients: usize,
    move_interval: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, move_interval: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            move_interval,
        }
    }

    /// Registers a new session and returns its player id
    pub fn add_client(&mut self, addr: SocketAddr) -> GameResult<PlayerId> {
        if self.clients.len() >= self.max_clients {
            return Err(GameError::ServerFull(self.max_clients));
        }

        let client_id = self.next_client_id;
        self.next_client_id = self.next_client_id.wrapping_add(1).max(1);

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));
        Ok(client_id)
    }

    /// Returns true if the client was found and removed
    pub fn remove_client(&mut self, client_id: &PlayerId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn addr_of(&self, client_id: PlayerId) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    /// Marks the client as alive
    pub fn touch(&mut self, client_id: PlayerId) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
        }
    }

    /// Applies the per-session move rate limit
    pub fn allow_move(&mut self, client_id: PlayerId) -> bool {
        let interval = self.move_interval;
        self.clients
            .get_mut(&client_id)
            .map(|client| client.allow_move(Instant::now(), interval))
            .unwrap_or(false)
    }

    /// Removes clients silent for longer than `timeout` and returns their ids
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<PlayerId> {
        let timed_out: Vec<PlayerId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            info!("Client {} timed out", client_id);
            self.remove_client(client_id);
        }

        timed_out
    }

    pub fn get_client_addrs(&self) -> Vec<(PlayerId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn manager(max_clients: usize) -> ClientManager {
        ClientManager::new(max_clients, Duration::from_millis(50))
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr());
        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_client_move_rate_limit() {
        let mut client = Client::new(1, test_addr());
        let start = Instant::now();
        let interval = Duration::from_millis(50);

        assert!(client.allow_move(start, interval));
        assert!(!client.allow_move(start + Duration::from_millis(10), interval));
        assert!(!client.allow_move(start + Duration::from_millis(49), interval));
        assert!(client.allow_move(start + Duration::from_millis(50), interval));
    }

    #[test]
    fn test_zero_interval_allows_every_move() {
        let mut client = Client::new(1, test_addr());
        let now = Instant::now();

        assert!(client.allow_move(now, Duration::ZERO));
        assert!(client.allow_move(now, Duration::ZERO));
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = manager(3);

        assert_eq!(manager.add_client(test_addr()).unwrap(), 1);
        assert_eq!(manager.add_client(test_addr2()).unwrap(), 2);
        assert_eq!(manager.len(), 2);
        assert!(!manager.is_empty());
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = manager(1);

        assert!(manager.add_client(test_addr()).is_ok());
        let second = manager.add_client(test_addr2());
        assert!(matches!(second, Err(GameError::ServerFull(1))));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut manager = manager(2);
        let first = manager.add_client(test_addr()).unwrap();
        manager.remove_client(&first);

        let second = manager.add_client(test_addr()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = manager(2);
        let client_id = manager.add_client(test_addr()).unwrap();

        assert!(manager.remove_client(&client_id));
        assert!(!manager.remove_client(&client_id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = manager(2);
        let client_id1 = manager.add_client(test_addr()).unwrap();
        let client_id2 = manager.add_client(test_addr2()).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id1));
        assert_eq!(manager.addr_of(client_id2), Some(test_addr2()));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
    }

    #[test]
    fn test_allow_move_unknown_client() {
        let mut manager = manager(2);
        assert!(!manager.allow_move(42));
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = manager(3);
        let stale = manager.add_client(test_addr()).unwrap();
        let fresh = manager.add_client(test_addr2()).unwrap();

        manager.clients.get_mut(&stale).unwrap().last_seen =
            Instant::now() - Duration::from_secs(10);

        let removed = manager.check_timeouts(Duration::from_secs(5));
        assert_eq!(removed, vec![stale]);
        assert_eq!(manager.len(), 1);
        assert!(manager.addr_of(fresh).is_some());
    }

    #[test]
    fn test_touch_refreshes_liveness() {
        let mut manager = manager(1);
        let id = manager.add_client(test_addr()).unwrap();
        manager.clients.get_mut(&id).unwrap().last_seen = Instant::now() - Duration::from_secs(10);

        manager.touch(id);
        assert!(manager.check_timeouts(Duration::from_secs(5)).is_empty());
    }
}
