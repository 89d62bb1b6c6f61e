use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use adrift::sync::notify_one;
use adrift::{
    ConnectionManager, ConnectionState, DamageSink, FixedTimestep, MoveUpdate, NetworkEndpoint,
    Packet, PacketHeader, PacketType, PushableId, StateSink, SyncWorld, WorldMap,
};

use crate::config::ServerConfig;
use crate::events::{DisconnectReason, ServerEvent};

/// Fans a state update out over UDP. Built fresh per dispatch from a
/// snapshot of the connected clients so the world can hold `&mut self`
/// elsewhere.
struct BroadcastSink<'a> {
    endpoint: &'a mut NetworkEndpoint,
    connected: Vec<(u32, SocketAddr)>,
}

impl BroadcastSink<'_> {
    fn send(&mut self, update: MoveUpdate, addr: SocketAddr) {
        let sequence = self.endpoint.next_sequence();
        let packet = Packet::new(PacketHeader::new(sequence), PacketType::StateUpdate(update));
        if let Err(e) = self.endpoint.send_to(&packet, addr) {
            log::error!("failed to send state update to {addr}: {e}");
        }
    }
}

impl StateSink for BroadcastSink<'_> {
    fn send_to_all(&mut self, update: MoveUpdate) {
        for i in 0..self.connected.len() {
            let addr = self.connected[i].1;
            self.send(update, addr);
        }
    }

    fn send_to(&mut self, observer: u32, update: MoveUpdate) {
        if let Some(&(_, addr)) = self.connected.iter().find(|(id, _)| *id == observer) {
            self.send(update, addr);
        }
    }
}

/// Server-side health bookkeeping, fed by the exposure checks.
#[derive(Debug, Default)]
struct HealthTracker {
    health: HashMap<u32, i32>,
}

impl HealthTracker {
    const SPAWN_HEALTH: i32 = 100;

    fn register(&mut self, entity_id: u32) {
        self.health.insert(entity_id, Self::SPAWN_HEALTH);
    }

    fn remove(&mut self, entity_id: u32) {
        self.health.remove(&entity_id);
    }
}

impl DamageSink for HealthTracker {
    fn apply_oxygen_damage(&mut self, entity_id: u32, amount: u32) {
        let Some(health) = self.health.get_mut(&entity_id) else {
            return;
        };
        *health -= amount as i32;
        log::info!("entity {entity_id} took {amount} oxygen damage, {health} left");
        if *health <= 0 {
            log::warn!("entity {entity_id} suffocated");
        }
    }
}

pub struct GameServer {
    endpoint: NetworkEndpoint,
    connections: ConnectionManager,
    config: ServerConfig,
    world: SyncWorld,
    health: HealthTracker,
    timestep: FixedTimestep,
    last_tick_time: Instant,
    tick: u64,
    running: Arc<AtomicBool>,
    pending_events: VecDeque<ServerEvent>,
}

impl GameServer {
    pub fn new(bind_addr: &str, map: WorldMap, config: ServerConfig) -> io::Result<Self> {
        let endpoint = NetworkEndpoint::bind(bind_addr)?;
        let timestep = FixedTimestep::new(config.tick_rate);

        Ok(Self {
            endpoint,
            connections: ConnectionManager::new(config.max_clients),
            world: SyncWorld::new(map),
            health: HealthTracker::default(),
            timestep,
            last_tick_time: Instant::now(),
            tick: 0,
            running: Arc::new(AtomicBool::new(true)),
            pending_events: VecDeque::new(),
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();

            for event in self.pending_events.drain(..) {
                match event {
                    ServerEvent::ClientConnecting { addr } => {
                        log::info!("connection request from {addr}");
                    }
                    ServerEvent::ClientConnected {
                        client_id,
                        addr,
                        entity_id,
                    } => {
                        log::info!("client {client_id} connected from {addr} (entity {entity_id})");
                    }
                    ServerEvent::ClientDisconnected { client_id, reason } => {
                        log::info!("client {client_id} {}", reason.as_str());
                    }
                    ServerEvent::ConnectionDenied { addr, reason } => {
                        log::warn!("connection denied to {addr}: {reason}");
                    }
                    ServerEvent::Error { message } => {
                        log::error!("{message}");
                    }
                }
            }

            std::thread::sleep(Duration::from_millis(1));
        }
        self.shutdown_connections();
    }

    pub fn tick_once(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_tick_time;
        self.last_tick_time = now;
        self.timestep.accumulate(delta.as_secs_f32());

        if let Err(e) = self.process_network() {
            self.pending_events.push_back(ServerEvent::Error {
                message: format!("network error: {e}"),
            });
        }

        while self.timestep.consume_tick() {
            self.step();
        }
    }

    pub fn shutdown_connections(&mut self) {
        let client_ids: Vec<u32> = self.connections.iter().map(|c| c.client_id).collect();
        for client_id in client_ids {
            self.kick_client(client_id);
        }
    }

    pub fn kick_client(&mut self, client_id: u32) {
        if let Some(client) = self.connections.get(client_id) {
            let addr = client.addr;
            let sequence = self.endpoint.next_sequence();
            let packet = Packet::new(PacketHeader::new(sequence), PacketType::Disconnect);
            let _ = self.endpoint.send_to(&packet, addr);
        }

        if let Some(client) = self.connections.remove(client_id) {
            if let Some(entity_id) = client.entity_id {
                self.world.despawn_entity(entity_id);
                self.health.remove(entity_id);
            }
            self.pending_events
                .push_back(ServerEvent::ClientDisconnected {
                    client_id,
                    reason: DisconnectReason::Kicked,
                });
        }
    }

    fn connected_clients(&self) -> Vec<(u32, SocketAddr)> {
        self.connections
            .iter()
            .filter(|c| c.state == ConnectionState::Connected)
            .map(|c| (c.client_id, c.addr))
            .collect()
    }

    fn step(&mut self) {
        self.tick += 1;
        let dt = self.timestep.dt();

        let connected = self.connected_clients();
        let mut sink = BroadcastSink {
            endpoint: &mut self.endpoint,
            connected,
        };
        self.world.tick(dt, &mut sink, &mut self.health);

        self.flush_pushable_notifies();

        for client in self.connections.cleanup_timed_out() {
            if let Some(entity_id) = client.entity_id {
                self.world.despawn_entity(entity_id);
                self.health.remove(entity_id);
            }
            self.pending_events
                .push_back(ServerEvent::ClientDisconnected {
                    client_id: client.client_id,
                    reason: DisconnectReason::Timeout,
                });
        }
    }

    /// Objects flagged during rollbacks or physics steps get their state
    /// reaffirmed so stale client predictions self-correct.
    fn flush_pushable_notifies(&mut self) {
        let ids: Vec<PushableId> = self.world.map.pushables().map(|p| p.id).collect();
        for id in ids {
            let Some(pushable) = self.world.map.pushable_mut(id) else {
                continue;
            };
            if pushable.take_pending_notify() {
                log::debug!(
                    "reaffirming {:?} at {} impulse {}",
                    id,
                    pushable.position,
                    pushable.impulse
                );
            }
        }
    }

    fn process_network(&mut self) -> io::Result<()> {
        let packets = self.endpoint.receive()?;

        for (packet, addr) in packets {
            self.handle_packet(packet, addr)?;
        }

        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) -> io::Result<()> {
        if let Some(client) = self.connections.get_by_addr_mut(&addr) {
            if !client.receive_tracker.record_received(packet.header.sequence) {
                return Ok(());
            }
            client.touch();
        }

        match packet.payload {
            PacketType::ConnectionRequest { client_salt } => {
                self.handle_connection_request(addr, client_salt)?;
            }
            PacketType::SubmitAction { entity_id, action } => {
                self.handle_submit_action(addr, entity_id, action.into());
            }
            PacketType::ValidatePush {
                entity_id,
                pushable_id,
            } => {
                self.handle_validate_push(addr, entity_id, PushableId(pushable_id));
            }
            PacketType::Ping { timestamp } => {
                let sequence = self.endpoint.next_sequence();
                let packet = Packet::new(PacketHeader::new(sequence), PacketType::Pong { timestamp });
                self.endpoint.send_to(&packet, addr)?;
            }
            PacketType::Disconnect => {
                self.handle_disconnect(addr);
            }
            _ => {}
        }

        Ok(())
    }

    fn handle_connection_request(&mut self, addr: SocketAddr, client_salt: u64) -> io::Result<()> {
        self.pending_events
            .push_back(ServerEvent::ClientConnecting { addr });

        let (client_id, already_connected) =
            match self.connections.get_or_create_pending(addr, client_salt) {
                Ok(client) => (client.client_id, client.state == ConnectionState::Connected),
                Err(reason) => {
                    let sequence = self.endpoint.next_sequence();
                    let packet = Packet::new(
                        PacketHeader::new(sequence),
                        PacketType::ConnectionDenied {
                            reason: reason.to_string(),
                        },
                    );
                    self.endpoint.send_to(&packet, addr)?;
                    self.pending_events
                        .push_back(ServerEvent::ConnectionDenied {
                            addr,
                            reason: reason.to_string(),
                        });
                    return Ok(());
                }
            };

        // Retransmitted request: re-ack without spawning a second entity.
        let entity_id = if already_connected {
            match self.connections.get(client_id).and_then(|c| c.entity_id) {
                Some(id) => id,
                None => return Ok(()),
            }
        } else {
            let entity_id = self.world.spawn_entity(self.config.spawn_position);
            self.health.register(entity_id);

            let client = self
                .connections
                .get_mut(client_id)
                .expect("created just above");
            client.state = ConnectionState::Connected;
            client.entity_id = Some(entity_id);

            self.pending_events.push_back(ServerEvent::ClientConnected {
                client_id,
                addr,
                entity_id,
            });
            entity_id
        };

        let sequence = self.endpoint.next_sequence();
        let packet = Packet::new(
            PacketHeader::new(sequence),
            PacketType::ConnectionAccepted {
                client_id,
                entity_id,
            },
        );
        self.endpoint.send_to(&packet, addr)?;

        if !already_connected {
            self.initial_sync(client_id);
        }

        Ok(())
    }

    /// Snapshot every entity's authoritative state to a newly connected
    /// observer. NO_LERP so the client snaps instead of gliding everyone in
    /// from the origin.
    fn initial_sync(&mut self, client_id: u32) {
        let connected = self.connected_clients();
        let mut sink = BroadcastSink {
            endpoint: &mut self.endpoint,
            connected,
        };
        for entity_id in self.world.entity_ids() {
            if let Some(entity) = self.world.entity(entity_id) {
                notify_one(&mut sink, client_id, entity_id, entity.state(), true);
            }
        }
    }

    fn handle_submit_action(
        &mut self,
        addr: SocketAddr,
        entity_id: u32,
        action: adrift::PendingAction,
    ) {
        if !self.client_owns_entity(&addr, entity_id) {
            return;
        }

        let connected = self.connected_clients();
        let mut sink = BroadcastSink {
            endpoint: &mut self.endpoint,
            connected,
        };
        if let Err(e) = self.world.submit_action(entity_id, &mut sink, action) {
            log::warn!("action from {addr} dropped: {e}");
        }
    }

    fn handle_validate_push(&mut self, addr: SocketAddr, entity_id: u32, pushable: PushableId) {
        if !self.client_owns_entity(&addr, entity_id) {
            return;
        }

        if let Err(e) = self.world.validate_push(entity_id, pushable) {
            log::warn!("push claim from {addr} dropped: {e}");
        }
    }

    /// Clients only ever speak for their own entity.
    fn client_owns_entity(&mut self, addr: &SocketAddr, entity_id: u32) -> bool {
        let Some(client) = self.connections.get_by_addr_mut(addr) else {
            return false;
        };
        if client.state != ConnectionState::Connected || client.entity_id != Some(entity_id) {
            log::warn!("{addr} tried to act for entity {entity_id}");
            return false;
        }
        true
    }

    fn handle_disconnect(&mut self, addr: SocketAddr) {
        let Some(client_id) = self
            .connections
            .get_by_addr_mut(&addr)
            .map(|c| c.client_id)
        else {
            return;
        };

        if let Some(client) = self.connections.remove(client_id) {
            if let Some(entity_id) = client.entity_id {
                self.world.despawn_entity(entity_id);
                self.health.remove(entity_id);
            }
            self.pending_events
                .push_back(ServerEvent::ClientDisconnected {
                    client_id,
                    reason: DisconnectReason::Graceful,
                });
        }
    }
}
