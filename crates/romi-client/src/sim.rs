//! In-memory game server.
//!
//! `SimServer` implements the session traits against a tiny world model so the
//! runner can be exercised without a real server: the integration tests use it
//! as their fake and `romi --simulate` runs the whole bot against it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use romi_events::{Block, BlockPos, Control, ItemStack, SessionEvent, Vec3, Vitals};
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::{SessionConfig, SortRegion};
use crate::session::{Connection, Connector, Container, GameSession, SessionError};

const INVENTORY_SLOTS: u16 = 36;
const CONTAINER_SLOTS: u16 = 27;

#[derive(Default)]
struct SimWorld {
    blocks: HashMap<BlockPos, String>,
    containers: HashMap<BlockPos, Vec<ItemStack>>,
    inventory: Vec<ItemStack>,
    tossed: Vec<ItemStack>,
    position: Vec3,
    vitals: Option<Vitals>,
    unreachable: HashSet<BlockPos>,
    locked: HashSet<BlockPos>,

    goals: Vec<BlockPos>,
    chat_log: Vec<String>,
    control_log: Vec<(Control, bool)>,
    looks: Vec<(f32, f32)>,
    opened: Vec<BlockPos>,
    closed: Vec<BlockPos>,

    connect_attempts: Vec<SessionConfig>,
    failing_connects: u32,
    connect_delay: Duration,
    next_session: u64,
    /// Live sessions and their event senders; the newest one hears chat
    sessions: BTreeMap<u64, mpsc::UnboundedSender<SessionEvent>>,
}

impl SimWorld {
    fn is_live(&self, session: u64) -> bool {
        self.sessions.contains_key(&session)
    }

    fn ensure_live(&self, session: u64) -> Result<(), SessionError> {
        if self.is_live(session) {
            Ok(())
        } else {
            Err(SessionError::Closed)
        }
    }

    fn send_to_newest(&mut self, event: SessionEvent) -> bool {
        match self.sessions.values().next_back() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

fn free_slot(items: &[ItemStack], capacity: u16) -> Option<u16> {
    (0..capacity).find(|slot| items.iter().all(|i| i.slot != *slot))
}

/// Shared handle to the simulated world
#[derive(Clone, Default)]
pub struct SimServer {
    world: Arc<Mutex<SimWorld>>,
}

impl SimServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// World with a source chest full of mixed loot and an empty destination chest
    pub fn demo(region: SortRegion) -> Self {
        Self::new()
            .with_container(region.from, &[("arrow", 12), ("bone", 7), ("string", 3)])
            .with_container(region.to, &[])
    }

    fn world(&self) -> MutexGuard<'_, SimWorld> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_block(self, pos: BlockPos, name: &str) -> Self {
        self.world().blocks.insert(pos, name.to_string());
        self
    }

    /// Place a chest at `pos` holding `items` in consecutive slots
    pub fn with_container(self, pos: BlockPos, items: &[(&str, u32)]) -> Self {
        {
            let mut world = self.world();
            world.blocks.insert(pos, "chest".to_string());
            let stacks = items
                .iter()
                .enumerate()
                .map(|(slot, (name, count))| ItemStack::new(slot as u16, *name, *count))
                .collect();
            world.containers.insert(pos, stacks);
        }
        self
    }

    pub fn mark_unreachable(&self, pos: BlockPos) {
        self.world().unreachable.insert(pos);
    }

    /// Make the container at `pos` refuse to open
    pub fn lock_container(&self, pos: BlockPos) {
        self.world().locked.insert(pos);
    }

    pub fn fail_next_connects(&self, count: u32) {
        self.world().failing_connects = count;
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        self.world().connect_delay = delay;
    }

    pub fn set_vitals(&self, vitals: Vitals) {
        self.world().vitals = Some(vitals);
    }

    /// Deliver a chat line to the newest live session
    pub fn say(&self, sender: Option<&str>, message: &str) -> bool {
        self.world().send_to_newest(SessionEvent::Chat {
            sender: sender.map(str::to_string),
            message: message.to_string(),
        })
    }

    /// Kick the newest live session
    pub fn kick(&self, reason: &str) {
        let mut world = self.world();
        world.send_to_newest(SessionEvent::Kicked {
            reason: reason.to_string(),
        });
        let newest = world.sessions.keys().next_back().copied();
        if let Some(id) = newest {
            world.sessions.remove(&id);
        }
    }

    /// Report a protocol error on the newest live session.
    ///
    /// The session stays open on the server side until the client quits it.
    pub fn protocol_error(&self, message: &str) -> bool {
        self.world().send_to_newest(SessionEvent::Error {
            message: message.to_string(),
        })
    }

    /// Drop the newest live session's transport without a reason
    pub fn drop_connection(&self) {
        let mut world = self.world();
        let newest = world.sessions.keys().next_back().copied();
        if let Some(id) = newest {
            world.sessions.remove(&id);
        }
    }

    pub fn live_sessions(&self) -> usize {
        self.world().sessions.len()
    }

    pub fn container_items(&self, pos: BlockPos) -> Vec<ItemStack> {
        self.world().containers.get(&pos).cloned().unwrap_or_default()
    }

    /// Total count of `name` across the container at `pos`
    pub fn count_in(&self, pos: BlockPos, name: &str) -> u32 {
        self.container_items(pos)
            .iter()
            .filter(|i| i.name == name)
            .map(|i| i.count)
            .sum()
    }

    pub fn inventory(&self) -> Vec<ItemStack> {
        self.world().inventory.clone()
    }

    pub fn tossed(&self) -> Vec<ItemStack> {
        self.world().tossed.clone()
    }

    pub fn chat_log(&self) -> Vec<String> {
        self.world().chat_log.clone()
    }

    pub fn goals(&self) -> Vec<BlockPos> {
        self.world().goals.clone()
    }

    pub fn opened(&self) -> Vec<BlockPos> {
        self.world().opened.clone()
    }

    pub fn closed(&self) -> Vec<BlockPos> {
        self.world().closed.clone()
    }

    pub fn control_log(&self) -> Vec<(Control, bool)> {
        self.world().control_log.clone()
    }

    pub fn looks(&self) -> Vec<(f32, f32)> {
        self.world().looks.clone()
    }

    pub fn connect_attempts(&self) -> Vec<SessionConfig> {
        self.world().connect_attempts.clone()
    }

    pub fn connector(&self) -> SimConnector {
        SimConnector {
            server: self.clone(),
        }
    }
}

/// [`Connector`] that logs into a [`SimServer`]
#[derive(Clone)]
pub struct SimConnector {
    server: SimServer,
}

#[async_trait]
impl Connector for SimConnector {
    async fn connect(&self, config: &SessionConfig) -> Result<Connection, SessionError> {
        let delay = {
            let mut world = self.server.world();
            world.connect_attempts.push(config.clone());
            world.connect_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut world = self.server.world();
        if world.failing_connects > 0 {
            world.failing_connects -= 1;
            return Err(SessionError::ConnectFailed(format!(
                "{}: connection refused",
                config.address()
            )));
        }

        world.next_session += 1;
        let id = world.next_session;
        let (tx, rx) = mpsc::unbounded_channel();
        world.sessions.insert(id, tx);
        debug!(target: "sim", "Session {} logged in as {}", id, config.identity);

        Ok(Connection {
            handle: Arc::new(SimSession {
                server: self.server.clone(),
                id,
                username: config.identity.clone(),
            }),
            events: rx,
        })
    }
}

struct SimSession {
    server: SimServer,
    id: u64,
    username: String,
}

#[async_trait]
impl GameSession for SimSession {
    fn username(&self) -> String {
        self.username.clone()
    }

    fn chat(&self, message: &str) -> Result<(), SessionError> {
        let mut world = self.server.world();
        world.ensure_live(self.id)?;
        world.chat_log.push(message.to_string());
        Ok(())
    }

    fn vitals(&self) -> Option<Vitals> {
        let world = self.server.world();
        world.is_live(self.id).then(|| {
            world.vitals.unwrap_or(Vitals {
                health: 20.0,
                food: 20,
            })
        })
    }

    fn position(&self) -> Option<Vec3> {
        let world = self.server.world();
        world.is_live(self.id).then_some(world.position)
    }

    fn inventory(&self) -> Vec<ItemStack> {
        let world = self.server.world();
        if world.is_live(self.id) {
            world.inventory.clone()
        } else {
            Vec::new()
        }
    }

    fn set_control_state(&self, control: Control, active: bool) -> Result<(), SessionError> {
        let mut world = self.server.world();
        world.ensure_live(self.id)?;
        world.control_log.push((control, active));
        Ok(())
    }

    fn look(&self, yaw: f32, pitch: f32) -> Result<(), SessionError> {
        let mut world = self.server.world();
        world.ensure_live(self.id)?;
        world.looks.push((yaw, pitch));
        Ok(())
    }

    fn set_goal(&self, target: BlockPos, _range: f64) -> Result<(), SessionError> {
        let mut world = self.server.world();
        world.ensure_live(self.id)?;
        world.goals.push(target);
        if !world.unreachable.contains(&target) {
            world.position = target.center();
        }
        Ok(())
    }

    fn clear_goal(&self) {}

    fn block_at(&self, pos: BlockPos) -> Option<Block> {
        let world = self.server.world();
        world.blocks.get(&pos).map(|name| Block {
            name: name.clone(),
            pos,
        })
    }

    async fn open_container(&self, pos: BlockPos) -> Result<Box<dyn Container>, SessionError> {
        let mut world = self.server.world();
        world.ensure_live(self.id)?;
        if world.locked.contains(&pos) {
            return Err(SessionError::Rejected(format!("container at {} is locked", pos)));
        }
        if !world.containers.contains_key(&pos) {
            return Err(SessionError::NotFound(format!("container at {}", pos)));
        }
        world.opened.push(pos);

        Ok(Box::new(SimContainer {
            server: self.server.clone(),
            session: self.id,
            pos,
            open: true,
        }))
    }

    async fn toss(&self, item: &ItemStack) -> Result<(), SessionError> {
        let mut world = self.server.world();
        world.ensure_live(self.id)?;
        let idx = world
            .inventory
            .iter()
            .position(|i| i.slot == item.slot && i.name == item.name)
            .ok_or_else(|| SessionError::Rejected(format!("no {} in slot {}", item.name, item.slot)))?;
        let stack = world.inventory.remove(idx);
        world.tossed.push(stack);
        Ok(())
    }

    fn quit(&self, reason: &str) {
        let mut world = self.server.world();
        if world.sessions.remove(&self.id).is_some() {
            debug!(target: "sim", "Session {} quit: {}", self.id, reason);
        }
    }
}

struct SimContainer {
    server: SimServer,
    session: u64,
    pos: BlockPos,
    open: bool,
}

impl SimContainer {
    fn ensure_usable(&self, world: &SimWorld) -> Result<(), SessionError> {
        world.ensure_live(self.session)?;
        if self.open {
            Ok(())
        } else {
            Err(SessionError::Rejected("container window is closed".to_string()))
        }
    }
}

#[async_trait]
impl Container for SimContainer {
    fn items(&self) -> Vec<ItemStack> {
        self.server.container_items(self.pos)
    }

    async fn withdraw(&mut self, item: &ItemStack) -> Result<ItemStack, SessionError> {
        let mut world = self.server.world();
        self.ensure_usable(&world)?;

        let slot = free_slot(&world.inventory, INVENTORY_SLOTS)
            .ok_or_else(|| SessionError::Rejected("inventory full".to_string()))?;
        let contents = world.containers.entry(self.pos).or_default();
        let idx = contents
            .iter()
            .position(|i| i.slot == item.slot && i.name == item.name)
            .ok_or_else(|| SessionError::Rejected(format!("no {} in slot {}", item.name, item.slot)))?;
        let mut stack = contents.remove(idx);
        stack.slot = slot;
        world.inventory.push(stack.clone());
        Ok(stack)
    }

    async fn deposit(&mut self, item: &ItemStack) -> Result<(), SessionError> {
        let mut world = self.server.world();
        self.ensure_usable(&world)?;

        let contents = world.containers.get(&self.pos).cloned().unwrap_or_default();
        let slot = free_slot(&contents, CONTAINER_SLOTS)
            .ok_or_else(|| SessionError::Rejected("container full".to_string()))?;
        let idx = world
            .inventory
            .iter()
            .position(|i| i.slot == item.slot && i.name == item.name)
            .ok_or_else(|| SessionError::Rejected(format!("no {} in slot {}", item.name, item.slot)))?;
        let mut stack = world.inventory.remove(idx);
        stack.slot = slot;
        world.containers.entry(self.pos).or_default().push(stack);
        Ok(())
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.server.world().closed.push(self.pos);
        }
    }
}
