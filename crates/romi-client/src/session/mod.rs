//! Narrow interfaces to the game client.
//!
//! The protocol implementation lives behind these traits; the runner only
//! decides *when* to call them and treats every call as fallible.

mod error;

pub use error::SessionError;

use std::sync::Arc;

use async_trait::async_trait;
use romi_events::{Block, BlockPos, Control, ItemStack, SessionEvent, Vec3, Vitals};
use tokio::sync::mpsc;

use crate::config::SessionConfig;

/// Shared, non-owning view of a live session.
///
/// Only the session controller creates and quits handles; everyone else must
/// stop using a handle once the controller reports it dead.
pub type SessionHandle = Arc<dyn GameSession>;

/// Result of a successful connect: the handle plus its event stream
pub struct Connection {
    pub handle: SessionHandle,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

/// Establishes game sessions
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connect and log in; resolves once the player has spawned
    async fn connect(&self, config: &SessionConfig) -> Result<Connection, SessionError>;
}

/// Operations on a logged-in game session
#[async_trait]
pub trait GameSession: Send + Sync {
    fn username(&self) -> String;

    fn chat(&self, message: &str) -> Result<(), SessionError>;

    /// `None` until the player entity has spawned
    fn vitals(&self) -> Option<Vitals>;

    fn position(&self) -> Option<Vec3>;

    /// Stacks in the player inventory; empty when the session is gone
    fn inventory(&self) -> Vec<ItemStack>;

    fn set_control_state(&self, control: Control, active: bool) -> Result<(), SessionError>;

    /// Turn the head; yaw and pitch in radians
    fn look(&self, yaw: f32, pitch: f32) -> Result<(), SessionError>;

    /// Hand a movement goal to the pathfinder; arrival is detected by polling `position`
    fn set_goal(&self, target: BlockPos, range: f64) -> Result<(), SessionError>;

    fn clear_goal(&self);

    fn block_at(&self, pos: BlockPos) -> Option<Block>;

    async fn open_container(&self, pos: BlockPos) -> Result<Box<dyn Container>, SessionError>;

    /// Drop an inventory stack into the world
    async fn toss(&self, item: &ItemStack) -> Result<(), SessionError>;

    /// Close the connection; further calls fail with [`SessionError::Closed`]
    fn quit(&self, reason: &str);
}

/// An open container window.
///
/// The server accepts one inventory transaction at a time, so callers must
/// await each operation and pace them.
#[async_trait]
pub trait Container: Send + Sync {
    /// Current contents of the container slots
    fn items(&self) -> Vec<ItemStack>;

    /// Move a container stack into the player inventory, returning the inventory stack
    async fn withdraw(&mut self, item: &ItemStack) -> Result<ItemStack, SessionError>;

    /// Move an inventory stack into the container
    async fn deposit(&mut self, item: &ItemStack) -> Result<(), SessionError>;

    async fn close(&mut self);
}
