//! Runner for romi: the event loop, session controller, scheduler and
//! behaviors.

pub mod behaviors;
mod bot;
pub mod commands;
pub mod controller;
pub mod event_bus;
pub mod logging;
pub mod relay;
pub mod scheduler;

pub use bot::{Bot, BotHandle, ControlMsg, TaskAction};
pub use controller::{IMMEDIATE_RECONNECT_DELAY, LiveSession, SessionController};
pub use event_bus::{EventBus, LoggingConsumer};
pub use relay::{RELAY_PREFIX, RelayError, RemoteChannel, Relay};
pub use scheduler::{TaskId, TaskScheduler};
