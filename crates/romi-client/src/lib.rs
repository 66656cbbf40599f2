pub mod config;
pub mod session;
pub mod sim;

pub use session::{Connection, Connector, Container, GameSession, SessionError, SessionHandle};
