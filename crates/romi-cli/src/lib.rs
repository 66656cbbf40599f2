pub mod args;
pub mod console;
pub mod discord;

pub use args::Cli;
