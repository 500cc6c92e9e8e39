//! CLI commands

mod config;
mod replay;

pub use config::{show_config, ConfigArgs};
pub use replay::{replay, ReplayArgs};
