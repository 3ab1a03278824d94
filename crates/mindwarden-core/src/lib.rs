//! mindwarden-core - Core library for the Mindustry server supervisor
//!
//! This crate provides:
//! - Console output parsing (line classification, multi-line query results, events)
//! - Player command dispatch with privilege levels and group votes
//! - Scheduled maintenance jobs
//! - Process supervision of the game server
//! - Configuration and localized messages

pub mod config;
pub mod core;
pub mod error;
pub mod messages;
pub mod probe;
pub mod semantic;

pub use crate::core::{
    CommandTable, Console, Handler, LaunchOptions, ProcessEvent, ProcessSupervisor, Server,
    ServerState, Settings, Timing,
};
pub use config::{Config, GameMode};
pub use error::{CommandError, ConfigError};
pub use messages::{Catalog, Messages};
pub use probe::{SaveDir, SlotStore, ThermalProbe, ThermalZone};

/// Version reported by the `show` command.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
