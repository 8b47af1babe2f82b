//! netsync-core: shared types and configuration for netsync.
//!
//! netsync keeps a set of compose-managed containers in line with a single
//! row of network configuration held in a remote database. This crate
//! holds what every other crate agrees on:
//!
//! - **`types`**: `ChangeRecord`, `NetworkRow`, `DeployableUnit`,
//!   `EnvironmentUpdate`
//! - **`config`**: `netsync.toml` parsing and validation
//! - **`duration`**: "30s"-style duration strings

pub mod config;
pub mod duration;
pub mod error;
pub mod types;

pub use config::{
    FeaturedNetwork, FeaturedNetworksConfig, LimitsConfig, NetsyncConfig, ProxyConfig,
    RealtimeConfig, RestartConfig, ServicesConfig, StoreConfig, UnitConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
