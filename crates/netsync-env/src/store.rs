//! The `EnvStore` seam and backing selection.

use std::collections::BTreeMap;
use std::fmt;

use netsync_core::StoreConfig;
use tracing::info;

use crate::compose::ComposeStore;
use crate::envfile::EnvFileStore;
use crate::error::EnvResult;

/// Target of an environment update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    /// A single compose service.
    Service(&'a str),
    /// Configuration consumed by all of the listed services. File stores
    /// that every service loads ignore the list.
    Shared(&'a [&'a str]),
}

impl fmt::Display for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Service(name) => write!(f, "service:{name}"),
            Scope::Shared(_) => write!(f, "shared"),
        }
    }
}

/// Applies key/value environment updates to a backing file.
///
/// Each call is a read followed by a write only if some value differed.
/// Implementations do not lock; callers serialize access.
pub trait EnvStore: Send + Sync {
    /// Apply `updates` to `scope`. Returns whether anything changed on disk.
    fn update(&self, scope: Scope<'_>, updates: &BTreeMap<String, String>) -> EnvResult<bool>;

    /// Check that the backing file can be read and has the expected shape.
    fn verify(&self) -> EnvResult<()>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

/// Pick the backing store: the env file when one is configured, the
/// compose file otherwise.
pub fn open_store(config: &StoreConfig) -> Box<dyn EnvStore> {
    let store: Box<dyn EnvStore> = match &config.env_file {
        Some(path) => Box::new(EnvFileStore::new(path)),
        None => Box::new(ComposeStore::new(&config.compose_file)),
    };
    info!(store = %store.describe(), "environment store selected");
    store
}
