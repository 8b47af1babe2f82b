//! netsync-env: the config mutator.
//!
//! Writes environment variables for the managed services into one of two
//! backing files, chosen once at startup:
//!
//! - **`ComposeStore`**: `services.<name>.environment` inside a compose file
//! - **`EnvFileStore`**: a flat `KEY=VALUE` file loaded by every service
//!
//! Both report whether anything changed and leave the file alone when
//! nothing did, so an unchanged record never causes a restart.

pub mod compose;
pub mod envfile;
pub mod error;
pub mod store;

pub use compose::ComposeStore;
pub use envfile::EnvFileStore;
pub use error::{EnvError, EnvResult};
pub use store::{open_store, EnvStore, Scope};
