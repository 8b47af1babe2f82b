//! netsync-restart: deduplicated, sequential container recreation.
//!
//! # Architecture
//!
//! ```text
//! RestartHandle (cloneable)
//!   └── submit(units) ── pending keys (mutex) ──► bounded queue
//!                                                     │
//! RestartWorker (single consumer)                     ▼
//!   ├── ContainerRuntime::recreate(units)
//!   ├── release key
//!   └── settle delay (cancellable) before the next job
//! ```
//!
//! A job's key is its sorted, comma-joined container names, so two
//! requests for the same set of containers are the same job no matter
//! the order they were listed in.

pub mod error;
pub mod job;
pub mod runtime;
pub mod worker;

pub use error::{RuntimeError, RuntimeResult};
pub use job::{job_key, RestartJob};
pub use runtime::{ComposeRuntime, ContainerRuntime};
pub use worker::{RestartHandle, RestartWorker, WorkerSettings};
