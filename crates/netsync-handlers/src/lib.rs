//! netsync-handlers: from a change record to environment updates and a
//! restart job.
//!
//! # Architecture
//!
//! ```text
//! ChangeRecord
//!   └── HandlerPipeline::handle
//!         ├── CoinHandler      ── frontend / backend / stats  (unit scope)
//!         ├── ImageHandler     ── frontend                    (unit scope)
//!         ├── NameHandler      ── frontend                    (unit scope)
//!         └── ExplorerHandler  ── every service               (shared scope)
//!                │
//!                ▼
//!         union of changed units ──► RestartHandle::submit (once)
//! ```
//!
//! Handlers never read configuration on their own; everything they need is
//! passed in through [`HandlerSettings`].

pub mod coin;
pub mod error;
pub mod explorer;
pub mod featured;
pub mod handler;
pub mod image;
pub mod name;
pub mod pipeline;

pub use coin::CoinHandler;
pub use error::{HandlerError, PipelineError, PipelineResult};
pub use explorer::{ExplorerHandler, ExplorerTarget};
pub use featured::featured_networks;
pub use handler::{Handler, HandlerResult, HandlerSettings};
pub use image::{HttpImageProbe, ImageHandler, ImageProbe};
pub use name::NameHandler;
pub use pipeline::HandlerPipeline;
