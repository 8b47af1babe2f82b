//! netsync-realtime: turns database row changes into pipeline runs.
//!
//! # Architecture
//!
//! ```text
//! ChangeListener::subscribe
//!   ├── RecordSource::fetch ── current rows ──► HandlerPipeline (reconciliation)
//!   ├── spawn receive loop
//!   │     MessageStream ── Envelope ── table / chain filter ──► HandlerPipeline
//!   └── MessageSink ◄── phx_join
//!
//! Heartbeat ── every interval ──► MessageSink
//! ```
//!
//! The websocket is split once: the stream half is owned by the receive
//! loop, the sink half is shared between the listener and the heartbeat.

pub mod error;
pub mod heartbeat;
pub mod listener;
pub mod protocol;
pub mod reconcile;
pub mod transport;

pub use error::{ListenerError, ListenerResult, TransportError, TransportResult};
pub use heartbeat::Heartbeat;
pub use listener::{ChangeListener, ListenerSettings, ListenerState};
pub use protocol::{ChangeData, Envelope, HeartbeatMessage, JoinMessage};
pub use reconcile::{check_identifier, PgRecordSource, RecordSource};
pub use transport::{connect, MessageSink, MessageStream, WsSink, WsStream};
