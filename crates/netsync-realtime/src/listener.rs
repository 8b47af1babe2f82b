//! Change listener: reconciliation, subscription and the receive loop.
//!
//! ```text
//! Disconnected ──reconcile──► Connected ──phx_join──► Subscribed ──stop──► Closed
//! ```
//!
//! Reconciliation must succeed before anything is subscribed. The receive
//! loop decodes every inbound message and hands matching change events to
//! the handler pipeline, one at a time in arrival order.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use netsync_core::{ChangeRecord, RealtimeConfig};
use netsync_handlers::HandlerPipeline;

use crate::error::{ListenerError, ListenerResult};
use crate::protocol::{Envelope, JoinMessage};
use crate::reconcile::{check_identifier, RecordSource};
use crate::transport::{MessageSink, MessageStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Disconnected,
    /// Reconciliation finished; the join has not been sent yet.
    Connected,
    Subscribed,
    Closed,
}

/// Which rows the listener cares about.
#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub table: String,
    pub chain_id: u64,
}

impl ListenerSettings {
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self {
            table: config.table.clone(),
            chain_id: config.chain_id,
        }
    }
}

pub struct ChangeListener {
    dispatcher: Dispatcher,
    source: Arc<dyn RecordSource>,
    state: Arc<watch::Sender<ListenerState>>,
    shutdown: watch::Sender<bool>,
    sink: Mutex<Option<Arc<dyn MessageSink>>>,
}

impl ChangeListener {
    pub fn new(
        settings: ListenerSettings,
        source: Arc<dyn RecordSource>,
        pipeline: Arc<HandlerPipeline>,
    ) -> Self {
        let (state, _) = watch::channel(ListenerState::Disconnected);
        let (shutdown, _) = watch::channel(false);
        Self {
            dispatcher: Dispatcher { settings, pipeline },
            source,
            state: Arc::new(state),
            shutdown,
            sink: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Receiver for state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Reconcile, start the receive loop, then send the join.
    ///
    /// The returned task ends with an error if the transport fails or
    /// the peer closes the stream, and with `Ok` after [`stop`](Self::stop).
    pub async fn subscribe(
        &self,
        sink: Arc<dyn MessageSink>,
        stream: Box<dyn MessageStream>,
    ) -> ListenerResult<JoinHandle<ListenerResult<()>>> {
        if self.state() != ListenerState::Disconnected {
            return Err(ListenerError::AlreadySubscribed);
        }

        let processed = self.reconcile().await?;
        info!(rows = processed, "initial reconciliation finished");
        self.state.send_replace(ListenerState::Connected);

        let task = tokio::spawn(receive_loop(
            self.dispatcher.clone(),
            stream,
            self.shutdown.subscribe(),
            Arc::clone(&self.state),
        ));

        let settings = &self.dispatcher.settings;
        let join = serde_json::to_string(&JoinMessage::new(&settings.table, settings.chain_id))?;
        if let Err(e) = sink.send(join).await {
            task.abort();
            self.state.send_replace(ListenerState::Closed);
            return Err(e.into());
        }

        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
        self.state.send_replace(ListenerState::Subscribed);
        info!(table = %settings.table, chain_id = settings.chain_id, "subscribed to table changes");
        Ok(task)
    }

    /// End the receive loop and close the connection.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);
        let sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(sink) = sink {
            if let Err(e) = sink.close().await {
                warn!(error = %e, "failed to close realtime connection");
            }
        }
        self.state.send_replace(ListenerState::Closed);
        info!("change listener stopped");
    }

    /// Run every current row through the pipeline. Row-level failures are
    /// logged and skipped.
    async fn reconcile(&self) -> ListenerResult<usize> {
        let settings = &self.dispatcher.settings;
        check_identifier(&settings.table)?;

        let rows = self.source.fetch(&settings.table, settings.chain_id).await?;
        let mut processed = 0;
        for row in rows {
            match row {
                Ok(row) => {
                    let record = ChangeRecord::from_row(settings.table.as_str(), row);
                    if let Err(e) = self.dispatcher.pipeline.handle(&record).await {
                        warn!(record = record.id, error = %e, "failed to handle initial record");
                    }
                    processed += 1;
                }
                Err(e) => warn!(error = %e, "skipping undecodable row"),
            }
        }
        Ok(processed)
    }
}

/// Filters inbound events and feeds the pipeline.
#[derive(Clone)]
struct Dispatcher {
    settings: ListenerSettings,
    pipeline: Arc<HandlerPipeline>,
}

impl Dispatcher {
    async fn dispatch(&self, text: &str) {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "failed to decode realtime message");
                return;
            }
        };
        debug!(event = %envelope.event, "received event");

        let Some(change) = envelope.into_change() else {
            return;
        };
        if change.table != self.settings.table {
            warn!(table = %change.table, "unhandled table");
            return;
        }
        let Some(row) = change.record else {
            warn!(kind = %change.kind, "change event without record");
            return;
        };
        if row.chain_id != self.settings.chain_id {
            debug!(chain_id = row.chain_id, "ignoring record for another chain");
            return;
        }

        let record = ChangeRecord::from_row(change.table, row);
        if let Err(e) = self.pipeline.handle(&record).await {
            warn!(record = record.id, error = %e, "failed to handle change");
        }
    }
}

async fn receive_loop(
    dispatcher: Dispatcher,
    mut stream: Box<dyn MessageStream>,
    mut shutdown: watch::Receiver<bool>,
    state: Arc<watch::Sender<ListenerState>>,
) -> ListenerResult<()> {
    let result = loop {
        if *shutdown.borrow() {
            break Ok(());
        }
        let message = tokio::select! {
            message = stream.next_message() => message,
            _ = shutdown.changed() => break Ok(()),
        };
        match message {
            Some(Ok(text)) => dispatcher.dispatch(&text).await,
            Some(Err(e)) => {
                error!(error = %e, "realtime read failed");
                break Err(e.into());
            }
            None if *shutdown.borrow() => break Ok(()),
            None => {
                error!("realtime stream ended");
                break Err(ListenerError::StreamEnded);
            }
        }
    };
    state.send_replace(ListenerState::Closed);
    result
}
