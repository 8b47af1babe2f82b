//! Daemon wiring and supervised shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use netsync_core::NetsyncConfig;
use netsync_env::{open_store, EnvFileStore, EnvStore};
use netsync_handlers::{HandlerPipeline, HandlerSettings, HttpImageProbe, ImageProbe};
use netsync_realtime::{
    connect, ChangeListener, Heartbeat, ListenerSettings, MessageSink, PgRecordSource,
};
use netsync_restart::{ComposeRuntime, RestartWorker, WorkerSettings};

/// How long each background task gets to finish after shutdown.
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Build every component, subscribe, and run until a signal arrives or
/// the realtime connection fails.
pub async fn run(config: NetsyncConfig) -> anyhow::Result<()> {
    info!("netsync daemon starting");

    // ── Environment store ──────────────────────────────────────

    if let Some(path) = &config.store.env_file {
        EnvFileStore::new(path).ensure_exists()?;
    }
    let store: Arc<dyn EnvStore> = Arc::from(open_store(&config.store));
    store
        .verify()
        .with_context(|| format!("environment store {} is not usable", store.describe()))?;

    // ── Restart worker ─────────────────────────────────────────

    let runtime = Arc::new(ComposeRuntime::from_config(&config.restart, &config.store));
    let (worker, restarts) = RestartWorker::new(runtime, WorkerSettings::from_config(&config.restart));

    // ── Handler pipeline ───────────────────────────────────────

    let probe: Option<Arc<dyn ImageProbe>> = if config.limits.verify_images {
        Some(Arc::new(HttpImageProbe::new(config.limits.image_probe_timeout())?))
    } else {
        info!("image verification disabled");
        None
    };
    let pipeline = Arc::new(HandlerPipeline::standard(
        store,
        &HandlerSettings::from_config(&config),
        probe,
        restarts,
    ));

    // ── Background tasks ───────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx.clone()));

    let (sink, stream) = match connect(&config.realtime.url, &config.realtime.anon_key).await {
        Ok(halves) => halves,
        Err(e) => {
            shutdown_tx.send_replace(true);
            join_task("restart worker", worker_handle).await;
            return Err(e).context("failed to connect to realtime server");
        }
    };
    let sink: Arc<dyn MessageSink> = Arc::new(sink);
    let heartbeat_handle = tokio::spawn(
        Heartbeat::new(Arc::clone(&sink), config.realtime.heartbeat_interval())
            .run(shutdown_rx.clone()),
    );

    let listener = ChangeListener::new(
        ListenerSettings::from_config(&config.realtime),
        Arc::new(PgRecordSource::from_config(&config.realtime)),
        pipeline,
    );

    let mut receive_handle = match listener.subscribe(sink, Box::new(stream)).await {
        Ok(handle) => handle,
        Err(e) => {
            shutdown_tx.send_replace(true);
            listener.stop().await;
            join_task("heartbeat", heartbeat_handle).await;
            join_task("restart worker", worker_handle).await;
            return Err(e).context("failed to subscribe");
        }
    };

    // ── Wait ───────────────────────────────────────────────────

    let mut receive_finished = false;
    let outcome = tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            Ok(())
        }
        joined = &mut receive_handle => {
            receive_finished = true;
            match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(anyhow::Error::new(e).context("realtime receive loop failed")),
                Err(e) => Err(anyhow::Error::new(e).context("realtime receive loop panicked")),
            }
        }
    };

    // ── Shutdown ───────────────────────────────────────────────

    shutdown_tx.send_replace(true);
    listener.stop().await;
    if !receive_finished {
        join_task("receive loop", receive_handle).await;
    }
    join_task("heartbeat", heartbeat_handle).await;
    join_task("restart worker", worker_handle).await;

    match &outcome {
        Ok(()) => info!("netsync daemon stopped"),
        Err(e) => error!(error = %format!("{e:#}"), "netsync daemon stopped on error"),
    }
    outcome
}

/// Validate the configuration and the backing store without changing
/// anything.
pub fn check(config: &NetsyncConfig) -> anyhow::Result<()> {
    match &config.store.env_file {
        Some(path) if !path.exists() => {
            info!(path = ?path, "env file does not exist yet, it will be created on start");
        }
        _ => {
            let store = open_store(&config.store);
            store
                .verify()
                .with_context(|| format!("environment store {} is not usable", store.describe()))?;
        }
    }
    netsync_realtime::check_identifier(&config.realtime.table)?;

    info!(
        table = %config.realtime.table,
        chain_id = config.realtime.chain_id,
        proxy = config.services.proxy().is_some(),
        "configuration ok"
    );
    Ok(())
}

async fn join_task<T>(name: &str, handle: JoinHandle<T>) {
    match tokio::time::timeout(JOIN_TIMEOUT, handle).await {
        Ok(Ok(_)) => debug!(task = name, "task stopped"),
        Ok(Err(e)) => warn!(task = name, error = %e, "task panicked"),
        Err(_) => warn!(task = name, timeout = ?JOIN_TIMEOUT, "task did not stop in time"),
    }
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
