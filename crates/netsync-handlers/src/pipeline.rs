//! Handler pipeline: runs every handler against a record and submits one
//! restart job for the union of what they changed.

use std::sync::Arc;

use tracing::{debug, info, warn};

use netsync_core::{dedup_units, ChangeRecord};
use netsync_env::EnvStore;
use netsync_restart::RestartHandle;

use crate::coin::CoinHandler;
use crate::error::{PipelineError, PipelineResult};
use crate::explorer::ExplorerHandler;
use crate::handler::{Handler, HandlerResult, HandlerSettings};
use crate::image::{ImageHandler, ImageProbe};
use crate::name::NameHandler;

pub struct HandlerPipeline {
    handlers: Vec<Box<dyn Handler>>,
    restarts: RestartHandle,
}

impl HandlerPipeline {
    pub fn new(handlers: Vec<Box<dyn Handler>>, restarts: RestartHandle) -> Self {
        Self { handlers, restarts }
    }

    /// The fixed handler order: coin, image, name, explorer.
    pub fn standard(
        store: Arc<dyn EnvStore>,
        settings: &HandlerSettings,
        probe: Option<Arc<dyn ImageProbe>>,
        restarts: RestartHandle,
    ) -> Self {
        let handlers: Vec<Box<dyn Handler>> = vec![
            Box::new(CoinHandler::new(Arc::clone(&store), settings)),
            Box::new(ImageHandler::new(Arc::clone(&store), settings, probe)),
            Box::new(NameHandler::new(Arc::clone(&store), settings)),
            Box::new(ExplorerHandler::new(store, settings)),
        ];
        Self::new(handlers, restarts)
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Run all handlers in order, then submit a single restart job.
    ///
    /// Handler failures do not stop later handlers; they are returned
    /// together after the restart has been submitted.
    pub async fn handle(&self, record: &ChangeRecord) -> PipelineResult<()> {
        let mut restart = Vec::new();
        let mut errors = Vec::new();

        for handler in &self.handlers {
            let HandlerResult {
                errors: handler_errors,
                restart: units,
            } = handler.handle(record).await;
            if !units.is_empty() {
                debug!(handler = handler.name(), units = units.len(), "handler changed configuration");
            }
            restart.extend(units);
            errors.extend(handler_errors.into_iter().map(|e| (handler.name(), e)));
        }

        let units = dedup_units(restart);
        if !units.is_empty() {
            let count = units.len();
            if self.restarts.submit(units).await {
                info!(record = record.id, units = count, "restart submitted");
            } else {
                debug!(record = record.id, "restart not queued, equivalent job pending");
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            for (handler, e) in &errors {
                warn!(record = record.id, handler, error = %e, "handler failed");
            }
            Err(PipelineError::Handlers(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use netsync_core::DeployableUnit;
    use netsync_restart::{ContainerRuntime, RestartWorker, RuntimeResult, WorkerSettings};
    use tokio::sync::watch;

    use super::*;
    use crate::handler::test_support::{record, settings, MemoryStore};

    /// Runtime that never finishes a recreation, so submitted keys stay
    /// pending and can be inspected.
    struct NeverRuntime;

    #[async_trait]
    impl ContainerRuntime for NeverRuntime {
        async fn recreate(&self, _units: &[DeployableUnit]) -> RuntimeResult<()> {
            std::future::pending().await
        }
    }

    /// A handle whose worker is never started: submissions stay queued.
    fn idle_handle() -> (RestartWorker, RestartHandle) {
        RestartWorker::new(Arc::new(NeverRuntime), WorkerSettings::default())
    }

    #[tokio::test]
    async fn first_record_restarts_everything_once() {
        let store = Arc::new(MemoryStore::default());
        let (_worker, handle) = idle_handle();
        let pipeline = HandlerPipeline::standard(store, &settings(true), None, handle.clone());

        assert_eq!(pipeline.handler_names(), vec!["coin", "image", "name", "explorer"]);
        pipeline.handle(&record()).await.unwrap();
        assert_eq!(
            handle.pending(),
            vec!["backend-1,frontend-1,proxy-1,stats-1".to_string()]
        );
    }

    #[tokio::test]
    async fn identical_record_submits_nothing() {
        let store = Arc::new(MemoryStore::default());
        let (_first_worker, first) = idle_handle();
        HandlerPipeline::standard(store.clone(), &settings(false), None, first)
            .handle(&record())
            .await
            .unwrap();

        let (_worker, handle) = idle_handle();
        let pipeline = HandlerPipeline::standard(store, &settings(false), None, handle.clone());
        pipeline.handle(&record()).await.unwrap();
        assert!(handle.pending().is_empty());
    }

    #[tokio::test]
    async fn partial_success_still_restarts() {
        let store = Arc::new(MemoryStore::default());
        let (_worker, handle) = idle_handle();
        let pipeline = HandlerPipeline::standard(store.clone(), &settings(false), None, handle.clone());

        let mut rec = record();
        rec.coin = "C".repeat(21);
        rec.name = "Renamed".to_string();
        rec.explorer_url = String::new();

        let err = pipeline.handle(&rec).await.unwrap_err();
        let failed: Vec<&str> = err.errors().iter().map(|(h, _)| *h).collect();
        assert_eq!(failed, vec!["coin", "explorer"]);
        assert_eq!(handle.pending(), vec!["frontend-1".to_string()]);
        assert_eq!(
            store.get("service:frontend", "NEXT_PUBLIC_NETWORK_NAME").as_deref(),
            Some("Renamed")
        );
        assert!(err.to_string().starts_with("handler errors: coin: invalid coin"));
    }

    #[tokio::test]
    async fn pending_job_deduplicates_next_record() {
        let store = Arc::new(MemoryStore::default());
        let (_worker, handle) = idle_handle();
        let pipeline = HandlerPipeline::standard(store.clone(), &settings(false), None, handle.clone());

        pipeline.handle(&record()).await.unwrap();
        assert_eq!(handle.pending(), vec!["backend-1,frontend-1,stats-1".to_string()]);

        // Same units again while the first job is still queued.
        let mut recoined = record();
        recoined.coin = "AURORA".to_string();
        pipeline.handle(&recoined).await.unwrap();
        assert_eq!(handle.pending().len(), 1);
        assert_eq!(store.get("service:backend", "COIN").as_deref(), Some("AURORA"));
    }

    /// Handler stub returning a fixed result.
    struct Fixed(&'static str, Vec<DeployableUnit>);

    #[async_trait]
    impl Handler for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn handle(&self, _record: &ChangeRecord) -> HandlerResult {
            HandlerResult {
                errors: Vec::new(),
                restart: self.1.clone(),
            }
        }
    }

    #[tokio::test]
    async fn union_is_deduplicated_by_container() {
        let (_worker, handle) = idle_handle();
        let shared = DeployableUnit::new("frontend", "frontend-1");
        let pipeline = HandlerPipeline::new(
            vec![
                Box::new(Fixed("a", vec![shared.clone()])),
                Box::new(Fixed("b", vec![shared, DeployableUnit::new("stats", "stats-1")])),
            ],
            handle.clone(),
        );
        pipeline.handle(&record()).await.unwrap();
        assert_eq!(handle.pending(), vec!["frontend-1,stats-1".to_string()]);
    }

    #[tokio::test]
    async fn running_worker_recreates_union() {
        #[derive(Default)]
        struct Recording(Mutex<Vec<Vec<String>>>);

        #[async_trait]
        impl ContainerRuntime for Recording {
            async fn recreate(&self, units: &[DeployableUnit]) -> RuntimeResult<()> {
                self.0
                    .lock()
                    .unwrap()
                    .push(units.iter().map(|u| u.container.clone()).collect());
                Ok(())
            }
        }

        let runtime = Arc::new(Recording::default());
        let settings_ = WorkerSettings {
            settle_delay: std::time::Duration::ZERO,
            ..Default::default()
        };
        let (worker, handle) = RestartWorker::new(runtime.clone(), settings_);
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(worker.run(rx));

        let store = Arc::new(MemoryStore::default());
        let pipeline = HandlerPipeline::standard(store, &settings(false), None, handle.clone());
        pipeline.handle(&record()).await.unwrap();

        for _ in 0..50 {
            if handle.pending().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        tx.send(true).unwrap();
        task.await.unwrap();

        let calls = runtime.0.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        let mut containers = calls[0].clone();
        containers.sort();
        assert_eq!(containers, vec!["backend-1", "frontend-1", "stats-1"]);
    }
}
