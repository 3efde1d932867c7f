//! The Worker Runtime (C4): a fixed pool of `workers.count` slots plus
//! the crash-recovery reaper, all sharing one `CancellationToken` for
//! graceful shutdown.

use std::sync::Arc;

use docugen_config::Config;
use docugen_db::JobRepo;
use docugen_pipeline::Pipeline;
use docugen_queue::TaskBroker;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::reaper::Reaper;
use crate::worker::Worker;

pub struct WorkerPool {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `config.workers_count` worker slots and one reaper task.
    pub fn spawn(
        config: Arc<Config>,
        broker: Arc<dyn TaskBroker>,
        job_repo: Arc<dyn JobRepo>,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let mut handles = Vec::new();

        for slot in 0..config.workers_count {
            let worker = Worker::new(
                format!("worker-{slot}"),
                Arc::clone(&broker),
                Arc::clone(&job_repo),
                Arc::clone(&pipeline),
                Arc::clone(&config),
            );
            let slot_shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                worker.run(slot_shutdown).await;
            }));
        }

        let reaper = Reaper::new(
            Arc::clone(&broker),
            Arc::clone(&job_repo),
            config.broker_poison_pill_threshold,
            config.reaper_grace_period,
        );
        let reaper_shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            reaper.run(reaper_shutdown).await;
        }));

        info!(workers = config.workers_count, "worker pool started");
        Self { shutdown, handles }
    }

    /// Flips the shared `CancellationToken` and waits for every slot and
    /// the reaper to finish their current work.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("worker pool shut down");
    }

    /// Runs until the process receives `ctrl_c`, per `ShutdownSignal`'s
    /// contract in spec.md §4.4/§6.
    pub async fn run_until_ctrl_c(self) {
        let _ = tokio::signal::ctrl_c().await;
        info!("ctrl-c received, shutting down worker pool");
        self.shutdown().await;
    }
}
