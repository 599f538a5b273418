// src/ingest/supervisor.rs
use std::collections::HashMap;
use std::future::Future;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Owns the task handle of every detached job plus one shared cancel signal.
#[derive(Debug)]
pub struct JobSupervisor {
    tasks: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    cancel: watch::Sender<bool>,
}

impl Default for JobSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl JobSupervisor {
    pub fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            tasks: Mutex::new(HashMap::new()),
            cancel,
        }
    }

    /// Receiver that flips to `true` once [`JobSupervisor::shutdown`] is called.
    pub fn cancel_signal(&self) -> watch::Receiver<bool> {
        self.cancel.subscribe()
    }

    pub async fn spawn<F>(&self, job_id: Uuid, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        let mut tasks = self.tasks.lock().await;
        tasks.retain(|_, h| !h.is_finished());
        tasks.insert(job_id, handle);
    }

    /// Waits for one job's task. Returns `false` if no such task is tracked.
    pub async fn wait(&self, job_id: Uuid) -> bool {
        let handle = self.tasks.lock().await.remove(&job_id);
        match handle {
            Some(h) => {
                if let Err(e) = h.await {
                    tracing::warn!(target: "ingest", job_id = %job_id, error = %e, "job task aborted");
                }
                true
            }
            None => false,
        }
    }

    /// Signals cancellation and waits for every tracked task to finish.
    pub async fn shutdown(&self) {
        self.cancel.send_replace(true);
        let drained: Vec<(Uuid, JoinHandle<()>)> = self.tasks.lock().await.drain().collect();
        tracing::info!(target: "ingest", jobs = drained.len(), "draining ingestion jobs");
        for (job_id, h) in drained {
            if let Err(e) = h.await {
                tracing::warn!(target: "ingest", job_id = %job_id, error = %e, "job task aborted");
            }
        }
    }
}
