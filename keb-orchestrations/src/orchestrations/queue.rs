//! In-process work queue decoupling request acceptance from dispatch.
//!
//! Operation IDs are fanned out to a fixed pool of workers. An ID already
//! waiting in the queue is not queued twice. Shutdown stops intake, lets the
//! workers drain what is queued and waits for them.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Accepts operation IDs for asynchronous processing.
pub trait Queue: Send + Sync {
    fn add(&self, operation_id: &str);
}

/// Processes one queued operation.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Returns a delay when the operation should be processed again later.
    async fn execute(&self, operation_id: &str) -> Option<Duration>;
}

struct Shared {
    sender: Mutex<Option<mpsc::UnboundedSender<String>>>,
    queued: Mutex<HashSet<String>>,
}

impl Shared {
    fn add(&self, operation_id: &str) {
        let Ok(sender) = self.sender.lock() else {
            warn!(operation_id = %operation_id, "Work queue lock poisoned, dropping operation");
            return;
        };
        let Some(sender) = sender.as_ref() else {
            debug!(operation_id = %operation_id, "Work queue is shut down, dropping operation");
            return;
        };
        let Ok(mut queued) = self.queued.lock() else {
            warn!(operation_id = %operation_id, "Work queue lock poisoned, dropping operation");
            return;
        };
        if !queued.insert(operation_id.to_string()) {
            debug!(operation_id = %operation_id, "Operation already queued");
            return;
        }
        if sender.send(operation_id.to_string()).is_err() {
            queued.remove(operation_id);
            warn!(operation_id = %operation_id, "Work queue closed, dropping operation");
        }
    }

    fn take(&self, operation_id: &str) {
        if let Ok(mut queued) = self.queued.lock() {
            queued.remove(operation_id);
        }
    }
}

pub struct WorkQueue {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkQueue {
    /// Spawn `workers` tasks feeding queued IDs to `executor`.
    pub fn start<E: Executor>(workers: usize, executor: Arc<E>) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel::<String>();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let shared = Arc::new(Shared {
            sender: Mutex::new(Some(sender)),
            queued: Mutex::new(HashSet::new()),
        });

        let queue = Arc::new(Self {
            shared: shared.clone(),
            workers: Mutex::new(Vec::new()),
        });

        let handles: Vec<_> = (0..workers.max(1))
            .map(|worker| {
                let receiver = receiver.clone();
                let executor = executor.clone();
                let queue = Arc::downgrade(&queue);
                let shared = shared.clone();
                tokio::spawn(async move {
                    debug!(worker, "Worker started");
                    loop {
                        let next = receiver.lock().await.recv().await;
                        let Some(operation_id) = next else { break };
                        shared.take(&operation_id);

                        if let Some(delay) = executor.execute(&operation_id).await {
                            match queue.upgrade() {
                                Some(queue) => queue.add_after(&operation_id, delay),
                                None => break,
                            }
                        }
                    }
                    debug!(worker, "Worker stopped");
                })
            })
            .collect();

        if let Ok(mut slots) = queue.workers.lock() {
            slots.extend(handles);
        }
        info!(workers = workers.max(1), "Work queue started");
        queue
    }

    /// Queue the operation once `delay` has passed.
    pub fn add_after(&self, operation_id: &str, delay: Duration) {
        debug!(operation_id = %operation_id, delay_ms = delay.as_millis() as u64, "Requeueing operation");
        let shared = self.shared.clone();
        let operation_id = operation_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.add(&operation_id);
        });
    }

    /// Stop accepting work, drain the queue and wait for every worker to finish.
    pub async fn shutdown(&self) {
        if let Ok(mut sender) = self.shared.sender.lock() {
            sender.take();
        }
        let handles: Vec<_> = match self.workers.lock() {
            Ok(mut workers) => workers.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task ended abnormally");
            }
        }
        info!("Work queue stopped");
    }
}

impl Queue for WorkQueue {
    fn add(&self, operation_id: &str) {
        self.shared.add(operation_id);
    }
}
