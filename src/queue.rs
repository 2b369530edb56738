//! A serial queue that runs completion callbacks on one designated task.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{Instrument, error, info_span};
use uuid::Uuid;

type Job = Box<dyn FnOnce() + Send + 'static>;

tokio::task_local! {
    static CURRENT_QUEUE: Uuid;
}

/// Runs submitted closures one at a time, in submission order, on a single
/// dedicated task. Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct ResultsQueue {
    id: Uuid,
    name: Arc<str>,
    sender: mpsc::UnboundedSender<Job>,
}

impl ResultsQueue {
    /// Spawns the queue's task on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn(name: &str) -> Self {
        Self::spawn_on(&Handle::current(), name)
    }

    pub fn spawn_on(handle: &Handle, name: &str) -> Self {
        let id = Uuid::new_v4();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        handle.spawn(
            CURRENT_QUEUE
                .scope(id, async move {
                    while let Some(job) = receiver.recv().await {
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!("completion panicked");
                        }
                    }
                })
                .instrument(info_span!("results_queue", queue = %name)),
        );

        Self {
            id,
            name: Arc::from(name),
            sender,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues `job`. Returns false if the queue's task is gone.
    pub fn dispatch<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender.send(Box::new(job)).is_ok()
    }

    /// True when called from a job running on this queue.
    pub fn is_current(&self) -> bool {
        CURRENT_QUEUE
            .try_with(|current| *current == self.id)
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for ResultsQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultsQueue")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
