use futures::FutureExt;
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use shared::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Live queues keyed by the canonical location they serve
static QUEUES_BY_LOCATION: Lazy<Mutex<HashMap<PathBuf, Weak<Dispatch>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

struct Job {
    access: Access,
    run: Box<dyn FnOnce() + Send + 'static>,
}

struct Dispatch {
    name: &'static str,
    sender: mpsc::UnboundedSender<Job>,
}

/// Per-location dispatch point for blocking storage work.
///
/// Jobs are accepted in call order by a single background worker. Reads run
/// on the blocking pool alongside other reads; a write waits for every
/// in-flight read and then runs alone, so writes complete in the order they
/// were submitted and a read always sees the writes submitted before it.
#[derive(Clone)]
pub struct StoreQueue {
    dispatch: Arc<Dispatch>,
}

impl StoreQueue {
    /// Start a private worker on the current Tokio runtime. It stops once
    /// every clone of the queue is dropped and the backlog is drained.
    pub fn spawn(name: &'static str) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("{} needs a Tokio runtime: {}", name, e)))?;

        let (sender, receiver) = mpsc::unbounded_channel();
        runtime.spawn(run_worker(name, receiver));

        Ok(Self {
            dispatch: Arc::new(Dispatch { name, sender }),
        })
    }

    /// The queue serving `location`, shared with every other store opened on
    /// the same file in this process. Spawns a worker when none is running.
    pub fn for_location(name: &'static str, location: &Path) -> Result<Self> {
        let key = location_key(location);
        let mut queues = QUEUES_BY_LOCATION
            .lock()
            .map_err(|e| Error::Internal(format!("Queue registry poisoned: {}", e)))?;
        queues.retain(|_, dispatch| dispatch.strong_count() > 0);

        if let Some(dispatch) = queues.get(&key).and_then(Weak::upgrade) {
            // a worker whose runtime has shut down can't take jobs any more
            if !dispatch.sender.is_closed() {
                debug!("Sharing {} queue for {}", dispatch.name, key.display());
                return Ok(Self { dispatch });
            }
        }

        let queue = Self::spawn(name)?;
        queues.insert(key, Arc::downgrade(&queue.dispatch));
        Ok(queue)
    }

    pub fn read<T, F>(&self, op: F) -> BoxFuture<'static, Result<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        self.submit(Access::Read, op)
    }

    pub fn write<T, F>(&self, op: F) -> BoxFuture<'static, Result<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        self.submit(Access::Write, op)
    }

    fn submit<T, F>(&self, access: Access, op: F) -> BoxFuture<'static, Result<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job = Job {
            access,
            run: Box::new(move || {
                // receiver gone means the caller stopped waiting
                let _ = tx.send(op());
            }),
        };

        let name = self.dispatch.name;
        let enqueued = self.dispatch.sender.send(job).is_ok();

        async move {
            if !enqueued {
                return Err(Error::Internal(format!("{} worker has stopped", name)));
            }
            rx.await
                .map_err(|_| Error::Internal(format!("{} dropped an operation", name)))?
        }
        .boxed()
    }
}

/// Resolve `location` so that different spellings of one file share a key.
/// The file itself may not exist yet, so fall back to its parent directory.
fn location_key(location: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(location) {
        return canonical;
    }

    let parent = match location.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (std::fs::canonicalize(parent), location.file_name()) {
        (Ok(parent), Some(file_name)) => parent.join(file_name),
        _ => std::path::absolute(location).unwrap_or_else(|_| location.to_path_buf()),
    }
}

impl std::fmt::Debug for StoreQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreQueue")
            .field("name", &self.dispatch.name)
            .finish()
    }
}

async fn run_worker(name: &'static str, mut receiver: mpsc::UnboundedReceiver<Job>) {
    let mut readers = JoinSet::new();

    while let Some(job) = receiver.recv().await {
        while readers.try_join_next().is_some() {}

        match job.access {
            Access::Read => {
                readers.spawn_blocking(job.run);
            }
            Access::Write => {
                while readers.join_next().await.is_some() {}
                if let Err(e) = tokio::task::spawn_blocking(job.run).await {
                    error!("{} write operation panicked: {}", name, e);
                }
            }
        }
    }

    while readers.join_next().await.is_some() {}
    debug!("{} worker stopped", name);
}
