//! Task dispatch: least-loaded selection, per-task timeout, ordered batches
//!
//! Each worker unit is a dedicated thread draining a bounded channel. The
//! coordinator races a oneshot result against the task timeout; on timeout
//! the pending slot is failed with `WorkerTimeout` and the worker's count
//! is freed immediately. The underlying computation is not cancelled — a
//! late result lands in a dropped receiver and is discarded.
//!
//! The pending map is the only mutable coordinator state. It is settled
//! exactly once per task (by the submit path, on completion or timeout),
//! which keeps the per-worker counts consistent without worker-side
//! bookkeeping.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use mcrypt_core::config::PoolConfig;
use mcrypt_core::{CryptoError, CryptoResult};

struct Dispatch {
    id: Uuid,
    kind: String,
    run: Box<dyn FnOnce() + Send>,
}

struct Shared {
    loads: Vec<AtomicUsize>,
    pending: Mutex<HashMap<Uuid, usize>>,
}

/// A fixed-size pool of worker threads for bulk cryptographic operations.
pub struct WorkerPool {
    senders: Vec<mpsc::Sender<Dispatch>>,
    threads: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
    task_timeout: Duration,
}

impl WorkerPool {
    /// Build a pool per config; `workers == 0` uses available parallelism.
    pub fn new(config: &PoolConfig) -> Self {
        let size = if config.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            config.workers
        };

        let shared = Arc::new(Shared {
            loads: (0..size).map(|_| AtomicUsize::new(0)).collect(),
            pending: Mutex::new(HashMap::new()),
        });

        let mut senders = Vec::with_capacity(size);
        let mut threads = Vec::with_capacity(size);
        for index in 0..size {
            let (tx, mut rx) = mpsc::channel::<Dispatch>(config.queue_depth.max(1));
            senders.push(tx);
            threads.push(
                std::thread::Builder::new()
                    .name(format!("mcrypt-worker-{index}"))
                    .spawn(move || {
                        while let Some(dispatch) = rx.blocking_recv() {
                            trace!(task_id = %dispatch.id, kind = %dispatch.kind, worker = index, "task running");
                            (dispatch.run)();
                        }
                    })
                    .expect("spawning worker thread"),
            );
        }

        debug!(workers = size, "worker pool ready");
        Self {
            senders,
            threads,
            shared,
            task_timeout: Duration::from_secs(config.task_timeout_secs),
        }
    }

    /// Number of worker units.
    pub fn size(&self) -> usize {
        self.senders.len()
    }

    /// Submit one unit of work and await its result or timeout.
    ///
    /// The job and its inputs move into the worker by value; results come
    /// back through a oneshot owned by this call.
    pub async fn submit<R, F>(&self, kind: &str, job: F) -> CryptoResult<R>
    where
        R: Send + 'static,
        F: FnOnce() -> CryptoResult<R> + Send + 'static,
    {
        let worker = self.least_loaded();
        let id = Uuid::new_v4();

        self.shared
            .pending
            .lock()
            .expect("pending map lock poisoned")
            .insert(id, worker);
        self.shared.loads[worker].fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = oneshot::channel();
        let dispatch = Dispatch {
            id,
            kind: kind.to_string(),
            run: Box::new(move || {
                // A dropped receiver (timeout) makes this send fail; the
                // late result is discarded, by design
                let _ = tx.send(job());
            }),
        };

        if self.senders[worker].send(dispatch).await.is_err() {
            self.settle(id);
            return Err(CryptoError::Pool("worker channel closed".into()));
        }

        match tokio::time::timeout(self.task_timeout, rx).await {
            Ok(Ok(result)) => {
                self.settle(id);
                result
            }
            Ok(Err(_)) => {
                self.settle(id);
                Err(CryptoError::Pool("worker dropped result channel".into()))
            }
            Err(_) => {
                self.settle(id);
                warn!(task_id = %id, kind, "task timed out; slot freed");
                Err(CryptoError::WorkerTimeout {
                    task_id: id,
                    timeout_secs: self.task_timeout.as_secs(),
                })
            }
        }
    }

    /// Run `op` over `items`, partitioned as evenly as possible across the
    /// pool. Results come back in input order with per-item outcomes; a
    /// partition-level failure (e.g. timeout) is reported on each of its
    /// items rather than aborting the batch.
    pub async fn batch<T, R, F>(&self, items: Vec<T>, op: F) -> Vec<CryptoResult<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(&T) -> CryptoResult<R> + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        let chunks = partition(items, self.size());

        let futures = chunks.into_iter().map(|chunk| {
            let op = Arc::clone(&op);
            async move {
                let len = chunk.len();
                match self
                    .submit("batch", move || {
                        Ok(chunk.iter().map(|item| op(item)).collect::<Vec<_>>())
                    })
                    .await
                {
                    Ok(results) => results,
                    Err(e) => (0..len).map(|_| Err(replicate(&e))).collect(),
                }
            }
        });

        futures::future::join_all(futures)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    fn least_loaded(&self) -> usize {
        let mut best = 0;
        let mut best_load = usize::MAX;
        for (index, load) in self.shared.loads.iter().enumerate() {
            let load = load.load(Ordering::SeqCst);
            if load < best_load {
                best = index;
                best_load = load;
            }
        }
        best
    }

    /// Remove a task from the pending set and free its worker slot.
    /// Exactly-once: the first caller wins, any later transition is a no-op.
    fn settle(&self, id: Uuid) {
        if let Some(worker) = self
            .shared
            .pending
            .lock()
            .expect("pending map lock poisoned")
            .remove(&id)
        {
            self.shared.loads[worker].fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.senders.clear();
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
    }
}

/// Split `items` into at most `parts` contiguous chunks of near-equal size,
/// dropping empty chunks.
fn partition<T>(mut items: Vec<T>, parts: usize) -> Vec<Vec<T>> {
    let parts = parts.max(1);
    let len = items.len();
    let base = len / parts;
    let extra = len % parts;

    let mut out = Vec::with_capacity(parts.min(len));
    // Split from the back so each drain is O(chunk)
    let mut sizes: Vec<usize> = (0..parts)
        .map(|i| base + usize::from(i < extra))
        .filter(|&s| s > 0)
        .collect();
    while let Some(size) = sizes.pop() {
        let tail = items.split_off(items.len() - size);
        out.push(tail);
    }
    out.reverse();
    out
}

/// Reproduce a partition-level error for each of its items.
fn replicate(e: &CryptoError) -> CryptoError {
    match e {
        CryptoError::WorkerTimeout {
            task_id,
            timeout_secs,
        } => CryptoError::WorkerTimeout {
            task_id: *task_id,
            timeout_secs: *timeout_secs,
        },
        CryptoError::Pool(msg) => CryptoError::Pool(msg.clone()),
        other => CryptoError::Pool(other.to_string()),
    }
}
