//! Owned handle to the single background transform worker.
//!
//! The worker is a tokio task draining an unbounded channel; each conversion
//! runs on the blocking pool so the async executor is never stalled by the
//! arithmetic. Replies are routed back to callers through a correlation table
//! keyed by [`CorrelationToken`], so nothing depends on completion order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::WorkerUnavailable;
use crate::sync::lock;
use crate::worker::protocol::{
    reply_token, CorrelationToken, TransformRequest, WorkerMessage, WorkerReply,
};
use crate::worker::transform;

/// Completion callback invoked with the worker's reply.
pub type Callback = Box<dyn FnOnce(WorkerReply) + Send + 'static>;

type CallbackTable = Arc<Mutex<HashMap<CorrelationToken, Callback>>>;

struct Running {
    sender: mpsc::UnboundedSender<WorkerMessage>,
    task: JoinHandle<()>,
}

struct Inner {
    running: Mutex<Option<Running>>,
    callbacks: CallbackTable,
}

/// Cloneable handle to the transform worker.
///
/// Construct one per application and pass clones to every component that
/// needs background conversions. Clones share the same worker.
#[derive(Clone)]
pub struct WorkerHandle {
    inner: Arc<Inner>,
}

impl Default for WorkerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerHandle {
    /// Create a handle with no worker running yet.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                running: Mutex::new(None),
                callbacks: Arc::new(Mutex::new(HashMap::new())),
            }),
        }
    }

    /// Start the worker if it is not already running.
    ///
    /// Returns `true` when a worker is running afterwards. Outside a tokio
    /// runtime there is nowhere to run it: a warning is logged, `false` is
    /// returned, and background transforms stay disabled.
    pub fn initialize(&self) -> bool {
        let mut running = lock(&self.inner.running);
        if let Some(current) = running.as_ref() {
            if !current.task.is_finished() {
                return true;
            }
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("no tokio runtime available; background transforms disabled");
                return false;
            }
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        let task = runtime.spawn(run_worker(receiver, self.inner.callbacks.clone()));
        *running = Some(Running { sender, task });
        info!("transform worker started");
        true
    }

    /// Whether a worker is currently running.
    pub fn is_initialized(&self) -> bool {
        lock(&self.inner.running)
            .as_ref()
            .map(|r| !r.task.is_finished())
            .unwrap_or(false)
    }

    /// Post a request without waiting for its result.
    pub fn post_message(&self, request: TransformRequest) -> Result<(), WorkerUnavailable> {
        self.send(WorkerMessage { request, correlation_token: None })
    }

    /// Post a request and register `on_complete` to receive its reply.
    ///
    /// The returned token identifies the pending callback; it can be passed
    /// to [`cancel`](Self::cancel) to drop the callback unfired.
    pub fn post_with_callback<F>(
        &self,
        request: TransformRequest,
        on_complete: F,
    ) -> Result<CorrelationToken, WorkerUnavailable>
    where
        F: FnOnce(WorkerReply) + Send + 'static,
    {
        if !self.is_initialized() {
            debug!(kind = ?request.kind(), "dropping request: worker not initialized");
            return Err(WorkerUnavailable);
        }

        let token = CorrelationToken::generate();
        lock(&self.inner.callbacks).insert(token.clone(), Box::new(on_complete));

        let message = WorkerMessage { request, correlation_token: Some(token.clone()) };
        if let Err(e) = self.send(message) {
            lock(&self.inner.callbacks).remove(&token);
            return Err(e);
        }
        Ok(token)
    }

    /// Drop a pending callback without invoking it.
    ///
    /// Returns `false` if the token was unknown or already completed.
    pub fn cancel(&self, token: &CorrelationToken) -> bool {
        lock(&self.inner.callbacks).remove(token).is_some()
    }

    /// Number of callbacks still waiting for a reply.
    pub fn pending_callbacks(&self) -> usize {
        lock(&self.inner.callbacks).len()
    }

    /// Stop the worker and drop every pending callback unfired.
    ///
    /// Subsequent posts fail with [`WorkerUnavailable`] until
    /// [`initialize`](Self::initialize) is called again. Returns whether a
    /// worker was running.
    pub fn terminate(&self) -> bool {
        let stopped = lock(&self.inner.running).take();
        let dropped = {
            let mut callbacks = lock(&self.inner.callbacks);
            let n = callbacks.len();
            callbacks.clear();
            n
        };

        match stopped {
            Some(running) => {
                running.task.abort();
                info!(dropped_callbacks = dropped, "transform worker terminated");
                true
            }
            None => false,
        }
    }

    fn send(&self, message: WorkerMessage) -> Result<(), WorkerUnavailable> {
        let running = lock(&self.inner.running);
        let Some(current) = running.as_ref() else {
            debug!(kind = ?message.request.kind(), "dropping request: worker not initialized");
            return Err(WorkerUnavailable);
        };
        current.sender.send(message).map_err(|_| WorkerUnavailable)
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<WorkerMessage>,
    callbacks: CallbackTable,
) {
    while let Some(message) = receiver.recv().await {
        let token = message.correlation_token.clone();
        match tokio::task::spawn_blocking(move || transform::handle(message)).await {
            Ok(reply) => dispatch(&callbacks, reply),
            Err(e) => {
                warn!("transform task failed: {}", e);
                if let Some(token) = token {
                    lock(&callbacks).remove(&token);
                }
            }
        }
    }
    debug!("transform worker channel closed");
}

fn dispatch(callbacks: &CallbackTable, reply: WorkerReply) {
    let Some(token) = reply_token(&reply).cloned() else {
        return;
    };
    let callback = lock(callbacks).remove(&token);
    match callback {
        Some(callback) => callback(reply),
        None => debug!(%token, "reply has no pending callback"),
    }
}
