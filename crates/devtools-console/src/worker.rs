//! Request/response calls into an isolated worker.
//!
//! Callers never share memory with the worker: a [`WorkerRequest`] carries a
//! method name and JSON arguments in, and a JSON result or a failure message
//! comes back. [`Transport`] hides how the request travels; [`ThreadTransport`]
//! runs the handler on a dedicated OS thread fed by a crossbeam channel.

use crossbeam_channel::{unbounded, Sender as CbSender};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// A single call into the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub id: u64,
    pub method: String,
    pub args: serde_json::Value,
}

/// Result produced by a worker handler.
pub type WorkerReply = Result<serde_json::Value, String>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    #[error("worker is not running")]
    Disconnected,
    #[error("worker rejected `{method}`: {message}")]
    Rejected { method: String, message: String },
    #[error("failed to encode arguments for `{method}`: {message}")]
    Encode { method: String, message: String },
    #[error("failed to decode reply from `{method}`: {message}")]
    Decode { method: String, message: String },
}

/// Code running inside the worker.
pub trait WorkerHandler: Send + 'static {
    fn handle(&mut self, method: &str, args: serde_json::Value) -> WorkerReply;
}

/// Moves requests to a worker and replies back.
pub trait Transport: Send + Sync + 'static {
    fn dispatch(
        &self,
        request: WorkerRequest,
        reply: oneshot::Sender<WorkerReply>,
    ) -> Result<(), WorkerError>;
}

struct Envelope {
    request: WorkerRequest,
    reply: oneshot::Sender<WorkerReply>,
}

/// Runs a [`WorkerHandler`] on its own thread.
///
/// The thread exits once every clone of the transport is dropped.
#[derive(Clone)]
pub struct ThreadTransport {
    tx: CbSender<Envelope>,
}

impl ThreadTransport {
    pub fn spawn<H: WorkerHandler>(name: &str, mut handler: H) -> std::io::Result<Self> {
        let (tx, rx) = unbounded::<Envelope>();
        let thread_name = name.to_string();

        std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                while let Ok(Envelope { request, reply }) = rx.recv() {
                    let WorkerRequest { id, method, args } = request;
                    let result = catch_unwind(AssertUnwindSafe(|| handler.handle(&method, args)))
                        .unwrap_or_else(|_| {
                            tracing::error!(worker = %thread_name, id, %method, "worker handler panicked");
                            Err(format!("worker panicked while handling `{method}`"))
                        });
                    // the caller may have lost interest, the outcome is still computed
                    let _ = reply.send(result);
                }
                tracing::debug!(worker = %thread_name, "worker stopped");
            })?;

        Ok(Self { tx })
    }
}

impl Transport for ThreadTransport {
    fn dispatch(
        &self,
        request: WorkerRequest,
        reply: oneshot::Sender<WorkerReply>,
    ) -> Result<(), WorkerError> {
        self.tx
            .send(Envelope { request, reply })
            .map_err(|_| WorkerError::Disconnected)
    }
}

/// Caller side of a worker. Cheap to clone.
#[derive(Clone)]
pub struct WorkerProxy {
    transport: Arc<dyn Transport>,
    next_id: Arc<AtomicU64>,
}

impl WorkerProxy {
    pub fn new(transport: impl Transport) -> Self {
        Self {
            transport: Arc::new(transport),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Dispatches `method` immediately and returns a future for the reply.
    ///
    /// The request is sent before the future is first polled, so it runs to
    /// completion even if the future is dropped.
    pub fn call(
        &self,
        method: &str,
        args: serde_json::Value,
    ) -> impl Future<Output = Result<serde_json::Value, WorkerError>> + Send + 'static {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let method = method.to_string();
        let (reply_tx, reply_rx) = oneshot::channel();

        tracing::trace!(id, %method, "dispatching worker request");
        let dispatched = self.transport.dispatch(
            WorkerRequest {
                id,
                method: method.clone(),
                args,
            },
            reply_tx,
        );

        async move {
            dispatched?;
            match reply_rx.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(message)) => Err(WorkerError::Rejected { method, message }),
                Err(_) => Err(WorkerError::Disconnected),
            }
        }
    }

    /// Typed wrapper over [`WorkerProxy::call`].
    pub fn call_typed<A, R>(
        &self,
        method: &str,
        args: A,
    ) -> impl Future<Output = Result<R, WorkerError>> + Send + 'static
    where
        A: Serialize,
        R: DeserializeOwned + Send + 'static,
    {
        let encoded = serde_json::to_value(args).map_err(|e| WorkerError::Encode {
            method: method.to_string(),
            message: e.to_string(),
        });
        let call = encoded.map(|args| self.call(method, args));
        let method = method.to_string();

        async move {
            let value = call?.await?;
            serde_json::from_value(value).map_err(|e| WorkerError::Decode {
                method,
                message: e.to_string(),
            })
        }
    }
}
