use anyhow::Context;
use crate::error::TransportError;
use crate::metrics::{Metrics, RequestTracer};
use crate::rpc::wire::{METHOD_NOT_FOUND, RpcStatus};
use crate::transport::call::{self, CallReader, CallWriter};
use crate::transport::shutdown::ShutdownCoordinator;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Messages buffered per direction of a streaming call.
pub const STREAM_QUEUE_DEPTH: usize = 16;

pub type HandlerFuture<T> = Pin<Box<dyn Future<Output = Result<T, RpcStatus>> + Send>>;

/// Takes the single request message, returns the single response message.
pub type UnaryHandler = dyn Fn(Value) -> HandlerFuture<Value> + Send + Sync + 'static;

/// Receives inbound messages until the client half-closes; everything sent on
/// the outbound queue is streamed back. Returning ends the call.
pub type StreamHandler =
    dyn Fn(mpsc::Receiver<Value>, mpsc::Sender<Value>) -> HandlerFuture<()> + Send + Sync + 'static;

#[derive(Clone)]
enum Handler {
    Unary(Arc<UnaryHandler>),
    Streaming(Arc<StreamHandler>),
}

/// Registry of worker-side call handlers keyed by method name.
///
/// ```rust,ignore
/// let worker = WorkerServer::new();
/// worker.register_streaming(APPLY_FILTER_STREAM, |mut inbound, outbound| async move {
///     while let Some(frame) = inbound.recv().await {
///         let _ = outbound.send(frame).await;
///     }
///     Ok(())
/// }).await;
/// ```
pub struct WorkerServer {
    handlers: RwLock<HashMap<String, Handler>>,
    metrics: Arc<Metrics>,
}

impl WorkerServer {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub async fn register_unary<F, Fut>(&self, method: &str, f: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RpcStatus>> + Send + 'static,
    {
        let handler: Arc<UnaryHandler> = Arc::new(move |request: Value| {
            let fut = f(request);
            Box::pin(fut) as HandlerFuture<Value>
        });
        self.handlers
            .write()
            .await
            .insert(method.to_string(), Handler::Unary(handler));
    }

    pub async fn register_streaming<F, Fut>(&self, method: &str, f: F)
    where
        F: Fn(mpsc::Receiver<Value>, mpsc::Sender<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), RpcStatus>> + Send + 'static,
    {
        let handler: Arc<StreamHandler> = Arc::new(move |inbound, outbound| {
            let fut = f(inbound, outbound);
            Box::pin(fut) as HandlerFuture<()>
        });
        self.handlers
            .write()
            .await
            .insert(method.to_string(), Handler::Streaming(handler));
    }

    async fn lookup(&self, method: &str) -> Option<Handler> {
        self.handlers.read().await.get(method).cloned()
    }

    /// Serve exactly one call on an accepted connection.
    pub async fn serve_connection(&self, stream: TcpStream) -> Result<(), TransportError> {
        stream.set_nodelay(true)?;
        let (mut reader, mut writer) = call::split(stream);

        let Some(header) = reader.read_header().await? else {
            return Ok(());
        };

        let Some(handler) = self.lookup(&header.method).await else {
            let status = RpcStatus::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", header.method),
            );
            writer.send_status(&status).await?;
            reader.drain().await;
            return Ok(());
        };

        let tracer = RequestTracer::new(&header.method, self.metrics.clone());
        let outcome = match handler {
            Handler::Unary(h) => serve_unary(h, &mut reader, &mut writer).await,
            Handler::Streaming(h) => serve_streaming(h, reader, &mut writer).await,
        };

        match &outcome {
            Ok(None) => tracer.success().await,
            Ok(Some(status)) => tracer.error(&status.message).await,
            Err(e) => tracer.error(&e.to_string()).await,
        }
        outcome.map(|_| ())
    }
}

impl Default for WorkerServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the status the call was terminated with, if any.
async fn serve_unary(
    handler: Arc<UnaryHandler>,
    reader: &mut CallReader,
    writer: &mut CallWriter,
) -> Result<Option<RpcStatus>, TransportError> {
    let Some(request) = reader.recv::<Value>().await? else {
        let status = RpcStatus::invalid_argument("call closed without a request message");
        writer.send_status(&status).await?;
        return Ok(Some(status));
    };

    let result = handler(request).await;
    let status = match result {
        Ok(response) => {
            writer.send(&response).await?;
            writer.close_send().await?;
            None
        }
        Err(status) => {
            writer.send_status(&status).await?;
            Some(status)
        }
    };
    reader.drain().await;
    Ok(status)
}

async fn serve_streaming(
    handler: Arc<StreamHandler>,
    mut reader: CallReader,
    writer: &mut CallWriter,
) -> Result<Option<RpcStatus>, TransportError> {
    let (in_tx, in_rx) = mpsc::channel::<Value>(STREAM_QUEUE_DEPTH);
    let (out_tx, mut out_rx) = mpsc::channel::<Value>(STREAM_QUEUE_DEPTH);

    // Keeps reading until the client half-closes, even after the handler has
    // stopped listening, so the connection is never dropped with unread input.
    let inbound = async move {
        let mut in_tx = Some(in_tx);
        let mut received = 0usize;
        while let Some(msg) = reader.recv::<Value>().await? {
            received += 1;
            if let Some(tx) = &in_tx {
                if tx.send(msg).await.is_err() {
                    in_tx = None;
                }
            }
        }
        debug!(messages = received, "client half-closed");
        Ok::<_, TransportError>(())
    };

    let outbound = async {
        let mut sent = 0usize;
        while let Some(msg) = out_rx.recv().await {
            writer.send(&msg).await?;
            sent += 1;
        }
        debug!(messages = sent, "handler output drained");
        Ok::<_, TransportError>(())
    };

    let (inbound_result, outbound_result, handler_result) =
        tokio::join!(inbound, outbound, handler(in_rx, out_tx));

    outbound_result?;
    match handler_result {
        Ok(()) => {
            inbound_result?;
            writer.close_send().await?;
            Ok(None)
        }
        Err(status) => {
            writer.send_status(&status).await?;
            Ok(Some(status))
        }
    }
}

/// Accept calls on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    server: Arc<WorkerServer>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), TransportError> {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((socket, peer)) => {
                        let server = server.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.serve_connection(socket).await {
                                error!("Call from {} failed: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {:?}", e);
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("Shutting down worker");
                break;
            }
        }
    }

    Ok(())
}

/// Serve every listener with the same handlers until `shutdown` fires.
pub async fn serve_all(
    listeners: Vec<TcpListener>,
    server: Arc<WorkerServer>,
    shutdown: &ShutdownCoordinator,
) -> Result<(), TransportError> {
    let mut tasks = JoinSet::new();
    for listener in listeners {
        tasks.spawn(serve(listener, server.clone(), shutdown.subscribe()));
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => result?,
            Err(e) => error!("Listener task ended abnormally: {}", e),
        }
    }
    Ok(())
}

/// Bind every address in `addrs` and serve until SIGINT/SIGTERM.
pub async fn run_worker(addrs: &[String], server: Arc<WorkerServer>) -> anyhow::Result<()> {
    let mut listeners = Vec::with_capacity(addrs.len());
    for addr in addrs {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {}", addr))?;
        info!("pixgate worker listening on {}", listener.local_addr()?);
        listeners.push(listener);
    }

    let shutdown = Arc::new(ShutdownCoordinator::new());
    let signals = shutdown.clone();
    tokio::spawn(async move {
        signals.wait_for_signal().await;
    });

    serve_all(listeners, server, &shutdown).await?;
    Ok(())
}
