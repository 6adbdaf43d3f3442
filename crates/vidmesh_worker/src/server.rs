//! Worker server loop
//!
//! Design principles:
//! - One ROUTER socket per worker, owned by the event loop
//! - Each request runs in its own task; a semaphore caps how many run at once
//!   and later requests wait for a permit
//! - Replies come back to the loop over an mpsc channel and are routed by the
//!   envelope frames the request arrived with
//! - Graceful shutdown drains in-flight requests before the loop exits

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vidmesh_protocol::defaults::MAX_IN_FLIGHT_REQUESTS;
use vidmesh_protocol::{ErrorKind, ErrorPayload, Header, Message, OpCode, RequestId};
use zeromq::{RouterSocket, Socket, SocketRecv, SocketSend};

use crate::channel::{to_zmq_message, RpcError, WorkerChannel};
use crate::ServiceError;

/// How long one recv waits before the loop re-checks its other branches.
const RECV_POLL_MS: u64 = 100;

/// One worker capability.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// The request opcode this service answers.
    fn opcode(&self) -> OpCode;

    async fn handle(&self, request: &Message) -> Result<Message, ServiceError>;
}

/// Build the `Reply` message for `request`.
pub fn reply<T: Serialize>(request: &Message, payload: &T) -> Result<Message, ServiceError> {
    Ok(Message::encode(OpCode::Reply, request.request_id(), payload)?)
}

fn error_reply(request_id: RequestId, payload: &ErrorPayload) -> Message {
    Message::encode(OpCode::Err, request_id, payload).unwrap_or_else(|e| {
        error!("Failed to encode error reply: {}", e);
        Message {
            header: Header::new(OpCode::Err, request_id, 0),
            payload: Vec::new(),
        }
    })
}

/// Run `request` through `service` and always produce a reply message.
pub async fn respond(service: &dyn Service, request: Message) -> Message {
    let request_id = request.request_id();
    if request.opcode() != service.opcode() {
        warn!(
            "{} received {:?} (request {}), expected {:?}",
            service.name(),
            request.opcode(),
            request_id,
            service.opcode()
        );
        let payload = ErrorPayload::new(
            ErrorKind::InvalidArgument,
            format!("{} does not serve {:?}", service.name(), request.opcode()),
        );
        return error_reply(request_id, &payload);
    }

    match service.handle(&request).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("{} request {} failed: {}", service.name(), request_id, e);
            error_reply(request_id, &e.to_payload())
        }
    }
}

/// Channel that calls a service in-process, skipping the network.
pub struct LocalChannel {
    service: Arc<dyn Service>,
}

impl LocalChannel {
    pub fn new(service: Arc<dyn Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl WorkerChannel for LocalChannel {
    async fn call(&self, request: Message) -> Result<Message, RpcError> {
        Ok(respond(self.service.as_ref(), request).await)
    }

    fn target(&self) -> &str {
        self.service.name()
    }
}

/// A finished request waiting to be routed back.
struct Completed {
    envelope: Vec<Vec<u8>>,
    reply: Message,
}

/// Handle for controlling a running server
pub struct WorkerHandle {
    endpoint: String,
    shutdown_tx: mpsc::Sender<()>,
    join_handle: JoinHandle<Result<()>>,
}

impl WorkerHandle {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Request graceful shutdown
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(()).await;
        self.join_handle.await?
    }

    /// Wait until the server stops on its own (socket failure).
    pub async fn join(self) -> Result<()> {
        let WorkerHandle {
            shutdown_tx,
            join_handle,
            ..
        } = self;
        let result = join_handle.await?;
        drop(shutdown_tx);
        result
    }
}

/// Bound ROUTER socket serving one [`Service`].
pub struct WorkerServer {
    service: Arc<dyn Service>,
    socket: RouterSocket,
    endpoint: String,
    limiter: Arc<Semaphore>,
    reply_tx: mpsc::Sender<Completed>,
    reply_rx: mpsc::Receiver<Completed>,
    shutdown_rx: mpsc::Receiver<()>,
    in_flight: HashMap<u64, JoinHandle<()>>,
    next_task: u64,
}

impl WorkerServer {
    /// Bind with the default in-flight bound.
    pub async fn bind(addr: &str, service: Arc<dyn Service>) -> Result<(Self, mpsc::Sender<()>)> {
        Self::bind_with_capacity(addr, service, MAX_IN_FLIGHT_REQUESTS).await
    }

    pub async fn bind_with_capacity(
        addr: &str,
        service: Arc<dyn Service>,
        max_in_flight: usize,
    ) -> Result<(Self, mpsc::Sender<()>)> {
        let mut socket = RouterSocket::new();
        socket
            .bind(addr)
            .await
            .with_context(|| format!("Failed to bind {} worker to {}", service.name(), addr))?;
        info!("{} worker listening on {}", service.name(), addr);

        let max_in_flight = max_in_flight.max(1);
        let (reply_tx, reply_rx) = mpsc::channel(max_in_flight * 2);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        Ok((
            Self {
                service,
                socket,
                endpoint: addr.to_string(),
                limiter: Arc::new(Semaphore::new(max_in_flight)),
                reply_tx,
                reply_rx,
                shutdown_rx,
                in_flight: HashMap::new(),
                next_task: 0,
            },
            shutdown_tx,
        ))
    }

    /// Bind and run on a background task.
    pub async fn start(addr: &str, service: Arc<dyn Service>) -> Result<WorkerHandle> {
        let (server, shutdown_tx) = Self::bind(addr, service).await?;
        let endpoint = server.endpoint.clone();
        let join_handle = tokio::spawn(server.run());
        Ok(WorkerHandle {
            endpoint,
            shutdown_tx,
            join_handle,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Main event loop - consumes self (can only be called once)
    pub async fn run(mut self) -> Result<()> {
        info!("{} worker entering event loop", self.service.name());

        loop {
            self.reap_finished();

            tokio::select! {
                biased;

                _ = self.shutdown_rx.recv() => {
                    info!(
                        "Shutdown signal received, waiting for {} in-flight requests...",
                        self.in_flight.len()
                    );
                    self.drain().await;
                    break;
                }

                Some(done) = self.reply_rx.recv() => {
                    self.send_reply(done).await;
                }

                recv_result = tokio::time::timeout(Duration::from_millis(RECV_POLL_MS), self.socket.recv()) => {
                    match recv_result {
                        Ok(Ok(multipart)) => {
                            let mut parts: Vec<Vec<u8>> = multipart
                                .into_vec()
                                .into_iter()
                                .map(|b| b.to_vec())
                                .collect();

                            if parts.len() < 3 {
                                warn!(
                                    "Expected [identity.., header, payload], got {} frames",
                                    parts.len()
                                );
                                continue;
                            }
                            let frames = parts.split_off(parts.len() - 2);
                            match Message::unpack(&frames) {
                                Ok(msg) => self.dispatch(parts, msg),
                                Err(e) => {
                                    warn!("Failed to unpack request: {}", e);
                                    let payload = ErrorPayload::new(ErrorKind::InvalidArgument, e.to_string());
                                    self.send_reply(Completed {
                                        envelope: parts,
                                        reply: error_reply(RequestId::new(0), &payload),
                                    })
                                    .await;
                                }
                            }
                        }
                        Ok(Err(e)) => {
                            error!("ZMQ recv error: {}", e);
                            break;
                        }
                        Err(_) => {} // Timeout - continue loop
                    }
                }
            }
        }

        info!("{} worker stopped", self.service.name());
        Ok(())
    }

    fn dispatch(&mut self, envelope: Vec<Vec<u8>>, request: Message) {
        debug!(
            "{:?} request {} ({} in flight)",
            request.opcode(),
            request.request_id(),
            self.in_flight.len() + 1
        );

        let service = self.service.clone();
        let limiter = self.limiter.clone();
        let tx = self.reply_tx.clone();

        let handle = tokio::spawn(async move {
            // Requests beyond the bound queue here
            let Ok(_permit) = limiter.acquire_owned().await else {
                return;
            };
            let reply = respond(service.as_ref(), request).await;
            if tx.send(Completed { envelope, reply }).await.is_err() {
                warn!("Reply dropped: server loop already stopped");
            }
        });

        self.in_flight.insert(self.next_task, handle);
        self.next_task += 1;
    }

    async fn send_reply(&mut self, done: Completed) {
        let request_id = done.reply.request_id();
        let multipart = match to_zmq_message(done.envelope, &done.reply) {
            Ok(m) => m,
            Err(e) => {
                error!("Failed to frame reply {}: {}", request_id, e);
                return;
            }
        };
        if let Err(e) = self.socket.send(multipart).await {
            error!("Failed to send reply {}: {}", request_id, e);
        }
    }

    /// Remove finished task handles
    fn reap_finished(&mut self) {
        self.in_flight.retain(|_, handle| !handle.is_finished());
    }

    /// Wait for every in-flight request, then flush their replies.
    async fn drain(&mut self) {
        let mut flushed = 0;

        // Keep receiving while waiting: queued tasks block on a full reply channel
        while !self.in_flight.is_empty() {
            let wait = Duration::from_millis(RECV_POLL_MS);
            if let Ok(Some(done)) = tokio::time::timeout(wait, self.reply_rx.recv()).await {
                self.send_reply(done).await;
                flushed += 1;
            }
            self.reap_finished();
        }

        while let Ok(done) = self.reply_rx.try_recv() {
            self.send_reply(done).await;
            flushed += 1;
        }
        info!("Graceful shutdown complete: flushed {} replies", flushed);
    }
}
