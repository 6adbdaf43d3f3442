//! Client side of the worker contract.
//!
//! [`WorkerChannel`] moves one request message to a worker and brings back
//! its reply. [`ZmqChannel`] is the network implementation; tests substitute
//! in-process stubs. [`WorkerClient`] adds the typed operations on top.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use vidmesh_protocol::defaults::CONNECT_TIMEOUT_MS;
use vidmesh_protocol::error::ProtocolError;
use vidmesh_protocol::{
    AnalysisReply, ClarifyReply, ClarifyRequest, ErrorPayload, Message, OpCode, ReportReply,
    ReportRequest, RequestId, TranscriptReply, VideoRequest,
};
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

/// Why a worker call did not produce a usable reply.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Connecting, sending or receiving failed.
    #[error("Worker at {addr} unavailable: {message}")]
    Unavailable { addr: String, message: String },

    #[error("Worker at {addr} did not answer within {timeout:?}")]
    Timeout { addr: String, timeout: Duration },

    /// The worker answered with an `Err` message.
    #[error("Worker error ({:?}): {}", .0.kind, .0.message)]
    Remote(ErrorPayload),

    #[error("Unexpected reply opcode {0:?}")]
    UnexpectedReply(OpCode),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// One request in, one reply out.
#[async_trait]
pub trait WorkerChannel: Send + Sync {
    async fn call(&self, request: Message) -> Result<Message, RpcError>;

    /// Where the channel points, for log lines and error messages.
    fn target(&self) -> &str;
}

/// REQ-socket channel. Each call opens its own socket so concurrent callers
/// never interleave on one REQ state machine.
///
/// Establishing the connection is always bounded by `connect_timeout`; the
/// reply itself is only bounded when `timeout` is set.
pub struct ZmqChannel {
    addr: String,
    timeout: Option<Duration>,
    connect_timeout: Duration,
}

impl ZmqChannel {
    /// A channel that waits as long as the worker needs once connected.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: None,
            connect_timeout: Duration::from_millis(CONNECT_TIMEOUT_MS),
        }
    }

    /// A channel that gives up on the whole call after `timeout`.
    pub fn with_timeout(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::new(addr)
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    fn unavailable(&self, e: impl std::fmt::Display) -> RpcError {
        RpcError::Unavailable {
            addr: self.addr.clone(),
            message: e.to_string(),
        }
    }

    async fn exchange(&self, request: Message) -> Result<Message, RpcError> {
        let mut socket = ReqSocket::new();
        // zeromq retries a refused connect indefinitely
        match tokio::time::timeout(self.connect_timeout, socket.connect(&self.addr)).await {
            Ok(result) => result.map_err(|e| self.unavailable(e))?,
            Err(_) => {
                return Err(self.unavailable(format!(
                    "no connection within {:?}",
                    self.connect_timeout
                )))
            }
        }

        socket
            .send(to_zmq_message(Vec::new(), &request)?)
            .await
            .map_err(|e| self.unavailable(e))?;

        let reply: ZmqMessage = socket.recv().await.map_err(|e| self.unavailable(e))?;
        let (_, message) = from_zmq_message(reply)?;
        Ok(message)
    }
}

#[async_trait]
impl WorkerChannel for ZmqChannel {
    async fn call(&self, request: Message) -> Result<Message, RpcError> {
        debug!(
            "-> {} {:?} (request {})",
            self.addr,
            request.opcode(),
            request.request_id()
        );
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.exchange(request))
                .await
                .map_err(|_| RpcError::Timeout {
                    addr: self.addr.clone(),
                    timeout,
                })?,
            None => self.exchange(request).await,
        }
    }

    fn target(&self) -> &str {
        &self.addr
    }
}

/// Frame `message` as `[envelope.., header, payload]`.
pub(crate) fn to_zmq_message(
    envelope: Vec<Vec<u8>>,
    message: &Message,
) -> Result<ZmqMessage, ProtocolError> {
    let (header, body) = message.pack()?;
    let mut frames = envelope.into_iter().chain([header, body]);
    // `chain` always yields at least the header
    let mut multipart = ZmqMessage::from(frames.next().unwrap_or_default());
    for frame in frames {
        multipart.push_back(frame.into());
    }
    Ok(multipart)
}

/// Split `[envelope.., header, payload]` into the envelope and the message.
pub(crate) fn from_zmq_message(
    multipart: ZmqMessage,
) -> Result<(Vec<Vec<u8>>, Message), ProtocolError> {
    let mut parts: Vec<Vec<u8>> = multipart
        .into_vec()
        .into_iter()
        .map(|b| b.to_vec())
        .collect();

    if parts.len() < 2 {
        return Err(ProtocolError::InvalidFrameCount {
            expected: 2,
            got: parts.len(),
        });
    }
    let frames = parts.split_off(parts.len() - 2);
    let message = Message::unpack(&frames)?;
    Ok((parts, message))
}

/// Typed operations of the worker contract over any channel.
#[derive(Clone)]
pub struct WorkerClient {
    channel: Arc<dyn WorkerChannel>,
    next_id: Arc<AtomicU64>,
}

impl WorkerClient {
    pub fn new(channel: Arc<dyn WorkerChannel>) -> Self {
        Self {
            channel,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn connect(addr: impl Into<String>) -> Self {
        Self::new(Arc::new(ZmqChannel::new(addr)))
    }

    pub fn connect_with_timeout(addr: impl Into<String>, timeout: Duration) -> Self {
        Self::new(Arc::new(ZmqChannel::with_timeout(addr, timeout)))
    }

    pub fn target(&self) -> &str {
        self.channel.target()
    }

    pub async fn transcribe_video(&self, file_path: &str) -> Result<TranscriptReply, RpcError> {
        let request = VideoRequest {
            file_path: file_path.to_string(),
        };
        self.request(OpCode::TranscribeVideo, &request).await
    }

    pub async fn analyze_video(&self, file_path: &str) -> Result<AnalysisReply, RpcError> {
        let request = VideoRequest {
            file_path: file_path.to_string(),
        };
        self.request(OpCode::AnalyzeVideo, &request).await
    }

    pub async fn generate_report(
        &self,
        file_path: &str,
        report_type: &str,
    ) -> Result<ReportReply, RpcError> {
        let request = ReportRequest {
            file_path: file_path.to_string(),
            report_type: report_type.to_string(),
        };
        self.request(OpCode::GenerateReport, &request).await
    }

    pub async fn clarify_query(
        &self,
        query: &str,
        session_id: Option<String>,
    ) -> Result<ClarifyReply, RpcError> {
        let request = ClarifyRequest {
            query: query.to_string(),
            session_id,
        };
        self.request(OpCode::ClarifyQuery, &request).await
    }

    async fn request<Req, Rep>(&self, opcode: OpCode, payload: &Req) -> Result<Rep, RpcError>
    where
        Req: Serialize + Sync,
        Rep: DeserializeOwned,
    {
        let request_id = RequestId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = Message::encode(opcode, request_id, payload)?;
        let reply = self.channel.call(request).await?;

        match reply.opcode() {
            OpCode::Reply => Ok(reply.decode()?),
            OpCode::Err => Err(RpcError::Remote(reply.decode()?)),
            other => Err(RpcError::UnexpectedReply(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use vidmesh_protocol::ErrorKind;

    /// Records requests and answers with a canned reply.
    struct Canned {
        reply: Mutex<Option<Message>>,
        seen: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl WorkerChannel for Canned {
        async fn call(&self, request: Message) -> Result<Message, RpcError> {
            self.seen.lock().unwrap().push(request);
            self.reply
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| RpcError::Unavailable {
                    addr: "canned".into(),
                    message: "no reply left".into(),
                })
        }

        fn target(&self) -> &str {
            "canned"
        }
    }

    fn canned(reply: Message) -> Arc<Canned> {
        Arc::new(Canned {
            reply: Mutex::new(Some(reply)),
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_reply_is_decoded() {
        let reply = Message::encode(
            OpCode::Reply,
            RequestId::new(1),
            &TranscriptReply {
                transcript: "hello".into(),
            },
        )
        .unwrap();
        let channel = canned(reply);
        let client = WorkerClient::new(channel.clone());

        let result = client.transcribe_video("/tmp/a.mp4").await.unwrap();
        assert_eq!(result.transcript, "hello");

        let seen = channel.seen.lock().unwrap();
        assert_eq!(seen[0].opcode(), OpCode::TranscribeVideo);
        let body: VideoRequest = seen[0].decode().unwrap();
        assert_eq!(body.file_path, "/tmp/a.mp4");
    }

    #[tokio::test]
    async fn test_err_reply_becomes_remote() {
        let reply = Message::encode(
            OpCode::Err,
            RequestId::new(1),
            &ErrorPayload::new(ErrorKind::NotFound, "missing"),
        )
        .unwrap();
        let client = WorkerClient::new(canned(reply));

        match client.analyze_video("/tmp/a.mp4").await {
            Err(RpcError::Remote(payload)) => assert_eq!(payload.kind, ErrorKind::NotFound),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_request_ids_increase() {
        let reply = Message::encode(
            OpCode::Reply,
            RequestId::new(1),
            &ReportReply {
                report_path: "x".into(),
            },
        )
        .unwrap();
        let channel = canned(reply);
        let client = WorkerClient::new(channel.clone());
        client.generate_report("/tmp/a.mp4", "pdf").await.unwrap();
        let _ = client.generate_report("/tmp/a.mp4", "pdf").await;

        let seen = channel.seen.lock().unwrap();
        assert_eq!(seen[0].request_id(), RequestId::new(1));
        assert_eq!(seen[1].request_id(), RequestId::new(2));
    }

    #[test]
    fn test_envelope_survives_framing() {
        let message = Message::encode(
            OpCode::Reply,
            RequestId::new(9),
            &AnalysisReply {
                objects: vec!["cat".into()],
            },
        )
        .unwrap();
        let multipart =
            to_zmq_message(vec![b"peer".to_vec(), Vec::new()], &message).unwrap();
        let (envelope, decoded) = from_zmq_message(multipart).unwrap();

        assert_eq!(envelope, vec![b"peer".to_vec(), Vec::new()]);
        assert_eq!(decoded.request_id(), RequestId::new(9));
        assert_eq!(decoded.payload, message.payload);
    }
}
