//! Line-delimited JSON transport over stdin/stdout.
//!
//! Each input line is `{"id": .., "method": "LookupUri", "payload": {..}}`.
//! Each answer is written as `{"id": .., "method": .., "response": {..}}` and
//! each observer notification as `{"notification": {..}}`, one per line.
//! Requests are handled concurrently, so answers may come back out of order;
//! callers match them up by `id`.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use lds_core::{Method, Notification, RequestMessage, Response};

use crate::error::Result;
use crate::service::DiscoveryService;
use crate::transport::{NotificationSink, Transport, TransportError};

#[derive(Debug, Deserialize)]
struct InboundLine {
    #[serde(default)]
    id: serde_json::Value,
    method: Method,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Serialize)]
struct ResponseLine<'a> {
    id: &'a serde_json::Value,
    method: Method,
    response: &'a Response,
}

#[derive(Serialize)]
struct NotificationLine<'a> {
    notification: &'a Notification,
}

/// Transport writing JSON lines to an async writer (stdout in `lds serve`).
pub struct StdioTransport {
    out: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    connected: AtomicBool,
    methods: parking_lot::Mutex<BTreeSet<Method>>,
}

impl StdioTransport {
    pub fn new(out: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
            connected: AtomicBool::new(false),
            methods: parking_lot::Mutex::new(BTreeSet::new()),
        }
    }

    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }

    pub async fn send_response(
        &self,
        id: &serde_json::Value,
        method: Method,
        response: &Response,
    ) -> std::result::Result<(), TransportError> {
        self.write_line(&ResponseLine {
            id,
            method,
            response,
        })
        .await
    }

    async fn write_line<S: Serialize>(&self, value: &S) -> std::result::Result<(), TransportError> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');

        let mut out = self.out.lock().await;
        out.write_all(&line).await?;
        out.flush().await?;
        Ok(())
    }

    fn ensure_connected(&self) -> std::result::Result<(), TransportError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn connect(&self) -> std::result::Result<(), TransportError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn register_method(&self, method: Method) -> std::result::Result<(), TransportError> {
        self.ensure_connected()?;
        self.methods.lock().insert(method);
        Ok(())
    }

    async fn unregister_method(&self, method: Method) -> std::result::Result<(), TransportError> {
        self.methods.lock().remove(&method);
        Ok(())
    }

    async fn disconnect(&self) -> std::result::Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        self.out.lock().await.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for StdioTransport {
    async fn deliver(&self, notification: &Notification) -> std::result::Result<(), TransportError> {
        self.ensure_connected()?;
        self.write_line(&NotificationLine { notification }).await
    }
}

/// Read requests from `input` until EOF, answering each on its own task.
/// Lines that are not UTF-8 or not a request are logged and skipped.
/// Returns once every accepted request has been answered.
pub async fn serve<R>(service: Arc<DiscoveryService<StdioTransport>>, mut input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut inflight = JoinSet::new();

    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                tracing::warn!(error = %e, "Request line is not UTF-8");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        let inbound: InboundLine = match serde_json::from_str(line) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed request line");
                continue;
            }
        };

        let service = Arc::clone(&service);
        inflight.spawn(async move {
            let method = inbound.method;
            let message = RequestMessage::new(method, inbound.payload);
            let Some(response) = service.handle_request(message).await else {
                return;
            };
            if let Err(e) = service
                .transport()
                .send_response(&inbound.id, method, &response)
                .await
            {
                tracing::warn!(method = %method, error = %e, "Failed to write response");
            }
        });

        while let Some(joined) = inflight.try_join_next() {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Request task panicked");
            }
        }
    }

    while let Some(joined) = inflight.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Request task panicked");
        }
    }
    Ok(())
}
