//! In-process transport pair.
//!
//! Every `open` creates a [`MemorySession`] that the test (or embedding
//! application) picks up with [`MemoryConnector::accept`] and drives as the
//! server: read client frames, push replies and events, close cleanly or drop
//! the channel abruptly.

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::{FutureExt, future::BoxFuture};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::debug;

use super::{ConnectRequest, Connector, OpenedTransport, Transport, TransportEvent, TransportKind};
use crate::{
    error::TransportError,
    protocol::{ClientFrame, ServerFrame},
};

const INBOUND_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct MemoryConnector {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    capabilities: Mutex<Option<Vec<TransportKind>>>,
    negotiate_error: Mutex<Option<String>>,
    refused: Mutex<HashSet<TransportKind>>,
    failing_opens: Mutex<usize>,
    opened: Mutex<Vec<TransportKind>>,
    sessions_tx: mpsc::UnboundedSender<MemorySession>,
    sessions_rx: AsyncMutex<mpsc::UnboundedReceiver<MemorySession>>,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    pub fn new() -> Self {
        let (sessions_tx, sessions_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(MemoryInner {
                capabilities: Mutex::new(None),
                negotiate_error: Mutex::new(None),
                refused: Mutex::new(HashSet::new()),
                failing_opens: Mutex::new(0),
                opened: Mutex::new(Vec::new()),
                sessions_tx,
                sessions_rx: AsyncMutex::new(sessions_rx),
            }),
        }
    }

    /// Kinds reported by `negotiate`; `None` means no capabilities are declared.
    pub fn set_capabilities(&self, kinds: Option<Vec<TransportKind>>) {
        *lock(&self.inner.capabilities) = kinds;
    }

    pub fn fail_negotiation(&self, reason: impl Into<String>) {
        *lock(&self.inner.negotiate_error) = Some(reason.into());
    }

    /// Every open of `kind` is refused from now on.
    pub fn refuse(&self, kind: TransportKind) {
        lock(&self.inner.refused).insert(kind);
    }

    pub fn accept_kind(&self, kind: TransportKind) {
        lock(&self.inner.refused).remove(&kind);
    }

    /// The next `count` opens fail whatever kind they ask for.
    pub fn fail_next_opens(&self, count: usize) {
        *lock(&self.inner.failing_opens) = count;
    }

    /// Kinds of every transport successfully opened so far.
    pub fn opened_kinds(&self) -> Vec<TransportKind> {
        lock(&self.inner.opened).clone()
    }

    /// Waits for the next opened transport.
    pub async fn accept(&self) -> Option<MemorySession> {
        self.inner.sessions_rx.lock().await.recv().await
    }

    fn try_open(
        &self,
        kind: TransportKind,
        request: &ConnectRequest,
    ) -> Result<OpenedTransport, TransportError> {
        if lock(&self.inner.refused).contains(&kind) {
            return Err(TransportError::Unsupported(kind));
        }
        {
            let mut failing = lock(&self.inner.failing_opens);
            if *failing > 0 {
                *failing -= 1;
                return Err(TransportError::Refused(format!("{kind} open failed")));
            }
        }

        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, inbound) = mpsc::channel(INBOUND_CAPACITY);
        let alive = Arc::new(AtomicBool::new(true));

        let session = MemorySession {
            kind,
            handshake: request.handshake(kind),
            from_client,
            to_client,
            alive: Arc::clone(&alive),
        };
        self.inner
            .sessions_tx
            .send(session)
            .map_err(|_| TransportError::Refused("memory server is gone".to_string()))?;
        lock(&self.inner.opened).push(kind);
        debug!(%kind, "memory transport opened");

        let transport = MemoryTransport {
            kind,
            to_server: Mutex::new(Some(to_server)),
            alive,
        };
        Ok(OpenedTransport {
            transport: Box::new(transport),
            inbound,
        })
    }
}

impl Connector for MemoryConnector {
    fn negotiate<'a>(
        &'a self,
        _request: &'a ConnectRequest,
    ) -> BoxFuture<'a, Result<Option<Vec<TransportKind>>, TransportError>> {
        async move {
            if let Some(reason) = lock(&self.inner.negotiate_error).clone() {
                return Err(TransportError::Refused(reason));
            }
            Ok(lock(&self.inner.capabilities).clone())
        }
        .boxed()
    }

    fn open<'a>(
        &'a self,
        kind: TransportKind,
        request: &'a ConnectRequest,
    ) -> BoxFuture<'a, Result<OpenedTransport, TransportError>> {
        async move { self.try_open(kind, request) }.boxed()
    }
}

struct MemoryTransport {
    kind: TransportKind,
    to_server: Mutex<Option<mpsc::UnboundedSender<ClientFrame>>>,
    alive: Arc<AtomicBool>,
}

impl Transport for MemoryTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn send(&self, frame: ClientFrame) -> BoxFuture<'_, Result<(), TransportError>> {
        async move {
            if !self.alive.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            match lock(&self.to_server).as_ref() {
                Some(tx) => tx.send(frame).map_err(|_| TransportError::Closed),
                None => Err(TransportError::Closed),
            }
        }
        .boxed()
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        async move {
            self.alive.store(false, Ordering::SeqCst);
            lock(&self.to_server).take();
        }
        .boxed()
    }
}

/// Server side of one in-memory transport.
pub struct MemorySession {
    kind: TransportKind,
    handshake: ClientFrame,
    from_client: mpsc::UnboundedReceiver<ClientFrame>,
    to_client: mpsc::Sender<TransportEvent>,
    alive: Arc<AtomicBool>,
}

impl MemorySession {
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn handshake(&self) -> &ClientFrame {
        &self.handshake
    }

    /// Next frame written by the client; `None` once the client closed.
    pub async fn recv(&mut self) -> Option<ClientFrame> {
        self.from_client.recv().await
    }

    /// Returns `false` when the client side is gone.
    pub async fn push(&self, frame: ServerFrame) -> bool {
        self.emit(TransportEvent::Frame(frame)).await
    }

    pub async fn emit(&self, event: TransportEvent) -> bool {
        self.to_client.send(event).await.is_ok()
    }

    /// Clean, server-initiated close.
    pub async fn close(self) {
        self.alive.store(false, Ordering::SeqCst);
        let _ = self.to_client.send(TransportEvent::Closed).await;
    }

    /// Abrupt loss of the channel.
    pub async fn drop_connection(self, detail: &str) {
        self.alive.store(false, Ordering::SeqCst);
        let _ = self
            .to_client
            .send(TransportEvent::Dropped(detail.to_string()))
            .await;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;
    use url::Url;

    use super::*;

    fn request() -> ConnectRequest {
        ConnectRequest {
            endpoint: Url::parse("memory://hub").unwrap(),
            headers: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let connector = MemoryConnector::new();
        let request = request();
        let mut opened = connector
            .open(TransportKind::PersistentDuplex, &request)
            .await
            .expect("open");
        let mut session = connector.accept().await.expect("session");

        opened
            .transport
            .send(ClientFrame::Invoke {
                id: 0,
                hub: "h".into(),
                method: "m".into(),
                args: vec![],
            })
            .await
            .expect("send");
        assert!(matches!(session.recv().await, Some(ClientFrame::Invoke { id: 0, .. })));

        assert!(session.push(ServerFrame::reply_ok(0, json!(1))).await);
        assert_eq!(
            opened.inbound.recv().await,
            Some(TransportEvent::Frame(ServerFrame::reply_ok(0, json!(1))))
        );
    }

    #[tokio::test]
    async fn refused_kind_and_forced_failures() {
        let connector = MemoryConnector::new();
        let request = request();
        connector.refuse(TransportKind::PersistentDuplex);
        assert!(matches!(
            connector.open(TransportKind::PersistentDuplex, &request).await,
            Err(TransportError::Unsupported(TransportKind::PersistentDuplex))
        ));

        connector.fail_next_opens(1);
        assert!(connector.open(TransportKind::Polling, &request).await.is_err());
        assert!(connector.open(TransportKind::Polling, &request).await.is_ok());
        assert_eq!(connector.opened_kinds(), vec![TransportKind::Polling]);
    }

    #[tokio::test]
    async fn sends_fail_after_server_drop() {
        let connector = MemoryConnector::new();
        let request = request();
        let opened = connector
            .open(TransportKind::ServerPush, &request)
            .await
            .expect("open");
        let session = connector.accept().await.expect("session");
        session.drop_connection("gone").await;

        let result = opened
            .transport
            .send(request.handshake(TransportKind::ServerPush))
            .await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }
}
