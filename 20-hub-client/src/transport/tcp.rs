//! Persistent-duplex transport over TCP.
//!
//! Frames are newline-delimited JSON, which keeps the wire readable with
//! netcat-style tools. The first frame after connecting is the handshake.
//! End of stream after a server `closed` lifecycle frame is a clean close;
//! any other end of stream is an abrupt drop.

use std::{io, sync::Mutex, time::Duration};

use futures::{FutureExt, future::BoxFuture};
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    select,
    sync::{Mutex as AsyncMutex, mpsc, watch},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, info, warn};

use super::{ConnectRequest, Connector, OpenedTransport, Transport, TransportEvent, TransportKind};
use crate::{
    error::TransportError,
    protocol::{ClientFrame, LifecycleKind, ServerFrame, read_frame, write_frame},
};

const INBOUND_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn connect(&self, request: &ConnectRequest) -> Result<TcpStream, TransportError> {
        let host = request
            .endpoint
            .host_str()
            .ok_or_else(|| TransportError::Refused(format!("{} has no host", request.endpoint)))?
            .to_string();
        let port = request
            .endpoint
            .port_or_known_default()
            .ok_or_else(|| TransportError::Refused(format!("{} has no port", request.endpoint)))?;

        let stream = timeout(self.connect_timeout, TcpStream::connect((host.as_str(), port)))
            .await
            .map_err(|_| {
                TransportError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connecting to {host}:{port} timed out"),
                ))
            })??;
        info!(%host, port, "tcp transport connected");
        Ok(stream)
    }
}

impl Connector for TcpConnector {
    fn negotiate<'a>(
        &'a self,
        _request: &'a ConnectRequest,
    ) -> BoxFuture<'a, Result<Option<Vec<TransportKind>>, TransportError>> {
        async { Ok(None) }.boxed()
    }

    fn open<'a>(
        &'a self,
        kind: TransportKind,
        request: &'a ConnectRequest,
    ) -> BoxFuture<'a, Result<OpenedTransport, TransportError>> {
        async move {
            if kind != TransportKind::PersistentDuplex {
                return Err(TransportError::Unsupported(kind));
            }

            let stream = self.connect(request).await?;
            let (reader, mut writer) = stream.into_split();
            write_frame(&mut writer, &request.handshake(kind)).await?;

            let (events_tx, inbound) = mpsc::channel(INBOUND_CAPACITY);
            let reader_task = tokio::spawn(read_loop(BufReader::new(reader), events_tx));

            let (closed, _) = watch::channel(false);
            let transport = TcpTransport {
                writer: AsyncMutex::new(Some(writer)),
                reader_task: Mutex::new(Some(reader_task)),
                closed,
            };
            Ok(OpenedTransport {
                transport: Box::new(transport),
                inbound,
            })
        }
        .boxed()
    }
}

struct TcpTransport {
    writer: AsyncMutex<Option<OwnedWriteHalf>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    /// Flipped by `close`; abandons writes stuck on a peer that stopped
    /// reading.
    closed: watch::Sender<bool>,
}

impl Transport for TcpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::PersistentDuplex
    }

    fn send(&self, frame: ClientFrame) -> BoxFuture<'_, Result<(), TransportError>> {
        async move {
            let closed = closed_signal(self.closed.subscribe());
            let write = async {
                let mut writer = self.writer.lock().await;
                let writer = writer.as_mut().ok_or(TransportError::Closed)?;
                write_frame(writer, &frame).await?;
                Ok::<(), TransportError>(())
            };
            select! {
                result = write => result,
                () = closed => Err(TransportError::Closed),
            }
        }
        .boxed()
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        async move {
            self.closed.send_replace(true);
            if let Some(mut writer) = self.writer.lock().await.take() {
                if let Err(error) = writer.shutdown().await {
                    debug!(?error, "failed to shut down tcp writer cleanly");
                }
            }
            let reader_task = self
                .reader_task
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            if let Some(task) = reader_task {
                task.abort();
            }
        }
        .boxed()
    }
}

async fn closed_signal(mut closed: watch::Receiver<bool>) {
    while !*closed.borrow_and_update() {
        if closed.changed().await.is_err() {
            return;
        }
    }
}

async fn read_loop(mut reader: BufReader<OwnedReadHalf>, events: mpsc::Sender<TransportEvent>) {
    let mut server_closed = false;
    loop {
        let event = match read_frame::<_, ServerFrame>(&mut reader).await {
            Ok(Some(frame)) => {
                if let ServerFrame::Lifecycle {
                    kind: LifecycleKind::Closed,
                    ..
                } = &frame
                {
                    server_closed = true;
                }
                TransportEvent::Frame(frame)
            }
            Ok(None) if server_closed => {
                let _ = events.send(TransportEvent::Closed).await;
                break;
            }
            Ok(None) => {
                let _ = events
                    .send(TransportEvent::Dropped("server closed the stream".to_string()))
                    .await;
                break;
            }
            Err(error) if error.kind() == io::ErrorKind::InvalidData => {
                warn!(?error, "discarding malformed frame");
                TransportEvent::Malformed(error.to_string())
            }
            Err(error) => {
                let _ = events.send(TransportEvent::Dropped(error.to_string())).await;
                break;
            }
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
}
