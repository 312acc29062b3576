//! Pluggable transports.
//!
//! A [`Connector`] knows how to reach an endpoint: it may report the
//! transport kinds the server declares and it opens one [`Transport`] of a
//! requested kind. An opened transport hands back a receiver of
//! [`TransportEvent`]s; the connection drains it from a single task.
//!
//! - [`tcp`] carries newline-delimited JSON frames over a TCP stream.
//! - [`memory`] is an in-process pair with a scriptable server side.

pub mod memory;
pub mod tcp;

use std::{collections::BTreeMap, fmt};

use clap::ValueEnum;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use url::Url;

use crate::{
    error::TransportError,
    protocol::{ClientFrame, ServerFrame},
};

/// Physical channel kinds, most capable first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// A persistent full-duplex socket.
    PersistentDuplex,
    /// A server-push stream paired with client requests.
    ServerPush,
    /// Repeated polling.
    Polling,
}

impl TransportKind {
    pub const FALLBACK_ORDER: [TransportKind; 3] = [
        TransportKind::PersistentDuplex,
        TransportKind::ServerPush,
        TransportKind::Polling,
    ];
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::PersistentDuplex => "persistent-duplex",
            TransportKind::ServerPush => "server-push",
            TransportKind::Polling => "polling",
        };
        f.write_str(name)
    }
}

/// Transport choice made by the owner of a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TransportSelection {
    /// Negotiate, falling back through the configured order.
    #[default]
    Auto,
    PersistentDuplex,
    ServerPush,
    Polling,
}

impl TransportSelection {
    /// The single kind pinned by this selection, if any.
    pub fn kind(self) -> Option<TransportKind> {
        match self {
            TransportSelection::Auto => None,
            TransportSelection::PersistentDuplex => Some(TransportKind::PersistentDuplex),
            TransportSelection::ServerPush => Some(TransportKind::ServerPush),
            TransportSelection::Polling => Some(TransportKind::Polling),
        }
    }
}

/// Outcome of a completed negotiation. Never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportDescriptor {
    pub kind: TransportKind,
    /// Kinds the server declared, when it declared any.
    pub supported: Option<Vec<TransportKind>>,
    pub endpoint: Url,
}

/// What a connector needs to negotiate and open a transport.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub endpoint: Url,
    pub headers: BTreeMap<String, String>,
}

impl ConnectRequest {
    pub fn handshake(&self, kind: TransportKind) -> ClientFrame {
        ClientFrame::Handshake {
            transport: kind,
            headers: self.headers.clone(),
            query: self.endpoint.query().map(str::to_string),
        }
    }
}

/// Everything a transport can report on its inbound side.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Frame(ServerFrame),
    /// Bytes arrived that could not be decoded into a frame.
    Malformed(String),
    /// The peer closed the channel on purpose.
    Closed,
    /// The channel was lost.
    Dropped(String),
}

/// One physical channel.
///
/// A failed `send` must be followed by a `Dropped` (or `Closed`) event on the
/// inbound side so the connection can recover.
pub trait Transport: Send + Sync + 'static {
    fn kind(&self) -> TransportKind;

    fn send(&self, frame: ClientFrame) -> BoxFuture<'_, Result<(), TransportError>>;

    /// Closes the channel. Calling it twice is harmless.
    fn close(&self) -> BoxFuture<'_, ()>;
}

/// A transport that has just been opened, with its inbound event stream.
pub struct OpenedTransport {
    pub transport: Box<dyn Transport>,
    pub inbound: mpsc::Receiver<TransportEvent>,
}

impl fmt::Debug for OpenedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedTransport")
            .field("kind", &self.transport.kind())
            .finish_non_exhaustive()
    }
}

/// Factory for transports; used for the initial connect and every
/// reconnection attempt.
pub trait Connector: Send + Sync + 'static {
    /// Transport kinds declared by the server, or `None` when the server
    /// publishes no capabilities.
    fn negotiate<'a>(
        &'a self,
        request: &'a ConnectRequest,
    ) -> BoxFuture<'a, Result<Option<Vec<TransportKind>>, TransportError>>;

    fn open<'a>(
        &'a self,
        kind: TransportKind,
        request: &'a ConnectRequest,
    ) -> BoxFuture<'a, Result<OpenedTransport, TransportError>>;
}
