//! Error types surfaced by connections, hub proxies and transports.

use std::{io, time::Duration};

use thiserror::Error;

use crate::{connection::ConnectionState, transport::TransportKind};

/// Errors returned to the owner of a [`Connection`](crate::Connection) or to
/// the caller awaiting a single invocation.
///
/// Invocation-level variants ([`Error::Timeout`], [`Error::Decode`],
/// [`Error::Remote`], [`Error::Closed`]) only ever reach the caller that
/// issued the call.
#[derive(Debug, Error)]
pub enum Error {
    /// No transport kind could be agreed with the server.
    #[error("transport negotiation failed: {0}")]
    Negotiation(String),

    /// Every candidate transport failed to open.
    #[error("failed to connect to {endpoint}: {detail}")]
    Connection { endpoint: String, detail: String },

    /// Reconnection gave up after the configured number of attempts.
    #[error("reconnection abandoned after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// The send queue held while reconnecting is full.
    #[error("send queue is full ({depth} frames held while reconnecting)")]
    Backpressure { depth: usize },

    #[error("invocation {id} timed out after {after:?}")]
    Timeout { id: u64, after: Duration },

    /// A typed reply or event payload did not match the expected shape.
    #[error("failed to decode payload as {shape}: {source}")]
    Decode {
        shape: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode invocation arguments: {0}")]
    Encode(#[source] serde_json::Error),

    /// The server answered the invocation with an error message.
    #[error("server returned an error: {0}")]
    Remote(String),

    /// The operation hit a connection that is not (or no longer) active.
    #[error("connection is closed")]
    Closed,

    #[error("operation is not valid while the connection is {0}")]
    InvalidState(ConnectionState),
}

/// Errors reported by [`Transport`](crate::transport::Transport) and
/// [`Connector`](crate::transport::Connector) implementations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0} transport is not supported")]
    Unsupported(TransportKind),

    #[error("transport closed")]
    Closed,

    #[error("connection refused: {0}")]
    Refused(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("frame encoding failed: {0}")]
    Codec(#[from] serde_json::Error),
}
