//! Frames exchanged with the hub server plus the newline-delimited JSON
//! codec used by stream transports.

use std::{collections::BTreeMap, io};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{connection::LifecycleEvent, transport::TransportKind};

/// Longest inbound line accepted by [`read_frame`], newline included.
pub const MAX_FRAME_BYTES: usize = 1 << 20;

/// Outbound frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// First frame on a freshly opened transport.
    Handshake {
        transport: TransportKind,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
    },
    Invoke {
        id: u64,
        hub: String,
        method: String,
        #[serde(default)]
        args: Vec<Value>,
    },
}

/// Inbound frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Reply {
        id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Event {
        hub: String,
        event: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    Lifecycle {
        kind: LifecycleKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl ServerFrame {
    pub fn reply_ok(id: u64, result: Value) -> Self {
        ServerFrame::Reply {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn reply_err(id: u64, message: impl Into<String>) -> Self {
        ServerFrame::Reply {
            id,
            result: None,
            error: Some(message.into()),
        }
    }

    pub fn event(hub: impl Into<String>, event: impl Into<String>, args: Vec<Value>) -> Self {
        ServerFrame::Event {
            hub: hub.into(),
            event: event.into(),
            args,
        }
    }
}

/// Lifecycle notifications, either pushed by the server or raised locally.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    Slow,
    Reconnecting,
    Reconnected,
    Error,
    Closed,
}

impl LifecycleEvent {
    pub fn kind(&self) -> LifecycleKind {
        match self {
            LifecycleEvent::Slow => LifecycleKind::Slow,
            LifecycleEvent::Reconnecting { .. } => LifecycleKind::Reconnecting,
            LifecycleEvent::Reconnected => LifecycleKind::Reconnected,
            LifecycleEvent::Error(_) => LifecycleKind::Error,
            LifecycleEvent::Closed(_) => LifecycleKind::Closed,
        }
    }
}

impl From<LifecycleEvent> for ServerFrame {
    fn from(event: LifecycleEvent) -> Self {
        let kind = event.kind();
        let detail = match event {
            LifecycleEvent::Error(detail) => Some(detail),
            LifecycleEvent::Closed(detail) => detail,
            _ => None,
        };
        ServerFrame::Lifecycle { kind, detail }
    }
}

/// Turns any serializable value into an invocation argument list.
///
/// Sequences and tuples become the list itself, `()` becomes an empty list
/// and anything else is passed as the single argument.
pub fn to_arguments<A: Serialize>(args: A) -> serde_json::Result<Vec<Value>> {
    Ok(match serde_json::to_value(args)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    })
}

/// Inverse of [`to_arguments`] for typed event handlers: no arguments decode
/// from `null`, one argument decodes directly and several decode as a tuple.
pub fn from_arguments<T: DeserializeOwned>(args: &[Value]) -> serde_json::Result<T> {
    match args {
        [] => serde_json::from_value(Value::Null),
        [single] => serde_json::from_value(single.clone()),
        many => serde_json::from_value(Value::Array(many.to_vec())),
    }
}

/// Reads the next newline-delimited JSON frame, skipping blank lines.
///
/// `Ok(None)` is end of stream. A line that does not parse, or that runs past
/// [`MAX_FRAME_BYTES`], fails with [`io::ErrorKind::InvalidData`] after the
/// whole line has been consumed, so the stream stays usable.
pub async fn read_frame<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = (&mut *reader)
            .take(MAX_FRAME_BYTES as u64)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 {
            return Ok(None);
        }
        if read == MAX_FRAME_BYTES && buf.last() != Some(&b'\n') {
            discard_line(reader).await?;
            return Err(invalid_data(format!(
                "frame longer than {MAX_FRAME_BYTES} bytes"
            )));
        }

        let line = buf.trim_ascii();
        if !line.is_empty() {
            return serde_json::from_slice(line).map(Some).map_err(invalid_data);
        }
    }
}

/// Consumes input up to and including the next newline.
async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<()> {
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            return Ok(());
        }
        match chunk.iter().position(|byte| *byte == b'\n') {
            Some(newline) => {
                reader.consume(newline + 1);
                return Ok(());
            }
            None => {
                let len = chunk.len();
                reader.consume(len);
            }
        }
    }
}

/// Writes `frame` as a single JSON line and flushes it.
pub async fn write_frame<W, T>(writer: &mut W, frame: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = Vec::with_capacity(128);
    serde_json::to_writer(&mut line, frame).map_err(invalid_data)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

fn invalid_data<E>(error: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, error)
}
