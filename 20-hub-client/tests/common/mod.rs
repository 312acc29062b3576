#![allow(dead_code)]

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use hub_client::{
    ConnectionConfig, ConnectionState, LifecycleEvent, RetryPolicy,
    protocol::{ClientFrame, ServerFrame},
    transport::memory::{MemoryConnector, MemorySession},
};
use serde_json::Value;
use tokio::{
    select,
    sync::{broadcast, watch},
    task::JoinHandle,
    time::timeout,
};

pub const WAIT: Duration = Duration::from_secs(2);

pub fn memory_config() -> ConnectionConfig {
    ConnectionConfig::parse("memory://hub/signalr")
        .expect("valid endpoint")
        .with_retry(fast_retry(3))
}

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
        backoff_multiplier: 2.0,
    }
}

pub async fn accept(connector: &MemoryConnector) -> Result<MemorySession> {
    timeout(WAIT, connector.accept())
        .await
        .context("timed out waiting for a transport")?
        .ok_or_else(|| anyhow!("memory connector closed"))
}

/// Next client frame, which must be an invocation.
pub async fn next_invoke(session: &mut MemorySession) -> Result<(u64, String, String, Vec<Value>)> {
    match timeout(WAIT, session.recv()).await? {
        Some(ClientFrame::Invoke {
            id,
            hub,
            method,
            args,
        }) => Ok((id, hub, method, args)),
        other => Err(anyhow!("expected an invoke frame, got {other:?}")),
    }
}

pub async fn next_event(
    events: &mut broadcast::Receiver<LifecycleEvent>,
) -> Result<LifecycleEvent> {
    Ok(timeout(WAIT, events.recv()).await??)
}

pub async fn wait_for_state(
    states: &mut watch::Receiver<ConnectionState>,
    wanted: ConnectionState,
) -> Result<()> {
    timeout(WAIT, states.wait_for(|state| *state == wanted))
        .await
        .with_context(|| format!("timed out waiting for {wanted}"))??;
    Ok(())
}

/// Serves a chat-like hub on every transport the connector opens: every
/// invocation is answered with `null`, and invocations of `method` are
/// re-broadcast to every session as `event` with the same arguments.
pub fn spawn_chat_hub(connector: MemoryConnector, method: &str, event: &str) -> JoinHandle<()> {
    let method = method.to_string();
    let event = event.to_string();
    let (fanout, _) = broadcast::channel::<ServerFrame>(1024);
    tokio::spawn(async move {
        while let Some(session) = connector.accept().await {
            tokio::spawn(serve_session(
                session,
                method.clone(),
                event.clone(),
                fanout.clone(),
            ));
        }
    })
}

async fn serve_session(
    mut session: MemorySession,
    method: String,
    event: String,
    fanout: broadcast::Sender<ServerFrame>,
) {
    let mut pushed = fanout.subscribe();
    loop {
        select! {
            frame = session.recv() => match frame {
                Some(ClientFrame::Invoke { id, hub, method: called, args }) => {
                    if !session.push(ServerFrame::reply_ok(id, Value::Null)).await {
                        break;
                    }
                    if called == method {
                        let _ = fanout.send(ServerFrame::event(hub, event.as_str(), args));
                    }
                }
                Some(ClientFrame::Handshake { .. }) => {}
                None => break,
            },
            frame = pushed.recv() => match frame {
                Ok(frame) => {
                    if !session.push(frame).await {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}
