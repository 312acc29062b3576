//! Connection configuration.

use std::{collections::HashMap, time::Duration};

use anyhow::{Context, Result, anyhow};
use url::Url;

use crate::transport::{TransportKind, TransportSelection};

/// Reconnection behaviour after an abrupt transport drop.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts before the connection is closed with a terminal failure.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given attempt (1-indexed). Any delay that does not
    /// fit in a `Duration` is `max_backoff`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let steps = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(steps);
        Duration::try_from_secs_f64(scaled)
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff))
    }
}

/// Everything a [`Connection`](crate::Connection) needs before `start()`.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub endpoint: Url,
    /// Sent with the handshake; never interpreted by the connection.
    pub headers: HashMap<String, String>,
    pub transport: TransportSelection,
    /// Order tried when `transport` is [`TransportSelection::Auto`].
    pub fallback: Vec<TransportKind>,
    pub retry: RetryPolicy,
    /// Silence longer than this while connected raises a `slow` event.
    pub heartbeat_window: Duration,
    /// Frames held while reconnecting before sends fail with backpressure.
    pub max_queue_depth: usize,
    /// Applied to invocations that don't pass their own timeout.
    pub invoke_timeout: Option<Duration>,
}

impl ConnectionConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            headers: HashMap::new(),
            transport: TransportSelection::Auto,
            fallback: TransportKind::FALLBACK_ORDER.to_vec(),
            retry: RetryPolicy::default(),
            heartbeat_window: Duration::from_secs(10),
            max_queue_depth: 256,
            invoke_timeout: Some(Duration::from_secs(30)),
        }
    }

    pub fn parse(endpoint: &str) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("invalid endpoint url '{endpoint}'"))?;
        Ok(Self::new(endpoint))
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Appends a query pair to the endpoint (e.g. a hub selection hint).
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.endpoint.query_pairs_mut().append_pair(key, value);
        self
    }

    pub fn with_transport(mut self, transport: TransportSelection) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_fallback(mut self, fallback: Vec<TransportKind>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_heartbeat_window(mut self, window: Duration) -> Self {
        self.heartbeat_window = window;
        self
    }

    pub fn with_max_queue_depth(mut self, depth: usize) -> Self {
        self.max_queue_depth = depth;
        self
    }

    pub fn with_invoke_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    /// Transport kinds to try, in order.
    pub fn candidates(&self) -> Vec<TransportKind> {
        match self.transport.kind() {
            Some(kind) => vec![kind],
            None => self.fallback.clone(),
        }
    }
}

/// Parses a `key=value` pair as given on the command line.
pub fn parse_key_value(entry: &str) -> Result<(String, String)> {
    let Some((key, value)) = entry.split_once('=') else {
        return Err(anyhow!("invalid entry '{entry}', expected key=value"));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("invalid entry '{entry}', key is empty"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
