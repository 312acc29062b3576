//! Hub proxies: named views over a shared [`Connection`](crate::Connection).
//!
//! A proxy invokes server methods on its hub and registers handlers for
//! events the server pushes to that hub. Proxies created with the same hub
//! name share one handler table, so every handle observes every event.

use std::{
    any::type_name,
    collections::HashMap,
    fmt,
    future::Future,
    marker::PhantomData,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, Weak},
    task::{Context, Poll},
    time::Duration,
};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::{
    sync::oneshot,
    time::{Sleep, sleep},
};
use tracing::{debug, warn};

use crate::{
    connection::Shared,
    correlator::{Correlator, Reply},
    error::Error,
    protocol::{from_arguments, to_arguments},
};

type RawFn = dyn Fn(&[Value]) + Send + Sync;
type TypedFn = dyn Fn(&[Value]) -> serde_json::Result<()> + Send + Sync;

/// A registered event handler.
///
/// Raw handlers see the argument list as received; typed handlers decode it
/// first and fail on their own when the payload has the wrong shape.
pub enum Handler {
    Raw(Box<RawFn>),
    Typed {
        shape: &'static str,
        call: Box<TypedFn>,
    },
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Raw(_) => f.write_str("Handler::Raw"),
            Handler::Typed { shape, .. } => write!(f, "Handler::Typed({shape})"),
        }
    }
}

/// A typed handler that could not decode an event payload.
#[derive(Debug)]
pub struct DecodeFailure {
    pub shape: &'static str,
    pub error: serde_json::Error,
}

/// Handlers for one hub, keyed by lower-cased event name.
#[derive(Debug)]
pub(crate) struct HandlerTable {
    hub: String,
    events: Mutex<HashMap<String, Vec<Arc<Handler>>>>,
}

impl HandlerTable {
    pub(crate) fn new(hub: &str) -> Self {
        Self {
            hub: hub.to_string(),
            events: Mutex::new(HashMap::new()),
        }
    }

    fn add(&self, event: &str, handler: Handler) {
        self.events()
            .entry(event.to_lowercase())
            .or_default()
            .push(Arc::new(handler));
    }

    pub(crate) fn has_handlers(&self, event: &str) -> bool {
        self.events()
            .get(&event.to_lowercase())
            .is_some_and(|handlers| !handlers.is_empty())
    }

    /// Runs every handler for `event` in registration order.
    pub(crate) fn dispatch(&self, event: &str, args: &[Value]) -> Vec<DecodeFailure> {
        let handlers = self
            .events()
            .get(&event.to_lowercase())
            .cloned()
            .unwrap_or_default();

        let mut failures = Vec::new();
        for handler in handlers {
            match handler.as_ref() {
                Handler::Raw(call) => call(args),
                Handler::Typed { shape, call } => {
                    if let Err(error) = call(args) {
                        warn!(hub = %self.hub, event, shape = *shape, %error, "event payload did not decode");
                        failures.push(DecodeFailure {
                            shape: *shape,
                            error,
                        });
                    }
                }
            }
        }
        failures
    }

    fn events(&self) -> MutexGuard<'_, HashMap<String, Vec<Arc<Handler>>>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle for one hub on a connection.
///
/// The proxy only holds a weak reference to its connection: once every
/// [`Connection`](crate::Connection) handle is gone, invocations fail with
/// [`Error::Closed`].
#[derive(Clone)]
pub struct HubProxy {
    name: String,
    connection: Weak<Shared>,
    handlers: Arc<HandlerTable>,
}

impl fmt::Debug for HubProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubProxy").field("name", &self.name).finish()
    }
}

impl HubProxy {
    pub(crate) fn new(name: &str, connection: Weak<Shared>, handlers: Arc<HandlerTable>) -> Self {
        Self {
            name: name.to_string(),
            connection,
            handlers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a typed handler; the event arguments are decoded into `T`
    /// (a single value for one argument, a tuple for several).
    pub fn on<T, F>(&self, event: &str, handler: F) -> &Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let call = move |args: &[Value]| -> serde_json::Result<()> {
            handler(from_arguments::<T>(args)?);
            Ok(())
        };
        self.handlers.add(
            event,
            Handler::Typed {
                shape: type_name::<T>(),
                call: Box::new(call),
            },
        );
        self
    }

    /// Registers a handler that receives the raw argument list.
    pub fn on_raw<F>(&self, event: &str, handler: F) -> &Self
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.handlers.add(event, Handler::Raw(Box::new(handler)));
        self
    }

    /// Sends the invocation and returns a handle that resolves with the
    /// reply. Uses the connection's default timeout.
    pub async fn call<T, A>(&self, method: &str, args: A) -> Result<Invocation<T>, Error>
    where
        T: DeserializeOwned,
        A: Serialize,
    {
        let shared = self.connection()?;
        let timeout = shared.config().invoke_timeout;
        self.call_inner(&shared, method, args, timeout).await
    }

    /// Like [`call`](Self::call) with an explicit timeout; `None` waits
    /// until the reply arrives or the connection closes.
    pub async fn call_with_timeout<T, A>(
        &self,
        method: &str,
        args: A,
        timeout: Option<Duration>,
    ) -> Result<Invocation<T>, Error>
    where
        T: DeserializeOwned,
        A: Serialize,
    {
        let shared = self.connection()?;
        self.call_inner(&shared, method, args, timeout).await
    }

    /// Invokes `method` and decodes the reply into `T`.
    pub async fn invoke<T, A>(&self, method: &str, args: A) -> Result<T, Error>
    where
        T: DeserializeOwned,
        A: Serialize,
    {
        self.call(method, args).await?.await
    }

    pub async fn invoke_with_timeout<T, A>(
        &self,
        method: &str,
        args: A,
        timeout: Option<Duration>,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned,
        A: Serialize,
    {
        self.call_with_timeout(method, args, timeout).await?.await
    }

    /// Untyped invocation: raw arguments in, raw reply out.
    pub async fn invoke_raw(&self, method: &str, args: Vec<Value>) -> Result<Value, Error> {
        self.invoke::<Value, _>(method, args).await
    }

    /// Fire-and-forget invocation. Returns once the frame is written (or
    /// held for replay); the reply is awaited in the background and only
    /// logged.
    pub async fn send<A: Serialize>(&self, method: &str, args: A) -> Result<(), Error> {
        let invocation = self.call::<Value, _>(method, args).await?;
        let hub = self.name.clone();
        let method = method.to_string();
        tokio::spawn(async move {
            if let Err(error) = invocation.await {
                debug!(%hub, %method, %error, "fire-and-forget invocation failed");
            }
        });
        Ok(())
    }

    async fn call_inner<T, A>(
        &self,
        shared: &Arc<Shared>,
        method: &str,
        args: A,
        timeout: Option<Duration>,
    ) -> Result<Invocation<T>, Error>
    where
        T: DeserializeOwned,
        A: Serialize,
    {
        let args = to_arguments(args).map_err(Error::Encode)?;
        let (id, reply) = shared.invoke(&self.name, method, args).await?;
        Ok(Invocation::new(id, reply, shared.correlator(), timeout))
    }

    fn connection(&self) -> Result<Arc<Shared>, Error> {
        self.connection.upgrade().ok_or(Error::Closed)
    }
}

/// A sent invocation waiting for its reply.
///
/// Resolves with the decoded reply, the server's error, [`Error::Timeout`]
/// when the deadline passes first, or [`Error::Closed`] when the connection
/// closes first. Dropping it abandons the call.
pub struct Invocation<T> {
    id: u64,
    reply: oneshot::Receiver<Reply>,
    deadline: Option<(Duration, Pin<Box<Sleep>>)>,
    correlator: Arc<Correlator>,
    finished: bool,
    _shape: PhantomData<fn() -> T>,
}

impl<T> Invocation<T> {
    fn new(
        id: u64,
        reply: oneshot::Receiver<Reply>,
        correlator: Arc<Correlator>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            reply,
            deadline: timeout.map(|after| (after, Box::pin(sleep(after)))),
            correlator,
            finished: false,
            _shape: PhantomData,
        }
    }

    /// Correlation id assigned to this call.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T: DeserializeOwned> Future for Invocation<T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        if this.finished {
            return Poll::Ready(Err(Error::Closed));
        }

        if let Poll::Ready(reply) = Pin::new(&mut this.reply).poll(cx) {
            this.finished = true;
            let outcome = match reply {
                Ok(Ok(value)) => decode(value),
                Ok(Err(error)) => Err(error),
                // The pending entry vanished without an answer.
                Err(_) => Err(Error::Closed),
            };
            return Poll::Ready(outcome);
        }

        if let Some((after, timer)) = this.deadline.as_mut() {
            if timer.as_mut().poll(cx).is_ready() {
                this.finished = true;
                this.correlator.expire(this.id);
                debug!(id = this.id, ?after, "invocation timed out");
                return Poll::Ready(Err(Error::Timeout {
                    id: this.id,
                    after: *after,
                }));
            }
        }

        Poll::Pending
    }
}

impl<T> Drop for Invocation<T> {
    fn drop(&mut self) {
        if !self.finished && self.correlator.forget(self.id) {
            debug!(id = self.id, "invocation abandoned");
        }
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    serde_json::from_value(value).map_err(|source| Error::Decode {
        shape: type_name::<T>(),
        source,
    })
}
