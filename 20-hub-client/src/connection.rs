//! The logical connection: lifecycle state machine, negotiation with
//! fallback, reconnection with replay, heartbeat and event dispatch.
//!
//! All state transitions happen while holding the `core` lock, so `start`,
//! `stop`, sends and the background driver never interleave mid-transition.
//! Background tasks only hold a [`Weak`] reference plus the epoch they were
//! spawned for; `stop` bumps the epoch, which retires them even if they are
//! between two awaits.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, Weak,
        atomic::{AtomicU32, AtomicU64, Ordering},
    },
    time::Duration,
};

use serde_json::Value;
use tokio::{
    sync::{Mutex as AsyncMutex, broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
    time::{Instant, sleep, sleep_until},
};
use tracing::{debug, info, warn};

use crate::{
    config::ConnectionConfig,
    correlator::{Correlator, Reply},
    error::{Error, TransportError},
    hub::{HandlerTable, HubProxy},
    protocol::{ClientFrame, LifecycleKind, ServerFrame},
    transport::{
        ConnectRequest, Connector, OpenedTransport, Transport, TransportDescriptor, TransportEvent,
    },
};

const LIFECYCLE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Negotiating,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Negotiating => "negotiating",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Notifications published to lifecycle subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Nothing arrived within the heartbeat window. Raised once per stall.
    Slow,
    Reconnecting { attempt: u32 },
    Reconnected,
    /// A non-fatal problem: a malformed frame, an event payload that failed
    /// to decode, or an error pushed by the server.
    Error(String),
    /// Terminal; carries the failure when the close was not requested.
    Closed(Option<String>),
}

/// Handle to one logical connection. Cheap to clone; every clone drives the
/// same connection.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.shared.config.endpoint.as_str())
            .field("state", &self.state())
            .finish()
    }
}

impl Connection {
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (lifecycle_tx, _) = broadcast::channel(LIFECYCLE_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                config,
                connector,
                core: AsyncMutex::new(Core::default()),
                correlator: Arc::new(Correlator::new()),
                hubs: Mutex::new(HashMap::new()),
                lanes: Mutex::new(HashMap::new()),
                descriptor: Mutex::new(None),
                activity: Mutex::new(Activity {
                    last: Instant::now(),
                    slow_reported: false,
                }),
                epoch: AtomicU64::new(0),
                reconnect_attempts: AtomicU32::new(0),
                state_tx,
                lifecycle_tx,
            }),
        }
    }

    /// Negotiates a transport and connects. Valid from `Idle` or `Closed`;
    /// on failure the connection is back in `Idle`.
    pub async fn start(&self) -> Result<(), Error> {
        let shared = &self.shared;
        let mut core = shared.core.lock().await;
        let state = shared.state();
        if !matches!(state, ConnectionState::Idle | ConnectionState::Closed) {
            return Err(Error::InvalidState(state));
        }

        let epoch = shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        shared.reconnect_attempts.store(0, Ordering::SeqCst);
        shared.set_state(ConnectionState::Negotiating);

        let (descriptor, opened) = match shared.negotiate_and_open().await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(endpoint = %shared.config.endpoint, %error, "connection failed to start");
                shared.set_state(ConnectionState::Idle);
                return Err(error);
            }
        };

        info!(
            endpoint = %descriptor.endpoint,
            transport = %descriptor.kind,
            "connection established"
        );
        *lock(&shared.descriptor) = Some(descriptor);
        core.transport = Some(Arc::from(opened.transport));
        shared.touch();
        shared.set_state(ConnectionState::Connected);

        core.driver = Some(tokio::spawn(drive(
            Arc::downgrade(shared),
            epoch,
            opened.inbound,
        )));
        let window = shared.config.heartbeat_window;
        if !window.is_zero() {
            core.heartbeat = Some(tokio::spawn(heartbeat(
                Arc::downgrade(shared),
                epoch,
                window,
            )));
        }
        Ok(())
    }

    /// Closes the connection and fails every pending invocation with
    /// [`Error::Closed`]. Calling it again, or on a connection that never
    /// started, is a no-op apart from settling in `Closed`.
    pub async fn stop(&self) {
        let shared = &self.shared;
        let mut core = shared.core.lock().await;
        let previous = shared.state();
        shared.epoch.fetch_add(1, Ordering::SeqCst);
        shared.close_session(&mut core, true).await;
        shared.set_state(ConnectionState::Closed);

        if !matches!(previous, ConnectionState::Idle | ConnectionState::Closed) {
            info!(endpoint = %shared.config.endpoint, "connection stopped");
            shared.emit(LifecycleEvent::Closed(None));
        }
    }

    /// Returns a proxy for `hub`. Names match case-insensitively; proxies for
    /// the same hub share their handlers.
    pub fn create_hub_proxy(&self, hub: &str) -> HubProxy {
        let handlers = lock(&self.shared.hubs)
            .entry(hub.to_lowercase())
            .or_insert_with(|| Arc::new(HandlerTable::new(hub)))
            .clone();
        HubProxy::new(hub, Arc::downgrade(&self.shared), handlers)
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Observes state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Subscribes to lifecycle events raised from now on.
    pub fn lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.shared.lifecycle_tx.subscribe()
    }

    /// The transport chosen by the last successful negotiation.
    pub fn transport(&self) -> Option<TransportDescriptor> {
        lock(&self.shared.descriptor).clone()
    }

    /// Attempt number of the reconnection in progress; zero when none is.
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// When the last inbound frame arrived.
    pub fn last_activity(&self) -> Instant {
        lock(&self.shared.activity).last
    }

    pub fn pending_invocations(&self) -> usize {
        self.shared.correlator.pending_count()
    }

    /// Frames held for replay after reconnection.
    pub async fn queued_frames(&self) -> usize {
        self.shared.core.lock().await.queue.len()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }
}

pub(crate) struct Shared {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    core: AsyncMutex<Core>,
    correlator: Arc<Correlator>,
    hubs: Mutex<HashMap<String, Arc<HandlerTable>>>,
    lanes: Mutex<HashMap<(String, String), mpsc::UnboundedSender<Vec<Value>>>>,
    descriptor: Mutex<Option<TransportDescriptor>>,
    activity: Mutex<Activity>,
    epoch: AtomicU64,
    reconnect_attempts: AtomicU32,
    state_tx: watch::Sender<ConnectionState>,
    lifecycle_tx: broadcast::Sender<LifecycleEvent>,
}

#[derive(Default)]
struct Core {
    transport: Option<Arc<dyn Transport>>,
    /// Frames written while reconnecting, replayed in order.
    queue: VecDeque<ClientFrame>,
    driver: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

struct Activity {
    last: Instant,
    slow_reported: bool,
}

impl Shared {
    pub(crate) fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub(crate) fn correlator(&self) -> Arc<Correlator> {
        Arc::clone(&self.correlator)
    }

    /// Registers a pending invocation and writes (or holds) its frame.
    pub(crate) async fn invoke(
        &self,
        hub: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<(u64, oneshot::Receiver<Reply>), Error> {
        if matches!(
            self.state(),
            ConnectionState::Idle | ConnectionState::Closed
        ) {
            return Err(Error::Closed);
        }

        let (id, reply) = self.correlator.register(hub, method, args.clone());
        let frame = ClientFrame::Invoke {
            id,
            hub: hub.to_string(),
            method: method.to_string(),
            args,
        };
        if let Err(error) = self.send(frame).await {
            self.correlator.forget(id);
            return Err(error);
        }
        Ok((id, reply))
    }

    /// The core lock only guards the state decision; the write itself runs
    /// unlocked so a stalled peer cannot hold up `stop` or other senders.
    async fn send(&self, frame: ClientFrame) -> Result<(), Error> {
        loop {
            let transport = {
                let mut core = self.core.lock().await;
                match self.state() {
                    ConnectionState::Connected => match core.transport.clone() {
                        Some(transport) => transport,
                        None => return self.hold(&mut core, frame),
                    },
                    ConnectionState::Reconnecting => return self.hold(&mut core, frame),
                    ConnectionState::Idle | ConnectionState::Closed => return Err(Error::Closed),
                    state => return Err(Error::InvalidState(state)),
                }
            };

            let Err(error) = transport.send(frame.clone()).await else {
                return Ok(());
            };

            let mut core = self.core.lock().await;
            let unchanged = core
                .transport
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, &transport));
            if unchanged {
                // The driver sees the drop and reconnects; keep the frame
                // for replay.
                warn!(%error, "send failed, holding frame for replay");
                return self.hold(&mut core, frame);
            }
            debug!(%error, "transport changed during send, retrying");
        }
    }

    fn hold(&self, core: &mut Core, frame: ClientFrame) -> Result<(), Error> {
        let depth = core.queue.len();
        if depth >= self.config.max_queue_depth {
            return Err(Error::Backpressure { depth });
        }
        core.queue.push_back(frame);
        Ok(())
    }

    async fn negotiate_and_open(&self) -> Result<(TransportDescriptor, OpenedTransport), Error> {
        let request = self.connect_request();
        let supported = self
            .connector
            .negotiate(&request)
            .await
            .map_err(|error| Error::Negotiation(error.to_string()))?;

        let mut candidates = self.config.candidates();
        if let Some(kinds) = &supported {
            candidates.retain(|kind| kinds.contains(kind));
        }
        if candidates.is_empty() {
            return Err(Error::Negotiation(format!(
                "no acceptable transport (configured {:?}, server declared {:?})",
                self.config.candidates(),
                supported
            )));
        }

        self.set_state(ConnectionState::Connecting);
        let mut failures = Vec::new();
        for kind in candidates {
            match self.connector.open(kind, &request).await {
                Ok(opened) => {
                    let descriptor = TransportDescriptor {
                        kind,
                        supported,
                        endpoint: self.config.endpoint.clone(),
                    };
                    return Ok((descriptor, opened));
                }
                Err(error) => {
                    warn!(%kind, %error, "transport failed to open, trying the next one");
                    failures.push(format!("{kind}: {error}"));
                }
            }
        }

        Err(Error::Connection {
            endpoint: self.config.endpoint.to_string(),
            detail: failures.join("; "),
        })
    }

    /// Keeps reopening the negotiated transport kind until it succeeds or the
    /// retry policy runs out. Returns the new inbound stream on success.
    async fn reconnect(
        &self,
        epoch: u64,
        detail: &str,
    ) -> Option<mpsc::Receiver<TransportEvent>> {
        {
            let mut core = self.core.lock().await;
            if !self.is_current(epoch) {
                return None;
            }
            if let Some(transport) = core.transport.take() {
                transport.close().await;
            }
            warn!(endpoint = %self.config.endpoint, detail, "transport dropped, reconnecting");
            self.set_state(ConnectionState::Reconnecting);
        }

        let kind = lock(&self.descriptor).as_ref().map(|descriptor| descriptor.kind)?;
        let request = self.connect_request();
        let policy = &self.config.retry;

        for attempt in 1..=policy.max_attempts {
            self.reconnect_attempts.store(attempt, Ordering::SeqCst);
            self.emit(LifecycleEvent::Reconnecting { attempt });
            sleep(policy.backoff_for_attempt(attempt)).await;
            if !self.is_current(epoch) {
                return None;
            }

            let opened = match self.connector.open(kind, &request).await {
                Ok(opened) => opened,
                Err(error) => {
                    warn!(attempt, %kind, %error, "reconnection attempt failed");
                    continue;
                }
            };

            let mut core = self.core.lock().await;
            let transport: Arc<dyn Transport> = Arc::from(opened.transport);
            if !self.is_current(epoch) {
                transport.close().await;
                return None;
            }
            if let Err(error) = replay(&mut core.queue, transport.as_ref()).await {
                warn!(attempt, %error, "replay after reconnection failed");
                transport.close().await;
                continue;
            }

            core.transport = Some(transport);
            self.touch();
            self.reconnect_attempts.store(0, Ordering::SeqCst);
            self.set_state(ConnectionState::Connected);
            info!(endpoint = %self.config.endpoint, attempt, "reconnected");
            self.emit(LifecycleEvent::Reconnected);
            return Some(opened.inbound);
        }

        let failure = Error::ReconnectExhausted {
            attempts: policy.max_attempts,
        };
        warn!(endpoint = %self.config.endpoint, error = %failure, "giving up");
        self.finish(epoch, Some(failure.to_string())).await;
        None
    }

    /// Terminal close initiated by the server or by exhausted retries.
    async fn finish(&self, epoch: u64, failure: Option<String>) {
        let mut core = self.core.lock().await;
        if !self.is_current(epoch) {
            return;
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.close_session(&mut core, false).await;
        self.set_state(ConnectionState::Closed);
        info!(endpoint = %self.config.endpoint, ?failure, "connection closed");
        self.emit(LifecycleEvent::Closed(failure));
    }

    /// Tears down everything owned by the current session. The caller holds
    /// the core lock and has already bumped the epoch.
    async fn close_session(&self, core: &mut Core, abort_driver: bool) {
        if let Some(task) = core.heartbeat.take() {
            task.abort();
        }
        if let Some(task) = core.driver.take() {
            if abort_driver {
                task.abort();
            }
        }
        if let Some(transport) = core.transport.take() {
            transport.close().await;
        }
        let dropped = core.queue.len();
        core.queue.clear();
        if dropped > 0 {
            debug!(dropped, "discarded frames held for replay");
        }
        lock(&self.lanes).clear();
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        self.correlator.fail_all();
    }

    /// Returns `true` when the frame ends the connection.
    fn handle_frame(self: &Arc<Self>, epoch: u64, frame: ServerFrame) -> bool {
        match frame {
            ServerFrame::Reply { id, result, error } => {
                let reply = match error {
                    Some(message) => Err(Error::Remote(message)),
                    None => Ok(result.unwrap_or(Value::Null)),
                };
                self.correlator.resolve(id, reply);
            }
            ServerFrame::Event { hub, event, args } => self.dispatch(epoch, &hub, &event, args),
            ServerFrame::Lifecycle { kind, detail } => match kind {
                LifecycleKind::Closed => return true,
                LifecycleKind::Error => {
                    let detail = detail.unwrap_or_else(|| "server reported an error".to_string());
                    warn!(%detail, "server reported an error");
                    self.emit(LifecycleEvent::Error(detail));
                }
                LifecycleKind::Slow => self.emit(LifecycleEvent::Slow),
                LifecycleKind::Reconnecting | LifecycleKind::Reconnected => {
                    debug!(?kind, "ignoring server reconnection hint");
                }
            },
        }
        false
    }

    /// Hands an event to the lane of its (hub, event) pair. Each lane runs
    /// its handlers on its own task, so events for one pair are delivered in
    /// arrival order while a slow handler never stalls the inbound stream.
    fn dispatch(self: &Arc<Self>, epoch: u64, hub: &str, event: &str, args: Vec<Value>) {
        let hub_key = hub.to_lowercase();
        let Some(table) = lock(&self.hubs).get(&hub_key).cloned() else {
            debug!(hub, event, "no proxy for hub, dropping event");
            return;
        };
        if !table.has_handlers(event) {
            debug!(hub, event, "no handler registered, dropping event");
            return;
        }

        let mut lanes = lock(&self.lanes);
        let lane = lanes
            .entry((hub_key, event.to_lowercase()))
            .or_insert_with(|| spawn_lane(Arc::downgrade(self), epoch, table, event.to_string()));
        if lane.send(args).is_err() {
            debug!(hub, event, "dispatch lane is gone, dropping event");
        }
    }

    fn check_liveness(&self, window: Duration) {
        let mut activity = lock(&self.activity);
        if activity.slow_reported || activity.last.elapsed() < window {
            return;
        }
        if self.state() != ConnectionState::Connected {
            return;
        }
        activity.slow_reported = true;
        drop(activity);

        warn!(endpoint = %self.config.endpoint, ?window, "connection is slow");
        self.emit(LifecycleEvent::Slow);
    }

    /// Silence is only measured while connected; in any other state the
    /// check is simply pushed a full window ahead.
    fn next_liveness_check(&self, window: Duration) -> Instant {
        let activity = lock(&self.activity);
        if activity.slow_reported || self.state() != ConnectionState::Connected {
            Instant::now() + window
        } else {
            activity.last + window
        }
    }

    fn touch(&self) {
        let mut activity = lock(&self.activity);
        activity.last = Instant::now();
        activity.slow_reported = false;
    }

    fn connect_request(&self) -> ConnectRequest {
        ConnectRequest {
            endpoint: self.config.endpoint.clone(),
            headers: self
                .config
                .headers
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "connection state changed");
        }
    }

    fn emit(&self, event: LifecycleEvent) {
        debug!(?event, "lifecycle event");
        // No subscribers is fine.
        let _ = self.lifecycle_tx.send(event);
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        for task in [core.driver.take(), core.heartbeat.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

async fn replay(
    queue: &mut VecDeque<ClientFrame>,
    transport: &dyn Transport,
) -> Result<(), TransportError> {
    let total = queue.len();
    while let Some(frame) = queue.pop_front() {
        if let Err(error) = transport.send(frame.clone()).await {
            queue.push_front(frame);
            return Err(error);
        }
    }
    if total > 0 {
        debug!(total, "replayed held frames");
    }
    Ok(())
}

/// Drains the inbound side of the transport for one session.
async fn drive(weak: Weak<Shared>, epoch: u64, mut inbound: mpsc::Receiver<TransportEvent>) {
    loop {
        let event = inbound.recv().await;
        let Some(shared) = weak.upgrade() else {
            return;
        };
        if !shared.is_current(epoch) {
            return;
        }

        match event {
            Some(TransportEvent::Frame(frame)) => {
                shared.touch();
                if shared.handle_frame(epoch, frame) {
                    shared.finish(epoch, None).await;
                    return;
                }
            }
            Some(TransportEvent::Malformed(detail)) => {
                warn!(%detail, "discarding malformed frame");
                shared.emit(LifecycleEvent::Error(format!("malformed frame: {detail}")));
            }
            Some(TransportEvent::Closed) => {
                shared.finish(epoch, None).await;
                return;
            }
            Some(TransportEvent::Dropped(detail)) => match shared.reconnect(epoch, &detail).await {
                Some(next) => inbound = next,
                None => return,
            },
            None => match shared.reconnect(epoch, "inbound stream ended").await {
                Some(next) => inbound = next,
                None => return,
            },
        }
    }
}

async fn heartbeat(weak: Weak<Shared>, epoch: u64, window: Duration) {
    loop {
        let next = {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if !shared.is_current(epoch) {
                return;
            }
            shared.next_liveness_check(window)
        };
        sleep_until(next).await;

        let Some(shared) = weak.upgrade() else {
            return;
        };
        if !shared.is_current(epoch) {
            return;
        }
        shared.check_liveness(window);
    }
}

fn spawn_lane(
    weak: Weak<Shared>,
    epoch: u64,
    table: Arc<HandlerTable>,
    event: String,
) -> mpsc::UnboundedSender<Vec<Value>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Value>>();
    tokio::spawn(async move {
        while let Some(args) = rx.recv().await {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if !shared.is_current(epoch) {
                return;
            }
            for failure in table.dispatch(&event, &args) {
                shared.emit(LifecycleEvent::Error(format!(
                    "handler for '{event}' expected {}: {}",
                    failure.shape, failure.error
                )));
            }
        }
    });
    tx
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryConnector;

    fn connection(connector: &MemoryConnector) -> Connection {
        let config = ConnectionConfig::parse("memory://hub/signalr").unwrap();
        Connection::new(config, Arc::new(connector.clone()))
    }

    #[test]
    fn state_names_are_lowercase() {
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
        assert_eq!(
            Error::InvalidState(ConnectionState::Connected).to_string(),
            "operation is not valid while the connection is connected"
        );
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let connector = MemoryConnector::new();
        let connection = connection(&connector);
        connection.start().await.expect("start");
        assert!(matches!(
            connection.start().await,
            Err(Error::InvalidState(ConnectionState::Connected))
        ));
        connection.stop().await;
    }

    #[tokio::test]
    async fn stop_before_start_settles_in_closed_without_event() {
        let connector = MemoryConnector::new();
        let connection = connection(&connector);
        let mut lifecycle = connection.lifecycle();

        connection.stop().await;
        connection.stop().await;

        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(lifecycle.try_recv().is_err());
    }

    #[tokio::test]
    async fn negotiation_failure_returns_to_idle() {
        let connector = MemoryConnector::new();
        connector.fail_negotiation("server unavailable");
        let connection = connection(&connector);

        assert!(matches!(connection.start().await, Err(Error::Negotiation(_))));
        assert_eq!(connection.state(), ConnectionState::Idle);
        assert!(connection.transport().is_none());
    }

    #[tokio::test]
    async fn hub_names_are_case_insensitive() {
        let connector = MemoryConnector::new();
        let connection = connection(&connector);
        let first = connection.create_hub_proxy("StockTicker");
        let second = connection.create_hub_proxy("stockticker");
        first.on_raw("tick", |_| {});
        assert!(lock(&connection.shared.hubs)["stockticker"].has_handlers("TICK"));
        assert_eq!(second.name(), "stockticker");
    }
}
