//! Simulated client harness.
//!
//! A swarm is a population of independent clients, each with its own
//! [`Connection`] and hub proxy against the same endpoint. Every client
//! listens for the broadcast event; exactly one of them also broadcasts
//! random messages. Clients share nothing but the shutdown signal.

use std::{
    iter,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::{Result, ensure};
use futures::future::join_all;
use rand::{Rng, RngCore, SeedableRng, rngs::StdRng, seq::SliceRandom};
use tokio::{sync::watch, task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};

use crate::{
    config::ConnectionConfig,
    connection::{Connection, ConnectionState},
    hub::HubProxy,
    transport::Connector,
    users::pick_identity,
};

const WORDS: &[&str] = &[
    "hello", "anyone", "around", "lunch", "soon", "deploy", "done", "coffee", "meeting", "moved",
    "build", "green", "again", "ship", "it", "today", "tomorrow", "later", "thanks", "everyone",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Listener,
    /// Listens and also broadcasts.
    Broadcaster,
}

#[derive(Debug, Clone)]
pub struct SwarmConfig {
    /// Listener-only clients; one broadcaster is always added on top.
    pub listeners: usize,
    pub hub: String,
    /// Method invoked by the broadcaster with `(identity, message)`.
    pub method: String,
    /// Event every client listens for, carrying `(name, message)`.
    pub event: String,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub seed: u64,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            listeners: 10,
            hub: "myHub".to_string(),
            method: "Send".to_string(),
            event: "addMessage".to_string(),
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
            seed: 0,
        }
    }
}

/// Per-client counters.
#[derive(Debug, Default)]
pub struct ClientStats {
    sent: AtomicU64,
    received: AtomicU64,
    failed: AtomicU64,
}

impl ClientStats {
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedClient {
    identity: String,
    role: Role,
    connection: Connection,
    hub: HubProxy,
    stats: Arc<ClientStats>,
}

impl SimulatedClient {
    fn new(identity: &str, role: Role, connection: Connection, config: &SwarmConfig) -> Self {
        let hub = connection.create_hub_proxy(&config.hub);
        let stats = Arc::new(ClientStats::default());

        let counter = Arc::clone(&stats);
        let listener = identity.to_string();
        hub.on::<(String, String), _>(&config.event, move |(name, message)| {
            counter.received.fetch_add(1, Ordering::Relaxed);
            debug!(%listener, %name, %message, "message received");
        });

        Self {
            identity: identity.to_string(),
            role,
            connection,
            hub,
            stats,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    async fn start(&self) {
        match self.connection.start().await {
            Ok(()) => info!(identity = %self.identity, role = ?self.role, "client connected"),
            Err(error) => {
                warn!(identity = %self.identity, %error, "client failed to connect, keeping it idle")
            }
        }
    }

    async fn run(
        self,
        config: Arc<SwarmConfig>,
        mut rng: StdRng,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            let delay = random_delay(&mut rng, config.min_delay, config.max_delay);
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = sleep(delay) => {
                    if self.role == Role::Broadcaster {
                        self.broadcast(&config.method, &mut rng).await;
                    }
                }
            }
        }
        debug!(identity = %self.identity, "client loop stopped");
    }

    async fn broadcast(&self, method: &str, rng: &mut StdRng) {
        let message = random_message(rng);
        match self
            .hub
            .send(method, (self.identity.as_str(), message.as_str()))
            .await
        {
            Ok(()) => {
                self.stats.sent.fetch_add(1, Ordering::Relaxed);
                debug!(identity = %self.identity, %message, "broadcast sent");
            }
            Err(error) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(identity = %self.identity, %error, "broadcast failed");
            }
        }
    }
}

/// A running population of simulated clients.
pub struct Swarm {
    clients: Vec<SimulatedClient>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Swarm {
    /// Connects `config.listeners + 1` clients and starts their loops.
    ///
    /// A client that fails to connect stays in the population (idle) so the
    /// others are unaffected.
    pub async fn start(
        config: SwarmConfig,
        connection_config: ConnectionConfig,
        identities: &[String],
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        ensure!(!identities.is_empty(), "no identities to simulate");
        ensure!(
            config.min_delay <= config.max_delay,
            "min delay {:?} exceeds max delay {:?}",
            config.min_delay,
            config.max_delay
        );

        let mut master = StdRng::seed_from_u64(config.seed);
        let roles =
            iter::repeat_n(Role::Listener, config.listeners).chain(iter::once(Role::Broadcaster));
        let mut clients = Vec::with_capacity(config.listeners + 1);
        let mut seeds = Vec::with_capacity(config.listeners + 1);
        for role in roles {
            let identity = pick_identity(identities, &mut master).unwrap_or("anonymous");
            let connection = Connection::new(connection_config.clone(), Arc::clone(&connector));
            clients.push(SimulatedClient::new(identity, role, connection, &config));
            seeds.push(master.next_u64());
        }

        join_all(clients.iter().map(|client| client.start())).await;

        let (shutdown, _) = watch::channel(false);
        let config = Arc::new(config);
        let tasks = clients
            .iter()
            .zip(seeds)
            .map(|(client, seed)| {
                tokio::spawn(client.clone().run(
                    Arc::clone(&config),
                    StdRng::seed_from_u64(seed),
                    shutdown.subscribe(),
                ))
            })
            .collect();

        info!(clients = clients.len(), hub = %config.hub, "swarm started");
        Ok(Self {
            clients,
            shutdown,
            tasks,
        })
    }

    pub fn clients(&self) -> &[SimulatedClient] {
        &self.clients
    }

    pub fn broadcaster(&self) -> Option<&SimulatedClient> {
        self.clients
            .iter()
            .find(|client| client.role == Role::Broadcaster)
    }

    /// Stops every connection and waits for every client loop to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        join_all(self.clients.iter().map(|client| client.connection.stop())).await;
        for result in join_all(self.tasks).await {
            if let Err(error) = result {
                warn!(%error, "client task failed");
            }
        }
        info!("swarm stopped");
    }
}

fn random_delay(rng: &mut StdRng, min: Duration, max: Duration) -> Duration {
    if min >= max {
        return min;
    }
    rng.gen_range(min..=max)
}

fn random_message(rng: &mut StdRng) -> String {
    let length = rng.gen_range(2..=6);
    (0..length)
        .filter_map(|_| WORDS.choose(&mut *rng).copied())
        .collect::<Vec<_>>()
        .join(" ")
}
