//! Client engine for a real-time pub/sub-over-RPC hub server.
//!
//! One [`Connection`] multiplexes any number of named hubs over a single
//! negotiated transport. Each module covers one concern:
//!
//! - [`connection`] runs the lifecycle state machine: negotiation with
//!   fallback, reconnection with replay, heartbeat and event dispatch.
//! - [`hub`] provides [`HubProxy`] for invocations and event handlers.
//! - [`correlator`] matches replies to pending invocations by id.
//! - [`transport`] defines the pluggable transport seam plus TCP and
//!   in-memory implementations.
//! - [`protocol`] holds the frames and the JSON line codec.
//! - [`swarm`] runs populations of simulated clients against one hub.
//! - [`config`], [`cli`], [`demo`] and [`users`] back the console binary.
//!
//! The library never installs a tracing subscriber; the owner does.

pub mod cli;
pub mod config;
pub mod connection;
pub mod correlator;
pub mod demo;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod swarm;
pub mod transport;
pub mod users;

pub use config::{ConnectionConfig, RetryPolicy};
pub use connection::{Connection, ConnectionState, LifecycleEvent};
pub use error::{Error, TransportError};
pub use hub::{HubProxy, Invocation};
pub use transport::{TransportKind, TransportSelection};
