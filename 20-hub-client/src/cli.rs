use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::{
    config::{ConnectionConfig, RetryPolicy, parse_key_value},
    transport::TransportSelection,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log filter, overriding RUST_LOG (e.g. `debug` or `hub_client=trace`).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a population of simulated clients; one of them broadcasts.
    Swarm(SwarmArgs),
    /// Walk through the stock ticker hub: typed calls, groups and events.
    Stocks(StocksArgs),
    /// Chat from stdin; `user:message` sends privately.
    Chat(ChatArgs),
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Hub server endpoint.
    #[arg(long, default_value = "http://localhost:8080/signalr")]
    pub url: String,

    #[arg(long, value_enum, default_value_t = TransportSelection::Auto)]
    pub transport: TransportSelection,

    /// Header sent with the handshake, as key=value. Repeatable.
    #[arg(long = "header", value_parser = parse_key_value)]
    pub headers: Vec<(String, String)>,

    /// Query pair appended to the endpoint, as key=value. Repeatable.
    #[arg(long = "query", value_parser = parse_key_value)]
    pub query: Vec<(String, String)>,

    /// Seconds without inbound traffic before the connection is reported slow.
    #[arg(long, default_value_t = 10)]
    pub heartbeat_secs: u64,

    /// Reconnection attempts after the transport drops.
    #[arg(long, default_value_t = 5)]
    pub reconnect_attempts: u32,
}

impl ConnectArgs {
    pub fn connection_config(&self) -> Result<ConnectionConfig> {
        let mut config = ConnectionConfig::parse(&self.url)?
            .with_transport(self.transport)
            .with_heartbeat_window(std::time::Duration::from_secs(self.heartbeat_secs))
            .with_retry(RetryPolicy {
                max_attempts: self.reconnect_attempts,
                ..RetryPolicy::default()
            });
        for (key, value) in &self.headers {
            config = config.with_header(key, value);
        }
        for (key, value) in &self.query {
            config = config.with_query(key, value);
        }
        Ok(config)
    }
}

#[derive(Args, Debug, Clone)]
pub struct SwarmArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    #[arg(long, default_value = "myHub")]
    pub hub: String,

    /// User list, one identity per line.
    #[arg(long, default_value = "data/users.txt")]
    pub users: PathBuf,

    /// Listener-only clients; one broadcaster is added on top.
    #[arg(long, default_value_t = 10)]
    pub listeners: usize,

    /// Seed for identities and message timing. Random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, default_value_t = 500)]
    pub min_delay_ms: u64,

    #[arg(long, default_value_t = 3000)]
    pub max_delay_ms: u64,

    /// Method the broadcaster invokes with (name, message).
    #[arg(long, default_value = "Send")]
    pub method: String,

    /// Event every client listens for.
    #[arg(long, default_value = "addMessage")]
    pub event: String,
}

#[derive(Args, Debug, Clone)]
pub struct StocksArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    #[arg(long, default_value = "stockTicker")]
    pub hub: String,

    /// Group joined after listing the stocks.
    #[arg(long, default_value = "SomeRandomGroup")]
    pub group: String,

    /// Symbol added with `AddStock`.
    #[arg(long, default_value = "XYZ")]
    pub symbol: String,
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    #[arg(long, default_value = "myHub")]
    pub hub: String,

    /// Name attached to outgoing messages.
    #[arg(long, default_value = "NetClient")]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn shared_options_build_a_connection_config() {
        let cli = Cli::parse_from([
            "hub-client",
            "chat",
            "--url",
            "http://localhost:8080/signalr",
            "--transport",
            "server-push",
            "--header",
            "token=NetClient",
            "--query",
            "hub=myHub",
            "--reconnect-attempts",
            "2",
        ]);
        let Command::Chat(args) = cli.command else {
            panic!("expected chat subcommand");
        };

        let config = args.connect.connection_config().unwrap();
        assert_eq!(config.transport, TransportSelection::ServerPush);
        assert_eq!(config.headers.get("token").map(String::as_str), Some("NetClient"));
        assert_eq!(config.endpoint.query(), Some("hub=myHub"));
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(args.name, "NetClient");
    }

    #[test]
    fn malformed_header_is_rejected() {
        let parsed = Cli::try_parse_from(["hub-client", "stocks", "--header", "novalue"]);
        assert!(parsed.is_err());
    }
}
