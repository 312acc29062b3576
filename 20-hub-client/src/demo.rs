//! Console flows behind the `swarm`, `stocks` and `chat` subcommands.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    select,
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::{
    cli::{ChatArgs, StocksArgs, SwarmArgs},
    connection::{Connection, LifecycleEvent},
    swarm::{Swarm, SwarmConfig},
    transport::tcp::TcpConnector,
    users::load_identities,
};

/// A quote as exchanged with the stock ticker hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Stock {
    pub symbol: String,
    #[serde(default)]
    pub price: f64,
}

pub async fn swarm(args: SwarmArgs) -> Result<()> {
    let identities = load_identities(&args.users)?;
    info!(count = identities.len(), users = %args.users.display(), "loaded identities");

    let config = SwarmConfig {
        listeners: args.listeners,
        hub: args.hub.clone(),
        method: args.method.clone(),
        event: args.event.clone(),
        min_delay: Duration::from_millis(args.min_delay_ms),
        max_delay: Duration::from_millis(args.max_delay_ms),
        seed: args.seed.unwrap_or_else(rand::random),
    };
    info!(seed = config.seed, "starting swarm");

    let swarm = Swarm::start(
        config,
        args.connect.connection_config()?,
        &identities,
        Arc::new(TcpConnector::default()),
    )
    .await?;

    wait_for_ctrl_c().await;

    for client in swarm.clients() {
        let stats = client.stats();
        println!(
            "{:<24} {:?} {:<12} sent={} received={} failed={}",
            client.identity(),
            client.role(),
            client.state(),
            stats.sent(),
            stats.received(),
            stats.failed()
        );
    }
    swarm.shutdown().await;
    Ok(())
}

pub async fn stocks(args: StocksArgs) -> Result<()> {
    let connection = Connection::new(
        args.connect.connection_config()?,
        Arc::new(TcpConnector::default()),
    );
    let hub = connection.create_hub_proxy(&args.hub);

    hub.on::<Stock, _>("UpdateStockPrice", |stock| {
        println!("Symbol {} Price {}", stock.symbol, stock.price);
    })
    .on_raw("UpdateStockPrice", |args| {
        println!("Stock update (raw): {}", Value::Array(args.to_vec()));
    })
    .on_raw("Notify", |_| println!("Notified!"));

    let printer = print_lifecycle(connection.lifecycle());
    connection
        .start()
        .await
        .with_context(|| format!("failed to connect to {}", args.connect.url))?;

    match hub.invoke::<Vec<Stock>, _>("GetAllStocks", ()).await {
        Ok(stocks) => {
            for stock in stocks {
                println!("Symbol: {} price: {}", stock.symbol, stock.price);
            }
        }
        Err(error) => println!("Error invoking GetAllStocks: {error}"),
    }

    hub.send("JoinGroup", args.group.as_str())
        .await
        .context("failed to join group")?;

    let added = Stock {
        symbol: args.symbol.clone(),
        price: 0.0,
    };
    match hub.invoke::<Vec<Stock>, _>("AddStock", added).await {
        Ok(stocks) => println!(
            "AddStock returned: {}",
            stocks
                .iter()
                .map(|stock| stock.symbol.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Err(error) => println!("Error invoking AddStock: {error}"),
    }

    wait_for_ctrl_c().await;
    connection.stop().await;
    printer.abort();
    Ok(())
}

pub async fn chat(args: ChatArgs) -> Result<()> {
    let connection = Connection::new(
        args.connect.connection_config()?,
        Arc::new(TcpConnector::default()),
    );
    let hub = connection.create_hub_proxy(&args.hub);
    hub.on::<(String, String), _>("addMessage", |(name, message)| {
        println!("{name}: {message}");
    });

    let mut lifecycle = connection.lifecycle();
    connection
        .start()
        .await
        .with_context(|| format!("failed to connect to {}", args.connect.url))?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        select! {
            line = stdin.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line.eq_ignore_ascii_case("/quit") {
                    break;
                }
                let sent = match line.split_once(':') {
                    Some((user, message)) => {
                        hub.send("SendToUser", (user, args.name.as_str(), message)).await
                    }
                    None => hub.send("Send", (args.name.as_str(), line)).await,
                };
                if let Err(error) = sent {
                    eprintln!("!!! {error}");
                }
            }
            event = lifecycle.recv() => match event {
                Ok(event) => {
                    println!("*** {}", describe(&event));
                    if matches!(event, LifecycleEvent::Closed(_)) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed lifecycle events"),
                Err(RecvError::Closed) => break,
            },
            _ = wait_for_ctrl_c() => break,
        }
    }

    connection.stop().await;
    Ok(())
}

/// Console text for a lifecycle event.
pub fn describe(event: &LifecycleEvent) -> String {
    match event {
        LifecycleEvent::Slow => "Connection problems.".to_string(),
        LifecycleEvent::Reconnecting { attempt } => format!("Reconnecting (attempt {attempt})..."),
        LifecycleEvent::Reconnected => "Reconnected.".to_string(),
        LifecycleEvent::Error(detail) => format!("Hub error: {detail}"),
        LifecycleEvent::Closed(None) => "Connection closed.".to_string(),
        LifecycleEvent::Closed(Some(detail)) => format!("Connection closed: {detail}"),
    }
}

fn print_lifecycle(mut events: broadcast::Receiver<LifecycleEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("*** {}", describe(&event)),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed lifecycle events"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn wait_for_ctrl_c() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "ctrl-c handler failed");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn stock_uses_pascal_case_fields() {
        let stock: Stock = serde_json::from_value(json!({"Symbol": "MSFT", "Price": 31.5})).unwrap();
        assert_eq!(
            stock,
            Stock {
                symbol: "MSFT".into(),
                price: 31.5
            }
        );

        let encoded = serde_json::to_value(Stock {
            symbol: "XYZ".into(),
            price: 0.0,
        })
        .unwrap();
        assert_eq!(encoded, json!({"Symbol": "XYZ", "Price": 0.0}));
    }

    #[test]
    fn price_defaults_when_missing() {
        let stock: Stock = serde_json::from_value(json!({"Symbol": "XYZ"})).unwrap();
        assert_eq!(stock.price, 0.0);
    }

    #[test]
    fn lifecycle_events_read_like_console_messages() {
        assert_eq!(describe(&LifecycleEvent::Slow), "Connection problems.");
        assert_eq!(
            describe(&LifecycleEvent::Reconnecting { attempt: 2 }),
            "Reconnecting (attempt 2)..."
        );
        assert_eq!(
            describe(&LifecycleEvent::Closed(Some("gave up".into()))),
            "Connection closed: gave up"
        );
    }
}
