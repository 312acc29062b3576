mod common;

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use hub_client::{
    Connection, Error, LifecycleEvent,
    demo::Stock,
    protocol::ServerFrame,
    transport::memory::{MemoryConnector, MemorySession},
};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde_json::{Value, json};
use tokio::{sync::mpsc, time::timeout};

use common::{WAIT, accept, memory_config, next_event, next_invoke};

async fn connected() -> Result<(Connection, MemorySession)> {
    let connector = MemoryConnector::new();
    let connection = Connection::new(memory_config(), Arc::new(connector.clone()));
    connection.start().await?;
    let session = accept(&connector).await?;
    Ok((connection, session))
}

#[tokio::test]
async fn add_stock_returns_the_typed_list() -> Result<()> {
    let (connection, mut session) = connected().await?;
    let hub = connection.create_hub_proxy("stockTicker");

    let server = async {
        let (id, hub_name, method, args) = next_invoke(&mut session).await?;
        assert_eq!(hub_name, "stockTicker");
        assert_eq!(method, "AddStock");
        assert_eq!(args, vec![json!({"Symbol": "XYZ", "Price": 0.0})]);
        session
            .push(ServerFrame::reply_ok(id, json!([{"Symbol": "XYZ", "Price": 0.0}])))
            .await;
        anyhow::Ok(())
    };
    let added = Stock {
        symbol: "XYZ".into(),
        price: 0.0,
    };
    let (stocks, served) = tokio::join!(hub.invoke::<Vec<Stock>, _>("AddStock", added.clone()), server);
    served?;

    assert_eq!(stocks?, vec![added]);
    connection.stop().await;
    Ok(())
}

#[tokio::test]
async fn concurrent_invocations_each_get_their_own_reply() -> Result<()> {
    const CALLERS: u32 = 16;
    let (connection, mut session) = connected().await?;
    let hub = connection.create_hub_proxy("myHub");

    let callers: Vec<_> = (0..CALLERS)
        .map(|n| {
            let hub = hub.clone();
            tokio::spawn(async move { (n, hub.invoke::<u32, _>("Echo", n).await) })
        })
        .collect();

    let mut received = Vec::new();
    for _ in 0..CALLERS {
        let (id, _, _, args) = next_invoke(&mut session).await?;
        received.push((id, args));
    }
    received.shuffle(&mut StdRng::seed_from_u64(7));
    for (id, args) in received {
        session.push(ServerFrame::reply_ok(id, args[0].clone())).await;
    }

    for caller in callers {
        let (sent, echoed) = timeout(WAIT, caller).await??;
        assert_eq!(echoed?, sent);
    }
    assert_eq!(connection.pending_invocations(), 0);
    connection.stop().await;
    Ok(())
}

#[tokio::test]
async fn remote_errors_reach_only_their_caller() -> Result<()> {
    let (connection, mut session) = connected().await?;
    let hub = connection.create_hub_proxy("stockTicker");

    let failing = hub.call::<Vec<Stock>, _>("GetAllStocks", ()).await?;
    let healthy = hub.call::<Vec<Stock>, _>("GetAllStocks", ()).await?;
    let (failing_id, ..) = next_invoke(&mut session).await?;
    let (healthy_id, ..) = next_invoke(&mut session).await?;

    session
        .push(ServerFrame::reply_err(failing_id, "market closed"))
        .await;
    session
        .push(ServerFrame::reply_ok(healthy_id, json!([])))
        .await;

    assert!(matches!(failing.await, Err(Error::Remote(message)) if message == "market closed"));
    assert!(healthy.await?.is_empty());
    connection.stop().await;
    Ok(())
}

#[tokio::test]
async fn mismatched_reply_is_a_decode_error() -> Result<()> {
    let (connection, mut session) = connected().await?;
    let hub = connection.create_hub_proxy("stockTicker");

    let call = hub.call::<Vec<Stock>, _>("GetAllStocks", ()).await?;
    let (id, ..) = next_invoke(&mut session).await?;
    session
        .push(ServerFrame::reply_ok(id, json!({"unexpected": true})))
        .await;

    assert!(matches!(call.await, Err(Error::Decode { .. })));
    assert_eq!(connection.state(), hub_client::ConnectionState::Connected);
    connection.stop().await;
    Ok(())
}

#[tokio::test]
async fn timed_out_invocation_ignores_the_late_reply() -> Result<()> {
    let (connection, mut session) = connected().await?;
    let hub = connection.create_hub_proxy("myHub");

    let result = hub
        .invoke_with_timeout::<Value, _>("Slow", (), Some(Duration::from_millis(50)))
        .await;
    assert!(matches!(result, Err(Error::Timeout { .. })));
    assert_eq!(connection.pending_invocations(), 0);

    let (late_id, ..) = next_invoke(&mut session).await?;
    session
        .push(ServerFrame::reply_ok(late_id, json!("too late")))
        .await;

    let next = hub.call::<String, _>("Echo", "hi").await?;
    let (id, ..) = next_invoke(&mut session).await?;
    assert_ne!(id, late_id);
    session.push(ServerFrame::reply_ok(id, json!("hi"))).await;
    assert_eq!(next.await?, "hi");

    connection.stop().await;
    Ok(())
}

#[tokio::test]
async fn untyped_invocation_returns_raw_json() -> Result<()> {
    let (connection, mut session) = connected().await?;
    let hub = connection.create_hub_proxy("myHub");

    let server = async {
        let (id, _, method, args) = next_invoke(&mut session).await?;
        assert_eq!(method, "SendToUser");
        assert_eq!(args, vec![json!("bob"), json!("NetClient"), json!("hi")]);
        session
            .push(ServerFrame::reply_ok(id, json!({"delivered": 1})))
            .await;
        anyhow::Ok(())
    };
    let (reply, served) = tokio::join!(
        hub.invoke_raw(
            "SendToUser",
            vec![json!("bob"), json!("NetClient"), json!("hi")]
        ),
        server
    );
    served?;
    assert_eq!(reply?, json!({"delivered": 1}));

    connection.stop().await;
    Ok(())
}

#[tokio::test]
async fn handlers_fan_out_in_registration_order() -> Result<()> {
    let (connection, session) = connected().await?;
    let first = connection.create_hub_proxy("myHub");
    let second = connection.create_hub_proxy("MYHUB");
    let (seen_tx, mut seen) = mpsc::unbounded_channel();

    let tx = seen_tx.clone();
    first.on::<(String, String), _>("addMessage", move |(name, message)| {
        let _ = tx.send(format!("typed {name}: {message}"));
    });
    let tx = seen_tx.clone();
    second.on_raw("addMessage", move |args| {
        let _ = tx.send(format!("raw {}", args.len()));
    });

    session
        .push(ServerFrame::event(
            "myHub",
            "addMessage",
            vec![json!("alice"), json!("hello")],
        ))
        .await;

    assert_eq!(
        timeout(WAIT, seen.recv()).await?.as_deref(),
        Some("typed alice: hello")
    );
    assert_eq!(timeout(WAIT, seen.recv()).await?.as_deref(), Some("raw 2"));
    assert!(seen.try_recv().is_err());

    connection.stop().await;
    Ok(())
}

#[tokio::test]
async fn decode_failure_does_not_block_other_handlers() -> Result<()> {
    let (connection, session) = connected().await?;
    let mut events = connection.lifecycle();
    let hub = connection.create_hub_proxy("stockTicker");
    let (prices_tx, mut prices) = mpsc::unbounded_channel();

    hub.on::<u64, _>("UpdateStockPrice", |_| {});
    hub.on::<Stock, _>("UpdateStockPrice", move |stock| {
        let _ = prices_tx.send(stock);
    });

    session
        .push(ServerFrame::event(
            "stockTicker",
            "UpdateStockPrice",
            vec![json!({"Symbol": "MSFT", "Price": 31.97})],
        ))
        .await;

    let stock = timeout(WAIT, prices.recv()).await?.expect("price update");
    assert_eq!(stock.symbol, "MSFT");
    match next_event(&mut events).await? {
        LifecycleEvent::Error(detail) => assert!(detail.contains("UpdateStockPrice")),
        other => panic!("expected an error event, got {other:?}"),
    }

    connection.stop().await;
    Ok(())
}

#[tokio::test]
async fn events_for_one_name_arrive_in_order() -> Result<()> {
    let (connection, session) = connected().await?;
    let hub = connection.create_hub_proxy("stockTicker");
    let (ticks_tx, mut ticks) = mpsc::unbounded_channel();
    hub.on::<u32, _>("tick", move |n| {
        let _ = ticks_tx.send(n);
    });

    for n in 0..20u32 {
        session
            .push(ServerFrame::event("stockTicker", "tick", vec![json!(n)]))
            .await;
    }

    for expected in 0..20u32 {
        assert_eq!(timeout(WAIT, ticks.recv()).await?, Some(expected));
    }
    connection.stop().await;
    Ok(())
}

#[tokio::test]
async fn events_for_other_hubs_are_not_delivered() -> Result<()> {
    let (connection, session) = connected().await?;
    let hub = connection.create_hub_proxy("stockTicker");
    let (seen_tx, mut seen) = mpsc::unbounded_channel();
    hub.on_raw("Notify", move |_| {
        let _ = seen_tx.send(());
    });

    session
        .push(ServerFrame::event("myHub", "Notify", vec![]))
        .await;
    session
        .push(ServerFrame::event("stockTicker", "Notify", vec![]))
        .await;

    timeout(WAIT, seen.recv()).await?.expect("notification");
    assert!(seen.try_recv().is_err());
    connection.stop().await;
    Ok(())
}

#[tokio::test]
async fn fire_and_forget_send_writes_the_frame() -> Result<()> {
    let (connection, mut session) = connected().await?;
    let hub = connection.create_hub_proxy("stockTicker");

    hub.send("JoinGroup", "SomeRandomGroup").await?;
    let (id, _, method, args) = next_invoke(&mut session).await?;
    assert_eq!(method, "JoinGroup");
    assert_eq!(args, vec![json!("SomeRandomGroup")]);

    session.push(ServerFrame::reply_ok(id, Value::Null)).await;
    connection.stop().await;
    Ok(())
}

#[tokio::test]
async fn proxy_outliving_its_connection_reports_closed() -> Result<()> {
    let (connection, _session) = connected().await?;
    let hub = connection.create_hub_proxy("myHub");

    connection.stop().await;
    drop(connection);

    assert!(matches!(
        hub.invoke::<Value, _>("Send", ()).await,
        Err(Error::Closed)
    ));
    Ok(())
}
