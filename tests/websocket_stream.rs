use futures::{SinkExt, StreamExt};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use ticket_pricer::api::{create_rest_router, AppState};
use ticket_pricer::services::{PricingCalculator, QuoteCache, QuoteRefresher, Subscription};
use ticket_pricer::sources::StaticSource;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn calculator() -> Arc<PricingCalculator> {
    let source = Arc::new(
        StaticSource::new()
            .with_price("XLM", "USD", dec!(0.12))
            .with_price("XLM", "EUR", dec!(0.11)),
    );
    Arc::new(PricingCalculator::new(Arc::new(QuoteCache::new(source))))
}

async fn serve(with_updates: bool) -> (Client, Option<Subscription>) {
    let calculator = calculator();
    let assets = vec!["XLM".to_string()];
    let currencies = vec!["USD".to_string(), "EUR".to_string()];

    let refresher = with_updates.then(|| {
        QuoteRefresher::new(
            calculator.clone(),
            assets.clone(),
            currencies.clone(),
            Duration::from_millis(200),
        )
        .spawn()
    });

    let state = Arc::new(AppState {
        calculator,
        updates: refresher.as_ref().map(|r| r.feed()),
        assets,
        currencies: currencies.clone(),
        fx_currencies: currencies,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_rest_router(state)).await.unwrap();
    });

    let (client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    (client, refresher)
}

async fn next_json(client: &mut Client) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("no message within 5s")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn streams_price_boards_and_answers_ping() {
    let (mut client, refresher) = serve(true).await;

    let update = next_json(&mut client).await;
    assert_eq!("price_update", update["type"]);
    let board = &update["data"][0];
    assert_eq!("XLM", board["asset"]);
    assert_eq!("0.12", board["prices"][0]["quote"]["price"]);

    client
        .send(Message::Text(r#"{"type":"ping"}"#.to_string()))
        .await
        .unwrap();
    loop {
        let msg = next_json(&mut client).await;
        if msg["type"] == "pong" {
            break;
        }
        assert_eq!("price_update", msg["type"]);
    }

    client.close(None).await.unwrap();
    if let Some(refresher) = refresher {
        refresher.stop().await;
    }
}

#[tokio::test]
async fn reports_disabled_updates() {
    let (mut client, refresher) = serve(false).await;
    assert!(refresher.is_none());

    let msg = next_json(&mut client).await;
    assert_eq!("error", msg["type"]);
    assert_eq!("price updates are disabled", msg["error"]);
}
