//! End-to-end ingestion through an in-memory transport

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use market_data::websocket::Dispatch;
use market_data::{
    AppState, Config, Connector, DispatchMetrics, MarketDataError, MarketState, ParsedMessage,
    Result, StreamDispatcher, Transport, WebSocketManager,
};
use proptest::prelude::*;
use rust_decimal_macros::dec;
use tokio::time::Instant;

/// Replays scripted frames, then fails like a dropped connection
#[derive(Default)]
struct ScriptedTransport {
    inbound: VecDeque<Option<String>>,
    sent: Vec<String>,
    closed: Arc<AtomicBool>,
    hang_when_empty: bool,
    hang_on_send: bool,
}

impl ScriptedTransport {
    fn with_frames(frames: &[&str]) -> Self {
        Self {
            inbound: frames.iter().map(|f| Some(f.to_string())).collect(),
            ..Default::default()
        }
    }
}

impl Transport for ScriptedTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.hang_on_send {
            std::future::pending::<()>().await;
        }
        self.sent.push(text);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        match self.inbound.pop_front() {
            Some(frame) => Ok(frame),
            None if self.hang_when_empty => std::future::pending().await,
            None => Err(MarketDataError::WebSocketConnection("Stream ended".to_string())),
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out scripted sessions in order; refuses once they run out
#[derive(Default)]
struct ScriptedConnector {
    sessions: Mutex<VecDeque<Result<ScriptedTransport>>>,
    connects: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    fn with_sessions(sessions: Vec<Result<ScriptedTransport>>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into()),
            ..Default::default()
        }
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(&self) -> Result<ScriptedTransport> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = self.sessions.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(refused()))
    }
}

fn refused() -> MarketDataError {
    MarketDataError::WebSocketConnection("Connection refused".to_string())
}

fn dispatcher() -> StreamDispatcher {
    StreamDispatcher::new(Arc::new(MarketState::new()), DispatchMetrics::new().unwrap())
}

fn far_deadline() -> Instant {
    Instant::now() + Duration::from_secs(60)
}

fn app_state(assets: &[&str]) -> Arc<AppState> {
    app_state_with(Config {
        assets: assets.iter().map(|a| a.to_string()).collect(),
        subscribe_pacing_ms: 0,
        ..Config::default()
    })
}

fn app_state_with(config: Config) -> Arc<AppState> {
    Arc::new(AppState {
        market: Arc::new(MarketState::new()),
        metrics: DispatchMetrics::new().unwrap(),
        config: Arc::new(config),
    })
}

#[tokio::test]
async fn later_snapshot_fully_replaces_earlier_one() {
    let dispatcher = dispatcher();
    let mut transport = ScriptedTransport::with_frames(&[
        r#"{"channel":"orderbook:ETH-X","data":{"instrument_name":"ETH-X","bids":[["100","1","0.5"]],"asks":[],"last_updated":"1700000000"}}"#,
        r#"{"channel":"orderbook:ETH-X","data":{"instrument_name":"ETH-X","bids":[],"asks":[["101","2","0.4"]],"last_updated":"1700000001"}}"#,
    ]);

    let result = dispatcher.run(&mut transport, far_deadline()).await;
    assert!(matches!(result, Err(MarketDataError::WebSocketConnection(_))));

    let book = dispatcher.market().get_order_book("ETH-X").await.unwrap();
    assert!(book.bids.is_empty());
    assert_eq!(book.asks.len(), 1);
    assert_eq!(book.asks[0].price, dec!(101));
    assert_eq!(book.asks[0].amount, dec!(2));
    assert_eq!(book.asks[0].implied_volatility, dec!(0.4));
    assert_eq!(book.last_updated, 1_700_000_001);
}

#[tokio::test]
async fn malformed_asks_keep_decoded_bids() {
    let dispatcher = dispatcher();
    let outcome = dispatcher
        .handle_frame(r#"{"channel":"orderbook:ETH-Y","data":{"instrument_name":"ETH-Y","bids":[["99.5","3","0.7"],["99","1","0.71"]],"asks":[["101","2"]],"last_updated":"42"}}"#)
        .await;

    assert_eq!(outcome, Dispatch::OrderBookUpdated { instrument: "ETH-Y".to_string() });
    let book = dispatcher.market().get_order_book("ETH-Y").await.unwrap();
    assert_eq!(book.bids.len(), 2);
    assert_eq!(book.bids[0].price, dec!(99.5));
    assert!(book.asks.is_empty());
}

#[tokio::test]
async fn sequence_of_updates_keeps_only_the_last() {
    let dispatcher = dispatcher();
    for ts in 1..=5 {
        let frame = format!(
            r#"{{"channel":"orderbook:ETH-Z","data":{{"instrument_name":"ETH-Z","bids":[["{ts}","1","0.5"]],"asks":[["{ask}","1","0.5"]],"last_updated":"{ts}"}}}}"#,
            ask = ts + 10
        );
        dispatcher.handle_frame(&frame).await;
    }

    let book = dispatcher.market().get_order_book("ETH-Z").await.unwrap();
    assert_eq!(book.last_updated, 5);
    assert_eq!(book.bids.len(), 1);
    assert_eq!(book.bids[0].price, dec!(5));
    assert_eq!(book.asks[0].price, dec!(15));
}

#[tokio::test]
async fn bad_frames_do_not_stop_the_stream() {
    let dispatcher = dispatcher();
    let mut transport = ScriptedTransport::with_frames(&[
        "garbage",
        r#"{"data":["orderbook:ETH-X"]}"#,
        r#"{"channel":"orderbook:ETH-X","data":{"instrument_name":"ETH-X","bids":[["x","1","0.5"]],"asks":[["y","1","0.5"]],"last_updated":"1"}}"#,
        r#"{"channel":"index:ETH","data":{"price":"not-a-price"}}"#,
        r#"{"channel":"index:ETH","data":{"price":"3123.45"}}"#,
    ]);
    transport.inbound.insert(1, None);

    let result = dispatcher.run(&mut transport, far_deadline()).await;
    assert!(matches!(result, Err(MarketDataError::WebSocketConnection(_))));

    let market = dispatcher.market();
    assert!(market.get_order_book("ETH-X").await.is_none());
    assert_eq!(
        market.get_index_price("ETH").await.map(|p| p.price),
        Some(dec!(3123.45))
    );
    assert!(market.order_books().await.is_empty());
}

#[tokio::test]
async fn dispatcher_stops_cleanly_at_deadline() {
    let dispatcher = dispatcher();
    let mut transport = ScriptedTransport::with_frames(&[
        r#"{"channel":"index:BTC","data":{"price":"60000"}}"#,
    ]);
    transport.hang_when_empty = true;

    let deadline = Instant::now() + Duration::from_millis(50);
    let result = dispatcher.run(&mut transport, deadline).await;

    assert!(result.is_ok());
    assert_eq!(
        dispatcher.market().get_index_price("BTC").await.map(|p| p.price),
        Some(dec!(60000))
    );
}

#[tokio::test]
async fn manager_subscribes_books_then_indices() {
    let instruments: Vec<String> = (0..45).map(|i| format!("ETH-27DEC24-{i}-P")).collect();
    let manager = WebSocketManager::new(app_state(&["ETH", "BTC"]), instruments);
    let mut transport = ScriptedTransport::default();

    manager.subscribe_all(&mut transport).await.unwrap();

    assert_eq!(transport.sent.len(), 4);
    assert!(transport.sent[0].starts_with(r#"{"op":"subscribe","data":["orderbook:ETH-27DEC24-0-P""#));
    assert_eq!(
        transport.sent[3],
        r#"{"op":"subscribe","data":["index:ETH","index:BTC"]}"#
    );
}

#[tokio::test]
async fn manager_closes_transport_after_failure() {
    let state = app_state(&["ETH"]);
    let manager = WebSocketManager::new(state.clone(), vec!["ETH-X".to_string()]);
    let mut transport = ScriptedTransport::with_frames(&[
        r#"{"channel":"orderbook:ETH-X","data":{"instrument_name":"ETH-X","bids":[["1","1","1"]],"last_updated":"9"}}"#,
    ]);

    let result = manager.process(&mut transport, far_deadline()).await;

    assert!(result.is_err());
    assert!(transport.closed.load(Ordering::SeqCst));
    assert_eq!(state.market.order_books_for_asset("ETH").await.len(), 1);
    assert_eq!(state.metrics.frames.get(), 1);
}

fn retry_config(max_reconnect_attempts: u32) -> Config {
    Config {
        assets: vec!["ETH".to_string()],
        subscribe_pacing_ms: 0,
        reconnect_delay_ms: 1,
        max_reconnect_attempts,
        ..Config::default()
    }
}

#[tokio::test]
async fn run_gives_up_after_max_reconnect_attempts() {
    let connector = ScriptedConnector::default();
    let connects = connector.connects.clone();
    let mut manager =
        WebSocketManager::with_connector(app_state_with(retry_config(1)), vec![], connector);

    let result = manager.run().await;

    assert!(matches!(result, Err(MarketDataError::MaxReconnectAttemptsExceeded)));
    assert_eq!(connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn run_with_zero_attempts_stops_on_first_failure() {
    let connector = ScriptedConnector::default();
    let connects = connector.connects.clone();
    let mut manager =
        WebSocketManager::with_connector(app_state_with(retry_config(0)), vec![], connector);

    let result = manager.run().await;

    assert!(matches!(result, Err(MarketDataError::MaxReconnectAttemptsExceeded)));
    assert_eq!(connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn successful_session_resets_reconnect_counter() {
    let session =
        ScriptedTransport::with_frames(&[r#"{"channel":"index:ETH","data":{"price":"3100"}}"#]);
    let session_closed = session.closed.clone();
    let connector =
        ScriptedConnector::with_sessions(vec![Err(refused()), Ok(session), Err(refused())]);
    let connects = connector.connects.clone();
    let state = app_state_with(retry_config(1));
    let mut manager =
        WebSocketManager::with_connector(state.clone(), vec!["ETH-X".to_string()], connector);

    let result = manager.run().await;

    // without the reset the dropped session would already be the second failure
    assert!(matches!(result, Err(MarketDataError::MaxReconnectAttemptsExceeded)));
    assert_eq!(connects.load(Ordering::SeqCst), 3);
    assert!(session_closed.load(Ordering::SeqCst));
    assert_eq!(
        state.market.get_index_price("ETH").await.map(|p| p.price),
        Some(dec!(3100))
    );
}

#[tokio::test(start_paused = true)]
async fn deadline_during_backoff_ends_run_cleanly() {
    let connector = ScriptedConnector::default();
    let connects = connector.connects.clone();
    let config = Config {
        session_timeout_secs: 1,
        reconnect_delay_ms: 60_000,
        ..retry_config(10)
    };
    let mut manager = WebSocketManager::with_connector(app_state_with(config), vec![], connector);

    let started = Instant::now();
    let result = manager.run().await;

    assert!(result.is_ok());
    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn deadline_during_subscribe_closes_transport() {
    let session = ScriptedTransport {
        hang_on_send: true,
        ..Default::default()
    };
    let session_closed = session.closed.clone();
    let connector = ScriptedConnector::with_sessions(vec![Ok(session)]);
    let config = Config {
        session_timeout_secs: 1,
        ..retry_config(10)
    };
    let mut manager =
        WebSocketManager::with_connector(app_state_with(config), vec!["ETH-X".to_string()], connector);

    let result = manager.run().await;

    assert!(result.is_ok());
    assert!(session_closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn unreachable_venue_exhausts_reconnects() {
    let config = Config {
        ws_endpoint: "ws://127.0.0.1:1".to_string(),
        connect_timeout_secs: 2,
        ..retry_config(1)
    };
    let mut manager = WebSocketManager::new(app_state_with(config), vec!["ETH-X".to_string()]);

    let result = manager.run().await;

    assert!(matches!(result, Err(MarketDataError::MaxReconnectAttemptsExceeded)));
}

fn order_levels() -> impl Strategy<Value = Vec<(u32, u32, u16)>> {
    prop::collection::vec((1u32..1_000_000, 1u32..10_000, 0u16..500), 0..6)
}

fn levels_json(levels: &[(u32, u32, u16)]) -> String {
    let tuples: Vec<String> = levels
        .iter()
        .map(|(price, amount, iv)| format!(r#"["{price}.5","{amount}","0.{iv}"]"#))
        .collect();
    format!("[{}]", tuples.join(","))
}

proptest! {
    #[test]
    fn stored_book_matches_last_frame(
        updates in prop::collection::vec((0i64..i64::MAX, order_levels(), order_levels()), 1..8)
    ) {
        let frames: Vec<String> = updates
            .iter()
            .map(|(ts, bids, asks)| {
                format!(
                    r#"{{"channel":"orderbook:ETH-P","data":{{"instrument_name":"ETH-P","bids":{},"asks":{},"last_updated":"{ts}"}}}}"#,
                    levels_json(bids),
                    levels_json(asks),
                )
            })
            .collect();

        let expected = match ParsedMessage::parse(frames.last().unwrap()) {
            Ok(ParsedMessage::OrderBook(book)) => book,
            other => panic!("Expected OrderBook, got {other:?}"),
        };

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let stored = runtime.block_on(async {
            let dispatcher = dispatcher();
            for frame in &frames {
                dispatcher.handle_frame(frame).await;
            }
            dispatcher.market().get_order_book("ETH-P").await
        });

        prop_assert_eq!(stored.as_deref(), Some(&expected));
    }
}
