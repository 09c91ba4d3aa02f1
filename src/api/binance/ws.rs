use crate::error::FeedError;
use crate::monitor::PriceTick;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite;

pub const BINANCE_MARK_PRICE_URL: &str =
    "wss://fstream.binance.com/stream?streams=!markPrice@arr@1s";
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// What the feed reports to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Connected,
    /// All ticks carried by one inbound message, in message order.
    Batch(Vec<PriceTick>),
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
}

/// Combined-stream messages wrap the array in `data`; the raw `/ws`
/// endpoint sends the array on its own.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BatchPayload {
    Combined { data: Vec<serde_json::Value> },
    Raw(Vec<serde_json::Value>),
}

#[derive(Debug, Deserialize)]
struct MarkPriceData {
    s: String, // Symbol
    p: String, // Mark price
}

/// Parses one feed message. Records that fail to parse are skipped so the
/// rest of the batch still gets through.
pub fn parse_batch(text: &str) -> Result<Vec<PriceTick>, FeedError> {
    let records = match serde_json::from_str::<BatchPayload>(text)? {
        BatchPayload::Combined { data } => data,
        BatchPayload::Raw(data) => data,
    };

    let mut ticks = Vec::with_capacity(records.len());
    for record in records {
        let data = match serde_json::from_value::<MarkPriceData>(record) {
            Ok(data) => data,
            Err(e) => {
                warn!("Skipping malformed price record: {}", e);
                continue;
            }
        };
        match Decimal::from_str(&data.p) {
            Ok(price) => ticks.push(PriceTick::new(&data.s, price)),
            Err(e) => warn!("Skipping {}: bad price '{}': {}", data.s, data.p, e),
        }
    }
    Ok(ticks)
}

/// One logical subscription to the price stream. `run` keeps it alive,
/// reconnecting after a fixed delay, until the shutdown flag flips.
pub struct FeedConnection {
    url: String,
    reconnect_delay: Duration,
    events: mpsc::Sender<FeedEvent>,
    shutdown: watch::Receiver<bool>,
    state: ConnectionState,
}

impl FeedConnection {
    pub fn new(
        url: impl Into<String>,
        reconnect_delay: Duration,
        events: mpsc::Sender<FeedEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            url: url.into(),
            reconnect_delay,
            events,
            shutdown,
            state: ConnectionState::Idle,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// A dropped shutdown sender counts as a shutdown request.
    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow() || self.shutdown.has_changed().is_err()
    }

    pub async fn run(mut self) -> Result<(), FeedError> {
        while !self.is_shutdown() {
            match self.connect().await {
                Ok(()) => info!("Feed connection closed"),
                Err(FeedError::ReceiverDropped) => {
                    warn!("Controller gone, stopping feed");
                    break;
                }
                Err(e) => warn!("Feed connection lost: {}", e),
            }
            self.state = ConnectionState::Idle;

            if self.events.send(FeedEvent::Disconnected).await.is_err() || self.is_shutdown() {
                break;
            }

            info!("Reconnecting in {:?}", self.reconnect_delay);
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = self.shutdown.changed() => {}
            }
        }

        info!("Feed stopped");
        Ok(())
    }

    /// Opens a connection, then pumps messages until the server goes away or
    /// shutdown is requested. `run` only calls this from `Idle`; any other
    /// caller finding a connection in progress gets `Ok` without a second
    /// socket or a second `Connected`.
    async fn connect(&mut self) -> Result<(), FeedError> {
        if self.state != ConnectionState::Idle {
            debug!("Connection already {:?}, not opening another", self.state);
            return Ok(());
        }
        self.state = ConnectionState::Connecting;
        info!("Connecting to price feed: {}", self.url);

        let (mut ws_stream, _) = tokio::select! {
            result = connect_async(self.url.as_str()) => result?,
            _ = self.shutdown.changed() => return Ok(()),
        };

        self.state = ConnectionState::Open;
        info!("Successfully connected to price feed");
        self.events
            .send(FeedEvent::Connected)
            .await
            .map_err(|_| FeedError::ReceiverDropped)?;

        loop {
            tokio::select! {
                message = ws_stream.next() => match message {
                    Some(Ok(tungstenite::protocol::Message::Text(text))) => {
                        self.dispatch(&text).await?;
                    }
                    Some(Ok(tungstenite::protocol::Message::Binary(data))) => {
                        match String::from_utf8(data) {
                            Ok(text) => self.dispatch(&text).await?,
                            Err(e) => warn!("Dropping non-UTF-8 binary message: {}", e),
                        }
                    }
                    Some(Ok(tungstenite::protocol::Message::Close(frame))) => {
                        info!("Price feed sent close: {:?}", frame);
                        return Err(FeedError::ConnectionClosed);
                    }
                    Some(Ok(_)) => {} // Ping/pong handled by tungstenite
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(FeedError::ConnectionClosed),
                },
                _ = self.shutdown.changed() => {
                    info!("Closing price feed");
                    if let Err(e) = ws_stream.close(None).await {
                        debug!("Error while closing feed: {}", e);
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Waits for the controller to take the batch before reading on. A
    /// message that does not parse is dropped and the socket stays open.
    async fn dispatch(&self, text: &str) -> Result<(), FeedError> {
        match parse_batch(text) {
            Ok(ticks) if ticks.is_empty() => Ok(()),
            Ok(ticks) => self
                .events
                .send(FeedEvent::Batch(ticks))
                .await
                .map_err(|_| FeedError::ReceiverDropped),
            Err(e) => {
                warn!("Dropping unrecognised feed message: {}", e);
                Ok(())
            }
        }
    }
}
