use super::alerts::{AlertEngine, Breached, PriceTick};
use super::history::{AlertHistory, AlertRecord};
use super::watch::{canonical_symbol, BandStatus, Watch, WatchRegistry};
use crate::api::binance::ws::FeedEvent;
use crate::error::{MonitorError, WatchError};
use crate::notify::NotificationSink;
use crate::store::{self, KeyValueStore, ALERT_HISTORY_KEY, WATCH_LIST_KEY};
use chrono::Utc;
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};

/// State changes pushed to whoever renders the monitor.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    WatchListChanged(Vec<Watch>),
    HistoryChanged(Vec<AlertRecord>),
    AlertRaised(AlertRecord),
    /// Latest prices for watched symbols seen in the last batch.
    PricesUpdated(Vec<(String, Decimal)>),
    ConnectionChanged(bool),
}

/// Owns the registry, the alert history and the price cache. Every mutation
/// goes through here, one call at a time.
pub struct Controller {
    registry: WatchRegistry,
    history: AlertHistory,
    engine: AlertEngine,
    store: Box<dyn KeyValueStore>,
    sink: Box<dyn NotificationSink>,
    events: broadcast::Sender<MonitorEvent>,
    connected: bool,
}

impl Controller {
    pub fn new(
        store: Box<dyn KeyValueStore>,
        sink: Box<dyn NotificationSink>,
        events: broadcast::Sender<MonitorEvent>,
    ) -> Self {
        let registry =
            WatchRegistry::from_snapshot(store::load_or_default(store.as_ref(), WATCH_LIST_KEY));
        let history =
            AlertHistory::from_snapshot(store::load_or_default(store.as_ref(), ALERT_HISTORY_KEY));
        info!(
            "Loaded {} watches and {} alerts from storage",
            registry.len(),
            history.len()
        );

        Self {
            registry,
            history,
            engine: AlertEngine::new(),
            store,
            sink,
            events,
            connected: false,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub fn add_watch(
        &mut self,
        symbol: &str,
        lower: Decimal,
        upper: Decimal,
    ) -> Result<Watch, WatchError> {
        let watch = self.registry.add(symbol, lower, upper)?;
        info!(
            "Watching {} in [{}, {}]",
            watch.symbol(),
            watch.lower(),
            watch.upper()
        );
        self.watches_changed();
        Ok(watch)
    }

    pub fn remove_watch(&mut self, symbol: &str) -> Result<(), WatchError> {
        let watch = self.registry.remove(symbol)?;
        info!("Stopped watching {}", watch.symbol());
        self.watches_changed();
        Ok(())
    }

    pub fn list_watches(&self) -> Vec<Watch> {
        self.registry.list()
    }

    pub fn list_history(&self) -> Vec<AlertRecord> {
        self.history.list()
    }

    pub fn delete_history_entry(&mut self, index: usize) -> Result<(), WatchError> {
        self.history.delete_at(index)?;
        self.history_changed();
        Ok(())
    }

    pub fn clear_history(&mut self) {
        if self.history.is_empty() {
            return;
        }
        self.history.clear();
        self.history_changed();
    }

    pub fn price(&self, symbol: &str) -> Option<Decimal> {
        self.engine.price(symbol)
    }

    /// `None` when the symbol is not watched or has no price yet.
    pub fn band_status(&self, symbol: &str) -> Option<BandStatus> {
        let watch = self.registry.get(&canonical_symbol(symbol))?;
        self.engine.status(watch)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Cached prices for the watched symbols, in watch list order.
    pub fn watched_prices(&self) -> Vec<(String, Decimal)> {
        self.registry
            .list()
            .into_iter()
            .filter_map(|watch| {
                let price = self.engine.price(watch.symbol())?;
                Some((watch.symbol().to_string(), price))
            })
            .collect()
    }

    /// Runs every tick of one feed message through the match engine, in order.
    /// Returns the alerts raised by this batch.
    pub fn handle_batch(&mut self, ticks: &[PriceTick]) -> Vec<AlertRecord> {
        let mut raised = Vec::new();
        let mut watched_prices: Vec<(String, Decimal)> = Vec::new();

        for tick in ticks {
            if self.registry.get(&tick.symbol).is_some() {
                watched_prices.retain(|(symbol, _)| symbol != &tick.symbol);
                watched_prices.push((tick.symbol.clone(), tick.price));
            }
            if let Some(breached) = self.engine.check_price(&self.registry, tick) {
                raised.push(self.trigger(breached));
            }
        }

        if !watched_prices.is_empty() {
            self.emit(MonitorEvent::PricesUpdated(watched_prices));
        }
        raised
    }

    /// Records the alert, retires the watch, then notifies. The watch is gone
    /// from the registry before this returns, so it cannot fire twice.
    fn trigger(&mut self, breached: Breached) -> AlertRecord {
        let Breached {
            watch,
            price,
            breach,
        } = breached;
        info!(
            "{} at {} left [{}, {}] ({})",
            watch.symbol(),
            price,
            watch.lower(),
            watch.upper(),
            breach
        );

        let record = AlertRecord {
            timestamp: Utc::now(),
            symbol: watch.symbol().to_string(),
            price,
            breach,
        };

        self.history.prepend(record.clone());
        self.history_changed();

        if let Err(e) = self.registry.remove(watch.symbol()) {
            error!("Triggered watch {} was already gone: {}", watch.symbol(), e);
        }
        self.watches_changed();

        if let Err(e) = self.sink.present(&record) {
            warn!("Failed to present alert for {}: {}", record.symbol, e);
        }
        if let Err(e) = self.sink.play_sound() {
            warn!("Failed to play alert sound: {}", e);
        }
        self.emit(MonitorEvent::AlertRaised(record.clone()));

        record
    }

    pub fn handle_feed_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Batch(ticks) => {
                self.handle_batch(&ticks);
            }
            FeedEvent::Connected => self.set_connected(true),
            FeedEvent::Disconnected => self.set_connected(false),
        }
    }

    fn set_connected(&mut self, connected: bool) {
        if self.connected != connected {
            self.connected = connected;
            self.emit(MonitorEvent::ConnectionChanged(connected));
        }
    }

    fn watches_changed(&mut self) {
        let watches = self.registry.list();
        self.persist(WATCH_LIST_KEY, &watches);
        self.emit(MonitorEvent::WatchListChanged(watches));
    }

    fn history_changed(&mut self) {
        let history = self.history.list();
        self.persist(ALERT_HISTORY_KEY, &history);
        self.emit(MonitorEvent::HistoryChanged(history));
    }

    /// Storage failures leave the in-memory state authoritative.
    fn persist<T: Serialize>(&self, key: &str, value: &T) {
        let result = serde_json::to_value(value)
            .map_err(Into::into)
            .and_then(|value| self.store.set(key, value));
        if let Err(e) = result {
            error!("Failed to persist '{}', continuing in memory: {}", key, e);
        }
    }

    fn emit(&self, event: MonitorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::AddWatch {
                symbol,
                lower,
                upper,
                reply,
            } => {
                let _ = reply.send(self.add_watch(&symbol, lower, upper));
            }
            Command::RemoveWatch { symbol, reply } => {
                let _ = reply.send(self.remove_watch(&symbol));
            }
            Command::ListWatches { reply } => {
                let _ = reply.send(self.list_watches());
            }
            Command::ListHistory { reply } => {
                let _ = reply.send(self.list_history());
            }
            Command::DeleteHistoryEntry { index, reply } => {
                let _ = reply.send(self.delete_history_entry(index));
            }
            Command::ClearHistory { reply } => {
                self.clear_history();
                let _ = reply.send(());
            }
            Command::BandStatus { symbol, reply } => {
                let _ = reply.send(self.band_status(&symbol));
            }
            Command::ConnectionStatus { reply } => {
                let _ = reply.send(self.is_connected());
            }
            Command::WatchedPrices { reply } => {
                let _ = reply.send(self.watched_prices());
            }
            Command::Shutdown => {}
        }
    }

    /// Serialises feed events and operator commands on the calling task until
    /// a shutdown command arrives or every handle is dropped.
    pub async fn run(
        mut self,
        mut feed: mpsc::Receiver<FeedEvent>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        let mut feed_open = true;
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                event = feed.recv(), if feed_open => match event {
                    Some(event) => self.handle_feed_event(event),
                    None => {
                        debug!("Feed channel closed");
                        feed_open = false;
                        self.set_connected(false);
                    }
                },
            }
        }
        info!("Controller stopped");
    }
}

pub enum Command {
    AddWatch {
        symbol: String,
        lower: Decimal,
        upper: Decimal,
        reply: oneshot::Sender<Result<Watch, WatchError>>,
    },
    RemoveWatch {
        symbol: String,
        reply: oneshot::Sender<Result<(), WatchError>>,
    },
    ListWatches {
        reply: oneshot::Sender<Vec<Watch>>,
    },
    ListHistory {
        reply: oneshot::Sender<Vec<AlertRecord>>,
    },
    DeleteHistoryEntry {
        index: usize,
        reply: oneshot::Sender<Result<(), WatchError>>,
    },
    ClearHistory {
        reply: oneshot::Sender<()>,
    },
    BandStatus {
        symbol: String,
        reply: oneshot::Sender<Option<BandStatus>>,
    },
    ConnectionStatus {
        reply: oneshot::Sender<bool>,
    },
    WatchedPrices {
        reply: oneshot::Sender<Vec<(String, Decimal)>>,
    },
    Shutdown,
}

/// Cloneable front door to a running [`Controller`].
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Command>,
}

impl ControllerHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| MonitorError::ControllerStopped)?;
        rx.await.map_err(|_| MonitorError::ControllerStopped)
    }

    pub async fn add_watch(
        &self,
        symbol: &str,
        lower: Decimal,
        upper: Decimal,
    ) -> Result<Watch, MonitorError> {
        let symbol = symbol.to_string();
        Ok(self
            .request(|reply| Command::AddWatch {
                symbol,
                lower,
                upper,
                reply,
            })
            .await??)
    }

    pub async fn remove_watch(&self, symbol: &str) -> Result<(), MonitorError> {
        let symbol = symbol.to_string();
        Ok(self
            .request(|reply| Command::RemoveWatch { symbol, reply })
            .await??)
    }

    pub async fn list_watches(&self) -> Result<Vec<Watch>, MonitorError> {
        self.request(|reply| Command::ListWatches { reply }).await
    }

    pub async fn list_history(&self) -> Result<Vec<AlertRecord>, MonitorError> {
        self.request(|reply| Command::ListHistory { reply }).await
    }

    pub async fn delete_history_entry(&self, index: usize) -> Result<(), MonitorError> {
        Ok(self
            .request(|reply| Command::DeleteHistoryEntry { index, reply })
            .await??)
    }

    pub async fn clear_history(&self) -> Result<(), MonitorError> {
        self.request(|reply| Command::ClearHistory { reply }).await
    }

    pub async fn band_status(&self, symbol: &str) -> Result<Option<BandStatus>, MonitorError> {
        let symbol = symbol.to_string();
        self.request(|reply| Command::BandStatus { symbol, reply })
            .await
    }

    pub async fn is_connected(&self) -> Result<bool, MonitorError> {
        self.request(|reply| Command::ConnectionStatus { reply }).await
    }

    pub async fn watched_prices(&self) -> Result<Vec<(String, Decimal)>, MonitorError> {
        self.request(|reply| Command::WatchedPrices { reply }).await
    }

    pub async fn shutdown(&self) {
        if self.tx.send(Command::Shutdown).await.is_err() {
            debug!("Controller already stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::watch::Breach;
    use crate::notify::DynError;
    use crate::error::StoreError;
    use crate::store::MemoryStore;
    use serde_json::Value;
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingSink {
        presented: Arc<Mutex<Vec<AlertRecord>>>,
        sounds: Arc<Mutex<usize>>,
    }

    impl NotificationSink for RecordingSink {
        fn present(&mut self, record: &AlertRecord) -> Result<(), DynError> {
            self.presented.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn play_sound(&mut self) -> Result<(), DynError> {
            *self.sounds.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn present(&mut self, _record: &AlertRecord) -> Result<(), DynError> {
            Err("display unavailable".into())
        }

        fn play_sound(&mut self) -> Result<(), DynError> {
            Err("no audio device".into())
        }
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<Value>, StoreError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read denied").into())
        }

        fn set(&self, _key: &str, _value: Value) -> Result<(), StoreError> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into())
        }
    }

    fn controller_with(
        store: impl KeyValueStore + 'static,
        sink: impl NotificationSink + 'static,
    ) -> Controller {
        let (events, _) = broadcast::channel(64);
        Controller::new(Box::new(store), Box::new(sink), events)
    }

    fn tick(symbol: &str, price: Decimal) -> PriceTick {
        PriceTick::new(symbol, price)
    }

    #[test]
    fn test_upper_breach_scenario() {
        let sink = RecordingSink::default();
        let mut controller = controller_with(MemoryStore::new(), sink.clone());
        controller
            .add_watch("BTCUSDT", dec!(60000), dec!(70000))
            .unwrap();

        let raised = controller.handle_batch(&[tick("BTCUSDT", dec!(71000))]);

        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].symbol, "BTCUSDT");
        assert_eq!(raised[0].price, dec!(71000));
        assert_eq!(raised[0].breach, Breach::Upper);
        assert!(controller.list_watches().is_empty());
        assert_eq!(controller.list_history(), raised);
        assert_eq!(sink.presented.lock().unwrap().len(), 1);
        assert_eq!(*sink.sounds.lock().unwrap(), 1);
    }

    #[test]
    fn test_boundary_tick_keeps_watch_active() {
        let mut controller = controller_with(MemoryStore::new(), RecordingSink::default());
        controller
            .add_watch("ETHUSDT", dec!(2000), dec!(3000))
            .unwrap();

        let raised = controller.handle_batch(&[
            tick("ETHUSDT", dec!(3000)),
            tick("ETHUSDT", dec!(2000)),
        ]);

        assert!(raised.is_empty());
        assert!(controller.list_history().is_empty());
        assert_eq!(controller.list_watches().len(), 1);
        assert_eq!(controller.band_status("ethusdt"), Some(BandStatus::InRange));
    }

    #[test]
    fn test_watch_fires_once_per_lifetime() {
        let mut controller = controller_with(MemoryStore::new(), RecordingSink::default());
        controller.add_watch("SOLUSDT", dec!(100), dec!(200)).unwrap();

        let raised = controller.handle_batch(&[
            tick("SOLUSDT", dec!(90)),
            tick("SOLUSDT", dec!(80)),
            tick("SOLUSDT", dec!(250)),
        ]);
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].breach, Breach::Lower);

        let raised = controller.handle_batch(&[tick("SOLUSDT", dec!(10))]);
        assert!(raised.is_empty());
        assert_eq!(controller.list_history().len(), 1);
        assert_eq!(controller.price("SOLUSDT"), Some(dec!(10)));

        controller.add_watch("SOLUSDT", dec!(5), dec!(20)).unwrap();
        assert_eq!(controller.band_status("SOLUSDT"), Some(BandStatus::InRange));
    }

    #[test]
    fn test_fifty_one_triggers_keep_fifty_newest() {
        let mut controller = controller_with(MemoryStore::new(), RecordingSink::default());
        for n in 0..51 {
            let symbol = format!("COIN{}USDT", n);
            controller.add_watch(&symbol, dec!(1), dec!(2)).unwrap();
            controller.handle_batch(&[tick(&symbol, dec!(3))]);
        }

        let history = controller.list_history();
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].symbol, "COIN50USDT");
        assert_eq!(history[49].symbol, "COIN1USDT");
        assert!(controller.list_watches().is_empty());
    }

    #[test]
    fn test_validation_errors_do_not_mutate() {
        let store = MemoryStore::new();
        let mut controller = controller_with(store.clone(), RecordingSink::default());
        controller.add_watch("BTCUSDT", dec!(1), dec!(2)).unwrap();

        assert!(matches!(
            controller.add_watch("ETHUSDT", dec!(3000), dec!(3000)),
            Err(WatchError::InvalidRange { .. })
        ));
        assert_eq!(
            controller.add_watch("BTCUSDT", dec!(5), dec!(6)),
            Err(WatchError::DuplicateSymbol("BTCUSDT".to_string()))
        );
        assert_eq!(
            controller.remove_watch("XRPUSDT"),
            Err(WatchError::NotFound("XRPUSDT".to_string()))
        );
        assert_eq!(controller.list_watches().len(), 1);

        let stored = store.get(WATCH_LIST_KEY).unwrap().unwrap();
        assert_eq!(stored.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_state_survives_restart() {
        let store = MemoryStore::new();
        {
            let mut controller = controller_with(store.clone(), RecordingSink::default());
            controller.add_watch("BTCUSDT", dec!(1), dec!(2)).unwrap();
            controller.add_watch("ETHUSDT", dec!(10), dec!(20)).unwrap();
            controller.handle_batch(&[tick("ETHUSDT", dec!(25))]);
        }

        let controller = controller_with(store, RecordingSink::default());
        let watches = controller.list_watches();
        assert_eq!(watches.len(), 1);
        assert_eq!(watches[0].symbol(), "BTCUSDT");
        assert_eq!(controller.list_history().len(), 1);
        assert_eq!(controller.list_history()[0].symbol, "ETHUSDT");
    }

    #[test]
    fn test_history_edits() {
        let mut controller = controller_with(MemoryStore::new(), RecordingSink::default());
        for symbol in ["AUSDT", "BUSDT", "CUSDT"] {
            controller.add_watch(symbol, dec!(1), dec!(2)).unwrap();
            controller.handle_batch(&[tick(symbol, dec!(0.5))]);
        }

        controller.delete_history_entry(1).unwrap();
        let symbols: Vec<String> = controller
            .list_history()
            .into_iter()
            .map(|r| r.symbol)
            .collect();
        assert_eq!(symbols, vec!["CUSDT", "AUSDT"]);

        assert_eq!(
            controller.delete_history_entry(5),
            Err(WatchError::IndexOutOfRange { index: 5, len: 2 })
        );

        controller.clear_history();
        assert!(controller.list_history().is_empty());
    }

    #[test]
    fn test_sink_failure_does_not_block_trigger() {
        let mut controller = controller_with(MemoryStore::new(), FailingSink);
        controller.add_watch("BTCUSDT", dec!(1), dec!(2)).unwrap();

        let raised = controller.handle_batch(&[tick("BTCUSDT", dec!(5))]);
        assert_eq!(raised.len(), 1);
        assert!(controller.list_watches().is_empty());
        assert_eq!(controller.list_history().len(), 1);
    }

    #[test]
    fn test_failing_store_keeps_state_in_memory() {
        let sink = RecordingSink::default();
        let mut controller = controller_with(FailingStore, sink.clone());
        let mut events = controller.subscribe();
        assert!(controller.list_watches().is_empty());
        assert!(controller.list_history().is_empty());

        controller.add_watch("BTCUSDT", dec!(1), dec!(2)).unwrap();
        controller.add_watch("ETHUSDT", dec!(10), dec!(20)).unwrap();
        assert_eq!(controller.list_watches().len(), 2);

        let raised = controller.handle_batch(&[tick("BTCUSDT", dec!(3))]);
        assert_eq!(raised.len(), 1);
        assert_eq!(controller.list_watches().len(), 1);
        assert_eq!(controller.list_watches()[0].symbol(), "ETHUSDT");
        assert_eq!(controller.list_history(), raised);
        assert_eq!(*sink.sounds.lock().unwrap(), 1);

        controller.delete_history_entry(0).unwrap();
        assert!(controller.list_history().is_empty());

        controller.handle_batch(&[tick("ETHUSDT", dec!(5))]);
        assert!(controller.list_watches().is_empty());
        assert_eq!(controller.list_history().len(), 1);
        assert_eq!(controller.list_history()[0].breach, Breach::Lower);

        controller.clear_history();
        assert!(controller.list_history().is_empty());

        let mut alerts = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, MonitorEvent::AlertRaised(_)) {
                alerts += 1;
            }
        }
        assert_eq!(alerts, 2);
    }

    #[test]
    fn test_watched_prices_follow_registry() {
        let mut controller = controller_with(MemoryStore::new(), RecordingSink::default());
        controller.add_watch("BTCUSDT", dec!(1), dec!(100)).unwrap();
        controller.add_watch("ETHUSDT", dec!(1), dec!(100)).unwrap();
        controller.handle_batch(&[tick("DOGEUSDT", dec!(0.1)), tick("ETHUSDT", dec!(50))]);

        assert_eq!(
            controller.watched_prices(),
            vec![("ETHUSDT".to_string(), dec!(50))]
        );
    }

    #[test]
    fn test_events_follow_mutations() {
        let mut controller = controller_with(MemoryStore::new(), RecordingSink::default());
        let mut events = controller.subscribe();

        controller.add_watch("BTCUSDT", dec!(1), dec!(2)).unwrap();
        controller.handle_feed_event(FeedEvent::Connected);
        controller.handle_feed_event(FeedEvent::Batch(vec![
            tick("DOGEUSDT", dec!(0.1)),
            tick("BTCUSDT", dec!(1.5)),
        ]));
        controller.handle_feed_event(FeedEvent::Batch(vec![tick("BTCUSDT", dec!(3))]));

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }

        assert!(matches!(&received[0], MonitorEvent::WatchListChanged(w) if w.len() == 1));
        assert_eq!(received[1], MonitorEvent::ConnectionChanged(true));
        assert_eq!(
            received[2],
            MonitorEvent::PricesUpdated(vec![("BTCUSDT".to_string(), dec!(1.5))])
        );
        assert!(matches!(&received[3], MonitorEvent::HistoryChanged(h) if h.len() == 1));
        assert!(matches!(&received[4], MonitorEvent::WatchListChanged(w) if w.is_empty()));
        assert!(matches!(&received[5], MonitorEvent::AlertRaised(r) if r.symbol == "BTCUSDT"));
        assert_eq!(
            received[6],
            MonitorEvent::PricesUpdated(vec![("BTCUSDT".to_string(), dec!(3))])
        );
        assert!(controller.is_connected());
    }

    #[tokio::test]
    async fn test_actor_serialises_commands_and_batches() {
        let controller = controller_with(MemoryStore::new(), RecordingSink::default());
        let mut events = controller.subscribe();
        let (handle, commands) = ControllerHandle::channel(8);
        let (feed_tx, feed_rx) = mpsc::channel(1);
        let task = tokio::spawn(controller.run(feed_rx, commands));

        handle
            .add_watch("btcusdt", dec!(60000), dec!(70000))
            .await
            .unwrap();
        let duplicate = handle.add_watch("BTCUSDT", dec!(1), dec!(2)).await;
        assert_eq!(
            duplicate,
            Err(MonitorError::Watch(WatchError::DuplicateSymbol(
                "BTCUSDT".to_string()
            )))
        );

        feed_tx
            .send(FeedEvent::Batch(vec![tick("BTCUSDT", dec!(71000))]))
            .await
            .unwrap();

        loop {
            match events.recv().await.unwrap() {
                MonitorEvent::AlertRaised(record) => {
                    assert_eq!(record.breach, Breach::Upper);
                    break;
                }
                _ => continue,
            }
        }

        assert!(handle.list_watches().await.unwrap().is_empty());
        assert_eq!(handle.list_history().await.unwrap().len(), 1);
        assert_eq!(handle.band_status("BTCUSDT").await.unwrap(), None);
        assert!(!handle.is_connected().await.unwrap());
        assert!(handle.watched_prices().await.unwrap().is_empty());
        handle.delete_history_entry(0).await.unwrap();
        handle.clear_history().await.unwrap();

        handle.shutdown().await;
        task.await.unwrap();
        assert_eq!(
            handle.list_watches().await,
            Err(MonitorError::ControllerStopped)
        );
    }
}
