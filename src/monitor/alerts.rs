use super::watch::{canonical_symbol, BandStatus, Breach, Watch, WatchRegistry};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// One price observation from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTick {
    pub symbol: String,
    pub price: Decimal,
}

impl PriceTick {
    pub fn new(symbol: &str, price: Decimal) -> Self {
        Self {
            symbol: canonical_symbol(symbol),
            price,
        }
    }
}

/// A watch whose band was left by `price`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breached {
    pub watch: Watch,
    pub price: Decimal,
    pub breach: Breach,
}

/// Matches ticks against the registry and keeps the latest price per symbol.
#[derive(Debug, Default)]
pub struct AlertEngine {
    prices: HashMap<String, Decimal>,
}

impl AlertEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caches the price, then evaluates the watch for this symbol if there is one.
    pub fn check_price(&mut self, registry: &WatchRegistry, tick: &PriceTick) -> Option<Breached> {
        self.prices.insert(tick.symbol.clone(), tick.price);

        let watch = registry.get(&tick.symbol)?;
        watch.check(tick.price).map(|breach| Breached {
            watch: watch.clone(),
            price: tick.price,
            breach,
        })
    }

    pub fn price(&self, symbol: &str) -> Option<Decimal> {
        self.prices.get(&canonical_symbol(symbol)).copied()
    }

    /// `None` until the feed has delivered a price for the watched symbol.
    pub fn status(&self, watch: &Watch) -> Option<BandStatus> {
        self.prices
            .get(watch.symbol())
            .map(|price| watch.status(*price))
    }
}
