use crate::error::WatchError;
use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Trims and uppercases a symbol so `btcusdt ` and `BTCUSDT` share one key.
pub fn canonical_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Which side of the band a price left through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Breach {
    Lower,
    Upper,
}

impl fmt::Display for Breach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Breach::Lower => write!(f, "below lower bound"),
            Breach::Upper => write!(f, "above upper bound"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandStatus {
    InRange,
    OutOfRange,
}

/// A symbol plus the price band it must stay inside.
///
/// Bounds are fixed at creation; a watch is never edited, only removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watch {
    symbol: String,
    lower: Decimal,
    upper: Decimal,
}

impl Watch {
    pub fn new(symbol: &str, lower: Decimal, upper: Decimal) -> Result<Self, WatchError> {
        let symbol = canonical_symbol(symbol);
        if symbol.is_empty() {
            return Err(WatchError::InvalidSymbol);
        }
        if lower >= upper {
            return Err(WatchError::InvalidRange {
                lower: lower.to_string(),
                upper: upper.to_string(),
            });
        }
        Ok(Self {
            symbol,
            lower,
            upper,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn lower(&self) -> Decimal {
        self.lower
    }

    pub fn upper(&self) -> Decimal {
        self.upper
    }

    /// Strict comparison: a price sitting exactly on a bound is still in range.
    pub fn check(&self, price: Decimal) -> Option<Breach> {
        if price < self.lower {
            Some(Breach::Lower)
        } else if price > self.upper {
            Some(Breach::Upper)
        } else {
            None
        }
    }

    pub fn status(&self, price: Decimal) -> BandStatus {
        match self.check(price) {
            Some(_) => BandStatus::OutOfRange,
            None => BandStatus::InRange,
        }
    }
}

/// Active watches keyed by canonical symbol, listed in insertion order.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    watches: HashMap<String, Watch>,
    order: Vec<String>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a registry from a stored snapshot, dropping entries that
    /// would not pass `add` today.
    pub fn from_snapshot(snapshot: Vec<Watch>) -> Self {
        let mut registry = Self::new();
        for watch in snapshot {
            if let Err(e) = registry.add(watch.symbol(), watch.lower(), watch.upper()) {
                warn!("Skipping stored watch {}: {}", watch.symbol(), e);
            }
        }
        registry
    }

    pub fn add(
        &mut self,
        symbol: &str,
        lower: Decimal,
        upper: Decimal,
    ) -> Result<Watch, WatchError> {
        let watch = Watch::new(symbol, lower, upper)?;
        if self.watches.contains_key(watch.symbol()) {
            return Err(WatchError::DuplicateSymbol(watch.symbol().to_string()));
        }
        self.order.push(watch.symbol().to_string());
        self.watches
            .insert(watch.symbol().to_string(), watch.clone());
        Ok(watch)
    }

    pub fn remove(&mut self, symbol: &str) -> Result<Watch, WatchError> {
        let symbol = canonical_symbol(symbol);
        let watch = self
            .watches
            .remove(&symbol)
            .ok_or_else(|| WatchError::NotFound(symbol.clone()))?;
        self.order.retain(|s| s != &symbol);
        Ok(watch)
    }

    /// Expects an already-canonical symbol; this sits on the per-tick path.
    pub fn get(&self, symbol: &str) -> Option<&Watch> {
        self.watches.get(symbol)
    }

    pub fn list(&self) -> Vec<Watch> {
        self.order
            .iter()
            .filter_map(|s| self.watches.get(s))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }
}
