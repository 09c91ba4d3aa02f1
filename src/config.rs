use crate::api::binance::ws::{BINANCE_MARK_PRICE_URL, RECONNECT_DELAY};
use clap::Parser;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "pricewatch", about = "Watch price bands on a live feed and alert when one is left")]
pub struct Args {
    /// WebSocket URL of the mark price stream
    #[arg(long, default_value = BINANCE_MARK_PRICE_URL)]
    pub feed_url: String,

    /// Directory holding the watch list and alert history
    #[arg(long, default_value = "pricewatch-data")]
    pub data_dir: PathBuf,

    /// Seconds to wait before reconnecting a dropped feed
    #[arg(long, default_value_t = RECONNECT_DELAY.as_secs())]
    pub reconnect_secs: u64,

    /// Watch to register at startup, as SYMBOL:LOWER:UPPER (repeatable)
    #[arg(long = "watch", value_name = "SYMBOL:LOWER:UPPER")]
    pub watches: Vec<WatchArg>,

    /// Log alerts instead of drawing the dashboard
    #[arg(long)]
    pub headless: bool,

    /// Write logs here (default: stderr when headless, DATA_DIR/pricewatch.log otherwise)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Do not ring the terminal bell on alerts
    #[arg(long)]
    pub no_bell: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

pub const DEFAULT_LOG_FILE: &str = "pricewatch.log";

impl Args {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_secs)
    }

    /// File to log into, or `None` for stderr. The dashboard owns the
    /// terminal, so it never logs to stderr.
    pub fn log_path(&self) -> Option<PathBuf> {
        match &self.log_file {
            Some(path) => Some(path.clone()),
            None if self.headless => None,
            None => Some(self.data_dir.join(DEFAULT_LOG_FILE)),
        }
    }
}

/// A watch as typed by the operator. Range checks happen in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchArg {
    pub symbol: String,
    pub lower: Decimal,
    pub upper: Decimal,
}

impl FromStr for WatchArg {
    type Err = String;

    /// Accepts `SYMBOL:LOWER:UPPER` or whitespace-separated fields.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = if s.contains(':') {
            s.split(':').map(str::trim).collect()
        } else {
            s.split_whitespace().collect()
        };

        let [symbol, lower, upper] = parts.as_slice() else {
            return Err(format!("expected SYMBOL:LOWER:UPPER, got '{}'", s));
        };
        let parse = |name: &str, value: &str| {
            Decimal::from_str(value).map_err(|e| format!("invalid {} '{}': {}", name, value, e))
        };

        Ok(Self {
            symbol: symbol.to_string(),
            lower: parse("lower bound", *lower)?,
            upper: parse("upper bound", *upper)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_watch_spec_forms() {
        let colon: WatchArg = "btcusdt:60000:70000".parse().unwrap();
        let spaced: WatchArg = "btcusdt 60000 70000".parse().unwrap();

        assert_eq!(colon, spaced);
        assert_eq!(colon.lower, dec!(60000));
        assert_eq!(colon.upper, dec!(70000));
    }

    #[test]
    fn test_watch_spec_errors() {
        assert!("BTCUSDT:1".parse::<WatchArg>().is_err());
        assert!("BTCUSDT:abc:2".parse::<WatchArg>().is_err());
        assert!("".parse::<WatchArg>().is_err());
    }

    #[test]
    fn test_args_defaults_and_repeated_watches() {
        let args = Args::try_parse_from([
            "pricewatch",
            "--watch",
            "BTCUSDT:60000:70000",
            "--watch",
            "ETHUSDT:2000:3000",
            "--headless",
        ])
        .unwrap();

        assert_eq!(args.feed_url, BINANCE_MARK_PRICE_URL);
        assert_eq!(args.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(args.watches.len(), 2);
        assert!(args.headless);
        assert!(args.log_file.is_none());
        assert!(!args.no_bell);
    }

    #[test]
    fn test_no_bell_flag() {
        let args = Args::try_parse_from(["pricewatch", "--no-bell"]).unwrap();
        assert!(args.no_bell);
        assert!(!args.headless);
    }

    #[test]
    fn test_log_path_defaults() {
        let dashboard = Args::try_parse_from(["pricewatch", "--data-dir", "/tmp/pw"]).unwrap();
        assert_eq!(
            dashboard.log_path(),
            Some(PathBuf::from("/tmp/pw").join(DEFAULT_LOG_FILE))
        );

        let headless = Args::try_parse_from(["pricewatch", "--headless"]).unwrap();
        assert_eq!(headless.log_path(), None);

        let explicit =
            Args::try_parse_from(["pricewatch", "--headless", "--log-file", "out.log"]).unwrap();
        assert_eq!(explicit.log_path(), Some(PathBuf::from("out.log")));
    }
}
