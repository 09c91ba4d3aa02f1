use crate::monitor::AlertRecord;
use chrono::Local;
use log::warn;
use std::error::Error;
use std::io::{self, Write};

pub type DynError = Box<dyn Error + Send + Sync>;

/// Where triggered alerts get announced. Failures are logged by the caller and
/// never stop an alert from being recorded.
pub trait NotificationSink: Send {
    fn present(&mut self, record: &AlertRecord) -> Result<(), DynError>;
    fn play_sound(&mut self) -> Result<(), DynError>;
}

/// Logs the alert and rings the terminal bell. BEL on stderr does not
/// disturb the dashboard's alternate screen.
pub struct TerminalSink {
    bell: bool,
    out: Box<dyn Write + Send>,
}

impl TerminalSink {
    pub fn new(bell: bool) -> Self {
        Self::with_writer(bell, Box::new(io::stderr()))
    }

    pub fn with_writer(bell: bool, out: Box<dyn Write + Send>) -> Self {
        Self { bell, out }
    }
}

impl NotificationSink for TerminalSink {
    fn present(&mut self, record: &AlertRecord) -> Result<(), DynError> {
        warn!(
            "ALERT: {} at {} ({}) [{}]",
            record.symbol,
            record.price,
            record.breach,
            record.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        );
        Ok(())
    }

    fn play_sound(&mut self) -> Result<(), DynError> {
        if self.bell {
            self.out.write_all(b"\x07")?;
            self.out.flush()?;
        }
        Ok(())
    }
}
