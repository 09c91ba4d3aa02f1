//! Watch registry, match engine, alert history and the controller that owns them.

pub mod alerts;
pub mod controller;
pub mod history;
pub mod watch;

pub use alerts::PriceTick;
pub use controller::{Controller, ControllerHandle, MonitorEvent};
pub use history::AlertRecord;
pub use watch::Watch;
