// Library interface for relayd
// The binary is a thin wrapper; tests and benches use these modules directly.

pub mod config;
pub mod dial;
pub mod error;
pub mod event;
pub mod fifo;
pub mod line;
pub mod logging;
pub mod relay;
pub mod signal;
pub mod worker;

pub use config::Config;
pub use error::{RelayError, Result};
pub use relay::{LoopSettings, Relay};
