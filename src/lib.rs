// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod notify;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::dispatch::{CycleReport, Dispatcher};
pub use crate::error::{ConfigError, DeliveryError, SourceError};
pub use crate::filter::{KeywordSet, SeenSet};
pub use crate::ingest::{PollCfg, PollLoop, StopHandle, StopReason, Tender};
pub use crate::notify::{Notification, Notifier, NotifierMux};
