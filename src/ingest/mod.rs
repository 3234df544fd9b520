// src/ingest/mod.rs
pub mod mercado_publico;
pub mod poller;
pub mod types;

pub use mercado_publico::MercadoPublicoClient;
pub use poller::{PollCfg, PollLoop, StopHandle, StopReason};
pub use types::{Listing, QueryParams, Tender, TenderSource};
