//! Relay publishing for OpenMods records.
//!
//! This crate provides:
//! - A transport trait ([`RelaySender`]) with a pooled WebSocket
//!   implementation that speaks the `["EVENT", ...]` / `["OK", ...]`
//!   relay protocol
//! - A concurrent publisher with per-relay retry, per-attempt timeout,
//!   linear backoff and cooperative cancellation
//! - Pure aggregation of per-relay outcomes for report rendering
//!
//! # Example
//!
//! ```rust,no_run
//! use openmods_relay::{PublishOptions, RelayPublisher, summarize};
//! # async fn run(event: openmods_core::Event) {
//! let publisher = RelayPublisher::websocket();
//! let relays = vec![
//!     "wss://relay.damus.io".to_string(),
//!     "wss://nos.lol".to_string(),
//! ];
//!
//! let outcomes = publisher
//!     .publish(&event, &relays, &PublishOptions::default())
//!     .await;
//! publisher.close().await;
//!
//! let summary = summarize(&outcomes);
//! println!("{} ok, {} failed", summary.succeeded, summary.failed);
//! # }
//! ```

mod error;
mod publisher;
mod report;
mod sender;

pub use error::SendError;
pub use publisher::{PublishOptions, PublishOutcome, PublishStatus, RelayPublisher};
pub use report::{PublishSummary, RelayDiagnostic, summarize};
pub use sender::{RelaySender, WsRelaySender};
