// src/lib.rs
// Library surface shared by the Shuttle binary and integration tests.

pub mod analyze;
pub mod api;
pub mod broker;
pub mod collect;
pub mod config;
pub mod cover;
pub mod hot;
pub mod metrics;
pub mod sentiment;
pub mod store;

pub use crate::api::{create_router, AppState};
pub use crate::broker::{ChannelBroker, ChannelEvent};
pub use crate::collect::Collector;
