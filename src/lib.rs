//! Reception quality monitoring for SBS BaseStation feeds.
//!
//! An ingestion task keeps a TCP connection to a dump1090-style feed and
//! queues every retained record. An aggregation task wakes on wall-clock
//! window boundaries, folds the queued records into per-aircraft state and
//! publishes distribution statistics for a Munin-style agent.

pub mod config;
pub mod daemon;
pub mod feed;
pub mod geo;
pub mod plugin;
pub mod queue;
pub mod sbs;
pub mod shutdown;
pub mod snapshot;
pub mod state;
pub mod stats;
pub mod window;
