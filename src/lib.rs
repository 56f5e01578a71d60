//! hierview library: on-demand views over large hierarchical code graphs,
//! with edge aggregation, scope locking, feature highlighting and
//! execution-trace playback.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod server;
