//! VertMiner pool connection strategies
//!
//! This crate decides which upstream pool the miner is talking to at any
//! given moment and how it recovers when that pool misbehaves. It is the
//! routing layer between the wire clients (owned by the network backend)
//! and the miner runtime:
//!
//! - `SinglePoolStrategy` and `FailoverStrategy` select among the
//!   operator's configured pools, with zero-retry immediate failover or
//!   in-place retries;
//! - `DonateStrategy` time-multiplexes the workers between the operator
//!   pools and the developer donation pools, optionally tunnelling
//!   through the operator's active connection;
//! - `Timer` provides deterministic single-shot and periodic scheduling
//!   on the network loop's monotonic tick.
//!
//! Everything here runs on one cooperative event loop: strategy methods,
//! client events and timer fires are serialized, nothing blocks, and
//! work that must not re-enter a client (connecting the next pool after
//! a failure) is deferred to the following tick.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod strategy;
pub mod timer;

// Re-export main types
pub use client::{ClientFactory, PoolClient};
pub use config::{Pool, PoolMode, PoolsConfig, ProxyDonate, ProxyUrl};
pub use error::{Result, StratumError};
pub use protocol::{Algorithm, Extension, Job, JobResult, SubmitResult};
pub use strategy::{
    DonateProxy, DonateStrategy, FailoverStrategy, SinglePoolStrategy, Strategy, StrategyListener,
    UpstreamEndpoint,
};
pub use timer::Timer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
