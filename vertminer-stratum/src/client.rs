use crate::config::{Pool, ProxyUrl};
use crate::protocol::{Algorithm, Extension, Job, JobResult};

/// Capability set of a per-pool connection.
///
/// Implementations own the wire protocol: framing, TLS, DNS and the
/// reconnect timer. Strategies only route. Every method is nonblocking
/// and runs on the network event loop; connection events (login, job,
/// close, accepted result) are delivered by that loop into the owning
/// strategy's event methods, never re-entrantly from inside a call on
/// the same client.
pub trait PoolClient {
    /// Begin connecting. Idempotent.
    fn connect(&mut self);

    /// Drop the connection and cancel any reconnect timer. Idempotent.
    fn disconnect(&mut self);

    /// Queue a share for submission; returns the wire sequence number.
    fn submit(&mut self, result: &JobResult) -> i64;

    /// Advance internal timers to `now_ms`.
    fn tick(&mut self, now_ms: u64);

    fn set_retries(&mut self, retries: u32);
    fn set_retry_pause(&mut self, pause_ms: u64);
    fn set_quiet(&mut self, quiet: bool);
    fn set_pool(&mut self, pool: Pool);
    fn set_algo(&mut self, algo: Algorithm);
    fn set_proxy(&mut self, proxy: &ProxyUrl);

    /// Stable id assigned by the owning strategy (its index in the pool
    /// list).
    fn id(&self) -> usize;

    fn pool(&self) -> &Pool;

    /// Resolved peer address, when connected.
    fn ip(&self) -> Option<String>;

    fn is_tls(&self) -> bool;

    fn has_extension(&self, extension: Extension) -> bool;

    /// Most recent job received on this connection.
    fn job(&self) -> Option<&Job>;
}

/// Builds concrete clients for strategies that own their pool list.
///
/// The production factory lives next to the wire client; tests and the
/// donation scheduler receive one so they never depend on a concrete
/// client type.
pub trait ClientFactory {
    fn create(&self, id: usize, pool: &Pool) -> Box<dyn PoolClient>;
}
