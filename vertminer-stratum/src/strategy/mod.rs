//! Pool selection strategies.
//!
//! A strategy owns one or more `PoolClient`s and decides which of them is
//! being mined on at any moment. Upward events go through a
//! `StrategyListener` handed in on every call instead of a stored
//! back-reference, which lets one strategy nest inside another (the
//! donation scheduler wraps a failover) without reference cycles.

mod donate;
mod failover;
mod proxy;
mod single;

pub use donate::DonateStrategy;
pub use failover::FailoverStrategy;
pub use proxy::{DonateProxy, UpstreamEndpoint};
pub use single::SinglePoolStrategy;

use serde_json::Value;

use crate::client::PoolClient;
use crate::config::ProxyUrl;
use crate::protocol::{Algorithm, Job, JobResult, SubmitResult};

/// Upward-facing event surface of a strategy.
pub trait StrategyListener {
    /// A pool authorized this worker and is now the mining target.
    fn on_active(&mut self, client: &dyn PoolClient);

    /// No pool is authorized; workers should stop consuming jobs.
    fn on_pause(&mut self);

    /// New job from the active pool. `params` carries protocol extras and
    /// may be null.
    fn on_job(&mut self, client: &dyn PoolClient, job: &Job, params: &Value);

    /// A login request is about to go out; `params` may be amended in
    /// place before it is sent.
    fn on_login(&mut self, client: &dyn PoolClient, params: &mut Value);

    fn on_result_accepted(
        &mut self,
        client: &dyn PoolClient,
        result: &SubmitResult,
        error: Option<&str>,
    );

    /// The pool asked whether `algorithm` is supported; clear `*ok` to
    /// veto the job stream.
    fn on_verify_algorithm(&mut self, client: &dyn PoolClient, algorithm: Algorithm, ok: &mut bool);
}

/// Pool selection strategy over one or more clients.
pub trait Strategy {
    fn is_active(&self) -> bool;

    /// Currently authorized client, if any.
    fn client(&self) -> Option<&dyn PoolClient>;

    fn connect(&mut self);

    fn stop(&mut self, listener: &mut dyn StrategyListener);

    /// Advance client timers and drain deferred work. Called on every
    /// host tick with the loop's monotonic milliseconds.
    fn tick(&mut self, now_ms: u64, listener: &mut dyn StrategyListener);

    /// Re-emit the active client's current job, e.g. after a config
    /// reload paused the workers.
    fn resume(&mut self, listener: &mut dyn StrategyListener);

    /// Forward a solved share to the active client; −1 when none is
    /// active.
    fn submit(&mut self, result: &JobResult) -> i64;

    fn set_algo(&mut self, algo: Algorithm);

    fn set_proxy(&mut self, proxy: &ProxyUrl);
}
