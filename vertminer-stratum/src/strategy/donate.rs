use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::client::{ClientFactory, PoolClient};
use crate::config::{Pool, PoolMode, PoolsConfig, ProxyDonate, ProxyUrl};
use crate::protocol::{Algorithm, Job, JobResult, SubmitResult};
use crate::timer::Timer;

use super::proxy::{DonateProxy, UpstreamEndpoint};
use super::{FailoverStrategy, SinglePoolStrategy, Strategy, StrategyListener};

const DONATE_HOST: &str = "pool-global.tari.snipanet.com";
const DONATE_PORT: u16 = 3333;
#[cfg(feature = "tls")]
const DONATE_HOST_TLS: &str = "pool-global.tari.snipanet.com";
#[cfg(feature = "tls")]
const DONATE_PORT_TLS: u16 = 9000;
const DONATE_HOST_BACKUP: &str = "xtm-rx.kryptex.network";
const DONATE_PORT_BACKUP: u16 = 7038;

const DONATE_WALLET: &str =
    "127PHAz3ePq93yWJ1Gsz8VzznQFui5LYne5jbwtErzD5WsnqWAfPR37KwMyGAf5UjD2nXbYZiQPz7GMTEQRCTrGV3fH";

/// Grace period between the end of a donation window and teardown, so
/// the miner can swap jobs back to the operator pool without losing a
/// share on the boundary.
const WAIT_GRACE_MS: u64 = 3_000;

/// Pause before retrying after a failed donation connect.
const CONNECT_RETRY_MS: u64 = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    New,
    Idle,
    Connect,
    Active,
    Wait,
}

/// Donation window scheduler.
///
/// Time-multiplexes between the operator's pools and a fixed donation
/// pool set: sleeps for a jittered idle window, connects (directly
/// through a nested strategy, or tunnelled through the operator's
/// connection when proxying is allowed), mines for the donation window,
/// then hands the workers back after a short grace period.
pub struct DonateStrategy {
    core: Core,
    inner: InnerStrategy,
    proxy: Option<DonateProxy>,
    /// Clients retired mid-turn; dropped at the next tick so nothing
    /// tears down a client inside one of its own callbacks.
    retired: Vec<Box<dyn PoolClient>>,
    upstream: Option<UpstreamEndpoint>,
    pools: Vec<Pool>,
    user_id: String,
    proxy_donate: ProxyDonate,
    factory: Box<dyn ClientFactory>,
}

/// Clock, login advertisement and state machine fields, split out so the
/// nested strategy's events can borrow them while the nested strategy
/// itself is borrowed.
struct Core {
    donate_time_ms: u64,
    idle_time_ms: u64,
    donate_level: u8,
    state: State,
    now_ms: u64,
    wait_deadline_ms: u64,
    timer: Timer,
    algorithm: Option<Algorithm>,
    algorithms: Vec<Algorithm>,
    diff: u64,
    height: u64,
    seed: Vec<u8>,
}

impl Core {
    fn is_active(&self) -> bool {
        self.state == State::Active
    }

    fn enter_active(&mut self) {
        self.state = State::Active;

        info!(
            target: "network",
            "dev donate mining for {:.1} minutes",
            self.donate_time_ms as f64 / 60_000.0
        );

        self.timer.start(self.donate_time_ms, 0);
    }

    /// Schedule the next idle window with jitter in `[min, max]` of the
    /// base idle time.
    fn idle(&mut self, min: f64, max: f64) {
        let jitter = rand::thread_rng().gen_range(min..max);
        let delay_ms = (self.idle_time_ms as f64 * jitter) as u64;

        self.timer.start(delay_ms, 0);

        info!(
            target: "network",
            "dev donate idle, next donation in {:.1} minutes",
            delay_ms as f64 / 60_000.0
        );
    }

    /// Amend login `params` so the donation pool can dispatch a
    /// compatible job: supported algorithms (active one first), current
    /// difficulty, height, and the epoch seed when there is one.
    fn set_params(&self, params: &mut Value) {
        let mut algorithms = self.algorithms.clone();
        if let Some(active) = self.algorithm {
            if let Some(pos) = algorithms.iter().position(|a| *a == active) {
                if pos > 0 {
                    algorithms.swap(0, pos);
                }
            }
        }

        let Value::Object(map) = params else {
            return;
        };

        map.insert(
            "algo".to_string(),
            Value::Array(
                algorithms
                    .iter()
                    .map(|a| Value::String(a.name().to_string()))
                    .collect(),
            ),
        );
        map.insert("diff".to_string(), json!(self.diff));
        map.insert("height".to_string(), json!(self.height));

        if !self.seed.is_empty() {
            map.insert("seed_hash".to_string(), Value::String(hex::encode(&self.seed)));
        }
    }
}

/// Listener the nested strategy reports into: translates its events into
/// donation state transitions and forwards the rest.
struct NestedDispatch<'a> {
    core: &'a mut Core,
    listener: &'a mut dyn StrategyListener,
}

impl StrategyListener for NestedDispatch<'_> {
    fn on_active(&mut self, client: &dyn PoolClient) {
        if self.core.is_active() {
            return;
        }

        self.core.enter_active();
        self.listener.on_active(client);
    }

    fn on_pause(&mut self) {
        // The operator pause signal comes from the donation clock, not
        // from the nested pool's connection state.
    }

    fn on_job(&mut self, client: &dyn PoolClient, job: &Job, params: &Value) {
        // Outside the donation window the operator pool's last job stays
        // authoritative.
        if self.core.is_active() {
            self.listener.on_job(client, job, params);
        }
    }

    fn on_login(&mut self, _client: &dyn PoolClient, params: &mut Value) {
        self.core.set_params(params);
    }

    fn on_result_accepted(
        &mut self,
        client: &dyn PoolClient,
        result: &SubmitResult,
        error: Option<&str>,
    ) {
        self.listener.on_result_accepted(client, result, error);
    }

    fn on_verify_algorithm(&mut self, client: &dyn PoolClient, algorithm: Algorithm, ok: &mut bool) {
        self.listener.on_verify_algorithm(client, algorithm, ok);
    }
}

enum InnerStrategy {
    Single(SinglePoolStrategy),
    Failover(FailoverStrategy),
}

impl InnerStrategy {
    fn is_active(&self) -> bool {
        match self {
            InnerStrategy::Single(s) => s.is_active(),
            InnerStrategy::Failover(s) => s.is_active(),
        }
    }

    fn client(&self) -> Option<&dyn PoolClient> {
        match self {
            InnerStrategy::Single(s) => s.client(),
            InnerStrategy::Failover(s) => s.client(),
        }
    }

    fn connect(&mut self) {
        match self {
            InnerStrategy::Single(s) => s.connect(),
            InnerStrategy::Failover(s) => s.connect(),
        }
    }

    fn stop(&mut self, listener: &mut dyn StrategyListener) {
        match self {
            InnerStrategy::Single(s) => s.stop(listener),
            InnerStrategy::Failover(s) => s.stop(listener),
        }
    }

    fn tick(&mut self, now_ms: u64, listener: &mut dyn StrategyListener) {
        match self {
            InnerStrategy::Single(s) => s.tick(now_ms, listener),
            InnerStrategy::Failover(s) => s.tick(now_ms, listener),
        }
    }

    fn submit(&mut self, result: &JobResult) -> i64 {
        match self {
            InnerStrategy::Single(s) => s.submit(result),
            InnerStrategy::Failover(s) => s.submit(result),
        }
    }

    fn set_algo(&mut self, algo: Algorithm) {
        match self {
            InnerStrategy::Single(s) => s.set_algo(algo),
            InnerStrategy::Failover(s) => s.set_algo(algo),
        }
    }

    fn set_proxy(&mut self, proxy: &ProxyUrl) {
        match self {
            InnerStrategy::Single(s) => s.set_proxy(proxy),
            InnerStrategy::Failover(s) => s.set_proxy(proxy),
        }
    }

    fn on_login(&mut self, id: usize, params: &mut Value, listener: &mut dyn StrategyListener) {
        match self {
            InnerStrategy::Single(s) => s.on_login(params, listener),
            InnerStrategy::Failover(s) => s.on_login(id, params, listener),
        }
    }

    fn on_login_success(&mut self, id: usize, listener: &mut dyn StrategyListener) {
        match self {
            InnerStrategy::Single(s) => s.on_login_success(listener),
            InnerStrategy::Failover(s) => s.on_login_success(id, listener),
        }
    }

    fn on_job_received(
        &mut self,
        id: usize,
        job: &Job,
        params: &Value,
        listener: &mut dyn StrategyListener,
    ) {
        match self {
            InnerStrategy::Single(s) => s.on_job_received(job, params, listener),
            InnerStrategy::Failover(s) => s.on_job_received(id, job, params, listener),
        }
    }

    fn on_close(&mut self, id: usize, failures: i32, listener: &mut dyn StrategyListener) {
        match self {
            InnerStrategy::Single(s) => s.on_close(failures, listener),
            InnerStrategy::Failover(s) => s.on_close(id, failures, listener),
        }
    }

    fn on_result_accepted(
        &mut self,
        id: usize,
        result: &SubmitResult,
        error: Option<&str>,
        listener: &mut dyn StrategyListener,
    ) {
        match self {
            InnerStrategy::Single(s) => s.on_result_accepted(result, error, listener),
            InnerStrategy::Failover(s) => s.on_result_accepted(id, result, error, listener),
        }
    }

    fn on_verify_algorithm(
        &mut self,
        id: usize,
        algorithm: Algorithm,
        ok: &mut bool,
        listener: &mut dyn StrategyListener,
    ) {
        match self {
            InnerStrategy::Single(s) => s.on_verify_algorithm(algorithm, ok, listener),
            InnerStrategy::Failover(s) => s.on_verify_algorithm(id, algorithm, ok, listener),
        }
    }
}

impl DonateStrategy {
    pub fn new(
        config: &PoolsConfig,
        algorithms: Vec<Algorithm>,
        factory: Box<dyn ClientFactory>,
    ) -> Self {
        let level = config.donate_level.min(100);

        #[cfg(feature = "donation-test-mode")]
        let (donate_time_ms, idle_time_ms) = (30 * 1_000, 150 * 1_000);
        #[cfg(not(feature = "donation-test-mode"))]
        let (donate_time_ms, idle_time_ms) = (
            u64::from(level) * 60 * 1_000,
            (100 - u64::from(level)) * 60 * 1_000,
        );

        // Random worker suffix so concurrent miners stay distinguishable
        // to the donation pool.
        let worker: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        let user_id = format!("{DONATE_WALLET}/{worker}");
        let solo_user_id = format!("solo:{DONATE_WALLET}/{worker}");

        // Fixed order: TLS endpoint, plaintext endpoint on the same
        // host, solo backup. AutoEth on all three so the client can
        // negotiate either login sequence.
        let mut pools = Vec::new();

        #[cfg(feature = "tls")]
        {
            let mut pool = Pool::new(DONATE_HOST_TLS, DONATE_PORT_TLS, user_id.as_str());
            pool.keepalive = true;
            pool.tls = true;
            pool.mode = PoolMode::AutoEth;
            pools.push(pool);
        }

        let mut pool = Pool::new(DONATE_HOST, DONATE_PORT, user_id.as_str());
        pool.keepalive = true;
        pool.mode = PoolMode::AutoEth;
        pools.push(pool);

        let mut backup = Pool::new(DONATE_HOST_BACKUP, DONATE_PORT_BACKUP, solo_user_id);
        backup.keepalive = true;
        backup.mode = PoolMode::AutoEth;
        pools.push(backup);

        let inner = if pools.len() > 1 {
            // Zero retries with a short pause: the first error moves
            // straight to the backup donation pool.
            let mut failover = FailoverStrategy::new(0, Duration::from_secs(1), true);
            for (id, pool) in pools.iter().enumerate() {
                failover.add(factory.create(id, pool));
            }
            InnerStrategy::Failover(failover)
        } else {
            InnerStrategy::Single(SinglePoolStrategy::new(
                factory.create(0, &pools[0]),
                0,
                Duration::from_secs(1),
                true,
            ))
        };

        let mut strategy = Self {
            core: Core {
                donate_time_ms,
                idle_time_ms,
                donate_level: level,
                state: State::New,
                now_ms: 0,
                wait_deadline_ms: 0,
                timer: Timer::new(),
                algorithm: None,
                algorithms,
                diff: 0,
                height: 0,
                seed: Vec::new(),
            },
            inner,
            proxy: None,
            retired: Vec::new(),
            upstream: None,
            pools,
            user_id,
            proxy_donate: config.proxy_donate,
            factory,
        };

        strategy.enter_first_idle();
        strategy
    }

    fn enter_first_idle(&mut self) {
        debug_assert_eq!(self.core.state, State::New);
        self.core.state = State::Idle;

        info!(
            target: "network",
            "dev donate initialized, level {}% ({} min donate, {} min idle)",
            self.core.donate_level,
            self.core.donate_time_ms / 60_000,
            self.core.idle_time_ms / 60_000
        );

        self.core.idle(0.5, 1.5);
    }

    /// Refresh algorithm, difficulty, height, seed and the proxy target
    /// from the operator's active connection. The host calls this with
    /// every operator job.
    pub fn update(&mut self, client: &dyn PoolClient, job: &Job) {
        self.set_algo(job.algorithm);
        self.set_proxy(&client.pool().proxy);

        self.core.diff = job.diff;
        self.core.height = job.height;
        self.core.seed = job.seed.clone();

        self.upstream = Some(UpstreamEndpoint::capture(client));
    }

    fn set_state(&mut self, state: State, listener: &mut dyn StrategyListener) {
        if self.core.state == state {
            return;
        }

        let prev = self.core.state;
        self.core.state = state;

        match state {
            State::New => {}

            State::Idle => {
                if prev == State::Connect {
                    warn!(
                        target: "network",
                        "dev donate connection failed, retry in {} seconds",
                        CONNECT_RETRY_MS / 1_000
                    );
                    self.core.timer.start(CONNECT_RETRY_MS, 0);
                } else {
                    {
                        let mut dispatch = NestedDispatch {
                            core: &mut self.core,
                            listener: &mut *listener,
                        };
                        self.inner.stop(&mut dispatch);
                    }

                    if let Some(proxy) = self.proxy.take() {
                        self.retired.push(proxy.into_client());
                    }

                    self.core.idle(0.8, 1.2);
                }
            }

            State::Connect => {
                info!(
                    target: "network",
                    "dev donate connecting to {}:{}",
                    DONATE_HOST,
                    DONATE_PORT
                );
                self.connect_donate();
            }

            State::Active => {
                self.core.enter_active();
            }

            State::Wait => {
                self.core.wait_deadline_ms = self.core.now_ms + WAIT_GRACE_MS;
                listener.on_pause();
            }
        }
    }

    fn on_timer(&mut self, listener: &mut dyn StrategyListener) {
        let next = if self.core.is_active() {
            State::Wait
        } else {
            State::Connect
        };
        self.set_state(next, listener);
    }

    fn connect_donate(&mut self) {
        self.proxy = self.create_proxy();

        match &mut self.proxy {
            Some(proxy) => proxy.connect(),
            None => self.inner.connect(),
        }
    }

    fn create_proxy(&self) -> Option<DonateProxy> {
        if self.proxy_donate == ProxyDonate::None {
            return None;
        }

        let upstream = self.upstream.as_ref()?;
        DonateProxy::open(upstream, &self.user_id, self.factory.as_ref())
    }

    // Client events from the donation connections: the proxy when one is
    // open, otherwise the nested strategy's pools.

    pub fn on_client_login(
        &mut self,
        id: usize,
        params: &mut Value,
        listener: &mut dyn StrategyListener,
    ) {
        if let Some(proxy) = &self.proxy {
            // Tunnelled login carries the donation pool URL so the
            // operator pool knows where to forward the session.
            let plain = usize::from(cfg!(feature = "tls"));
            let url = if cfg!(feature = "tls") && proxy.is_tls() {
                format!("stratum+ssl://{}", self.pools[0].url())
            } else {
                self.pools[plain].url()
            };

            if let Value::Object(map) = params {
                map.insert("url".to_string(), Value::String(url));
            }

            self.core.set_params(params);
            return;
        }

        let mut dispatch = NestedDispatch {
            core: &mut self.core,
            listener: &mut *listener,
        };
        self.inner.on_login(id, params, &mut dispatch);
    }

    pub fn on_client_login_success(&mut self, id: usize, listener: &mut dyn StrategyListener) {
        if let Some(proxy) = &self.proxy {
            if self.core.is_active() {
                return;
            }

            self.core.enter_active();
            listener.on_active(proxy.client());
            return;
        }

        let mut dispatch = NestedDispatch {
            core: &mut self.core,
            listener: &mut *listener,
        };
        self.inner.on_login_success(id, &mut dispatch);
    }

    pub fn on_client_job_received(
        &mut self,
        id: usize,
        job: &Job,
        params: &Value,
        listener: &mut dyn StrategyListener,
    ) {
        if let Some(proxy) = &self.proxy {
            if self.core.is_active() {
                listener.on_job(proxy.client(), job, params);
            }
            return;
        }

        let mut dispatch = NestedDispatch {
            core: &mut self.core,
            listener: &mut *listener,
        };
        self.inner.on_job_received(id, job, params, &mut dispatch);
    }

    pub fn on_client_close(&mut self, id: usize, failures: i32, listener: &mut dyn StrategyListener) {
        if self.proxy.is_some() {
            if failures != 2 {
                return;
            }

            if self.proxy_donate == ProxyDonate::Auto {
                // Tunnel failed twice in a row: drop it and go direct
                // through the nested strategy.
                if let Some(proxy) = self.proxy.take() {
                    self.retired.push(proxy.into_client());
                }
                self.inner.connect();
            } else if self.core.state == State::Connect {
                self.set_state(State::Idle, listener);
            }

            return;
        }

        let mut dispatch = NestedDispatch {
            core: &mut self.core,
            listener: &mut *listener,
        };
        self.inner.on_close(id, failures, &mut dispatch);
    }

    pub fn on_client_result_accepted(
        &mut self,
        id: usize,
        result: &SubmitResult,
        error: Option<&str>,
        listener: &mut dyn StrategyListener,
    ) {
        if let Some(proxy) = &self.proxy {
            listener.on_result_accepted(proxy.client(), result, error);
            return;
        }

        let mut dispatch = NestedDispatch {
            core: &mut self.core,
            listener: &mut *listener,
        };
        self.inner.on_result_accepted(id, result, error, &mut dispatch);
    }

    pub fn on_client_verify_algorithm(
        &mut self,
        id: usize,
        algorithm: Algorithm,
        ok: &mut bool,
        listener: &mut dyn StrategyListener,
    ) {
        if let Some(proxy) = &self.proxy {
            listener.on_verify_algorithm(proxy.client(), algorithm, ok);
            return;
        }

        let mut dispatch = NestedDispatch {
            core: &mut self.core,
            listener: &mut *listener,
        };
        self.inner.on_verify_algorithm(id, algorithm, ok, &mut dispatch);
    }
}

impl Strategy for DonateStrategy {
    fn is_active(&self) -> bool {
        self.core.is_active()
    }

    fn client(&self) -> Option<&dyn PoolClient> {
        match &self.proxy {
            Some(proxy) => Some(proxy.client()),
            None => self.inner.client(),
        }
    }

    fn connect(&mut self) {
        self.connect_donate();
    }

    fn stop(&mut self, listener: &mut dyn StrategyListener) {
        self.core.timer.stop();

        let mut dispatch = NestedDispatch {
            core: &mut self.core,
            listener: &mut *listener,
        };
        self.inner.stop(&mut dispatch);
    }

    fn tick(&mut self, now_ms: u64, listener: &mut dyn StrategyListener) {
        self.core.now_ms = now_ms;

        // Clients retired during the previous turn are torn down here,
        // outside any of their callbacks.
        self.retired.clear();

        if self.core.timer.tick(now_ms) {
            self.on_timer(listener);
        }

        {
            let mut dispatch = NestedDispatch {
                core: &mut self.core,
                listener: &mut *listener,
            };
            self.inner.tick(now_ms, &mut dispatch);
        }

        if let Some(proxy) = &mut self.proxy {
            proxy.tick(now_ms);
        }

        if self.core.state == State::Wait && now_ms > self.core.wait_deadline_ms {
            self.set_state(State::Idle, listener);
        }
    }

    fn resume(&mut self, _listener: &mut dyn StrategyListener) {}

    fn submit(&mut self, result: &JobResult) -> i64 {
        match &mut self.proxy {
            Some(proxy) => proxy.submit(result),
            None => self.inner.submit(result),
        }
    }

    fn set_algo(&mut self, algo: Algorithm) {
        self.core.algorithm = Some(algo);
        self.inner.set_algo(algo);
    }

    fn set_proxy(&mut self, proxy: &ProxyUrl) {
        self.inner.set_proxy(proxy);
    }
}
