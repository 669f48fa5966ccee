use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::client::PoolClient;
use crate::config::ProxyUrl;
use crate::protocol::{Algorithm, Job, JobResult, SubmitResult};

use super::{Strategy, StrategyListener};

/// Ordered failover over N pool clients.
///
/// Client ids are list indexes; lower index means higher priority. Two
/// retry modes:
///
/// - `retries == 0`: every close moves straight to the next pool, with
///   the connect deferred to the following tick and lower-priority pools
///   actively silenced so their reconnect timers cannot interfere with
///   the cascade.
/// - `retries > 0`: the primary is allowed to reconnect in place until
///   its failure count reaches `retries`, then the cascade advances.
///
/// The cascade never terminates on its own; after the last pool it wraps
/// back to the primary.
pub struct FailoverStrategy {
    clients: Vec<Box<dyn PoolClient>>,
    retries: u32,
    retry_pause: Duration,
    quiet: bool,

    index: usize,
    active: Option<usize>,

    /// Connect request raised from `on_close` and drained in `tick`.
    /// Connecting synchronously from inside a close callback re-enters
    /// the client while its DNS failure path is still unwinding.
    pending_connect: bool,
    pending_index: usize,

    /// Smallest client id whose events are still honored while a
    /// zero-retry cascade is progressing upward. Outlives the pending
    /// connect that set it.
    min_acceptable_index: usize,
}

impl FailoverStrategy {
    pub fn new(retries: u32, retry_pause: Duration, quiet: bool) -> Self {
        Self {
            clients: Vec::new(),
            retries,
            retry_pause,
            quiet,
            index: 0,
            active: None,
            pending_connect: false,
            pending_index: 0,
            min_acceptable_index: 0,
        }
    }

    /// Append a client; its id must equal its position in the list.
    pub fn add(&mut self, mut client: Box<dyn PoolClient>) {
        debug_assert_eq!(client.id(), self.clients.len());

        client.set_retries(self.retries);
        client.set_retry_pause(self.retry_pause.as_millis() as u64);
        client.set_quiet(self.quiet);

        self.clients.push(client);
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn connect_next(&mut self) {
        if !self.pending_connect || self.pending_index >= self.clients.len() {
            return;
        }

        debug!(
            target: "network",
            "failover: connecting to pool {} of {}",
            self.pending_index,
            self.clients.len()
        );

        self.pending_connect = false;
        self.index = self.pending_index;
        self.clients[self.index].connect();
    }

    // Client events, delivered by the host loop.

    pub fn on_login(&mut self, id: usize, params: &mut Value, listener: &mut dyn StrategyListener) {
        listener.on_login(self.clients[id].as_ref(), params);
    }

    pub fn on_login_success(&mut self, id: usize, listener: &mut dyn StrategyListener) {
        // A lower pool reconnecting after the cascade moved past it must
        // not steal the active slot.
        if self.retries == 0 && id < self.min_acceptable_index {
            self.clients[id].disconnect();
            return;
        }

        self.pending_connect = false;
        self.min_acceptable_index = 0;

        let mut active = self.active;
        if id == 0 || self.active.is_none() {
            active = Some(id);
        }

        // Silence every other pool, reconnect timers included; a lingering
        // primary timer would otherwise fire into the pool that just won.
        for i in 0..self.clients.len() {
            if active != Some(i) {
                self.clients[i].disconnect();
            }
        }

        if let Some(id) = active {
            if self.active != Some(id) {
                self.index = id;
                self.active = Some(id);
                listener.on_active(self.clients[id].as_ref());
            }
        }
    }

    pub fn on_job_received(
        &mut self,
        id: usize,
        job: &Job,
        params: &Value,
        listener: &mut dyn StrategyListener,
    ) {
        // Jobs from non-authorized pools are dropped.
        if self.active == Some(id) {
            listener.on_job(self.clients[id].as_ref(), job, params);
        }
    }

    pub fn on_close(&mut self, id: usize, failures: i32, listener: &mut dyn StrategyListener) {
        // −1 marks an explicit local disconnect.
        if failures == -1 {
            return;
        }

        if self.active == Some(id) {
            self.active = None;
            listener.on_pause();
        }

        if self.retries == 0 {
            // Closes from pools the cascade already passed are stale;
            // re-disconnect to cancel their reconnect timers.
            if id < self.min_acceptable_index {
                self.clients[id].disconnect();
                return;
            }

            if self.index == id {
                // Silence every pool up to and including this one before
                // moving on, or their reconnect timers fire into the next
                // attempt.
                for i in 0..=self.index {
                    self.clients[i].disconnect();
                }

                if self.clients.len() - self.index > 1 {
                    self.pending_index = self.index + 1;
                    self.min_acceptable_index = self.pending_index;
                } else {
                    // Exhausted; wrap to the primary and start over.
                    self.pending_index = 0;
                    self.min_acceptable_index = 0;
                }

                // Drained on the next tick, never from inside this
                // callback.
                self.pending_connect = true;
            }

            return;
        }

        if self.index == 0 && (failures as u32) < self.retries {
            return;
        }

        if self.index == id && self.clients.len() - self.index > 1 {
            self.index += 1;
            self.clients[self.index].connect();
        }
    }

    pub fn on_result_accepted(
        &mut self,
        id: usize,
        result: &SubmitResult,
        error: Option<&str>,
        listener: &mut dyn StrategyListener,
    ) {
        listener.on_result_accepted(self.clients[id].as_ref(), result, error);
    }

    pub fn on_verify_algorithm(
        &mut self,
        id: usize,
        algorithm: Algorithm,
        ok: &mut bool,
        listener: &mut dyn StrategyListener,
    ) {
        listener.on_verify_algorithm(self.clients[id].as_ref(), algorithm, ok);
    }
}

impl Strategy for FailoverStrategy {
    fn is_active(&self) -> bool {
        self.active.is_some()
    }

    fn client(&self) -> Option<&dyn PoolClient> {
        self.active.map(|id| self.clients[id].as_ref())
    }

    fn connect(&mut self) {
        self.clients[self.index].connect();
    }

    fn stop(&mut self, listener: &mut dyn StrategyListener) {
        for client in &mut self.clients {
            client.disconnect();
        }

        self.index = 0;
        self.pending_connect = false;
        self.min_acceptable_index = 0;

        if self.active.take().is_some() {
            listener.on_pause();
        }
    }

    fn tick(&mut self, now_ms: u64, _listener: &mut dyn StrategyListener) {
        for client in &mut self.clients {
            client.tick(now_ms);
        }

        // Drain any connect deferred from a close callback.
        self.connect_next();
    }

    fn resume(&mut self, listener: &mut dyn StrategyListener) {
        let Some(id) = self.active else {
            return;
        };

        if let Some(job) = self.clients[id].job() {
            listener.on_job(self.clients[id].as_ref(), job, &Value::Null);
        }
    }

    fn submit(&mut self, result: &JobResult) -> i64 {
        match self.active {
            Some(id) => self.clients[id].submit(result),
            None => -1,
        }
    }

    fn set_algo(&mut self, algo: Algorithm) {
        for client in &mut self.clients {
            client.set_algo(algo);
        }
    }

    fn set_proxy(&mut self, proxy: &ProxyUrl) {
        for client in &mut self.clients {
            client.set_proxy(proxy);
        }
    }
}
