use std::time::Duration;

use serde_json::Value;

use crate::client::PoolClient;
use crate::config::ProxyUrl;
use crate::protocol::{Algorithm, Job, JobResult, SubmitResult};

use super::{Strategy, StrategyListener};

/// Strategy over exactly one pool.
///
/// Exists so consumers can hold a single strategy shape whatever the
/// configured pool count; `FailoverStrategy` is the N-pool variant.
pub struct SinglePoolStrategy {
    client: Box<dyn PoolClient>,
    active: bool,
}

impl SinglePoolStrategy {
    pub fn new(
        mut client: Box<dyn PoolClient>,
        retries: u32,
        retry_pause: Duration,
        quiet: bool,
    ) -> Self {
        client.set_retries(retries);
        client.set_retry_pause(retry_pause.as_millis() as u64);
        client.set_quiet(quiet);

        Self {
            client,
            active: false,
        }
    }

    // Client events, delivered by the host loop.

    pub fn on_login(&mut self, params: &mut Value, listener: &mut dyn StrategyListener) {
        listener.on_login(self.client.as_ref(), params);
    }

    pub fn on_login_success(&mut self, listener: &mut dyn StrategyListener) {
        self.active = true;
        listener.on_active(self.client.as_ref());
    }

    pub fn on_job_received(&mut self, job: &Job, params: &Value, listener: &mut dyn StrategyListener) {
        listener.on_job(self.client.as_ref(), job, params);
    }

    pub fn on_close(&mut self, failures: i32, listener: &mut dyn StrategyListener) {
        // −1 marks an explicit local disconnect.
        if failures == -1 || !self.active {
            return;
        }

        self.active = false;
        listener.on_pause();
    }

    pub fn on_result_accepted(
        &mut self,
        result: &SubmitResult,
        error: Option<&str>,
        listener: &mut dyn StrategyListener,
    ) {
        listener.on_result_accepted(self.client.as_ref(), result, error);
    }

    pub fn on_verify_algorithm(
        &mut self,
        algorithm: Algorithm,
        ok: &mut bool,
        listener: &mut dyn StrategyListener,
    ) {
        listener.on_verify_algorithm(self.client.as_ref(), algorithm, ok);
    }
}

impl Strategy for SinglePoolStrategy {
    fn is_active(&self) -> bool {
        self.active
    }

    fn client(&self) -> Option<&dyn PoolClient> {
        self.active.then(|| self.client.as_ref())
    }

    fn connect(&mut self) {
        self.client.connect();
    }

    fn stop(&mut self, listener: &mut dyn StrategyListener) {
        self.client.disconnect();

        if std::mem::take(&mut self.active) {
            listener.on_pause();
        }
    }

    fn tick(&mut self, now_ms: u64, _listener: &mut dyn StrategyListener) {
        self.client.tick(now_ms);
    }

    fn resume(&mut self, listener: &mut dyn StrategyListener) {
        if !self.active {
            return;
        }

        if let Some(job) = self.client.job() {
            listener.on_job(self.client.as_ref(), job, &Value::Null);
        }
    }

    fn submit(&mut self, result: &JobResult) -> i64 {
        self.client.submit(result)
    }

    fn set_algo(&mut self, algo: Algorithm) {
        self.client.set_algo(algo);
    }

    fn set_proxy(&mut self, proxy: &ProxyUrl) {
        self.client.set_proxy(proxy);
    }
}
