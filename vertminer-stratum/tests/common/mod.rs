//! Shared test doubles: recording pool clients and a recording listener.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use vertminer_stratum::{
    Algorithm, ClientFactory, Extension, Job, JobResult, Pool, PoolClient, ProxyUrl, SubmitResult,
    StrategyListener,
};

/// Calls observed by a mock client, shared with the test body.
#[derive(Debug, Default)]
pub struct ClientLog {
    pub connects: usize,
    pub disconnects: usize,
    pub submits: usize,
    pub ticks: usize,
    pub last_tick: u64,
    pub retries: Option<u32>,
    pub retry_pause_ms: Option<u64>,
    pub quiet: Option<bool>,
    pub algos: Vec<Algorithm>,
}

pub struct MockClient {
    id: usize,
    pool: Pool,
    log: Rc<RefCell<ClientLog>>,
    job: Option<Job>,
    ip: Option<String>,
    tls: bool,
    extensions: Vec<Extension>,
}

impl MockClient {
    pub fn new(id: usize, pool: Pool, log: Rc<RefCell<ClientLog>>) -> Self {
        Self {
            id,
            pool,
            log,
            job: None,
            ip: None,
            tls: false,
            extensions: Vec::new(),
        }
    }

    pub fn with_job(mut self, job: Job) -> Self {
        self.job = Some(job);
        self
    }

    pub fn with_ip(mut self, ip: &str) -> Self {
        self.ip = Some(ip.to_string());
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<Extension>) -> Self {
        self.extensions = extensions;
        self
    }
}

impl PoolClient for MockClient {
    fn connect(&mut self) {
        self.log.borrow_mut().connects += 1;
    }

    fn disconnect(&mut self) {
        self.log.borrow_mut().disconnects += 1;
    }

    fn submit(&mut self, _result: &JobResult) -> i64 {
        let mut log = self.log.borrow_mut();
        log.submits += 1;
        log.submits as i64
    }

    fn tick(&mut self, now_ms: u64) {
        let mut log = self.log.borrow_mut();
        log.ticks += 1;
        log.last_tick = now_ms;
    }

    fn set_retries(&mut self, retries: u32) {
        self.log.borrow_mut().retries = Some(retries);
    }

    fn set_retry_pause(&mut self, pause_ms: u64) {
        self.log.borrow_mut().retry_pause_ms = Some(pause_ms);
    }

    fn set_quiet(&mut self, quiet: bool) {
        self.log.borrow_mut().quiet = Some(quiet);
    }

    fn set_pool(&mut self, pool: Pool) {
        self.pool = pool;
    }

    fn set_algo(&mut self, algo: Algorithm) {
        self.log.borrow_mut().algos.push(algo);
    }

    fn set_proxy(&mut self, _proxy: &ProxyUrl) {}

    fn id(&self) -> usize {
        self.id
    }

    fn pool(&self) -> &Pool {
        &self.pool
    }

    fn ip(&self) -> Option<String> {
        self.ip.clone()
    }

    fn is_tls(&self) -> bool {
        self.tls
    }

    fn has_extension(&self, extension: Extension) -> bool {
        self.extensions.contains(&extension)
    }

    fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }
}

/// A client built through the factory, with its config and call log.
pub struct CreatedClient {
    pub id: usize,
    pub pool: Pool,
    pub log: Rc<RefCell<ClientLog>>,
}

#[derive(Default)]
pub struct MockFactory {
    created: Rc<RefCell<Vec<CreatedClient>>>,
}

impl MockFactory {
    pub fn new() -> (Self, Rc<RefCell<Vec<CreatedClient>>>) {
        let factory = Self::default();
        let created = factory.created.clone();
        (factory, created)
    }
}

impl ClientFactory for MockFactory {
    fn create(&self, id: usize, pool: &Pool) -> Box<dyn PoolClient> {
        let log = Rc::new(RefCell::new(ClientLog::default()));
        self.created.borrow_mut().push(CreatedClient {
            id,
            pool: pool.clone(),
            log: log.clone(),
        });
        Box::new(MockClient::new(id, pool.clone(), log))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Active(usize),
    Pause,
    Job(String),
    Login,
    ResultAccepted(i64),
    VerifyAlgorithm(Algorithm),
}

#[derive(Default)]
pub struct RecordingListener {
    pub events: Vec<Event>,
}

impl RecordingListener {
    pub fn actives(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Active(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn pauses(&self) -> usize {
        self.events.iter().filter(|e| **e == Event::Pause).count()
    }

    pub fn jobs(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Job(id) => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl StrategyListener for RecordingListener {
    fn on_active(&mut self, client: &dyn PoolClient) {
        self.events.push(Event::Active(client.id()));
    }

    fn on_pause(&mut self) {
        self.events.push(Event::Pause);
    }

    fn on_job(&mut self, _client: &dyn PoolClient, job: &Job, _params: &Value) {
        self.events.push(Event::Job(job.id.clone()));
    }

    fn on_login(&mut self, _client: &dyn PoolClient, _params: &mut Value) {
        self.events.push(Event::Login);
    }

    fn on_result_accepted(
        &mut self,
        _client: &dyn PoolClient,
        result: &SubmitResult,
        _error: Option<&str>,
    ) {
        self.events.push(Event::ResultAccepted(result.seq));
    }

    fn on_verify_algorithm(
        &mut self,
        _client: &dyn PoolClient,
        algorithm: Algorithm,
        _ok: &mut bool,
    ) {
        self.events.push(Event::VerifyAlgorithm(algorithm));
    }
}

pub fn pool(index: usize) -> Pool {
    Pool::new(format!("pool{index}.example.com"), 3333, "wallet.rig0")
}

pub fn job(id: &str) -> Job {
    Job::new(id, Algorithm::Verthash, 1_000, 100)
}

pub fn job_result() -> JobResult {
    JobResult {
        job_id: "j0".to_string(),
        nonce: 42,
        result: [0u8; 32],
    }
}

pub fn submit_result(seq: i64) -> SubmitResult {
    SubmitResult {
        seq,
        diff: 1_000,
        actual_diff: 2_048,
        elapsed_ms: 12,
    }
}
