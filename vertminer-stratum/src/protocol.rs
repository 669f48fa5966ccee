use serde::{Deserialize, Serialize};
use std::fmt;

/// Mining algorithms the miner can negotiate with a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Verthash,
    Kawpow,
}

impl Algorithm {
    /// Stable lowercase name used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Verthash => "verthash",
            Algorithm::Kawpow => "kawpow",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Optional client capabilities negotiated during login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    /// Pool accepts tunnelled connections on behalf of another endpoint.
    Connect,
    /// Connection supports TLS end to end.
    Tls,
}

/// Work unit dispatched by a pool.
///
/// The strategy layer routes jobs without interpreting the header blob;
/// only the backend workers decode it.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub algorithm: Algorithm,
    /// Share difficulty target.
    pub diff: u64,
    pub height: u64,
    /// Epoch seed, empty when the algorithm has none.
    pub seed: Vec<u8>,
    /// 80-byte header template.
    pub blob: Vec<u8>,
}

impl Job {
    pub fn new(id: impl Into<String>, algorithm: Algorithm, diff: u64, height: u64) -> Self {
        Self {
            id: id.into(),
            algorithm,
            diff,
            height,
            seed: Vec::new(),
            blob: Vec::new(),
        }
    }
}

/// Solved share travelling from a worker back to its pool.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub job_id: String,
    pub nonce: u32,
    pub result: [u8; 32],
}

/// Pool verdict for a submitted share, forwarded verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitResult {
    /// Wire sequence number returned by `submit`.
    pub seq: i64,
    pub diff: u64,
    pub actual_diff: u64,
    pub elapsed_ms: u64,
}
