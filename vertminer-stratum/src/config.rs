use serde::{Deserialize, Serialize};

use crate::error::{Result, StratumError};
use crate::protocol::Algorithm;

/// How the client negotiates its login sequence with a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolMode {
    /// JSON `login` handshake.
    #[default]
    Pool,

    /// Solo mining against a daemon.
    Solo,

    /// Probe for both the JSON login and the standard
    /// `mining.subscribe`/`mining.authorize` sequences and keep whichever
    /// the server answers.
    AutoEth,
}

/// SOCKS5 proxy endpoint, `host:port`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProxyUrl(Option<String>);

impl ProxyUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(Some(url.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_valid(&self) -> bool {
        self.0.as_deref().map(|u| u.contains(':')).unwrap_or(false)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Remote pool endpoint description.
///
/// Two pools are the same endpoint when host, port, user and TLS flag all
/// match; password, secret and mode are session details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub host: String,

    pub port: u16,

    /// Worker username (usually wallet.worker_name)
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Spend secret forwarded to solo backends.
    #[serde(default)]
    pub spend_secret: String,

    #[serde(default)]
    pub keepalive: bool,

    #[serde(default)]
    pub tls: bool,

    #[serde(default)]
    pub mode: PoolMode,

    #[serde(default)]
    pub algorithm: Option<Algorithm>,

    #[serde(default)]
    pub proxy: ProxyUrl,
}

impl Pool {
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: String::new(),
            spend_secret: String::new(),
            keepalive: false,
            tls: false,
            mode: PoolMode::default(),
            algorithm: None,
            proxy: ProxyUrl::none(),
        }
    }

    /// `host:port` form used in login advertisements and logs.
    pub fn url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parse a `[scheme://]host:port` pool URL; `stratum+ssl` implies TLS.
    pub fn from_url(url: &str, user: impl Into<String>) -> Result<Self> {
        let (rest, tls) = if let Some(rest) = url.strip_prefix("stratum+ssl://") {
            (rest, true)
        } else if let Some(rest) = url.strip_prefix("stratum+tcp://") {
            (rest, false)
        } else {
            (url.strip_prefix("stratum://").unwrap_or(url), false)
        };

        let parts: Vec<&str> = rest.split(':').collect();
        if parts.len() != 2 {
            return Err(StratumError::InvalidUrl(url.to_string()));
        }

        let port = parts[1]
            .parse::<u16>()
            .map_err(|_| StratumError::InvalidPort(url.to_string()))?;

        let mut pool = Pool::new(parts[0], port, user);
        pool.tls = tls;
        Ok(pool)
    }
}

impl PartialEq for Pool {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host
            && self.port == other.port
            && self.user == other.user
            && self.tls == other.tls
    }
}

impl Eq for Pool {}

/// Whether the donation scheduler may tunnel through the operator's
/// active pool connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyDonate {
    None,

    #[default]
    Auto,
}

/// `pools` section consumed by the strategy layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolsConfig {
    /// Donation level in percent, clamped to 0..=100.
    #[serde(default = "default_donate_level", rename = "donate-level")]
    pub donate_level: u8,

    #[serde(default, rename = "proxy-donate")]
    pub proxy_donate: ProxyDonate,
}

impl Default for PoolsConfig {
    fn default() -> Self {
        Self {
            donate_level: default_donate_level(),
            proxy_donate: ProxyDonate::default(),
        }
    }
}

fn default_donate_level() -> u8 {
    5
}
