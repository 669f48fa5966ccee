use tracing::debug;

use crate::client::{ClientFactory, PoolClient};
use crate::config::{Pool, PoolMode, ProxyUrl};
use crate::protocol::{Algorithm, Extension, JobResult};

/// Snapshot of the operator's active connection, refreshed every time
/// the donation scheduler sees an operator job. Everything the proxy
/// needs to reuse that connection as a tunnel.
#[derive(Debug, Clone)]
pub struct UpstreamEndpoint {
    pub host: String,
    pub ip: Option<String>,
    pub port: u16,
    pub password: String,
    pub spend_secret: String,
    pub is_tls: bool,
    pub has_connect: bool,
    pub has_tls_ext: bool,
    pub algorithm: Option<Algorithm>,
    pub proxy: ProxyUrl,
}

impl UpstreamEndpoint {
    pub fn capture(client: &dyn PoolClient) -> Self {
        let pool = client.pool();

        Self {
            host: pool.host.clone(),
            ip: client.ip(),
            port: pool.port,
            password: pool.password.clone(),
            spend_secret: pool.spend_secret.clone(),
            is_tls: client.is_tls(),
            has_connect: client.has_extension(Extension::Connect),
            has_tls_ext: client.has_extension(Extension::Tls),
            algorithm: pool.algorithm,
            proxy: pool.proxy.clone(),
        }
    }
}

/// Donation client that tunnels through the operator's active pool
/// connection instead of opening its own socket: same endpoint, donation
/// credentials.
pub struct DonateProxy {
    client: Box<dyn PoolClient>,
    tls: bool,
}

impl DonateProxy {
    /// Build a proxy against `upstream`. Returns `None` when the
    /// operator connection does not advertise the CONNECT capability.
    pub fn open(
        upstream: &UpstreamEndpoint,
        user: &str,
        factory: &dyn ClientFactory,
    ) -> Option<Self> {
        if !upstream.has_connect {
            return None;
        }

        // When the operator itself rides a SOCKS proxy the resolved ip
        // belongs to that proxy, so keep the configured hostname.
        let host = if upstream.proxy.is_valid() {
            upstream.host.clone()
        } else {
            upstream.ip.clone().unwrap_or_else(|| upstream.host.clone())
        };

        debug!(target: "network", "donate proxy: tunnelling via {}:{}", host, upstream.port);

        let mut pool = Pool::new(host, upstream.port, user);
        pool.password = upstream.password.clone();
        pool.spend_secret = upstream.spend_secret.clone();
        pool.keepalive = true;
        pool.tls = upstream.is_tls;
        pool.mode = PoolMode::Pool;
        pool.algorithm = upstream.algorithm;
        pool.proxy = upstream.proxy.clone();

        let mut client = factory.create(0, &pool);
        client.set_quiet(true);

        Some(Self {
            client,
            tls: upstream.has_tls_ext,
        })
    }

    /// Whether the tunnel endpoint advertised TLS; picks the donation
    /// URL scheme sent at login.
    pub fn is_tls(&self) -> bool {
        self.tls
    }

    pub fn connect(&mut self) {
        self.client.connect();
    }

    pub fn tick(&mut self, now_ms: u64) {
        self.client.tick(now_ms);
    }

    pub fn submit(&mut self, result: &JobResult) -> i64 {
        self.client.submit(result)
    }

    pub fn client(&self) -> &dyn PoolClient {
        self.client.as_ref()
    }

    /// Release the wrapped client for deferred teardown.
    pub fn into_client(self) -> Box<dyn PoolClient> {
        self.client
    }
}
