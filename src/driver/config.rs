//! Driver configuration.

use std::io;
use std::time::Duration;

use tokio::net::lookup_host;

// ============================================================================
// Address - graph service endpoint
// ============================================================================

/// Host and port of one graph service node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port` form suitable for a TCP connect.
    pub fn to_socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve the host to a literal IP address.
    ///
    /// Resolution happens once, before connecting; the resulting address is
    /// used for the lifetime of a connection so repeated DNS answers cannot
    /// skew a retry rotation.
    pub async fn resolve(&self) -> io::Result<Address> {
        let mut addrs = lookup_host((self.host.as_str(), self.port)).await?;
        let first = addrs.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses resolved for {}", self.host),
            )
        })?;
        Ok(Address::new(first.ip().to_string(), self.port))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ============================================================================
// SslMode - transport security parameters
// ============================================================================

/// TLS parameters by signing mode. Socket-factory selection from these is a
/// pure lookup owned by the embedding application; the driver only carries
/// the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SslMode {
    /// Plain TCP.
    #[default]
    None,
    /// Certificates signed by a CA.
    CaSigned {
        ca_cert_path: String,
        cert_path: String,
        key_path: String,
    },
    /// Self-signed certificates.
    SelfSigned {
        cert_path: String,
        key_path: String,
        password: String,
    },
}

// ============================================================================
// DriverConfig
// ============================================================================

/// Driver configuration.
///
/// Build with [`DriverConfig::builder`] or start from
/// [`DriverConfig::default_config`] for a single local node.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Name of the space statements run against by default.
    pub space_name: String,
    /// Graph service nodes, rotated round-robin on connect.
    pub addresses: Vec<Address>,
    /// Username to authenticate with.
    pub username: String,
    /// Password to authenticate with.
    pub password: String,
    /// Upper bound on pooled connections (each owns one server session).
    pub max_sessions: usize,
    /// Socket timeout for connect and each call. Zero means unbounded.
    pub timeout: Duration,
    /// Idle age after which a pooled connection is discarded. Zero keeps
    /// idle connections forever.
    pub idle_time: Duration,
    /// How often the background eviction pass runs. Zero disables it.
    pub interval_idle: Duration,
    /// How long a borrow waits for a connection before failing. Zero waits
    /// without bound.
    pub wait_time: Duration,
    /// Attempts for the outer per-query retry on transient transport
    /// failures.
    pub max_retries: usize,
    /// Attempts for the space-switch retry while a freshly created space
    /// propagates through the cluster.
    pub space_retry_attempts: usize,
    /// Spacing between space-switch attempts.
    pub space_retry_interval: Duration,
    /// Transport security parameters.
    pub ssl: SslMode,
}

impl DriverConfig {
    /// Configuration for a single local graph service node.
    pub fn default_config(space_name: impl Into<String>) -> Self {
        Self::builder(space_name)
            .address(Address::new("localhost", 9669))
            .build()
    }

    pub fn builder(space_name: impl Into<String>) -> DriverConfigBuilder {
        DriverConfigBuilder::new(space_name)
    }

    /// Whether traffic is TLS-encrypted.
    pub fn is_ssl_enabled(&self) -> bool {
        !matches!(self.ssl, SslMode::None)
    }
}

// ============================================================================
// DriverConfigBuilder
// ============================================================================

/// Builder for [`DriverConfig`].
#[derive(Debug, Clone)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl DriverConfigBuilder {
    pub fn new(space_name: impl Into<String>) -> Self {
        Self {
            config: DriverConfig {
                space_name: space_name.into(),
                addresses: Vec::new(),
                username: "root".to_string(),
                password: "nebula".to_string(),
                max_sessions: 100,
                timeout: Duration::from_secs(30),
                idle_time: Duration::ZERO,
                interval_idle: Duration::ZERO,
                wait_time: Duration::from_secs(60),
                max_retries: 3,
                space_retry_attempts: 40,
                space_retry_interval: Duration::from_secs(1),
                ssl: SslMode::None,
            },
        }
    }

    /// Add one graph service address.
    pub fn address(mut self, address: Address) -> Self {
        self.config.addresses.push(address);
        self
    }

    /// Replace the address list.
    pub fn addresses(mut self, addresses: Vec<Address>) -> Self {
        self.config.addresses = addresses;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    pub fn max_sessions(mut self, max_sessions: usize) -> Self {
        self.config.max_sessions = max_sessions;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn idle_time(mut self, idle_time: Duration) -> Self {
        self.config.idle_time = idle_time;
        self
    }

    pub fn interval_idle(mut self, interval_idle: Duration) -> Self {
        self.config.interval_idle = interval_idle;
        self
    }

    pub fn wait_time(mut self, wait_time: Duration) -> Self {
        self.config.wait_time = wait_time;
        self
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn space_retry(mut self, attempts: usize, interval: Duration) -> Self {
        self.config.space_retry_attempts = attempts;
        self.config.space_retry_interval = interval;
        self
    }

    pub fn ssl(mut self, ssl: SslMode) -> Self {
        self.config.ssl = ssl;
        self
    }

    pub fn build(self) -> DriverConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DriverConfig::default_config("test");
        assert_eq!(config.space_name, "test");
        assert_eq!(config.addresses, vec![Address::new("localhost", 9669)]);
        assert_eq!(config.username, "root");
        assert_eq!(config.password, "nebula");
        assert_eq!(config.max_sessions, 100);
        assert!(!config.is_ssl_enabled());
    }

    #[test]
    fn test_builder() {
        let config = DriverConfig::builder("prod")
            .address(Address::new("a.example", 9669))
            .address(Address::new("b.example", 9669))
            .username("svc")
            .password("secret")
            .max_sessions(8)
            .wait_time(Duration::from_secs(5))
            .space_retry(10, Duration::from_millis(250))
            .build();

        assert_eq!(config.addresses.len(), 2);
        assert_eq!(config.max_sessions, 8);
        assert_eq!(config.space_retry_attempts, 10);
        assert_eq!(config.space_retry_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_address_display() {
        let addr = Address::new("graphd-1", 9669);
        assert_eq!(addr.to_string(), "graphd-1:9669");
        assert_eq!(addr.to_socket_addr(), "graphd-1:9669");
    }

    #[tokio::test]
    async fn test_resolve_literal_ip() {
        let addr = Address::new("127.0.0.1", 9669);
        let resolved = addr.resolve().await.unwrap();
        assert_eq!(resolved, addr);
    }
}
