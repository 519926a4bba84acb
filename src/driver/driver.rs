//! Driver entry point.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use super::config::DriverConfig;
use super::error::{DriverError, DriverResult};
use super::pool::ConnectionPool;
use super::session::Session;

/// Top-level driver: owns the shared connection pool and hands out
/// sessions.
pub struct Driver {
    config: DriverConfig,
    pool: Arc<ConnectionPool>,
    open: RwLock<bool>,
    evictor: Mutex<Option<JoinHandle<()>>>,
}

impl Driver {
    /// Build a driver from configuration.
    ///
    /// When an idle-check interval is configured and a Tokio runtime is
    /// available, a background task periodically evicts idle connections
    /// through the pool's reference-counted teardown.
    pub fn new(config: DriverConfig) -> DriverResult<Self> {
        if config.space_name.is_empty() {
            return Err(DriverError::Config("space name must not be empty".into()));
        }
        if config.addresses.is_empty() {
            return Err(DriverError::Config("at least one address is required".into()));
        }

        let pool = Arc::new(ConnectionPool::new(config.clone()));

        let evictor = if !config.interval_idle.is_zero() && !config.idle_time.is_zero() {
            tokio::runtime::Handle::try_current().ok().map(|handle| {
                let pool = pool.clone();
                let interval = config.interval_idle;
                handle.spawn(async move {
                    let mut ticker = tokio::time::interval(interval);
                    ticker.tick().await;
                    loop {
                        ticker.tick().await;
                        pool.evict_idle().await;
                    }
                })
            })
        } else {
            None
        };

        Ok(Self {
            config,
            pool,
            open: RwLock::new(true),
            evictor: Mutex::new(evictor),
        })
    }

    /// A session bound to the configured default space.
    pub fn session(&self) -> DriverResult<Session> {
        self.session_for_space(self.config.space_name.clone())
    }

    /// A session bound to a specific space.
    pub fn session_for_space(&self, space_name: impl Into<String>) -> DriverResult<Session> {
        self.ensure_open()?;
        Ok(Session::new(
            self.pool.clone(),
            space_name.into(),
            &self.config,
        ))
    }

    /// Open one session and ping through it.
    pub async fn verify_connectivity(&self) -> DriverResult<()> {
        let session = self.session()?;
        let result = session.ping().await;
        session.close();
        result
    }

    /// Whether traffic is TLS-encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.config.is_ssl_enabled()
    }

    /// The cluster serves multiple isolated spaces.
    pub fn supports_multi_space(&self) -> bool {
        true
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Shut the driver down: stop eviction and destroy every pooled
    /// connection. Idempotent.
    pub async fn close(&self) {
        {
            let mut open = self.open.write();
            if !*open {
                return;
            }
            *open = false;
        }
        if let Some(task) = self.evictor.lock().take() {
            task.abort();
        }
        self.pool.close().await;
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if *self.open.read() {
            Ok(())
        } else {
            Err(DriverError::Config("driver is closed".into()))
        }
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("space_name", &self.config.space_name)
            .field("addresses", &self.config.addresses)
            .field("open", &*self.open.read())
            .finish()
    }
}
