//! Connection pool and session identity registry.
//!
//! Server sessions are expensive: authentication is slow and session ids
//! stay valid for hours. Connections are pooled per transport, while the
//! registry deduplicates the authenticated session per
//! `(address, credentials)` identity, so pool churn does not re-authenticate
//! and each borrower still gets an exclusive transport.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::config::{Address, DriverConfig};
use super::connection::Connection;
use super::error::{DriverError, DriverResult};

// ============================================================================
// SessionIdentifier
// ============================================================================

/// The key under which an authenticated session may be shared: one resolved
/// address plus the credentials used against it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionIdentifier {
    pub address: Address,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SessionIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIdentifier")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// SessionData
// ============================================================================

/// State of one authenticated server session, reference-counted across the
/// pooled connections bound to it.
///
/// Immutable: every reference-count change produces a new value, stored
/// back under the registry lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionData {
    pub session_id: i64,
    pub timezone_offset_seconds: i32,
    pub reference_count: usize,
}

impl SessionData {
    pub fn new(session_id: i64, timezone_offset_seconds: i32) -> Self {
        Self {
            session_id,
            timezone_offset_seconds,
            reference_count: 0,
        }
    }

    pub fn increment_ref(self) -> Self {
        Self {
            reference_count: self.reference_count + 1,
            ..self
        }
    }

    pub fn decrement_ref(self) -> Self {
        Self {
            reference_count: self.reference_count.saturating_sub(1),
            ..self
        }
    }
}

// ============================================================================
// SessionRegistry
// ============================================================================

/// What teardown must do after the registry released a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReleaseAction {
    /// This was the last reference; sign the session out.
    SignOut,
    /// Other connections still use the session.
    Keep,
}

/// Identity-to-session map shared by all creation and destruction paths.
///
/// The lock is held only for map operations; network calls stay outside so
/// the registry never serializes connection attempts across addresses.
#[derive(Debug, Default)]
struct SessionRegistry {
    entries: Mutex<HashMap<SessionIdentifier, SessionData>>,
}

impl SessionRegistry {
    /// Session data currently registered for `identifier`, if any.
    fn lookup(&self, identifier: &SessionIdentifier) -> Option<SessionData> {
        self.entries.lock().get(identifier).copied()
    }

    /// Register one more connection under `identifier`.
    ///
    /// When an entry already exists its count is authoritative (a racing
    /// create may have stored it after our lookup); otherwise `fresh` is
    /// installed. Returns the stored value.
    fn adopt(&self, identifier: &SessionIdentifier, fresh: SessionData) -> SessionData {
        let mut entries = self.entries.lock();
        let stored = match entries.get(identifier) {
            Some(existing) => existing.increment_ref(),
            None => fresh.increment_ref(),
        };
        entries.insert(identifier.clone(), stored);
        stored
    }

    /// Drop one reference for `identifier`. At zero the entry is removed
    /// and the caller must sign the session out.
    fn release(&self, identifier: &SessionIdentifier) -> ReleaseAction {
        let mut entries = self.entries.lock();
        let Some(current) = entries.get(identifier).copied() else {
            tracing::warn!(identifier = ?identifier, "released a connection with no registry entry");
            return ReleaseAction::Keep;
        };
        let decremented = current.decrement_ref();
        if decremented.reference_count == 0 {
            entries.remove(identifier);
            ReleaseAction::SignOut
        } else {
            entries.insert(identifier.clone(), decremented);
            ReleaseAction::Keep
        }
    }

    fn reference_count(&self, identifier: &SessionIdentifier) -> usize {
        self.entries
            .lock()
            .get(identifier)
            .map(|d| d.reference_count)
            .unwrap_or(0)
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

// ============================================================================
// ConnectionPool
// ============================================================================

struct IdleEntry {
    conn: Connection,
    since: Instant,
}

/// Bounded pool of connections across all configured addresses.
pub struct ConnectionPool {
    config: DriverConfig,
    registry: SessionRegistry,
    /// Shared rotation counter; fairness across addresses, not stickiness.
    round_robin: AtomicUsize,
    next_id: AtomicU64,
    idle: Mutex<VecDeque<IdleEntry>>,
    borrow_permits: Arc<Semaphore>,
    open: RwLock<bool>,
    size: AtomicUsize,
}

impl ConnectionPool {
    pub fn new(config: DriverConfig) -> Self {
        let borrow_permits = Arc::new(Semaphore::new(config.max_sessions));
        Self {
            config,
            registry: SessionRegistry::default(),
            round_robin: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            idle: Mutex::new(VecDeque::new()),
            borrow_permits,
            open: RwLock::new(true),
            size: AtomicUsize::new(0),
        }
    }

    /// Borrow a connection, waiting up to the configured borrow wait time.
    ///
    /// Exactly one borrower holds a given connection at a time; the handle
    /// must be given back with [`PooledConnection::release`].
    pub async fn acquire(&self) -> DriverResult<PooledConnection<'_>> {
        if !*self.open.read() {
            return Err(DriverError::PoolExhausted("pool is closed".into()));
        }

        let permit = self.acquire_permit().await?;

        loop {
            let entry = self.idle.lock().pop_front();
            let Some(entry) = entry else {
                break;
            };
            if self.is_entry_valid(&entry) {
                return Ok(PooledConnection::new(self, entry.conn, permit));
            }
            // Stale idle connections go through the reference-counted
            // teardown, never a bare transport close.
            self.destroy(entry.conn).await;
        }

        let conn = self.create().await?;
        Ok(PooledConnection::new(self, conn, permit))
    }

    async fn acquire_permit(&self) -> DriverResult<OwnedSemaphorePermit> {
        let wait = self.config.wait_time;
        let acquire = self.borrow_permits.clone().acquire_owned();
        let acquired = if wait.is_zero() {
            Ok(acquire.await)
        } else {
            tokio::time::timeout(wait, acquire).await
        };
        match acquired {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(DriverError::PoolExhausted("pool is closed".into())),
            Err(_) => Err(DriverError::PoolExhausted(format!(
                "no connection available within {:?}",
                wait
            ))),
        }
    }

    fn is_entry_valid(&self, entry: &IdleEntry) -> bool {
        if !entry.conn.is_open() {
            return false;
        }
        let idle_time = self.config.idle_time;
        idle_time.is_zero() || entry.since.elapsed() <= idle_time
    }

    /// Build a new connection, rotating through the configured addresses
    /// with up to two passes over each.
    async fn create(&self) -> DriverResult<Connection> {
        let addresses = &self.config.addresses;
        if addresses.is_empty() {
            return Err(DriverError::Config("no addresses configured".into()));
        }

        let tries = addresses.len() * 2;
        let mut last_error = None;

        for _ in 0..tries {
            let idx = self.round_robin.fetch_add(1, Ordering::Relaxed) % addresses.len();
            let target = &addresses[idx];

            let resolved = match target.resolve().await {
                Ok(address) => address,
                Err(e) => {
                    tracing::warn!(address = %target, error = %e, "address resolution failed");
                    last_error = Some(DriverError::Io(e));
                    continue;
                }
            };

            let identifier = SessionIdentifier {
                address: resolved,
                username: self.config.username.clone(),
                password: self.config.password.clone(),
            };

            // Map lookup under the lock; the network round-trip below runs
            // outside it.
            let existing = self.registry.lookup(&identifier);
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);

            match Connection::open(id, identifier.clone(), existing, self.config.timeout).await {
                Ok(conn) => {
                    self.registry.adopt(&identifier, conn.session_data());
                    self.size.fetch_add(1, Ordering::Relaxed);
                    return Ok(conn);
                }
                Err(e) => {
                    tracing::warn!(address = %identifier.address, error = %e, "unable to connect to graph service");
                    last_error = Some(e);
                }
            }
        }

        Err(DriverError::service_unavailable(
            "Unable to find a usable address",
            last_error,
        ))
    }

    /// Reference-counted teardown: the session is signed out only when the
    /// last connection bound to it is destroyed, and the transport closes
    /// unconditionally.
    pub(crate) async fn destroy(&self, mut conn: Connection) {
        let action = self.registry.release(conn.identifier());
        if action == ReleaseAction::SignOut {
            if let Err(e) = conn.sign_out().await {
                tracing::warn!(error = %e, "unable to sign out session");
            }
        }
        conn.close().await;
        self.size.fetch_sub(1, Ordering::Relaxed);
    }

    /// Pool validator.
    pub fn validate(&self, conn: &Connection) -> bool {
        conn.is_open()
    }

    async fn return_connection(&self, conn: Connection) {
        let open = *self.open.read();
        if open && conn.is_open() {
            self.idle.lock().push_back(IdleEntry {
                conn,
                since: Instant::now(),
            });
        } else {
            self.destroy(conn).await;
        }
    }

    /// One pass of the idle eviction policy.
    pub(crate) async fn evict_idle(&self) {
        let idle_time = self.config.idle_time;
        if idle_time.is_zero() {
            return;
        }
        loop {
            let expired = {
                let mut idle = self.idle.lock();
                match idle.front() {
                    Some(entry) if entry.since.elapsed() > idle_time => idle.pop_front(),
                    _ => None,
                }
            };
            match expired {
                Some(entry) => self.destroy(entry.conn).await,
                None => break,
            }
        }
    }

    /// Close the pool and destroy every idle connection.
    pub async fn close(&self) {
        *self.open.write() = false;
        loop {
            let entry = self.idle.lock().pop_front();
            match entry {
                Some(entry) => self.destroy(entry.conn).await,
                None => break,
            }
        }
        self.borrow_permits.close();
    }

    /// Live connections, borrowed and idle.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    pub(crate) fn reference_count(&self, identifier: &SessionIdentifier) -> usize {
        self.registry.reference_count(identifier)
    }

    pub(crate) fn registry_len(&self) -> usize {
        self.registry.len()
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("size", &self.size())
            .field("idle", &self.idle_count())
            .field("identities", &self.registry.len())
            .field("open", &*self.open.read())
            .finish()
    }
}

// ============================================================================
// PooledConnection
// ============================================================================

/// Exclusive handle on a borrowed connection.
///
/// Give it back with [`release`](Self::release). Dropping the handle
/// without releasing still keeps the registry counts accurate, but skips
/// the sign-out RPC, so the explicit path is the one to use.
pub struct PooledConnection<'p> {
    pool: &'p ConnectionPool,
    conn: Option<Connection>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl<'p> PooledConnection<'p> {
    fn new(pool: &'p ConnectionPool, conn: Connection, permit: OwnedSemaphorePermit) -> Self {
        Self {
            pool,
            conn: Some(conn),
            _permit: Some(permit),
        }
    }

    pub fn connection(&self) -> &Connection {
        self.conn.as_ref().expect("connection already released")
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection already released")
    }

    /// Return the connection to the pool.
    pub async fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.return_connection(conn).await;
        }
    }

    /// Take the connection out of the handle without touching the
    /// registry. The caller becomes responsible for destroying it.
    #[cfg(test)]
    pub(crate) fn detach(mut self) -> Connection {
        self.conn.take().expect("connection already released")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let action = self.pool.registry.release(conn.identifier());
            if action == ReleaseAction::SignOut {
                tracing::warn!(
                    "connection dropped without release; session sign-out skipped"
                );
            }
            self.pool.size.fetch_sub(1, Ordering::Relaxed);
            // The transport closes when the client is dropped.
        }
    }
}

impl std::fmt::Debug for PooledConnection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .finish()
    }
}
