/// Connection Management Module
///
/// Owns the physical connection handle and decides, per call, whether it is
/// opened, reused or closed.
///
/// Auto-close decision after a call:
///
/// | transaction active | persistent | closes |
/// |---|---|---|
/// | no  | no  | yes |
/// | no  | yes | no  |
/// | yes | any | no  |
use super::driver::{ClientInfo, ConnectParams, Driver, DriverError, DriverResult, ServerInfo};
use tracing::{debug, warn};

/// How long the current connection is meant to live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionScope {
    /// No connection is open.
    Closed,
    /// Closed at the end of the current call.
    PerCall,
    /// Kept open across calls until closed explicitly.
    Persistent,
    /// Kept open until the active transaction resolves.
    Transaction,
}

/// Connection state: the handle plus what was captured when it was opened.
pub struct ConnectionState<D: Driver> {
    handle: Option<D::Handle>,
    persist: bool,
    server: Option<ServerInfo>,
    client: Option<ClientInfo>,
}

impl<D: Driver> std::fmt::Debug for ConnectionState<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionState")
            .field("open", &self.handle.is_some())
            .field("persist", &self.persist)
            .field("server", &self.server)
            .field("client", &self.client)
            .finish()
    }
}

impl<D: Driver> Default for ConnectionState<D> {
    fn default() -> Self {
        ConnectionState {
            handle: None,
            persist: false,
            server: None,
            client: None,
        }
    }
}

impl<D: Driver> ConnectionState<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_persistent(&self) -> bool {
        self.persist
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server.as_ref()
    }

    pub fn client_info(&self) -> Option<&ClientInfo> {
        self.client.as_ref()
    }

    pub fn handle_mut(&mut self) -> Option<&mut D::Handle> {
        self.handle.as_mut()
    }

    /// Opens the connection unless one is already open.
    ///
    /// Returns true when a new connection was opened. The `persist` flag is
    /// only recorded for a new connection.
    pub fn ensure_open(
        &mut self,
        driver: &mut D,
        params: &ConnectParams<'_>,
        persist: bool,
    ) -> DriverResult<bool> {
        if self.handle.is_some() {
            return Ok(false);
        }
        let handle = driver.connect(params)?;
        debug!(
            "Opened connection to {} / {} (persist = {})",
            params.host, params.database, persist
        );
        self.server = Some(driver.server_info(&handle));
        self.client = Some(driver.client_info(&handle));
        self.persist = persist;
        self.handle = Some(handle);
        Ok(true)
    }

    /// Closes the connection.
    ///
    /// Metadata and the persist flag are cleared before the physical close,
    /// whatever its outcome. Closing an already closed connection succeeds.
    pub fn close(&mut self, driver: &mut D) -> std::result::Result<(), Vec<DriverError>> {
        self.server = None;
        self.client = None;
        self.persist = false;
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match driver.close(handle) {
            Ok(()) => {
                debug!("Closed connection");
                Ok(())
            }
            Err((handle, errors)) => {
                warn!("Connection close failed; keeping handle");
                self.handle = Some(handle);
                Err(errors)
            }
        }
    }

    /// Drops the persist flag so the connection follows transaction scope.
    pub fn release_persistence(&mut self) {
        self.persist = false;
    }

    pub fn should_auto_close(&self, transaction_active: bool) -> bool {
        !transaction_active && !self.persist
    }

    pub fn scope(&self, transaction_active: bool) -> ConnectionScope {
        if self.handle.is_none() {
            ConnectionScope::Closed
        } else if transaction_active {
            ConnectionScope::Transaction
        } else if self.persist {
            ConnectionScope::Persistent
        } else {
            ConnectionScope::PerCall
        }
    }
}
