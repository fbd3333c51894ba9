//! Reconnection policy.
//!
//! ```text
//! Connected --(link failure)--> Disconnected --(reconnect ok)--> Connected
//! ```
//!
//! A call makes at most one reconnect attempt: before dispatch when it finds
//! the channel Disconnected, otherwise after a link failure. There is no
//! timer and no retry loop; if the device stays away, every read fails fast
//! with an I/O error after its single attempt.

use std::fmt;

use tracing::{info, warn};

use crate::connection::Connection;
use crate::error::{BridgeError, BridgeResult, ModbusError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-channel connection state and failure counters.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    state: ConnectionState,
    consecutive_failures: u32,
    reconnect_attempts: u64,
    last_error: Option<String>,
}

impl ReconnectPolicy {
    /// Policy for a freshly opened connection.
    pub fn connected() -> Self {
        Self {
            state: ConnectionState::Connected,
            consecutive_failures: 0,
            reconnect_attempts: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    async fn attempt(&mut self, connection: &mut Connection) -> BridgeResult<()> {
        self.reconnect_attempts += 1;
        match connection.reconnect().await {
            Ok(()) => {
                info!(endpoint = %connection.endpoint(), "Modbus link restored");
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                // reconnect() leaves the link closed on failure
                self.state = ConnectionState::Disconnected;
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Handle a failed transaction.
    ///
    /// Link failures close the connection and, when `may_reconnect` is set,
    /// trigger one reconnect attempt. A call that already reconnected in
    /// [`ensure_connected`](Self::ensure_connected) passes `false` and leaves
    /// the channel Disconnected. Exception responses and rejected requests
    /// leave the link alone. Always returns the [`BridgeError::Io`] to
    /// report for the call.
    pub async fn on_failure(
        &mut self,
        connection: &mut Connection,
        err: ModbusError,
        may_reconnect: bool,
    ) -> BridgeError {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(err.to_string());

        if err.is_link_failure() || !connection.is_open() {
            warn!(
                endpoint = %connection.endpoint(),
                failures = self.consecutive_failures,
                reconnect = may_reconnect,
                "Modbus link failure: {}",
                err
            );
            self.state = ConnectionState::Disconnected;
            connection.close().await;
            if may_reconnect {
                if let Err(e) = self.attempt(connection).await {
                    warn!(endpoint = %connection.endpoint(), "Reconnect failed: {}", e);
                }
            }
        }

        BridgeError::from(err)
    }

    /// Make sure the connection is usable before dispatching.
    ///
    /// A Disconnected channel gets one reconnect attempt; if it fails the
    /// call fails with [`BridgeError::Io`] and the state stays Disconnected.
    /// Returns `true` when that attempt was made and succeeded.
    pub async fn ensure_connected(&mut self, connection: &mut Connection) -> BridgeResult<bool> {
        if self.state == ConnectionState::Connected && connection.is_open() {
            return Ok(false);
        }
        self.state = ConnectionState::Disconnected;
        self.attempt(connection)
            .await
            .map(|()| true)
            .map_err(|e| match e {
                BridgeError::Connect(message) => BridgeError::Io(message),
                other => other,
            })
    }
}
