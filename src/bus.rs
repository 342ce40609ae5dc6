//! I2C transport contract
//!
//! The driver never talks to a bus controller directly. The platform hands
//! it something implementing [`I2cBus`], which opens targets by their
//! resource-hub path. Each opened [`I2cTarget`] performs blocking,
//! transactional writes.

use std::time::Duration;

use thiserror::Error;

/// Failure reported by the transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusFault {
    /// Target is held by another client
    #[error("target busy")]
    Busy,

    /// No target at the requested path
    #[error("target not present")]
    NotPresent,

    /// Caller lacks read/write access to the target
    #[error("access denied")]
    AccessDenied,

    /// Address or data byte was not acknowledged
    #[error("transfer not acknowledged")]
    Nack,

    /// Transaction did not finish within the requested time
    #[error("transaction timed out after {0:?}")]
    Timeout(Duration),

    /// Any other controller failure
    #[error("bus I/O error: {0}")]
    Io(String),
}

/// Opens I2C targets on behalf of the driver
pub trait I2cBus {
    /// Connection handle produced by [`open`](Self::open)
    type Target: I2cTarget;

    /// Open the target at `path` for full read/write access
    fn open(&self, path: &str) -> Result<Self::Target, BusFault>;
}

/// One open I2C target
pub trait I2cTarget: Send {
    /// Write `bytes` in a single transaction. `None` waits indefinitely.
    fn write(&mut self, bytes: &[u8], timeout: Option<Duration>) -> Result<(), BusFault>;

    /// Release the connection. Called at most once per target.
    fn close(&mut self) {}
}
