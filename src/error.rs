//! Error types for the TFA9890 sensor-client driver

use thiserror::Error;

use crate::bus::BusFault;
use crate::device::DeviceState;

/// Error type for driver operations
#[derive(Error, Debug)]
pub enum DriverError {
    /// Context setup failed (configuration or identity properties)
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// The platform did not assign exactly two I2C connections
    #[error("Resource mismatch: expected 2 I2C connection resources, found {found}")]
    ResourceMismatch { found: usize },

    /// Raw and translated resource lists are not positionally aligned
    #[error("Resource lists misaligned: {raw} raw descriptors, {translated} translated")]
    MisalignedResources { raw: usize, translated: usize },

    /// The transport refused to open an I2C target
    #[error("Failed to open I2C target {path}: {source}")]
    LinkOpenFailed {
        path: String,
        #[source]
        source: BusFault,
    },

    /// A register write on an open link failed
    #[error("I2C write to register 0x{register:02X} on {path} failed: {source}")]
    TransportError {
        path: String,
        register: u8,
        #[source]
        source: BusFault,
    },

    /// Register access attempted on a link that is not open
    #[error("I2C link {path} is closed")]
    LinkClosed { path: String },

    /// Request is not implemented by this driver
    #[error("Operation not supported")]
    NotSupported,

    /// Callback invoked in a lifecycle state that cannot serve it
    #[error("Cannot {operation} while device is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: DeviceState,
    },

    /// Sampling requested before the device reached D0
    #[error("Device not ready: power-on sequence has not completed")]
    DeviceNotReady,

    /// Invalid parameter supplied by the host
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl DriverError {
    /// Bus fault underlying this error, if it came from the transport
    pub fn bus_fault(&self) -> Option<&BusFault> {
        match self {
            DriverError::LinkOpenFailed { source, .. }
            | DriverError::TransportError { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;
