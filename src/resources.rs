//! Hardware resource descriptors and the I2C connection resolver
//!
//! The platform assigns resources to the device as two positionally aligned
//! lists: raw (bus-relative) and translated (CPU view). The chip needs
//! exactly two serial I2C connections, one per amplifier endpoint.

use std::fmt;

use crate::error::{DriverError, Result};

/// Prefix of every resource-hub target path
pub const RESOURCE_HUB_DEVICE_NAME: &str = r"\\.\RESOURCE_HUB";

/// Number of I2C connections the chip is wired with
pub const I2C_CONNECTION_COUNT: usize = 2;

/// 64-bit connection identifier assigned by the resource hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Build an identifier from the descriptor's low/high halves
    pub const fn from_parts(low: u32, high: u32) -> Self {
        Self(((high as u64) << 32) | low as u64)
    }

    pub const fn low_part(&self) -> u32 {
        self.0 as u32
    }

    pub const fn high_part(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Target path: the hub name followed by the id as 16 hex digits
    pub fn resource_hub_path(&self) -> String {
        format!("{}\\{:016x}", RESOURCE_HUB_DEVICE_NAME, self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Connection resource class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionClass {
    Gpio,
    Serial,
    FunctionConfig,
}

/// Connection resource type within its class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    GpioIo,
    SerialI2c,
    SerialSpi,
    SerialUart,
}

/// One resource assigned to the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceDescriptor {
    /// Resource-hub connection (GPIO or serial bus)
    Connection {
        class: ConnectionClass,
        kind: ConnectionType,
        id: ConnectionId,
    },
    /// Interrupt line
    Interrupt { vector: u32, level: u32 },
    /// Memory-mapped range
    Memory { start: u64, length: u32 },
}

impl ResourceDescriptor {
    /// Serial I2C connection with the given id
    pub const fn i2c(id: u64) -> Self {
        ResourceDescriptor::Connection {
            class: ConnectionClass::Serial,
            kind: ConnectionType::SerialI2c,
            id: ConnectionId(id),
        }
    }

    /// GPIO I/O connection with the given id
    pub const fn gpio(id: u64) -> Self {
        ResourceDescriptor::Connection {
            class: ConnectionClass::Gpio,
            kind: ConnectionType::GpioIo,
            id: ConnectionId(id),
        }
    }

    pub const fn interrupt(vector: u32) -> Self {
        ResourceDescriptor::Interrupt { vector, level: 0 }
    }

    /// Connection id if this descriptor is a serial I2C connection
    pub fn i2c_connection(&self) -> Option<ConnectionId> {
        match self {
            ResourceDescriptor::Connection {
                class: ConnectionClass::Serial,
                kind: ConnectionType::SerialI2c,
                id,
            } => Some(*id),
            _ => None,
        }
    }
}

/// The two I2C connection ids, in the order the platform listed them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedResources {
    pub connections: [ConnectionId; I2C_CONNECTION_COUNT],
}

/// Extract exactly two I2C connections from the translated resource list
///
/// # Errors
/// * `MisalignedResources` - raw and translated lists differ in length
/// * `ResourceMismatch` - the translated list holds fewer or more than two
///   I2C connections
pub fn resolve_i2c_connections(
    raw: &[ResourceDescriptor],
    translated: &[ResourceDescriptor],
) -> Result<ResolvedResources> {
    if raw.len() != translated.len() {
        return Err(DriverError::MisalignedResources {
            raw: raw.len(),
            translated: translated.len(),
        });
    }

    let mut connections = [ConnectionId::default(); I2C_CONNECTION_COUNT];
    let mut found = 0usize;

    for descriptor in translated {
        if let Some(id) = descriptor.i2c_connection() {
            log::trace!("I2C connection resource found: {}", id);
            if found < I2C_CONNECTION_COUNT {
                connections[found] = id;
            }
            found += 1;
        }
    }

    if found != I2C_CONNECTION_COUNT {
        log::error!(
            "expected {} I2C connection resources, found {}",
            I2C_CONNECTION_COUNT,
            found
        );
        return Err(DriverError::ResourceMismatch { found });
    }

    Ok(ResolvedResources { connections })
}
