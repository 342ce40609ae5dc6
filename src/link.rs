//! One open connection to one I2C-addressed endpoint of the chip

use std::time::Duration;

use crate::bus::{I2cBus, I2cTarget};
use crate::error::{DriverError, Result};
use crate::registers::{register_name, RegisterSetting};
use crate::resources::ConnectionId;

/// Owned I2C link. Writes are only issued while the target is open.
pub struct I2cLink<T> {
    path: String,
    target: Option<T>,
}

impl<T: I2cTarget> I2cLink<T> {
    /// Open the target identified by `connection_id`
    ///
    /// # Errors
    /// * `LinkOpenFailed` - the transport refused the open
    pub fn open<B>(bus: &B, connection_id: ConnectionId) -> Result<Self>
    where
        B: I2cBus<Target = T>,
    {
        let path = connection_id.resource_hub_path();
        log::debug!("opening I2C target {}", path);

        let target = bus.open(&path).map_err(|source| {
            log::error!("open of I2C target {} failed: {}", path, source);
            DriverError::LinkOpenFailed {
                path: path.clone(),
                source,
            }
        })?;

        Ok(Self {
            path,
            target: Some(target),
        })
    }

    /// Write a 16-bit value to `register`
    ///
    /// The link stays open on failure; the caller decides whether to abort.
    pub fn write_register(
        &mut self,
        register: u8,
        value: u16,
        timeout: Option<Duration>,
    ) -> Result<()> {
        self.write_setting(RegisterSetting::new(register, value), timeout)
    }

    /// Write one [`RegisterSetting`]
    pub fn write_setting(
        &mut self,
        setting: RegisterSetting,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let target = self.target.as_mut().ok_or_else(|| DriverError::LinkClosed {
            path: self.path.clone(),
        })?;

        let buffer = setting.to_bytes();
        target.write(&buffer, timeout).map_err(|source| {
            log::error!(
                "write of 0x{:04X} to {} (0x{:02X}) on {} failed: {}",
                setting.value,
                register_name(setting.register),
                setting.register,
                self.path,
                source
            );
            DriverError::TransportError {
                path: self.path.clone(),
                register: setting.register,
                source,
            }
        })?;

        log::debug!(
            "wrote 0x{:04X} to {} (0x{:02X}) on {}",
            setting.value,
            register_name(setting.register),
            setting.register,
            self.path
        );
        Ok(())
    }

    /// Close the underlying target. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(mut target) = self.target.take() {
            log::debug!("closing I2C target {}", self.path);
            target.close();
        }
    }

    pub fn is_open(&self) -> bool {
        self.target.is_some()
    }

    /// Resource-hub path this link was opened with
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<T> Drop for I2cLink<T> {
    fn drop(&mut self) {
        // Targets normally leave through close(); this only covers
        // contexts dropped without a release notification.
        if self.target.is_some() {
            log::warn!("I2C link {} dropped while open", self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusFault;
    use crate::sim::{BusEvent, SimulatedBus};

    #[test]
    fn test_open_uses_resource_hub_path() {
        let bus = SimulatedBus::new();
        let link = I2cLink::open(&bus, ConnectionId(0x1A)).unwrap();
        assert!(link.is_open());
        assert_eq!(link.path(), r"\\.\RESOURCE_HUB\000000000000001a");
        assert_eq!(bus.open_targets(), vec![link.path().to_string()]);
    }

    #[test]
    fn test_open_refused() {
        let bus = SimulatedBus::new();
        let path = ConnectionId(7).resource_hub_path();
        bus.refuse_open(&path, BusFault::Busy);

        match I2cLink::open(&bus, ConnectionId(7)) {
            Err(DriverError::LinkOpenFailed { path: p, source }) => {
                assert_eq!(p, path);
                assert_eq!(source, BusFault::Busy);
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("open should have been refused"),
        }
    }

    #[test]
    fn test_write_register_bytes() {
        let bus = SimulatedBus::new();
        let mut link = I2cLink::open(&bus, ConnectionId(1)).unwrap();
        link.write_register(0x09, 0x0982, None).unwrap();

        assert_eq!(bus.writes(), vec![(link.path().to_string(), vec![0x09, 0x82, 0x09])]);
    }

    #[test]
    fn test_write_failure_keeps_link_open() {
        let bus = SimulatedBus::new();
        let mut link = I2cLink::open(&bus, ConnectionId(1)).unwrap();
        bus.fail_write(1, BusFault::Nack);

        let err = link.write_register(0x04, 0x0B88, None).unwrap_err();
        assert!(matches!(err, DriverError::TransportError { register: 0x04, .. }));
        assert_eq!(err.bus_fault(), Some(&BusFault::Nack));
        assert!(link.is_open());

        // Next write goes through again
        link.write_register(0x04, 0x0B88, None).unwrap();
        assert_eq!(bus.writes().len(), 1);
    }

    #[test]
    fn test_write_after_close_rejected() {
        let bus = SimulatedBus::new();
        let mut link = I2cLink::open(&bus, ConnectionId(2)).unwrap();
        link.close();
        link.close();

        let err = link.write_register(0x04, 0x0B88, None).unwrap_err();
        assert!(matches!(err, DriverError::LinkClosed { .. }));
        assert!(bus.writes().is_empty());

        let closes = bus
            .events()
            .iter()
            .filter(|e| matches!(e, BusEvent::Closed { .. }))
            .count();
        assert_eq!(closes, 1);
    }
}
