//! Sensor-client driver for the NXP TFA9890 smart amplifier
//!
//! The TFA9890 is exposed to a sensor-class host as a custom sensor. The
//! platform assigns two I2C connections (one per amplifier endpoint); on
//! power-up the driver writes a fixed register sequence to both endpoints
//! that puts the chip into bypass mode.
//!
//! # Quick Start
//!
//! ```no_run
//! use tfa9890_sensor_driver::{
//!     DeviceLifecycle, DevicePowerState, DriverConfig, ResourceDescriptor, SensorClient,
//!     SimulatedBus, Tfa9890Device,
//! };
//!
//! let resources = [ResourceDescriptor::i2c(0x34), ResourceDescriptor::i2c(0x36)];
//! let device = Tfa9890Device::new(SimulatedBus::new(), DriverConfig::default());
//!
//! device.hardware_attach(&resources, &resources)?;
//! device.power_state_enter(DevicePowerState::D3)?;
//! device.start()?;
//!
//! for line in device.bus().transcript() {
//!     println!("{}", line);
//! }
//!
//! device.power_state_exit(DevicePowerState::D3)?;
//! device.hardware_release()?;
//! # Ok::<(), tfa9890_sensor_driver::DriverError>(())
//! ```
//!
//! Any transport implementing [`I2cBus`] can stand in for [`SimulatedBus`].

pub mod bus;
pub mod config;
pub mod device;
pub mod error;
pub mod host;
pub mod link;
pub mod power;
pub mod properties;
pub mod registers;
pub mod resources;
pub mod sim;

// Re-export public API
pub use bus::{BusFault, I2cBus, I2cTarget};
pub use config::{DeviceIdentity, DriverConfig};
pub use device::{DeviceContext, DeviceState, SamplingState, Tfa9890Device};
pub use error::{DriverError, Result};
pub use host::{DeviceLifecycle, DevicePowerState, SensorClient, SensorDriver};
pub use link::I2cLink;
pub use power::{Hardware, PowerSequencer};
pub use properties::{
    DataField, EnumerationProperties, Guid, PropertyCollection, PropertyKey, PropertyValue,
    SensorState,
};
pub use registers::RegisterSetting;
pub use resources::{ConnectionId, ResolvedResources, ResourceDescriptor};
pub use sim::{BusEvent, SimulatedBus, SimulatedTarget};
