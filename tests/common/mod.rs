//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Once;

use tfa9890_sensor_driver::{DriverConfig, ResourceDescriptor, SimulatedBus, Tfa9890Device};

static INIT: Once = Once::new();

/// Initialize logger for tests (only once)
pub fn init_logger() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub const LINK0: &str = r"\\.\RESOURCE_HUB\0000000000000034";
pub const LINK1: &str = r"\\.\RESOURCE_HUB\0000000000000036";

/// Interrupt plus the two I2C connections, as the platform assigns them
pub fn platform_resources() -> Vec<ResourceDescriptor> {
    vec![
        ResourceDescriptor::i2c(0x34),
        ResourceDescriptor::interrupt(42),
        ResourceDescriptor::i2c(0x36),
    ]
}

/// Bytes of the power-on sequence on one link
pub fn sequence_for(path: &str) -> Vec<(String, Vec<u8>)> {
    vec![
        (path.to_string(), vec![0x04, 0x88, 0x0B]),
        (path.to_string(), vec![0x09, 0x82, 0x09]),
        (path.to_string(), vec![0x09, 0x06, 0x08]),
    ]
}

/// All six writes of one power-on, link 0 first
pub fn power_on_writes() -> Vec<(String, Vec<u8>)> {
    let mut writes = sequence_for(LINK0);
    writes.extend(sequence_for(LINK1));
    writes
}

pub fn new_device(bus: &SimulatedBus) -> Tfa9890Device<SimulatedBus> {
    init_logger();
    Tfa9890Device::new(bus.clone(), DriverConfig::default())
}
