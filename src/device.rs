//! TFA9890 device lifecycle controller
//!
//! [`Tfa9890Device`] is registered with the sensor-class host once per
//! device. It creates a [`DeviceContext`] when hardware is attached, opens
//! both I2C links, runs the power sequencer on D0 entry and tears the
//! context down again on release.
//!
//! ```text
//! Absent -> HardwarePrepared -> Configured -> PoweredOn <-> PoweredOff
//!                                  (any attached state) -> HardwareReleased
//! ```

use std::mem;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::bus::{I2cBus, I2cTarget};
use crate::config::DriverConfig;
use crate::error::{DriverError, Result};
use crate::host::{DeviceLifecycle, DevicePowerState, SensorClient};
use crate::link::I2cLink;
use crate::power::{lock, Hardware, PowerSequencer};
use crate::properties::{
    DataField, EnumerationProperties, PropertyCollection, PropertyKey, PropertyValue,
    SensorState,
};
use crate::resources::{resolve_i2c_connections, ResourceDescriptor, I2C_CONNECTION_COUNT};

/// Lifecycle state of one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// No hardware attached yet
    Absent,
    /// Context created, links not (all) open
    HardwarePrepared,
    /// Both links open, never powered on
    Configured,
    PoweredOn,
    PoweredOff,
    /// Context torn down after release
    HardwareReleased,
}

/// Sampling bookkeeping for the data path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingState {
    pub started: bool,
    pub interval_ms: u32,
    pub first_sample: bool,
    pub last_sample: [f64; 3],
    /// Per-axis change sensitivity (g)
    pub thresholds: [f64; 3],
}

impl SamplingState {
    fn new(config: &DriverConfig) -> Self {
        Self {
            started: false,
            interval_ms: config.default_data_interval_ms,
            first_sample: true,
            last_sample: [0.0; 3],
            thresholds: config.default_thresholds,
        }
    }
}

/// Per-attachment state: links, power flag, sampling state and identity
pub struct DeviceContext<T> {
    enumeration: EnumerationProperties,
    hardware: Mutex<Hardware<T>>,
    sampling: Mutex<SamplingState>,
}

impl<T: I2cTarget> DeviceContext<T> {
    fn new(config: &DriverConfig) -> Result<Self> {
        config.validate()?;
        let enumeration = config.identity.enumeration_properties()?;

        Ok(Self {
            enumeration,
            hardware: Mutex::new(Hardware::new()),
            sampling: Mutex::new(SamplingState::new(config)),
        })
    }

    /// Resolve the two I2C connections and open a link to each.
    ///
    /// Links opened before a failure stay installed so release can close them.
    fn configure<B>(
        &self,
        bus: &B,
        raw: &[ResourceDescriptor],
        translated: &[ResourceDescriptor],
    ) -> Result<()>
    where
        B: I2cBus<Target = T>,
    {
        let resolved = resolve_i2c_connections(raw, translated)?;

        let mut hw = lock(&self.hardware);
        for (slot, id) in resolved.connections.iter().enumerate() {
            let link = I2cLink::open(bus, *id)?;
            log::info!("I2C link {} open at {}", slot, link.path());
            hw.install_link(slot, link);
        }
        Ok(())
    }

    fn teardown(&self) {
        let mut hw = lock(&self.hardware);
        lock(&self.sampling).started = false;
        hw.close_links();
    }

    pub fn state(&self) -> DeviceState {
        let hw = lock(&self.hardware);
        if !hw.links_open() {
            DeviceState::HardwarePrepared
        } else if hw.is_powered_on() {
            DeviceState::PoweredOn
        } else if hw.power_cycles() > 0 {
            DeviceState::PoweredOff
        } else {
            DeviceState::Configured
        }
    }

    pub fn enumeration_properties(&self) -> &EnumerationProperties {
        &self.enumeration
    }

    pub fn is_powered_on(&self) -> bool {
        lock(&self.hardware).is_powered_on()
    }

    pub fn power_cycles(&self) -> u32 {
        lock(&self.hardware).power_cycles()
    }

    /// Snapshot of the sampling state
    pub fn sampling(&self) -> SamplingState {
        *lock(&self.sampling)
    }

    /// Resource-hub paths of the links currently open
    pub fn link_paths(&self) -> Vec<String> {
        let hw = lock(&self.hardware);
        (0..I2C_CONNECTION_COUNT)
            .filter_map(|slot| hw.link(slot))
            .filter(|link| link.is_open())
            .map(|link| link.path().to_string())
            .collect()
    }
}

enum Slot<T> {
    Absent,
    Attached(Arc<DeviceContext<T>>),
    Released,
}

/// Sensor-client driver for one TFA9890 device
pub struct Tfa9890Device<B: I2cBus> {
    bus: B,
    config: DriverConfig,
    sequencer: PowerSequencer,
    slot: RwLock<Slot<B::Target>>,
}

impl<B: I2cBus> Tfa9890Device<B> {
    /// Create the driver instance. Hardware is attached later by the host.
    pub fn new(bus: B, config: DriverConfig) -> Self {
        let sequencer =
            PowerSequencer::new(config.power_on_sequence.clone(), config.write_timeout);
        Self {
            bus,
            config,
            sequencer,
            slot: RwLock::new(Slot::Absent),
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn state(&self) -> DeviceState {
        match &*read(&self.slot) {
            Slot::Absent => DeviceState::Absent,
            Slot::Attached(context) => context.state(),
            Slot::Released => DeviceState::HardwareReleased,
        }
    }

    /// Context of the current attachment, if any
    pub fn context(&self) -> Option<Arc<DeviceContext<B::Target>>> {
        match &*read(&self.slot) {
            Slot::Attached(context) => Some(Arc::clone(context)),
            _ => None,
        }
    }

    fn attached(&self, operation: &'static str) -> Result<Arc<DeviceContext<B::Target>>> {
        match &*read(&self.slot) {
            Slot::Attached(context) => Ok(Arc::clone(context)),
            Slot::Absent => Err(DriverError::InvalidState {
                operation,
                state: DeviceState::Absent,
            }),
            Slot::Released => Err(DriverError::InvalidState {
                operation,
                state: DeviceState::HardwareReleased,
            }),
        }
    }
}

impl<B: I2cBus> DeviceLifecycle for Tfa9890Device<B> {
    fn hardware_attach(
        &self,
        resources_raw: &[ResourceDescriptor],
        resources_translated: &[ResourceDescriptor],
    ) -> Result<()> {
        log::trace!("hardware_attach: enter");

        let context = {
            let mut slot = write(&self.slot);
            if let Slot::Attached(existing) = &*slot {
                return Err(DriverError::InvalidState {
                    operation: "attach hardware",
                    state: existing.state(),
                });
            }

            let context = DeviceContext::new(&self.config).map_err(|e| {
                log::error!("device context initialization failed: {}", e);
                e
            })?;
            let context = Arc::new(context);
            *slot = Slot::Attached(Arc::clone(&context));
            context
        };

        let result = context.configure(&self.bus, resources_raw, resources_translated);
        match &result {
            Ok(()) => log::info!("hardware attached, device configured"),
            Err(e) => log::error!("failed to configure I2C targets: {}", e),
        }
        log::trace!("hardware_attach: exit");
        result
    }

    fn hardware_release(&self) -> Result<()> {
        log::trace!("hardware_release: enter");

        let mut slot = write(&self.slot);
        if !matches!(&*slot, Slot::Attached(_)) {
            log::debug!("hardware_release: nothing attached");
            return Ok(());
        }

        if let Slot::Attached(context) = mem::replace(&mut *slot, Slot::Released) {
            context.teardown();
            log::info!("hardware released");
        }
        Ok(())
    }

    fn power_state_enter(&self, previous: DevicePowerState) -> Result<()> {
        log::trace!("power_state_enter: from {:?}", previous);
        let context = self.attached("enter D0")?;

        let mut hw = lock(&context.hardware);
        if !hw.links_open() {
            log::error!("power-on requested before both I2C links were opened");
            return Err(DriverError::InvalidState {
                operation: "enter D0",
                state: DeviceState::HardwarePrepared,
            });
        }

        self.sequencer.power_on(&mut hw).map_err(|e| {
            // Power flag is already cleared; sampling cannot outlive it
            lock(&context.sampling).started = false;
            log::error!("power-on sequence failed: {}", e);
            e
        })
    }

    fn power_state_exit(&self, target: DevicePowerState) -> Result<()> {
        log::trace!("power_state_exit: to {:?}", target);
        let context = self.attached("leave D0")?;

        let mut hw = lock(&context.hardware);
        lock(&context.sampling).started = false;
        self.sequencer.power_off(&mut hw);
        Ok(())
    }
}

impl<B: I2cBus> SensorClient for Tfa9890Device<B> {
    fn start(&self) -> Result<()> {
        let context = self.attached("start sampling")?;
        let hw = lock(&context.hardware);
        if !hw.is_powered_on() {
            log::error!("start requested while device is powered off");
            return Err(DriverError::DeviceNotReady);
        }

        let mut sampling = lock(&context.sampling);
        sampling.first_sample = true;
        sampling.started = true;
        log::debug!("sampling started, interval {} ms", sampling.interval_ms);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let context = self.attached("stop sampling")?;
        lock(&context.sampling).started = false;
        log::debug!("sampling stopped");
        Ok(())
    }

    fn supported_data_fields(&self) -> Result<Vec<DataField>> {
        self.attached("list data fields")?;
        Ok(DataField::ALL.to_vec())
    }

    fn properties(&self) -> Result<PropertyCollection> {
        let context = self.attached("read sensor properties")?;
        let powered = context.is_powered_on();
        let started = lock(&context.sampling).started;

        let state = if started {
            SensorState::Active
        } else if powered {
            SensorState::Idle
        } else {
            SensorState::NotAvailable
        };

        let mut properties = PropertyCollection::with_capacity(2);
        properties.push(PropertyKey::State, PropertyValue::State(state));
        properties.push(
            PropertyKey::MinDataInterval,
            PropertyValue::U32(self.config.min_data_interval_ms),
        );
        Ok(properties)
    }

    fn data_field_properties(&self, field: DataField) -> Result<PropertyCollection> {
        self.attached("read data field properties")?;
        if field.axis().is_none() {
            return Err(DriverError::NotSupported);
        }

        let range = self.config.acceleration_range_g;
        let mut properties = PropertyCollection::with_capacity(3);
        properties.push(
            PropertyKey::Resolution,
            PropertyValue::F64(self.config.acceleration_resolution_g),
        );
        properties.push(PropertyKey::RangeMinimum, PropertyValue::F64(-range));
        properties.push(PropertyKey::RangeMaximum, PropertyValue::F64(range));
        Ok(properties)
    }

    fn data_interval(&self) -> Result<u32> {
        let context = self.attached("read data interval")?;
        let interval = lock(&context.sampling).interval_ms;
        Ok(interval)
    }

    fn set_data_interval(&self, interval_ms: u32) -> Result<()> {
        let context = self.attached("set data interval")?;
        if interval_ms < self.config.min_data_interval_ms {
            return Err(DriverError::InvalidParameter(format!(
                "data interval {} ms is below the minimum {} ms",
                interval_ms, self.config.min_data_interval_ms
            )));
        }

        lock(&context.sampling).interval_ms = interval_ms;
        log::debug!("data interval set to {} ms", interval_ms);
        Ok(())
    }

    fn data_thresholds(&self) -> Result<PropertyCollection> {
        let context = self.attached("read data thresholds")?;
        let thresholds = lock(&context.sampling).thresholds;

        Ok(DataField::ACCELERATION
            .iter()
            .zip(thresholds)
            .map(|(field, value)| (PropertyKey::Field(*field), PropertyValue::F64(value)))
            .collect())
    }

    fn set_data_thresholds(&self, thresholds: &PropertyCollection) -> Result<()> {
        let context = self.attached("set data thresholds")?;

        // Validate everything before applying anything
        let mut updates = Vec::with_capacity(thresholds.len());
        for (key, value) in thresholds.iter() {
            let axis = match key {
                PropertyKey::Field(field) => field.axis(),
                _ => None,
            }
            .ok_or_else(|| {
                DriverError::InvalidParameter(format!("{:?} is not a threshold field", key))
            })?;

            let value = value
                .as_f64()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .ok_or_else(|| {
                    DriverError::InvalidParameter(format!(
                        "threshold for {:?} must be a non-negative number",
                        key
                    ))
                })?;
            updates.push((axis, value));
        }

        let mut sampling = lock(&context.sampling);
        for (axis, value) in updates {
            sampling.thresholds[axis] = value;
        }
        log::debug!("thresholds set to {:?}", sampling.thresholds);
        Ok(())
    }

    fn io_control(&self, code: u32, input_len: usize, output_len: usize) -> Result<usize> {
        log::debug!(
            "unsupported control code 0x{:08X} (in {} bytes, out {} bytes)",
            code,
            input_len,
            output_len
        );
        Err(DriverError::NotSupported)
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusFault;
    use crate::config::DeviceIdentity;
    use crate::sim::SimulatedBus;

    fn resources() -> Vec<ResourceDescriptor> {
        vec![
            ResourceDescriptor::interrupt(17),
            ResourceDescriptor::i2c(0x34),
            ResourceDescriptor::i2c(0x36),
        ]
    }

    fn powered_device() -> Tfa9890Device<SimulatedBus> {
        let device = Tfa9890Device::new(SimulatedBus::new(), DriverConfig::default());
        device.hardware_attach(&resources(), &resources()).unwrap();
        device.power_state_enter(DevicePowerState::D3).unwrap();
        device
    }

    #[test]
    fn test_state_progression() {
        let device = Tfa9890Device::new(SimulatedBus::new(), DriverConfig::default());
        assert_eq!(device.state(), DeviceState::Absent);

        device.hardware_attach(&resources(), &resources()).unwrap();
        assert_eq!(device.state(), DeviceState::Configured);

        device.power_state_enter(DevicePowerState::D3).unwrap();
        assert_eq!(device.state(), DeviceState::PoweredOn);

        device.power_state_exit(DevicePowerState::D3).unwrap();
        assert_eq!(device.state(), DeviceState::PoweredOff);

        device.power_state_enter(DevicePowerState::D3).unwrap();
        assert_eq!(device.state(), DeviceState::PoweredOn);

        device.hardware_release().unwrap();
        assert_eq!(device.state(), DeviceState::HardwareReleased);
    }

    #[test]
    fn test_double_attach_rejected() {
        let device = Tfa9890Device::new(SimulatedBus::new(), DriverConfig::default());
        device.hardware_attach(&resources(), &resources()).unwrap();

        let err = device.hardware_attach(&resources(), &resources()).unwrap_err();
        assert!(matches!(err, DriverError::InvalidState { .. }));
        assert_eq!(device.bus().open_targets().len(), 2);
    }

    #[test]
    fn test_reattach_after_release() {
        let device = Tfa9890Device::new(SimulatedBus::new(), DriverConfig::default());
        device.hardware_attach(&resources(), &resources()).unwrap();
        device.hardware_release().unwrap();

        device.hardware_attach(&resources(), &resources()).unwrap();
        assert_eq!(device.state(), DeviceState::Configured);
    }

    #[test]
    fn test_invalid_identity_fails_initialization() {
        let identity = DeviceIdentity {
            manufacturer: String::new(),
            ..DeviceIdentity::default()
        };
        let config = DriverConfig::default().with_identity(identity);
        let device = Tfa9890Device::new(SimulatedBus::new(), config);

        let err = device.hardware_attach(&resources(), &resources()).unwrap_err();
        assert!(matches!(err, DriverError::InitializationFailed(_)));
        assert_eq!(device.state(), DeviceState::Absent);
        assert!(device.bus().events().is_empty());
    }

    #[test]
    fn test_power_on_before_links_open() {
        let bus = SimulatedBus::new();
        bus.refuse_open(r"\\.\RESOURCE_HUB\0000000000000036", BusFault::NotPresent);
        let device = Tfa9890Device::new(bus, DriverConfig::default());
        assert!(device.hardware_attach(&resources(), &resources()).is_err());

        let err = device.power_state_enter(DevicePowerState::D3).unwrap_err();
        assert!(matches!(
            err,
            DriverError::InvalidState {
                state: DeviceState::HardwarePrepared,
                ..
            }
        ));
        assert!(device.bus().writes().is_empty());
    }

    #[test]
    fn test_start_requires_power() {
        let device = Tfa9890Device::new(SimulatedBus::new(), DriverConfig::default());
        device.hardware_attach(&resources(), &resources()).unwrap();
        assert!(matches!(device.start(), Err(DriverError::DeviceNotReady)));

        device.power_state_enter(DevicePowerState::D3).unwrap();
        device.start().unwrap();
        let sampling = device.context().unwrap().sampling();
        assert!(sampling.started);
        assert!(sampling.first_sample);
    }

    #[test]
    fn test_failed_repower_stops_sampling() {
        let device = powered_device();
        device.start().unwrap();

        device.bus().fail_write(4, BusFault::Nack);
        assert!(device.power_state_enter(DevicePowerState::D3).is_err());

        let context = device.context().unwrap();
        assert!(!context.is_powered_on());
        assert!(!context.sampling().started);
        assert_eq!(
            device.properties().unwrap().get(PropertyKey::State),
            Some(&PropertyValue::State(SensorState::NotAvailable))
        );
        assert!(matches!(device.start(), Err(DriverError::DeviceNotReady)));
    }

    #[test]
    fn test_power_exit_stops_sampling() {
        let device = powered_device();
        device.start().unwrap();
        device.power_state_exit(DevicePowerState::D3).unwrap();
        assert!(!device.context().unwrap().sampling().started);
    }

    #[test]
    fn test_sensor_state_property() {
        let device = powered_device();
        let state = |d: &Tfa9890Device<SimulatedBus>| {
            d.properties().unwrap().get(PropertyKey::State).cloned()
        };

        assert_eq!(state(&device), Some(PropertyValue::State(SensorState::Idle)));
        device.start().unwrap();
        assert_eq!(state(&device), Some(PropertyValue::State(SensorState::Active)));
        device.stop().unwrap();
        device.power_state_exit(DevicePowerState::D3).unwrap();
        assert_eq!(
            state(&device),
            Some(PropertyValue::State(SensorState::NotAvailable))
        );
    }

    #[test]
    fn test_data_interval() {
        let device = powered_device();
        assert_eq!(device.data_interval().unwrap(), 100);

        device.set_data_interval(250).unwrap();
        assert_eq!(device.data_interval().unwrap(), 250);

        let err = device.set_data_interval(5).unwrap_err();
        assert!(matches!(err, DriverError::InvalidParameter(_)));
        assert_eq!(device.data_interval().unwrap(), 250);
    }

    #[test]
    fn test_thresholds_partial_update() {
        let device = powered_device();
        let mut update = PropertyCollection::new();
        update.push(
            PropertyKey::Field(DataField::AccelerationY),
            PropertyValue::F64(0.5),
        );
        device.set_data_thresholds(&update).unwrap();

        let thresholds = device.data_thresholds().unwrap();
        assert_eq!(
            thresholds.get(PropertyKey::Field(DataField::AccelerationX)),
            Some(&PropertyValue::F64(0.02))
        );
        assert_eq!(
            thresholds.get(PropertyKey::Field(DataField::AccelerationY)),
            Some(&PropertyValue::F64(0.5))
        );
    }

    #[test]
    fn test_invalid_thresholds_apply_nothing() {
        let device = powered_device();
        let mut update = PropertyCollection::new();
        update.push(
            PropertyKey::Field(DataField::AccelerationX),
            PropertyValue::F64(1.0),
        );
        update.push(
            PropertyKey::Field(DataField::Timestamp),
            PropertyValue::F64(1.0),
        );
        assert!(matches!(
            device.set_data_thresholds(&update),
            Err(DriverError::InvalidParameter(_))
        ));

        let mut negative = PropertyCollection::new();
        negative.push(
            PropertyKey::Field(DataField::AccelerationZ),
            PropertyValue::F64(-0.1),
        );
        assert!(device.set_data_thresholds(&negative).is_err());

        assert_eq!(
            device.context().unwrap().sampling().thresholds,
            [0.02, 0.02, 0.02]
        );
    }

    #[test]
    fn test_data_field_properties() {
        let device = powered_device();
        let props = device
            .data_field_properties(DataField::AccelerationZ)
            .unwrap();
        assert_eq!(
            props.keys(),
            vec![
                PropertyKey::Resolution,
                PropertyKey::RangeMinimum,
                PropertyKey::RangeMaximum
            ]
        );
        assert_eq!(
            props.get(PropertyKey::RangeMinimum),
            Some(&PropertyValue::F64(-16.0))
        );

        assert!(matches!(
            device.data_field_properties(DataField::Timestamp),
            Err(DriverError::NotSupported)
        ));
    }

    #[test]
    fn test_data_path_requires_attachment() {
        let device = Tfa9890Device::new(SimulatedBus::new(), DriverConfig::default());
        assert!(matches!(
            device.data_interval(),
            Err(DriverError::InvalidState {
                state: DeviceState::Absent,
                ..
            })
        ));
        assert!(device.supported_data_fields().is_err());
        assert!(device.power_state_enter(DevicePowerState::D3).is_err());
    }
}
