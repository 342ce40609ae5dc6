//! Callback contract between the driver and the sensor-class host
//!
//! The host owns dispatch: it calls [`DeviceLifecycle`] on plug-and-play and
//! power transitions and [`SensorClient`] for data-path requests, possibly
//! from several worker threads at once. A driver implements both once and
//! registers itself as a [`SensorDriver`].

use crate::error::Result;
use crate::properties::{DataField, PropertyCollection};
use crate::resources::ResourceDescriptor;

/// Device power states the host transitions between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DevicePowerState {
    /// Working state
    D0,
    D1,
    D2,
    /// Off, may come back
    D3,
    /// Off before removal
    D3Final,
}

/// Plug-and-play and power notifications
pub trait DeviceLifecycle {
    /// Hardware resources were assigned; both lists are positionally aligned.
    fn hardware_attach(
        &self,
        resources_raw: &[ResourceDescriptor],
        resources_translated: &[ResourceDescriptor],
    ) -> Result<()>;

    /// Resources are being revoked. Must tolerate a failed or partial attach.
    fn hardware_release(&self) -> Result<()>;

    /// Device is entering D0 from `previous`
    fn power_state_enter(&self, previous: DevicePowerState) -> Result<()>;

    /// Device is leaving D0 for `target`
    fn power_state_exit(&self, target: DevicePowerState) -> Result<()>;
}

/// Data-path requests forwarded by the sensor-class host
pub trait SensorClient {
    fn start(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    fn supported_data_fields(&self) -> Result<Vec<DataField>>;

    fn properties(&self) -> Result<PropertyCollection>;

    fn data_field_properties(&self, field: DataField) -> Result<PropertyCollection>;

    /// Current sampling interval in milliseconds
    fn data_interval(&self) -> Result<u32>;

    fn set_data_interval(&self, interval_ms: u32) -> Result<()>;

    fn data_thresholds(&self) -> Result<PropertyCollection>;

    fn set_data_thresholds(&self, thresholds: &PropertyCollection) -> Result<()>;

    /// Vendor-specific control code. Returns the number of output bytes.
    fn io_control(&self, code: u32, input_len: usize, output_len: usize) -> Result<usize>;
}

/// Everything the host needs from a registered driver
pub trait SensorDriver: DeviceLifecycle + SensorClient + Send + Sync {}

impl<T> SensorDriver for T where T: DeviceLifecycle + SensorClient + Send + Sync {}
