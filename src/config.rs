//! Driver configuration
//!
//! Everything that was compile-time constant in a single-chip driver (the
//! identity strings, the power-up register sequence, sampling defaults) is
//! carried in a [`DriverConfig`] handed to the device at construction.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::{DriverError, Result};
use crate::properties::{
    EnumerationProperties, Guid, PropertyCollection, PropertyKey, PropertyValue,
    GUID_SENSOR_CATEGORY_OTHER, GUID_SENSOR_TYPE_CUSTOM, GUID_TFA9890_SUBTYPE,
    GUID_TFA9890_UNIQUE_ID,
};
use crate::registers::{RegisterSetting, BYPASS_SEQUENCE};

pub const SENSOR_MANUFACTURER: &str = "NXP";
pub const SENSOR_MODEL: &str = "TFA9890";

/// Sampling interval reported until the host sets one
pub const DEFAULT_DATA_INTERVAL_MS: u32 = 100;
/// Shortest interval the host may request
pub const MIN_DATA_INTERVAL_MS: u32 = 10;
/// Default per-axis change sensitivity in g
pub const DEFAULT_CHANGE_SENSITIVITY_G: f64 = 0.02;
/// Per-transaction bus timeout
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

// +/-16 g, 13-bit full resolution
pub const ACCELERATION_RANGE_G: f64 = 16.0;
pub const ACCELERATION_RESOLUTION_G: f64 = 0.0039;

/// Identity the sensor is enumerated with
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceIdentity {
    pub manufacturer: String,
    pub model: String,
    pub sensor_type: Guid,
    pub category: Guid,
    pub persistent_unique_id: Guid,
    pub vendor_subtype: Guid,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            manufacturer: SENSOR_MANUFACTURER.to_string(),
            model: SENSOR_MODEL.to_string(),
            sensor_type: GUID_SENSOR_TYPE_CUSTOM,
            category: GUID_SENSOR_CATEGORY_OTHER,
            persistent_unique_id: GUID_TFA9890_UNIQUE_ID,
            vendor_subtype: GUID_TFA9890_SUBTYPE,
        }
    }
}

impl DeviceIdentity {
    /// Build the fixed enumeration collection, in contract order:
    /// type, category, manufacturer, model, unique id, subtype
    pub fn enumeration_properties(&self) -> Result<EnumerationProperties> {
        if self.manufacturer.trim().is_empty() {
            return Err(DriverError::InitializationFailed(
                "manufacturer string is empty".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(DriverError::InitializationFailed(
                "model string is empty".into(),
            ));
        }

        let guids = [
            self.sensor_type,
            self.category,
            self.persistent_unique_id,
            self.vendor_subtype,
        ];
        let distinct: HashSet<Guid> = guids.iter().copied().collect();
        if distinct.len() != guids.len() {
            return Err(DriverError::InitializationFailed(
                "identity GUIDs must be distinct".into(),
            ));
        }

        let mut collection = PropertyCollection::with_capacity(EnumerationProperties::COUNT);
        collection.push(PropertyKey::SensorType, PropertyValue::Guid(self.sensor_type));
        collection.push(PropertyKey::Category, PropertyValue::Guid(self.category));
        collection.push(
            PropertyKey::Manufacturer,
            PropertyValue::String(self.manufacturer.clone()),
        );
        collection.push(PropertyKey::Model, PropertyValue::String(self.model.clone()));
        collection.push(
            PropertyKey::PersistentUniqueId,
            PropertyValue::Guid(self.persistent_unique_id),
        );
        collection.push(
            PropertyKey::VendorDefinedSubType,
            PropertyValue::Guid(self.vendor_subtype),
        );

        Ok(EnumerationProperties::new(collection))
    }
}

/// Immutable configuration of one device instance
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    pub identity: DeviceIdentity,
    /// Written to each link, in order, on power-up
    pub power_on_sequence: Vec<RegisterSetting>,
    /// Timeout passed to every bus write; `None` blocks indefinitely
    pub write_timeout: Option<Duration>,
    pub default_data_interval_ms: u32,
    pub min_data_interval_ms: u32,
    /// Per-axis change sensitivity (g)
    pub default_thresholds: [f64; 3],
    pub acceleration_range_g: f64,
    pub acceleration_resolution_g: f64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            identity: DeviceIdentity::default(),
            power_on_sequence: BYPASS_SEQUENCE.to_vec(),
            write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
            default_data_interval_ms: DEFAULT_DATA_INTERVAL_MS,
            min_data_interval_ms: MIN_DATA_INTERVAL_MS,
            default_thresholds: [DEFAULT_CHANGE_SENSITIVITY_G; 3],
            acceleration_range_g: ACCELERATION_RANGE_G,
            acceleration_resolution_g: ACCELERATION_RESOLUTION_G,
        }
    }
}

impl DriverConfig {
    pub fn with_identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_data_interval(mut self, default_ms: u32, min_ms: u32) -> Self {
        self.default_data_interval_ms = default_ms;
        self.min_data_interval_ms = min_ms;
        self
    }

    pub fn with_thresholds(mut self, thresholds: [f64; 3]) -> Self {
        self.default_thresholds = thresholds;
        self
    }

    /// Check internal consistency
    ///
    /// # Errors
    /// * `InitializationFailed` - describing the first inconsistency found
    pub fn validate(&self) -> Result<()> {
        if self.power_on_sequence.is_empty() {
            return Err(DriverError::InitializationFailed(
                "power-on sequence is empty".into(),
            ));
        }
        if self.min_data_interval_ms == 0 {
            return Err(DriverError::InitializationFailed(
                "minimum data interval must be non-zero".into(),
            ));
        }
        if self.default_data_interval_ms < self.min_data_interval_ms {
            return Err(DriverError::InitializationFailed(format!(
                "default data interval {} ms is below the minimum {} ms",
                self.default_data_interval_ms, self.min_data_interval_ms
            )));
        }
        if self.default_thresholds.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(DriverError::InitializationFailed(
                "thresholds must be finite and non-negative".into(),
            ));
        }
        if !(self.acceleration_range_g > 0.0 && self.acceleration_resolution_g > 0.0) {
            return Err(DriverError::InitializationFailed(
                "acceleration range and resolution must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DriverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.power_on_sequence, BYPASS_SEQUENCE.to_vec());
        assert_eq!(config.write_timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_enumeration_order() {
        let props = DeviceIdentity::default().enumeration_properties().unwrap();
        assert_eq!(
            props.collection().keys(),
            vec![
                PropertyKey::SensorType,
                PropertyKey::Category,
                PropertyKey::Manufacturer,
                PropertyKey::Model,
                PropertyKey::PersistentUniqueId,
                PropertyKey::VendorDefinedSubType,
            ]
        );
        assert_eq!(props.manufacturer(), Some("NXP"));
        assert_eq!(props.model(), Some("TFA9890"));
    }

    #[test]
    fn test_duplicate_guids_rejected() {
        let identity = DeviceIdentity {
            vendor_subtype: GUID_TFA9890_UNIQUE_ID,
            ..DeviceIdentity::default()
        };
        assert!(matches!(
            identity.enumeration_properties(),
            Err(DriverError::InitializationFailed(_))
        ));
    }

    #[test]
    fn test_empty_model_rejected() {
        let identity = DeviceIdentity {
            model: "  ".into(),
            ..DeviceIdentity::default()
        };
        assert!(identity.enumeration_properties().is_err());
    }

    #[test]
    fn test_invalid_intervals_rejected() {
        let config = DriverConfig::default().with_data_interval(5, 10);
        assert!(config.validate().is_err());

        let config = DriverConfig::default().with_data_interval(5, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let config = DriverConfig::default().with_thresholds([0.1, -0.1, 0.1]);
        assert!(config.validate().is_err());
    }
}
