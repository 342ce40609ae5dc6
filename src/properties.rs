//! Property model exchanged with the sensor-class host
//!
//! Properties are ordered key/value collections. Keys identify what a value
//! means (manufacturer, data interval, axis resolution, ...); values are a
//! small tagged union.

use std::fmt;

/// 128-bit globally unique identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    pub const fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

/// Custom sensor type
pub const GUID_SENSOR_TYPE_CUSTOM: Guid = Guid::from_fields(
    0xE83A_F229,
    0x8640,
    0x4D18,
    [0xA2, 0x13, 0xE2, 0x26, 0x75, 0xEB, 0xB2, 0xC3],
);

/// "Other" sensor category
pub const GUID_SENSOR_CATEGORY_OTHER: Guid = Guid::from_fields(
    0x2C90_E7A9,
    0xF4C9,
    0x4FA2,
    [0xAF, 0x37, 0x56, 0xD4, 0x71, 0xFE, 0x5A, 0x3D],
);

/// Persistent unique id of the TFA9890 sensor instance
pub const GUID_TFA9890_UNIQUE_ID: Guid = Guid::from_fields(
    0xEF2C_014C,
    0xDEBA,
    0x43F4,
    [0x89, 0x0D, 0x97, 0x80, 0x95, 0x68, 0x4D, 0xD6],
);

/// Vendor-defined subtype of the TFA9890 sensor
pub const GUID_TFA9890_SUBTYPE: Guid = Guid::from_fields(
    0xF011_3F45,
    0x0810,
    0x49EA,
    [0xBC, 0x6A, 0x0F, 0xFD, 0x29, 0x7C, 0x12, 0x66],
);

/// Data fields reported by the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataField {
    AccelerationX,
    AccelerationY,
    AccelerationZ,
    Timestamp,
}

impl DataField {
    pub const ALL: [DataField; 4] = [
        DataField::AccelerationX,
        DataField::AccelerationY,
        DataField::AccelerationZ,
        DataField::Timestamp,
    ];

    pub const ACCELERATION: [DataField; 3] = [
        DataField::AccelerationX,
        DataField::AccelerationY,
        DataField::AccelerationZ,
    ];

    /// Axis index for acceleration fields
    pub fn axis(&self) -> Option<usize> {
        match self {
            DataField::AccelerationX => Some(0),
            DataField::AccelerationY => Some(1),
            DataField::AccelerationZ => Some(2),
            DataField::Timestamp => None,
        }
    }
}

/// Sensor state reported through the state property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    NotAvailable,
    Idle,
    Active,
}

/// Property keys understood by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    // Enumeration
    SensorType,
    Category,
    Manufacturer,
    Model,
    PersistentUniqueId,
    VendorDefinedSubType,
    // Sensor
    State,
    MinDataInterval,
    // Data-field
    Resolution,
    RangeMinimum,
    RangeMaximum,
    // Threshold / data value of one field
    Field(DataField),
}

/// Property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Guid(Guid),
    String(String),
    U32(u32),
    F64(f64),
    State(SensorState),
}

impl PropertyValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::F64(v) => Some(*v),
            PropertyValue::U32(v) => Some(f64::from(*v)),
            _ => None,
        }
    }
}

/// Ordered key/value collection
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyCollection {
    entries: Vec<(PropertyKey, PropertyValue)>,
}

impl PropertyCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Append an entry, keeping insertion order
    pub fn push(&mut self, key: PropertyKey, value: PropertyValue) {
        self.entries.push((key, value));
    }

    /// First value stored under `key`
    pub fn get(&self, key: PropertyKey) -> Option<&PropertyValue> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(PropertyKey, PropertyValue)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> Vec<PropertyKey> {
        self.entries.iter().map(|(k, _)| *k).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(PropertyKey, PropertyValue)> for PropertyCollection {
    fn from_iter<I: IntoIterator<Item = (PropertyKey, PropertyValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Static identity reported when the sensor is enumerated.
///
/// Built once at attach and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumerationProperties {
    collection: PropertyCollection,
}

impl EnumerationProperties {
    /// Number of entries, fixed by the enumeration contract
    pub const COUNT: usize = 6;

    pub(crate) fn new(collection: PropertyCollection) -> Self {
        debug_assert_eq!(collection.len(), Self::COUNT);
        Self { collection }
    }

    pub fn collection(&self) -> &PropertyCollection {
        &self.collection
    }

    pub fn manufacturer(&self) -> Option<&str> {
        match self.collection.get(PropertyKey::Manufacturer) {
            Some(PropertyValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn model(&self) -> Option<&str> {
        match self.collection.get(PropertyKey::Model) {
            Some(PropertyValue::String(s)) => Some(s),
            _ => None,
        }
    }
}
