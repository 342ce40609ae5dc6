//! TFA9890 register map and the bypass configuration sequence
//!
//! Registers are 16 bits wide and addressed by a single byte. Only the two
//! registers needed to put the part into bypass mode are described here.

// Register addresses
pub const REG_I2S_CONTROL: u8 = 0x04;
pub const REG_SYSTEM_CONTROL: u8 = 0x09;

// I2S control register bits
pub const I2S_CONTROL_BYPASS: u16 = 0x0B88;

// System control register bits (written in two phases)
pub const SYSTEM_CONTROL_BYPASS_1: u16 = 0x0982;
pub const SYSTEM_CONTROL_BYPASS_2: u16 = 0x0806;

/// One register write: target address and 16-bit value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterSetting {
    pub register: u8,
    pub value: u16,
}

impl RegisterSetting {
    pub const fn new(register: u8, value: u16) -> Self {
        Self { register, value }
    }

    /// Bytes placed on the bus for this write: address, then the value
    /// in host (little-endian) order.
    pub fn to_bytes(&self) -> [u8; 3] {
        let [lo, hi] = self.value.to_le_bytes();
        [self.register, lo, hi]
    }
}

/// Sequence written to each amplifier endpoint on power-up
pub const BYPASS_SEQUENCE: [RegisterSetting; 3] = [
    RegisterSetting::new(REG_I2S_CONTROL, I2S_CONTROL_BYPASS),
    RegisterSetting::new(REG_SYSTEM_CONTROL, SYSTEM_CONTROL_BYPASS_1),
    RegisterSetting::new(REG_SYSTEM_CONTROL, SYSTEM_CONTROL_BYPASS_2),
];

/// Human-readable register name, used in logs
pub fn register_name(register: u8) -> &'static str {
    match register {
        REG_I2S_CONTROL => "I2S_CONTROL",
        REG_SYSTEM_CONTROL => "SYSTEM_CONTROL",
        _ => "UNKNOWN",
    }
}
