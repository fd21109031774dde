//! Global configuration record

use crate::error::InvalidDeviceName;
use crate::{DEFAULT_DEVICE_NAME, DEVICE_CONFIGURED, DEVICE_NAME_LEN};
use std::fmt;

/// MIDI receive channel: a single channel (1-16) or all of them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MidiChannel {
    #[default]
    Omni,
    Channel(u8),
}

impl MidiChannel {
    /// Code used on the wire and in the global record, 0 meaning omni
    pub fn code(self) -> u8 {
        match self {
            MidiChannel::Omni => 0,
            MidiChannel::Channel(channel) => channel,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MidiChannel::Omni),
            1..=16 => Some(MidiChannel::Channel(code)),
            _ => None,
        }
    }

    /// Whether a message on `channel` (0-15, as carried in the status byte)
    /// should be handled
    pub fn accepts(self, channel: u8) -> bool {
        match self {
            MidiChannel::Omni => true,
            MidiChannel::Channel(listening) => listening == channel + 1,
        }
    }
}

impl fmt::Display for MidiChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiChannel::Omni => write!(f, "omni"),
            MidiChannel::Channel(channel) => write!(f, "{}", channel),
        }
    }
}

/// Device name that fits the fixed-width name field of the global record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceName(String);

impl DeviceName {
    /// Longest name in bytes; the last byte of the field is the terminator
    pub const MAX_LEN: usize = DEVICE_NAME_LEN - 1;

    pub fn new(name: impl Into<String>) -> Result<Self, InvalidDeviceName> {
        let name = name.into();
        if name.len() > Self::MAX_LEN {
            return Err(InvalidDeviceName::TooLong {
                len: name.len(),
                max: Self::MAX_LEN,
            });
        }
        if name.contains('\0') {
            return Err(InvalidDeviceName::ContainsNul);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DeviceName {
    fn default() -> Self {
        Self(DEFAULT_DEVICE_NAME.to_string())
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Device-wide settings, stored at offset 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalConfig {
    /// Equals [`DEVICE_CONFIGURED`] once a factory reset has completed
    pub boot_marker: u8,
    pub midi_channel: MidiChannel,
    /// Index of the active preset slot
    pub current_preset: usize,
    pub device_name: DeviceName,
}

impl GlobalConfig {
    /// The configuration a factory reset writes
    pub fn factory() -> Self {
        Self {
            boot_marker: DEVICE_CONFIGURED,
            midi_channel: MidiChannel::Omni,
            current_preset: 0,
            device_name: DeviceName::default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.boot_marker == DEVICE_CONFIGURED
    }
}
