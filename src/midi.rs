//! MIDI channel voice messages
//!
//! The device only speaks channel voice messages: actions send them and the
//! inbound filter reacts to control and program changes. System messages are
//! not modelled and parse to `None`.

use crate::error::ActionValidityError;
use std::fmt;

/// Status nibble of a channel voice message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    NoteOff = 0x80,
    NoteOn = 0x90,
    PolyPressure = 0xA0,
    ControlChange = 0xB0,
    ProgramChange = 0xC0,
    ChannelPressure = 0xD0,
    PitchBend = 0xE0,
}

impl MessageKind {
    pub fn from_status(status: u8) -> Option<Self> {
        match status & 0xF0 {
            0x80 => Some(MessageKind::NoteOff),
            0x90 => Some(MessageKind::NoteOn),
            0xA0 => Some(MessageKind::PolyPressure),
            0xB0 => Some(MessageKind::ControlChange),
            0xC0 => Some(MessageKind::ProgramChange),
            0xD0 => Some(MessageKind::ChannelPressure),
            0xE0 => Some(MessageKind::PitchBend),
            _ => None,
        }
    }

    pub fn status(self) -> u8 {
        self as u8
    }

    /// Number of data bytes following the status byte
    pub fn data_len(self) -> usize {
        match self {
            MessageKind::ProgramChange | MessageKind::ChannelPressure => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::NoteOff => "NoteOff",
            MessageKind::NoteOn => "NoteOn",
            MessageKind::PolyPressure => "PolyPressure",
            MessageKind::ControlChange => "CC",
            MessageKind::ProgramChange => "PC",
            MessageKind::ChannelPressure => "ChannelPressure",
            MessageKind::PitchBend => "PitchBend",
        };
        f.write_str(name)
    }
}

/// A channel voice message
///
/// `channel` is the 0-15 value carried in the status byte. `data2` is zero for
/// one-byte messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiMessage {
    pub kind: MessageKind,
    pub channel: u8,
    pub data1: u8,
    pub data2: u8,
}

impl MidiMessage {
    pub fn new(kind: MessageKind, channel: u8, data1: u8, data2: u8) -> Self {
        Self {
            kind,
            channel: channel & 0x0F,
            data1: data1 & 0x7F,
            data2: if kind.data_len() == 2 { data2 & 0x7F } else { 0 },
        }
    }

    pub fn control_change(channel: u8, number: u8, value: u8) -> Self {
        Self::new(MessageKind::ControlChange, channel, number, value)
    }

    pub fn program_change(channel: u8, program: u8) -> Self {
        Self::new(MessageKind::ProgramChange, channel, program, 0)
    }

    /// Build the message a MIDI action describes
    ///
    /// `channel` is 1-16 as stored in the action, `kind` a status byte with a
    /// zero low nibble. Nothing is masked: out-of-range fields are an error.
    pub fn from_action(
        channel: u8,
        kind: u8,
        data1: u8,
        data2: u8,
    ) -> Result<Self, ActionValidityError> {
        if !(1..=16).contains(&channel) {
            return Err(ActionValidityError::MidiOutOfRange {
                field: "channel",
                value: channel,
            });
        }
        let message_kind = MessageKind::from_status(kind)
            .filter(|k| k.status() == kind)
            .ok_or(ActionValidityError::MidiOutOfRange {
                field: "message type",
                value: kind,
            })?;
        for (field, value) in [("data1", data1), ("data2", data2)] {
            if value > 0x7F {
                return Err(ActionValidityError::MidiOutOfRange { field, value });
            }
        }
        Ok(Self::new(message_kind, channel - 1, data1, data2))
    }

    /// Parse one message from raw bytes
    ///
    /// Running status and system messages yield `None`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let kind = MessageKind::from_status(status)?;
        if data.len() < kind.data_len() {
            return None;
        }
        let data2 = if kind.data_len() == 2 { data[1] } else { 0 };
        Some(Self::new(kind, status & 0x0F, data[0], data2))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = vec![self.kind.status() | self.channel, self.data1];
        if self.kind.data_len() == 2 {
            bytes.push(self.data2);
        }
        bytes
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ch:{} {}", self.kind, self.channel + 1, self.data1)?;
        if self.kind.data_len() == 2 {
            write!(f, " {}", self.data2)?;
        }
        Ok(())
    }
}

/// Hex dump of raw MIDI bytes for trace output
pub fn format_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02X}", b));
    }
    out
}
