//! Fixed-width record layout of the store
//!
//! ```text
//! offset 0                      GlobalConfig   (GLOBAL_RECORD_LEN bytes)
//! GLOBAL_RECORD_LEN + i * P     Preset slot i  (P = PRESET_RECORD_LEN bytes)
//! ```
//!
//! Multi-byte fields are little-endian. Records carry no schema version.

use crate::error::{ActionValidityError, IndexOutOfRange, StorageError};
use crate::model::{
    Action, ActionEvent, ActionEventType, ButtonState, DeviceName, GlobalConfig, MidiChannel,
    OutputTarget, OutputValue, Preset, Trigger, TriggerType,
};
use crate::{DEVICE_CONFIGURED, DEVICE_NAME_LEN, MAX_ACTIONS, NUM_PRESETS};
use bytes::{Buf, BufMut};
use tracing::warn;

/// boot marker, MIDI channel, current preset, device name
pub const GLOBAL_RECORD_LEN: usize = 3 + DEVICE_NAME_LEN;

const TRIGGER_PAYLOAD_LEN: usize = 3;
const EVENT_PAYLOAD_LEN: usize = 7;

/// trigger type, trigger payload, event type, event payload
pub const ACTION_RECORD_LEN: usize = 1 + TRIGGER_PAYLOAD_LEN + 1 + EVENT_PAYLOAD_LEN;

/// id, expression, five state flags, action count
pub const PRESET_HEADER_LEN: usize = 2 + 2 + 5 + 1;

pub const PRESET_RECORD_LEN: usize = PRESET_HEADER_LEN + MAX_ACTIONS * ACTION_RECORD_LEN;

/// Bytes needed for the global record and every preset slot
pub const STORE_CAPACITY: usize = GLOBAL_RECORD_LEN + NUM_PRESETS * PRESET_RECORD_LEN;

/// Byte offset of preset slot `index`
pub fn preset_offset(index: usize) -> Result<usize, IndexOutOfRange> {
    if index >= NUM_PRESETS {
        return Err(IndexOutOfRange {
            index,
            limit: NUM_PRESETS,
        });
    }
    Ok(GLOBAL_RECORD_LEN + index * PRESET_RECORD_LEN)
}

fn corrupt(record: &'static str, reason: impl Into<String>) -> StorageError {
    StorageError::Corrupt {
        record,
        reason: reason.into(),
    }
}

pub fn encode_global(config: &GlobalConfig) -> Vec<u8> {
    let mut buf = Vec::with_capacity(GLOBAL_RECORD_LEN);
    buf.put_u8(config.boot_marker);
    buf.put_u8(config.midi_channel.code());
    buf.put_u8(config.current_preset as u8);

    let mut name = [0u8; DEVICE_NAME_LEN];
    let bytes = config.device_name.as_str().as_bytes();
    name[..bytes.len()].copy_from_slice(bytes);
    buf.put_slice(&name);
    buf
}

/// Decode the global record
///
/// Without the configured boot marker the remaining bytes are meaningless, so
/// the marker is returned alongside factory values and the caller decides.
pub fn decode_global(mut bytes: &[u8]) -> Result<GlobalConfig, StorageError> {
    if bytes.len() != GLOBAL_RECORD_LEN {
        return Err(corrupt(
            "global",
            format!("{} bytes, expected {}", bytes.len(), GLOBAL_RECORD_LEN),
        ));
    }

    let boot_marker = bytes.get_u8();
    let channel_code = bytes.get_u8();
    let current_preset = bytes.get_u8() as usize;

    if boot_marker != DEVICE_CONFIGURED {
        return Ok(GlobalConfig {
            boot_marker,
            ..GlobalConfig::factory()
        });
    }

    let midi_channel = MidiChannel::from_code(channel_code)
        .ok_or_else(|| corrupt("global", format!("MIDI channel {}", channel_code)))?;
    if current_preset >= NUM_PRESETS {
        return Err(corrupt(
            "global",
            format!("current preset {}", current_preset),
        ));
    }

    let name_end = bytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(DEVICE_NAME_LEN);
    let name = std::str::from_utf8(&bytes[..name_end])
        .map_err(|e| corrupt("global", format!("device name: {}", e)))?;
    let device_name =
        DeviceName::new(name).map_err(|e| corrupt("global", e.to_string()))?;

    Ok(GlobalConfig {
        boot_marker,
        midi_channel,
        current_preset,
        device_name,
    })
}

pub fn encode_preset(preset: &Preset) -> Vec<u8> {
    let mut buf = Vec::with_capacity(PRESET_RECORD_LEN);
    buf.put_u16_le(preset.id);
    buf.put_u16_le(preset.expression_value);
    buf.put_u8(preset.switch1_state as u8);
    buf.put_u8(preset.switch2_state as u8);
    buf.put_u8(preset.bypass_relay_state as u8);
    buf.put_u8(preset.aux_relay_state as u8);
    buf.put_u8(preset.analog_switch_state as u8);
    buf.put_u8(preset.num_actions() as u8);

    for action in preset.actions() {
        put_action(&mut buf, action);
    }
    for _ in preset.num_actions()..MAX_ACTIONS {
        put_unused_slot(&mut buf);
    }
    buf
}

/// Decode a preset record
///
/// Action slots that fail to decode are dropped with a warning; they could never
/// fire and must not take the rest of the preset down with them.
pub fn decode_preset(mut bytes: &[u8]) -> Result<Preset, StorageError> {
    if bytes.len() != PRESET_RECORD_LEN {
        return Err(corrupt(
            "preset",
            format!("{} bytes, expected {}", bytes.len(), PRESET_RECORD_LEN),
        ));
    }

    let mut preset = Preset::default();
    preset.id = bytes.get_u16_le();
    preset.expression_value = bytes.get_u16_le();
    preset.switch1_state = bytes.get_u8() != 0;
    preset.switch2_state = bytes.get_u8() != 0;
    preset.bypass_relay_state = bytes.get_u8() != 0;
    preset.aux_relay_state = bytes.get_u8() != 0;
    preset.analog_switch_state = bytes.get_u8() != 0;

    let num_actions = bytes.get_u8() as usize;
    if num_actions > MAX_ACTIONS {
        return Err(corrupt("preset", format!("{} actions", num_actions)));
    }

    let mut actions = Vec::with_capacity(num_actions);
    for (slot, record) in bytes
        .chunks_exact(ACTION_RECORD_LEN)
        .take(num_actions)
        .enumerate()
    {
        match decode_action(record) {
            Ok(action) => actions.push(action),
            Err(e) => warn!(slot, "Dropping undecodable action: {}", e),
        }
    }
    preset
        .set_actions(actions)
        .map_err(|e| corrupt("preset", e.to_string()))?;

    Ok(preset)
}

fn put_action(buf: &mut Vec<u8>, action: &Action) {
    let mut trigger = [0u8; TRIGGER_PAYLOAD_LEN];
    {
        let mut payload: &mut [u8] = &mut trigger;
        match action.trigger {
            Trigger::Switch1(state) | Trigger::Switch2(state) | Trigger::Gpio(_, state) => {
                payload.put_u8(state.code());
            }
            Trigger::MidiCc { number, value } => {
                payload.put_u16_le(number);
                payload.put_u8(value);
            }
            Trigger::EnterBank | Trigger::ExitBank | Trigger::Boot | Trigger::None => {}
        }
    }

    let mut event = [0u8; EVENT_PAYLOAD_LEN];
    {
        let mut payload: &mut [u8] = &mut event;
        match action.event {
            ActionEvent::Midi {
                channel,
                kind,
                data1,
                data2,
            } => {
                payload.put_u8(channel);
                payload.put_u8(kind);
                payload.put_u8(data1);
                payload.put_u8(data2);
            }
            ActionEvent::Expression { value } => payload.put_u16_le(value),
            ActionEvent::Output { target, value } => {
                payload.put_u8(target.code());
                payload.put_u8(value.code());
            }
            ActionEvent::Led { index, colour } => {
                payload.put_u16_le(index);
                payload.put_u32_le(colour);
            }
        }
    }

    buf.put_u8(action.trigger.trigger_type().code());
    buf.put_slice(&trigger);
    buf.put_u8(action.event.event_type().code());
    buf.put_slice(&event);
}

fn put_unused_slot(buf: &mut Vec<u8>) {
    buf.put_u8(TriggerType::None.code());
    buf.put_bytes(0, ACTION_RECORD_LEN - 1);
}

fn decode_action(mut bytes: &[u8]) -> Result<Action, ActionValidityError> {
    let trigger_code = bytes.get_u8();
    let trigger_type =
        TriggerType::from_code(trigger_code).ok_or(ActionValidityError::UnknownTrigger(trigger_code))?;

    let mut trigger_payload = &bytes[..TRIGGER_PAYLOAD_LEN];
    bytes.advance(TRIGGER_PAYLOAD_LEN);

    let trigger = if trigger_type.is_edge() {
        let code = trigger_payload.get_u8();
        let state = ButtonState::from_code(code).ok_or(ActionValidityError::InvalidField {
            field: "button state",
            value: code as u32,
        })?;
        Trigger::edge(trigger_type, state)
    } else if trigger_type == TriggerType::MidiCc {
        Some(Trigger::MidiCc {
            number: trigger_payload.get_u16_le(),
            value: trigger_payload.get_u8(),
        })
    } else {
        Trigger::bare(trigger_type)
    }
    .ok_or(ActionValidityError::UnknownTrigger(trigger_code))?;

    let event_code = bytes.get_u8();
    let event_type =
        ActionEventType::from_code(event_code).ok_or(ActionValidityError::UnknownEvent(event_code))?;

    let event = match event_type {
        ActionEventType::Midi => ActionEvent::Midi {
            channel: bytes.get_u8(),
            kind: bytes.get_u8(),
            data1: bytes.get_u8(),
            data2: bytes.get_u8(),
        },
        ActionEventType::Expression => ActionEvent::Expression {
            value: bytes.get_u16_le(),
        },
        ActionEventType::Output => {
            let target_code = bytes.get_u8();
            let value_code = bytes.get_u8();
            ActionEvent::Output {
                target: OutputTarget::from_code(target_code).ok_or(
                    ActionValidityError::InvalidField {
                        field: "output target",
                        value: target_code as u32,
                    },
                )?,
                value: OutputValue::from_code(value_code).ok_or(
                    ActionValidityError::InvalidField {
                        field: "output value",
                        value: value_code as u32,
                    },
                )?,
            }
        }
        ActionEventType::Led => ActionEvent::Led {
            index: bytes.get_u16_le(),
            colour: bytes.get_u32_le(),
        },
    };

    Ok(Action::new(trigger, event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GpioPin;

    fn sample_preset() -> Preset {
        let mut preset = Preset::with_actions(vec![
            Action::new(
                Trigger::Gpio(GpioPin::new(4).unwrap(), ButtonState::Pressed),
                ActionEvent::Led {
                    index: 2,
                    colour: 0x5A0050,
                },
            ),
            Action::new(
                Trigger::MidiCc {
                    number: 300,
                    value: 64,
                },
                ActionEvent::Output {
                    target: OutputTarget::AnalogSwitch,
                    value: OutputValue::Toggle,
                },
            ),
        ])
        .unwrap();
        preset.id = 513;
        preset.expression_value = 256;
        preset.aux_relay_state = true;
        preset
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(GLOBAL_RECORD_LEN, 19);
        assert_eq!(ACTION_RECORD_LEN, 12);
        assert_eq!(PRESET_RECORD_LEN, 202);
        assert_eq!(STORE_CAPACITY, 19 + 128 * 202);
    }

    #[test]
    fn test_preset_offsets() {
        assert_eq!(preset_offset(0), Ok(GLOBAL_RECORD_LEN));
        assert_eq!(preset_offset(3), Ok(GLOBAL_RECORD_LEN + 3 * PRESET_RECORD_LEN));
        assert_eq!(
            preset_offset(NUM_PRESETS),
            Err(IndexOutOfRange {
                index: NUM_PRESETS,
                limit: NUM_PRESETS
            })
        );
        let last = preset_offset(NUM_PRESETS - 1).unwrap();
        assert_eq!(last + PRESET_RECORD_LEN, STORE_CAPACITY);
    }

    #[test]
    fn test_preset_record_layout() {
        let bytes = encode_preset(&sample_preset());
        assert_eq!(bytes.len(), PRESET_RECORD_LEN);
        // id 513 little-endian, expression 256, aux relay flag, two actions
        assert_eq!(&bytes[..PRESET_HEADER_LEN], &[1, 2, 0, 1, 0, 0, 0, 1, 0, 2]);
        // first action: gpio4 pressed → led 2
        assert_eq!(
            &bytes[PRESET_HEADER_LEN..PRESET_HEADER_LEN + ACTION_RECORD_LEN],
            &[5, 1, 0, 0, 3, 2, 0, 0x50, 0x00, 0x5A, 0, 0]
        );
        // unused slots are parked on trigger type None
        let unused = PRESET_HEADER_LEN + 2 * ACTION_RECORD_LEN;
        assert_eq!(bytes[unused], TriggerType::None.code());
    }

    #[test]
    fn test_preset_record_decodes() {
        let preset = sample_preset();
        assert_eq!(decode_preset(&encode_preset(&preset)).unwrap(), preset);
    }

    #[test]
    fn test_undecodable_action_is_dropped() {
        let mut bytes = encode_preset(&sample_preset());
        // Corrupt the first action's event type
        bytes[PRESET_HEADER_LEN + 4] = 9;

        let preset = decode_preset(&bytes).unwrap();
        assert_eq!(preset.num_actions(), 1);
        assert_eq!(preset.actions()[0].trigger.trigger_type(), TriggerType::MidiCc);
    }

    #[test]
    fn test_action_count_beyond_capacity_is_corrupt() {
        let mut bytes = encode_preset(&sample_preset());
        bytes[PRESET_HEADER_LEN - 1] = (MAX_ACTIONS + 1) as u8;
        assert!(matches!(
            decode_preset(&bytes),
            Err(StorageError::Corrupt { record: "preset", .. })
        ));
    }

    #[test]
    fn test_global_record_layout() {
        let mut config = GlobalConfig::factory();
        config.midi_channel = MidiChannel::Channel(10);
        config.current_preset = 5;
        let bytes = encode_global(&config);

        assert_eq!(bytes.len(), GLOBAL_RECORD_LEN);
        assert_eq!(&bytes[..3], &[DEVICE_CONFIGURED, 10, 5]);
        assert_eq!(&bytes[3..15], b"New Pico Mod");
        assert_eq!(&bytes[15..], &[0, 0, 0, 0]);
        assert_eq!(decode_global(&bytes).unwrap(), config);
    }

    #[test]
    fn test_erased_global_record_is_unconfigured() {
        let config = decode_global(&[0xFF; GLOBAL_RECORD_LEN]).unwrap();
        assert!(!config.is_configured());
        assert_eq!(config.boot_marker, 0xFF);
    }

    #[test]
    fn test_configured_global_with_bad_channel_is_corrupt() {
        let mut bytes = encode_global(&GlobalConfig::factory());
        bytes[1] = 40;
        assert!(matches!(
            decode_global(&bytes),
            Err(StorageError::Corrupt { record: "global", .. })
        ));
    }
}
