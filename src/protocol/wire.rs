//! JSON documents exchanged with the host
//!
//! Packets mirror the wire field names. Conversion to the model happens here and
//! is where tags and payloads are checked against each other.

use crate::error::{ActionValidityError, ProtocolError};
use crate::model::{
    Action, ActionEvent, ActionEventType, ButtonState, DeviceName, GlobalConfig, MidiChannel,
    OutputTarget, OutputValue, Preset, Trigger, TriggerType,
};
use crate::{EXPRESSION_MAX, MAX_ACTIONS, NUM_PRESETS};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Global config as emitted by `receiveGlobal` and the boot announcement
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfigPacket<'a> {
    pub current_preset: usize,
    pub midi_channel: u8,
    pub device_name: &'a str,
    pub hw_version: &'a str,
    pub fw_version: &'a str,
}

impl<'a> GlobalConfigPacket<'a> {
    pub fn new(global: &'a GlobalConfig, hw_version: &'a str, fw_version: &'a str) -> Self {
        Self {
            current_preset: global.current_preset,
            midi_channel: global.midi_channel.code(),
            device_name: global.device_name.as_str(),
            hw_version,
            fw_version,
        }
    }
}

/// Payload following `sendGlobal`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfigUpdate {
    pub device_name: String,
    pub midi_channel: u8,
}

impl GlobalConfigUpdate {
    pub fn validate(self) -> Result<(DeviceName, MidiChannel), ProtocolError> {
        let name = DeviceName::new(self.device_name).map_err(|e| ProtocolError::InvalidField {
            field: "deviceName",
            reason: e.to_string(),
        })?;
        let channel =
            MidiChannel::from_code(self.midi_channel).ok_or_else(|| ProtocolError::InvalidField {
                field: "midiChannel",
                reason: format!("{} is not 0 (omni) or 1-16", self.midi_channel),
            })?;
        Ok((name, channel))
    }
}

/// State flags go out as 0/1 and come in as 0/1 or booleans
mod flag {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Flag {
            Bool(bool),
            Int(u64),
        }

        match Flag::deserialize(deserializer)? {
            Flag::Bool(b) => Ok(b),
            Flag::Int(0) => Ok(false),
            Flag::Int(1) => Ok(true),
            Flag::Int(n) => Err(D::Error::custom(format!("flag must be 0 or 1, got {}", n))),
        }
    }
}

/// A preset with its slot index
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetPacket {
    pub index: usize,
    pub id: u16,
    /// Absent on input keeps the slot's current level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_value: Option<u16>,
    #[serde(with = "flag")]
    pub switch1_state: bool,
    #[serde(with = "flag")]
    pub switch2_state: bool,
    #[serde(with = "flag")]
    pub bypass_relay_state: bool,
    #[serde(with = "flag")]
    pub aux_relay_state: bool,
    #[serde(with = "flag")]
    pub analog_switch_state: bool,
    pub num_actions: usize,
    pub actions: Vec<ActionPacket>,
}

impl PresetPacket {
    pub fn new(index: usize, preset: &Preset) -> Self {
        Self {
            index,
            id: preset.id,
            exp_value: Some(preset.expression_value),
            switch1_state: preset.switch1_state,
            switch2_state: preset.switch2_state,
            bypass_relay_state: preset.bypass_relay_state,
            aux_relay_state: preset.aux_relay_state,
            analog_switch_state: preset.analog_switch_state,
            num_actions: preset.num_actions(),
            actions: preset.actions().iter().map(ActionPacket::from).collect(),
        }
    }

    /// Build the preset, using `slot_expression` when no `expValue` was sent
    pub fn into_preset(self, slot_expression: u16) -> Result<Preset, ProtocolError> {
        if self.index >= NUM_PRESETS {
            return Err(crate::error::IndexOutOfRange {
                index: self.index,
                limit: NUM_PRESETS,
            }
            .into());
        }
        if let Some(level) = self.exp_value.filter(|level| *level > EXPRESSION_MAX) {
            return Err(ProtocolError::InvalidField {
                field: "expValue",
                reason: format!("{} exceeds {}", level, EXPRESSION_MAX),
            });
        }
        if self.num_actions > MAX_ACTIONS {
            return Err(ProtocolError::InvalidField {
                field: "numActions",
                reason: format!("{} exceeds {}", self.num_actions, MAX_ACTIONS),
            });
        }
        if self.num_actions != self.actions.len() {
            return Err(ProtocolError::InvalidField {
                field: "numActions",
                reason: format!("{} but {} actions sent", self.num_actions, self.actions.len()),
            });
        }

        let actions = self
            .actions
            .iter()
            .enumerate()
            .map(|(index, packet)| packet.to_action(index))
            .collect::<Result<Vec<_>, _>>()?;

        let mut preset = Preset::with_actions(actions).map_err(|e| ProtocolError::InvalidField {
            field: "actions",
            reason: e.to_string(),
        })?;
        preset.id = self.id;
        preset.expression_value = self.exp_value.unwrap_or(slot_expression);
        preset.switch1_state = self.switch1_state;
        preset.switch2_state = self.switch2_state;
        preset.bypass_relay_state = self.bypass_relay_state;
        preset.aux_relay_state = self.aux_relay_state;
        preset.analog_switch_state = self.analog_switch_state;
        Ok(preset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPacket {
    #[serde(rename = "type")]
    pub trigger_type: u8,
    /// Button state, or CC value for MIDI triggers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPacket {
    pub trigger: TriggerPacket,
    #[serde(rename = "type")]
    pub event_type: u8,
    pub event: Value,
}

#[derive(Debug, Deserialize)]
struct MidiEventPacket {
    channel: u8,
    #[serde(rename = "type")]
    kind: u8,
    data1: u8,
    data2: u8,
}

#[derive(Debug, Deserialize)]
struct ExpressionEventPacket {
    value: u16,
}

#[derive(Debug, Deserialize)]
struct OutputEventPacket {
    target: u8,
    value: u8,
}

#[derive(Debug, Deserialize)]
struct LedEventPacket {
    #[serde(alias = "value")]
    index: u16,
    #[serde(alias = "colour")]
    color: u32,
}

impl From<&Action> for ActionPacket {
    fn from(action: &Action) -> Self {
        let trigger_type = action.trigger.trigger_type().code();
        let trigger = match action.trigger {
            Trigger::MidiCc { number, value } => TriggerPacket {
                trigger_type,
                value: Some(value),
                number: Some(number),
            },
            other => TriggerPacket {
                trigger_type,
                value: other.edge_state().map(ButtonState::code),
                number: None,
            },
        };

        let event = match action.event {
            ActionEvent::Midi {
                channel,
                kind,
                data1,
                data2,
            } => json!({ "channel": channel, "type": kind, "data1": data1, "data2": data2 }),
            ActionEvent::Expression { value } => json!({ "value": value }),
            ActionEvent::Output { target, value } => {
                json!({ "target": target.code(), "value": value.code() })
            }
            ActionEvent::Led { index, colour } => json!({ "index": index, "color": colour }),
        };

        Self {
            trigger,
            event_type: action.event.event_type().code(),
            event,
        }
    }
}

impl ActionPacket {
    /// Decode into a model action; `index` is the position in the preset for
    /// error reporting
    pub fn to_action(&self, index: usize) -> Result<Action, ProtocolError> {
        let invalid = |source| ProtocolError::InvalidAction { index, source };

        let trigger = self.decode_trigger().map_err(invalid)?;
        let event_type = ActionEventType::from_code(self.event_type)
            .ok_or(ActionValidityError::UnknownEvent(self.event_type))
            .map_err(invalid)?;

        let shape = |e: serde_json::Error| ProtocolError::InvalidField {
            field: "event",
            reason: format!("action {}: {}", index, e),
        };
        let event = match event_type {
            ActionEventType::Midi => {
                let p: MidiEventPacket = serde_json::from_value(self.event.clone()).map_err(shape)?;
                ActionEvent::Midi {
                    channel: p.channel,
                    kind: p.kind,
                    data1: p.data1,
                    data2: p.data2,
                }
            }
            ActionEventType::Expression => {
                let p: ExpressionEventPacket =
                    serde_json::from_value(self.event.clone()).map_err(shape)?;
                ActionEvent::Expression { value: p.value }
            }
            ActionEventType::Output => {
                let p: OutputEventPacket =
                    serde_json::from_value(self.event.clone()).map_err(shape)?;
                let target = OutputTarget::from_code(p.target)
                    .ok_or(ActionValidityError::InvalidField {
                        field: "output target",
                        value: u32::from(p.target),
                    })
                    .map_err(invalid)?;
                let value = OutputValue::from_code(p.value)
                    .ok_or(ActionValidityError::InvalidField {
                        field: "output value",
                        value: u32::from(p.value),
                    })
                    .map_err(invalid)?;
                ActionEvent::Output { target, value }
            }
            ActionEventType::Led => {
                let p: LedEventPacket = serde_json::from_value(self.event.clone()).map_err(shape)?;
                ActionEvent::Led {
                    index: p.index,
                    colour: p.color,
                }
            }
        };

        Ok(Action::new(trigger, event))
    }

    fn decode_trigger(&self) -> Result<Trigger, ActionValidityError> {
        let code = self.trigger.trigger_type;
        let trigger_type =
            TriggerType::from_code(code).ok_or(ActionValidityError::UnknownTrigger(code))?;

        if trigger_type.is_edge() {
            let value = self
                .trigger
                .value
                .ok_or(ActionValidityError::MissingField("trigger.value"))?;
            let state = ButtonState::from_code(value).ok_or(ActionValidityError::InvalidField {
                field: "button state",
                value: u32::from(value),
            })?;
            return Trigger::edge(trigger_type, state)
                .ok_or(ActionValidityError::UnknownTrigger(code));
        }

        if trigger_type == TriggerType::MidiCc {
            return Ok(Trigger::MidiCc {
                number: self
                    .trigger
                    .number
                    .ok_or(ActionValidityError::MissingField("trigger.number"))?,
                value: self
                    .trigger
                    .value
                    .ok_or(ActionValidityError::MissingField("trigger.value"))?,
            });
        }

        Trigger::bare(trigger_type).ok_or(ActionValidityError::UnknownTrigger(code))
    }
}
