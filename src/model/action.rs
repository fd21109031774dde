//! Trigger and action event types
//!
//! Numeric codes (`code()` / `from_code()`) are shared by the persistent record
//! layout and the host JSON protocol.

use std::fmt;

/// Edge state reported by a switch or general-purpose input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ButtonState {
    #[default]
    Released = 0,
    Pressed = 1,
}

impl ButtonState {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ButtonState::Released),
            1 => Some(ButtonState::Pressed),
            _ => None,
        }
    }

    pub fn is_pressed(self) -> bool {
        self == ButtonState::Pressed
    }
}

impl From<bool> for ButtonState {
    fn from(pressed: bool) -> Self {
        if pressed {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        }
    }
}

impl fmt::Display for ButtonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonState::Released => write!(f, "released"),
            ButtonState::Pressed => write!(f, "pressed"),
        }
    }
}

/// One of the seven general-purpose input pins (1-7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpioPin(u8);

impl GpioPin {
    pub const COUNT: u8 = 7;

    pub fn new(number: u8) -> Option<Self> {
        (1..=Self::COUNT).contains(&number).then_some(Self(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for GpioPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpio{}", self.0)
    }
}

/// The two footswitches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Switch {
    One,
    Two,
}

impl Switch {
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Switch::One),
            2 => Some(Switch::Two),
            _ => None,
        }
    }

    pub fn trigger_type(self) -> TriggerType {
        match self {
            Switch::One => TriggerType::Switch1,
            Switch::Two => TriggerType::Switch2,
        }
    }
}

/// Discriminant of a [`Trigger`], used to select actions during dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TriggerType {
    Switch1 = 0,
    Switch2 = 1,
    Gpio1 = 2,
    Gpio2 = 3,
    Gpio3 = 4,
    Gpio4 = 5,
    Gpio5 = 6,
    Gpio6 = 7,
    Gpio7 = 8,
    MidiCc = 9,
    EnterBank = 10,
    ExitBank = 11,
    Boot = 12,
    None = 13,
}

impl TriggerType {
    pub const ALL: [TriggerType; 14] = [
        TriggerType::Switch1,
        TriggerType::Switch2,
        TriggerType::Gpio1,
        TriggerType::Gpio2,
        TriggerType::Gpio3,
        TriggerType::Gpio4,
        TriggerType::Gpio5,
        TriggerType::Gpio6,
        TriggerType::Gpio7,
        TriggerType::MidiCc,
        TriggerType::EnterBank,
        TriggerType::ExitBank,
        TriggerType::Boot,
        TriggerType::None,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn gpio(pin: GpioPin) -> Self {
        // Gpio1..Gpio7 occupy codes 2..=8
        Self::ALL[pin.number() as usize + 1]
    }

    /// The input pin of a GPIO trigger type
    pub fn gpio_pin(self) -> Option<GpioPin> {
        match self.code() {
            code @ 2..=8 => GpioPin::new(code - 1),
            _ => None,
        }
    }

    /// Whether actions of this type carry a button edge payload
    pub fn is_edge(self) -> bool {
        self.code() <= TriggerType::Gpio7.code()
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerType::Switch1 => write!(f, "switch1"),
            TriggerType::Switch2 => write!(f, "switch2"),
            TriggerType::MidiCc => write!(f, "midi-cc"),
            TriggerType::EnterBank => write!(f, "enter-bank"),
            TriggerType::ExitBank => write!(f, "exit-bank"),
            TriggerType::Boot => write!(f, "boot"),
            TriggerType::None => write!(f, "none"),
            gpio => match gpio.gpio_pin() {
                Some(pin) => write!(f, "{}", pin),
                None => write!(f, "trigger#{}", gpio.code()),
            },
        }
    }
}

/// What causes an action to fire, together with the payload its type carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Trigger {
    Switch1(ButtonState),
    Switch2(ButtonState),
    Gpio(GpioPin, ButtonState),
    MidiCc { number: u16, value: u8 },
    EnterBank,
    ExitBank,
    Boot,
    #[default]
    None,
}

impl Trigger {
    /// Edge trigger of a switch or GPIO type
    pub fn edge(trigger_type: TriggerType, state: ButtonState) -> Option<Self> {
        match trigger_type {
            TriggerType::Switch1 => Some(Trigger::Switch1(state)),
            TriggerType::Switch2 => Some(Trigger::Switch2(state)),
            other => other.gpio_pin().map(|pin| Trigger::Gpio(pin, state)),
        }
    }

    /// Trigger of a type that carries no payload
    pub fn bare(trigger_type: TriggerType) -> Option<Self> {
        match trigger_type {
            TriggerType::EnterBank => Some(Trigger::EnterBank),
            TriggerType::ExitBank => Some(Trigger::ExitBank),
            TriggerType::Boot => Some(Trigger::Boot),
            TriggerType::None => Some(Trigger::None),
            _ => None,
        }
    }

    pub fn edge_state(&self) -> Option<ButtonState> {
        match self {
            Trigger::Switch1(state) | Trigger::Switch2(state) | Trigger::Gpio(_, state) => {
                Some(*state)
            }
            _ => None,
        }
    }

    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Trigger::Switch1(_) => TriggerType::Switch1,
            Trigger::Switch2(_) => TriggerType::Switch2,
            Trigger::Gpio(pin, _) => TriggerType::gpio(*pin),
            Trigger::MidiCc { .. } => TriggerType::MidiCc,
            Trigger::EnterBank => TriggerType::EnterBank,
            Trigger::ExitBank => TriggerType::ExitBank,
            Trigger::Boot => TriggerType::Boot,
            Trigger::None => TriggerType::None,
        }
    }
}

/// Runtime details of the event being dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerContext {
    #[default]
    None,
    /// Switch or GPIO edge
    Edge(ButtonState),
    /// Incoming control change
    Cc { number: u8, value: u8 },
}

impl fmt::Display for TriggerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerContext::None => write!(f, "-"),
            TriggerContext::Edge(state) => write!(f, "{}", state),
            TriggerContext::Cc { number, value } => write!(f, "cc{}={}", number, value),
        }
    }
}

/// Discriminant of an [`ActionEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActionEventType {
    Midi = 0,
    Expression = 1,
    Output = 2,
    Led = 3,
}

impl ActionEventType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ActionEventType::Midi),
            1 => Some(ActionEventType::Expression),
            2 => Some(ActionEventType::Output),
            3 => Some(ActionEventType::Led),
            _ => None,
        }
    }
}

/// Physical output lines whose state a preset caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputLine {
    BypassRelay,
    AuxRelay,
    AnalogSwitch,
}

impl OutputLine {
    pub const ALL: [OutputLine; 3] = [
        OutputLine::BypassRelay,
        OutputLine::AuxRelay,
        OutputLine::AnalogSwitch,
    ];
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputLine::BypassRelay => write!(f, "bypass-relay"),
            OutputLine::AuxRelay => write!(f, "aux-relay"),
            OutputLine::AnalogSwitch => write!(f, "analog-switch"),
        }
    }
}

/// Target of an output action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OutputTarget {
    BypassRelay = 0,
    AuxRelay = 1,
    AnalogSwitch = 2,
    Gpio = 3,
}

impl OutputTarget {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(OutputTarget::BypassRelay),
            1 => Some(OutputTarget::AuxRelay),
            2 => Some(OutputTarget::AnalogSwitch),
            3 => Some(OutputTarget::Gpio),
            _ => None,
        }
    }

    /// The switched line behind this target. GPIO outputs carry no pin and
    /// cannot be routed.
    pub fn line(self) -> Option<OutputLine> {
        match self {
            OutputTarget::BypassRelay => Some(OutputLine::BypassRelay),
            OutputTarget::AuxRelay => Some(OutputLine::AuxRelay),
            OutputTarget::AnalogSwitch => Some(OutputLine::AnalogSwitch),
            OutputTarget::Gpio => None,
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line() {
            Some(line) => write!(f, "{}", line),
            None => write!(f, "gpio"),
        }
    }
}

/// Commanded output level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OutputValue {
    Off = 0,
    On = 1,
    Toggle = 2,
}

impl OutputValue {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(OutputValue::Off),
            1 => Some(OutputValue::On),
            2 => Some(OutputValue::Toggle),
            _ => None,
        }
    }

    /// Resulting line state given the current one
    pub fn apply(self, current: bool) -> bool {
        match self {
            OutputValue::Off => false,
            OutputValue::On => true,
            OutputValue::Toggle => !current,
        }
    }
}

/// What an action does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionEvent {
    /// Send a channel message. `kind` is the status nibble (0x80..=0xE0),
    /// `channel` is 1-16.
    Midi {
        channel: u8,
        kind: u8,
        data1: u8,
        data2: u8,
    },
    /// Set the expression digipot, 0..=256
    Expression { value: u16 },
    /// Drive a relay or switch
    Output {
        target: OutputTarget,
        value: OutputValue,
    },
    /// Set an LED pixel to a 0xRRGGBB colour
    Led { index: u16, colour: u32 },
}

impl ActionEvent {
    pub fn event_type(&self) -> ActionEventType {
        match self {
            ActionEvent::Midi { .. } => ActionEventType::Midi,
            ActionEvent::Expression { .. } => ActionEventType::Expression,
            ActionEvent::Output { .. } => ActionEventType::Output,
            ActionEvent::Led { .. } => ActionEventType::Led,
        }
    }
}

/// A stored trigger → event binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Action {
    pub trigger: Trigger,
    pub event: ActionEvent,
}

impl Action {
    pub fn new(trigger: Trigger, event: ActionEvent) -> Self {
        Self { trigger, event }
    }

    pub fn fires_on(&self, trigger_type: TriggerType) -> bool {
        self.trigger.trigger_type() == trigger_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_type_codes_are_positional() {
        for (position, trigger_type) in TriggerType::ALL.iter().enumerate() {
            assert_eq!(trigger_type.code() as usize, position);
            assert_eq!(TriggerType::from_code(position as u8), Some(*trigger_type));
        }
        assert_eq!(TriggerType::from_code(14), None);
    }

    #[test]
    fn test_gpio_pins_map_to_their_trigger_types() {
        let pin = GpioPin::new(3).unwrap();
        assert_eq!(TriggerType::gpio(pin), TriggerType::Gpio3);
        assert_eq!(TriggerType::Gpio3.gpio_pin(), Some(pin));
        assert_eq!(TriggerType::gpio(GpioPin::new(7).unwrap()), TriggerType::Gpio7);
        assert_eq!(TriggerType::MidiCc.gpio_pin(), None);
        assert!(GpioPin::new(0).is_none());
        assert!(GpioPin::new(8).is_none());
    }

    #[test]
    fn test_trigger_reports_its_type() {
        let pin = GpioPin::new(1).unwrap();
        assert_eq!(
            Trigger::Gpio(pin, ButtonState::Pressed).trigger_type(),
            TriggerType::Gpio1
        );
        assert_eq!(
            Trigger::MidiCc { number: 64, value: 127 }.trigger_type(),
            TriggerType::MidiCc
        );
        assert_eq!(Trigger::default().trigger_type(), TriggerType::None);
    }

    #[test]
    fn test_edge_trigger_types() {
        assert!(TriggerType::Switch2.is_edge());
        assert!(TriggerType::Gpio7.is_edge());
        assert!(!TriggerType::MidiCc.is_edge());
        assert!(!TriggerType::Boot.is_edge());
    }

    #[test]
    fn test_output_value_apply() {
        assert!(OutputValue::On.apply(false));
        assert!(!OutputValue::Off.apply(true));
        assert!(OutputValue::Toggle.apply(false));
        assert!(!OutputValue::Toggle.apply(true));
    }

    #[test]
    fn test_gpio_output_target_is_unroutable() {
        assert_eq!(OutputTarget::AuxRelay.line(), Some(OutputLine::AuxRelay));
        assert_eq!(OutputTarget::Gpio.line(), None);
    }
}
