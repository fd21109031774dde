//! Configuration data model
//!
//! The global configuration record, presets and the trigger/action bindings they
//! hold. Triggers and events are tagged sums: a payload can only exist under the
//! tag it belongs to, so records and packets are checked once at decode time.

mod action;
mod global;
mod preset;

pub use action::{
    Action, ActionEvent, ActionEventType, ButtonState, GpioPin, OutputLine, OutputTarget,
    OutputValue, Switch, Trigger, TriggerContext, TriggerType,
};
pub use global::{DeviceName, GlobalConfig, MidiChannel};
pub use preset::Preset;
