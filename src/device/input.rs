//! Input events from asynchronous edge sources
//!
//! The console thread and the MIDI input callback never touch the device. They
//! push [`InputEvent`]s into a bounded queue drained by the main loop.

use crate::error::StoreError;
use crate::hardware::Step;
use crate::midi::{MessageKind, MidiMessage};
use crate::model::{ButtonState, GpioPin, Switch, TriggerContext, TriggerType};
use crate::store::ByteStore;
use crate::{EXPRESSION_MAX, NUM_PRESETS};
use std::fmt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Previous,
    Goto(usize),
}

impl fmt::Display for Navigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Navigation::Next => write!(f, "next"),
            Navigation::Previous => write!(f, "previous"),
            Navigation::Goto(index) => write!(f, "goto {}", index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Switch { switch: Switch, state: ButtonState },
    Gpio { pin: GpioPin, state: ButtonState },
    Midi(MidiMessage),
    ExpressionStep(Step),
    Navigate(Navigation),
    SaveActivePreset,
}

/// Producer side of the input queue
#[derive(Debug, Clone)]
pub struct InputSender {
    tx: mpsc::Sender<InputEvent>,
}

impl InputSender {
    /// Enqueue without blocking; a full queue drops the event
    pub fn push(&self, event: InputEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!("Input queue full, dropping {:?}", event);
                false
            }
            Err(TrySendError::Closed(event)) => {
                debug!("Input queue closed, dropping {:?}", event);
                false
            }
        }
    }
}

pub fn input_queue(capacity: usize) -> (InputSender, mpsc::Receiver<InputEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (InputSender { tx }, rx)
}

impl<S: ByteStore> super::Device<S> {
    pub fn handle_input(&mut self, event: InputEvent) -> Result<(), StoreError> {
        trace!(?event, "Input");
        match event {
            InputEvent::Switch { switch, state } => {
                self.active.set_switch_state(switch, state.is_pressed());
                self.dispatch(switch.trigger_type(), TriggerContext::Edge(state));
            }
            InputEvent::Gpio { pin, state } => {
                self.dispatch(TriggerType::gpio(pin), TriggerContext::Edge(state));
            }
            InputEvent::Midi(message) => self.handle_midi(message)?,
            InputEvent::ExpressionStep(step) => self.step_expression(step),
            InputEvent::Navigate(navigation) => {
                self.navigate(navigation)?;
            }
            InputEvent::SaveActivePreset => self.save_active_preset()?,
        }
        Ok(())
    }

    /// Handle every event already queued, returning how many were handled
    ///
    /// A failing event is logged and does not stop the drain.
    pub fn drain(&mut self, rx: &mut mpsc::Receiver<InputEvent>) -> usize {
        let mut handled = 0;
        while let Ok(event) = rx.try_recv() {
            if let Err(e) = self.handle_input(event) {
                warn!("Input {:?} failed: {}", event, e);
            }
            handled += 1;
        }
        handled
    }

    fn handle_midi(&mut self, message: MidiMessage) -> Result<(), StoreError> {
        if !self.global.midi_channel.accepts(message.channel) {
            trace!(
                "Ignoring {} (listening on {})",
                message,
                self.global.midi_channel
            );
            return Ok(());
        }

        match message.kind {
            MessageKind::ControlChange => {
                self.dispatch(
                    TriggerType::MidiCc,
                    TriggerContext::Cc {
                        number: message.data1,
                        value: message.data2,
                    },
                );
            }
            MessageKind::ProgramChange => {
                let index = usize::from(message.data1);
                if index < NUM_PRESETS {
                    self.preset_goto(index)?;
                } else {
                    debug!("Program change {} has no preset", index);
                }
            }
            _ => trace!("Ignoring {}", message),
        }
        Ok(())
    }

    fn step_expression(&mut self, step: Step) {
        let result = match step {
            Step::Up => self.hardware.expression.increment(),
            Step::Down => self.hardware.expression.decrement(),
        };
        if let Err(e) = result {
            warn!("Expression step failed: {:#}", e);
            return;
        }

        // Stored levels are not range checked on load
        let level = self.active.expression_value.min(EXPRESSION_MAX);
        self.active.expression_value = match step {
            Step::Up => level.saturating_add(1).min(EXPRESSION_MAX),
            Step::Down => level.saturating_sub(1),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_full_queue_drops_events() {
        let (tx, mut rx) = input_queue(1);
        assert!(tx.push(InputEvent::SaveActivePreset));
        assert!(!tx.push(InputEvent::Navigate(Navigation::Next)));

        assert_eq!(rx.recv().await, Some(InputEvent::SaveActivePreset));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_queue_drops_events() {
        let (tx, rx) = input_queue(4);
        drop(rx);
        assert!(!tx.push(InputEvent::SaveActivePreset));
    }

    #[test]
    fn test_navigation_display() {
        assert_eq!(Navigation::Goto(12).to_string(), "goto 12");
        assert_eq!(Navigation::Previous.to_string(), "previous");
    }
}
