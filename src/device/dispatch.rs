//! Trigger dispatch and action execution

use crate::error::ActionValidityError;
use crate::midi::MidiMessage;
use crate::model::{Action, ActionEvent, OutputLine, TriggerContext, TriggerType};
use crate::store::ByteStore;
use crate::EXPRESSION_MAX;
use tracing::{debug, trace, warn};

impl<S: ByteStore> super::Device<S> {
    /// Execute every action of the active preset bound to `trigger_type`
    ///
    /// Actions run in stored order, each once. Only the trigger type is matched;
    /// `context` is carried for tracing. An invalid action is skipped with a
    /// warning and the rest still run.
    ///
    /// Returns the number of actions executed.
    pub fn dispatch(&mut self, trigger_type: TriggerType, context: TriggerContext) -> usize {
        // Execution mirrors state into the active preset, so work on a copy
        let actions: Vec<Action> = self.active.matching(trigger_type).copied().collect();
        if actions.is_empty() {
            trace!(trigger = %trigger_type, %context, "No actions bound");
            return 0;
        }

        debug!(
            trigger = %trigger_type,
            %context,
            count = actions.len(),
            "Dispatching"
        );

        let mut executed = 0;
        for (slot, action) in actions.iter().enumerate() {
            match self.execute(&action.event) {
                Ok(()) => executed += 1,
                Err(e) => warn!(trigger = %trigger_type, slot, "Skipping action: {}", e),
            }
        }
        executed
    }

    fn execute(&mut self, event: &ActionEvent) -> Result<(), ActionValidityError> {
        match *event {
            ActionEvent::Midi {
                channel,
                kind,
                data1,
                data2,
            } => {
                let message = MidiMessage::from_action(channel, kind, data1, data2)?;
                if let Err(e) = self.hardware.midi.send(&message) {
                    warn!("MIDI send failed: {:#}", e);
                }
            }
            ActionEvent::Expression { value } => {
                if value > EXPRESSION_MAX {
                    return Err(ActionValidityError::ExpressionOutOfRange(value));
                }
                match self.hardware.expression.write(value) {
                    Ok(()) => self.active.expression_value = value,
                    Err(e) => warn!("Expression write failed: {:#}", e),
                }
            }
            ActionEvent::Output { target, value } => {
                let line = target
                    .line()
                    .ok_or(ActionValidityError::UnroutableOutput(target))?;
                let on = value.apply(self.active.output_state(line));
                self.drive_output(line, on);
            }
            ActionEvent::Led { index, colour } => {
                let len = self.hardware.leds.len();
                if usize::from(index) >= len {
                    return Err(ActionValidityError::LedOutOfRange { index, len });
                }
                let leds = &mut self.hardware.leds;
                if let Err(e) = leds
                    .set_pixel(usize::from(index), colour)
                    .and_then(|()| leds.show())
                {
                    warn!("LED update failed: {:#}", e);
                }
            }
        }
        Ok(())
    }

    /// Drive `line` and mirror the level into the active preset
    pub(super) fn drive_output(&mut self, line: OutputLine, on: bool) {
        match self.hardware.outputs.set(line, on) {
            Ok(()) => self.active.set_output_state(line, on),
            Err(e) => warn!("{} update failed: {:#}", line, e),
        }
    }

    /// Push the active preset's cached output state to the hardware
    pub(super) fn recall_outputs(&mut self) {
        for line in OutputLine::ALL {
            self.drive_output(line, self.active.output_state(line));
        }

        let level = self.active.expression_value;
        if level > EXPRESSION_MAX {
            warn!("Stored expression level {} out of range, not recalled", level);
        } else if let Err(e) = self.hardware.expression.write(level) {
            warn!("Expression recall failed: {:#}", e);
        }
    }
}
