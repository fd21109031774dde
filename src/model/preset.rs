//! Preset records

use super::action::{Action, OutputLine, Switch, TriggerType};
use crate::error::TooManyActions;
use crate::{DEFAULT_EXPRESSION, MAX_ACTIONS};

/// A bundle of actions plus the output levels last commanded while it was active
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    pub id: u16,
    /// Last expression level written to the digipot
    pub expression_value: u16,
    pub switch1_state: bool,
    pub switch2_state: bool,
    pub bypass_relay_state: bool,
    pub aux_relay_state: bool,
    pub analog_switch_state: bool,
    actions: Vec<Action>,
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            id: 0,
            expression_value: DEFAULT_EXPRESSION,
            switch1_state: false,
            switch2_state: false,
            bypass_relay_state: false,
            aux_relay_state: false,
            analog_switch_state: false,
            actions: Vec::new(),
        }
    }
}

impl Preset {
    pub fn with_actions(actions: Vec<Action>) -> Result<Self, TooManyActions> {
        let mut preset = Self::default();
        preset.set_actions(actions)?;
        Ok(preset)
    }

    /// Actions in evaluation order
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn num_actions(&self) -> usize {
        self.actions.len()
    }

    pub fn set_actions(&mut self, actions: Vec<Action>) -> Result<(), TooManyActions> {
        if actions.len() > MAX_ACTIONS {
            return Err(TooManyActions {
                got: actions.len(),
                max: MAX_ACTIONS,
            });
        }
        self.actions = actions;
        Ok(())
    }

    pub fn push_action(&mut self, action: Action) -> Result<(), TooManyActions> {
        if self.actions.len() >= MAX_ACTIONS {
            return Err(TooManyActions {
                got: self.actions.len() + 1,
                max: MAX_ACTIONS,
            });
        }
        self.actions.push(action);
        Ok(())
    }

    /// Actions bound to `trigger_type`, in stored order
    pub fn matching(&self, trigger_type: TriggerType) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(move |a| a.fires_on(trigger_type))
    }

    pub fn output_state(&self, line: OutputLine) -> bool {
        match line {
            OutputLine::BypassRelay => self.bypass_relay_state,
            OutputLine::AuxRelay => self.aux_relay_state,
            OutputLine::AnalogSwitch => self.analog_switch_state,
        }
    }

    pub fn set_output_state(&mut self, line: OutputLine, on: bool) {
        match line {
            OutputLine::BypassRelay => self.bypass_relay_state = on,
            OutputLine::AuxRelay => self.aux_relay_state = on,
            OutputLine::AnalogSwitch => self.analog_switch_state = on,
        }
    }

    pub fn set_switch_state(&mut self, switch: Switch, pressed: bool) {
        match switch {
            Switch::One => self.switch1_state = pressed,
            Switch::Two => self.switch2_state = pressed,
        }
    }
}
