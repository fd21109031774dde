//! Preset navigation

use super::Navigation;
use crate::error::{IndexOutOfRange, StoreError};
use crate::model::{TriggerContext, TriggerType};
use crate::store::ByteStore;
use crate::NUM_PRESETS;
use tracing::info;

impl<S: ByteStore> super::Device<S> {
    /// Move to the next slot, wrapping after the last one
    pub fn preset_next(&mut self) -> Result<usize, StoreError> {
        let index = (self.global.current_preset + 1) % NUM_PRESETS;
        self.switch_to(index)
    }

    /// Move to the previous slot, wrapping before the first one
    pub fn preset_previous(&mut self) -> Result<usize, StoreError> {
        let index = (self.global.current_preset + NUM_PRESETS - 1) % NUM_PRESETS;
        self.switch_to(index)
    }

    pub fn preset_goto(&mut self, index: usize) -> Result<usize, StoreError> {
        if index >= NUM_PRESETS {
            return Err(IndexOutOfRange {
                index,
                limit: NUM_PRESETS,
            }
            .into());
        }
        self.switch_to(index)
    }

    pub fn navigate(&mut self, navigation: Navigation) -> Result<usize, StoreError> {
        match navigation {
            Navigation::Next => self.preset_next(),
            Navigation::Previous => self.preset_previous(),
            Navigation::Goto(index) => self.preset_goto(index),
        }
    }

    /// Exit the current preset, make `index` active and persisted, enter it
    fn switch_to(&mut self, index: usize) -> Result<usize, StoreError> {
        self.dispatch(TriggerType::ExitBank, TriggerContext::None);

        let preset = self.store.load_preset(index)?;
        let mut global = self.global.clone();
        global.current_preset = index;
        self.store.save_global_config(&global)?;

        let previous = self.global.current_preset;
        self.global = global;
        self.active = preset;
        info!("Preset {} → {}", previous, index);

        self.recall_outputs();
        self.dispatch(TriggerType::EnterBank, TriggerContext::None);
        Ok(index)
    }
}
