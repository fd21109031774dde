//! The device context
//!
//! A [`Device`] owns the configuration store, the global config, the active
//! preset buffer and the collaborator handles. Everything that changes device
//! state goes through it from a single thread of control:
//!
//! - Trigger dispatch against the active preset (`dispatch.rs`)
//! - Preset navigation (`navigation.rs`)
//! - Queued input events from edge sources (`input.rs`)
//! - Configuration writes coming from the host protocol (below)

mod dispatch;
mod input;
mod navigation;

pub use input::{input_queue, InputEvent, InputSender, Navigation};

use crate::error::{StorageError, StoreError};
use crate::hardware::Hardware;
use crate::model::{DeviceName, GlobalConfig, MidiChannel, Preset, TriggerContext, TriggerType};
use crate::store::{ByteStore, ConfigStore};
use tracing::{info, warn};

/// Result of one boot pass
pub enum BootOutcome<S> {
    /// Configuration loaded and the active preset is live
    Ready(Device<S>),
    /// The store was unconfigured and has been reset; boot again
    FactoryReset {
        store: ConfigStore<S>,
        hardware: Hardware,
    },
}

pub struct Device<S> {
    store: ConfigStore<S>,
    global: GlobalConfig,
    active: Preset,
    hardware: Hardware,
}

impl<S: ByteStore> Device<S> {
    /// Run one boot pass
    ///
    /// An unconfigured or corrupt global record triggers a factory reset and
    /// asks for a restart. Otherwise the current preset becomes active, its
    /// cached outputs are recalled and `Boot` is dispatched.
    pub fn boot(mut store: ConfigStore<S>, hardware: Hardware) -> Result<BootOutcome<S>, StoreError> {
        let global = match store.load() {
            Ok(global) if global.is_configured() => Some(global),
            Ok(global) => {
                info!("Boot marker {} not set, device unconfigured", global.boot_marker);
                None
            }
            Err(e @ StorageError::Corrupt { .. }) => {
                warn!("Global config unreadable: {}", e);
                None
            }
            Err(e) => return Err(e.into()),
        };

        let Some(global) = global else {
            store.factory_reset()?;
            return Ok(BootOutcome::FactoryReset { store, hardware });
        };

        let active = match store.load_preset(global.current_preset) {
            Ok(preset) => preset,
            Err(StoreError::Storage(e @ StorageError::Corrupt { .. })) => {
                warn!(
                    "Preset {} unreadable, starting empty: {}",
                    global.current_preset, e
                );
                Preset::default()
            }
            Err(e) => return Err(e),
        };

        info!(
            "Booted '{}' (MIDI channel {}, preset {})",
            global.device_name, global.midi_channel, global.current_preset
        );

        let mut device = Self {
            store,
            global,
            active,
            hardware,
        };
        device.recall_outputs();
        device.dispatch(TriggerType::Boot, TriggerContext::None);
        Ok(BootOutcome::Ready(device))
    }

    /// Boot, restarting once after a factory reset
    pub fn start(store: ConfigStore<S>, hardware: Hardware) -> Result<Self, StoreError> {
        let outcome = match Self::boot(store, hardware)? {
            BootOutcome::FactoryReset { store, hardware } => {
                info!("Restarting after factory reset");
                Self::boot(store, hardware)?
            }
            ready => ready,
        };

        match outcome {
            BootOutcome::Ready(device) => Ok(device),
            BootOutcome::FactoryReset { .. } => Err(StorageError::Corrupt {
                record: "global",
                reason: "boot marker still unset after factory reset".to_string(),
            }
            .into()),
        }
    }

    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn active_preset(&self) -> &Preset {
        &self.active
    }

    pub fn current_preset(&self) -> usize {
        self.global.current_preset
    }

    pub fn store(&self) -> &ConfigStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConfigStore<S> {
        &mut self.store
    }

    pub fn hardware(&self) -> &Hardware {
        &self.hardware
    }

    pub fn into_parts(self) -> (ConfigStore<S>, Hardware) {
        (self.store, self.hardware)
    }

    /// Persist the active buffer, cached output state included, to its slot
    pub fn save_active_preset(&mut self) -> Result<(), StoreError> {
        self.store
            .save_preset(self.global.current_preset, &self.active)?;
        info!(preset = self.global.current_preset, "Active preset saved");
        Ok(())
    }

    /// Change the device name and/or MIDI channel
    ///
    /// Memory is only updated once the store has accepted the new record.
    pub fn update_global(
        &mut self,
        device_name: Option<DeviceName>,
        midi_channel: Option<MidiChannel>,
    ) -> Result<(), StorageError> {
        let mut global = self.global.clone();
        if let Some(name) = device_name {
            global.device_name = name;
        }
        if let Some(channel) = midi_channel {
            global.midi_channel = channel;
        }

        self.store.save_global_config(&global)?;
        info!(
            "Global config updated: '{}', MIDI channel {}",
            global.device_name, global.midi_channel
        );
        self.global = global;
        Ok(())
    }

    /// Write `preset` to slot `index`
    ///
    /// The active buffer is saved to its own slot first and then reloaded, so
    /// writing the active slot makes the new contents live (and drives their
    /// cached output state) while writing any other slot leaves the active
    /// preset as it was.
    pub fn write_preset(&mut self, index: usize, preset: &Preset) -> Result<(), StoreError> {
        self.save_active_preset()?;
        self.store.save_preset(index, preset)?;
        self.active = self.store.load_preset(self.global.current_preset)?;
        if index == self.global.current_preset {
            self.recall_outputs();
        }
        info!(
            index,
            actions = preset.num_actions(),
            "Preset written by host"
        );
        Ok(())
    }
}
