//! Configuration store
//!
//! Typed access to the global record and the preset slots on top of a
//! [`ByteStore`]. Every record write is followed by a commit; a failing commit is
//! retried once and then rolled back, so the previously committed record stays
//! authoritative.

mod backend;
pub mod layout;
mod sled_store;

pub use backend::{ByteStore, MemoryStore, ERASED};
pub use sled_store::SledStore;

use crate::error::{StorageError, StoreError};
use crate::model::{GlobalConfig, Preset};
use crate::NUM_PRESETS;
use layout::{
    decode_global, decode_preset, encode_global, encode_preset, preset_offset, GLOBAL_RECORD_LEN,
    PRESET_RECORD_LEN, STORE_CAPACITY,
};
use tracing::{debug, error, info, warn};

pub struct ConfigStore<S> {
    backend: S,
}

impl<S: ByteStore> ConfigStore<S> {
    pub fn new(backend: S) -> Result<Self, StorageError> {
        if backend.capacity() < STORE_CAPACITY {
            return Err(StorageError::TooSmall {
                capacity: backend.capacity(),
                required: STORE_CAPACITY,
            });
        }
        Ok(Self { backend })
    }

    /// Read the global record
    pub fn load(&self) -> Result<GlobalConfig, StorageError> {
        let bytes = self.backend.read(0, GLOBAL_RECORD_LEN)?;
        decode_global(&bytes)
    }

    pub fn load_preset(&self, index: usize) -> Result<Preset, StoreError> {
        let offset = preset_offset(index)?;
        let bytes = self.backend.read(offset, PRESET_RECORD_LEN)?;
        Ok(decode_preset(&bytes)?)
    }

    pub fn save_preset(&mut self, index: usize, preset: &Preset) -> Result<(), StoreError> {
        let offset = preset_offset(index)?;
        self.write_record(offset, &encode_preset(preset))?;
        debug!(index, actions = preset.num_actions(), "Preset saved");
        Ok(())
    }

    pub fn save_global_config(&mut self, config: &GlobalConfig) -> Result<(), StorageError> {
        if config.current_preset >= NUM_PRESETS {
            return Err(StorageError::Corrupt {
                record: "global",
                reason: format!("current preset {}", config.current_preset),
            });
        }
        self.write_record(0, &encode_global(config))?;
        debug!(
            current_preset = config.current_preset,
            midi_channel = %config.midi_channel,
            "Global config saved"
        );
        Ok(())
    }

    /// Write factory defaults to every record
    ///
    /// The whole image is staged and committed once. The caller is expected to
    /// restart the device afterwards.
    pub fn factory_reset(&mut self) -> Result<(), StorageError> {
        info!("Factory reset: writing defaults to {} preset slots", NUM_PRESETS);

        let empty = encode_preset(&Preset::default());
        let staged = self
            .backend
            .write(0, &encode_global(&GlobalConfig::factory()))
            .and_then(|_| {
                (0..NUM_PRESETS).try_for_each(|index| {
                    let offset = GLOBAL_RECORD_LEN + index * PRESET_RECORD_LEN;
                    self.backend.write(offset, &empty)
                })
            });
        if let Err(e) = staged {
            self.backend.rollback();
            return Err(e);
        }

        self.commit()?;
        info!("Factory reset complete, restart required");
        Ok(())
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    pub fn into_backend(self) -> S {
        self.backend
    }

    fn write_record(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StorageError> {
        if let Err(e) = self.backend.write(offset, bytes) {
            self.backend.rollback();
            return Err(e);
        }
        self.commit()
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        let first = match self.backend.commit() {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        warn!("Commit failed ({}), retrying once", first);

        match self.backend.commit() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.backend.rollback();
                error!("Commit failed again, staged bytes rolled back: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, ActionEvent, ButtonState, MidiChannel, Trigger};
    use crate::{DEFAULT_EXPRESSION, DEVICE_CONFIGURED};

    fn erased() -> ConfigStore<MemoryStore> {
        ConfigStore::new(MemoryStore::erased(STORE_CAPACITY)).unwrap()
    }

    fn reset() -> ConfigStore<MemoryStore> {
        let mut store = erased();
        store.factory_reset().unwrap();
        store
    }

    fn expression_preset(value: u16) -> Preset {
        let mut preset = Preset::with_actions(vec![Action::new(
            Trigger::Switch1(ButtonState::Pressed),
            ActionEvent::Expression { value },
        )])
        .unwrap();
        preset.id = value;
        preset
    }

    #[test]
    fn test_undersized_backend_is_rejected() {
        let result = ConfigStore::new(MemoryStore::erased(STORE_CAPACITY - 1));
        assert!(matches!(
            result,
            Err(StorageError::TooSmall { required: STORE_CAPACITY, .. })
        ));
    }

    #[test]
    fn test_erased_store_is_unconfigured() {
        let store = erased();
        assert!(!store.load().unwrap().is_configured());
    }

    #[test]
    fn test_factory_reset_writes_defaults() {
        let store = reset();

        let global = store.load().unwrap();
        assert_eq!(global.boot_marker, DEVICE_CONFIGURED);
        assert_eq!(global.current_preset, 0);
        assert_eq!(global.midi_channel, MidiChannel::Omni);
        assert_eq!(global.device_name.as_str(), "New Pico Mod");

        for index in 0..NUM_PRESETS {
            let preset = store.load_preset(index).unwrap();
            assert_eq!(preset.num_actions(), 0);
            assert_eq!(preset.expression_value, DEFAULT_EXPRESSION);
        }
        assert_eq!(store.backend().commit_attempts(), 1);
    }

    #[test]
    fn test_saved_preset_loads_back() {
        let mut store = reset();
        let preset = expression_preset(200);

        store.save_preset(NUM_PRESETS - 1, &preset).unwrap();
        assert_eq!(store.load_preset(NUM_PRESETS - 1).unwrap(), preset);
        assert_eq!(store.load_preset(NUM_PRESETS - 2).unwrap().num_actions(), 0);
    }

    #[test]
    fn test_preset_index_is_bounded() {
        let mut store = reset();
        assert!(matches!(
            store.load_preset(NUM_PRESETS),
            Err(StoreError::IndexOutOfRange(_))
        ));
        assert!(matches!(
            store.save_preset(NUM_PRESETS, &Preset::default()),
            Err(StoreError::IndexOutOfRange(_))
        ));
    }

    #[test]
    fn test_global_config_round_trips() {
        let mut store = reset();
        let mut config = store.load().unwrap();
        config.midi_channel = MidiChannel::Channel(3);
        config.current_preset = 42;

        store.save_global_config(&config).unwrap();
        assert_eq!(store.load().unwrap(), config);
    }

    #[test]
    fn test_single_commit_failure_is_retried() {
        let mut store = reset();
        store.backend_mut().fail_next_commits(1);

        store.save_preset(1, &expression_preset(10)).unwrap();
        assert_eq!(store.backend().commit_attempts(), 3);
        assert_eq!(store.load_preset(1).unwrap(), expression_preset(10));
    }

    #[test]
    fn test_repeated_commit_failure_rolls_back() {
        let mut store = reset();
        store.save_preset(1, &expression_preset(10)).unwrap();
        let before = store.backend().committed().to_vec();

        store.backend_mut().fail_next_commits(2);
        let err = store.save_preset(1, &expression_preset(20)).unwrap_err();

        assert!(matches!(err, StoreError::Storage(StorageError::Commit(_))));
        assert_eq!(store.backend().committed(), &before[..]);
        assert_eq!(store.load_preset(1).unwrap(), expression_preset(10));
    }

    #[test]
    fn test_corrupt_global_record_is_reported() {
        let mut image = vec![ERASED; STORE_CAPACITY];
        image[0] = DEVICE_CONFIGURED;
        image[1] = 99;
        let store = ConfigStore::new(MemoryStore::from_image(image)).unwrap();
        assert!(matches!(store.load(), Err(StorageError::Corrupt { .. })));
    }
}
