//! Pico Mod control engine
//!
//! Trigger/action dispatch, preset storage and host synchronization for a MIDI
//! footswitch controller. The binary in `main.rs` runs the engine on a desktop host
//! with emulated outputs; everything device-specific sits behind the collaborator
//! traits in [`hardware`] and the byte store in [`store`].

pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod hardware;
pub mod midi;
pub mod model;
pub mod paths;
pub mod protocol;
pub mod store;

pub use device::{BootOutcome, Device};
pub use error::{ActionValidityError, IndexOutOfRange, ProtocolError, StorageError, StoreError};
pub use hardware::Hardware;
pub use store::ConfigStore;

/// Number of preset slots in the store
pub const NUM_PRESETS: usize = 128;

/// Maximum number of actions a preset can hold
pub const MAX_ACTIONS: usize = 16;

/// Size of the device name field in the global record, NUL terminator included
pub const DEVICE_NAME_LEN: usize = 16;

/// Boot marker written by a factory reset
pub const DEVICE_CONFIGURED: u8 = 114;

/// Name given to a freshly reset device
pub const DEFAULT_DEVICE_NAME: &str = "New Pico Mod";

/// Highest expression level (the digipot has 257 steps)
pub const EXPRESSION_MAX: u16 = 256;

/// Expression level stored in empty presets
pub const DEFAULT_EXPRESSION: u16 = 127;
