//! Error types for the store, the dispatch engine and the host protocol

use crate::model::OutputTarget;
use thiserror::Error;

/// A preset index outside `0..NUM_PRESETS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("preset index {index} out of range (0..{limit})")]
pub struct IndexOutOfRange {
    pub index: usize,
    pub limit: usize,
}

/// Failures of the non-volatile byte store
#[derive(Debug, Error)]
pub enum StorageError {
    /// A read or write reached past the end of the store
    #[error("access of {len} bytes at offset {offset} exceeds store capacity {capacity}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// The backend refused to make staged bytes durable
    #[error("commit failed: {0}")]
    Commit(String),

    /// A committed record does not decode
    #[error("corrupt {record} record: {reason}")]
    Corrupt {
        record: &'static str,
        reason: String,
    },

    /// The store is smaller than the record layout needs
    #[error("store capacity {capacity} is below the {required} bytes the layout needs")]
    TooSmall { capacity: usize, required: usize },

    #[error("sled: {0}")]
    Sled(#[from] sled::Error),
}

/// Errors from store operations addressed by preset index
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    IndexOutOfRange(#[from] IndexOutOfRange),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// An action whose tags or payload cannot be executed
///
/// Raised while decoding records and packets and while executing actions. The
/// offending action is skipped; it never aborts the remaining actions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionValidityError {
    #[error("unknown trigger type {0}")]
    UnknownTrigger(u8),

    #[error("unknown action event type {0}")]
    UnknownEvent(u8),

    #[error("invalid {field} value {value}")]
    InvalidField { field: &'static str, value: u32 },

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("expression level {0} out of range (0..=256)")]
    ExpressionOutOfRange(u16),

    #[error("LED index {index} beyond strip of {len} pixels")]
    LedOutOfRange { index: u16, len: usize },

    #[error("output target {0} has no routable line")]
    UnroutableOutput(OutputTarget),

    #[error("MIDI {field} {value} out of range")]
    MidiOutOfRange { field: &'static str, value: u8 },
}

/// A preset was given more than `MAX_ACTIONS` actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a preset holds at most {max} actions, got {got}")]
pub struct TooManyActions {
    pub got: usize,
    pub max: usize,
}

/// A device name that does not fit the global record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidDeviceName {
    #[error("device name is {len} bytes, at most {max} allowed")]
    TooLong { len: usize, max: usize },

    #[error("device name contains a NUL byte")]
    ContainsNul,
}

/// Host protocol failures
///
/// Every variant is recovered locally: the store is left unchanged, the host is
/// told `error` and the protocol returns to `Ready`.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    #[error("action {index}: {source}")]
    InvalidAction {
        index: usize,
        #[source]
        source: ActionValidityError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<StorageError> for ProtocolError {
    fn from(err: StorageError) -> Self {
        ProtocolError::Store(StoreError::Storage(err))
    }
}

impl From<IndexOutOfRange> for ProtocolError {
    fn from(err: IndexOutOfRange) -> Self {
        ProtocolError::Store(StoreError::IndexOutOfRange(err))
    }
}
