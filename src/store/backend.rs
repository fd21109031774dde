//! Byte-addressable non-volatile storage

use crate::error::StorageError;
use std::ops::Range;

/// Persistent byte storage with an explicit commit step
///
/// Writes are staged and only become durable once [`commit`](Self::commit)
/// succeeds. Reads observe staged bytes, like an EEPROM emulation reading its
/// RAM cache. [`rollback`](Self::rollback) discards everything staged since the
/// last successful commit.
pub trait ByteStore {
    fn capacity(&self) -> usize;

    fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>, StorageError>;

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StorageError>;

    fn commit(&mut self) -> Result<(), StorageError>;

    fn rollback(&mut self);
}

/// Value of erased flash
pub const ERASED: u8 = 0xFF;

pub(crate) fn checked_range(
    offset: usize,
    len: usize,
    capacity: usize,
) -> Result<Range<usize>, StorageError> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(offset..end),
        _ => Err(StorageError::OutOfBounds {
            offset,
            len,
            capacity,
        }),
    }
}

/// In-memory byte store
///
/// Used by tests and for dry runs. Commits can be made to fail on demand to
/// exercise the retry and rollback paths.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    committed: Vec<u8>,
    staged: Vec<u8>,
    failing_commits: usize,
    commit_attempts: usize,
}

impl MemoryStore {
    /// A store in the erased state
    pub fn erased(capacity: usize) -> Self {
        Self::from_image(vec![ERASED; capacity])
    }

    pub fn from_image(image: Vec<u8>) -> Self {
        Self {
            staged: image.clone(),
            committed: image,
            failing_commits: 0,
            commit_attempts: 0,
        }
    }

    /// Make the next `count` commits fail
    pub fn fail_next_commits(&mut self, count: usize) {
        self.failing_commits = count;
    }

    /// Number of commit attempts so far, failed ones included
    pub fn commit_attempts(&self) -> usize {
        self.commit_attempts
    }

    /// The durable contents
    pub fn committed(&self) -> &[u8] {
        &self.committed
    }
}

impl ByteStore for MemoryStore {
    fn capacity(&self) -> usize {
        self.staged.len()
    }

    fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>, StorageError> {
        let range = checked_range(offset, len, self.staged.len())?;
        Ok(self.staged[range].to_vec())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StorageError> {
        let range = checked_range(offset, bytes.len(), self.staged.len())?;
        self.staged[range].copy_from_slice(bytes);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.commit_attempts += 1;
        if self.failing_commits > 0 {
            self.failing_commits -= 1;
            return Err(StorageError::Commit("injected failure".to_string()));
        }
        self.committed.copy_from_slice(&self.staged);
        Ok(())
    }

    fn rollback(&mut self) {
        self.staged.copy_from_slice(&self.committed);
    }
}
