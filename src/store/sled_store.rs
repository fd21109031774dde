//! Byte store backed by an embedded sled database
//!
//! The whole image lives in memory and is written back as a single value on
//! commit. A sled insert followed by a flush either lands completely or not at
//! all, so a failed commit never leaves a half-written record on disk.

use super::backend::{checked_range, ByteStore, ERASED};
use crate::error::StorageError;
use std::path::Path;
use tracing::{debug, info, trace, warn};

/// Key holding the store image
const IMAGE_KEY: &[u8] = b"eeprom_image";

pub struct SledStore {
    db: sled::Db,
    committed: Vec<u8>,
    staged: Vec<u8>,
    commit_count: u64,
}

impl SledStore {
    /// Open (or create) the database at `path` with an image of `capacity` bytes
    ///
    /// A fresh database starts erased. An image of a different size is padded
    /// with erased bytes or truncated.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        info!("Opened store database at: {}", path.display());

        let image = match db.get(IMAGE_KEY)? {
            Some(bytes) => {
                let mut image = bytes.to_vec();
                if image.len() != capacity {
                    warn!(
                        "Stored image is {} bytes, expected {}; resizing",
                        image.len(),
                        capacity
                    );
                    image.resize(capacity, ERASED);
                }
                debug!("Loaded {} byte image", image.len());
                image
            }
            None => {
                debug!("No image found, starting erased");
                vec![ERASED; capacity]
            }
        };

        Ok(Self {
            db,
            committed: image.clone(),
            staged: image,
            commit_count: 0,
        })
    }

    /// Number of successful commits since open
    pub fn commit_count(&self) -> u64 {
        self.commit_count
    }
}

impl ByteStore for SledStore {
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
        if self.staged == self.committed {
            trace!("Nothing staged, commit skipped");
            return Ok(());
        }

        self.db
            .insert(IMAGE_KEY, self.staged.as_slice())
            .map_err(|e| StorageError::Commit(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| StorageError::Commit(e.to_string()))?;

        self.committed.copy_from_slice(&self.staged);
        self.commit_count += 1;
        trace!("Image committed (commit #{})", self.commit_count);
        Ok(())
    }

    fn rollback(&mut self) {
        self.staged.copy_from_slice(&self.committed);
    }
}
