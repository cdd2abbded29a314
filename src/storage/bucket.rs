//! Bucket
//!
//! A size class of fixed-capacity slots backed by one file.
//!
//! ## Slot Layout
//! ```text
//! slot i = bytes [i * capacity, (i + 1) * capacity)
//! ┌──────────────┬──────────────────────┬──────────────────┐
//! │ Len: u16 LE  │ Payload (Len bytes)  │ Padding          │
//! └──────────────┴──────────────────────┴──────────────────┘
//! ```
//!
//! Occupied slots are always `[0, count)`. All offset arithmetic lives in
//! this file.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::{Result, SlotError};
use crate::registry::SharedStream;

/// Slot header size: u16 little-endian payload length
pub const HEADER_LEN: usize = 2;

/// One capacity class and its backing file
pub struct Bucket {
    capacity: usize,
    count: u64,
    /// Reusable slot-sized buffer for reads and writes
    scratch: Vec<u8>,
    stream: SharedStream,
    path: PathBuf,
}

impl Bucket {
    /// Wrap an opened stream; `count` starts at zero
    pub fn new(capacity: usize, path: PathBuf, stream: SharedStream) -> Self {
        Self {
            capacity,
            count: 0,
            scratch: vec![0u8; capacity],
            stream,
            path,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Largest payload a slot of this bucket can hold
    pub fn max_payload(&self) -> usize {
        self.capacity - HEADER_LEN
    }

    /// Current length of the backing file
    pub fn file_len(&self) -> Result<u64> {
        Ok(self.stream.lock().metadata()?.len())
    }

    /// Number of slots (whole or partial) present in the file
    pub fn slots_on_disk(&self) -> Result<u64> {
        Ok(self.file_len()?.div_ceil(self.capacity as u64))
    }

    fn offset(&self, index: u64) -> u64 {
        index * self.capacity as u64
    }

    /// Read slot `index` and return its payload
    ///
    /// Returns `None` when the header length is zero or larger than the
    /// slot can hold (never written, or torn).
    pub fn read_slot(&mut self, index: u64) -> Result<Option<&[u8]>> {
        self.read_raw(index)?;
        Ok(self.payload())
    }

    /// Append a payload at slot `count` and claim it
    pub fn append(&mut self, payload: &[u8], sync: SyncStrategy) -> Result<u64> {
        let index = self.count;
        self.write_slot(index, payload, sync)?;
        self.count += 1;
        Ok(index)
    }

    /// Count a slot found on disk during the startup scan
    pub fn claim_scanned(&mut self) {
        self.count += 1;
    }

    /// Release slot `index`, moving the last occupied slot into it
    ///
    /// Returns the payload of the moved slot (if it decodes) so the caller
    /// can re-point whatever referenced the old last position. The file is
    /// truncated to the new `count`.
    pub fn swap_remove(&mut self, index: u64, sync: SyncStrategy) -> Result<SwapOutcome<'_>> {
        if self.count == 0 || index >= self.count {
            return Err(SlotError::CorruptRecord(format!(
                "slot {} is outside occupied range [0, {}) of {}",
                index,
                self.count,
                self.path.display()
            )));
        }

        let last = self.count - 1;
        let moved = if last != index {
            self.read_raw(last)?;
            self.write_scratch(index, sync)?;
            true
        } else {
            false
        };

        self.count = last;
        let new_len = self.offset(self.count);
        self.stream.lock().set_len(new_len)?;

        Ok(if moved {
            SwapOutcome::Moved {
                from: last,
                payload: self.payload(),
            }
        } else {
            SwapOutcome::RemovedLast
        })
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn payload(&self) -> Option<&[u8]> {
        let len = u16::from_le_bytes([self.scratch[0], self.scratch[1]]) as usize;
        if len == 0 || len > self.max_payload() {
            return None;
        }
        Some(&self.scratch[HEADER_LEN..HEADER_LEN + len])
    }

    /// Fill the scratch buffer with slot `index`, zero-padding a short read
    fn read_raw(&mut self, index: u64) -> Result<()> {
        let offset = self.offset(index);
        self.scratch.fill(0);

        let mut file = self.stream.lock();
        file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < self.capacity {
            match file.read(&mut self.scratch[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        Ok(())
    }

    fn write_slot(&mut self, index: u64, payload: &[u8], sync: SyncStrategy) -> Result<()> {
        // A zero length header marks an unwritten slot
        if payload.is_empty() {
            return Err(SlotError::Serialization("empty slot payload".to_string()));
        }
        if payload.len() > self.max_payload() {
            return Err(SlotError::RecordTooLarge {
                size: payload.len(),
                max: self.max_payload(),
            });
        }

        self.scratch.fill(0);
        self.scratch[..HEADER_LEN].copy_from_slice(&(payload.len() as u16).to_le_bytes());
        self.scratch[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);
        self.write_scratch(index, sync)
    }

    fn write_scratch(&mut self, index: u64, sync: SyncStrategy) -> Result<()> {
        let offset = self.offset(index);
        let mut file = self.stream.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&self.scratch)?;
        file.flush()?;
        if sync == SyncStrategy::SyncData {
            file.sync_data()?;
        }
        Ok(())
    }
}

/// What `swap_remove` did to the bucket
pub enum SwapOutcome<'a> {
    /// The released slot was the last one; nothing moved
    RemovedLast,

    /// Slot `from` was copied into the released slot
    Moved {
        from: u64,
        /// `None` if the moved slot's header was invalid
        payload: Option<&'a [u8]>,
    },
}
