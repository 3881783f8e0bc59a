//! Flash address range

use super::WORD_SIZE;

/// Programmable part of the flash, split into equally sized sectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashRegion {
    start: u32,
    end: u32,
    sector_size: u32,
}

impl FlashRegion {
    /// Describe `start..end` with sectors of `sector_size` bytes
    ///
    /// Returns `None` unless the range is non-empty, both ends are sector
    /// aligned and the sector size is a non-zero multiple of [`WORD_SIZE`].
    pub const fn new(start: u32, end: u32, sector_size: u32) -> Option<Self> {
        if sector_size == 0 || sector_size % WORD_SIZE as u32 != 0 {
            return None;
        }
        if start >= end || start % sector_size != 0 || end % sector_size != 0 {
            return None;
        }
        Some(Self {
            start,
            end,
            sector_size,
        })
    }

    pub const fn start(&self) -> u32 {
        self.start
    }

    /// First address past the region
    pub const fn end(&self) -> u32 {
        self.end
    }

    pub const fn sector_size(&self) -> u32 {
        self.sector_size
    }

    pub const fn sector_count(&self) -> u32 {
        (self.end - self.start) / self.sector_size
    }

    /// Index of the sector holding `address`, relative to the region start
    pub const fn sector_index(&self, address: u32) -> Option<u32> {
        if address < self.start || address >= self.end {
            return None;
        }
        Some((address - self.start) / self.sector_size)
    }

    /// Check whether `len` bytes at `address` lie inside the region
    pub const fn contains(&self, address: u32, len: usize) -> bool {
        if address < self.start || address > self.end {
            return false;
        }
        (len as u64) <= (self.end - address) as u64
    }
}
