use crate::serialize::hex_u_int;
use crate::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// The kind of a non-volatile memory region.
///
/// The kind decides which erase command the flash controller issues for the
/// pages of a region.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    /// Main code storage, erased page by page.
    Code,
    /// User configuration area (e.g. the nRF UICR).
    ///
    /// This area does not react to a normal page erase and has its own erase command.
    Config,
}

/// Represents a named, contiguous region of flash memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlashRegion {
    /// A name to describe the region, e.g. `flash1` or `UICR`.
    pub name: String,
    /// What the region is used for.
    pub kind: RegionKind,
    /// Address of the first byte of the region.
    #[serde(with = "hex_u_int")]
    pub base_address: u64,
    /// Size of the region in bytes.
    #[serde(with = "hex_u_int")]
    pub size: u64,
}

impl FlashRegion {
    /// Returns the address range of the region.
    ///
    /// The end is clamped to the top of the address space. [`FlashRegion::pages`]
    /// rejects regions which do not fit.
    pub fn range(&self) -> Range<u64> {
        self.base_address..self.base_address.saturating_add(self.size)
    }

    /// Returns true if the region fully contains `range`.
    pub fn contains_range(&self, range: &Range<u64>) -> bool {
        self.range().contains_range(range)
    }

    /// Splits the region into consecutive pages of `page_size` bytes.
    ///
    /// The region size has to be a whole multiple of the page size, anything
    /// else points at a broken device description.
    pub fn pages(&self, page_size: u64) -> Result<Vec<FlashPage>, ConfigurationError> {
        if page_size == 0 || !page_size.is_power_of_two() {
            return Err(ConfigurationError::InvalidPageSize { page_size });
        }

        if self.base_address.checked_add(self.size).is_none() {
            return Err(ConfigurationError::RegionOutOfAddressSpace {
                region: self.name.clone(),
                base_address: self.base_address,
                size: self.size,
            });
        }

        if self.size == 0 || self.size % page_size != 0 || self.base_address % page_size != 0 {
            return Err(ConfigurationError::RegionNotPageAligned {
                region: self.name.clone(),
                base_address: self.base_address,
                size: self.size,
                page_size,
            });
        }

        Ok(self
            .range()
            .step_by(page_size as usize)
            .map(|address| FlashPage {
                region: self.name.clone(),
                kind: self.kind,
                address,
                size: page_size,
            })
            .collect())
    }
}

/// Holds information about a single erasable flash page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlashPage {
    /// Name of the region the page belongs to.
    pub region: String,
    /// Kind of the region the page belongs to.
    pub kind: RegionKind,
    /// Base address of the page.
    pub address: u64,
    /// Size of the page.
    pub size: u64,
}

impl FlashPage {
    /// Returns the address range of the page.
    pub fn address_range(&self) -> Range<u64> {
        self.address..self.address + self.size
    }
}

impl std::fmt::Display for FlashPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:#010x} {}K", self.region, self.address, self.size / 1024)
    }
}

/// Enables the user to do range intersection testing.
pub trait MemoryRange {
    /// Returns true if `self` contains `range` fully.
    fn contains_range(&self, range: &Range<u64>) -> bool;

    /// Returns true if `self` intersects `range` partially.
    fn intersects_range(&self, range: &Range<u64>) -> bool;
}

impl MemoryRange for Range<u64> {
    fn contains_range(&self, range: &Range<u64>) -> bool {
        if range.end == 0 || range.is_empty() {
            false
        } else {
            self.contains(&range.start) && self.contains(&(range.end - 1))
        }
    }

    fn intersects_range(&self, range: &Range<u64>) -> bool {
        if range.end == 0 || range.is_empty() {
            false
        } else {
            self.start < range.end && range.start < self.end
        }
    }
}
